/// Statement grammar and dispatcher
///
/// Statement text is matched against an ordered table of patterns. The first
/// pattern that matches decides the statement kind; its builder pulls the
/// captured names and `WITH` options out and produces a validated
/// [`StatementKind`].

use crate::statement::dml::{Dml, Select};
use crate::statement::index::{AlterGsi, CreateGsi, DescribeIndex, DropGsi};
use crate::statement::table::{AlterTable, CreateTable, DescribeTable, DropTable};
use crate::statement::{Statement, StatementKind};
use crate::Connection;
use keysql_core::dialect::WithOptions;
use keysql_core::{Error, Result};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::debug;

/// Zero or more `WITH key=value` clauses, captured as one group
const WITH_CLAUSES: &str =
    r#"((?:(?:\s+|\s*,\s+|\s+,\s*)WITH\s+[\w\-]+\s*=\s*[\w/\.\*,;:'"-]+)*)"#;

type Builder = fn(&str, &Captures) -> Result<StatementKind>;

struct Rule {
    name: &'static str,
    pattern: Regex,
    build: Builder,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, build: Builder) -> Self {
        let pattern = pattern.replace("{WITH}", WITH_CLAUSES);
        Self {
            name,
            pattern: Regex::new(&pattern).expect("statement pattern is valid"),
            build,
        }
    }
}

lazy_static! {
    static ref RULES: Vec<Rule> = vec![
        Rule::new(
            "CREATE TABLE",
            r"(?is)^CREATE\s+TABLE(\s+IF\s+NOT\s+EXISTS)?\s+([\w\-]+){WITH}$",
            build_create_table,
        ),
        Rule::new("LIST TABLES", r"(?i)^LIST\s+TABLES?$", |_, _| {
            Ok(StatementKind::ListTables)
        }),
        Rule::new(
            "DESCRIBE TABLE",
            r"(?i)^DESCRIBE\s+TABLE\s+([\w\-]+)$",
            |_, caps| {
                Ok(StatementKind::DescribeTable(DescribeTable {
                    table_name: group(caps, 1).to_string(),
                }))
            },
        ),
        Rule::new(
            "ALTER TABLE",
            r"(?is)^ALTER\s+TABLE\s+([\w\-]+){WITH}$",
            |_, caps| {
                AlterTable::parse(group(caps, 1), &options(caps, 2)).map(StatementKind::AlterTable)
            },
        ),
        Rule::new(
            "DROP TABLE",
            r"(?i)^(?:DROP|DELETE)\s+TABLE(\s+IF\s+EXISTS)?\s+([\w\-]+)$",
            |_, caps| {
                Ok(StatementKind::DropTable(DropTable {
                    table_name: group(caps, 2).to_string(),
                    if_exists: caps.get(1).is_some(),
                }))
            },
        ),
        Rule::new(
            "DESCRIBE LSI",
            r"(?i)^DESCRIBE\s+LSI\s+([\w\-]+)\s+ON\s+([\w\-]+)$",
            |_, caps| {
                Ok(StatementKind::DescribeLocalIndex(DescribeIndex {
                    index_name: group(caps, 1).to_string(),
                    table_name: group(caps, 2).to_string(),
                }))
            },
        ),
        Rule::new(
            "CREATE GSI",
            r"(?is)^CREATE\s+GSI(\s+IF\s+NOT\s+EXISTS)?\s+([\w\-]+)\s+ON\s+([\w\-]+){WITH}$",
            build_create_gsi,
        ),
        Rule::new(
            "DESCRIBE GSI",
            r"(?i)^DESCRIBE\s+GSI\s+([\w\-]+)\s+ON\s+([\w\-]+)$",
            |_, caps| {
                Ok(StatementKind::DescribeGlobalIndex(DescribeIndex {
                    index_name: group(caps, 1).to_string(),
                    table_name: group(caps, 2).to_string(),
                }))
            },
        ),
        Rule::new(
            "ALTER GSI",
            r"(?is)^ALTER\s+GSI\s+([\w\-]+)\s+ON\s+([\w\-]+){WITH}$",
            |_, caps| {
                AlterGsi::parse(group(caps, 1), group(caps, 2), &options(caps, 3))
                    .map(StatementKind::AlterGsi)
            },
        ),
        Rule::new(
            "DROP GSI",
            r"(?i)^(?:DROP|DELETE)\s+GSI(\s+IF\s+EXISTS)?\s+([\w\-]+)\s+ON\s+([\w\-]+)$",
            |_, caps| {
                Ok(StatementKind::DropGsi(DropGsi {
                    index_name: group(caps, 2).to_string(),
                    table_name: group(caps, 3).to_string(),
                    if_exists: caps.get(1).is_some(),
                }))
            },
        ),
        Rule::new("INSERT", r"(?is)^INSERT\s+INTO\s+", |query, _| {
            Dml::parse(query).map(StatementKind::Insert)
        }),
        Rule::new("SELECT", r"(?is)^SELECT\s+", |query, _| {
            Select::parse(query).map(StatementKind::Select)
        }),
        Rule::new("UPDATE", r"(?is)^UPDATE\s+", |query, _| {
            Dml::parse(query).map(StatementKind::Update)
        }),
        Rule::new("DELETE", r"(?is)^DELETE\s+FROM\s+", |query, _| {
            Dml::parse(query).map(StatementKind::Delete)
        }),
    ];
}

fn group<'t>(caps: &Captures<'t>, i: usize) -> &'t str {
    caps.get(i).map(|m| m.as_str()).unwrap_or("")
}

fn options(caps: &Captures, i: usize) -> WithOptions {
    WithOptions::parse(group(caps, i))
}

fn build_create_table(_: &str, caps: &Captures) -> Result<StatementKind> {
    CreateTable::parse(group(caps, 2), caps.get(1).is_some(), &options(caps, 3))
        .map(StatementKind::CreateTable)
}

fn build_create_gsi(_: &str, caps: &Captures) -> Result<StatementKind> {
    CreateGsi::parse(
        group(caps, 2),
        group(caps, 3),
        caps.get(1).is_some(),
        &options(caps, 4),
    )
    .map(StatementKind::CreateGsi)
}

/// Classify statement text without binding it to a connection.
pub fn parse_kind(query: &str) -> Result<StatementKind> {
    let query = query.trim();
    for rule in RULES.iter() {
        if let Some(caps) = rule.pattern.captures(query) {
            debug!(rule = rule.name, "statement matched");
            return (rule.build)(query, &caps);
        }
    }
    Err(Error::InvalidQuery(format!("unrecognized statement: {}", query)))
}

pub(crate) fn parse_statement<'c>(conn: &'c Connection, query: &str) -> Result<Statement<'c>> {
    let kind = parse_kind(query)?;
    Statement::new(conn, query.trim(), kind)
}

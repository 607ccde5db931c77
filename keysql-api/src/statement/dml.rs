/// Executable statements: INSERT, SELECT, UPDATE and DELETE
///
/// The statement text is forwarded to the store as written. Only SELECT's
/// trailing `WITH` clauses are consumed locally and stripped before sending.

use crate::connection::{Executed, RunSpec};
use crate::result::{ExecResult, ResultSet};
use crate::transaction::Execution;
use crate::Connection;
use keysql_core::dialect::{select_columns, WithOptions};
use keysql_core::{CallContext, Error, Result, Value};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_TRAILING_WITH: Regex = Regex::new(
        r#"(?i)(?:(?:\s+|\s*,\s+|\s+,\s*)WITH\s+[\w\-]+\s*=\s*[\w/\.\*,;:'"-]+)+$"#
    )
    .expect("trailing option pattern is valid");
}

/// INSERT, UPDATE or DELETE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dml {
    pub statement: String,
}

impl Dml {
    pub(crate) fn parse(query: &str) -> Result<Self> {
        Ok(Self {
            statement: query.to_string(),
        })
    }

    /// Run the statement; one affected row on success.
    pub(crate) fn exec(
        &self,
        conn: &Connection,
        ctx: Option<&CallContext>,
        params: &[Value],
    ) -> Result<Execution<ExecResult>> {
        let spec = RunSpec {
            statement: &self.statement,
            limit: None,
            consistent_read: None,
            columns: None,
        };
        Ok(match conn.run_statement(ctx, spec, params)? {
            Execution::Completed(_) => Execution::Completed(ExecResult::new(true, 1)),
            Execution::Queued(pending) => Execution::Queued(pending),
        })
    }

    /// Run the statement and return the items it reports back, such as the
    /// old or new image requested by a `RETURNING` clause.
    pub(crate) fn query(
        &self,
        conn: &Connection,
        ctx: Option<&CallContext>,
        params: &[Value],
    ) -> Result<Execution<ResultSet>> {
        let spec = RunSpec {
            statement: &self.statement,
            limit: None,
            consistent_read: None,
            columns: None,
        };
        Ok(match conn.run_statement(ctx, spec, params)? {
            Execution::Completed(executed) => {
                Execution::Completed(cursor(conn, ctx, executed, None, None))
            }
            Execution::Queued(pending) => Execution::Queued(pending),
        })
    }
}

/// `SELECT ... [WITH CONSISTENT_READ=bool] [WITH LIMIT=n]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    /// Statement text without the trailing `WITH` clauses
    pub statement: String,
    pub consistent_read: Option<bool>,
    /// Client-side row limit, also sent as the remote page size
    pub limit: Option<u32>,
    /// Output columns when the projection enumerates them
    pub columns: Option<Vec<String>>,
}

impl Select {
    pub(crate) fn parse(query: &str) -> Result<Self> {
        let (statement, opts) = match RE_TRAILING_WITH.find(query) {
            Some(m) => (
                query[..m.start()].trim_end(),
                WithOptions::parse(m.as_str()),
            ),
            None => (query, WithOptions::default()),
        };

        let consistent_read = ["CONSISTENT_READ", "CONSISTENTREAD"]
            .iter()
            .find(|key| opts.contains(key))
            .map(|key| opts.first_bool(key));

        let limit = match opts.first_int("LIMIT") {
            None => None,
            Some(Ok(n)) if n > 0 && n <= i64::from(u32::MAX) => Some(n as u32),
            Some(Ok(n)) => {
                return Err(Error::InvalidArgument(format!(
                    "invalid LIMIT value: {}, expected a positive integer",
                    n
                )))
            }
            Some(Err(raw)) => {
                return Err(Error::InvalidArgument(format!(
                    "invalid LIMIT value: {}, expected a positive integer",
                    raw
                )))
            }
        };

        Ok(Self {
            statement: statement.to_string(),
            consistent_read,
            limit,
            columns: select_columns(statement)?,
        })
    }

    pub(crate) fn query(
        &self,
        conn: &Connection,
        ctx: Option<&CallContext>,
        params: &[Value],
    ) -> Result<Execution<ResultSet>> {
        let spec = RunSpec {
            statement: &self.statement,
            limit: self.limit,
            consistent_read: self.consistent_read,
            columns: self.columns.clone(),
        };
        Ok(match conn.run_statement(ctx, spec, params)? {
            Execution::Completed(executed) => Execution::Completed(cursor(
                conn,
                ctx,
                executed,
                self.limit,
                self.columns.clone(),
            )),
            Execution::Queued(pending) => Execution::Queued(pending),
        })
    }
}

fn cursor(
    conn: &Connection,
    ctx: Option<&CallContext>,
    executed: Executed,
    limit: Option<u32>,
    columns: Option<Vec<String>>,
) -> ResultSet {
    ResultSet::from_statement(
        conn.executor().clone(),
        ctx.cloned(),
        conn.timeout(),
        executed.request,
        executed.output,
        limit.map(u64::from),
        columns,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_strips_trailing_options() {
        let select = Select::parse(
            "SELECT * FROM \"users\" WHERE id=? WITH consistent_read=true, WITH Limit=25",
        )
        .unwrap();
        assert_eq!(select.statement, "SELECT * FROM \"users\" WHERE id=?");
        assert_eq!(select.consistent_read, Some(true));
        assert_eq!(select.limit, Some(25));
        assert_eq!(select.columns, None);
    }

    #[test]
    fn test_select_consistent_read_alias() {
        let select = Select::parse("SELECT a FROM t WITH ConsistentRead=false").unwrap();
        assert_eq!(select.consistent_read, Some(false));
        assert_eq!(select.limit, None);
        assert_eq!(select.columns, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_select_without_options() {
        let select = Select::parse("SELECT b, a FROM t WHERE a='with'").unwrap();
        assert_eq!(select.statement, "SELECT b, a FROM t WHERE a='with'");
        assert_eq!(select.consistent_read, None);
        assert_eq!(select.columns, Some(vec!["b".to_string(), "a".to_string()]));
    }

    #[test]
    fn test_select_rejects_bad_limit() {
        for query in [
            "SELECT * FROM t WITH LIMIT=0",
            "SELECT * FROM t WITH LIMIT=-3",
            "SELECT * FROM t WITH LIMIT=ten",
        ] {
            let err = Select::parse(query).unwrap_err();
            assert_eq!(err.code(), "INVALID_ARGUMENT", "{}", query);
        }
    }
}

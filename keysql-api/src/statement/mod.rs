/// Prepared statements
///
/// A [`Statement`] is a parsed and validated statement bound to the
/// connection it was prepared on. DDL statements run their remote call
/// directly; executable statements go through the connection so that an open
/// transaction can queue them.

pub mod dml;
pub mod index;
pub mod table;

use crate::result::{ExecResult, ResultSet};
use crate::transaction::Execution;
use crate::Connection;
use keysql_core::dialect::{count_placeholders, WithOptions};
use keysql_core::table::{ProvisionedThroughput, ScalarType};
use keysql_core::{CallContext, Error, Result, Value};
use tracing::debug;

use self::dml::{Dml, Select};
use self::index::{AlterGsi, CreateGsi, DescribeIndex, DropGsi};
use self::table::{AlterTable, CreateTable, DescribeTable, DropTable};

/// Every statement form of the dialect
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    CreateTable(CreateTable),
    ListTables,
    DescribeTable(DescribeTable),
    AlterTable(AlterTable),
    DropTable(DropTable),
    DescribeLocalIndex(DescribeIndex),
    CreateGsi(CreateGsi),
    DescribeGlobalIndex(DescribeIndex),
    AlterGsi(AlterGsi),
    DropGsi(DropGsi),
    Insert(Dml),
    Select(Select),
    Update(Dml),
    Delete(Dml),
}

impl StatementKind {
    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::CreateTable(_) => "CREATE TABLE",
            StatementKind::ListTables => "LIST TABLES",
            StatementKind::DescribeTable(_) => "DESCRIBE TABLE",
            StatementKind::AlterTable(_) => "ALTER TABLE",
            StatementKind::DropTable(_) => "DROP TABLE",
            StatementKind::DescribeLocalIndex(_) => "DESCRIBE LSI",
            StatementKind::CreateGsi(_) => "CREATE GSI",
            StatementKind::DescribeGlobalIndex(_) => "DESCRIBE GSI",
            StatementKind::AlterGsi(_) => "ALTER GSI",
            StatementKind::DropGsi(_) => "DROP GSI",
            StatementKind::Insert(_) => "INSERT",
            StatementKind::Select(_) => "SELECT",
            StatementKind::Update(_) => "UPDATE",
            StatementKind::Delete(_) => "DELETE",
        }
    }

    /// Text forwarded to the store, for executable statements
    pub fn statement_text(&self) -> Option<&str> {
        match self {
            StatementKind::Insert(d) | StatementKind::Update(d) | StatementKind::Delete(d) => {
                Some(&d.statement)
            }
            StatementKind::Select(s) => Some(&s.statement),
            _ => None,
        }
    }
}

pub struct Statement<'c> {
    conn: &'c Connection,
    query: String,
    num_input: usize,
    kind: StatementKind,
}

impl<'c> Statement<'c> {
    pub(crate) fn new(conn: &'c Connection, query: &str, kind: StatementKind) -> Result<Self> {
        let num_input = match kind.statement_text() {
            Some(text) => count_placeholders(text)?,
            None => 0,
        };
        Ok(Self {
            conn,
            query: query.to_string(),
            num_input,
            kind,
        })
    }

    /// The statement text as prepared
    pub fn sql(&self) -> &str {
        &self.query
    }

    /// Number of positional parameters the statement declares
    pub fn num_input(&self) -> usize {
        self.num_input
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// Run a statement that produces no rows.
    pub fn exec(&self, params: &[Value]) -> Result<Execution<ExecResult>> {
        self.exec_inner(None, params)
    }

    /// Like [`Statement::exec`], bounded by the caller's context.
    pub fn exec_context(
        &self,
        ctx: &CallContext,
        params: &[Value],
    ) -> Result<Execution<ExecResult>> {
        self.exec_inner(Some(ctx), params)
    }

    /// Run a statement that produces rows.
    pub fn query(&self, params: &[Value]) -> Result<Execution<ResultSet>> {
        self.query_inner(None, params)
    }

    /// Like [`Statement::query`], bounded by the caller's context. The
    /// context also bounds every page the returned cursor fetches.
    pub fn query_context(
        &self,
        ctx: &CallContext,
        params: &[Value],
    ) -> Result<Execution<ResultSet>> {
        self.query_inner(Some(ctx), params)
    }

    fn check_params(&self, params: &[Value]) -> Result<()> {
        if params.len() != self.num_input {
            return Err(Error::InvalidArgument(format!(
                "expected {} parameter(s), got {}",
                self.num_input,
                params.len()
            )));
        }
        Ok(())
    }

    fn exec_inner(
        &self,
        ctx: Option<&CallContext>,
        params: &[Value],
    ) -> Result<Execution<ExecResult>> {
        self.check_params(params)?;
        debug!(statement = self.kind.name(), "exec");
        let conn = self.conn;
        let done = Execution::Completed;
        match &self.kind {
            StatementKind::CreateTable(s) => s.exec(conn, ctx).map(done),
            StatementKind::AlterTable(s) => s.exec(conn, ctx).map(done),
            StatementKind::DropTable(s) => s.exec(conn, ctx).map(done),
            StatementKind::CreateGsi(s) => s.exec(conn, ctx).map(done),
            StatementKind::AlterGsi(s) => s.exec(conn, ctx).map(done),
            StatementKind::DropGsi(s) => s.exec(conn, ctx).map(done),
            StatementKind::Insert(s) | StatementKind::Update(s) | StatementKind::Delete(s) => {
                s.exec(conn, ctx, params)
            }
            StatementKind::ListTables
            | StatementKind::DescribeTable(_)
            | StatementKind::DescribeLocalIndex(_)
            | StatementKind::DescribeGlobalIndex(_)
            | StatementKind::Select(_) => Err(Error::Unsupported(format!(
                "{} is not supported by exec, please use query",
                self.kind.name()
            ))),
        }
    }

    fn query_inner(
        &self,
        ctx: Option<&CallContext>,
        params: &[Value],
    ) -> Result<Execution<ResultSet>> {
        self.check_params(params)?;
        debug!(statement = self.kind.name(), "query");
        let conn = self.conn;
        let done = Execution::Completed;
        match &self.kind {
            StatementKind::ListTables => table::list_tables(conn, ctx).map(done),
            StatementKind::DescribeTable(s) => s.query(conn, ctx).map(done),
            StatementKind::DescribeLocalIndex(s) => s.query_local(conn, ctx).map(done),
            StatementKind::DescribeGlobalIndex(s) => s.query_global(conn, ctx).map(done),
            StatementKind::Select(s) => s.query(conn, ctx, params),
            StatementKind::Update(s) | StatementKind::Delete(s) => s.query(conn, ctx, params),
            StatementKind::CreateTable(_)
            | StatementKind::AlterTable(_)
            | StatementKind::DropTable(_)
            | StatementKind::CreateGsi(_)
            | StatementKind::AlterGsi(_)
            | StatementKind::DropGsi(_)
            | StatementKind::Insert(_) => Err(Error::Unsupported(format!(
                "{} is not supported by query, please use exec",
                self.kind.name()
            ))),
        }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("query", &self.query)
            .field("num_input", &self.num_input)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A key attribute declared as `name:type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttr {
    pub name: String,
    pub attr_type: ScalarType,
}

impl KeyAttr {
    /// Parse `name:type`, splitting on the first colon only. `what` names the
    /// key in error messages.
    pub(crate) fn parse(spec: &str, what: &str) -> Result<Self> {
        let (name, attr_type) = spec.split_once(':').unwrap_or((spec, ""));
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "invalid {} <{}>: attribute name is empty",
                what, spec
            )));
        }
        Ok(Self {
            name: name.to_string(),
            attr_type: ScalarType::parse_for(attr_type, what)?,
        })
    }

    /// Read an optional key option such as `PK` or `SK`.
    pub(crate) fn from_option(opts: &WithOptions, key: &str, what: &str) -> Result<Option<Self>> {
        match opts.values(key).first() {
            Some(spec) => Self::parse(spec, what).map(Some),
            None => Ok(None),
        }
    }
}

/// Billing requested by the `RCU`/`WCU` options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    OnDemand,
    Provisioned(ProvisionedThroughput),
}

impl Capacity {
    /// Both absent or zero selects on-demand billing; both positive selects
    /// provisioned capacity. Anything else is rejected.
    pub(crate) fn from_options(opts: &WithOptions) -> Result<Self> {
        let rcu = capacity_units(opts, "RCU")?;
        let wcu = capacity_units(opts, "WCU")?;
        match (rcu, wcu) {
            (0, 0) => Ok(Capacity::OnDemand),
            (r, w) if r > 0 && w > 0 => Ok(Capacity::Provisioned(ProvisionedThroughput {
                read_capacity_units: r,
                write_capacity_units: w,
            })),
            (r, w) => Err(Error::InvalidArgument(format!(
                "RCU and WCU must be specified together, got RCU={} and WCU={}",
                r, w
            ))),
        }
    }

    pub fn throughput(&self) -> Option<ProvisionedThroughput> {
        match self {
            Capacity::OnDemand => None,
            Capacity::Provisioned(t) => Some(*t),
        }
    }
}

fn capacity_units(opts: &WithOptions, key: &str) -> Result<i64> {
    match opts.first_int(key) {
        None => Ok(0),
        Some(Ok(n)) if n >= 0 => Ok(n),
        Some(Ok(n)) => Err(Error::InvalidArgument(format!("invalid {} value: {}", key, n))),
        Some(Err(raw)) => Err(Error::InvalidArgument(format!(
            "invalid {} value: {}",
            key, raw
        ))),
    }
}

/// Result of a DDL remote call, with `masked` errors reported as a
/// successful no-op.
pub(crate) fn ddl_result<T>(
    result: Result<T>,
    masked: impl Fn(&Error) -> bool,
    what: &str,
) -> Result<ExecResult> {
    match result {
        Ok(_) => Ok(ExecResult::new(true, 1)),
        Err(e) if masked(&e) => {
            debug!(statement = what, error = %e, "error ignored by idempotency flag");
            Ok(ExecResult::new(true, 0))
        }
        Err(e) => Err(e),
    }
}

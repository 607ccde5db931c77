/// Statement results
///
/// `ExecResult` is what mutating statements return. `ResultSet` is the lazy,
/// paginated row cursor returned by queries: it holds one page of items at a
/// time and fetches the next page with the previous continuation token when
/// the buffer runs dry.

use keysql_core::table::{ListTablesOutput, ListTablesRequest};
use keysql_core::{
    AttributeValue, CallContext, Error, ExecuteStatementOutput, ExecuteStatementRequest, Item,
    RemoteExecutor, Result, Value, ValueKind,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Column name used by single-column listings such as `LIST TABLES`
pub const LIST_COLUMN: &str = "$1";

/// Result of a statement that produces no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    successful: bool,
    rows_affected: u64,
}

impl ExecResult {
    pub(crate) fn new(successful: bool, rows_affected: u64) -> Self {
        Self {
            successful,
            rows_affected,
        }
    }

    /// The remote call succeeded, or its failure was masked by `IF [NOT] EXISTS`
    pub fn is_successful(&self) -> bool {
        self.successful
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

/// Inferred type information for one result column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnType {
    /// Native kind the column's values decode to
    pub kind: ValueKind,
    /// Store type tag (`S`, `N`, `B`, `SS`, `NS`, `BS`, `BOOL`, `NULL`, `L`, `M`)
    pub source_type: &'static str,
}

/// One row of a result set, aligned with the result set's columns
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Row {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Where further pages come from
enum PageSource {
    Statement {
        executor: Arc<dyn RemoteExecutor>,
        ctx: Option<CallContext>,
        timeout: Duration,
        request: ExecuteStatementRequest,
    },
    TableList {
        executor: Arc<dyn RemoteExecutor>,
        ctx: Option<CallContext>,
        timeout: Duration,
        request: ListTablesRequest,
    },
    /// Everything was delivered up front
    Realized,
}

impl PageSource {
    fn fetch(&mut self, token: String) -> Result<(Vec<Item>, Option<String>)> {
        match self {
            PageSource::Statement {
                executor,
                ctx,
                timeout,
                request,
            } => {
                request.next_token = Some(token);
                let ctx = ctx
                    .clone()
                    .unwrap_or_else(|| CallContext::with_timeout(*timeout));
                ctx.check()?;
                debug!(statement = %request.statement, "fetching next page");
                let output = executor.execute_statement(&ctx, request)?;
                Ok((output.items, output.next_token))
            }
            PageSource::TableList {
                executor,
                ctx,
                timeout,
                request,
            } => {
                request.exclusive_start_table_name = Some(token);
                let ctx = ctx
                    .clone()
                    .unwrap_or_else(|| CallContext::with_timeout(*timeout));
                ctx.check()?;
                debug!("fetching next table listing page");
                let output = executor.list_tables(&ctx, request)?;
                Ok(table_list_page(output))
            }
            PageSource::Realized => Ok((Vec::new(), None)),
        }
    }
}

fn table_list_page(output: ListTablesOutput) -> (Vec<Item>, Option<String>) {
    let items = output
        .table_names
        .into_iter()
        .map(|name| {
            let mut item = Item::new();
            item.insert(LIST_COLUMN.to_string(), AttributeValue::S(name));
            item
        })
        .collect();
    (items, output.last_evaluated_table_name)
}

struct CursorState {
    source: PageSource,
    items: VecDeque<Item>,
    next_token: Option<String>,
    read: u64,
    fetches: u64,
    columns: Arc<Vec<String>>,
    column_types: HashMap<String, ColumnType>,
    discovered: bool,
    fixed_columns: bool,
    exhausted: bool,
    closed: bool,
    error: Option<Error>,
}

impl CursorState {
    /// Record columns and their types from the first non-empty page.
    fn discover(&mut self) {
        if self.discovered || self.items.is_empty() {
            return;
        }
        let mut names: Vec<String> = Vec::new();
        for item in &self.items {
            for (col, attr) in item {
                if !self.column_types.contains_key(col) {
                    self.column_types.insert(
                        col.clone(),
                        ColumnType {
                            kind: ValueKind::of(attr),
                            source_type: attr.type_name(),
                        },
                    );
                    names.push(col.clone());
                }
            }
        }
        if !self.fixed_columns {
            names.sort();
            self.columns = Arc::new(names);
        }
        self.discovered = true;
    }

    fn to_row(&self, item: &Item) -> Result<Row> {
        let mut values = Vec::with_capacity(self.columns.len());
        for col in self.columns.iter() {
            let value = match item.get(col) {
                Some(attr) => Value::from_attribute(attr).map_err(|e| {
                    Error::Codec(format!("cannot decode column <{}>: {}", col, codec_message(e)))
                })?,
                None => Value::Null,
            };
            values.push(value);
        }
        Ok(Row {
            columns: self.columns.clone(),
            values,
        })
    }
}

pub(crate) fn codec_message(e: Error) -> String {
    match e {
        Error::Codec(msg) => msg,
        other => other.to_string(),
    }
}

/// Lazy, paginated row cursor.
///
/// Rows come out in remote page order, then in-page order. Concurrent calls
/// to [`ResultSet::next_row`] are serialized. Once a declared row limit is
/// reached the cursor reports exhaustion without any further remote call; the
/// page that completes the limit is fetched whole and its surplus rows are
/// dropped.
pub struct ResultSet {
    limit: Option<u64>,
    state: Mutex<CursorState>,
    iter_failed: bool,
}

impl ResultSet {
    fn new(
        source: PageSource,
        items: Vec<Item>,
        next_token: Option<String>,
        limit: Option<u64>,
        columns: Option<Vec<String>>,
    ) -> Self {
        let fixed_columns = columns.is_some();
        let mut state = CursorState {
            source,
            items: items.into(),
            next_token,
            read: 0,
            fetches: 0,
            columns: Arc::new(columns.unwrap_or_default()),
            column_types: HashMap::new(),
            discovered: false,
            fixed_columns,
            exhausted: false,
            closed: false,
            error: None,
        };
        state.discover();
        Self {
            limit: limit.filter(|l| *l > 0),
            state: Mutex::new(state),
            iter_failed: false,
        }
    }

    /// Cursor over the output of an executed statement.
    pub(crate) fn from_statement(
        executor: Arc<dyn RemoteExecutor>,
        ctx: Option<CallContext>,
        timeout: Duration,
        request: ExecuteStatementRequest,
        output: ExecuteStatementOutput,
        limit: Option<u64>,
        columns: Option<Vec<String>>,
    ) -> Self {
        let source = PageSource::Statement {
            executor,
            ctx,
            timeout,
            request,
        };
        Self::new(source, output.items, output.next_token, limit, columns)
    }

    /// Cursor over a table listing that follows the listing's continuation token.
    pub(crate) fn from_table_list(
        executor: Arc<dyn RemoteExecutor>,
        ctx: Option<CallContext>,
        timeout: Duration,
        request: ListTablesRequest,
        output: ListTablesOutput,
    ) -> Self {
        let (items, token) = table_list_page(output);
        let source = PageSource::TableList {
            executor,
            ctx,
            timeout,
            request,
        };
        Self::new(source, items, token, None, Some(vec![LIST_COLUMN.to_string()]))
    }

    /// Cursor over rows that were fully delivered in one response; never fetches.
    pub(crate) fn from_items(items: Vec<Item>, columns: Option<Vec<String>>) -> Self {
        Self::new(PageSource::Realized, items, None, None, columns)
    }

    /// Column names. Empty until the first non-empty page has been seen,
    /// unless the statement enumerated its output columns.
    pub fn columns(&self) -> Vec<String> {
        self.state.lock().columns.as_ref().clone()
    }

    /// Inferred type of the column at `index`, if any row carried it.
    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        let state = self.state.lock();
        let name = state.columns.get(index)?;
        state.column_types.get(name).copied()
    }

    /// Store type tag of the column at `index`, or `""` if unknown.
    pub fn column_source_type(&self, index: usize) -> &'static str {
        self.column_type(index).map(|t| t.source_type).unwrap_or("")
    }

    /// Rows delivered so far
    pub fn rows_read(&self) -> u64 {
        self.state.lock().read
    }

    /// Remote page fetches issued after the initial response
    pub fn pages_fetched(&self) -> u64 {
        self.state.lock().fetches
    }

    /// Advance the cursor. `Ok(None)` signals exhaustion and keeps doing so on
    /// every later call. A remote failure is sticky: later calls return the
    /// same error without contacting the store.
    pub fn next_row(&self) -> Result<Option<Row>> {
        let mut state = self.state.lock();
        loop {
            if let Some(err) = &state.error {
                return Err(err.clone());
            }
            if state.closed || state.exhausted {
                return Ok(None);
            }
            if let Some(limit) = self.limit {
                if state.read >= limit {
                    debug!(limit, "row limit reached");
                    state.exhausted = true;
                    state.items.clear();
                    state.next_token = None;
                    return Ok(None);
                }
            }
            if let Some(item) = state.items.pop_front() {
                state.read += 1;
                return state.to_row(&item).map(Some);
            }
            let Some(token) = state.next_token.take() else {
                state.exhausted = true;
                return Ok(None);
            };
            state.fetches += 1;
            match state.source.fetch(token) {
                Ok((items, next_token)) => {
                    state.items = items.into();
                    state.next_token = next_token;
                    state.discover();
                }
                Err(e) => {
                    state.error = Some(e.clone());
                    return Err(e);
                }
            }
        }
    }

    /// Release the buffered page. Idempotent; later reads report exhaustion.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.items.clear();
        state.next_token = None;
    }

    /// Drain every remaining row.
    pub fn collect_rows(&self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Iterator for ResultSet {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter_failed {
            return None;
        }
        let next = self.next_row().transpose();
        if matches!(next, Some(Err(_))) {
            self.iter_failed = true;
        }
        next
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResultSet")
            .field("columns", &state.columns)
            .field("buffered", &state.items.len())
            .field("read", &state.read)
            .field("limit", &self.limit)
            .field("exhausted", &state.exhausted)
            .finish()
    }
}

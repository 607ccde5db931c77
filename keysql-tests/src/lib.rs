/// Test utilities for keysql
///
/// `MockExecutor` stands in for the remote store. Statement output is
/// scripted page by page, table management is backed by an in-memory
/// catalog, and every call is recorded so tests can assert on what reached
/// the remote side.

use keysql_api::Connection;
use keysql_core::table::{
    CreateTableRequest, GlobalSecondaryIndexUpdate, IndexDescription, ListTablesOutput,
    ListTablesRequest, TableDescription, UpdateTableRequest,
};
use keysql_core::{
    AttributeValue, CallContext, ConsumedCapacity, Error, ExecuteStatementOutput,
    ExecuteStatementRequest, ExecuteTransactionOutput, ExecuteTransactionRequest, Item,
    ItemResponse, RemoteExecutor, Result,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// One recorded remote call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ExecuteStatement(ExecuteStatementRequest),
    ExecuteTransaction(ExecuteTransactionRequest),
    CreateTable(CreateTableRequest),
    DescribeTable(String),
    UpdateTable(UpdateTableRequest),
    DeleteTable(String),
    ListTables(ListTablesRequest),
}

#[derive(Default)]
struct MockState {
    /// Scripted statement output keyed by (statement, continuation token)
    pages: HashMap<(String, Option<String>), ExecuteStatementOutput>,
    statement_errors: HashMap<String, Error>,
    page_errors: HashMap<(String, Option<String>), Error>,
    transaction_results: VecDeque<Result<ExecuteTransactionOutput>>,
    tables: BTreeMap<String, TableDescription>,
    list_page_size: Option<usize>,
    calls: Vec<Call>,
}

/// Scripted, call-recording remote executor
#[derive(Default)]
pub struct MockExecutor {
    state: Mutex<MockState>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the output for `statement` when fetched with `token`.
    pub fn script_page(
        &self,
        statement: &str,
        token: Option<&str>,
        items: Vec<Item>,
        next_token: Option<&str>,
    ) {
        self.state.lock().pages.insert(
            (statement.to_string(), token.map(String::from)),
            ExecuteStatementOutput {
                items,
                next_token: next_token.map(String::from),
                consumed_capacity: None,
            },
        );
    }

    /// Script `pages` as a chain linked by generated tokens `p1`, `p2`, ...
    pub fn script_pages(&self, statement: &str, pages: Vec<Vec<Item>>) {
        let count = pages.len();
        for (i, items) in pages.into_iter().enumerate() {
            let token = (i > 0).then(|| format!("p{}", i));
            let next = (i + 1 < count).then(|| format!("p{}", i + 1));
            self.script_page(statement, token.as_deref(), items, next.as_deref());
        }
    }

    /// Every execution of `statement` fails with `error`.
    pub fn fail_statement(&self, statement: &str, error: Error) {
        self.state
            .lock()
            .statement_errors
            .insert(statement.to_string(), error);
    }

    /// Fetching `statement` with continuation `token` fails with `error`.
    pub fn fail_page(&self, statement: &str, token: &str, error: Error) {
        self.state
            .lock()
            .page_errors
            .insert((statement.to_string(), Some(token.to_string())), error);
    }

    /// Result of the next transaction submission. Unscripted submissions
    /// succeed with one empty response per statement.
    pub fn push_transaction_result(&self, result: Result<ExecuteTransactionOutput>) {
        self.state.lock().transaction_results.push_back(result);
    }

    /// Register a table directly in the catalog.
    pub fn add_table(&self, description: TableDescription) {
        self.state
            .lock()
            .tables
            .insert(description.table_name.clone(), description);
    }

    pub fn table(&self, name: &str) -> Option<TableDescription> {
        self.state.lock().tables.get(name).cloned()
    }

    /// Maximum number of names per `list_tables` page
    pub fn set_list_page_size(&self, size: usize) {
        self.state.lock().list_page_size = Some(size);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn statement_requests(&self) -> Vec<ExecuteStatementRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::ExecuteStatement(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn transaction_requests(&self) -> Vec<ExecuteTransactionRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::ExecuteTransaction(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

fn not_found(table: &str) -> Error {
    Error::ResourceNotFound(format!("Requested resource not found: Table: {} not found", table))
}

impl RemoteExecutor for MockExecutor {
    fn execute_statement(
        &self,
        ctx: &CallContext,
        request: &ExecuteStatementRequest,
    ) -> Result<ExecuteStatementOutput> {
        ctx.check()?;
        let mut state = self.state.lock();
        state.calls.push(Call::ExecuteStatement(request.clone()));
        if let Some(err) = state.statement_errors.get(&request.statement) {
            return Err(err.clone());
        }
        let key = (request.statement.clone(), request.next_token.clone());
        if let Some(err) = state.page_errors.get(&key) {
            return Err(err.clone());
        }
        Ok(state.pages.get(&key).cloned().unwrap_or_default())
    }

    fn execute_transaction(
        &self,
        ctx: &CallContext,
        request: &ExecuteTransactionRequest,
    ) -> Result<ExecuteTransactionOutput> {
        ctx.check()?;
        let mut state = self.state.lock();
        state.calls.push(Call::ExecuteTransaction(request.clone()));
        match state.transaction_results.pop_front() {
            Some(result) => result,
            None => Ok(ExecuteTransactionOutput {
                responses: vec![ItemResponse::default(); request.statements.len()],
                consumed_capacity: (0..request.statements.len())
                    .map(|_| ConsumedCapacity {
                        table_name: None,
                        capacity_units: 1.0,
                    })
                    .collect(),
            }),
        }
    }

    fn create_table(
        &self,
        ctx: &CallContext,
        request: &CreateTableRequest,
    ) -> Result<TableDescription> {
        ctx.check()?;
        let mut state = self.state.lock();
        state.calls.push(Call::CreateTable(request.clone()));
        if state.tables.contains_key(&request.table_name) {
            return Err(Error::ResourceInUse(format!(
                "Table already exists: {}",
                request.table_name
            )));
        }
        let description = TableDescription {
            table_name: request.table_name.clone(),
            table_status: "ACTIVE".to_string(),
            attribute_definitions: request.attribute_definitions.clone(),
            key_schema: request.key_schema.clone(),
            billing_mode: Some(request.billing_mode),
            provisioned_throughput: request.provisioned_throughput,
            item_count: Some(0),
            local_secondary_indexes: request
                .local_secondary_indexes
                .iter()
                .map(|lsi| IndexDescription {
                    index_name: lsi.index_name.clone(),
                    key_schema: lsi.key_schema.clone(),
                    projection: lsi.projection.clone(),
                    index_status: None,
                    provisioned_throughput: None,
                    item_count: Some(0),
                })
                .collect(),
            global_secondary_indexes: Vec::new(),
        };
        state
            .tables
            .insert(request.table_name.clone(), description.clone());
        Ok(description)
    }

    fn describe_table(&self, ctx: &CallContext, table_name: &str) -> Result<TableDescription> {
        ctx.check()?;
        let mut state = self.state.lock();
        state.calls.push(Call::DescribeTable(table_name.to_string()));
        state
            .tables
            .get(table_name)
            .cloned()
            .ok_or_else(|| not_found(table_name))
    }

    fn update_table(
        &self,
        ctx: &CallContext,
        request: &UpdateTableRequest,
    ) -> Result<TableDescription> {
        ctx.check()?;
        let mut state = self.state.lock();
        state.calls.push(Call::UpdateTable(request.clone()));
        let table = state
            .tables
            .get_mut(&request.table_name)
            .ok_or_else(|| not_found(&request.table_name))?;

        if let Some(mode) = request.billing_mode {
            table.billing_mode = Some(mode);
            table.provisioned_throughput = request.provisioned_throughput;
        }
        for def in &request.attribute_definitions {
            if !table
                .attribute_definitions
                .iter()
                .any(|d| d.attribute_name == def.attribute_name)
            {
                table.attribute_definitions.push(def.clone());
            }
        }
        for update in &request.global_secondary_index_updates {
            match update {
                GlobalSecondaryIndexUpdate::Create {
                    index_name,
                    key_schema,
                    projection,
                    provisioned_throughput,
                } => {
                    if table.global_index(index_name).is_some() {
                        return Err(Error::ResourceInUse(format!(
                            "Index already exists: {}",
                            index_name
                        )));
                    }
                    table.global_secondary_indexes.push(IndexDescription {
                        index_name: index_name.clone(),
                        key_schema: key_schema.clone(),
                        projection: projection.clone(),
                        index_status: Some("ACTIVE".to_string()),
                        provisioned_throughput: *provisioned_throughput,
                        item_count: Some(0),
                    });
                }
                GlobalSecondaryIndexUpdate::Update {
                    index_name,
                    provisioned_throughput,
                } => {
                    let index = table
                        .global_secondary_indexes
                        .iter_mut()
                        .find(|i| &i.index_name == index_name)
                        .ok_or_else(|| {
                            Error::ResourceNotFound(format!("Index not found: {}", index_name))
                        })?;
                    index.provisioned_throughput = Some(*provisioned_throughput);
                }
                GlobalSecondaryIndexUpdate::Delete { index_name } => {
                    let before = table.global_secondary_indexes.len();
                    table
                        .global_secondary_indexes
                        .retain(|i| &i.index_name != index_name);
                    if table.global_secondary_indexes.len() == before {
                        return Err(Error::ResourceNotFound(format!(
                            "Index not found: {}",
                            index_name
                        )));
                    }
                }
            }
        }
        Ok(table.clone())
    }

    fn delete_table(&self, ctx: &CallContext, table_name: &str) -> Result<TableDescription> {
        ctx.check()?;
        let mut state = self.state.lock();
        state.calls.push(Call::DeleteTable(table_name.to_string()));
        state
            .tables
            .remove(table_name)
            .ok_or_else(|| not_found(table_name))
    }

    fn list_tables(
        &self,
        ctx: &CallContext,
        request: &ListTablesRequest,
    ) -> Result<ListTablesOutput> {
        ctx.check()?;
        let mut state = self.state.lock();
        state.calls.push(Call::ListTables(request.clone()));
        let page_size = request
            .limit
            .map(|l| l as usize)
            .or(state.list_page_size)
            .unwrap_or(usize::MAX);
        let remaining: Vec<String> = state
            .tables
            .keys()
            .filter(|name| match &request.exclusive_start_table_name {
                Some(start) => *name > start,
                None => true,
            })
            .cloned()
            .collect();
        let table_names: Vec<String> = remaining.iter().take(page_size).cloned().collect();
        let last_evaluated_table_name = if remaining.len() > table_names.len() {
            table_names.last().cloned()
        } else {
            None
        };
        Ok(ListTablesOutput {
            table_names,
            last_evaluated_table_name,
        })
    }
}

/// A connection over a fresh mock executor
pub fn mock_connection() -> (Arc<MockExecutor>, Connection) {
    let mock = Arc::new(MockExecutor::new());
    let conn = Connection::new(mock.clone());
    (mock, conn)
}

/// Build an item from name/attribute pairs
pub fn item(pairs: &[(&str, AttributeValue)]) -> Item {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// `count` items `{id: N, name: S}` starting at id `start`
pub fn numbered_items(start: usize, count: usize) -> Vec<Item> {
    (start..start + count)
        .map(|i| {
            item(&[
                ("id", AttributeValue::number(i)),
                ("name", AttributeValue::string(format!("item{}", i))),
            ])
        })
        .collect()
}

/// Install a test-friendly tracing subscriber; honors `RUST_LOG`. Safe to
/// call from every test, only the first call installs it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

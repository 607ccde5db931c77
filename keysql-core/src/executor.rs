/// Remote executor contract
///
/// The store is reached only through this trait. Implementations wrap the
/// actual service client; this workspace never talks to the network itself.

use crate::table::{
    CreateTableRequest, ListTablesOutput, ListTablesRequest, TableDescription, UpdateTableRequest,
};
use crate::{AttributeValue, CallContext, Item, Result};
use serde::{Deserialize, Serialize};

/// Request to run one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteStatementRequest {
    pub statement: String,
    pub parameters: Vec<AttributeValue>,
    /// Page size requested from the store
    pub limit: Option<u32>,
    pub consistent_read: Option<bool>,
    /// Continuation token from the previous page
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsumedCapacity {
    pub table_name: Option<String>,
    pub capacity_units: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteStatementOutput {
    pub items: Vec<Item>,
    /// Continuation token; `None` when there are no further pages
    pub next_token: Option<String>,
    pub consumed_capacity: Option<ConsumedCapacity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedStatement {
    pub statement: String,
    pub parameters: Vec<AttributeValue>,
}

/// Request to run several statements as one all-or-nothing batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteTransactionRequest {
    pub statements: Vec<ParameterizedStatement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemResponse {
    pub item: Option<Item>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteTransactionOutput {
    /// One entry per statement, in request order
    pub responses: Vec<ItemResponse>,
    /// One entry per statement, in request order
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

/// Operations the remote store exposes.
///
/// Implementations must honor the deadline and cancellation flag of the
/// supplied context for the duration of the call. Failures are reported with
/// the remote variants of [`crate::Error`]; in particular an existing resource
/// must surface as `ResourceInUse` and a missing one as `ResourceNotFound`.
pub trait RemoteExecutor: Send + Sync {
    fn execute_statement(
        &self,
        ctx: &CallContext,
        request: &ExecuteStatementRequest,
    ) -> Result<ExecuteStatementOutput>;

    fn execute_transaction(
        &self,
        ctx: &CallContext,
        request: &ExecuteTransactionRequest,
    ) -> Result<ExecuteTransactionOutput>;

    fn create_table(&self, ctx: &CallContext, request: &CreateTableRequest)
        -> Result<TableDescription>;

    fn describe_table(&self, ctx: &CallContext, table_name: &str) -> Result<TableDescription>;

    fn update_table(&self, ctx: &CallContext, request: &UpdateTableRequest)
        -> Result<TableDescription>;

    fn delete_table(&self, ctx: &CallContext, table_name: &str) -> Result<TableDescription>;

    fn list_tables(&self, ctx: &CallContext, request: &ListTablesRequest)
        -> Result<ListTablesOutput>;
}

pub mod error;
pub mod types;
pub mod config;
pub mod context;
pub mod table;
pub mod executor;
pub mod dialect;

pub use error::{Error, Result};
pub use types::*;
pub use config::ConnectionConfig;
pub use context::CallContext;
pub use executor::{
    ConsumedCapacity, ExecuteStatementOutput, ExecuteStatementRequest, ExecuteTransactionOutput,
    ExecuteTransactionRequest, ItemResponse, ParameterizedStatement, RemoteExecutor,
};

pub use keysql_core::{
    CallContext, ConnectionConfig, Error as KeysqlError, Item, Result, Value, ValueKind,
};

mod grammar;
pub use grammar::parse_kind;

pub mod connection;
pub use connection::Connection;

pub mod statement;
pub use statement::{Capacity, KeyAttr, Statement, StatementKind};

pub mod transaction;
pub use transaction::{Execution, PendingOutput, Transaction, TxMode};

pub mod result;
pub use result::{ColumnType, ExecResult, ResultSet, Row, LIST_COLUMN};

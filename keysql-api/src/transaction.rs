/// Transactions over a connection
///
/// While a transaction is open every executable statement run on the
/// connection is queued instead of sent. Commit submits the queue as one
/// atomic batch; rollback drops it without contacting the store.

use crate::result::{ExecResult, ResultSet};
use crate::Connection;
use keysql_core::{CallContext, ConsumedCapacity, Error, ExecuteStatementOutput, Result};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Transaction state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    None,
    Started,
    Committing,
    RollingBack,
}

/// Output of a queued statement, filled in when its transaction commits.
///
/// A failed commit fills the slot with the commit error instead. Clones share
/// the same slot.
#[derive(Debug, Clone)]
pub struct PendingOutput {
    slot: Arc<OnceLock<Result<ExecuteStatementOutput>>>,
    columns: Option<Vec<String>>,
}

impl PendingOutput {
    pub(crate) fn new(columns: Option<Vec<String>>) -> Self {
        Self {
            slot: Arc::new(OnceLock::new()),
            columns,
        }
    }

    pub(crate) fn fill(&self, output: ExecuteStatementOutput) {
        self.settle(Ok(output));
    }

    /// Record that the owning transaction did not commit.
    pub(crate) fn fail(&self, error: Error) {
        self.settle(Err(error));
    }

    fn settle(&self, outcome: Result<ExecuteStatementOutput>) {
        if self.slot.set(outcome).is_err() {
            debug!("queued statement outcome already set");
        }
    }

    /// True once the owning transaction committed successfully
    pub fn is_ready(&self) -> bool {
        matches!(self.slot.get(), Some(Ok(_)))
    }

    /// True once the owning transaction failed to commit
    pub fn is_aborted(&self) -> bool {
        matches!(self.slot.get(), Some(Err(_)))
    }

    pub fn output(&self) -> Option<&ExecuteStatementOutput> {
        self.slot.get()?.as_ref().ok()
    }

    pub fn consumed_capacity(&self) -> Option<&ConsumedCapacity> {
        self.output()?.consumed_capacity.as_ref()
    }

    /// Committed output. `TransactionInProgress` while still queued, the
    /// commit error once the batch was aborted.
    fn settled(&self) -> Result<&ExecuteStatementOutput> {
        match self.slot.get() {
            None => Err(Error::TransactionInProgress),
            Some(Ok(output)) => Ok(output),
            Some(Err(e)) => Err(e.clone()),
        }
    }

    /// Affected-row result of the committed statement
    pub fn exec_result(&self) -> Result<ExecResult> {
        self.settled().map(|_| ExecResult::new(true, 1))
    }

    /// Rows returned for the committed statement. A transaction batch is
    /// fully realized in one response, so this cursor never paginates.
    pub fn result_set(&self) -> Result<ResultSet> {
        let output = self.settled()?;
        Ok(ResultSet::from_items(
            output.items.clone(),
            self.columns.clone(),
        ))
    }
}

/// Outcome of running a statement: either it completed, or it was queued in
/// the connection's open transaction.
#[derive(Debug)]
pub enum Execution<T> {
    Completed(T),
    Queued(PendingOutput),
}

impl<T> Execution<T> {
    pub fn is_queued(&self) -> bool {
        matches!(self, Execution::Queued(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Execution::Completed(v) => Some(v),
            Execution::Queued(_) => None,
        }
    }

    pub fn pending(self) -> Option<PendingOutput> {
        match self {
            Execution::Completed(_) => None,
            Execution::Queued(p) => Some(p),
        }
    }

    /// The completed value; a queued statement reports `TransactionInProgress`.
    pub fn into_completed(self) -> Result<T> {
        match self {
            Execution::Completed(v) => Ok(v),
            Execution::Queued(_) => Err(Error::TransactionInProgress),
        }
    }
}

/// Handle to the open transaction of a connection.
///
/// Dropping the handle without committing rolls the transaction back.
#[derive(Debug)]
pub struct Transaction<'c> {
    conn: &'c Connection,
    id: u64,
}

impl<'c> Transaction<'c> {
    pub(crate) fn new(conn: &'c Connection, id: u64) -> Self {
        Self { conn, id }
    }

    /// Submit every queued statement as one atomic batch.
    pub fn commit(&self) -> Result<()> {
        self.conn.commit_tx(self.id, None)
    }

    /// Like [`Transaction::commit`], bounded by the caller's context.
    pub fn commit_context(&self, ctx: &CallContext) -> Result<()> {
        self.conn.commit_tx(self.id, Some(ctx))
    }

    /// Discard every queued statement. No remote call is made.
    pub fn rollback(&self) -> Result<()> {
        self.conn.rollback_tx(self.id)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.conn.is_open_tx(self.id) {
            return;
        }
        if let Err(e) = self.conn.rollback_tx(self.id) {
            warn!(error = %e, "failed to roll back dropped transaction");
        }
    }
}

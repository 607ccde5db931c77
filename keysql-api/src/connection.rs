/// Connection to a remote store
///
/// A connection owns the executor handle, its configuration and the
/// transaction state. Statements borrow the connection they were prepared on.

use crate::grammar;
use crate::result::{codec_message, ExecResult, ResultSet};
use crate::statement::Statement;
use crate::transaction::{Execution, PendingOutput, Transaction, TxMode};
use keysql_core::{
    AttributeValue, CallContext, ConnectionConfig, Error, ExecuteStatementOutput,
    ExecuteStatementRequest, ExecuteTransactionOutput, ExecuteTransactionRequest, ParameterizedStatement, RemoteExecutor,
    Result, Value,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A statement waiting in an open transaction
struct QueuedStatement {
    statement: String,
    params: Vec<Value>,
    pending: PendingOutput,
}

struct TxState {
    mode: TxMode,
    /// Incremented by every begin, so a stale handle cannot touch a newer transaction
    id: u64,
    queue: Vec<QueuedStatement>,
}

/// A statement that was sent to the store, with the request that produced
/// `output` (needed to fetch further pages).
pub(crate) struct Executed {
    pub request: ExecuteStatementRequest,
    pub output: ExecuteStatementOutput,
}

/// Parameters for running one executable statement
pub(crate) struct RunSpec<'a> {
    pub statement: &'a str,
    pub limit: Option<u32>,
    pub consistent_read: Option<bool>,
    pub columns: Option<Vec<String>>,
}

pub struct Connection {
    executor: Arc<dyn RemoteExecutor>,
    config: ConnectionConfig,
    tx: Mutex<TxState>,
}

impl Connection {
    /// Create a connection with the default configuration
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self::with_config(executor, ConnectionConfig::default())
    }

    pub fn with_config(executor: Arc<dyn RemoteExecutor>, config: ConnectionConfig) -> Self {
        Self {
            executor,
            config,
            tx: Mutex::new(TxState {
                mode: TxMode::None,
                id: 0,
                queue: Vec::new(),
            }),
        }
    }

    /// Create a connection configured by a `key=value;...` string.
    pub fn open(executor: Arc<dyn RemoteExecutor>, conn_str: &str) -> Result<Self> {
        let config = ConnectionConfig::from_conn_string(conn_str);
        config.validate().map_err(Error::InvalidArgument)?;
        debug!(timeout_ms = config.timeout.as_millis() as u64, "connection opened");
        Ok(Self::with_config(executor, config))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub(crate) fn executor(&self) -> &Arc<dyn RemoteExecutor> {
        &self.executor
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Parse and validate a statement.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use keysql_api::Connection;
    /// # fn example(conn: &Connection) -> keysql_core::Result<()> {
    /// let stmt = conn.prepare("CREATE TABLE IF NOT EXISTS users WITH PK=id:string")?;
    /// stmt.exec(&[])?;
    ///
    /// let stmt = conn.prepare("SELECT * FROM users WHERE id=?")?;
    /// let rows = stmt.query(&["user#1".into()])?.into_completed()?;
    /// for row in rows {
    ///     println!("{:?}", row?.values());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn prepare(&self, query: &str) -> Result<Statement<'_>> {
        grammar::parse_statement(self, query)
    }

    /// Prepare and run a statement that produces no rows
    pub fn execute(&self, query: &str, params: &[Value]) -> Result<Execution<ExecResult>> {
        self.prepare(query)?.exec(params)
    }

    /// Prepare and run a statement that produces rows
    pub fn query(&self, query: &str, params: &[Value]) -> Result<Execution<ResultSet>> {
        self.prepare(query)?.query(params)
    }

    /// Start a transaction. Fails if one is already open on this connection.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        let mut tx = self.tx.lock();
        if tx.mode != TxMode::None {
            return Err(Error::TransactionInProgress);
        }
        tx.mode = TxMode::Started;
        tx.id += 1;
        tx.queue.clear();
        debug!(tx = tx.id, "transaction started");
        Ok(Transaction::new(self, tx.id))
    }

    pub fn tx_mode(&self) -> TxMode {
        self.tx.lock().mode
    }

    /// Roll back any open transaction.
    pub fn close(&self) -> Result<()> {
        let mut tx = self.tx.lock();
        match tx.mode {
            TxMode::None => Ok(()),
            TxMode::Committing => Err(Error::TransactionCommitting),
            TxMode::Started | TxMode::RollingBack => {
                let discarded = discard_queue(&mut tx.queue);
                tx.mode = TxMode::None;
                info!(discarded, "transaction rolled back on close");
                Ok(())
            }
        }
    }

    /// The caller's context, or one synthesized from the configured timeout.
    pub(crate) fn ensure_context(&self, ctx: Option<&CallContext>) -> CallContext {
        ctx.cloned()
            .unwrap_or_else(|| CallContext::with_timeout(self.config.timeout))
    }

    /// Send one executable statement, or queue it when a transaction is open.
    pub(crate) fn run_statement(
        &self,
        ctx: Option<&CallContext>,
        spec: RunSpec<'_>,
        params: &[Value],
    ) -> Result<Execution<Executed>> {
        {
            let mut tx = self.tx.lock();
            match tx.mode {
                TxMode::None => {}
                TxMode::Started => {
                    let pending = PendingOutput::new(spec.columns);
                    tx.queue.push(QueuedStatement {
                        statement: spec.statement.to_string(),
                        params: params.to_vec(),
                        pending: pending.clone(),
                    });
                    debug!(tx = tx.id, position = tx.queue.len(), "statement queued");
                    return Ok(Execution::Queued(pending));
                }
                TxMode::Committing | TxMode::RollingBack => {
                    return Err(Error::InvalidTransactionStage)
                }
            }
        }

        let request = ExecuteStatementRequest {
            statement: spec.statement.to_string(),
            parameters: bind_params(params)?,
            limit: spec.limit,
            consistent_read: spec.consistent_read,
            next_token: None,
        };
        let call_ctx = self.ensure_context(ctx);
        call_ctx.check()?;
        debug!(statement = %request.statement, params = params.len(), "executing statement");
        let output = self.executor.execute_statement(&call_ctx, &request)?;
        Ok(Execution::Completed(Executed { request, output }))
    }

    pub(crate) fn is_open_tx(&self, id: u64) -> bool {
        let tx = self.tx.lock();
        tx.id == id && tx.mode == TxMode::Started
    }

    pub(crate) fn commit_tx(&self, id: u64, ctx: Option<&CallContext>) -> Result<()> {
        let queue = {
            let mut tx = self.tx.lock();
            if tx.id != id {
                return Err(Error::NoTransaction);
            }
            match tx.mode {
                TxMode::None => return Err(Error::NoTransaction),
                TxMode::RollingBack => return Err(Error::TransactionRollingBack),
                TxMode::Committing => return Err(Error::TransactionCommitting),
                TxMode::Started => {}
            }
            tx.mode = TxMode::Committing;
            std::mem::take(&mut tx.queue)
        };
        // Whatever happens below, the connection leaves the transaction.
        let _reset = TxReset(self);

        if queue.is_empty() {
            info!(tx = id, "committed empty transaction");
            return Ok(());
        }

        let output = match self.submit(id, &queue, ctx) {
            Ok(output) => output,
            Err(e) => {
                for queued in &queue {
                    queued.pending.fail(e.clone());
                }
                return Err(e);
            }
        };

        for (i, queued) in queue.iter().enumerate() {
            let items = output
                .responses
                .get(i)
                .and_then(|r| r.item.clone())
                .map(|item| vec![item])
                .unwrap_or_default();
            queued.pending.fill(ExecuteStatementOutput {
                items,
                next_token: None,
                consumed_capacity: output.consumed_capacity.get(i).cloned(),
            });
        }
        info!(tx = id, statements = queue.len(), "transaction committed");
        Ok(())
    }

    /// Bind every queued statement and send the batch.
    fn submit(
        &self,
        id: u64,
        queue: &[QueuedStatement],
        ctx: Option<&CallContext>,
    ) -> Result<ExecuteTransactionOutput> {
        let mut statements = Vec::with_capacity(queue.len());
        for queued in queue {
            let parameters = bind_params(&queued.params).map_err(|e| {
                Error::Codec(format!(
                    "{} for statement <{}>",
                    codec_message(e),
                    queued.statement
                ))
            })?;
            statements.push(ParameterizedStatement {
                statement: queued.statement.clone(),
                parameters,
            });
        }

        let call_ctx = self.ensure_context(ctx);
        call_ctx.check()?;
        debug!(tx = id, statements = statements.len(), "submitting transaction");
        self.executor
            .execute_transaction(&call_ctx, &ExecuteTransactionRequest { statements })
            .map_err(|e| {
                warn!(tx = id, error = %e, "transaction commit failed");
                e
            })
    }

    pub(crate) fn rollback_tx(&self, id: u64) -> Result<()> {
        let mut tx = self.tx.lock();
        if tx.id != id {
            return Err(Error::NoTransaction);
        }
        match tx.mode {
            TxMode::None => Err(Error::NoTransaction),
            TxMode::Committing => Err(Error::TransactionCommitting),
            TxMode::Started | TxMode::RollingBack => {
                tx.mode = TxMode::RollingBack;
                let discarded = discard_queue(&mut tx.queue);
                tx.mode = TxMode::None;
                info!(tx = id, discarded, "transaction rolled back");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("tx_mode", &self.tx_mode())
            .finish()
    }
}

/// Resets the transaction state when dropped
struct TxReset<'a>(&'a Connection);

impl Drop for TxReset<'_> {
    fn drop(&mut self) {
        let mut tx = self.0.tx.lock();
        tx.mode = TxMode::None;
        tx.queue.clear();
    }
}

/// Drop the queue, settling each handle as belonging to no transaction.
fn discard_queue(queue: &mut Vec<QueuedStatement>) -> usize {
    for queued in queue.iter() {
        queued.pending.fail(Error::NoTransaction);
    }
    let discarded = queue.len();
    queue.clear();
    discarded
}

/// Encode positional parameters, naming the 1-based ordinal on failure.
pub(crate) fn bind_params(params: &[Value]) -> Result<Vec<AttributeValue>> {
    params
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.to_attribute().map_err(|e| {
                Error::Codec(format!(
                    "error marshalling parameter {}: {}",
                    i + 1,
                    codec_message(e)
                ))
            })
        })
        .collect()
}

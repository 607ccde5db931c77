use keysql_api::{Connection, ConnectionConfig, Value};
use keysql_core::{CallContext, Error};
use keysql_test_utils::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Error codes are stable
#[test]
fn test_error_codes() {
    assert_eq!(Error::InvalidQuery("q".into()).code(), "INVALID_QUERY");
    assert_eq!(Error::InvalidArgument("a".into()).code(), "INVALID_ARGUMENT");
    assert_eq!(Error::Unsupported("u".into()).code(), "UNSUPPORTED");
    assert_eq!(Error::TransactionInProgress.code(), "TRANSACTION_IN_PROGRESS");
    assert_eq!(Error::TransactionCommitting.code(), "TRANSACTION_COMMITTING");
    assert_eq!(Error::TransactionRollingBack.code(), "TRANSACTION_ROLLING_BACK");
    assert_eq!(Error::ResourceNotFound("t".into()).code(), "RESOURCE_NOT_FOUND");
    assert_eq!(Error::Timeout("t".into()).code(), "TIMEOUT");
}

#[test]
fn test_retryable_classification() {
    assert!(Error::Throttled("x".into()).is_retryable());
    assert!(Error::Connection("x".into()).is_retryable());
    assert!(!Error::ResourceInUse("x".into()).is_retryable());
    assert!(!Error::InvalidQuery("x".into()).is_retryable());
    assert!(!Error::Codec("x".into()).is_retryable());
}

/// Local errors are raised before anything reaches the store
#[test]
fn test_parameter_codec_error_names_ordinal() {
    let (mock, conn) = mock_connection();
    let err = conn
        .execute(
            "UPDATE t SET a=?, b=?, c=? WHERE id=?",
            &[Value::Int(1), Value::Bool(true), Value::Float(f64::NAN), Value::from("k")],
        )
        .unwrap_err();
    assert_eq!(err.code(), "CODEC_ERROR");
    assert!(err.to_string().contains("parameter 3"), "{}", err);
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn test_remote_error_is_surfaced_unchanged() {
    let (mock, conn) = mock_connection();
    let statement = "DELETE FROM t WHERE id=?";
    mock.fail_statement(
        statement,
        Error::ConditionalCheckFailed("The conditional request failed".into()),
    );
    let err = conn.execute(statement, &[Value::from("k")]).unwrap_err();
    assert_eq!(
        err,
        Error::ConditionalCheckFailed("The conditional request failed".into())
    );
    assert!(err.is_remote());

    // Nothing is retried
    assert_eq!(mock.call_count(), 1);
}

#[test]
fn test_expired_context_fails_before_call() {
    let (mock, conn) = mock_connection();
    let ctx = CallContext::with_deadline(Instant::now() - Duration::from_millis(1));

    let err = conn
        .prepare("DROP TABLE t")
        .unwrap()
        .exec_context(&ctx, &[])
        .unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");

    let err = conn
        .prepare("SELECT * FROM t")
        .unwrap()
        .query_context(&ctx, &[])
        .unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn test_cancelled_context_fails_commit() {
    let (mock, conn) = mock_connection();
    let tx = conn.begin().unwrap();
    conn.execute("INSERT INTO t VALUE {'id': ?}", &[Value::from("a")])
        .unwrap();

    let ctx = CallContext::background();
    ctx.cancel();
    let err = tx.commit_context(&ctx).unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
    assert_eq!(mock.call_count(), 0);
    assert!(tx.commit().is_err());
}

#[test]
fn test_masked_errors_are_exactly_the_named_ones() {
    let (_mock, conn) = mock_connection();
    // IF NOT EXISTS does not hide a missing table on GSI creation
    let err = conn
        .execute("CREATE GSI IF NOT EXISTS i ON ghost WITH PK=a:string", &[])
        .unwrap_err();
    assert_eq!(err.code(), "RESOURCE_NOT_FOUND");
}

#[test]
fn test_configured_timeout_is_used() -> anyhow::Result<()> {
    let config = ConnectionConfig::from_conn_string("Timeout=2500;Region=local");
    assert_eq!(config.timeout, Duration::from_millis(2500));

    let mock = Arc::new(MockExecutor::new());
    let conn = Connection::with_config(mock.clone(), config);
    assert_eq!(conn.config().timeout, Duration::from_millis(2500));

    conn.execute("CREATE TABLE t WITH PK=id:string", &[])?;
    assert!(mock.table("t").is_some());
    Ok(())
}

#[test]
fn test_open_rejects_zero_timeout() {
    let mock = Arc::new(MockExecutor::new());
    let err = Connection::open(mock.clone(), "T=0").unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENT");

    let conn = Connection::open(mock, "T=250").unwrap();
    assert_eq!(conn.config().timeout, Duration::from_millis(250));
}

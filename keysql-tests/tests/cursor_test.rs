use keysql_api::{Value, ValueKind};
use keysql_core::{AttributeValue, CallContext, Error};
use keysql_test_utils::*;
use std::time::Duration;

const SELECT_ALL: &str = "SELECT * FROM t";

/// Limit 5 over three pages of two rows: five rows, three remote calls
#[test]
fn test_limit_truncates_fetched_page() {
    let (mock, conn) = mock_connection();
    mock.script_pages(
        SELECT_ALL,
        vec![numbered_items(0, 2), numbered_items(2, 2), numbered_items(4, 2)],
    );

    let rs = conn
        .query("SELECT * FROM t WITH LIMIT=5", &[])
        .unwrap()
        .into_completed()
        .unwrap();
    let rows = rs.collect_rows().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(mock.call_count(), 3);

    // Exhausted for good, no further fetches
    assert!(rs.next_row().unwrap().is_none());
    assert!(rs.next_row().unwrap().is_none());
    assert_eq!(mock.call_count(), 3);
    assert_eq!(rs.rows_read(), 5);
}

#[test]
fn test_limit_is_sent_as_page_size() {
    let (mock, conn) = mock_connection();
    mock.script_pages(SELECT_ALL, vec![numbered_items(0, 1), numbered_items(1, 1)]);

    let rs = conn
        .query("SELECT * FROM t WITH LIMIT=10, WITH CONSISTENT_READ=true", &[])
        .unwrap()
        .into_completed()
        .unwrap();
    assert_eq!(rs.collect_rows().unwrap().len(), 2);

    let requests = mock.statement_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].statement, SELECT_ALL);
    assert_eq!(requests[0].limit, Some(10));
    assert_eq!(requests[0].consistent_read, Some(true));
    assert_eq!(requests[0].next_token, None);
    assert_eq!(requests[1].next_token.as_deref(), Some("p1"));
    assert_eq!(requests[1].limit, Some(10));
}

#[test]
fn test_rows_follow_page_order() {
    let (mock, conn) = mock_connection();
    mock.script_pages(
        SELECT_ALL,
        vec![numbered_items(0, 2), numbered_items(2, 2), numbered_items(4, 2)],
    );

    let rs = conn.query(SELECT_ALL, &[]).unwrap().into_completed().unwrap();
    let ids: Vec<i64> = rs
        .map(|row| row.unwrap().get_by_name("id").and_then(Value::as_i64).unwrap())
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(mock.call_count(), 3);
}

#[test]
fn test_columns_sorted_and_typed() {
    let (mock, conn) = mock_connection();
    mock.script_page(
        SELECT_ALL,
        None,
        vec![item(&[
            ("zeta", AttributeValue::Bool(true)),
            ("alpha", AttributeValue::number("1.5")),
            ("mid", AttributeValue::Ss(vec!["x".into()])),
        ])],
        None,
    );

    let rs = conn.query(SELECT_ALL, &[]).unwrap().into_completed().unwrap();
    assert_eq!(rs.columns(), vec!["alpha", "mid", "zeta"]);
    assert_eq!(rs.column_type(0).unwrap().kind, ValueKind::Float);
    assert_eq!(rs.column_source_type(1), "SS");
    assert_eq!(rs.column_type(1).unwrap().kind, ValueKind::List);
    assert_eq!(rs.column_type(2).unwrap().kind, ValueKind::Bool);
    assert_eq!(rs.column_source_type(7), "");
}

#[test]
fn test_enumerated_columns_keep_statement_order() {
    let (mock, conn) = mock_connection();
    let statement = "SELECT name, id FROM t";
    mock.script_page(statement, None, numbered_items(0, 1), None);

    let rs = conn.query(statement, &[]).unwrap().into_completed().unwrap();
    assert_eq!(rs.columns(), vec!["name", "id"]);
    let row = rs.next_row().unwrap().unwrap();
    assert_eq!(row.values(), &[Value::from("item0"), Value::Int(0)]);
}

#[test]
fn test_columns_discovered_on_later_page() {
    let (mock, conn) = mock_connection();
    mock.script_pages(SELECT_ALL, vec![Vec::new(), numbered_items(0, 1)]);

    let rs = conn.query(SELECT_ALL, &[]).unwrap().into_completed().unwrap();
    assert!(rs.columns().is_empty());
    let row = rs.next_row().unwrap().unwrap();
    assert_eq!(rs.columns(), vec!["id", "name"]);
    assert_eq!(row.get(0), Some(&Value::Int(0)));
}

#[test]
fn test_missing_column_reads_as_null() {
    let (mock, conn) = mock_connection();
    mock.script_page(
        SELECT_ALL,
        None,
        vec![
            item(&[("a", AttributeValue::number(1))]),
            item(&[("b", AttributeValue::string("x"))]),
        ],
        None,
    );
    let rows = conn
        .query(SELECT_ALL, &[])
        .unwrap()
        .into_completed()
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(rows[0].values(), &[Value::Int(1), Value::Null]);
    assert_eq!(rows[1].values(), &[Value::Null, Value::from("x")]);
}

/// A failed page fetch is reported again on every later read
#[test]
fn test_fetch_error_is_sticky() {
    init_tracing();
    let (mock, conn) = mock_connection();
    mock.script_pages(SELECT_ALL, vec![numbered_items(0, 1), numbered_items(1, 1)]);
    mock.fail_page(SELECT_ALL, "p1", Error::Throttled("slow down".into()));

    let rs = conn.query(SELECT_ALL, &[]).unwrap().into_completed().unwrap();
    assert!(rs.next_row().unwrap().is_some());
    let err = rs.next_row().unwrap_err();
    assert_eq!(err.code(), "THROTTLED");
    assert_eq!(mock.call_count(), 2);

    assert_eq!(rs.next_row().unwrap_err(), err);
    assert_eq!(mock.call_count(), 2);
}

#[test]
fn test_iterator_stops_after_error() {
    let (mock, conn) = mock_connection();
    mock.script_pages(SELECT_ALL, vec![numbered_items(0, 1), numbered_items(1, 1)]);
    mock.fail_page(SELECT_ALL, "p1", Error::Connection("reset".into()));

    let rs = conn.query(SELECT_ALL, &[]).unwrap().into_completed().unwrap();
    let results: Vec<_> = rs.collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

#[test]
fn test_cancelled_context_stops_pagination() {
    let (mock, conn) = mock_connection();
    mock.script_pages(SELECT_ALL, vec![numbered_items(0, 1), numbered_items(1, 1)]);

    let ctx = CallContext::with_timeout(Duration::from_secs(60));
    let rs = conn
        .prepare(SELECT_ALL)
        .unwrap()
        .query_context(&ctx, &[])
        .unwrap()
        .into_completed()
        .unwrap();
    assert!(rs.next_row().unwrap().is_some());

    ctx.cancel();
    let err = rs.next_row().unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
    assert_eq!(mock.call_count(), 1);
}

#[test]
fn test_close_releases_cursor() {
    let (mock, conn) = mock_connection();
    mock.script_pages(SELECT_ALL, vec![numbered_items(0, 2), numbered_items(2, 2)]);

    let rs = conn.query(SELECT_ALL, &[]).unwrap().into_completed().unwrap();
    assert!(rs.next_row().unwrap().is_some());
    rs.close();
    rs.close();
    assert!(rs.next_row().unwrap().is_none());
    assert_eq!(mock.call_count(), 1);
}

#[test]
fn test_update_returning_rows() {
    let (mock, conn) = mock_connection();
    let statement = "UPDATE t SET n=? WHERE id=? RETURNING ALL NEW *";
    mock.script_page(
        statement,
        None,
        vec![item(&[("id", AttributeValue::string("a")), ("n", AttributeValue::number(9))])],
        None,
    );

    let rs = conn
        .query(statement, &[Value::Int(9), Value::from("a")])
        .unwrap()
        .into_completed()
        .unwrap();
    let row = rs.next_row().unwrap().unwrap();
    assert_eq!(row.get_by_name("n"), Some(&Value::Int(9)));
    assert_eq!(
        mock.statement_requests()[0].parameters,
        vec![AttributeValue::number(9), AttributeValue::string("a")]
    );
}

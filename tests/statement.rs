//! Tests for single statement execution

mod common;

use std::time::Duration;

use common::{MockServer, connect, legacy_flags, mariadb_flags};
use zero_mariadb::{Error, MessageKind, Opts, RowFormat};

const SELECT_BY_ID: &str = "SELECT * FROM t WHERE id = ?";
const INSERT: &str = "INSERT INTO t (id, name) VALUES (?, ?)";

#[test]
fn same_text_shares_one_prepare() {
    let server = MockServer::new();
    let conn = connect(&server, legacy_flags(), Opts::default());

    let a = conn.prepare_statement(SELECT_BY_ID).unwrap();
    assert_eq!(a.parameter_count().unwrap(), 1);
    let b = conn.prepare_statement(SELECT_BY_ID).unwrap();
    assert_eq!(b.parameter_count().unwrap(), 1);

    assert_eq!(conn.cache().ref_count(SELECT_BY_ID), Some(2));
    assert_eq!(server.count(MessageKind::Prepare), 1);
}

#[test]
fn first_execution_pipelines_prepare() {
    let server = MockServer::new();
    server.with(|s| s.rows_per_select = 3);
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(SELECT_BY_ID).unwrap();
    assert!(server.exchanges().is_empty());

    stmt.set(1, 7).unwrap();
    let rows = stmt.execute_query().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.format(), RowFormat::Binary);
    assert_eq!(rows.columns()[0].name, "id");
    let row = rows.row(2).unwrap().unwrap();
    assert_eq!(row.get(0), Some(&2_u32.to_le_bytes()[..]));

    stmt.execute_query().unwrap();
    assert_eq!(
        server.kinds(),
        vec![
            vec![MessageKind::Prepare, MessageKind::Execute],
            vec![MessageKind::Execute],
        ]
    );
    // the pipelined execute refers to the statement being prepared
    let first = &server.exchanges()[0][1];
    assert_eq!(&first.payload()[1..5], &[0xff; 4]);
    let second = &server.exchanges()[1][0];
    assert_eq!(&second.payload()[1..5], &1_u32.to_le_bytes());
}

#[test]
fn prepare_then_execute_without_bulk_capability() {
    let server = MockServer::new();
    let conn = connect(&server, legacy_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.bind((1, "a")).unwrap();
    let update = stmt.execute_update().unwrap();
    assert_eq!(update.affected_rows, 1);
    assert_eq!(update.last_insert_id, Some(1));
    assert_eq!(
        server.kinds(),
        vec![vec![MessageKind::Prepare], vec![MessageKind::Execute]]
    );
}

#[test]
fn non_dml_is_prepared_eagerly() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let _stmt = conn.prepare_statement("CREATE TABLE t2 (id INT)").unwrap();
    assert_eq!(server.kinds(), vec![vec![MessageKind::Prepare]]);
}

#[test]
fn result_kind_mismatch() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let insert = conn.prepare_statement(INSERT).unwrap();
    insert.bind((1, "a")).unwrap();
    assert!(matches!(insert.execute_query(), Err(Error::InvalidUsage(_))));

    let select = conn.prepare_statement(SELECT_BY_ID).unwrap();
    select.set(1, 1).unwrap();
    assert!(matches!(select.execute_update(), Err(Error::InvalidUsage(_))));
}

#[test]
fn closed_statement_rejects_operations() {
    let server = MockServer::new();
    let conn = connect(&server, legacy_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    assert_eq!(conn.live_statements(), 1);
    stmt.parameter_count().unwrap();
    stmt.close();
    stmt.close();

    assert!(stmt.is_closed());
    assert_eq!(conn.live_statements(), 0);
    assert_eq!(conn.cache().ref_count(INSERT), Some(0));
    assert!(matches!(stmt.execute(), Err(Error::AlreadyClosed)));
    assert!(matches!(stmt.set(1, 1), Err(Error::AlreadyClosed)));
    assert!(matches!(stmt.add_batch(), Err(Error::AlreadyClosed)));
    assert!(matches!(stmt.execute_batch(), Err(Error::AlreadyClosed)));
    assert!(matches!(stmt.set_max_rows(1), Err(Error::AlreadyClosed)));
}

#[test]
fn dropping_statement_releases_reference() {
    let server = MockServer::new();
    let conn = connect(&server, legacy_flags(), Opts::default());
    {
        let stmt = conn.prepare_statement(INSERT).unwrap();
        stmt.parameter_count().unwrap();
        assert_eq!(conn.cache().ref_count(INSERT), Some(1));
    }
    assert_eq!(conn.cache().ref_count(INSERT), Some(0));
    assert_eq!(conn.live_statements(), 0);
}

#[test]
fn row_limit_releases_plan() {
    let server = MockServer::new();
    server.with(|s| s.rows_per_select = 5);
    let conn = connect(&server, legacy_flags(), Opts::default());

    let stmt = conn.prepare_statement(SELECT_BY_ID).unwrap();
    stmt.set(1, 1).unwrap();
    assert_eq!(stmt.execute_query().unwrap().len(), 5);
    assert_eq!(conn.cache().ref_count(SELECT_BY_ID), Some(1));

    stmt.set_max_rows(2).unwrap();
    assert_eq!(conn.cache().ref_count(SELECT_BY_ID), Some(0));

    // no statement options on this server: the limit is applied locally and
    // the plan comes back from the cache
    assert_eq!(stmt.execute_query().unwrap().len(), 2);
    assert_eq!(conn.cache().ref_count(SELECT_BY_ID), Some(1));
    assert_eq!(server.count(MessageKind::Prepare), 1);
}

#[test]
fn query_timeout_prepares_new_text() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(SELECT_BY_ID).unwrap();
    stmt.set(1, 1).unwrap();
    stmt.execute().unwrap();

    stmt.set_query_timeout(Some(Duration::from_secs(2))).unwrap();
    assert_eq!(stmt.query_timeout(), Some(Duration::from_secs(2)));
    stmt.execute().unwrap();

    let exchanges = server.exchanges();
    assert_eq!(exchanges.len(), 2);
    assert_eq!(
        &exchanges[1][0].payload()[1..],
        b"SET STATEMENT max_statement_time=2 FOR SELECT * FROM t WHERE id = ?"
    );
    assert_eq!(conn.cache().ref_count(SELECT_BY_ID), Some(0));
    assert_eq!(conn.cache().len(), 2);
}

#[test]
fn transport_failure_releases_reference() {
    let server = MockServer::new();
    let conn = connect(&server, legacy_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.parameter_count().unwrap();
    assert_eq!(conn.cache().ref_count(INSERT), Some(1));

    server.with(|s| s.time_out_next = true);
    stmt.bind((1, "a")).unwrap();
    let err = stmt.execute().unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(conn.cache().ref_count(INSERT), Some(0));
    assert!(conn.is_broken());

    assert!(matches!(stmt.execute(), Err(Error::ConnectionBroken)));
}

#[test]
fn server_error_keeps_plan() {
    let server = MockServer::new();
    server.with(|s| s.fail_executes = vec![0]);
    let conn = connect(&server, legacy_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.bind((1, "a")).unwrap();
    let err = stmt.execute().unwrap_err();
    assert_eq!(err.error_code(), Some(1062));
    assert_eq!(err.sqlstate(), Some("23000"));
    assert_eq!(conn.cache().ref_count(INSERT), Some(1));

    stmt.execute_update().unwrap();
    assert_eq!(server.count(MessageKind::Prepare), 1);
}

#[test]
fn failed_first_execution_keeps_prepared_statement() {
    let server = MockServer::new();
    server.with(|s| s.fail_executes = vec![0]);
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.bind((1, "a")).unwrap();
    let err = stmt.execute().unwrap_err();
    assert!(matches!(err, Error::Server(_)));
    assert_eq!(err.error_code(), Some(1062));
    assert_eq!(conn.cache().ref_count(INSERT), Some(1));
    assert!(!conn.is_broken());

    stmt.execute_update().unwrap();
    assert_eq!(
        server.kinds(),
        vec![
            vec![MessageKind::Prepare, MessageKind::Execute],
            vec![MessageKind::Execute],
        ]
    );

    drop(stmt);
    conn.close();
    assert_eq!(server.with(|s| s.closed.clone()), vec![1]);
}

#[test]
fn local_infile_request_breaks_connection() {
    let server = MockServer::new();
    server.with(|s| s.local_infile_next = true);
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.bind((1, "a")).unwrap();
    assert!(matches!(stmt.execute(), Err(Error::Unsupported(_))));
    assert!(conn.is_broken());
    assert!(conn.cache().is_empty());

    // nothing else is sent on the desynchronized session
    assert!(matches!(stmt.execute(), Err(Error::ConnectionBroken)));
    assert_eq!(server.exchanges().len(), 1);
}

#[test]
fn session_reset_forces_prepare() {
    let server = MockServer::new();
    let conn = connect(&server, legacy_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.bind((1, "a")).unwrap();
    stmt.execute().unwrap();

    conn.reset_session().unwrap();
    assert!(conn.cache().is_empty());

    stmt.execute_update().unwrap();
    assert_eq!(server.count(MessageKind::Prepare), 2);
    assert_eq!(conn.cache().ref_count(INSERT), Some(1));
}

#[test]
fn unset_parameter_is_rejected_before_sending() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.set(2, "a").unwrap();
    let err = stmt.execute().unwrap_err();
    assert_eq!(err.to_string(), "Parameter binding error: Parameter at position 1 is not set");
    assert!(server.exchanges().is_empty());
}

#[test]
fn missing_trailing_parameter_is_rejected() {
    let server = MockServer::new();
    let conn = connect(&server, legacy_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    assert_eq!(stmt.parameter_count().unwrap(), 2);
    stmt.set(1, 1).unwrap();
    assert!(matches!(stmt.execute(), Err(Error::ParameterBinding(_))));
    assert!(matches!(stmt.add_batch(), Err(Error::ParameterBinding(_))));
    assert_eq!(server.exchanges().len(), 1);
}

#[test]
fn text_mode_interpolates_parameters() {
    let server = MockServer::new();
    server.with(|s| s.rows_per_select = 2);
    let opts = Opts {
        use_server_prep_stmts: false,
        ..Opts::default()
    };
    let conn = connect(&server, mariadb_flags(), opts);

    let insert = conn.prepare_statement(INSERT).unwrap();
    insert.bind((1, "o'k")).unwrap();
    assert_eq!(insert.execute_update().unwrap().affected_rows, 1);

    let select = conn.prepare_statement(SELECT_BY_ID).unwrap();
    assert_eq!(select.parameter_count().unwrap(), 1);
    select.set(1, 2).unwrap();
    let rows = select.execute_query().unwrap();
    assert_eq!(rows.format(), RowFormat::Text);
    assert_eq!(rows.row(1).unwrap().unwrap().get(0), Some(&b"1"[..]));

    let exchanges = server.exchanges();
    assert_eq!(
        exchanges[0][0].payload(),
        b"\x03INSERT INTO t (id, name) VALUES (1, 'o\\'k')"
    );
    assert_eq!(server.count(MessageKind::Prepare), 0);
    assert!(conn.cache().is_empty());
}

#[test]
fn eviction_closes_idle_statements() {
    let server = MockServer::new();
    let opts = Opts {
        prep_stmt_cache_size: 1,
        ..Opts::default()
    };
    let conn = connect(&server, legacy_flags(), opts);

    let first = conn.prepare_statement(INSERT).unwrap();
    first.parameter_count().unwrap();
    first.close();

    let second = conn.prepare_statement(SELECT_BY_ID).unwrap();
    second.parameter_count().unwrap();

    assert_eq!(server.with(|s| s.closed.clone()), vec![1]);
    assert!(conn.cache().ref_count(INSERT).is_none());
}

#[test]
fn closing_connection_closes_cached_statements() {
    let server = MockServer::new();
    let conn = connect(&server, legacy_flags(), Opts::default());
    {
        let a = conn.prepare_statement(INSERT).unwrap();
        a.parameter_count().unwrap();
        let b = conn.prepare_statement(SELECT_BY_ID).unwrap();
        b.parameter_count().unwrap();
    }
    conn.close();

    let mut closed = server.with(|s| s.closed.clone());
    closed.sort_unstable();
    assert_eq!(closed, vec![1, 2]);
}

#[test]
fn statements_shared_across_threads() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let shared = conn.prepare_statement(INSERT).unwrap();
    shared.bind((1, "x")).unwrap();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..10 {
                    assert_eq!(shared.execute_update().unwrap().affected_rows, 1);
                }
            });
        }
    });
    assert_eq!(server.count(MessageKind::Prepare), 1);
    drop(shared);

    std::thread::scope(|scope| {
        for n in 0..4 {
            let conn = &conn;
            scope.spawn(move || {
                let stmt = conn.prepare_statement(INSERT).unwrap();
                for i in 0..10 {
                    stmt.bind((n * 100 + i, "x")).unwrap();
                    stmt.execute_update().unwrap();
                }
            });
        }
    });

    assert_eq!(server.count(MessageKind::Execute), 80);
    assert_eq!(conn.cache().len(), 1);
    assert_eq!(conn.cache().ref_count(INSERT), Some(0));
    assert_eq!(conn.live_statements(), 0);
}

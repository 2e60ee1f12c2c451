//! Tests for execute_batch

mod common;

use common::{MockServer, connect, legacy_flags, mariadb_flags};
use zero_mariadb::protocol::types::capabilities;
use zero_mariadb::{Error, MessageKind, Opts, PIPELINE_DEPTH, SUCCESS_NO_INFO, SessionFlags};

const INSERT: &str = "INSERT INTO t (id, name) VALUES (?, ?)";

fn no_bulk_flags() -> SessionFlags {
    SessionFlags::from_capabilities(
        capabilities::MARIADB_CLIENT_STMT_BULK_OPERATIONS | capabilities::CLIENT_DEPRECATE_EOF,
        false,
        false,
    )
}

#[test]
fn pipelined_batch_is_chunked() {
    let server = MockServer::new();
    let conn = connect(&server, no_bulk_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    for i in 0..300 {
        stmt.bind((i, format!("name-{i}"))).unwrap();
        stmt.add_batch().unwrap();
    }
    let completions = stmt.execute_batch().unwrap();
    assert_eq!(completions.len(), 300);
    assert_eq!(stmt.batch_len(), 0);

    let kinds = server.kinds();
    assert_eq!(kinds.len(), 2);
    assert_eq!(kinds[0].len(), PIPELINE_DEPTH + 1);
    assert_eq!(kinds[0][0], MessageKind::Prepare);
    assert!(kinds[0][1..].iter().all(|k| *k == MessageKind::Execute));
    assert_eq!(kinds[1].len(), 50);
    assert!(kinds[1].iter().all(|k| *k == MessageKind::Execute));
    assert_eq!(server.count(MessageKind::Prepare), 1);
}

#[test]
fn generated_keys_disable_bulk() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement_with(INSERT, true).unwrap();
    for i in 0..3 {
        stmt.bind((i, "x")).unwrap();
        stmt.add_batch().unwrap();
    }
    let completions = stmt.execute_batch().unwrap();
    let keys: Vec<_> = completions
        .iter()
        .map(|c| c.as_update().unwrap().last_insert_id)
        .collect();
    assert_eq!(keys, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(server.count(MessageKind::BulkExecute), 0);
}

#[test]
fn pipelined_failure_reports_no_partial_results() {
    let server = MockServer::new();
    server.with(|s| s.fail_executes = vec![1]);
    let conn = connect(&server, no_bulk_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    for i in 0..3 {
        stmt.bind((i, "x")).unwrap();
        stmt.add_batch().unwrap();
    }
    let err = stmt.execute_batch().unwrap_err();
    let batch = err.as_batch().unwrap();
    assert!(batch.completions().is_empty());
    assert_eq!(batch.batch_size(), 3);
    assert_eq!(batch.update_counts(), vec![SUCCESS_NO_INFO; 3]);
    assert_eq!(err.error_code(), Some(1062));
    assert_eq!(stmt.batch_len(), 0);

    // the prepare in the failed exchange still counts
    assert_eq!(conn.cache().ref_count(INSERT), Some(1));
    stmt.bind((9, "y")).unwrap();
    stmt.execute().unwrap();
    assert_eq!(server.count(MessageKind::Prepare), 1);
}

#[test]
fn standard_batch_continues_after_failed_row() {
    let server = MockServer::new();
    server.with(|s| s.fail_executes = vec![1]);
    let conn = connect(&server, legacy_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    for i in 0..3 {
        stmt.bind((i, "x")).unwrap();
        stmt.add_batch().unwrap();
    }
    let err = stmt.execute_batch().unwrap_err();
    let Error::Batch(batch) = err else {
        panic!("expected a batch error");
    };
    assert_eq!(batch.completions().len(), 2);
    assert_eq!(batch.batch_size(), 3);
    assert_eq!(batch.failed_rows(), &[1]);
    assert_eq!(batch.update_counts(), vec![1, SUCCESS_NO_INFO, 1]);
    assert_eq!(batch.cause().sqlstate(), Some("23000"));

    // every row was still sent
    assert_eq!(server.count(MessageKind::Execute), 3);
}

#[test]
fn bulk_batch_sends_one_command() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    for i in 0..3 {
        stmt.bind((i, "x")).unwrap();
        stmt.add_batch().unwrap();
    }
    let counts = stmt.execute_batch_counts().unwrap();

    // the server reports one aggregated count
    assert_eq!(counts, vec![SUCCESS_NO_INFO; 3]);
    assert_eq!(
        server.kinds(),
        vec![vec![MessageKind::Prepare, MessageKind::BulkExecute]]
    );
    assert_eq!(conn.cache().ref_count(INSERT), Some(1));
}

#[test]
fn bulk_failure_reports_no_partial_results() {
    let server = MockServer::new();
    server.with(|s| s.fail_bulk = true);
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    for i in 0..4 {
        stmt.bind((i, "x")).unwrap();
        stmt.add_batch().unwrap();
    }
    let err = stmt.execute_batch().unwrap_err();
    let batch = err.as_batch().unwrap();
    assert!(batch.completions().is_empty());
    assert!(batch.failed_rows().is_empty());
    assert_eq!(batch.batch_size(), 4);
    assert_eq!(batch.update_counts(), vec![SUCCESS_NO_INFO; 4]);
    assert_eq!(err.error_code(), Some(1062));
    assert_eq!(stmt.batch_len(), 0);

    assert_eq!(
        server.kinds(),
        vec![vec![MessageKind::Prepare, MessageKind::BulkExecute]]
    );
    assert_eq!(conn.cache().ref_count(INSERT), Some(1));
    assert!(!conn.is_broken());
}

#[test]
fn bulk_batch_splits_on_type_change() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.bind((1, "a")).unwrap();
    stmt.add_batch().unwrap();
    stmt.bind((2, None::<String>)).unwrap();
    stmt.add_batch().unwrap();
    stmt.bind((3.5, "c")).unwrap();
    stmt.add_batch().unwrap();
    stmt.execute_batch().unwrap();

    assert_eq!(
        server.kinds(),
        vec![vec![
            MessageKind::Prepare,
            MessageKind::BulkExecute,
            MessageKind::BulkExecute
        ]]
    );

    // the second bulk command reuses the statement just prepared
    stmt.bind((4, "d")).unwrap();
    stmt.add_batch().unwrap();
    stmt.bind((5, "e")).unwrap();
    stmt.add_batch().unwrap();
    stmt.execute_batch().unwrap();
    let last = &server.exchanges()[1];
    assert_eq!(last.len(), 1);
    assert_eq!(&last[0].payload()[1..5], &1_u32.to_le_bytes());
}

#[test]
fn single_row_batch_uses_standard_execution() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.bind((1, "a")).unwrap();
    stmt.add_batch().unwrap();
    assert_eq!(stmt.execute_batch_counts().unwrap(), vec![1]);
    assert_eq!(server.count(MessageKind::BulkExecute), 0);
}

#[test]
fn local_infile_forces_standard_execution() {
    let server = MockServer::new();
    let flags = SessionFlags::from_capabilities(
        capabilities::MARIADB_CLIENT_STMT_BULK_OPERATIONS
            | capabilities::CLIENT_DEPRECATE_EOF
            | capabilities::CLIENT_LOCAL_FILES,
        true,
        true,
    );
    let conn = connect(&server, flags, Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    for i in 0..4 {
        stmt.bind((i, "x")).unwrap();
        stmt.add_batch().unwrap();
    }
    assert_eq!(stmt.execute_batch_counts().unwrap(), vec![1; 4]);
    // one exchange per row, the first carrying the prepare
    assert_eq!(server.kinds().len(), 4);
}

#[test]
fn empty_batch_sends_nothing() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    assert!(stmt.execute_batch().unwrap().is_empty());
    assert!(server.exchanges().is_empty());
}

#[test]
fn inconsistent_rows_are_rejected_before_sending() {
    let server = MockServer::new();
    let conn = connect(&server, mariadb_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    stmt.bind((1, "a")).unwrap();
    stmt.add_batch().unwrap();
    stmt.bind((2,)).unwrap();
    stmt.add_batch().unwrap();

    assert!(matches!(stmt.execute_batch(), Err(Error::ParameterBinding(_))));
    assert!(server.exchanges().is_empty());
    assert_eq!(stmt.batch_len(), 0);
}

#[test]
fn text_mode_batch_runs_row_by_row() {
    let server = MockServer::new();
    let opts = Opts {
        use_server_prep_stmts: false,
        ..Opts::default()
    };
    let conn = connect(&server, mariadb_flags(), opts);

    let stmt = conn.prepare_statement(INSERT).unwrap();
    for i in 0..3 {
        stmt.bind((i, "x")).unwrap();
        stmt.add_batch().unwrap();
    }
    assert_eq!(stmt.execute_batch_counts().unwrap(), vec![1; 3]);
    assert_eq!(
        server.kinds(),
        vec![vec![MessageKind::Query]; 3]
    );
}

#[test]
fn batch_after_session_reset_prepares_again() {
    let server = MockServer::new();
    let conn = connect(&server, no_bulk_flags(), Opts::default());

    let stmt = conn.prepare_statement(INSERT).unwrap();
    for _ in 0..2 {
        for i in 0..3 {
            stmt.bind((i, "x")).unwrap();
            stmt.add_batch().unwrap();
        }
        assert_eq!(stmt.execute_batch().unwrap().len(), 3);
        conn.reset_session().unwrap();
    }
    assert_eq!(server.count(MessageKind::Prepare), 2);
}

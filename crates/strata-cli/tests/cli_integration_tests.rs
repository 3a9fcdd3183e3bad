//! CLI integration tests
//!
//! These tests drive the compiled `strata` binary against throwaway
//! databases and script directories.

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn strata(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_script(dir: &Path, id: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(format!("{}.sql", id)), body).unwrap();
}

/// Two streams (medical, classifieds) under a config file
fn setup_project(temp_dir: &TempDir) -> PathBuf {
    let root = temp_dir.path();
    fs::write(
        root.join("strata.toml"),
        r#"
database = "data/app.db"
lock_timeout_ms = 200

[[streams]]
name = "medical"
dir = "migrations/medical"

[[streams]]
name = "classifieds"
dir = "migrations/classifieds"
"#,
    )
    .unwrap();

    let medical = root.join("migrations/medical");
    write_script(
        &medical,
        "001_create_doctors",
        "CREATE TABLE doctors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    );
    write_script(
        &medical,
        "002_create_patients",
        "CREATE TABLE patients (id INTEGER PRIMARY KEY, doctor_id INTEGER REFERENCES doctors (id));",
    );

    let classifieds = root.join("migrations/classifieds");
    write_script(
        &classifieds,
        "001_create_users",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE);",
    );

    root.join("data/app.db")
}

fn ledger_ids(db: &Path, table: &str) -> Vec<String> {
    let conn = Connection::open(db).unwrap();
    let mut stmt = conn
        .prepare(&format!("SELECT identifier FROM {} ORDER BY identifier", table))
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

fn table_exists(db: &Path, table: &str) -> bool {
    let conn = Connection::open(db).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        == 1
}

#[test]
fn test_apply_all_streams() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_project(&temp_dir);

    let output = strata(temp_dir.path(), &["apply"]);

    assert!(
        output.status.success(),
        "apply should succeed. Stderr: {}",
        stderr(&output)
    );
    let out = stdout(&output);
    assert!(out.contains("[medical] applied 001_create_doctors"));
    assert!(out.contains("[medical] applied 002_create_patients"));
    assert!(out.contains("[classifieds] applied 001_create_users"));

    assert_eq!(
        ledger_ids(&db, "schema_ledger_medical"),
        ["001_create_doctors", "002_create_patients"]
    );
    assert_eq!(ledger_ids(&db, "schema_ledger_classifieds"), ["001_create_users"]);
}

#[test]
fn test_second_apply_is_a_no_op() {
    let temp_dir = TempDir::new().unwrap();
    setup_project(&temp_dir);
    assert!(strata(temp_dir.path(), &["apply"]).status.success());

    let output = strata(temp_dir.path(), &["apply", "--stream", "medical"]);

    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("[medical] 0 applied, 2 skipped"));
    assert!(!stdout(&output).contains("classifieds"));
}

#[test]
fn test_failing_script_exits_non_zero_with_identifier() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_project(&temp_dir);
    let medical = temp_dir.path().join("migrations/medical");
    write_script(&medical, "003_broken", "INSERT INTO no_such_table VALUES (1);");
    write_script(&medical, "004_after", "CREATE TABLE after (id INTEGER);");

    let output = strata(temp_dir.path(), &["apply", "--stream", "medical"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Error:"), "Stderr: {}", err);
    assert!(err.contains("ERR_EXECUTION"));
    assert!(err.contains("003_broken"));
    assert!(stdout(&output).contains("[medical] not attempted 004_after"));

    // Everything before the failure stays committed
    assert_eq!(
        ledger_ids(&db, "schema_ledger_medical"),
        ["001_create_doctors", "002_create_patients"]
    );
    assert!(!table_exists(&db, "after"));

    // Fix and retry resumes at the failed script
    write_script(&medical, "003_broken", "CREATE TABLE fixed (id INTEGER);");
    let output = strata(temp_dir.path(), &["apply", "--stream", "medical"]);
    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("[medical] 2 applied, 2 skipped"));
}

#[test]
fn test_dry_run_creates_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_project(&temp_dir);

    let output = strata(temp_dir.path(), &["apply", "--dry-run"]);

    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("[medical] would apply 001_create_doctors"));
    assert!(out.contains("(dry run, nothing written)"));
    assert!(!db.exists());

    // Against an existing database only the ledger is read
    assert!(strata(temp_dir.path(), &["apply", "--stream", "classifieds"])
        .status
        .success());
    let output = strata(temp_dir.path(), &["apply", "--dry-run"]);
    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("[medical] 2 pending, 0 skipped"));
    assert!(stdout(&output).contains("[classifieds] 0 pending, 1 skipped"));
    assert!(!table_exists(&db, "schema_ledger_medical"));
    assert!(!table_exists(&db, "doctors"));
}

#[test]
fn test_dry_run_keeps_existing_journal_mode() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_project(&temp_dir);
    fs::create_dir_all(db.parent().unwrap()).unwrap();
    {
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE legacy (id INTEGER);").unwrap();
    }

    let output = strata(temp_dir.path(), &["apply", "--dry-run"]);
    assert!(output.status.success(), "Stderr: {}", stderr(&output));

    let conn = Connection::open(&db).unwrap();
    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode, "delete");
}

#[test]
fn test_status_reports_pending_then_applied() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_project(&temp_dir);

    let output = strata(temp_dir.path(), &["status"]);
    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("pending"));
    // Status never creates the database
    assert!(!db.exists());

    assert!(strata(temp_dir.path(), &["apply"]).status.success());
    let output = strata(temp_dir.path(), &["status", "--stream", "medical"]);
    let out = stdout(&output);
    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    assert!(out.contains("medical (schema_ledger_medical)"));
    assert!(out.contains("001_create_doctors"));
    assert!(out.contains("applied"));
    assert!(!out.contains("pending"));
}

#[test]
fn test_drift_fails_status_and_apply() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_project(&temp_dir);
    assert!(strata(temp_dir.path(), &["apply"]).status.success());

    let medical = temp_dir.path().join("migrations/medical");
    write_script(
        &medical,
        "001_create_doctors",
        "CREATE TABLE doctors (id INTEGER PRIMARY KEY, name TEXT NOT NULL, specialty TEXT);",
    );
    write_script(&medical, "003_create_visits", "CREATE TABLE visits (id INTEGER);");

    let output = strata(temp_dir.path(), &["status"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("drifted"));
    assert!(stderr(&output).contains("ERR_DRIFT_DETECTED"));
    assert!(stderr(&output).contains("001_create_doctors"));

    let output = strata(temp_dir.path(), &["apply"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("ERR_DRIFT_DETECTED"));
    assert!(!table_exists(&db, "visits"));

    let output = strata(temp_dir.path(), &["apply", "--no-verify"]);
    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    assert!(table_exists(&db, "visits"));
}

#[test]
fn test_out_of_order_needs_flag() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_project(&temp_dir);
    assert!(strata(temp_dir.path(), &["apply"]).status.success());

    let medical = temp_dir.path().join("migrations/medical");
    write_script(&medical, "0015_create_rooms", "CREATE TABLE rooms (id INTEGER);");

    let output = strata(temp_dir.path(), &["apply"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("ERR_ORDER_VIOLATION"));
    assert!(stderr(&output).contains("0015_create_rooms"));

    let output = strata(temp_dir.path(), &["apply", "--allow-out-of-order"]);
    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    assert!(table_exists(&db, "rooms"));
}

#[test]
fn test_stale_lock_and_unlock() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_project(&temp_dir);
    assert!(strata(temp_dir.path(), &["apply"]).status.success());

    let conn = Connection::open(&db).unwrap();
    conn.execute(
        "INSERT INTO schema_ledger_medical_lock (name, holder, acquired_at) VALUES ('migrations', 'crashed-run', 0)",
        [],
    )
    .unwrap();
    drop(conn);

    let output = strata(temp_dir.path(), &["apply", "--stream", "medical", "--no-wait"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("ERR_LOCK_CONTENTION"));
    assert!(stderr(&output).contains("crashed-run"));

    let output = strata(temp_dir.path(), &["unlock", "--stream", "medical"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--force"));

    let output = strata(temp_dir.path(), &["unlock", "--stream", "medical", "--force"]);
    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("released lock held by run crashed-run"));

    let output = strata(temp_dir.path(), &["apply", "--stream", "medical", "--no-wait"]);
    assert!(output.status.success(), "Stderr: {}", stderr(&output));
}

#[test]
fn test_default_stream_without_config_file() {
    let temp_dir = TempDir::new().unwrap();
    write_script(
        &temp_dir.path().join("migrations"),
        "001_create_accounts",
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY);",
    );

    let output = strata(temp_dir.path(), &["apply", "--db", "local.db"]);

    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    let db = temp_dir.path().join("local.db");
    assert_eq!(ledger_ids(&db, "schema_ledger"), ["001_create_accounts"]);
}

#[test]
fn test_bundled_stream() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("clinic.toml"),
        "database = \"clinic.db\"\n\n[[streams]]\nname = \"medical\"\nbundled = \"medical\"\n",
    )
    .unwrap();

    let output = strata(temp_dir.path(), &["--config", "clinic.toml", "apply"]);

    assert!(output.status.success(), "Stderr: {}", stderr(&output));
    let db = temp_dir.path().join("clinic.db");
    assert_eq!(ledger_ids(&db, "schema_ledger_medical").len(), 4);
    assert!(table_exists(&db, "visits"));
}

#[test]
fn test_config_errors() {
    let temp_dir = TempDir::new().unwrap();
    setup_project(&temp_dir);

    let output = strata(temp_dir.path(), &["apply", "--stream", "billing"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown stream 'billing'"));

    let output = strata(temp_dir.path(), &["--config", "missing.toml", "status"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("config file not found"));

    let medical = temp_dir.path().join("migrations/medical");
    write_script(&medical, "not-a-migration", "SELECT 1;");
    let output = strata(temp_dir.path(), &["apply"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("ERR_CONFIGURATION"));
    assert!(stderr(&output).contains("not-a-migration"));
}

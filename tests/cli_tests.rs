use predicates::prelude::*;
use std::fs;

mod common;
use common::{last_line, open_services, seed, setup_test_db, sf, temp_out};

#[test]
fn test_init_creates_database() {
    let db = setup_test_db("cli_init");

    sf().args(["--db", &db, "--test", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Database initialized"));

    assert!(fs::metadata(&db).is_ok());
}

#[test]
fn test_user_add_prints_new_id() {
    let db = setup_test_db("cli_user_add");
    sf().args(["--db", &db, "--test", "init"]).assert().success();

    let out = sf()
        .args(["--db", &db, "user", "add", "Mara", "--role", "assembler"])
        .output()
        .expect("run");
    assert!(out.status.success());
    let id = last_line(&out.stdout);
    assert!(!id.is_empty());

    sf().args(["--db", &db, "user", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()))
        .stdout(predicate::str::contains("Mara"));
}

#[test]
fn test_session_flow_notifies_project_lead() {
    let db = setup_test_db("cli_flow");
    let s = seed(&open_services(&db));

    let out = sf()
        .args([
            "--db",
            &db,
            "--as",
            s.assembler.as_str(),
            "start",
            "--project",
            s.project.as_str(),
            "--component",
            s.components[0].as_str(),
            "--process",
            s.process.as_str(),
        ])
        .output()
        .expect("start");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let session = last_line(&out.stdout);

    sf().args(["--db", &db, "--as", s.assembler.as_str(), "progress", &session, "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4 parts completed"));

    sf().args(["--db", &db, "--as", s.assembler.as_str(), "end", &session, "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed: 10 parts"));

    // A second end is rejected and leaves the row untouched.
    sf().args(["--db", &db, "--as", s.assembler.as_str(), "end", &session, "12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session is completed"));

    sf().args(["--db", &db, "--as", s.lead.as_str(), "notifications"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 notification(s), 1 unread"))
        .stdout(predicate::str::contains("work_completed"))
        .stdout(predicate::str::contains(session.as_str()));

    let services = open_services(&db);
    let notes = services.notifications.for_recipient(&s.lead).unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].delivered);
    assert_eq!(notes[0].payload.parts_completed, 10);

    sf().args(["--db", &db, "--as", s.lead.as_str(), "analytics", "--project", s.project.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/4 completed"))
        .stdout(predicate::str::contains("25.0%"));
}

#[test]
fn test_assembler_cannot_manage_projects() {
    let db = setup_test_db("cli_forbidden");
    let s = seed(&open_services(&db));

    sf().args(["--db", &db, "--as", s.assembler.as_str(), "project", "add", "Rogue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not permitted"));

    sf().args(["--db", &db, "--as", s.lead.as_str(), "project", "add", "Spindle", "--quantity", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Project 'Spindle' created"));
}

#[test]
fn test_lead_cannot_drive_someone_elses_session() {
    let db = setup_test_db("cli_not_owner");
    let services = open_services(&db);
    let s = seed(&services);
    let id = services
        .store
        .start(&s.project, &s.components[1], &s.process, &s.assembler)
        .unwrap();

    sf().args(["--db", &db, "--as", s.lead.as_str(), "pause", id.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not permitted"));
}

#[test]
fn test_missing_actor_is_reported() {
    let db = setup_test_db("cli_no_actor");
    sf().args(["--db", &db, "--test", "init"]).assert().success();

    sf().args(["--db", &db, "whoami"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--as"));
}

#[test]
fn test_whoami_shows_home_view() {
    let db = setup_test_db("cli_whoami");
    let s = seed(&open_services(&db));

    sf().args(["--db", &db, "--as", s.assembler.as_str(), "whoami"])
        .assert()
        .success()
        .stdout(predicate::str::contains("assembler"))
        .stdout(predicate::str::contains("Home view"));
}

#[test]
fn test_export_csv_and_json() {
    let db = setup_test_db("cli_export");
    let services = open_services(&db);
    let s = seed(&services);
    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();
    services.store.end(&id, 6).unwrap();

    let csv = temp_out("cli_export", "csv");
    sf().args(["--db", &db, "export", "--format", "csv", "--file", &csv, "--force"])
        .assert()
        .success();
    let content = fs::read_to_string(&csv).expect("csv written");
    assert!(content.starts_with("id,project,component,process,assembler,status"));
    assert!(content.contains("Gearbox"));
    assert!(content.contains("Housing"));
    assert!(content.contains("completed"));

    let json = temp_out("cli_export", "json");
    sf().args([
        "--db",
        &db,
        "export",
        "--format",
        "json",
        "--file",
        &json,
        "--assembler",
        s.assembler.as_str(),
        "--force",
    ])
    .assert()
    .success();
    let rows: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json).expect("json written")).expect("valid json");
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["parts_completed"], 6);
    assert_eq!(rows[0]["assembler"], "Ari Assembler");
}

#[test]
fn test_export_requires_absolute_path() {
    let db = setup_test_db("cli_export_relative");
    sf().args(["--db", &db, "--test", "init"]).assert().success();

    sf().args(["--db", &db, "export", "--file", "relative.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be absolute"));
}

#[test]
fn test_config_print() {
    let db = setup_test_db("cli_config");
    sf().args(["--db", &db, "config", "--print"])
        .assert()
        .success()
        .stdout(predicate::str::contains("liveness_window_secs"))
        .stdout(predicate::str::contains(db.as_str()));
}

#[test]
fn test_log_print_lists_audit_rows() {
    let db = setup_test_db("cli_log");
    sf().args(["--db", &db, "--test", "init"]).assert().success();

    sf().args(["--db", &db, "log", "--print"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Internal log"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_watch_stops_after_deadline() {
    let db = setup_test_db("cli_watch");
    sf().args(["--db", &db, "--test", "init"]).assert().success();

    sf().args(["--db", &db, "watch", "--seconds", "1", "--poll-ms", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 change(s) received"));
}

#[test]
fn test_project_sessions_are_for_leads_only() {
    let db = setup_test_db("cli_project_sessions");
    let services = open_services(&db);
    let s = seed(&services);
    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();

    sf().args(["--db", &db, "--as", s.assembler.as_str(), "sessions", "--project", s.project.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not permitted"));

    sf().args(["--db", &db, "sessions", "--project", s.project.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--as"));

    sf().args(["--db", &db, "--as", s.lead.as_str(), "sessions", "--project", s.project.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));
}

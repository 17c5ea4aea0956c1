#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use shopfloor::config::Config;
use shopfloor::core::pipeline::Services;
use shopfloor::models::ids::{ComponentId, ProcessId, ProjectId, UserId};
use shopfloor::models::role::Role;
use std::env;
use std::fs;
use std::path::PathBuf;

pub fn sf() -> Command {
    let mut cmd = cargo_bin_cmd!("shopfloor");
    cmd.env("SHOPFLOOR_LOG", "warn");
    cmd
}

/// Create a unique test DB path inside the system temp dir and remove any
/// leftovers (including WAL side files) from a previous run.
pub fn setup_test_db(name: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_shopfloor.sqlite", name));
    let db_path = path.to_string_lossy().to_string();
    for suffix in ["", "-wal", "-shm"] {
        fs::remove_file(format!("{db_path}{suffix}")).ok();
    }
    db_path
}

/// Create a temporary output file path inside tempdir and ensure it's removed
pub fn temp_out(name: &str, ext: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_out.{}", name, ext));
    let p = path.to_string_lossy().to_string();
    fs::remove_file(&p).ok();
    p
}

/// Defaults pointing at `db_path`, with a short retry backoff.
pub fn test_config(db_path: &str) -> Config {
    let mut cfg = Config::with_database(db_path);
    cfg.store_retry_backoff_ms = 10;
    cfg.store_retry_attempts = 5;
    cfg.store_busy_timeout_ms = 5000;
    cfg
}

pub fn open_services(db_path: &str) -> Services {
    Services::open(&test_config(db_path)).expect("open services")
}

/// One project lead owning one project with four components, one assembler
/// and one process.
pub struct Seed {
    pub lead: UserId,
    pub assembler: UserId,
    pub project: ProjectId,
    pub components: Vec<ComponentId>,
    pub process: ProcessId,
}

pub fn seed(services: &Services) -> Seed {
    let dir = &services.directory;
    let lead = dir
        .create_user("Lena Lead", "lena@example.com", Role::ProjectLead)
        .expect("lead");
    let assembler = dir
        .create_user("Ari Assembler", "ari@example.com", Role::Assembler)
        .expect("assembler");
    let project = dir.create_project("Gearbox", 40, &lead).expect("project");
    let components = ["Housing", "Shaft", "Gear", "Cover"]
        .iter()
        .map(|name| dir.add_component(&project, name, 10).expect("component"))
        .collect();
    let process = dir.create_process("Assembly").expect("process");

    Seed {
        lead,
        assembler,
        project,
        components,
        process,
    }
}

/// Last non-empty stdout line: commands that create something print its id there.
pub fn last_line(output: &[u8]) -> String {
    String::from_utf8_lossy(output)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

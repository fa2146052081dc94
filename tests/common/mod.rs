//! Shared test helpers for integration tests
//!
//! Builds a data directory with small, balanced study datasets.

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const BEHAVIORAL_FILE: &str = "ANOVA beh RT.csv";
pub const MVPA_FILE: &str = "ANOVA object-sensitive_WIT.csv";
pub const SEARCHLIGHT_FILE: &str = "ANOVA searchlight_WIT.csv";

pub const SUBJECTS: usize = 4;

/// Helper to get a wit command isolated from the user's environment
pub fn wit() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("wit"));
    cmd.env_remove("WIT_CONFIG")
        .env_remove("WIT_DATA_DIR")
        .env_remove("RUST_LOG");
    cmd
}

/// A wit command run inside `tmp`, with the user config directory pointed
/// into `tmp` as well
pub fn wit_in(tmp: &TempDir) -> Command {
    let mut cmd = wit();
    cmd.current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env("XDG_CONFIG_HOME", tmp.path().join(".config"));
    cmd
}

/// Behavioral CSV: subjects x 2 primes x 2 targets x 2 trials
pub fn behavioral_csv() -> String {
    let mut csv = String::from("id,prime,target,rt_raw,rt_log\n");
    for s in 1..=SUBJECTS {
        for (i, prime) in ["Black", "White"].iter().enumerate() {
            for (j, target) in ["gun", "tool"].iter().enumerate() {
                for t in 0..2 {
                    let raw = 420.0
                        + 20.0 * s as f64
                        + 35.0 * j as f64
                        + 40.0 * (i * j) as f64
                        + 9.0 * ((s + 2 * t + i) % 5) as f64;
                    writeln!(csv, "{},{},{},{},{:.5}", s, prime, target, raw, f64::ln(raw))
                        .unwrap();
                }
            }
        }
    }
    csv
}

/// Neuro CSV with the doubled decimal points of the exported files
pub fn neuro_csv() -> String {
    let mut csv = String::from("id,prime,target,value\n");
    for s in 1..=SUBJECTS {
        for (i, prime) in ["Black", "White"].iter().enumerate() {
            for (j, target) in ["gun", "tool"].iter().enumerate() {
                let v = 0.1 * s as f64
                    + 0.04 * i as f64
                    + 0.03 * ((s + i + 2 * j) % 3) as f64;
                let text = format!("{:.4}", v).replacen('.', "..", 1);
                writeln!(csv, "{},{},{},{}", s, prime, target, text).unwrap();
            }
        }
    }
    csv
}

/// Neuro CSV with its last row dropped
pub fn unbalanced_neuro_csv() -> String {
    let csv = neuro_csv();
    let mut lines: Vec<&str> = csv.lines().collect();
    lines.pop();
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

/// Data directory with all three datasets
pub fn setup_data_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), BEHAVIORAL_FILE, &behavioral_csv());
    write(tmp.path(), MVPA_FILE, &neuro_csv());
    write(tmp.path(), SEARCHLIGHT_FILE, &neuro_csv());
    tmp
}

/// Data directory with only the behavioral dataset
pub fn setup_behavioral_only() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), BEHAVIORAL_FILE, &behavioral_csv());
    tmp
}

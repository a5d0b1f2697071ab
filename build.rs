//! Build script for Persona Portal
//!
//! Embeds the git commit, build timestamp, target and profile so that
//! `persona-portal version` can report exactly what is running.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");

    let git_hash = git_output(&["rev-parse", "--short=8", "HEAD"]);
    let git_dirty = git_output(&["status", "--porcelain"]);
    let dirty = if git_dirty == "unknown" {
        "unknown"
    } else if git_dirty.is_empty() {
        "false"
    } else {
        "true"
    };

    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=PORTAL_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=PORTAL_GIT_DIRTY={}", dirty);
    println!("cargo:rustc-env=PORTAL_BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=PORTAL_TARGET={}", target);
    println!("cargo:rustc-env=PORTAL_PROFILE={}", profile);
}

/// Run a git command and return trimmed stdout, or "unknown" when git is unavailable
fn git_output(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

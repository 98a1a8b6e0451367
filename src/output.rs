//! Human-facing terminal output.
//!
//! Centralizes all progress/diagnostic printing so `--verbose`/`--quiet`
//! are applied in one place instead of scattered `println!`s.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

static QUIET: AtomicBool = AtomicBool::new(false);
static VERBOSE: AtomicU8 = AtomicU8::new(0);
static HIDE_CONFLICTS: AtomicBool = AtomicBool::new(false);

pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose as u8, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed) != 0
}

pub fn set_hide_conflicts(hide: bool) {
    HIDE_CONFLICTS.store(hide, Ordering::Relaxed);
}

/// Warn about a file being overwritten during a recursive copy, unless
/// `--hide-conflicts` is set.
pub fn conflict(path: &std::path::Path) {
    if HIDE_CONFLICTS.load(Ordering::Relaxed) {
        return;
    }
    warning(&format!("overwriting existing file: {}", path.display()));
}

fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// "==> building gcc"
pub fn action(message: &str) {
    if quiet() {
        return;
    }
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// "  -> configure"
pub fn sub_action(phase: &str) {
    if quiet() {
        return;
    }
    println!("  {} {}", "->".cyan(), phase);
}

/// "     $ sh -c '...'", shown only with --verbose
pub fn command_line(command: &str) {
    if !is_verbose() {
        return;
    }
    println!("     {} {}", "$".dimmed(), command.dimmed());
}

pub fn detail(message: &str) {
    if quiet() {
        return;
    }
    println!("     {}", message.dimmed());
}

pub fn success(message: &str) {
    if quiet() {
        return;
    }
    println!("{} {}", "==>".green().bold(), message.green());
}

pub fn skip(message: &str) {
    if quiet() {
        return;
    }
    println!("{} {}", "==>".dimmed(), message.dimmed());
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// A spinner for a long-running container invocation. Disabled entirely
/// under `--quiet`.
pub fn build_spinner(message: &str) -> Option<ProgressBar> {
    if quiet() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    Some(pb)
}

pub fn progress_done(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

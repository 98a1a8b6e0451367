//! Command-line surface: flag table from the external interfaces design,
//! parsed with `clap`'s derive API the way the teacher's own binaries do.

use std::path::PathBuf;

use clap::Parser;

use crate::recipe::Namespace;

/// Names the embedder already binds as stage built-ins; `--var` is not
/// allowed to shadow them, since doing so would silently break whichever
/// stage happens to use that name internally.
pub const RESERVED_VAR_NAMES: &[&str] = &[
    "prefix",
    "sysroot_dir",
    "sources_dir",
    "cache_dir",
    "build_dir",
    "install_dir",
    "source_dir",
    "thread_count",
];

#[derive(Parser, Debug)]
#[command(name = "chariot")]
#[command(about = "Reproducible, containerized build orchestrator for cross-compilation toolchains")]
#[command(version)]
pub struct Cli {
    /// Recipe file to load.
    #[arg(long, default_value = "./config.chariot")]
    pub config: PathBuf,

    /// Shell the base image and exit, instead of building anything.
    #[arg(long)]
    pub exec: Option<String>,

    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Suppress copy-over-existing warnings during dependency staging.
    #[arg(long)]
    pub hide_conflicts: bool,

    /// `key=value` embedder variable override. May be repeated.
    #[arg(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Delete and reinstall the base image before building anything.
    #[arg(long)]
    pub wipe_container: bool,

    /// Wipe each forced recipe's `cache/` directory before building.
    #[arg(long)]
    pub clean_cache: bool,

    /// Sets the `thread_count` embedder variable; defaults to the number
    /// of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get())]
    pub thread_count: usize,

    /// Cache root override; defaults to `.chariot-cache` next to the
    /// config file.
    #[arg(long, env = "CHARIOT_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// `namespace/name` recipes to force-rebuild (e.g. `host/gcc`).
    #[arg(value_parser = parse_target)]
    pub targets: Vec<(Namespace, String)>,
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("`--var` expects key=value, got `{s}`"))?;
    if RESERVED_VAR_NAMES.iter().any(|r| r.eq_ignore_ascii_case(key)) {
        return Err(format!("`{key}` is a reserved built-in variable name"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_target(s: &str) -> Result<(Namespace, String), String> {
    let (namespace, name) = s
        .split_once('/')
        .ok_or_else(|| format!("expected `namespace/name`, got `{s}`"))?;
    let namespace = Namespace::parse(namespace)
        .ok_or_else(|| format!("unknown namespace `{namespace}` (expected source/host/target)"))?;
    Ok((namespace, name.to_string()))
}

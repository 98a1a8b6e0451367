//! `chariot` binary entry point: parse the CLI, load and resolve the
//! recipe set, and drive the orchestrator over the requested targets.
//! This is the sole place a `Result` is downgraded to a process exit
//! code; every library function below it returns `Result` and
//! propagates with `?`.

use std::process::ExitCode;

use clap::Parser;

use chariot::cli::Cli;
use chariot::container::{BubblewrapRuntime, Container};
use chariot::image;
use chariot::layout::Layout;
use chariot::orchestrator::{invalidate_targets, Orchestrator};
use chariot::recipe::parser::parse_config;
use chariot::recipe::resolver::resolve;
use chariot::{output, paths, ChariotError, Result};

fn main() -> ExitCode {
    let cli = Cli::parse();

    output::set_quiet(cli.quiet);
    output::set_verbose(cli.verbose);
    output::set_hide_conflicts(cli.hide_conflicts);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let layout = Layout::resolve(cli.cache_dir.as_deref(), &cli.config);
    std::fs::create_dir_all(layout.root()).map_err(|e| ChariotError::io(layout.root(), e))?;
    let _lock = chariot::lock::acquire(&layout.lock_file())?;

    let runtime = BubblewrapRuntime;

    if cli.wipe_container {
        output::action("wiping base image");
        paths::remove_dir_recursive(&layout.sets_dir())?;
    }

    if matches!(paths::exists(&layout.base_rootfs()), paths::Existence::Absent) {
        image::install_base_rootfs(&layout, &runtime)?;
    }

    let set = parse_config(&cli.config)?;
    resolve(&set)?;

    if let Some(command) = &cli.exec {
        let mut container = Container::make(&runtime, layout.base_rootfs(), "/");
        container.set_silence(false, false);
        chariot::container::run_shell_checked(
            &container,
            chariot::recipe::Namespace::Host,
            "<exec>",
            command,
        )?;
        return Ok(());
    }

    if cli.clean_cache {
        for (_, recipe) in set.iter() {
            let cache_dir = layout.recipe_cache_dir(recipe.namespace, &recipe.name);
            paths::remove_dir_recursive(&cache_dir)?;
        }
    }

    let ids = invalidate_targets(&set, &cli.targets)?;

    let orchestrator = Orchestrator::new(&layout, &set, &runtime, cli.vars.clone(), cli.thread_count);

    let mut had_failure = false;
    for id in ids {
        if let Err(e) = orchestrator.process_recipe(id) {
            output::error(&e.to_string());
            had_failure = true;
        }
    }

    if had_failure {
        return Err(ChariotError::ContainerExec {
            namespace: chariot::recipe::Namespace::Host,
            name: "<targets>".to_string(),
            command: "one or more forced targets failed".to_string(),
            status: None,
        });
    }

    output::success("build complete");
    Ok(())
}

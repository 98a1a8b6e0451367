//! Per-namespace stage executors: source fetch/verify/extract/patch/strap,
//! and host/target configure/build/install.

pub mod host_target;
pub mod source;

use crate::container::{Container, Runtime};
use crate::error::Result;
use crate::layout::Layout;
use crate::recipe::{Recipe, RecipeSet};
use crate::staging::Staged;

/// Dispatch on namespace to the appropriate stage executor. Called by the
/// orchestrator once a recipe's dependencies are staged and its sandbox
/// rootfs is ready.
pub fn run(
    layout: &Layout,
    set: &RecipeSet,
    runtime: &dyn Runtime,
    recipe: &Recipe,
    rootfs: &std::path::Path,
    staged: &Staged,
    user_vars: &[(String, String)],
    thread_count: usize,
) -> Result<()> {
    match recipe.namespace {
        crate::recipe::Namespace::Source => {
            source::run(layout, runtime, recipe, rootfs, staged, user_vars)
        }
        crate::recipe::Namespace::Host | crate::recipe::Namespace::Target => {
            host_target::run(
                layout,
                set,
                runtime,
                recipe,
                rootfs,
                staged,
                user_vars,
                thread_count,
            )
        }
    }
}

pub(crate) fn make_container<'a>(
    runtime: &'a dyn Runtime,
    rootfs: &std::path::Path,
    cwd: &std::path::Path,
) -> Container<'a> {
    let mut container = Container::make(runtime, rootfs, cwd);
    container.set_silence(!crate::output::is_verbose(), false);
    container
}

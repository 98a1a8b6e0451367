//! Source recipe stage executor: fetch, verify, extract, patch, strap.

use std::path::Path;

use crate::container::{run_checked, run_shell_checked, Runtime};
use crate::embed::{expand, Scope};
use crate::error::{ChariotError, Result};
use crate::layout::Layout;
use crate::paths;
use crate::recipe::{Namespace, Recipe, SourceType};
use crate::staging::Staged;
use crate::stages::make_container;

const MOUNT_SOURCE: &str = "/chariot/source";
const MOUNT_PATCHES: &str = "/chariot/patches";
const MOUNT_SOURCES: &str = "/chariot/sources";
const MOUNT_HOST: &str = "/usr/local";
const MOUNT_SYSROOT: &str = "/chariot/sysroot";

pub fn run(
    layout: &Layout,
    runtime: &dyn Runtime,
    recipe: &Recipe,
    rootfs: &Path,
    staged: &Staged,
    user_vars: &[(String, String)],
) -> Result<()> {
    let body = recipe
        .as_source()
        .expect("source::run called on a non-source recipe");

    let recipe_dir = layout.recipe_dir(Namespace::Source, &recipe.name);
    let src_dir = layout.recipe_src_dir(Namespace::Source, &recipe.name);
    paths::clean(&recipe_dir)?;
    std::fs::create_dir_all(&src_dir).map_err(|e| ChariotError::io(&src_dir, e))?;

    // Deletion of `recipe_dir` on failure is the orchestrator's
    // responsibility (it owns the recipe lifecycle); this executor just
    // propagates the first error.
    fetch(layout, runtime, recipe, rootfs, &recipe_dir, body)?;

    let mut container = make_container(runtime, rootfs, Path::new(MOUNT_SOURCE));
    container.clear_mounts();
    container.bind(&src_dir, MOUNT_SOURCE, false);

    if let Some(patch) = &body.patch {
        let patch_path = layout.patch_file(patch);
        if matches!(paths::exists(&patch_path), paths::Existence::Absent) {
            return Err(ChariotError::MissingPatchFile {
                namespace: Namespace::Source,
                name: recipe.name.clone(),
                path: patch_path,
            });
        }
        container.bind(layout.patches_dir(), MOUNT_PATCHES, true);
        let cmd = format!("patch -p1 -i {MOUNT_PATCHES}/{patch}");
        run_shell_checked(&container, Namespace::Source, &recipe.name, &cmd)?;
    }

    if let Some(strap) = &body.strap {
        container.bind(layout.deps_source_dir(), MOUNT_SOURCES, false);
        container.bind(layout.deps_host_dir(), MOUNT_HOST, false);
        container.bind(layout.deps_target_dir(), MOUNT_SYSROOT, false);

        let builtins = vec![("sources_dir", MOUNT_SOURCES.to_string())];
        let scope = Scope::new(builtins, user_vars);
        let expanded = expand(strap, &scope)?;

        crate::output::sub_action("strap");
        run_shell_checked(&container, Namespace::Source, &recipe.name, &expanded)?;
    }

    let _ = staged; // image deps for source recipes are consumed by the rootfs already in use

    Ok(())
}

fn fetch(
    layout: &Layout,
    runtime: &dyn Runtime,
    recipe: &Recipe,
    rootfs: &Path,
    recipe_dir: &Path,
    body: &crate::recipe::SourceBody,
) -> Result<()> {
    let mut container = make_container(runtime, rootfs, Path::new(MOUNT_SOURCE));
    container.bind(recipe_dir, MOUNT_SOURCE, false);

    match body.source_type {
        SourceType::TarGz | SourceType::TarXz => {
            let b2sum = body.b2sum.as_ref().expect("validated at parse time");
            let b2sums_path = layout.recipe_b2sums(Namespace::Source, &recipe.name);
            std::fs::write(&b2sums_path, format!("{b2sum} /chariot/source/archive\n"))
                .map_err(|e| ChariotError::io(&b2sums_path, e))?;

            crate::output::sub_action("download");
            let archive_path = format!("{MOUNT_SOURCE}/archive");
            run_checked(
                &container,
                Namespace::Source,
                &recipe.name,
                &["wget", "-q", "-O", archive_path.as_str(), body.url.as_str()],
            )?;

            crate::output::sub_action("verify");
            if run_checked(
                &container,
                Namespace::Source,
                &recipe.name,
                &["b2sum", "--check", "b2sums.txt"],
            )
            .is_err()
            {
                return Err(ChariotError::Verification {
                    namespace: Namespace::Source,
                    name: recipe.name.clone(),
                    url: body.url.clone(),
                });
            }

            crate::output::sub_action("extract");
            let tar_flag = match body.source_type {
                SourceType::TarGz => "--gzip",
                SourceType::TarXz => "--xz",
                _ => unreachable!(),
            };
            let src_path = format!("{MOUNT_SOURCE}/src");
            run_checked(&container, Namespace::Source, &recipe.name, &["mkdir", "-p", src_path.as_str()])?;
            run_checked(
                &container,
                Namespace::Source,
                &recipe.name,
                &[
                    "tar",
                    "--strip-components",
                    "1",
                    "-x",
                    tar_flag,
                    "-C",
                    src_path.as_str(),
                    "-f",
                    archive_path.as_str(),
                ],
            )?;
        }
        SourceType::Git => {
            let commit = body.commit.as_ref().expect("validated at parse time").as_str();
            let src_path = format!("{MOUNT_SOURCE}/src");

            crate::output::sub_action("clone");
            run_checked(
                &container,
                Namespace::Source,
                &recipe.name,
                &["git", "clone", "--depth=1", body.url.as_str(), src_path.as_str()],
            )?;

            container.set_cwd(&src_path);
            run_checked(
                &container,
                Namespace::Source,
                &recipe.name,
                &["git", "fetch", "--depth=1", "origin", commit],
            )?;
            run_checked(&container, Namespace::Source, &recipe.name, &["git", "checkout", commit])?;
        }
        SourceType::Local => {
            let local_path = Path::new(&body.url);
            if matches!(paths::exists(local_path), paths::Existence::Absent) {
                return Err(ChariotError::io(
                    local_path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "local source path missing"),
                ));
            }
            crate::output::sub_action("copy");
            paths::copy_recursive(local_path, &recipe_dir.join("src"))?;
        }
    }

    Ok(())
}

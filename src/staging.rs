//! Dependency staging: for a recipe `R`, walk its dependencies
//! depth-first and copy each one's prior output into the per-run scratch
//! mount points, so the orchestrator can bind them into `R`'s container.

use std::collections::HashSet;

use crate::error::Result;
use crate::layout::Layout;
use crate::paths;
use crate::recipe::{Namespace, Recipe, RecipeId, RecipeSet};

#[derive(Debug, Default)]
pub struct Staged {
    /// Deduplicated, pre-sort-order image package names accumulated
    /// across the whole walk.
    pub image_packages: Vec<String>,
}

/// Stage every transitive dependency of `recipe` into `deps/{source,host,target}`
/// under `layout`. `recipe`'s own dependency list (and its own image
/// dependencies) are honored unconditionally; every dependency staged
/// below that point only pulls in its *runtime* sub-dependencies and
/// *runtime* image dependencies, matching the behavior carried over from
/// the source project's staging walk (see the design note on
/// dependency-staging in the project notes — the runtime filter applies
/// even to the direct descendants of the walk's own root, which drops
/// non-runtime transitive build deps and image deps beyond the first
/// level; this is preserved rather than "fixed").
pub fn stage(layout: &Layout, set: &RecipeSet, recipe: &Recipe) -> Result<Staged> {
    let mut installed: HashSet<(Namespace, String)> = HashSet::new();
    let mut staged = Staged::default();

    for dep in &recipe.dependencies {
        let id = dep.resolved.get().expect("dependency resolved before staging");
        stage_one(layout, set, id, &mut installed, &mut staged)?;
    }

    staged.image_packages.extend(
        recipe
            .image_dependencies
            .iter()
            .map(|d| d.name.clone()),
    );
    staged.image_packages.sort();
    staged.image_packages.dedup();

    Ok(staged)
}

fn stage_one(
    layout: &Layout,
    set: &RecipeSet,
    id: RecipeId,
    installed: &mut HashSet<(Namespace, String)>,
    staged: &mut Staged,
) -> Result<()> {
    let dep_recipe = set.get(id);
    let key = (dep_recipe.namespace, dep_recipe.name.clone());
    if installed.contains(&key) {
        return Ok(());
    }
    installed.insert(key);

    stage_output(layout, dep_recipe)?;

    staged.image_packages.extend(
        dep_recipe
            .image_dependencies
            .iter()
            .filter(|d| d.runtime)
            .map(|d| d.name.clone()),
    );

    for sub_dep in &dep_recipe.dependencies {
        if !sub_dep.runtime {
            continue;
        }
        let sub_id = sub_dep
            .resolved
            .get()
            .expect("dependency resolved before staging");
        stage_one(layout, set, sub_id, installed, staged)?;
    }

    Ok(())
}

fn stage_output(layout: &Layout, dep: &Recipe) -> Result<()> {
    match dep.namespace {
        Namespace::Source => {
            let dst = layout.deps_source_dir().join(&dep.name);
            let src = layout.recipe_src_dir(Namespace::Source, &dep.name);
            paths::copy_recursive(&src, &dst)
        }
        Namespace::Host => {
            let dst = layout.deps_host_dir();
            let src = layout
                .recipe_install_dir(Namespace::Host, &dep.name)
                .join("usr/local");
            if matches!(paths::exists(&src), paths::Existence::Present) {
                paths::copy_recursive(&src, &dst)
            } else {
                Ok(())
            }
        }
        Namespace::Target => {
            let dst = layout.deps_target_dir();
            let src = layout.recipe_install_dir(Namespace::Target, &dep.name);
            if matches!(paths::exists(&src), paths::Existence::Present) {
                paths::copy_recursive(&src, &dst)
            } else {
                Ok(())
            }
        }
    }
}

/// Clean the three per-run scratch directories before staging begins.
pub fn reset_scratch(layout: &Layout) -> Result<()> {
    paths::clean(&layout.deps_source_dir())?;
    paths::clean(&layout.deps_host_dir())?;
    paths::clean(&layout.deps_target_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parser::parse_config;
    use crate::recipe::resolver::resolve;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn stages_host_dependency_install_tree() {
        let f = write_temp(
            r#"
            host/app {
                dependencies: [ host/libfoo ]
            }
            host/libfoo {
            }
            "#,
        );
        let set = parse_config(f.path()).unwrap();
        resolve(&set).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let libfoo_install = layout
            .recipe_install_dir(Namespace::Host, "libfoo")
            .join("usr/local/lib");
        std::fs::create_dir_all(&libfoo_install).unwrap();
        std::fs::write(libfoo_install.join("libfoo.so"), "binary").unwrap();

        reset_scratch(&layout).unwrap();
        let app = set.get(set.find(Namespace::Host, "app").unwrap());
        stage(&layout, &set, app).unwrap();

        assert!(layout.deps_host_dir().join("lib/libfoo.so").exists());
    }

    #[test]
    fn runtime_filter_drops_non_runtime_transitive_deps() {
        let f = write_temp(
            r#"
            host/app {
                dependencies: [ host/direct ]
            }
            host/direct {
                dependencies: [ host/transitive_build_only ]
            }
            host/transitive_build_only {
            }
            "#,
        );
        let set = parse_config(f.path()).unwrap();
        resolve(&set).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        for name in ["direct", "transitive_build_only"] {
            std::fs::create_dir_all(
                layout
                    .recipe_install_dir(Namespace::Host, name)
                    .join("usr/local"),
            )
            .unwrap();
        }

        reset_scratch(&layout).unwrap();
        let app = set.get(set.find(Namespace::Host, "app").unwrap());
        let staged = stage(&layout, &set, app).unwrap();
        assert!(staged.image_packages.is_empty());
        // `direct` is staged (it's in R's own dependency list).
        assert!(layout.deps_host_dir().exists());
    }

    #[test]
    fn runtime_filter_drops_non_runtime_image_deps_of_a_non_root_dependency() {
        let f = write_temp(
            r#"
            host/app {
                dependencies: [ host/direct ]
            }
            host/direct {
                dependencies: [ image/buildonly ]
            }
            "#,
        );
        let set = parse_config(f.path()).unwrap();
        resolve(&set).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(
            layout.recipe_install_dir(Namespace::Host, "direct").join("usr/local"),
        )
        .unwrap();

        reset_scratch(&layout).unwrap();
        let app = set.get(set.find(Namespace::Host, "app").unwrap());
        let staged = stage(&layout, &set, app).unwrap();

        // `buildonly` is a non-`*` (non-runtime) image dependency of `direct`,
        // a non-root dependency, so it must not propagate to `app`'s image set.
        assert!(!staged.image_packages.contains(&"buildonly".to_string()));
    }

    #[test]
    fn dependency_is_staged_at_most_once() {
        let f = write_temp(
            r#"
            host/app {
                dependencies: [ *host/shared *host/other ]
            }
            host/shared {
            }
            host/other {
                dependencies: [ *host/shared ]
            }
            "#,
        );
        let set = parse_config(f.path()).unwrap();
        resolve(&set).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        reset_scratch(&layout).unwrap();
        let app = set.get(set.find(Namespace::Host, "app").unwrap());
        // Should not panic/loop forever even though `shared` is reachable
        // through two paths.
        stage(&layout, &set, app).unwrap();
    }
}

//! The build orchestrator: a dependency-driven, incremental, memoized
//! recursive walk over the recipe graph.

use std::collections::HashSet;

use crate::container::Runtime;
use crate::error::Result;
use crate::image;
use crate::layout::Layout;
use crate::paths;
use crate::recipe::{Namespace, RecipeId, RecipeSet};
use crate::staging;
use crate::stages;

pub struct Orchestrator<'a> {
    layout: &'a Layout,
    set: &'a RecipeSet,
    runtime: &'a dyn Runtime,
    user_vars: Vec<(String, String)>,
    thread_count: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        layout: &'a Layout,
        set: &'a RecipeSet,
        runtime: &'a dyn Runtime,
        user_vars: Vec<(String, String)>,
        thread_count: usize,
    ) -> Self {
        Orchestrator {
            layout,
            set,
            runtime,
            user_vars,
            thread_count,
        }
    }

    /// Process `id` and every recipe it (transitively) depends on.
    /// Idempotent: a second call against the same recipe within the same
    /// run is a no-op once `built`/`failed` has been set.
    pub fn process_recipe(&self, id: RecipeId) -> Result<()> {
        let mut visiting = HashSet::new();
        self.process_recipe_inner(id, &mut visiting)
    }

    fn process_recipe_inner(&self, id: RecipeId, visiting: &mut HashSet<usize>) -> Result<()> {
        let recipe = self.set.get(id);

        if !visiting.insert(id.0) {
            // A cyclic input is the user's error and is not detected
            // beyond not re-entering infinitely; we simply stop recursing
            // a second time into a recipe already on the current path.
            return Ok(());
        }

        if let Some(ht) = recipe.as_host_target() {
            if let Some(source_id) = ht.source.get() {
                self.process_recipe_inner(source_id, visiting)?;
            }
        }

        for dep in &recipe.dependencies {
            let dep_id = dep.resolved.get().expect("dependencies resolved before orchestration");
            self.process_recipe_inner(dep_id, visiting)?;
        }

        if recipe.status.built.get() || recipe.status.failed.get() {
            visiting.remove(&id.0);
            return Ok(());
        }

        let recipe_dir = self.layout.recipe_dir(recipe.namespace, &recipe.name);
        let has_cache = matches!(paths::exists(&recipe_dir), paths::Existence::Present);
        if has_cache && !recipe.status.invalidated.get() {
            crate::output::skip(&format!("{} already built, skipping", recipe.display_name()));
            recipe.status.built.set(true);
            visiting.remove(&id.0);
            return Ok(());
        }

        crate::output::action(&format!("building {}", recipe.display_name()));

        let result = self.build_one(id);

        match &result {
            Ok(()) => recipe.status.built.set(true),
            Err(_) => {
                recipe.status.failed.set(true);
                let _ = paths::remove_dir_recursive(&recipe_dir);
            }
        }

        visiting.remove(&id.0);
        result
    }

    fn build_one(&self, id: RecipeId) -> Result<()> {
        let recipe = self.set.get(id);

        staging::reset_scratch(self.layout)?;
        let staged = staging::stage(self.layout, self.set, recipe)?;

        let packages = image::canonical_key(&staged.image_packages);
        let image_dir = image::image_for(self.layout, self.runtime, &packages)?;
        let rootfs = if packages.is_empty() {
            self.layout.base_rootfs()
        } else {
            image_dir.join("rootfs")
        };

        stages::run(
            self.layout,
            self.set,
            self.runtime,
            recipe,
            &rootfs,
            &staged,
            &self.user_vars,
            self.thread_count,
        )?;

        crate::output::success(&format!("{} built", recipe.display_name()));
        Ok(())
    }
}

/// Mark every recipe in `targets` (by `(namespace, name)`) as invalidated,
/// forcing it to rebuild even if its cache directory is already present.
/// This is the "--force"-shaped semantic from the design notes: a forced
/// recipe always runs its stage commands, independent of whether its
/// cache happened to be stale.
pub fn invalidate_targets(set: &RecipeSet, targets: &[(Namespace, String)]) -> Result<Vec<RecipeId>> {
    let mut ids = Vec::new();
    for (namespace, name) in targets {
        let id = set.find(*namespace, name).ok_or_else(|| {
            crate::error::ChariotError::Resolve {
                referrer: "<cli>".to_string(),
                namespace: *namespace,
                name: name.clone(),
            }
        })?;
        set.get(id).status.invalidated.set(true);
        ids.push(id);
    }
    Ok(ids)
}

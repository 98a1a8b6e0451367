//! The recipe data model: namespaces, the common recipe envelope, and the
//! per-namespace payload.
//!
//! Recipes live in a flat arena (`RecipeSet`) and reference each other by
//! `RecipeId` rather than by pointer; forward references recorded during
//! parsing are filled in by [`crate::recipe::resolver`].

pub mod parser;
pub mod resolver;

use std::cell::Cell;
use std::fmt;

/// Index into a [`RecipeSet`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecipeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Source,
    Host,
    Target,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Source => "source",
            Namespace::Host => "host",
            Namespace::Target => "target",
        }
    }

    pub fn parse(s: &str) -> Option<Namespace> {
        match s {
            "source" => Some(Namespace::Source),
            "host" => Some(Namespace::Host),
            "target" => Some(Namespace::Target),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference to another recipe, resolved after the full set is parsed.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub namespace: Namespace,
    pub name: String,
    pub runtime: bool,
    pub resolved: Cell<Option<RecipeId>>,
}

impl Dependency {
    pub fn new(namespace: Namespace, name: impl Into<String>, runtime: bool) -> Self {
        Dependency {
            namespace,
            name: name.into(),
            runtime,
            resolved: Cell::new(None),
        }
    }
}

/// A reference to a package installed into the layered sandbox image.
#[derive(Debug, Clone)]
pub struct ImageDependency {
    pub name: String,
    pub runtime: bool,
}

/// Mutable per-recipe lifecycle state, flipped by the orchestrator.
#[derive(Debug, Default)]
pub struct Status {
    pub built: Cell<bool>,
    pub failed: Cell<bool>,
    pub invalidated: Cell<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    TarGz,
    TarXz,
    Git,
    Local,
}

impl SourceType {
    pub fn parse(s: &str) -> Option<SourceType> {
        match s {
            "tar.gz" => Some(SourceType::TarGz),
            "tar.xz" => Some(SourceType::TarXz),
            "git" => Some(SourceType::Git),
            "local" => Some(SourceType::Local),
            _ => None,
        }
    }

    pub fn is_tar(&self) -> bool {
        matches!(self, SourceType::TarGz | SourceType::TarXz)
    }
}

#[derive(Debug)]
pub struct SourceBody {
    pub url: String,
    pub source_type: SourceType,
    pub b2sum: Option<String>,
    pub commit: Option<String>,
    pub patch: Option<String>,
    pub strap: Option<String>,
}

#[derive(Debug)]
pub struct HostTargetBody {
    /// Filled in by the resolver from the textual `source:` field.
    pub source_name: Option<String>,
    pub source: Cell<Option<RecipeId>>,
    pub configure: Option<String>,
    pub build: Option<String>,
    pub install: Option<String>,
}

#[derive(Debug)]
pub enum RecipeBody {
    Source(SourceBody),
    HostTarget(HostTargetBody),
}

/// The common envelope every recipe carries, regardless of namespace.
#[derive(Debug)]
pub struct Recipe {
    pub namespace: Namespace,
    pub name: String,
    pub dependencies: Vec<Dependency>,
    pub image_dependencies: Vec<ImageDependency>,
    pub status: Status,
    pub body: RecipeBody,
}

impl Recipe {
    pub fn key(&self) -> (Namespace, &str) {
        (self.namespace, self.name.as_str())
    }

    pub fn display_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn as_source(&self) -> Option<&SourceBody> {
        match &self.body {
            RecipeBody::Source(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_host_target(&self) -> Option<&HostTargetBody> {
        match &self.body {
            RecipeBody::HostTarget(h) => Some(h),
            _ => None,
        }
    }
}

/// The full, flat arena of recipes produced by the parser and consumed by
/// everything downstream. Recipes are addressed by [`RecipeId`], never by
/// reference into another container, so the set can be passed around and
/// indexed freely without lifetime gymnastics.
#[derive(Debug, Default)]
pub struct RecipeSet {
    recipes: Vec<Recipe>,
}

impl RecipeSet {
    pub fn new() -> Self {
        RecipeSet {
            recipes: Vec::new(),
        }
    }

    pub fn push(&mut self, recipe: Recipe) -> RecipeId {
        let id = RecipeId(self.recipes.len());
        self.recipes.push(recipe);
        id
    }

    pub fn get(&self, id: RecipeId) -> &Recipe {
        &self.recipes[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecipeId, &Recipe)> {
        self.recipes
            .iter()
            .enumerate()
            .map(|(i, r)| (RecipeId(i), r))
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Resolve by `(namespace, name)`, the sole lookup key recipes are
    /// addressed by from the outside (the CLI's force-targets, dependency
    /// entries before resolution, `source:` fields).
    pub fn find(&self, namespace: Namespace, name: &str) -> Option<RecipeId> {
        self.recipes
            .iter()
            .position(|r| r.namespace == namespace && r.name == name)
            .map(RecipeId)
    }
}

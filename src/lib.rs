//! Reproducible, containerized build orchestrator for cross-compilation
//! toolchains. A recipe file describes a graph of `source`/`host`/`target`
//! packages; this crate parses it, resolves dependencies, composes a
//! layered sandbox image per recipe, and walks the graph building each
//! one inside a container.

pub mod cli;
pub mod container;
pub mod embed;
pub mod error;
pub mod image;
pub mod layout;
pub mod lock;
pub mod orchestrator;
pub mod output;
pub mod paths;
pub mod recipe;
pub mod stages;
pub mod staging;

pub use error::{ChariotError, Result};

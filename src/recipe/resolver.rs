//! The resolution pass: binds every dependency's textual `(namespace,
//! name)` reference to a concrete [`RecipeId`] in the flat set, and links
//! host/target `source:` references to their source recipe.
//!
//! Parsing and resolution are split into two passes because recipes are
//! allowed to reference recipes declared later in the file (or in a file
//! imported afterwards) — by the time resolution runs the whole set is
//! known, so every name exists somewhere in the arena or the reference is
//! genuinely dangling.

use crate::error::{ChariotError, Result};
use crate::recipe::{Namespace, RecipeBody, RecipeSet};

/// Resolve every dependency and `source:` reference in `set`, in place.
/// Fatal on the first unresolved reference, naming both the referrer and
/// the missing target.
pub fn resolve(set: &RecipeSet) -> Result<()> {
    for (_, recipe) in set.iter() {
        for dep in &recipe.dependencies {
            let target = set.find(dep.namespace, &dep.name).ok_or_else(|| {
                ChariotError::Resolve {
                    referrer: recipe.display_name(),
                    namespace: dep.namespace,
                    name: dep.name.clone(),
                }
            })?;
            dep.resolved.set(Some(target));
        }

        if let RecipeBody::HostTarget(ht) = &recipe.body {
            if let Some(source_name) = &ht.source_name {
                let target = set.find(Namespace::Source, source_name).ok_or_else(|| {
                    ChariotError::Resolve {
                        referrer: recipe.display_name(),
                        namespace: Namespace::Source,
                        name: source_name.clone(),
                    }
                })?;
                ht.source.set(Some(target));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parser::parse_config;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn resolves_forward_references() {
        let f = write_temp(
            r#"
            host/gcc {
                source: gcc_src
                dependencies: [ host/binutils ]
            }
            source/gcc_src {
                url: https://example.com/gcc.tar.gz
                type: tar.gz
                b2sum: deadbeef
            }
            host/binutils {
            }
            "#,
        );
        let set = parse_config(f.path()).unwrap();
        resolve(&set).unwrap();

        let gcc = set.get(set.find(Namespace::Host, "gcc").unwrap());
        let ht = gcc.as_host_target().unwrap();
        assert!(ht.source.get().is_some());
        assert!(gcc.dependencies[0].resolved.get().is_some());
    }

    #[test]
    fn missing_dependency_is_fatal() {
        let f = write_temp(
            r#"
            host/gcc {
                dependencies: [ host/binutils ]
            }
            "#,
        );
        let set = parse_config(f.path()).unwrap();
        let err = resolve(&set).unwrap_err();
        assert!(matches!(err, ChariotError::Resolve { .. }));
    }

    #[test]
    fn missing_source_reference_is_fatal() {
        let f = write_temp(
            r#"
            host/gcc {
                source: nonexistent
            }
            "#,
        );
        let set = parse_config(f.path()).unwrap();
        let err = resolve(&set).unwrap_err();
        assert!(matches!(err, ChariotError::Resolve { .. }));
    }
}

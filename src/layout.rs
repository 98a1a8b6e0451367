//! Resolution of the cache root and typed accessors for every path named
//! in the filesystem layout. No other module should build one of these
//! paths by hand — they all go through here so the on-disk conventions
//! live in exactly one place.

use std::path::{Path, PathBuf};

use crate::recipe::Namespace;

pub const DEFAULT_CACHE_DIR_NAME: &str = ".chariot-cache";

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Layout { root: root.into() }
    }

    /// `--cache-dir` if given, else `./.chariot-cache` next to the config
    /// file, mirroring how the CLI resolves other relative defaults.
    pub fn resolve(cache_dir: Option<&Path>, config_path: &Path) -> Self {
        match cache_dir {
            Some(dir) => Layout::new(dir),
            None => {
                let base = config_path.parent().unwrap_or_else(|| Path::new("."));
                Layout::new(base.join(DEFAULT_CACHE_DIR_NAME))
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(format!("{DEFAULT_CACHE_DIR_NAME}.lock"))
    }

    pub fn sets_dir(&self) -> PathBuf {
        self.root.join("sets")
    }

    pub fn base_rootfs(&self) -> PathBuf {
        self.sets_dir().join("rootfs")
    }

    pub fn deps_dir(&self) -> PathBuf {
        self.root.join("deps")
    }

    pub fn deps_source_dir(&self) -> PathBuf {
        self.deps_dir().join("source")
    }

    pub fn deps_host_dir(&self) -> PathBuf {
        self.deps_dir().join("host")
    }

    pub fn deps_target_dir(&self) -> PathBuf {
        self.deps_dir().join("target")
    }

    pub fn patches_dir(&self) -> PathBuf {
        self.root.join("patches")
    }

    pub fn patch_file(&self, filename: &str) -> PathBuf {
        self.patches_dir().join(filename)
    }

    /// `<namespace>/<name>/` under the cache root — a recipe's permanent
    /// output directory.
    pub fn recipe_dir(&self, namespace: Namespace, name: &str) -> PathBuf {
        self.root.join(namespace.as_str()).join(name)
    }

    pub fn recipe_src_dir(&self, namespace: Namespace, name: &str) -> PathBuf {
        self.recipe_dir(namespace, name).join("src")
    }

    pub fn recipe_build_dir(&self, namespace: Namespace, name: &str) -> PathBuf {
        self.recipe_dir(namespace, name).join("build")
    }

    pub fn recipe_cache_dir(&self, namespace: Namespace, name: &str) -> PathBuf {
        self.recipe_dir(namespace, name).join("cache")
    }

    pub fn recipe_install_dir(&self, namespace: Namespace, name: &str) -> PathBuf {
        self.recipe_dir(namespace, name).join("install")
    }

    pub fn recipe_archive(&self, namespace: Namespace, name: &str) -> PathBuf {
        self.recipe_dir(namespace, name).join("archive")
    }

    pub fn recipe_b2sums(&self, namespace: Namespace, name: &str) -> PathBuf {
        self.recipe_dir(namespace, name).join("b2sums.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_next_to_config() {
        let layout = Layout::resolve(None, Path::new("/proj/config.chariot"));
        assert_eq!(layout.root(), Path::new("/proj/.chariot-cache"));
    }

    #[test]
    fn resolve_honors_explicit_cache_dir() {
        let layout = Layout::resolve(Some(Path::new("/tmp/cc")), Path::new("/proj/config.chariot"));
        assert_eq!(layout.root(), Path::new("/tmp/cc"));
    }

    #[test]
    fn recipe_dir_layout() {
        let layout = Layout::new("/cache");
        assert_eq!(
            layout.recipe_src_dir(Namespace::Source, "hello"),
            PathBuf::from("/cache/source/hello/src")
        );
        assert_eq!(
            layout.recipe_install_dir(Namespace::Host, "gcc"),
            PathBuf::from("/cache/host/gcc/install")
        );
    }
}

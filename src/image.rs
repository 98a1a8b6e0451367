//! Content-addressed, layered rootfs images.
//!
//! A sorted, deduplicated sequence of package names is the cache key: the
//! layer chain for `[p1, p2, p3]` is `sets/p1/p2/p3`, each level built by
//! hard-link-cloning its parent's `rootfs/` and installing exactly one
//! more package. Sorting makes the key canonical, so any two recipes
//! whose package sets overlap share a common prefix of layers on disk.

use std::path::PathBuf;

use crate::container::{run_checked, Container, Runtime};
use crate::error::Result;
use crate::layout::Layout;
use crate::paths;

/// Deduplicate and sort a package list into the canonical cache key order.
/// ASCII byte order, matching a plain `strcmp`-style comparison.
pub fn canonical_key(packages: &[String]) -> Vec<String> {
    let mut sorted: Vec<String> = packages.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}

const ARCH_BOOTSTRAP_URL: &str =
    "https://archive.archlinux.org/iso/2024.09.01/archlinux-bootstrap-x86_64.tar.zst";

/// Populate an empty base rootfs with a minimal Arch Linux install: fetch
/// and extract the bootstrap tarball, then initialize pacman and pull in
/// the base package set every recipe build needs. All-or-nothing — on any
/// failure the partially-populated directory is removed rather than left
/// behind for a later run to mistake for a complete image.
pub fn install_base_rootfs(layout: &Layout, runtime: &dyn Runtime) -> Result<()> {
    let rootfs = layout.base_rootfs();
    if let Err(e) = bootstrap_base_rootfs(&rootfs, runtime) {
        let _ = paths::remove_dir_recursive(&rootfs);
        return Err(e);
    }
    Ok(())
}

fn bootstrap_base_rootfs(rootfs: &PathBuf, runtime: &dyn Runtime) -> Result<()> {
    crate::output::action("installing the chariot container");
    std::fs::create_dir_all(rootfs).map_err(|e| crate::error::ChariotError::io(rootfs, e))?;

    // Needs a pipe, and the rootfs has no binaries of its own yet, so this
    // runs directly on the host shell rather than through the (still
    // nonexistent) sandbox.
    let download_cmd = format!(
        "wget -qO- {ARCH_BOOTSTRAP_URL} | tar --strip-components 1 -x --zstd -C {}",
        rootfs.display()
    );
    let status = std::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(&download_cmd)
        .status()
        .map_err(|e| crate::error::ChariotError::io(rootfs, e))?;
    if !status.success() {
        return Err(crate::error::ChariotError::ContainerExec {
            namespace: crate::recipe::Namespace::Host,
            name: "<bootstrap>".to_string(),
            command: download_cmd,
            status: status.code(),
        });
    }

    let mut container = Container::make(runtime, rootfs, "/root");
    container.set_silence(!crate::output::is_verbose(), !crate::output::is_verbose());

    const STEPS: &[&str] = &[
        "echo 'Server = https://archive.archlinux.org/repos/2024/09/01/$repo/os/$arch' > /etc/pacman.d/mirrorlist",
        "echo 'en_US.UTF-8 UTF-8' > /etc/locale.gen",
        "locale-gen",
        "pacman-key --init",
        "pacman-key --populate archlinux",
        "pacman --noconfirm -Sy archlinux-keyring",
        "pacman --noconfirm -S pacman pacman-mirrorlist",
        "pacman --noconfirm -Syu",
        "pacman --noconfirm -S bison diffutils docbook-xsl flex gettext inetutils libtool libxslt m4 make patch perl python texinfo w3m which wget xmlto curl git",
    ];

    for step in STEPS {
        crate::container::run_shell_checked(&container, crate::recipe::Namespace::Host, "<bootstrap>", step)?;
    }

    Ok(())
}

/// Produce the rootfs path for `packages`, building any missing layers
/// along the way. `packages` must already be sorted and deduplicated
/// (callers go through [`canonical_key`] first so the path and the logged
/// sort step aren't duplicated across call sites).
pub fn image_for<'a>(
    layout: &Layout,
    runtime: &'a dyn Runtime,
    packages: &[String],
) -> Result<PathBuf> {
    let mut chain_dir = layout.sets_dir();
    let mut parent_rootfs = layout.base_rootfs();

    if matches!(paths::exists(&layout.base_rootfs()), paths::Existence::Absent) {
        std::fs::create_dir_all(&parent_rootfs).map_err(|e| crate::error::ChariotError::io(&parent_rootfs, e))?;
    }

    for package in packages {
        chain_dir = chain_dir.join(package);
        let layer_rootfs = chain_dir.join("rootfs");

        match paths::exists(&chain_dir) {
            paths::Existence::Present => {
                parent_rootfs = layer_rootfs;
                continue;
            }
            paths::Existence::Error => {
                return Err(crate::error::ChariotError::io(
                    &chain_dir,
                    std::io::Error::new(std::io::ErrorKind::Other, "could not probe layer"),
                ));
            }
            paths::Existence::Absent => {}
        }

        if let Err(e) = build_layer(&chain_dir, &layer_rootfs, &parent_rootfs, runtime, package) {
            let _ = paths::remove_dir_recursive(&chain_dir);
            return Err(e);
        }

        parent_rootfs = layer_rootfs;
    }

    Ok(chain_dir)
}

fn build_layer(
    chain_dir: &PathBuf,
    layer_rootfs: &PathBuf,
    parent_rootfs: &PathBuf,
    runtime: &dyn Runtime,
    package: &str,
) -> Result<()> {
    std::fs::create_dir_all(chain_dir).map_err(|e| crate::error::ChariotError::io(chain_dir, e))?;
    paths::link_recursive(parent_rootfs, layer_rootfs)?;

    let mut container = Container::make(runtime, layer_rootfs, "/root");
    container.set_silence(!crate::output::is_verbose(), false);
    run_checked(
        &container,
        crate::recipe::Namespace::Host,
        "image",
        &["/usr/bin/pacman", "--noconfirm", "-S", package],
    )
    .map_err(|e| {
        crate::output::warning(&format!("failed to install image package `{package}`: {e}"));
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Runtime;

    struct FakeRuntime;
    impl Runtime for FakeRuntime {
        fn program(&self) -> &str {
            "true"
        }
    }

    #[test]
    fn canonical_key_sorts_and_dedups() {
        let packages = vec!["bison".to_string(), "make".to_string(), "bison".to_string()];
        assert_eq!(canonical_key(&packages), vec!["bison", "make"]);
    }

    #[test]
    fn permuted_equivalent_sets_yield_same_path() {
        let a = canonical_key(&["make".to_string(), "bison".to_string()]);
        let b = canonical_key(&["bison".to_string(), "make".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn image_path_matches_sorted_join() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(layout.base_rootfs()).unwrap();
        let runtime = FakeRuntime;

        let packages = canonical_key(&["bison".to_string(), "make".to_string()]);
        let path = image_for(&layout, &runtime, &packages).unwrap();

        assert_eq!(path, layout.sets_dir().join("bison").join("make"));
        assert!(path.join("rootfs").exists());
    }

    #[test]
    fn existing_layer_is_reused_without_rebuilding() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(layout.base_rootfs()).unwrap();
        std::fs::write(layout.base_rootfs().join("marker"), "base").unwrap();
        let runtime = FakeRuntime;

        let packages = canonical_key(&["make".to_string()]);
        let first = image_for(&layout, &runtime, &packages).unwrap();
        // Mutate the layer to prove the second call doesn't rebuild it.
        std::fs::write(first.join("rootfs/sentinel"), "kept").unwrap();

        let second = image_for(&layout, &runtime, &packages).unwrap();
        assert_eq!(first, second);
        assert!(second.join("rootfs/sentinel").exists());
    }
}

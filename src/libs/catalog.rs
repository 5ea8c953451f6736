//! The native libraries a cardano-node build links against, and how to build them.

use std::path::{Path, PathBuf};

/// How a library gets onto the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    /// Built from a git checkout and installed under the prefix
    Git {
        repo_url: String,
        /// Static library expected in `<prefix>/lib`
        lib_file: String,
        /// Header expected in `<prefix>/include`
        header: String,
        /// Module name for `pkg-config --modversion`
        pkg_config: String,
        /// Ref installed when the operator names none
        pinned_ref: Option<String>,
    },
    /// A Debian package
    Package { package: String },
}

/// One required library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeLibrary {
    pub name: String,
    pub source: LibrarySource,
}

/// One step of a build recipe, run inside the checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStep {
    Run { program: String, args: Vec<String>, sudo: bool },
    /// Write `contents` to a path relative to the checkout
    WriteFile { path: PathBuf, contents: String },
}

impl BuildStep {
    fn run(program: &str, args: &[&str]) -> Self {
        Self::Run {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            sudo: false,
        }
    }

    fn privileged(program: &str, args: Vec<String>) -> Self {
        Self::Run {
            program: program.to_string(),
            args,
            sudo: true,
        }
    }

    /// Short label for logs and error reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Run { program, args, .. } if args.is_empty() => program.clone(),
            Self::Run { program, args, .. } => format!("{program} {}", args.join(" ")),
            Self::WriteFile { path, .. } => format!("write {}", path.display()),
        }
    }
}

impl NativeLibrary {
    fn git(name: &str, repo_url: &str, lib_file: &str, header: &str, pkg_config: &str, pinned: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            source: LibrarySource::Git {
                repo_url: repo_url.to_string(),
                lib_file: lib_file.to_string(),
                header: header.to_string(),
                pkg_config: pkg_config.to_string(),
                pinned_ref: pinned.map(ToString::to_string),
            },
        }
    }

    /// Ref used for a reinstall when the operator names none.
    #[must_use]
    pub fn pinned_ref(&self) -> Option<&str> {
        match &self.source {
            LibrarySource::Git { pinned_ref, .. } => pinned_ref.as_deref(),
            LibrarySource::Package { .. } => None,
        }
    }

    /// Steps that build and install this library from a checkout of `reference`.
    ///
    /// Empty for packages.
    #[must_use]
    pub fn recipe(&self, prefix: &Path, reference: Option<&str>) -> Vec<BuildStep> {
        let prefix_arg = format!("--prefix={}", prefix.display());
        match self.name.as_str() {
            "libsodium" => vec![
                BuildStep::run("./autogen.sh", &[]),
                BuildStep::run("./configure", &[&prefix_arg]),
                BuildStep::run("make", &[]),
                BuildStep::run("make", &["check"]),
                BuildStep::privileged("make", vec!["install".to_string()]),
            ],
            "secp256k1" => vec![
                BuildStep::run("./autogen.sh", &[]),
                BuildStep::run("./configure", &[&prefix_arg, "--enable-module-schnorrsig", "--enable-experimental"]),
                BuildStep::run("make", &[]),
                BuildStep::run("make", &["check"]),
                BuildStep::privileged("make", vec!["install".to_string()]),
                BuildStep::privileged("ldconfig", Vec::new()),
            ],
            "blst" => blst_recipe(prefix, reference),
            _ => Vec::new(),
        }
    }
}

/// blst has no install target: build, then copy the archive, headers and a
/// hand-written pkg-config file into the prefix.
fn blst_recipe(prefix: &Path, reference: Option<&str>) -> Vec<BuildStep> {
    let lib = prefix.join("lib");
    let pkgconfig = lib.join("pkgconfig");
    let include = prefix.join("include");
    let path = |p: &Path| p.display().to_string();

    let mut copy_headers: Vec<String> =
        ["bindings/blst_aux.h", "bindings/blst.h", "bindings/blst.hpp"].iter().map(ToString::to_string).collect();
    copy_headers.push(path(&include));

    vec![
        BuildStep::run("./build.sh", &[]),
        BuildStep::WriteFile {
            path: PathBuf::from("libblst.pc"),
            contents: blst_pkg_config(prefix, reference),
        },
        BuildStep::privileged("mkdir", vec!["-p".to_string(), path(&pkgconfig), path(&include)]),
        BuildStep::privileged("cp", vec!["libblst.pc".to_string(), path(&pkgconfig)]),
        BuildStep::privileged("cp", copy_headers),
        BuildStep::privileged("cp", vec!["libblst.a".to_string(), path(&lib)]),
        BuildStep::privileged(
            "chmod",
            vec![
                "u=rw,go=r".to_string(),
                path(&lib.join("libblst.a")),
                path(&pkgconfig.join("libblst.pc")),
                path(&include.join("blst.h")),
                path(&include.join("blst.hpp")),
                path(&include.join("blst_aux.h")),
            ],
        ),
    ]
}

fn blst_pkg_config(prefix: &Path, reference: Option<&str>) -> String {
    let version = reference.map_or_else(|| "unknown".to_string(), crate::version::normalize);
    format!(
        "prefix={prefix}
exec_prefix=${{prefix}}
libdir=${{exec_prefix}}/lib
includedir=${{prefix}}/include

Name: libblst
Description: Multilingual BLS12-381 signature library
URL: https://github.com/supranational/blst
Version: {version}
Cflags: -I${{includedir}}
Libs: -L${{libdir}} -lblst
",
        prefix = prefix.display()
    )
}

/// Libraries required by cardano-node, in install order.
#[must_use]
pub fn required_libraries() -> Vec<NativeLibrary> {
    vec![
        NativeLibrary::git(
            "libsodium",
            "https://github.com/input-output-hk/libsodium",
            "libsodium.a",
            "sodium.h",
            "libsodium",
            Some("dbb48cc"),
        ),
        NativeLibrary::git(
            "secp256k1",
            "https://github.com/bitcoin-core/secp256k1",
            "libsecp256k1.a",
            "secp256k1.h",
            "libsecp256k1",
            None,
        ),
        NativeLibrary::git(
            "blst",
            "https://github.com/supranational/blst",
            "libblst.a",
            "blst.h",
            "libblst",
            Some("v0.3.14"),
        ),
        NativeLibrary {
            name: "liblmdb-dev".to_string(),
            source: LibrarySource::Package {
                package: "liblmdb-dev".to_string(),
            },
        },
    ]
}

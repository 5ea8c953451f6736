//! Version tokens for managed artifacts.
//!
//! Upstream projects disagree about a leading `v`: cardano-node tags `10.1.4`,
//! blst tags `v0.3.14`, cncli publishes `v6.5.1` but its binary prints `6.5.1`.
//! [`ArtifactVersion`] keeps the token as published and compares on a normalized
//! form, so `8.9.0` and `v8.9.0` are the same release.
//!
//! Upgrade decisions are plain inequality of normalized forms
//! ([`needs_upgrade`]). A semver view exists only so status output can say
//! whether the installed build is older or newer than the release.
//!
//! # Examples
//!
//! ```rust
//! use spu_cli::version::{ArtifactVersion, needs_upgrade};
//!
//! let installed = ArtifactVersion::parse("8.9.0");
//! let remote = ArtifactVersion::parse("v9.1.0");
//! assert!(needs_upgrade(Some(&installed), &remote));
//! assert_eq!(remote.candidates(), vec!["v9.1.0", "9.1.0"]);
//! ```

pub mod resolver;

pub use resolver::{ReleaseClient, ScriptVersionSource, VersionProbe};

use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Strip surrounding whitespace and every leading `v`/`V`.
#[must_use]
pub fn normalize(token: &str) -> String {
    token.trim().trim_start_matches(['v', 'V']).to_string()
}

/// `[tag, tag with the leading "v" toggled]`, de-duplicated, order preserved.
#[must_use]
pub fn tag_candidates(tag: &str) -> Vec<String> {
    let tag = tag.trim();
    let toggled = match tag.strip_prefix('v').or_else(|| tag.strip_prefix('V')) {
        Some(bare) => bare.to_string(),
        None => format!("v{tag}"),
    };
    let mut candidates = vec![tag.to_string()];
    if toggled != tag && !toggled.is_empty() {
        candidates.push(toggled);
    }
    candidates
}

/// Whether the remote release differs from what is installed.
///
/// Nothing installed always needs an upgrade. Equal versions never do; the
/// operator may still force a reinstall.
#[must_use]
pub fn needs_upgrade(installed: Option<&ArtifactVersion>, remote: &ArtifactVersion) -> bool {
    installed.is_none_or(|installed| installed != remote)
}

/// A version token as published, compared by normalized form.
#[derive(Debug, Clone)]
pub struct ArtifactVersion {
    raw: String,
    normalized: String,
}

impl ArtifactVersion {
    #[must_use]
    pub fn parse(token: &str) -> Self {
        Self {
            raw: token.trim().to_string(),
            normalized: normalize(token),
        }
    }

    /// Token exactly as published, minus surrounding whitespace.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Ref spellings to try when checking out this release.
    #[must_use]
    pub fn candidates(&self) -> Vec<String> {
        tag_candidates(&self.raw)
    }

    /// Semver reading, padding a missing patch component (`1.30` is `1.30.0`).
    #[must_use]
    pub fn semver(&self) -> Option<Version> {
        Version::parse(&self.normalized).ok().or_else(|| {
            let parts = self.normalized.split('.').count();
            if parts == 2 {
                Version::parse(&format!("{}.0", self.normalized)).ok()
            } else {
                None
            }
        })
    }

    /// Ordering for display only; `None` when either side is not semver.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        Some(self.semver()?.cmp(&other.semver()?))
    }
}

impl PartialEq for ArtifactVersion {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for ArtifactVersion {}

impl Hash for ArtifactVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

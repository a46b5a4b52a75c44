//! Platform identification
//!
//! This module maps release asset filenames, client supplied platform names
//! and browser user agents onto the canonical platform tags the cache is
//! keyed by.

mod aliases;
mod detection;

use std::fmt;
use std::str::FromStr;

pub use aliases::resolve_alias;
pub use detection::{DefaultPlatformResolver, PlatformResolver, classify, from_user_agent};

const ARM64_SUFFIX: &str = "_arm64";

/// Kind of installable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKind {
    /// Zipped macOS app bundle, used by the in-app updater
    Darwin,
    Exe,
    Dmg,
    Deb,
    Rpm,
    AppImage,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 6] = [
        PlatformKind::Darwin,
        PlatformKind::Exe,
        PlatformKind::Dmg,
        PlatformKind::Deb,
        PlatformKind::Rpm,
        PlatformKind::AppImage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Darwin => "darwin",
            PlatformKind::Exe => "exe",
            PlatformKind::Dmg => "dmg",
            PlatformKind::Deb => "deb",
            PlatformKind::Rpm => "rpm",
            PlatformKind::AppImage => "AppImage",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

/// Canonical platform tag, e.g. `darwin` or `exe_arm64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformTag {
    pub kind: PlatformKind,
    pub arm64: bool,
}

impl PlatformTag {
    pub fn new(kind: PlatformKind) -> Self {
        Self { kind, arm64: false }
    }

    pub fn arm64(kind: PlatformKind) -> Self {
        Self { kind, arm64: true }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arm64 {
            write!(f, "{}{}", self.kind.as_str(), ARM64_SUFFIX)
        } else {
            write!(f, "{}", self.kind.as_str())
        }
    }
}

impl FromStr for PlatformTag {
    type Err = String;

    /// Parses the canonical form only; aliases go through [`resolve_alias`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arm64) = match s.strip_suffix(ARM64_SUFFIX) {
            Some(name) => (name, true),
            None => (s, false),
        };
        PlatformKind::from_name(name)
            .map(|kind| PlatformTag { kind, arm64 })
            .ok_or_else(|| format!("Unknown platform: {}", s))
    }
}

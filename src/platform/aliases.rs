use super::{PlatformKind, PlatformTag};

/// Client facing names accepted for each platform kind.
fn aliases(kind: PlatformKind) -> &'static [&'static str] {
    match kind {
        PlatformKind::Darwin => &["mac", "macos", "osx"],
        PlatformKind::Exe => &["win32", "windows", "win"],
        PlatformKind::Deb => &["debian"],
        PlatformKind::Rpm => &["fedora"],
        PlatformKind::AppImage => &["appimage", "linux"],
        PlatformKind::Dmg => &["dmg"],
    }
}

/// Resolve a platform name from a URL into its canonical tag.
///
/// Canonical names (`darwin`, `exe_arm64`, ...) resolve to themselves, aliases
/// such as `win32` or `osx_arm64` to the platform they stand for.
pub fn resolve_alias(name: &str) -> Option<PlatformTag> {
    if let Ok(tag) = name.parse::<PlatformTag>() {
        return Some(tag);
    }

    let (base, arm64) = match name.strip_suffix(super::ARM64_SUFFIX) {
        Some(base) => (base, true),
        None => (name, false),
    };

    PlatformKind::ALL
        .into_iter()
        .find(|kind| aliases(*kind).contains(&base))
        .map(|kind| PlatformTag { kind, arm64 })
}

use std::path::Path;

use super::{PlatformKind, PlatformTag};

/// Trait for classifying release assets (useful for testing)
pub trait PlatformResolver: Send + Sync {
    /// Platform the asset file belongs to, `None` for files that are not served
    fn classify(&self, file_name: &str) -> Option<PlatformTag>;
}

/// Default resolver using the filename rules of [`classify`]
pub struct DefaultPlatformResolver;

impl PlatformResolver for DefaultPlatformResolver {
    fn classify(&self, file_name: &str) -> Option<PlatformTag> {
        classify(file_name)
    }
}

/// Classify an asset filename into a platform tag.
///
/// Zip archives whose name mentions `mac` or `darwin` are macOS update
/// bundles. Otherwise the extension decides. Names containing `arm64` or
/// `aarch64` get the arm64 variant.
pub fn classify(file_name: &str) -> Option<PlatformTag> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let arm64 = file_name.contains("arm64") || file_name.contains("aarch64");

    let kind = if (file_name.contains("mac") || file_name.contains("darwin")) && extension == "zip"
    {
        PlatformKind::Darwin
    } else {
        match extension {
            "exe" => PlatformKind::Exe,
            "dmg" => PlatformKind::Dmg,
            "rpm" => PlatformKind::Rpm,
            "deb" => PlatformKind::Deb,
            "AppImage" => PlatformKind::AppImage,
            _ => return None,
        }
    };

    Some(PlatformTag { kind, arm64 })
}

/// Guess the download platform from a browser user agent.
///
/// Mac users get the disk image, unless the request comes from the updater
/// which needs the zipped bundle.
pub fn from_user_agent(user_agent: &str, is_update: bool) -> Option<PlatformTag> {
    let ua = user_agent.to_lowercase();

    if ua.contains("macintosh") || ua.contains("mac os x") {
        let kind = if is_update {
            PlatformKind::Darwin
        } else {
            PlatformKind::Dmg
        };
        Some(PlatformTag::new(kind))
    } else if ua.contains("windows") {
        Some(PlatformTag::new(PlatformKind::Exe))
    } else {
        None
    }
}

//! Font discovery for the page rasterizer.

use std::env;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use resvg::usvg::fontdb::Database;

/// Family requested by the page layout. Korean glyphs need a CJK-capable face.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Noto Sans KR";

/// Generic fallback used when the default family is not installed.
pub const FALLBACK_FONT_FAMILY_NAME: &str = "sans-serif";

/// Environment variable overriding the bundled font directory.
pub const FONTS_DIR_ENV: &str = "SCHOOL_REPORT_FONTS_DIR";

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

fn font_directory_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }

    if let Ok(path) = env::var(FONTS_DIR_ENV) {
        if !path.trim().is_empty() {
            let candidate = PathBuf::from(path);
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            let candidate = bin_dir.join("assets/fonts");
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    let manifest_candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts");
    if !candidates.contains(&manifest_candidate) {
        candidates.push(manifest_candidate);
    }

    candidates
}

fn contains_font_files(path: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(path) else {
        return false;
    };
    entries.flatten().any(|entry| {
        entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    })
}

/// Returns the first candidate directory that holds at least one font file.
pub fn resolve_font_directory(explicit: Option<&Path>) -> Option<PathBuf> {
    font_directory_candidates(explicit)
        .into_iter()
        .find(|candidate| candidate.is_dir() && contains_font_files(candidate))
}

/// Indicates whether a bundled font directory is available.
pub fn bundled_fonts_available() -> bool {
    resolve_font_directory(None).is_some()
}

/// Builds the font database used by the rasterizer.
///
/// Bundled fonts are preferred; when no bundled directory is found the system fonts are
/// loaded instead. Text rendered with an empty database is silently dropped by the
/// rasterizer, so that case is logged.
pub fn font_database(explicit: Option<&Path>) -> Database {
    let mut database = Database::new();

    match resolve_font_directory(explicit) {
        Some(directory) => {
            database.load_fonts_dir(&directory);
            debug!(
                "Loaded {} font faces from {}",
                database.len(),
                directory.display()
            );
        }
        None => {
            warn!(
                "Bundled fonts unavailable (set {}); falling back to system fonts.",
                FONTS_DIR_ENV
            );
            database.load_system_fonts();
        }
    }

    if database.is_empty() {
        warn!("No fonts available; report text will not be rendered.");
    }

    database
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directory_is_tried_first() {
        let explicit = PathBuf::from("/__school_report_explicit_fonts__");
        let candidates = font_directory_candidates(Some(&explicit));
        assert_eq!(candidates.first(), Some(&explicit));
    }

    #[test]
    fn directory_without_fonts_is_skipped() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("README.md"), "fonts go here").expect("write readme");
        assert!(!contains_font_files(dir.path()));

        std::fs::write(dir.path().join("NotoSansKR-Regular.TTF"), b"").expect("write font");
        assert!(contains_font_files(dir.path()));
    }
}

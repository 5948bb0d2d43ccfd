// src/utils/sanitize.rs

//! Filename sanitization for exported asset files.
//!
//! Asset files are named `{release_id}_{artist}-{title}.{ext}`, with both
//! text components scrubbed of characters that are unsafe on common
//! filesystems and truncated on grapheme boundaries so multi-byte text is
//! never split mid-character.

use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Longest filename accepted by the common filesystems.
pub const MAX_FILENAME_LEN: usize = 255;

static DUPLICATE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d+\)$").expect("valid pattern"));

static FORBIDDEN_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\s]"#).expect("valid pattern"));

static CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1f\x7f]").expect("valid pattern"));

static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("valid pattern"));

/// Strip the disambiguation number Discogs appends to duplicate artist
/// names, e.g. "Prince (2)" becomes "Prince".
pub fn sanitize_artist(artist: &str) -> String {
    let trimmed = artist.trim_end();
    DUPLICATE_SUFFIX.replace(trimmed, "").trim_end().to_string()
}

/// Make a string safe for use as a filename component.
///
/// Replaces characters forbidden on Windows plus all whitespace with `_`,
/// drops control characters, collapses underscore runs, and trims stray
/// separators from both ends.
pub fn sanitize_for_filename(text: &str) -> String {
    let replaced = FORBIDDEN_CHARS.replace_all(text, "_");
    let cleaned = CONTROL_CHARS.replace_all(&replaced, "");
    let collapsed = UNDERSCORE_RUNS.replace_all(&cleaned, "_");
    let trimmed = collapsed.trim_matches(['_', '-']);
    truncate_graphemes(trimmed, MAX_FILENAME_LEN)
}

/// Build the asset filename for a release.
pub fn asset_filename(release_id: u64, artist: &str, title: &str, extension: &str) -> String {
    let name = format!(
        "{}_{}-{}.{}",
        release_id,
        sanitize_for_filename(artist),
        sanitize_for_filename(title),
        extension
    );
    truncate_filename(&name, MAX_FILENAME_LEN)
}

/// Truncate a filename to `max_len` graphemes, preserving the extension.
pub fn truncate_filename(filename: &str, max_len: usize) -> String {
    if filename.graphemes(true).count() <= max_len {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) => {
            let keep = max_len.saturating_sub(ext.graphemes(true).count() + 1);
            format!("{}.{}", truncate_graphemes(stem, keep), ext)
        }
        None => truncate_graphemes(filename, max_len),
    }
}

fn truncate_graphemes(text: &str, max_len: usize) -> String {
    text.graphemes(true).take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artist_suffix_stripped() {
        assert_eq!(sanitize_artist("The Beatles"), "The Beatles");
        assert_eq!(sanitize_artist("Prince (2)"), "Prince");
        assert_eq!(sanitize_artist("Madonna (3)"), "Madonna");
        assert_eq!(sanitize_artist("Nirvana (2) "), "Nirvana");
    }

    #[test]
    fn filename_component_scrubbed() {
        assert_eq!(
            sanitize_for_filename("Artist / Album: The Best"),
            "Artist_Album_The_Best"
        );
        assert_eq!(sanitize_for_filename("Song \"Title\" <3>"), "Song_Title_3");
        assert_eq!(sanitize_for_filename("__already_clean__"), "already_clean");
    }

    #[test]
    fn asset_filename_format() {
        assert_eq!(
            asset_filename(123456, "The Beatles", "Abbey Road", "jpg"),
            "123456_The_Beatles-Abbey_Road.jpg"
        );
        assert_eq!(
            asset_filename(789, "Artist / Name", "Title: Subtitle", "png"),
            "789_Artist_Name-Title_Subtitle.png"
        );
    }

    #[test]
    fn truncation_preserves_extension() {
        let truncated = truncate_filename("very_long_filename.jpg", 20);
        assert_eq!(truncated, "very_long_filena.jpg");
        assert_eq!(truncate_filename("short.png", 20), "short.png");
    }

    #[test]
    fn truncation_respects_grapheme_boundaries() {
        let artist = "é".repeat(300);
        let name = asset_filename(1, &artist, "x", "png");
        assert!(name.graphemes(true).count() <= MAX_FILENAME_LEN);
        assert!(name.ends_with(".png"));
        assert!(!name.contains('\u{FFFD}'));
    }
}

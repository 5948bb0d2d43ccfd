//! Release data structures for collection items.
//!
//! Field layout mirrors the collection payloads served by the Discogs API.
//! Everything except the identifiers is defaulted so a sparse payload still
//! decodes; records missing required fields are skipped upstream.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::utils::sanitize::sanitize_artist;

/// Base URL of release pages on the public website.
const RELEASE_PAGE_BASE: &str = "https://www.discogs.com/release";

/// Artist credit on a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artist {
    #[serde(default)]
    pub id: u64,

    /// Artist name, possibly carrying a "(N)" disambiguation suffix
    pub name: String,

    #[serde(default)]
    pub resource_url: String,
}

/// Label credit on a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Label {
    #[serde(default)]
    pub name: String,

    /// Catalog number assigned by the label
    #[serde(default)]
    pub catno: String,
}

/// Physical format of a release (Vinyl, CD, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Format {
    #[serde(default)]
    pub name: String,

    /// Quantity as served by the API, a numeric string
    #[serde(default)]
    pub qty: String,

    #[serde(default)]
    pub descriptions: Vec<String>,
}

impl Format {
    /// Display form, e.g. "Vinyl" or "Vinyl (2x)" for multi-disc sets.
    pub fn display(&self) -> String {
        match self.qty.trim().parse::<u32>() {
            Ok(qty) if qty > 1 => format!("{} ({}x)", self.name, qty),
            _ => self.name.clone(),
        }
    }
}

/// Core release metadata nested inside a collection item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BasicInformation {
    pub id: u64,
    pub title: String,

    /// Release year, 0 when unknown
    #[serde(default)]
    pub year: u32,

    #[serde(default)]
    pub artists: Vec<Artist>,

    #[serde(default)]
    pub labels: Vec<Label>,

    #[serde(default)]
    pub formats: Vec<Format>,

    #[serde(default)]
    pub genres: Vec<String>,

    #[serde(default)]
    pub styles: Vec<String>,

    /// Thumbnail image URL
    #[serde(default)]
    pub thumb: String,

    /// Full-size cover image URL
    #[serde(default)]
    pub cover_image: String,
}

impl BasicInformation {
    /// Primary artist name with the disambiguation suffix stripped.
    pub fn primary_artist(&self) -> String {
        self.artists
            .first()
            .map(|a| sanitize_artist(&a.name))
            .unwrap_or_else(|| "Unknown Artist".to_string())
    }

    /// Primary label name, empty when the release has no label credit.
    pub fn primary_label(&self) -> &str {
        self.labels.first().map(|l| l.name.as_str()).unwrap_or("")
    }

    /// Catalog number of the primary label.
    pub fn catalog_number(&self) -> &str {
        self.labels.first().map(|l| l.catno.as_str()).unwrap_or("")
    }

    /// All formats joined for display, e.g. "Vinyl (2x), Box Set".
    pub fn format_summary(&self) -> String {
        self.formats
            .iter()
            .map(Format::display)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Genres joined with commas.
    pub fn genres_joined(&self) -> String {
        self.genres.join(", ")
    }

    /// Styles joined with commas.
    pub fn styles_joined(&self) -> String {
        self.styles.join(", ")
    }
}

/// Free-form note attached to a collection item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub field_id: u32,

    #[serde(default)]
    pub value: String,
}

/// One item in a user's collection.
///
/// `id` identifies the release in the public catalog and keys asset
/// filenames; `instance_id` identifies this particular copy (the same
/// release can be in a collection twice) and keys checkpoint completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    pub id: u64,
    pub instance_id: u64,
    pub date_added: DateTime<FixedOffset>,

    /// Owner rating 0-5, 0 meaning unrated
    #[serde(default)]
    pub rating: u8,

    pub basic_information: BasicInformation,

    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Release {
    /// Primary artist (shortcut into basic information).
    pub fn artist(&self) -> String {
        self.basic_information.primary_artist()
    }

    /// Album title (shortcut into basic information).
    pub fn title(&self) -> &str {
        &self.basic_information.title
    }

    /// Public web page for this release.
    pub fn web_url(&self) -> String {
        format!("{}/{}", RELEASE_PAGE_BASE, self.id)
    }

    /// Best available cover image URL, preferring the full-size image and
    /// falling back to the thumbnail. None when the release has neither.
    pub fn cover_source(&self) -> Option<&str> {
        let info = &self.basic_information;
        if !info.cover_image.is_empty() {
            Some(info.cover_image.as_str())
        } else if !info.thumb.is_empty() {
            Some(info.thumb.as_str())
        } else {
            None
        }
    }

    /// Date the item was added to the collection, formatted for export.
    pub fn date_added_display(&self) -> String {
        self.date_added.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
pub(crate) fn make_release(id: u64, instance_id: u64, artist: &str, title: &str) -> Release {
    Release {
        id,
        instance_id,
        date_added: DateTime::parse_from_rfc3339("2024-03-10T08:22:20-07:00").unwrap(),
        rating: 4,
        basic_information: BasicInformation {
            id,
            title: title.to_string(),
            year: 1977,
            artists: vec![Artist {
                id: 1,
                name: artist.to_string(),
                resource_url: String::new(),
            }],
            labels: vec![Label {
                name: "Harvest".to_string(),
                catno: "SHVL 804".to_string(),
            }],
            formats: vec![Format {
                name: "Vinyl".to_string(),
                qty: "2".to_string(),
                descriptions: vec!["LP".to_string(), "Album".to_string()],
            }],
            genres: vec!["Rock".to_string()],
            styles: vec!["Prog Rock".to_string(), "Psychedelic Rock".to_string()],
            thumb: "https://i.discogs.com/thumb.jpg".to_string(),
            cover_image: "https://i.discogs.com/cover.jpg".to_string(),
        },
        notes: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_artist_strips_suffix() {
        let release = make_release(1, 10, "Prince (2)", "Purple Rain");
        assert_eq!(release.artist(), "Prince");
    }

    #[test]
    fn primary_artist_falls_back_when_missing() {
        let mut release = make_release(1, 10, "X", "Y");
        release.basic_information.artists.clear();
        assert_eq!(release.artist(), "Unknown Artist");
    }

    #[test]
    fn format_display_marks_multi_disc() {
        let release = make_release(1, 10, "A", "T");
        assert_eq!(release.basic_information.format_summary(), "Vinyl (2x)");

        let single = Format {
            name: "CD".to_string(),
            qty: "1".to_string(),
            descriptions: Vec::new(),
        };
        assert_eq!(single.display(), "CD");
    }

    #[test]
    fn web_url_uses_release_id() {
        let release = make_release(249504, 991_735_532, "A", "T");
        assert_eq!(release.web_url(), "https://www.discogs.com/release/249504");
    }

    #[test]
    fn cover_source_prefers_full_image() {
        let mut release = make_release(1, 10, "A", "T");
        assert_eq!(
            release.cover_source(),
            Some("https://i.discogs.com/cover.jpg")
        );

        release.basic_information.cover_image.clear();
        assert_eq!(
            release.cover_source(),
            Some("https://i.discogs.com/thumb.jpg")
        );

        release.basic_information.thumb.clear();
        assert_eq!(release.cover_source(), None);
    }

    #[test]
    fn date_added_export_format() {
        let release = make_release(1, 10, "A", "T");
        assert_eq!(release.date_added_display(), "2024-03-10 08:22:20");
    }

    #[test]
    fn release_decodes_from_api_payload() {
        let raw = serde_json::json!({
            "id": 249504,
            "instance_id": 991735532,
            "date_added": "2019-03-10T08:22:20-07:00",
            "rating": 3,
            "basic_information": {
                "id": 249504,
                "title": "Nevermind",
                "year": 1991,
                "artists": [{"id": 125246, "name": "Nirvana", "resource_url": ""}],
                "labels": [{"name": "DGC", "catno": "DGC-24425"}],
                "formats": [{"name": "CD", "qty": "1", "descriptions": ["Album"]}],
                "genres": ["Rock"],
                "styles": ["Grunge"],
                "thumb": "",
                "cover_image": ""
            }
        });

        let release: Release = serde_json::from_value(raw).unwrap();
        assert_eq!(release.id, 249504);
        assert_eq!(release.artist(), "Nirvana");
        assert_eq!(release.basic_information.catalog_number(), "DGC-24425");
        assert!(release.notes.is_empty());
    }
}

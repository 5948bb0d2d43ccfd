// src/export/mod.rs

//! CSV export of the merged record list.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::enrich::Enrichment;
use crate::error::Result;
use crate::models::{ExportConfig, Release};

/// One spreadsheet row. Column order follows field order.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    pub discogs_no: u64,
    pub artist: String,
    pub album_title: String,
    pub year: u32,
    pub label: String,
    pub catalog_number: String,
    pub format: String,
    pub genres: String,
    pub styles: String,
    pub date_added: String,
    pub rating: u8,
    pub discogs_url: String,
    pub qr_path: String,
    pub cover_path: String,
}

impl ExportRow {
    /// Flatten one record and its enrichment into a row. Assets that
    /// were not produced leave their path cell empty.
    pub fn from_record(release: &Release, enrichment: &Enrichment) -> Self {
        let info = &release.basic_information;
        Self {
            discogs_no: release.id,
            artist: release.artist(),
            album_title: release.title().to_string(),
            year: info.year,
            label: info.primary_label().to_string(),
            catalog_number: info.catalog_number().to_string(),
            format: info.format_summary(),
            genres: info.genres_joined(),
            styles: info.styles_joined(),
            date_added: release.date_added_display(),
            rating: release.rating,
            discogs_url: release.web_url(),
            qr_path: path_or_empty(enrichment.qr.path()),
            cover_path: path_or_empty(enrichment.cover.path()),
        }
    }
}

fn path_or_empty(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

/// Write records to `path` as delimited text.
///
/// The extension is forced to `.csv`, missing parent directories are
/// created, and an existing file is replaced.
pub fn write_csv(
    records: &[(Release, Enrichment)],
    path: &Path,
    config: &ExportConfig,
) -> Result<PathBuf> {
    let path = ensure_extension(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let delimiter = config
        .delimiter
        .as_bytes()
        .first()
        .copied()
        .unwrap_or(b'\t');
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(&path)?;
    for (release, enrichment) in records {
        writer.serialize(ExportRow::from_record(release, enrichment))?;
    }
    writer.flush()?;

    log::info!("Exported {} rows to {}", records.len(), path.display());
    Ok(path)
}

fn ensure_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "csv") {
        path.to_path_buf()
    } else {
        path.with_extension("csv")
    }
}

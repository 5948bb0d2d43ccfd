// src/models/mod.rs

//! Domain models for the collection dumper.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod page;
mod record;

// Re-export all public types
pub use config::{
    ApiConfig, AuthConfig, CheckpointConfig, Config, Credentials, EnrichConfig, ExportConfig,
    RetryConfig, TOKEN_ENV_VAR,
};
pub use page::{CollectionPage, CollectionValue, PageQuery, Pagination};
pub use record::{Artist, BasicInformation, Format, Label, Note, Release};

#[cfg(test)]
pub(crate) use record::make_release;

use std::fmt;

/// The kinds of asset a record can be enriched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Generated QR code pointing at the release page
    Qr,
    /// Downloaded cover art
    Cover,
}

impl AssetKind {
    /// File extension for assets of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Qr => "png",
            Self::Cover => "jpg",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qr => write!(f, "qr code"),
            Self::Cover => write!(f, "cover art"),
        }
    }
}

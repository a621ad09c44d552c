//! Assets: named bundles of files in one region's storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File extension that marks a streaming manifest. A manifest is the
/// natural primary (entry-point) file of an encoded bundle.
pub const MANIFEST_EXT: &str = ".ism";

/// Asset creation options, recorded on the asset and propagated to copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCreationOptions {
    /// Plain storage.
    #[default]
    None,
    /// Storage-side encryption requested at creation.
    StorageEncrypted,
}

/// A file registered on an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFile {
    /// File name, relative to the asset's container root. May contain `/`.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Whether this file is the asset's designated entry point.
    pub is_primary: bool,
}

impl AssetFile {
    /// Create a non-primary file entry.
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            is_primary: false,
        }
    }
}

/// A named logical bundle of files living in one region's storage.
///
/// At most one file is marked primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Unique asset identifier.
    pub id: String,
    /// Asset name. Copies share the source's name.
    pub name: String,
    /// Creation options.
    pub options: AssetCreationOptions,
    /// Registered files.
    pub files: Vec<AssetFile>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Create an empty asset shell with a fresh identity.
    pub fn new(name: impl Into<String>, options: AssetCreationOptions) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            options,
            files: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Storage container backing this asset.
    pub fn container(&self) -> String {
        format!("asset-{}", self.id)
    }

    /// The designated primary file, if any.
    pub fn primary_file(&self) -> Option<&AssetFile> {
        self.files.iter().find(|f| f.is_primary)
    }
}

/// What to do when no copied file qualifies as primary.
///
/// The historical behavior produced an asset with zero primary files;
/// `None` preserves that, `FirstFile` falls back to the first registered
/// file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryFallback {
    /// Leave the asset without a primary file.
    #[default]
    None,
    /// Mark the first registered file primary.
    FirstFile,
}

/// Whether a file name qualifies as primary for an asset whose source
/// primary was `source_primary`: manifest extension, or case-insensitive
/// match of the source primary's name.
pub fn qualifies_as_primary(name: &str, source_primary: Option<&str>) -> bool {
    if name.to_lowercase().ends_with(MANIFEST_EXT) {
        return true;
    }
    source_primary.is_some_and(|primary| name.eq_ignore_ascii_case(primary))
}

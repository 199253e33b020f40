// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Media assets
//
// The backup engine never walks the photo library itself. It asks an
// AssetLibrary for handles and turns each handle into a wire record.

use crate::types::AppError;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sent instead of a creation date when the asset has none
pub const UNKNOWN_DATE: &str = "unknow_date";

/// Format of `CreationDate` on the wire
pub const CREATION_DATE_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Handle to one item of the local media collection
pub trait MediaAsset: Send + Sync {
    /// Durable identifier, stable across runs
    fn id(&self) -> &str;
    fn file_name(&self) -> &str;
    /// Coarse media kind, e.g. "image"
    fn media_type(&self) -> &str;
    fn creation_date(&self) -> Option<DateTime<Local>>;
    /// Read the full binary content
    fn read_content(&self) -> Result<Vec<u8>, AppError>;
}

pub type SharedAsset = Arc<dyn MediaAsset>;

/// Source of the assets a backup run can select from
pub trait AssetLibrary: Send + Sync {
    /// Every asset, oldest first
    fn all_assets(&self) -> Result<Vec<SharedAsset>, AppError>;

    /// Assets whose identifiers are listed. Unknown identifiers are skipped.
    fn assets_with_ids(&self, ids: &[String]) -> Result<Vec<SharedAsset>, AppError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .all_assets()?
            .into_iter()
            .filter(|asset| wanted.contains(asset.id()))
            .collect())
    }
}

/// One asset as it travels to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssetRecord {
    pub file_name: String,
    pub media_type: String,
    pub creation_date: String,
    /// Base64 of the asset bytes
    pub content: String,
}

impl AssetRecord {
    pub fn from_asset(asset: &dyn MediaAsset) -> Result<Self, AppError> {
        let content = asset.read_content()?;

        Ok(Self {
            file_name: asset.file_name().to_string(),
            media_type: asset.media_type().to_string(),
            creation_date: format_creation_date(asset.creation_date()),
            content: B64.encode(content),
        })
    }
}

pub fn format_creation_date(date: Option<DateTime<Local>>) -> String {
    date.map(|d| d.format(CREATION_DATE_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

/// A batch ready to send. Positions index into the batch it was built from.
#[derive(Debug, Default)]
pub struct EncodedBatch {
    pub records: Vec<AssetRecord>,
    /// Batch position of each record, same order as `records`
    pub positions: Vec<usize>,
    /// Batch positions of assets that could not be read
    pub unreadable: Vec<usize>,
}

/// Serialize a batch. Assets that cannot be read are left out.
pub fn encode_batch(batch: &[SharedAsset]) -> EncodedBatch {
    let mut encoded = EncodedBatch {
        records: Vec::with_capacity(batch.len()),
        ..Default::default()
    };

    for (position, asset) in batch.iter().enumerate() {
        match AssetRecord::from_asset(asset.as_ref()) {
            Ok(record) => {
                encoded.records.push(record);
                encoded.positions.push(position);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", asset.id(), e);
                encoded.unreadable.push(position);
            }
        }
    }

    encoded
}

/// A photo or video on the local filesystem
#[derive(Debug, Clone)]
pub struct FileAsset {
    id: String,
    path: PathBuf,
    file_name: String,
    media_type: String,
    creation_date: Option<DateTime<Local>>,
}

impl FileAsset {
    /// Returns None for files that are not images or videos
    pub fn from_path(path: &Path) -> Option<Self> {
        let media_type = media_type_of(path)?;
        let file_name = path.file_name()?.to_string_lossy().to_string();
        let creation_date = fs::metadata(path)
            .ok()
            .and_then(|m| m.created().or_else(|_| m.modified()).ok())
            .map(DateTime::<Local>::from);

        Some(Self {
            id: path.to_string_lossy().to_string(),
            path: path.to_path_buf(),
            file_name,
            media_type,
            creation_date,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MediaAsset for FileAsset {
    fn id(&self) -> &str {
        &self.id
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn creation_date(&self) -> Option<DateTime<Local>> {
        self.creation_date
    }

    fn read_content(&self) -> Result<Vec<u8>, AppError> {
        fs::read(&self.path)
            .map_err(|e| AppError::FileIo(format!("Failed to read {}: {}", self.path.display(), e)))
    }
}

fn media_type_of(path: &Path) -> Option<String> {
    let mime = mime_guess::from_path(path).first()?;
    let top = mime.type_().as_str();
    (top == "image" || top == "video").then(|| top.to_string())
}

/// Every photo and video below a directory
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(&self) -> Result<Vec<FileAsset>, AppError> {
        let root = fs::canonicalize(&self.root).map_err(|e| {
            AppError::FileIo(format!("Cannot open {}: {}", self.root.display(), e))
        })?;

        let mut found = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Skipping unreadable directory {:?}: {}", dir, e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                match entry.file_type() {
                    Ok(t) if t.is_dir() => pending.push(path),
                    Ok(t) if t.is_file() => {
                        if let Some(asset) = FileAsset::from_path(&path) {
                            found.push(asset);
                        }
                    }
                    _ => {}
                }
            }
        }

        found.sort_by(|a, b| {
            a.creation_date
                .cmp(&b.creation_date)
                .then_with(|| a.id.cmp(&b.id))
        });

        tracing::debug!("Found {} media files under {:?}", found.len(), self.root);
        Ok(found)
    }
}

impl AssetLibrary for DirectoryLibrary {
    fn all_assets(&self) -> Result<Vec<SharedAsset>, AppError> {
        Ok(self
            .scan()?
            .into_iter()
            .map(|asset| Arc::new(asset) as SharedAsset)
            .collect())
    }
}

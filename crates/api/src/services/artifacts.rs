//! Storage for check-in images.
//!
//! Saving an image is advisory: a failure is logged and reported as "no
//! locator", never as an error, so it cannot block recording attendance.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, error, instrument};

use attendance_core::UserId;

use crate::config::UploadConfig;
use crate::models::SubmittedImage;

/// Why an image is being kept. Part of the generated file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactPurpose {
    /// Photo taken at check-in.
    CheckIn,
}

impl ArtifactPurpose {
    /// File name fragment for this purpose.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CheckIn => "checkin",
        }
    }
}

impl fmt::Display for ArtifactPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persists supporting images and returns a locator for them.
pub trait ArtifactStore: Send + Sync + 'static {
    /// Save an image. `None` means it could not be stored.
    fn save(
        &self,
        user_id: UserId,
        purpose: ArtifactPurpose,
        image: &SubmittedImage,
    ) -> impl Future<Output = Option<String>> + Send;
}

/// Writes images to a local directory that is served under a URL prefix.
#[derive(Debug, Clone)]
pub struct DiskArtifactStore {
    dir: PathBuf,
    url_prefix: String,
}

impl DiskArtifactStore {
    /// Create a store writing to `dir`, addressed as `{url_prefix}/<file>`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Create a store from upload configuration.
    #[must_use]
    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.dir.clone(), &config.url_prefix)
    }

    /// Directory images are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(user_id: UserId, purpose: ArtifactPurpose, image: &SubmittedImage) -> String {
        let ext = image.extension().unwrap_or_else(|| "jpg".to_string());
        format!(
            "user_{user_id}_{purpose}_{}.{ext}",
            Utc::now().timestamp_millis()
        )
    }
}

impl ArtifactStore for DiskArtifactStore {
    #[instrument(skip(self, image), fields(user_id = %user_id, purpose = %purpose, bytes = image.bytes.len()))]
    async fn save(
        &self,
        user_id: UserId,
        purpose: ArtifactPurpose,
        image: &SubmittedImage,
    ) -> Option<String> {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            error!(dir = %self.dir.display(), error = %e, "Failed to create upload directory");
            return None;
        }

        let file_name = Self::file_name(user_id, purpose, image);
        let path = self.dir.join(&file_name);

        if let Err(e) = tokio::fs::write(&path, &image.bytes).await {
            error!(path = %path.display(), error = %e, "Failed to save image");
            return None;
        }

        debug!(path = %path.display(), "Saved image");
        Some(format!("{}/{file_name}", self.url_prefix))
    }
}

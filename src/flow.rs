//! The two-phase archive download workflow.
//!
//! Phase one asks the server to build a bundle for the selected stations and
//! date range; phase two fetches the resulting binary and hands it to the
//! materializer. The phases are not atomic: when the fetch fails after
//! creation succeeded, the descriptor is still returned so the caller can
//! show it and offer a retry of the download step alone.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::download::Materializer;
use crate::models::{ArchiveDescriptor, StationQueryResult};

/// Result of a download attempt that got at least as far as a created
/// archive.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The bundle was fetched and saved.
    Saved {
        descriptor: ArchiveDescriptor,
        path: PathBuf,
    },
    /// The archive exists server-side but the binary fetch or the local
    /// save failed. The descriptor stays visible; only the download step
    /// needs retrying.
    CreatedOnly {
        descriptor: ArchiveDescriptor,
        error: ApiError,
    },
}

pub struct ArchiveFlow {
    client: ApiClient,
    materializer: Materializer,
}

impl ArchiveFlow {
    pub fn new(client: ApiClient, download_dir: PathBuf) -> Self {
        Self {
            client,
            materializer: Materializer::new(download_dir),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn validate_selection(
        stations: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), ApiError> {
        if stations.is_empty() {
            return Err(ApiError::Validation(
                "Select at least one station".to_string(),
            ));
        }
        if start > end {
            return Err(ApiError::Validation(
                "Start date must not be after end date".to_string(),
            ));
        }
        Ok(())
    }

    /// Preview which files are available per station. Open to everyone;
    /// only the selection itself is validated locally.
    pub async fn query(
        &self,
        stations: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<StationQueryResult, ApiError> {
        Self::validate_selection(stations, start, end)?;
        self.client.query_stations(stations, start, end).await
    }

    /// Create an archive bundle, fetch it, and save it locally.
    ///
    /// Downloading requires a logged-in, activated account; both conditions
    /// short-circuit with a descriptive error before the archive request is
    /// made (the unauthenticated case before any network call at all).
    pub async fn download(
        &self,
        stations: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DownloadOutcome, ApiError> {
        Self::validate_selection(stations, start, end)?;

        if !self.client.is_authenticated() {
            return Err(ApiError::Validation(
                "Log in to download archive data".to_string(),
            ));
        }
        let profile = self.client.me().await?;
        if !profile.is_active {
            return Err(ApiError::Validation(
                "Activate your account to download archive data - check your email".to_string(),
            ));
        }

        let descriptor = self.client.create_archive(stations, start, end).await?;

        match self.fetch_and_save(&descriptor).await {
            Ok(path) => {
                info!(path = %path.display(), "Archive downloaded");
                Ok(DownloadOutcome::Saved { descriptor, path })
            }
            Err(error) => {
                warn!(
                    archive = %descriptor.archive_name,
                    error = %error,
                    "Archive created but the download step failed"
                );
                Ok(DownloadOutcome::CreatedOnly { descriptor, error })
            }
        }
    }

    /// The retryable second phase: fetch the binary and materialize it.
    pub async fn fetch_and_save(&self, descriptor: &ArchiveDescriptor) -> Result<PathBuf, ApiError> {
        let payload = self
            .client
            .fetch_archive_binary(&descriptor.download_url)
            .await?;
        self.materializer.save(&payload, &descriptor.archive_name)
    }
}

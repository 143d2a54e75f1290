use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;

/// One observation file in a station's listing.
#[derive(Debug, Clone, Deserialize)]
pub struct StationFile {
    #[serde(default)]
    pub id: Option<i64>,
    pub filename: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub filetype: Option<String>,
    pub path: String,
    /// Fraction of expected epochs present in the file.
    #[serde(default)]
    pub fullness: Option<f64>,
}

/// Per-station result in a query response: either the ordered file listing
/// or a server-side error for that station ("station not found" and the
/// like). One bad station does not fail the whole query.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StationEntry {
    Files(Vec<StationFile>),
    Error { error: String },
}

/// Response of `POST /stations/`: a map from station identifier to its
/// entry. BTreeMap keeps station blocks in a stable order for display.
pub type StationQueryResult = BTreeMap<String, StationEntry>;

/// Metadata for a generated archive bundle, returned by `POST /download/`.
/// Immutable once received; consumed once by the download step.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveDescriptor {
    pub archive_name: String,
    pub file_count: u64,
    /// Human-readable layout description of the bundle contents.
    #[serde(default, alias = "period")]
    pub structure: Option<String>,
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_station_query_with_mixed_entries() {
        let json = r#"{
            "mobs": [
                {"filename": "mobs0010.24o", "date": "2024-01-01", "path": "/data/mobs", "fullness": 0.98},
                {"filename": "mobs0020.24o", "date": "2024-01-02", "path": "/data/mobs", "fullness": 1.0}
            ],
            "nril": {"error": "Station 'nril' not found"},
            "arti": []
        }"#;

        let result: StationQueryResult = serde_json::from_str(json).expect("parse query result");
        assert_eq!(result.len(), 3);

        match &result["mobs"] {
            StationEntry::Files(files) => {
                assert_eq!(files.len(), 2);
                assert_eq!(files[0].filename, "mobs0010.24o");
                assert_eq!(
                    files[0].date,
                    NaiveDate::from_ymd_opt(2024, 1, 1).expect("date")
                );
                assert_eq!(files[0].fullness, Some(0.98));
            }
            other => panic!("expected files for mobs, got {other:?}"),
        }

        match &result["nril"] {
            StationEntry::Error { error } => assert!(error.contains("not found")),
            other => panic!("expected error for nril, got {other:?}"),
        }

        assert!(matches!(&result["arti"], StationEntry::Files(f) if f.is_empty()));
    }

    #[test]
    fn parse_archive_descriptor() {
        let json = r#"{
            "success": true,
            "download_url": "https://gnss-archive.example.org/media/gnss_data_2024-01-01_2024-01-02_a1b2c3.tar.gz",
            "file_count": 14,
            "archive_name": "gnss_data_2024-01-01_2024-01-02_a1b2c3.tar.gz",
            "stations": ["mobs", "arti"],
            "period": "2024-01-01 - 2024-01-02"
        }"#;

        let descriptor: ArchiveDescriptor = serde_json::from_str(json).expect("parse descriptor");
        assert_eq!(descriptor.file_count, 14);
        assert!(descriptor.archive_name.starts_with("gnss_data_"));
        assert_eq!(descriptor.structure.as_deref(), Some("2024-01-01 - 2024-01-02"));
    }
}

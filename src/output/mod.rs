use crate::error::{Error, Result};
use crate::model::ResultRecord;
use async_trait::async_trait;
use std::path::Path;

pub mod clipboard;
pub mod console;
pub mod csv;
pub mod json;

pub use clipboard::{Clipboard, SystemClipboard};
pub use console::{CopyTracker, format_countdown, format_number, render_results};

/// Destination for exported result records.
#[async_trait]
pub trait OutputHandler: Send + Sync {
    async fn write(&mut self, record: &ResultRecord) -> Result<()>;
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn create_exporter(path: &Path) -> Result<Box<dyn OutputHandler>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Box::new(self::json::JsonOutput::new(path.to_path_buf())?)),
        Some("csv") => Ok(Box::new(self::csv::CsvOutput::new(path.to_path_buf())?)),
        _ => Err(Error::Config(format!(
            "Unsupported export format: {}",
            path.display()
        ))),
    }
}

/// Writes every record to `path`, picking the format from its extension.
pub async fn export_results(path: &Path, records: &[ResultRecord]) -> Result<usize> {
    let mut handler = create_exporter(path)?;
    for record in records {
        handler.write(record).await?;
    }
    handler.close().await?;
    log::info!("Exported {} results to {}", records.len(), path.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ResultRecord> {
        let raw = serde_json::json!([
            {
                "url": "https://a.example",
                "country": "US",
                "traffic": 1500,
                "da": 10,
                "dr": 7,
                "spam_score": 2,
                "match": true,
                "contact": "ops@a.example"
            },
            {"url": "https://b.example", "country": "UK", "traffic": null}
        ]);
        serde_json::from_value(raw).unwrap()
    }

    #[tokio::test]
    async fn json_export_is_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        assert_eq!(export_results(&path, &records()).await.unwrap(), 2);

        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, serde_json::to_value(records()).unwrap());
        assert_eq!(back[0]["contact"], "ops@a.example");
        assert!(back[1]["traffic"].is_null());
        assert!(back[1].get("da").is_none());
    }

    #[tokio::test]
    async fn csv_export_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        export_results(&path, &records()).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "url,country,traffic,da,dr,spam_score,match");
        assert_eq!(lines[1], "https://a.example,US,1500,10,7,2,true");
        assert_eq!(lines[2], "https://b.example,UK,,,,,");
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.xlsx");
        assert!(export_results(&path, &records()).await.is_err());
    }
}

use super::OutputHandler;
use crate::error::{Error, Result};
use crate::model::ResultRecord;
use async_trait::async_trait;
use std::path::PathBuf;

const COLUMNS: [&str; 7] = ["url", "country", "traffic", "da", "dr", "spam_score", "match"];

pub struct CsvOutput {
    writer: csv::Writer<std::fs::File>,
    headers_written: bool,
}

impl CsvOutput {
    pub fn new(path: PathBuf) -> Result<Self> {
        let writer = csv::Writer::from_path(path).map_err(|e| Error::Internal(e.to_string()))?;

        Ok(Self {
            writer,
            headers_written: false,
        })
    }
}

#[async_trait]
impl OutputHandler for CsvOutput {
    async fn write(&mut self, record: &ResultRecord) -> Result<()> {
        if !self.headers_written {
            self.writer
                .write_record(COLUMNS)
                .map_err(|e| Error::Internal(e.to_string()))?;
            self.headers_written = true;
        }

        self.writer
            .write_record(COLUMNS.map(|column| record.text(column)))
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

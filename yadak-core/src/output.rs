use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::OutputSection;
use crate::scrape::{dedup_and_sort, PartRecord};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error writing {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Writes dated CSV files with a UTF-8 BOM so Persian text opens cleanly
/// in Excel, plus an automatic backup copy.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
    backup_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output: &OutputSection) -> Self {
        Self {
            output_dir: PathBuf::from(&output.output_dir),
            backup_dir: PathBuf::from(&output.backup_dir),
        }
    }

    /// Deduplicates, sorts, and writes `<prefix>_<date>.csv`. Returns
    /// `None` when there is nothing to write.
    pub fn save(
        &self,
        records: Vec<PartRecord>,
        prefix: &str,
        date: &str,
    ) -> Result<Option<PathBuf>, ExportError> {
        if records.is_empty() {
            warn!(prefix, "no data to save");
            return Ok(None);
        }
        let records = dedup_and_sort(records);

        fs::create_dir_all(&self.output_dir).map_err(|source| ExportError::Io {
            source,
            path: self.output_dir.clone(),
        })?;
        let path = self.output_dir.join(format!("{prefix}_{date}.csv"));
        write_with_bom(&path, &records)?;

        fs::create_dir_all(&self.backup_dir).map_err(|source| ExportError::Io {
            source,
            path: self.backup_dir.clone(),
        })?;
        let backup = self.backup_dir.join(format!("{prefix}_{date}_backup.csv"));
        fs::copy(&path, &backup).map_err(|source| ExportError::Io {
            source,
            path: backup.clone(),
        })?;

        info!(
            rows = records.len(),
            path = %path.display(),
            backup = %backup.display(),
            "saved csv with utf-8 bom"
        );
        Ok(Some(path))
    }
}

fn write_with_bom(path: &Path, records: &[PartRecord]) -> Result<(), ExportError> {
    let mut file = File::create(path).map_err(|source| ExportError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    file.write_all("\u{feff}".as_bytes())
        .map_err(|source| ExportError::Io {
            source,
            path: path.to_path_buf(),
        })?;
    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    Ok(())
}

/// Today's date as YYYY-MM-DD, the suffix of every exported file.
pub fn current_date_string() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

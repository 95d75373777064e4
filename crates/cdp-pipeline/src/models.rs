//! Run summaries returned by the generation and extraction stages

use std::path::PathBuf;

/// One generated archive
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub index: usize,
    pub path: PathBuf,
    pub records: usize,
    pub object_names: usize,
    pub compressed_bytes: u64,
}

/// Generation result
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub archives_built: usize,
    pub total_records: usize,
    pub total_object_names: usize,
    pub total_bytes: u64,
    pub duration_seconds: f64,
    pub archives: Vec<ArchiveSummary>,
}

/// Rows produced from one archive
#[derive(Debug, Clone)]
pub struct ArchiveExtraction {
    pub path: PathBuf,
    pub records: usize,
    pub level_rows: usize,
    pub object_rows: usize,
}

/// Extraction result
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub archives_processed: usize,
    pub total_records: usize,
    pub total_level_rows: usize,
    pub total_object_rows: usize,
    pub duration_seconds: f64,
    pub archives: Vec<ArchiveExtraction>,
}

impl GenerationReport {
    pub(crate) fn from_archives(archives: Vec<ArchiveSummary>, duration_seconds: f64) -> Self {
        Self {
            archives_built: archives.len(),
            total_records: archives.iter().map(|a| a.records).sum(),
            total_object_names: archives.iter().map(|a| a.object_names).sum(),
            total_bytes: archives.iter().map(|a| a.compressed_bytes).sum(),
            duration_seconds,
            archives,
        }
    }
}

impl ExtractionReport {
    pub(crate) fn from_archives(archives: Vec<ArchiveExtraction>, duration_seconds: f64) -> Self {
        Self {
            archives_processed: archives.len(),
            total_records: archives.iter().map(|a| a.records).sum(),
            total_level_rows: archives.iter().map(|a| a.level_rows).sum(),
            total_object_rows: archives.iter().map(|a| a.object_rows).sum(),
            duration_seconds,
            archives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_totals() {
        let report = ExtractionReport::from_archives(
            vec![
                ArchiveExtraction {
                    path: PathBuf::from("0.zip"),
                    records: 2,
                    level_rows: 2,
                    object_rows: 7,
                },
                ArchiveExtraction {
                    path: PathBuf::from("1.zip"),
                    records: 3,
                    level_rows: 3,
                    object_rows: 4,
                },
            ],
            0.5,
        );

        assert_eq!(report.archives_processed, 2);
        assert_eq!(report.total_records, 5);
        assert_eq!(report.total_level_rows, 5);
        assert_eq!(report.total_object_rows, 11);
    }
}

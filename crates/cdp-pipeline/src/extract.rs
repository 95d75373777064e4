//! Archive extraction into the output tables

use crate::config::PipelineConfig;
use crate::models::{ArchiveExtraction, ExtractionReport};
use crate::record::Record;
use crate::sink::ExtractionSinks;
use crate::wave::{async_waves, blocking_waves};
use crate::workspace::discover_archives;
use cdp_common::{CdpError, Result};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use zip::ZipArchive;

type InMemoryArchive = ZipArchive<Cursor<Arc<[u8]>>>;

/// Extracts single archives into a shared pair of sinks
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    config: Arc<PipelineConfig>,
    sinks: Arc<ExtractionSinks>,
}

impl ArchiveExtractor {
    pub fn new(config: Arc<PipelineConfig>, sinks: Arc<ExtractionSinks>) -> Self {
        Self { config, sinks }
    }

    /// Parse every record of the archive at `path` and append its rows
    ///
    /// Entries are processed in waves of `files_open_in_parallel` tasks. A
    /// record that fails to parse aborts the archive after its wave; rows
    /// already appended stay in the sinks.
    pub async fn proceed_archive(&self, path: &Path) -> Result<ArchiveExtraction> {
        let bytes: Arc<[u8]> = tokio::fs::read(path).await?.into();
        let archive: InMemoryArchive = ZipArchive::new(Cursor::new(bytes))?;

        if archive.len() == 0 {
            return Err(CdpError::EmptyArchive(path.display().to_string()));
        }

        let entries: Vec<usize> = (0..archive.len()).collect();
        debug!(archive = %path.display(), entries = entries.len(), "Extracting archive");

        let sinks = Arc::clone(&self.sinks);
        let appended = blocking_waves(
            "extract",
            entries,
            self.config.files_open_in_parallel,
            move |index| extract_entry(archive.clone(), index, &sinks),
        )
        .await?;

        let mut summary = ArchiveExtraction {
            path: path.to_path_buf(),
            records: 0,
            level_rows: 0,
            object_rows: 0,
        };
        for (levels, objects) in appended.into_iter().flatten() {
            summary.records += 1;
            summary.level_rows += levels;
            summary.object_rows += objects;
        }

        info!(
            archive = %path.display(),
            records = summary.records,
            object_rows = summary.object_rows,
            "Archive extracted"
        );

        Ok(summary)
    }
}

/// Parse entry `index` and append it; directory entries yield `None`
fn extract_entry(
    mut archive: InMemoryArchive,
    index: usize,
    sinks: &ExtractionSinks,
) -> Result<Option<(usize, usize)>> {
    let mut entry = archive.by_index(index)?;
    if entry.is_dir() {
        return Ok(None);
    }

    let name = entry.name().to_string();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    let xml = String::from_utf8(bytes)
        .map_err(|e| CdpError::parse(&name, format!("not valid UTF-8: {}", e)))?;

    let record = Record::from_xml(&name, &xml)?;
    sinks.append_record(&record).map(Some)
}

/// Extracts every archive in the working directory
pub struct PipelineExtractor {
    config: Arc<PipelineConfig>,
    sinks: Arc<ExtractionSinks>,
}

impl PipelineExtractor {
    /// Extractor appending to `first.csv` / `second.csv` in the working directory
    pub fn new(config: PipelineConfig) -> Self {
        let sinks = Arc::new(ExtractionSinks::in_dir(&config.working_dir));
        Self {
            config: Arc::new(config),
            sinks,
        }
    }

    pub fn sinks(&self) -> &ExtractionSinks {
        &self.sinks
    }

    /// Extract every `*.zip` of the working directory
    ///
    /// Output tables are appended to, never truncated; running twice over the
    /// same archives duplicates rows.
    pub async fn proceed(&self) -> Result<ExtractionReport> {
        let start_time = Instant::now();
        self.config.validate()?;

        let archives: Vec<PathBuf> = discover_archives(&self.config.working_dir)?;
        if archives.is_empty() {
            warn!(
                working_dir = %self.config.working_dir.display(),
                "No archives to extract"
            );
        }

        let width = self.config.archive_wave_width(archives.len());
        info!(
            archives = archives.len(),
            parallel = self.config.files_open_in_parallel,
            fan_out = %self.config.archive_fan_out,
            "Starting extraction"
        );

        let extractor = Arc::new(ArchiveExtractor::new(
            Arc::clone(&self.config),
            Arc::clone(&self.sinks),
        ));
        let extracted = async_waves("archives", archives, width, |path| {
            let extractor = Arc::clone(&extractor);
            async move { extractor.proceed_archive(&path).await }
        })
        .await?;

        let report = ExtractionReport::from_archives(extracted, start_time.elapsed().as_secs_f64());

        info!(
            archives = report.archives_processed,
            records = report.total_records,
            level_rows = report.total_level_rows,
            object_rows = report.total_object_rows,
            "Extraction complete in {:.2}s",
            report.duration_seconds
        );

        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ArchiveFanOut;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn config(dir: &Path, parallel: usize) -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            archives_number: 1,
            files_number: 1,
            files_open_in_parallel: parallel,
            working_dir: dir.to_path_buf(),
            archive_fan_out: ArchiveFanOut::Unbounded,
        })
    }

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn record_xml(id: &str, level: u8, objects: &[&str]) -> String {
        let objects: String = objects
            .iter()
            .map(|name| format!(r#"<object name="{}"/>"#, name))
            .collect();
        format!(
            r#"<root><var name="id" value="{}"/><var name="level" value="{}"/><objects>{}</objects></root>"#,
            id, level, objects
        )
    }

    fn extractor(dir: &Path, parallel: usize) -> ArchiveExtractor {
        ArchiveExtractor::new(config(dir, parallel), Arc::new(ExtractionSinks::in_dir(dir)))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_proceed_archive_appends_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("0.zip");
        let a = record_xml("a", 3, &["AAAAAAAAAAAAAAAA", "BBBBBBBBBBBBBBBB"]);
        let b = record_xml("b", 100, &["CCCCCCCCCCCCCCCC"]);
        let c = record_xml("c", 1, &["DDDDDDDDDDDDDDDD"]);
        write_archive(
            &path,
            &[("0-0.xml", a.as_str()), ("0-1.xml", b.as_str()), ("0-2.xml", c.as_str())],
        );

        let extractor = extractor(tmp.path(), 2);
        let summary = extractor.proceed_archive(&path).await.unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.level_rows, 3);
        assert_eq!(summary.object_rows, 4);
        assert_eq!(extractor.sinks.levels().row_count().unwrap(), 3);
        assert_eq!(extractor.sinks.objects().row_count().unwrap(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_missing_level_fails_the_archive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("0.zip");
        let good = record_xml("ok", 5, &["AAAAAAAAAAAAAAAA"]);
        let bad = r#"<root><var name="id" value="broken"/><objects/></root>"#;
        write_archive(&path, &[("0-0.xml", good.as_str()), ("0-1.xml", bad)]);

        let err = extractor(tmp.path(), 2)
            .proceed_archive(&path)
            .await
            .unwrap_err();

        match err {
            CdpError::Parse { document, reason } => {
                assert_eq!(document, "0-1.xml");
                assert!(reason.contains("level"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_non_utf8_entry_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("0.zip");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("0-0.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<root>\xff\xfe</root>").unwrap();
        zip.finish().unwrap();

        let err = extractor(tmp.path(), 2)
            .proceed_archive(&path)
            .await
            .unwrap_err();

        match err {
            CdpError::Parse { document, reason } => {
                assert_eq!(document, "0-0.xml");
                assert!(reason.contains("UTF-8"));
            },
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_archive_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("0.zip");
        write_archive(&path, &[]);

        let err = extractor(tmp.path(), 2)
            .proceed_archive(&path)
            .await
            .unwrap_err();
        assert!(matches!(err, CdpError::EmptyArchive(_)));
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_an_archive_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("0.zip");
        fs::write(&path, b"not a zip").unwrap();

        let err = extractor(tmp.path(), 2)
            .proceed_archive(&path)
            .await
            .unwrap_err();
        assert!(matches!(err, CdpError::Archive(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pipeline_extractor_reads_every_archive() {
        let tmp = TempDir::new().unwrap();
        for i in 0..3 {
            let name = format!("{}-0.xml", i);
            let xml = record_xml(&format!("id{}", i), 10, &["AAAAAAAAAAAAAAAA"]);
            write_archive(
                &tmp.path().join(format!("{}.zip", i)),
                &[(name.as_str(), xml.as_str())],
            );
        }

        let extractor = PipelineExtractor::new((*config(tmp.path(), 2)).clone());
        let report = extractor.proceed().await.unwrap();

        assert_eq!(report.archives_processed, 3);
        assert_eq!(report.total_records, 3);
        assert_eq!(extractor.sinks().levels().row_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_no_archives_is_an_empty_report() {
        let tmp = TempDir::new().unwrap();
        let report = PipelineExtractor::new((*config(tmp.path(), 2)).clone())
            .proceed()
            .await
            .unwrap();
        assert_eq!(report.archives_processed, 0);
        assert!(!tmp.path().join(crate::sink::FIRST_SINK_FILE).exists());
    }
}

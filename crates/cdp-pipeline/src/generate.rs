//! Record generation and archiving
//!
//! Each archive is produced in two steps. Its record files are written to
//! the working directory in waves of `files_open_in_parallel` blocking tasks.
//! Then the files are packed into `<index>.zip` in file-index order, each loose
//! file being removed as soon as it is in the archive.

use crate::config::PipelineConfig;
use crate::ids::UniqueIdGenerator;
use crate::models::{ArchiveSummary, GenerationReport};
use crate::record::RecordBuilder;
use crate::wave::{async_waves, blocking_waves};
use crate::workspace::{archive_path, prepare_working_dir};
use cdp_common::Result;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entry name of record `file_index` of archive `archive_index`
pub fn record_file_name(archive_index: usize, file_index: usize) -> String {
    format!("{}-{}.xml", archive_index, file_index)
}

/// A record file waiting to be archived
#[derive(Debug)]
struct LooseRecord {
    name: String,
    path: PathBuf,
    objects: usize,
}

/// Builds single archives
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    config: Arc<PipelineConfig>,
    ids: Arc<UniqueIdGenerator>,
    records: RecordBuilder,
}

impl ArchiveBuilder {
    pub fn new(config: Arc<PipelineConfig>, ids: Arc<UniqueIdGenerator>) -> Self {
        Self {
            config,
            ids,
            records: RecordBuilder::new(),
        }
    }

    /// Generate `files_number` records and pack them into `<index>.zip`
    ///
    /// A failed record task aborts the archive once its wave has finished;
    /// record files already written by earlier waves are left in place.
    pub async fn build_archive(&self, index: usize) -> Result<ArchiveSummary> {
        let dir = self.config.working_dir.clone();
        let files: Vec<usize> = (0..self.config.files_number).collect();

        let ids = Arc::clone(&self.ids);
        let records = self.records.clone();
        let record_dir = dir.clone();
        let loose = blocking_waves(
            "generate",
            files,
            self.config.files_open_in_parallel,
            move |file_index| {
                let (record, xml) = records.build_document(&ids)?;
                let name = record_file_name(index, file_index);
                let path = record_dir.join(&name);
                fs::write(&path, xml)?;
                Ok(LooseRecord {
                    name,
                    path,
                    objects: record.objects.len(),
                })
            },
        )
        .await?;

        let records = loose.len();
        let object_names = loose.iter().map(|r| r.objects).sum();
        debug!(archive = index, records, "Record files written");

        let path = archive_path(&dir, index);
        let target = path.clone();
        let compressed_bytes =
            tokio::task::spawn_blocking(move || pack_archive(&target, &loose)).await??;

        info!(
            archive = %path.display(),
            records,
            bytes = compressed_bytes,
            "Archive built"
        );

        Ok(ArchiveSummary {
            index,
            path,
            records,
            object_names,
            compressed_bytes,
        })
    }
}

/// Write `files` into a deflated zip at `archive`, removing each after it is added
fn pack_archive(archive: &Path, files: &[LooseRecord]) -> Result<u64> {
    let mut zip = ZipWriter::new(File::create(archive)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for record in files {
        zip.start_file(record.name.as_str(), options)?;
        let mut source = File::open(&record.path)?;
        io::copy(&mut source, &mut zip)?;
        drop(source);
        fs::remove_file(&record.path)?;
    }

    let file = zip.finish()?;
    Ok(file.metadata()?.len())
}

/// Generates every archive of a run
///
/// One identifier generator is shared by all record tasks, so ids are unique
/// across the whole run.
pub struct PipelineGenerator {
    config: Arc<PipelineConfig>,
    ids: Arc<UniqueIdGenerator>,
}

impl PipelineGenerator {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_ids(config, Arc::new(UniqueIdGenerator::new()))
    }

    /// Use an existing generator, e.g. to keep ids unique across runs
    pub fn with_ids(config: PipelineConfig, ids: Arc<UniqueIdGenerator>) -> Self {
        Self {
            config: Arc::new(config),
            ids,
        }
    }

    pub fn ids(&self) -> &UniqueIdGenerator {
        &self.ids
    }

    /// Build archives `0..archives_number` in the working directory
    pub async fn build(&self) -> Result<GenerationReport> {
        let start_time = Instant::now();
        self.config.validate()?;
        prepare_working_dir(&self.config.working_dir)?;

        let indices: Vec<usize> = (0..self.config.archives_number).collect();
        let width = self.config.archive_wave_width(indices.len());

        info!(
            archives = indices.len(),
            files = self.config.files_number,
            parallel = self.config.files_open_in_parallel,
            fan_out = %self.config.archive_fan_out,
            working_dir = %self.config.working_dir.display(),
            "Starting generation"
        );

        let builder = Arc::new(ArchiveBuilder::new(
            Arc::clone(&self.config),
            Arc::clone(&self.ids),
        ));
        let archives = async_waves("archives", indices, width, |index| {
            let builder = Arc::clone(&builder);
            async move { builder.build_archive(index).await }
        })
        .await?;

        let report =
            GenerationReport::from_archives(archives, start_time.elapsed().as_secs_f64());

        info!(
            archives = report.archives_built,
            records = report.total_records,
            objects = report.total_object_names,
            bytes = report.total_bytes,
            "Generation complete in {:.2}s",
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
    use crate::record::Record;
    use std::collections::HashSet;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn config(dir: &Path, archives: usize, files: usize, parallel: usize) -> PipelineConfig {
        PipelineConfig {
            archives_number: archives,
            files_number: files,
            files_open_in_parallel: parallel,
            working_dir: dir.to_path_buf(),
            archive_fan_out: ArchiveFanOut::Unbounded,
        }
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    fn loose_xml(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref().unwrap().path().extension().and_then(|x| x.to_str()) == Some("xml")
            })
            .count()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_build_archive_packs_every_record() {
        let tmp = TempDir::new().unwrap();
        let builder = ArchiveBuilder::new(
            Arc::new(config(tmp.path(), 1, 7, 3)),
            Arc::new(UniqueIdGenerator::new()),
        );

        let summary = builder.build_archive(4).await.unwrap();

        assert_eq!(summary.path, tmp.path().join("4.zip"));
        assert_eq!(summary.records, 7);
        assert!(summary.compressed_bytes > 0);
        assert_eq!(loose_xml(tmp.path()), 0);

        let mut names = entry_names(&summary.path);
        names.sort_by_key(|n| n.trim_start_matches("4-").trim_end_matches(".xml").parse::<usize>().unwrap());
        assert_eq!(names, (0..7).map(|i| record_file_name(4, i)).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_entries_are_deflated_records() {
        let tmp = TempDir::new().unwrap();
        let builder = ArchiveBuilder::new(
            Arc::new(config(tmp.path(), 1, 3, 3)),
            Arc::new(UniqueIdGenerator::new()),
        );
        let summary = builder.build_archive(0).await.unwrap();

        let mut archive = ZipArchive::new(File::open(&summary.path).unwrap()).unwrap();
        let mut objects = 0;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.compression(), CompressionMethod::Deflated);
            let name = entry.name().to_string();
            let mut xml = String::new();
            entry.read_to_string(&mut xml).unwrap();
            objects += Record::from_xml(&name, &xml).unwrap().objects.len();
        }
        assert_eq!(objects, summary.object_names);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pipeline_generator_shares_one_id_space() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("run");
        let generator = PipelineGenerator::new(config(&work, 3, 5, 2));

        let report = generator.build().await.unwrap();

        assert_eq!(report.archives_built, 3);
        assert_eq!(report.total_records, 15);
        assert_eq!(generator.ids().len(), 15);
        let indices: HashSet<_> = report.archives.iter().map(|a| a.index).collect();
        assert_eq!(indices, (0..3).collect());
        for archive in &report.archives {
            assert_eq!(entry_names(&archive.path).len(), 5);
        }
        assert_eq!(loose_xml(&work), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waves_fan_out_builds_every_archive() {
        let tmp = TempDir::new().unwrap();
        let mut config = config(tmp.path(), 5, 2, 2);
        config.archive_fan_out = ArchiveFanOut::Waves;

        let report = PipelineGenerator::new(config).build().await.unwrap();
        assert_eq!(report.archives_built, 5);
        assert_eq!(report.total_records, 10);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_writing() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("never");
        let err = PipelineGenerator::new(config(&work, 1, 0, 1))
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, cdp_common::CdpError::Config(_)));
        assert!(!work.exists());
    }
}

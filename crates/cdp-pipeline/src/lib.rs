//! CDP Pipeline Library
//!
//! Generates synthetic XML records into zip archives and extracts them into
//! two CSV tables, running file work in chunked parallel waves.
//!
//! # Stages
//!
//! - **Generation**: each archive's records are written in waves of
//!   `files_open_in_parallel` tasks, then zipped and the loose files removed
//! - **Extraction**: each archive's entries are parsed in waves and appended
//!   to `first.csv` (`id`, `level`) and `second.csv` (`id`, `object_name`)
//!
//! Record identifiers come from one [`UniqueIdGenerator`] shared by the whole
//! run.
//!
//! # Example
//!
//! ```no_run
//! use cdp_pipeline::{PipelineConfig, PipelineExtractor, PipelineGenerator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::load()?;
//!     PipelineGenerator::new(config.clone()).build().await?;
//!     let report = PipelineExtractor::new(config).proceed().await?;
//!     println!("{} records extracted", report.total_records);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod chunking;
pub mod config;
pub mod extract;
pub mod generate;
pub mod ids;
pub mod models;
pub mod record;
pub mod sink;
pub mod wave;
pub mod workspace;

pub use config::{ArchiveFanOut, PipelineConfig};
pub use extract::{ArchiveExtractor, PipelineExtractor};
pub use generate::{ArchiveBuilder, PipelineGenerator};
pub use ids::UniqueIdGenerator;
pub use models::{ArchiveExtraction, ArchiveSummary, ExtractionReport, GenerationReport};
pub use record::{Record, RecordBuilder, RecordObject};
pub use sink::{ExtractionSinks, OutputSink};
pub use workspace::{clean, discover_archives, prepare_working_dir, CleanScope};

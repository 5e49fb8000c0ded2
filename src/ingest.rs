//! Ingestion pipeline orchestration.
//!
//! For each PDF in the ingest folder: dedup check → page extraction →
//! chunking → per-chunk embedding → insert. Files are processed one at a
//! time and chunks in order.
//!
//! Failure handling:
//! - dedup lookup error: logged, the file is ingested anyway (fail open)
//! - unreadable file (or an extractor panic): counted as failed, the batch
//!   continues. Extraction runs on the blocking pool.
//! - embedding error: the chunk is skipped
//! - insert error: the rest of that file is abandoned; rows already
//!   inserted stay

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use opsdesk_core::chunk::{prepare_text, Chunker};
use opsdesk_core::embedding::{EmbedIntent, Embedder};
use opsdesk_core::models::{ChunkMetadata, ChunkRecord};
use opsdesk_core::store::Store;

use crate::config::Config;
use crate::connector_fs::{scan_folder, SourceFile};
use crate::embedding::{create_embedder, DisabledEmbedder};
use crate::extract::{panic_message, ExtractError, PdfExtractor, TextExtractor};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::runtime::open_store;
use crate::secrets::Secrets;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Rows for this filename already exist.
    Skipped,
    Ingested,
    Failed(String),
}

/// What happened to one file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub name: String,
    pub outcome: FileOutcome,
    pub strategy: Option<&'static str>,
    pub chunks: usize,
    pub uploaded: usize,
    pub embed_failures: usize,
}

impl FileReport {
    fn new(name: &str, outcome: FileOutcome) -> Self {
        Self {
            name: name.to_string(),
            outcome,
            strategy: None,
            chunks: 0,
            uploaded: 0,
            embed_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub files: Vec<FileReport>,
}

impl IngestReport {
    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == FileOutcome::Skipped)
    }

    pub fn ingested(&self) -> usize {
        self.count(|o| *o == FileOutcome::Ingested)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    pub fn chunks(&self) -> usize {
        self.files.iter().map(|f| f.chunks).sum()
    }

    pub fn uploaded(&self) -> usize {
        self.files.iter().map(|f| f.uploaded).sum()
    }
}

/// Runs the per-file pipeline against any store, embedder and extractor.
pub struct Ingestor {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn TextExtractor>,
    chunker: Chunker,
    category: String,
    dry_run: bool,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn TextExtractor>,
        chunker: Chunker,
        category: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            extractor,
            chunker,
            category: category.into(),
            dry_run: false,
        }
    }

    /// Chunk but do not embed or insert.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn ingest_file(&self, file: &SourceFile) -> FileReport {
        match self.store.source_exists(&file.name).await {
            Ok(true) => return FileReport::new(&file.name, FileOutcome::Skipped),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "dedup lookup failed, ingesting anyway");
            }
        }

        let extractor = self.extractor.clone();
        let path = file.path.clone();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract_file(&path))
            .await
            .unwrap_or_else(|e| {
                let reason = if e.is_panic() {
                    format!("extractor panicked: {}", panic_message(e.into_panic().as_ref()))
                } else {
                    e.to_string()
                };
                Err(ExtractError::Pdf(reason))
            });
        let pages = match extracted {
            Ok(pages) => pages,
            Err(e) => {
                tracing::error!(file = %file.name, error = %e, "could not read file");
                return FileReport::new(&file.name, FileOutcome::Failed(e.to_string()));
            }
        };

        let text = prepare_text(pages.as_slice());
        let chunked = self.chunker.chunk(&text);
        if chunked.chunks.is_empty() {
            tracing::warn!(file = %file.name, "no text extracted");
        }

        let mut report = FileReport::new(&file.name, FileOutcome::Ingested);
        report.strategy = Some(chunked.strategy);
        report.chunks = chunked.chunks.len();
        if self.dry_run {
            return report;
        }

        for (index, content) in chunked.chunks.iter().enumerate() {
            let embedding = match self.embedder.embed(content, EmbedIntent::Document).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(file = %file.name, chunk = index, error = %e, "embedding failed, chunk skipped");
                    report.embed_failures += 1;
                    continue;
                }
            };

            let mut metadata = ChunkMetadata::for_source(&file.name);
            metadata.chunk_index = Some(index);
            metadata.strategy = Some(chunked.strategy.to_string());
            let record = ChunkRecord::new(content.as_str(), metadata, &self.category, embedding);

            if let Err(e) = self.store.insert_chunk(&record).await {
                tracing::error!(file = %file.name, chunk = index, error = %e, "insert failed, abandoning file");
                report.outcome = FileOutcome::Failed(format!("insert failed: {}", e));
                return report;
            }
            report.uploaded += 1;
        }

        report
    }

    /// Process `files` in order, calling `on_file` after each one.
    pub async fn ingest_files(
        &self,
        files: &[SourceFile],
        progress: &dyn IngestProgressReporter,
        mut on_file: impl FnMut(&FileReport),
    ) -> IngestReport {
        let total = files.len() as u64;
        let mut report = IngestReport::default();
        for (i, file) in files.iter().enumerate() {
            progress.report(IngestProgressEvent::File {
                n: i as u64 + 1,
                total,
                name: file.name.clone(),
            });
            let file_report = self.ingest_file(file).await;
            on_file(&file_report);
            report.files.push(file_report);
        }
        report
    }
}

fn print_file_report(file: &FileReport, dry_run: bool) {
    match &file.outcome {
        FileOutcome::Skipped => println!("skip {} (already ingested)", file.name),
        FileOutcome::Failed(reason) if file.strategy.is_none() => {
            println!("fail {}: {}", file.name, reason)
        }
        outcome => {
            println!("file {}", file.name);
            if let Some(strategy) = file.strategy {
                println!("  format: {}", strategy);
            }
            println!("  chunks: {}", file.chunks);
            if !dry_run {
                println!("  uploaded: {}", file.uploaded);
                if file.embed_failures > 0 {
                    println!("  embedding failures: {}", file.embed_failures);
                }
            }
            if let FileOutcome::Failed(reason) = outcome {
                println!("  failed: {}", reason);
            }
        }
    }
}

/// `opsdesk ingest`: scan the folder and ingest every new PDF.
pub async fn run_ingest(
    config: &Config,
    folder: Option<PathBuf>,
    dry_run: bool,
    limit: Option<usize>,
    progress_mode: ProgressMode,
) -> Result<()> {
    let secrets = Secrets::load(config)?;
    if !dry_run {
        secrets.check_required(config)?;
    }

    let folder = folder.unwrap_or_else(|| config.ingest.folder.clone());
    let progress = progress_mode.reporter();
    progress.report(IngestProgressEvent::Scanning {
        folder: folder.display().to_string(),
    });

    let mut files = scan_folder(&folder, &config.ingest.include_globs)?;
    if let Some(lim) = limit {
        files.truncate(lim);
    }

    let store = open_store(config, &secrets).await?;
    let embedder: Arc<dyn Embedder> = if dry_run {
        Arc::new(DisabledEmbedder)
    } else {
        create_embedder(&config.embedding, &secrets)?
    };

    let ingestor = Ingestor::new(
        store,
        embedder,
        Arc::new(PdfExtractor),
        Chunker::new(&config.chunking.options()),
        config.ingest.category.clone(),
    )
    .dry_run(dry_run);

    let report = ingestor
        .ingest_files(&files, progress.as_ref(), |f| print_file_report(f, dry_run))
        .await;

    if dry_run {
        println!("ingest {} (dry-run)", folder.display());
    } else {
        println!("ingest {}", folder.display());
    }
    println!("  files found: {}", files.len());
    println!("  skipped (already ingested): {}", report.skipped());
    println!("  ingested: {}", report.ingested());
    println!("  failed: {}", report.failed());
    if dry_run {
        println!("  estimated chunks: {}", report.chunks());
    } else {
        println!("  chunks: {}", report.chunks());
        println!("  uploaded: {}", report.uploaded());
    }
    println!("ok");

    Ok(())
}

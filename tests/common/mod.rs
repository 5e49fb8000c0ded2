//! Fakes shared by the integration tests.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use opsdesk::connector_fs::SourceFile;
use opsdesk::extract::{ExtractError, TextExtractor};
use opsdesk_core::embedding::{EmbedError, EmbedIntent, Embedder};
use opsdesk_core::generation::{GenerateError, Generator};
use opsdesk_core::models::{ChunkRecord, MatchedChunk};
use opsdesk_core::prompt::single_turn_message;
use opsdesk_core::store::memory::InMemoryStore;
use opsdesk_core::store::Store;

/// Three-dimensional "embedding": mentions of regalías, mentions of seguridad,
/// and a small bias on stored passages so that they are never zero vectors.
pub struct KeywordEmbedder {
    pub fail_on: Option<&'static str>,
    pub fail_all: bool,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            fail_on: None,
            fail_all: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(marker: &'static str) -> Self {
        Self {
            fail_on: Some(marker),
            ..Self::new()
        }
    }

    pub fn offline() -> Self {
        Self {
            fail_all: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed(&self, text: &str, intent: EmbedIntent) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all {
            return Err(EmbedError::Request("connection refused".into()));
        }
        if let Some(marker) = self.fail_on {
            if text.contains(marker) {
                return Err(EmbedError::Status {
                    status: 500,
                    body: "internal".into(),
                });
            }
        }
        let lower = text.to_lowercase();
        Ok(vec![
            lower.matches("regalías").count() as f32,
            lower.matches("seguridad").count() as f32,
            if intent == EmbedIntent::Document { 0.1 } else { 0.0 },
        ])
    }
}

/// Records every single-turn message it is asked to answer.
#[derive(Default)]
pub struct RecordingGenerator {
    pub messages: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingGenerator {
    pub fn last_message(&self) -> String {
        self.messages.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, system: &str, question: &str) -> Result<String, GenerateError> {
        self.messages
            .lock()
            .unwrap()
            .push(single_turn_message(system, question));
        if self.fail {
            return Err(GenerateError::Status {
                status: 429,
                body: "quota exceeded".into(),
            });
        }
        Ok(format!("Según el contexto: {}", question))
    }
}

/// Reads the file as UTF-8 and treats form feeds as page breaks.
pub struct FormFeedExtractor;

impl TextExtractor for FormFeedExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
        Ok(text.split('\x0c').map(str::to_string).collect())
    }
}

/// In-memory store whose dedup lookup always errors.
#[derive(Default)]
pub struct BrokenLookupStore {
    pub inner: InMemoryStore,
}

#[async_trait]
impl Store for BrokenLookupStore {
    fn name(&self) -> &str {
        "broken-lookup"
    }

    async fn source_exists(&self, _source: &str) -> Result<bool> {
        anyhow::bail!("network unreachable")
    }

    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        self.inner.insert_chunk(record).await
    }

    async fn match_chunks(&self, query: &[f32], t: f64, n: usize) -> Result<Vec<MatchedChunk>> {
        self.inner.match_chunks(query, t, n).await
    }
}

/// In-memory store that rejects inserts for one source after `allow` rows.
pub struct FlakyInsertStore {
    pub inner: InMemoryStore,
    pub source: &'static str,
    pub allow: usize,
    inserted: AtomicUsize,
}

impl FlakyInsertStore {
    pub fn new(source: &'static str, allow: usize) -> Self {
        Self {
            inner: InMemoryStore::new(),
            source,
            allow,
            inserted: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Store for FlakyInsertStore {
    fn name(&self) -> &str {
        "flaky-insert"
    }

    async fn source_exists(&self, source: &str) -> Result<bool> {
        self.inner.source_exists(source).await
    }

    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        if record.source() == self.source
            && self.inserted.fetch_add(1, Ordering::SeqCst) >= self.allow
        {
            anyhow::bail!("unique violation");
        }
        self.inner.insert_chunk(record).await
    }

    async fn match_chunks(&self, query: &[f32], t: f64, n: usize) -> Result<Vec<MatchedChunk>> {
        self.inner.match_chunks(query, t, n).await
    }
}

/// A three-page regulation: a preamble, then five articles per page.
///
/// `regalias` lists the article numbers whose body mentions royalties.
pub fn legal_document(regalias: &[usize]) -> String {
    let mut pages = Vec::new();
    let mut article = 1;
    for page in 0..3 {
        let mut text = String::new();
        if page == 0 {
            text.push_str("REGLAMENTO DE SEGURIDAD MINERA\nDecreto supremo que aprueba el presente texto .\n");
        }
        for _ in 0..5 {
            let topic = if regalias.contains(&article) {
                "el pago de regalías sobre el valor bruto del mineral extraído"
            } else {
                "la presentación del informe técnico anual ante la autoridad"
            };
            text.push_str(&format!(
                "Artículo {}\nEl titular de la concesión está obligado a cumplir con {} .\n",
                article, topic
            ));
            article += 1;
        }
        pages.push(text);
    }
    pages.join("\x0c")
}

/// Write `contents` to `dir/name` and return it as a [`SourceFile`].
pub fn source_file(dir: &Path, name: &str, contents: &str) -> SourceFile {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    SourceFile {
        name: name.to_string(),
        path,
    }
}

pub fn memory_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new())
}

/// A PDF with one page per entry of `pages`, each line drawn with its own
/// `Tj`. Offsets in the xref table and stream lengths are computed.
pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    let n = pages.len();
    // 1 catalog, 2 pages, 3 font, then (page, contents) pairs.
    let page_id = |i: usize| 4 + 2 * i;
    let contents_id = |i: usize| 5 + 2 * i;
    let total_objects = 3 + 2 * n;

    let mut out = Vec::new();
    let mut offsets = vec![0usize; total_objects + 1];
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets[1] = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    offsets[2] = out.len();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", page_id(i))).collect();
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    offsets[3] = out.len();
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >> endobj\n",
    );

    for (i, lines) in pages.iter().enumerate() {
        offsets[page_id(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_id(i),
                contents_id(i)
            )
            .as_bytes(),
        );

        let mut stream = String::from("BT /F1 10 Tf 50 750 Td 14 TL\n");
        for line in lines.iter() {
            stream.push_str(&format!("({}) Tj T*\n", line));
        }
        stream.push_str("ET");

        offsets[contents_id(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                contents_id(i),
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", total_objects + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets.iter().skip(1) {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            total_objects + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// Two-page plant manual, ASCII only.
pub fn manual_pdf() -> Vec<u8> {
    pdf_with_pages(&[
        &[
            "Manual de operaciones de planta",
            "El operador revisa la bomba principal al inicio de cada turno.",
        ],
        &[
            "Antes de la parada se registra la presion de descarga.",
            "Las regalias se reportan a la gerencia cada trimestre.",
        ],
    ])
}

//! Document extraction: PDF pages and tables to ordered text chunks.
//!
//! The [`DocumentExtractor`] walks a directory of PDFs, reads every page
//! through a [`PageSource`], renders the page's tables as `" | "`-delimited
//! rows, and splits both the page text and each rendered table with the
//! same [`RecursiveSplitter`].
//!
//! Chunks are emitted in document → page → (text chunks, then table chunks)
//! order. The order is stable across runs for the same directory contents.

mod layout;
mod pdf;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::chunking::RecursiveSplitter;
use crate::document::{Chunk, ChunkKind};
use crate::error::{RagError, Result};

pub use layout::{PageFonts, TextFragment, collect_fragments, detect_tables, layout_text};
pub use pdf::PdfReader;

/// A table as rows of cells; `None` marks a cell with no content.
pub type Table = Vec<Vec<Option<String>>>;

/// Text and tables read from a single page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    /// 1-based page number.
    pub number: u32,
    /// Plain page text.
    pub text: String,
    /// Tables detected on the page, in reading order.
    pub tables: Vec<Table>,
}

/// A reader that turns one document file into its pages.
///
/// [`PdfReader`] is the production implementation. Tests and alternative
/// parsers can provide their own.
pub trait PageSource: Send + Sync {
    /// Read every page of the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] if the file cannot be opened or parsed.
    fn read_pages(&self, path: &Path) -> Result<Vec<PageContent>>;
}

/// Counts gathered during one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Number of document files read.
    pub files: usize,
    /// Number of pages read across all files.
    pub pages: usize,
    /// Number of chunks taken from page text.
    pub text_chunks: usize,
    /// Number of chunks taken from rendered tables.
    pub table_chunks: usize,
}

impl ExtractionStats {
    /// Total number of chunks produced.
    pub fn total_chunks(&self) -> usize {
        self.text_chunks + self.table_chunks
    }
}

/// Render a table as rows of `" | "`-joined cells separated by newlines.
///
/// Missing cells render as the empty string.
pub fn render_table(table: &Table) -> String {
    table
        .iter()
        .map(|row| {
            row.iter().map(|cell| cell.as_deref().unwrap_or("")).collect::<Vec<_>>().join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// List the PDF files directly inside `dir`, sorted by file name.
///
/// The scan is not recursive and the `.pdf` extension matches in any case.
pub fn list_pdfs(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(RagError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| RagError::io(dir, e.into()))?;
        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if entry.file_type().is_file() && is_pdf {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Converts a directory of documents into ordered, bounded text chunks.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::extract::DocumentExtractor;
///
/// let extractor = DocumentExtractor::new(1000, 200);
/// let chunks = extractor.extract_directory("./data")?;
/// ```
#[derive(Clone)]
pub struct DocumentExtractor {
    splitter: RecursiveSplitter,
    source: Arc<dyn PageSource>,
}

impl DocumentExtractor {
    /// Create an extractor that reads PDFs with [`PdfReader`].
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_source(chunk_size, chunk_overlap, Arc::new(PdfReader::new()))
    }

    /// Create an extractor backed by a custom [`PageSource`].
    pub fn with_source(
        chunk_size: usize,
        chunk_overlap: usize,
        source: Arc<dyn PageSource>,
    ) -> Self {
        Self { splitter: RecursiveSplitter::new(chunk_size, chunk_overlap), source }
    }

    /// Extract chunks from every PDF directly inside `dir`.
    ///
    /// # Errors
    ///
    /// Fails on the first file that cannot be read. No partial result is
    /// returned.
    pub fn extract_directory(&self, dir: impl AsRef<Path>) -> Result<Vec<Chunk>> {
        self.extract_directory_with_stats(dir).map(|(chunks, _)| chunks)
    }

    /// Like [`extract_directory`](Self::extract_directory), also returning
    /// per-run counts.
    pub fn extract_directory_with_stats(
        &self,
        dir: impl AsRef<Path>,
    ) -> Result<(Vec<Chunk>, ExtractionStats)> {
        let dir = dir.as_ref();
        let mut stats = ExtractionStats::default();
        let mut chunks = Vec::new();

        for path in list_pdfs(dir)? {
            let pages = self.source.read_pages(&path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let produced = self.chunk_pages(&name, &pages, &mut stats);
            debug!(document.id = %name, pages = pages.len(), chunk_count = produced.len(), "extracted document");

            stats.files += 1;
            chunks.extend(produced);
        }

        info!(
            dir = %dir.display(),
            files = stats.files,
            pages = stats.pages,
            text_chunks = stats.text_chunks,
            table_chunks = stats.table_chunks,
            "extraction complete"
        );

        Ok((chunks, stats))
    }

    /// Chunk already-read pages of one document.
    ///
    /// Each page gets source id `"{document}#page={n}"`. Within a page, text
    /// chunks come first, then the chunks of each table in order.
    pub fn chunk_pages(
        &self,
        document: &str,
        pages: &[PageContent],
        stats: &mut ExtractionStats,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            stats.pages += 1;
            let source_id = format!("{document}#page={}", page.number);
            let mut sequence = 0usize;

            if !page.text.trim().is_empty() {
                for text in self.splitter.split(&page.text) {
                    chunks.push(Chunk::new(text, &source_id, page.number, ChunkKind::Text, sequence));
                    sequence += 1;
                    stats.text_chunks += 1;
                }
            }

            for table in &page.tables {
                let rendered = render_table(table);
                if rendered.trim().is_empty() {
                    continue;
                }
                for text in self.splitter.split(&rendered) {
                    chunks.push(Chunk::new(text, &source_id, page.number, ChunkKind::Table, sequence));
                    sequence += 1;
                    stats.table_chunks += 1;
                }
            }
        }

        chunks
    }
}

impl std::fmt::Debug for DocumentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentExtractor").field("splitter", &self.splitter).finish_non_exhaustive()
    }
}

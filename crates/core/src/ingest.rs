use crate::chunking::TextSplitter;
use crate::error::{IngestError, Result};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::models::Chunk;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;

/// Recursively lists the PDF files under `folder`, sorted for stable
/// ingestion order.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Turns one uploaded document into chunk records: extract, clean, split,
/// validate. This is the unit of work behind a single ingestion job.
pub struct DocumentIngestor {
    extractor: Box<dyn PdfExtractor + Send + Sync>,
    splitter: TextSplitter,
}

impl DocumentIngestor {
    pub fn new(splitter: TextSplitter) -> Self {
        Self::with_extractor(Box::new(LopdfExtractor), splitter)
    }

    pub fn with_extractor(
        extractor: Box<dyn PdfExtractor + Send + Sync>,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            extractor,
            splitter,
        }
    }

    /// Extractor failures propagate unchanged; a document whose every page
    /// is blank fails with `EmptyDocument` so operators can tell "broken
    /// PDF" from "blank scans".
    pub fn process(&self, path: &Path) -> Result<Vec<Chunk>> {
        let pages = self.extractor.extract_pages(path)?;

        if pages.iter().all(|page| page.content.trim().is_empty()) {
            error!(path = %path.display(), "no extractable text found");
            return Err(IngestError::EmptyDocument(path.to_path_buf()));
        }

        let chunks = self.splitter.split_pages(&pages);
        info!(
            chunks = chunks.len(),
            pages = pages.len(),
            path = %path.display(),
            "document chunked"
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::{discover_pdf_files, DocumentIngestor};
    use crate::chunking::TextSplitter;
    use crate::error::IngestError;
    use crate::extractor::{PageText, PdfExtractor};
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    struct FakeExtractor {
        pages: Vec<PageText>,
    }

    impl PdfExtractor for FakeExtractor {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<PageText>, IngestError> {
            Ok(self.pages.clone())
        }
    }

    fn ingestor_with(pages: Vec<PageText>) -> DocumentIngestor {
        DocumentIngestor::with_extractor(
            Box::new(FakeExtractor { pages }),
            TextSplitter::new(1_000, 200),
        )
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.pdf"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"skip me"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn all_blank_pages_fail_with_empty_document() {
        let ingestor = ingestor_with(vec![
            PageText {
                page: 1,
                content: "   ".to_string(),
            },
            PageText {
                page: 2,
                content: String::new(),
            },
        ]);

        let result = ingestor.process(Path::new("blank.pdf"));
        assert!(matches!(result, Err(IngestError::EmptyDocument(_))));
    }

    #[test]
    fn chunks_keep_their_page_numbers() {
        let ingestor = ingestor_with(vec![
            PageText {
                page: 1,
                content: "Revenue was $100 in 2023.".to_string(),
            },
            PageText {
                page: 2,
                content: String::new(),
            },
        ]);

        let chunks = ingestor
            .process(Path::new("report.pdf"))
            .expect("one readable page should succeed");

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|chunk| chunk.page == 1));
        assert!(chunks.iter().any(|chunk| chunk.text.contains("$100")));
    }

    #[test]
    fn extractor_failures_propagate_unchanged() {
        let ingestor = DocumentIngestor::new(TextSplitter::new(1_000, 200));
        let result = ingestor.process(Path::new("/nonexistent/q3.pdf"));
        assert!(matches!(result, Err(IngestError::NotFound(_))));
    }
}

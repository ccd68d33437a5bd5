use crate::error::{IngestError, Result};
use lopdf::Document;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Text extracted from one physical document page. Pages are emitted even
/// when empty so page numbering downstream stays aligned with the source.
#[derive(Debug, Clone)]
pub struct PageText {
    pub page: u32,
    pub content: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>> {
        if !path.exists() {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }

        // Read fully before parsing so a read failure (permissions, a
        // directory handed in as a file) surfaces as `Io`, distinct from a
        // malformed document.
        let bytes = fs::read(path)?;
        let document = Document::load_mem(&bytes).map_err(|error| IngestError::Extraction {
            path: path.to_path_buf(),
            details: error.to_string(),
        })?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            // A page whose text extraction fails degrades to an empty page
            // instead of failing the document.
            let content = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    warn!(
                        page = page_no,
                        path = %path.display(),
                        %error,
                        "page text extraction failed"
                    );
                    String::new()
                }
            };

            if content.trim().is_empty() {
                warn!(page = page_no, path = %path.display(), "page is empty or unreadable");
            }

            pages.push(PageText {
                page: page_no,
                content,
            });
        }

        debug!(pages = pages.len(), path = %path.display(), "extracted page texts");
        Ok(pages)
    }
}

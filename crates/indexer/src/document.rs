use crate::error::{IndexerError, Result};
use std::path::{Path, PathBuf};

/// Kind of source document, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => Self::Pdf,
            _ => Self::Text,
        }
    }
}

/// Extract the raw text of a document.
///
/// PDF pages are joined with a newline; any other file must be UTF-8 text.
pub async fn extract_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref().to_path_buf();
    match DocumentKind::from_path(&path) {
        DocumentKind::Pdf => extract_pdf(path).await,
        DocumentKind::Text => {
            let bytes = tokio::fs::read(&path).await?;
            String::from_utf8(bytes)
                .map_err(|err| IndexerError::document(&path, format!("not valid UTF-8: {err}")))
        }
    }
}

async fn extract_pdf(path: PathBuf) -> Result<String> {
    // pdf-extract is synchronous and CPU bound
    let text = tokio::task::spawn_blocking({
        let path = path.clone();
        move || pdf_extract::extract_text(&path)
    })
    .await
    .map_err(|err| IndexerError::Other(format!("join pdf extraction task: {err}")))?
    .map_err(|err| IndexerError::document(&path, format!("failed to extract PDF text: {err}")))?;

    log::debug!("Extracted {} bytes of text from {}", text.len(), path.display());
    Ok(join_pages(&text))
}

/// pdf-extract separates pages with form feeds
fn join_pages(text: &str) -> String {
    text.split('\x0c').collect::<Vec<_>>().join("\n")
}

//! Format-aware text extraction for uploaded documents.
//!
//! Extraction strategy is selected from the declared media type through a closed dispatch
//! table; file contents are never sniffed. A type outside the table is rejected before any
//! decoding work happens, and a recognized type with unreadable content fails without
//! returning partial output.

use thiserror::Error;

/// Errors raised while extracting text from an uploaded document.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Declared media type is missing or outside the supported table.
    #[error("unsupported media type: {}", declared.as_deref().unwrap_or("<missing>"))]
    UnsupportedFormat {
        /// Media type declared by the caller, when one was provided.
        declared: Option<String>,
    },
    /// Media type was recognized but the content could not be read.
    #[error("failed to extract {format} content: {detail}")]
    ExtractionFailure {
        /// Human-readable name of the format that failed to decode.
        format: &'static str,
        /// Underlying decoder diagnostic.
        detail: String,
    },
}

/// Document formats accepted for analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentFormat {
    /// UTF-8 plain text.
    PlainText,
    /// PDF document.
    Pdf,
    /// OOXML word-processing document.
    WordDocument,
}

const WORD_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

impl DocumentFormat {
    /// Resolve a declared media type against the closed dispatch table.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let normalized = media_type.trim().to_ascii_lowercase();
        if normalized.starts_with("text/plain") {
            Some(Self::PlainText)
        } else if normalized == "application/pdf" {
            Some(Self::Pdf)
        } else if normalized == WORD_MEDIA_TYPE {
            Some(Self::WordDocument)
        } else {
            None
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::PlainText => "plain text",
            Self::Pdf => "PDF",
            Self::WordDocument => "word document",
        }
    }
}

/// Extract plain text from raw document bytes using the declared media type.
pub fn extract_text(bytes: &[u8], declared: Option<&str>) -> Result<String, ExtractError> {
    let format = declared
        .and_then(DocumentFormat::from_media_type)
        .ok_or_else(|| ExtractError::UnsupportedFormat {
            declared: declared.map(str::to_string),
        })?;

    let text = match format {
        DocumentFormat::PlainText => decode_plain_text(bytes)?,
        DocumentFormat::Pdf => decode_pdf(bytes)?,
        DocumentFormat::WordDocument => decode_word_document(bytes)?,
    };

    tracing::debug!(
        format = format.label(),
        bytes = bytes.len(),
        chars = text.chars().count(),
        "Extracted document text"
    );
    Ok(text)
}

fn decode_plain_text(bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec()).map_err(|error| ExtractError::ExtractionFailure {
        format: DocumentFormat::PlainText.label(),
        detail: error.to_string(),
    })
}

fn decode_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|error| ExtractError::ExtractionFailure {
        format: DocumentFormat::Pdf.label(),
        detail: error.to_string(),
    })
}

/// Walk paragraph runs in document order; tables and drawings are skipped.
fn decode_word_document(bytes: &[u8]) -> Result<String, ExtractError> {
    let document = docx_rs::read_docx(bytes).map_err(|error| ExtractError::ExtractionFailure {
        format: DocumentFormat::WordDocument.label(),
        detail: error.to_string(),
    })?;

    let mut text = String::new();
    for child in document.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for child in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(fragment) = child {
                            text.push_str(&fragment.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }

    Ok(text)
}

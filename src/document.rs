use crate::error::{RagError, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use quick_xml::events::Event;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

const MIME_PDF: &str = "application/pdf";
const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Upper bound on the decompressed size of `word/document.xml`
const MAX_DOCX_XML_BYTES: u64 = 50 * 1024 * 1024;

/// Declared type of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    PlainText,
    WordDocument,
}

impl SourceKind {
    /// Map a MIME type onto a supported source kind
    pub fn from_mime(mime_type: &str) -> Result<Self> {
        match mime_type {
            mime if mime.starts_with(MIME_PDF) => Ok(SourceKind::Pdf),
            mime if mime.starts_with(MIME_DOCX) => Ok(SourceKind::WordDocument),
            mime if mime.starts_with("text/") => Ok(SourceKind::PlainText),
            _ => Err(RagError::UnsupportedFormat(format!(
                "{}. Only .txt, .pdf and .docx files are supported.",
                mime_type
            ))),
        }
    }

    /// Detect the source kind from a file name's extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mime = from_path(path.as_ref()).first_or_octet_stream();
        debug!("Detected MIME type: {}", mime);
        Self::from_mime(mime.as_ref())
    }
}

/// Represents a document with its content and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The extracted text content of the document
    pub content: String,
    /// File name or topic the document was loaded from
    pub document_id: String,
    /// SHA-256 of the loaded bytes, used to namespace cached embeddings
    pub fingerprint: String,
}

impl Document {
    /// Create a document from already extracted text
    pub fn new(document_id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let fingerprint = content_hash(&[content.as_bytes()]);
        Document {
            content,
            document_id: document_id.into(),
            fingerprint,
        }
    }

    /// Create a new document from a file path
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| RagError::Load(format!("Invalid file name: {}", path.display())))?
            .to_string();

        let kind = SourceKind::from_path(path)?;
        let bytes = fs::read(path)
            .map_err(|e| RagError::Load(format!("Failed to read {}: {}", path.display(), e)))?;

        Self::from_bytes(file_name, &bytes, kind)
    }

    /// Create a document from an uploaded byte stream of a declared type
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8], kind: SourceKind) -> Result<Self> {
        let name = name.into();
        let content = read_document_content(&name, bytes, kind)?;

        Ok(Document {
            content,
            document_id: name,
            fingerprint: content_hash(&[bytes]),
        })
    }
}

/// SHA-256 over the given parts, each length-prefixed so that part
/// boundaries are unambiguous, as lowercase hex
pub fn content_hash(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Extract text from a document based on its declared kind
pub fn read_document_content(name: &str, bytes: &[u8], kind: SourceKind) -> Result<String> {
    match kind {
        SourceKind::Pdf => {
            info!("Processing PDF document: {}", name);
            let content = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
                RagError::Load(format!("Failed to extract text from PDF {}: {}", name, e))
            })?;

            // PDF extraction can sometimes include excessive whitespace
            let cleaned_content = normalize_whitespace(&content);

            if cleaned_content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(cleaned_content)
        }

        SourceKind::PlainText => {
            info!("Processing text document: {}", name);
            String::from_utf8(bytes.to_vec())
                .map_err(|e| RagError::Load(format!("{} is not valid UTF-8: {}", name, e)))
        }

        SourceKind::WordDocument => {
            info!("Processing Word document: {}", name);
            extract_docx(bytes)
                .map_err(|e| RagError::Load(format!("Failed to extract text from {}: {}", name, e)))
        }
    }
}

/// Pull the text runs out of `word/document.xml`, one line per paragraph
fn extract_docx(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut xml = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())?
        .take(MAX_DOCX_XML_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 >= MAX_DOCX_XML_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut in_text = false;
    let mut out = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(text)) if in_text => {
                out.push_str(&text.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    normalized.trim().to_string()
}

use lopdf::{Document as LoDocument, Object as LoObject};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectErrorCode {
    PdfParseFailed,
    PdfEncrypted,
    PdfNoPages,
    PdfIoError,
}

impl InspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            InspectErrorCode::PdfEncrypted => "PDF_ENCRYPTED",
            InspectErrorCode::PdfNoPages => "PDF_NO_PAGES",
            InspectErrorCode::PdfIoError => "PDF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", code.as_str())]
pub struct InspectError {
    pub code: InspectErrorCode,
    pub message: String,
}

// What a generated artifact looks like once read back by an independent parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    pub title: Option<String>,
    pub producer: Option<String>,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<InspectReport, InspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| InspectError {
        code: InspectErrorCode::PdfParseFailed,
        message: err.to_string(),
    })?;

    Ok(InspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        title: info_string(&pdf, b"Title"),
        producer: info_string(&pdf, b"Producer"),
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<InspectReport, InspectError> {
    let data = std::fs::read(path).map_err(|err| InspectError {
        code: InspectErrorCode::PdfIoError,
        message: format!("{}: {err}", path.display()),
    })?;
    inspect_pdf_bytes(&data)
}

// A deliverable artifact must open without a password and have at least one page.
pub fn require_deliverable(report: &InspectReport) -> Result<(), InspectError> {
    if report.encrypted {
        return Err(InspectError {
            code: InspectErrorCode::PdfEncrypted,
            message: "encrypted documents cannot be delivered".to_string(),
        });
    }
    if report.page_count == 0 {
        return Err(InspectError {
            code: InspectErrorCode::PdfNoPages,
            message: "document has no pages".to_string(),
        });
    }
    Ok(())
}

fn info_string(pdf: &LoDocument, key: &[u8]) -> Option<String> {
    let info = match pdf.trailer.get(b"Info").ok()? {
        LoObject::Reference(id) => pdf.get_object(*id).ok()?,
        other => other,
    };
    let value = info.as_dict().ok()?.get(key).ok()?;
    match value {
        LoObject::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

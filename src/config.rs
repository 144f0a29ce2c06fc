use crate::composer::{CONTRACT_CLAUSES, ComposerSettings, DocumentComposer};
use crate::debug::DebugLogger;
use crate::error::DocumentError;
use crate::types::{Margins, PageSizeName, Pt, Size};
use crate::validate::FieldPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Header band reserved on the first page, below the top margin.
pub(crate) const HEADER_BAND: f32 = 64.0;
// Footer band reserved on every page, above the bottom margin.
pub(crate) const FOOTER_BAND: f32 = 28.0;

const MIN_CONTENT_WIDTH: f32 = 200.0;
const MIN_BODY_LINES: i32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SellerIdentity {
    pub organization: String,
    pub email: String,
    pub phone: String,
}

impl Default for SellerIdentity {
    fn default() -> Self {
        Self {
            organization: "Trading Inteligente".to_string(),
            email: "tradinginteligenteap@gmail.com".to_string(),
            phone: "+57 3506194991".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginsConfig {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for MarginsConfig {
    fn default() -> Self {
        Self {
            top: 36.0,
            right: 40.0,
            bottom: 36.0,
            left: 40.0,
        }
    }
}

impl From<MarginsConfig> for Margins {
    fn from(value: MarginsConfig) -> Self {
        Margins {
            top: Pt::from_f32(value.top),
            right: Pt::from_f32(value.right),
            bottom: Pt::from_f32(value.bottom),
            left: Pt::from_f32(value.left),
        }
    }
}

// File form of the composer settings. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    pub page_size: PageSizeName,
    pub margins: MarginsConfig,
    pub seller: SellerIdentity,
    pub body_font_size: f32,
    pub heading_font_size: f32,
    pub debug_log: Option<PathBuf>,
    pub field_policy: FieldPolicy,
    // Replaces the built-in contract clauses when set.
    pub clauses: Option<String>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            page_size: PageSizeName::A4,
            margins: MarginsConfig::default(),
            seller: SellerIdentity::default(),
            body_font_size: 10.0,
            heading_font_size: 12.0,
            debug_log: None,
            field_policy: FieldPolicy::checkout(),
            clauses: None,
        }
    }
}

impl ComposerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn into_builder(self) -> ComposerBuilder {
        let mut builder = ComposerBuilder::new()
            .page_size(self.page_size.size())
            .margins(self.margins.into())
            .seller(self.seller)
            .body_font_size(self.body_font_size)
            .heading_font_size(self.heading_font_size)
            .field_policy(self.field_policy);
        if let Some(path) = self.debug_log {
            builder = builder.debug_log(path);
        }
        if let Some(clauses) = self.clauses {
            builder = builder.clauses(clauses);
        }
        builder
    }
}

pub struct ComposerBuilder {
    page_size: Size,
    margins: Margins,
    seller: SellerIdentity,
    body_font_size: f32,
    heading_font_size: f32,
    debug_path: Option<PathBuf>,
    field_policy: FieldPolicy,
    clauses: String,
}

impl Default for ComposerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ComposerBuilder {
    pub fn new() -> Self {
        let defaults = ComposerConfig::default();
        Self {
            page_size: defaults.page_size.size(),
            margins: defaults.margins.into(),
            seller: defaults.seller,
            body_font_size: defaults.body_font_size,
            heading_font_size: defaults.heading_font_size,
            debug_path: None,
            field_policy: defaults.field_policy,
            clauses: CONTRACT_CLAUSES.to_string(),
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn seller(mut self, seller: SellerIdentity) -> Self {
        self.seller = seller;
        self
    }

    pub fn body_font_size(mut self, size: f32) -> Self {
        self.body_font_size = size;
        self
    }

    pub fn heading_font_size(mut self, size: f32) -> Self {
        self.heading_font_size = size;
        self
    }

    // Write JSONL layout and composition events to `path`.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn field_policy(mut self, policy: FieldPolicy) -> Self {
        self.field_policy = policy;
        self
    }

    pub fn clauses(mut self, text: impl Into<String>) -> Self {
        self.clauses = text.into();
        self
    }

    pub fn build(self) -> Result<DocumentComposer, DocumentError> {
        if self.clauses.trim().is_empty() {
            return Err(DocumentError::InvalidConfiguration(
                "contract clauses must not be empty".to_string(),
            ));
        }
        for (name, size) in [
            ("body_font_size", self.body_font_size),
            ("heading_font_size", self.heading_font_size),
        ] {
            if !size.is_finite() || size <= 0.0 || size > 72.0 {
                return Err(DocumentError::InvalidConfiguration(format!(
                    "{name} must be within (0, 72], got {size}"
                )));
            }
        }
        let m = self.margins;
        if [m.top, m.right, m.bottom, m.left]
            .iter()
            .any(|v| *v < Pt::ZERO)
        {
            return Err(DocumentError::InvalidConfiguration(
                "margins must not be negative".to_string(),
            ));
        }

        let content_width = self.page_size.width - m.left - m.right;
        if content_width < Pt::from_f32(MIN_CONTENT_WIDTH) {
            return Err(DocumentError::InvalidConfiguration(format!(
                "content width {}pt is below {MIN_CONTENT_WIDTH}pt",
                content_width.to_f32()
            )));
        }
        // The first page is the shortest frame: it also carries the header band.
        let content_height = self.page_size.height
            - m.top
            - m.bottom
            - Pt::from_f32(HEADER_BAND)
            - Pt::from_f32(FOOTER_BAND);
        let line = Pt::from_f32(self.body_font_size.max(self.heading_font_size)).mul_ratio(6, 5);
        if content_height < line * MIN_BODY_LINES {
            return Err(DocumentError::InvalidConfiguration(format!(
                "content height {}pt fits fewer than {MIN_BODY_LINES} lines",
                content_height.to_f32()
            )));
        }

        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        Ok(DocumentComposer::from_settings(
            ComposerSettings {
                page_size: self.page_size,
                margins: self.margins,
                seller: self.seller,
                body_font_size: self.body_font_size,
                heading_font_size: self.heading_font_size,
                field_policy: self.field_policy,
                clauses: self.clauses,
            },
            debug,
        ))
    }
}

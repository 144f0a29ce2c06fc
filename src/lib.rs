mod assets;
mod block;
mod canvas;
mod checkout;
mod composer;
mod config;
mod debug;
mod doc_context;
mod doc_template;
mod error;
mod frame;
mod metrics;
mod page_template;
mod pdf;
mod pdfinspect;
mod records;
mod testimonials;
mod text;
mod types;
mod validate;

pub use assets::{
    AssetBundle, ImageAsset, ImageFilter, decode_image_bytes, decode_image_source, parse_data_uri,
};
pub use block::{Block, BreakBefore, BreakInside, Pagination};
pub use canvas::{Canvas, Command, Document, Page, TextRun};
pub use checkout::{
    Checkout, CheckoutOutcome, Clipboard, ContractDownload, Notice, NoticeLevel, PAYPAL_URL,
    copy_payment_reference, join_waitlist,
};
pub use composer::{
    Artifact, ArtifactKind, CONTRACT_CLAUSES, CONTRACT_TITLE, ComposerSettings, DocumentComposer,
    INVOICE_TITLE, InvoiceTotals, SIGNATURE_CAPTION, artifact_filename,
};
pub use config::{ComposerBuilder, ComposerConfig, MarginsConfig, SellerIdentity};
pub use doc_context::DocContext;
pub use doc_template::DocTemplate;
pub use error::{DocumentError, ValidationError};
pub use frame::{AddResult, Frame};
pub use metrics::{DocumentMetrics, PageMetrics};
pub use page_template::{OnPageCallback, PageTemplate};
pub use pdf::{PdfOptions, document_to_pdf, document_to_pdf_with_metrics};
pub use pdfinspect::{
    InspectError, InspectErrorCode, InspectReport, inspect_pdf_bytes, inspect_pdf_path,
    require_deliverable,
};
pub use records::{
    BANK_KEY, BuyerRecord, DEFAULT_PRICE, DEFAULT_PRODUCT, NOT_PROVIDED, NOT_PROVIDED_FEM,
    PAYPAL_HANDLE, PaymentMethod, PaymentRecord, ProductRecord, SignatureRaster, format_date,
};
pub use testimonials::{
    InMemoryPersistence, JsonFilePersistence, MAX_TESTIMONIALS, STORAGE_KEY, Slide, THANKS_MESSAGE,
    TestimonialEntry, TestimonialPersistence, TestimonialStore, seed_testimonials,
};
pub use text::{FontWeight, TextStyle, wrap_lines};
pub use types::{Color, Margins, PageSizeName, Pt, Rect, Size};
pub use validate::{CheckoutForm, FieldPolicy, validate_email};

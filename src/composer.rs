use crate::assets::AssetBundle;
use crate::block::Block;
use crate::canvas::{Canvas, Document};
use crate::config::{ComposerBuilder, FOOTER_BAND, HEADER_BAND, SellerIdentity};
use crate::debug::DebugLogger;
use crate::doc_context::DocContext;
use crate::doc_template::DocTemplate;
use crate::error::{DocumentError, ValidationError};
use crate::metrics::DocumentMetrics;
use crate::page_template::PageTemplate;
use crate::pdf::{PdfOptions, document_to_pdf_with_metrics};
use crate::records::{BuyerRecord, PaymentRecord, ProductRecord};
use crate::text::TextStyle;
use crate::types::{Color, Margins, Pt, Size};
use crate::validate::FieldPolicy;
use rand::Rng;
use regex::Regex;
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

pub const CONTRACT_TITLE: &str = "CONTRATO DE LICENCIA DE SOFTWARE";
pub const INVOICE_TITLE: &str = "FACTURA DE VENTA";
pub const SIGNATURE_CAPTION: &str = "Firma del Comprador";

// Clause text of the license contract. `N. TITLE` lines become headings,
// `- ` lines become bullets, blank lines become spacing.
pub const CONTRACT_CLAUSES: &str = "\
1. OBJETO DEL CONTRATO
El vendedor otorga al comprador una licencia de uso personal, no exclusiva e intransferible del software indicado en este documento.
- El vendedor transfiere al comprador los derechos de uso del software indicado.
- El vendedor no garantiza resultados financieros específicos.
- El comprador entiende que el software puede permanecer inactivo en periodos de riesgo elevado.
- Se aplican los términos y condiciones publicados en el sitio.

2. PROHIBICIÓN DE INGENIERÍA INVERSA
El comprador no podrá descompilar, desensamblar, modificar ni intentar obtener el código fuente del software, ni crear obras derivadas a partir de él.

3. CONFIDENCIALIDAD
La configuración, las estrategias y la documentación entregadas con el software son información confidencial del vendedor y no podrán divulgarse, revenderse ni compartirse con terceros.

4. EXENCIÓN DE GARANTÍAS
El software se entrega en el estado en que se encuentra. El trading conlleva riesgo de pérdida de capital y los resultados pasados no garantizan resultados futuros. El vendedor no será responsable por pérdidas derivadas del uso del software.

5. TERMINACIÓN
El incumplimiento de cualquiera de estas cláusulas dará lugar a la terminación inmediata de la licencia, sin derecho a reembolso.

6. LEY APLICABLE
Este contrato se rige por las leyes de la República de Colombia. Cualquier controversia se someterá a los jueces competentes de dicho país.

7. ACEPTACIÓN
Al aceptar este contrato y realizar el pago, el comprador declara haber leído y aceptado todas las cláusulas anteriores.";

const SIGNATURE_RESOURCE: &str = "firma";
const SIGNATURE_WIDTH: f32 = 170.0;
const BULLET_INDENT: f32 = 18.0;
const KEY_WIDTH: f32 = 110.0;
const AMOUNT_WIDTH: f32 = 120.0;

static CLAUSE_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s").expect("Invalid regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));
static UNSAFE_FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/\\:\x00-\x1F]|\.{2,}").expect("Invalid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Contract,
    Invoice,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Contract => "Contrato",
            ArtifactKind::Invoice => "Factura",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ArtifactKind::Contract => CONTRACT_TITLE,
            ArtifactKind::Invoice => INVOICE_TITLE,
        }
    }
}

// A generated PDF ready to hand to the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub invoice_number: Option<u32>,
}

impl Artifact {
    // Writes into `dir` only; a filename that is not a single plain path
    // component is refused.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, DocumentError> {
        let mut components = Path::new(&self.filename).components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single {
            return Err(DocumentError::Storage(format!(
                "artifact filename {:?} is not a plain file name",
                self.filename
            )));
        }
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

// `{Contrato|Factura}_{product}_{buyer}.pdf` with whitespace runs in the
// buyer name collapsed to `_`. Anything that could step outside the output
// directory becomes `_` as well.
pub fn artifact_filename(kind: ArtifactKind, product_name: &str, buyer_name: &str) -> String {
    let buyer = WHITESPACE_RE.replace_all(buyer_name, "_");
    format!(
        "{}_{}_{}.pdf",
        kind.label(),
        UNSAFE_FILENAME_RE.replace_all(product_name, "_"),
        UNSAFE_FILENAME_RE.replace_all(&buyer, "_")
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

impl InvoiceTotals {
    // Tax is always zero, so subtotal and total are the price itself.
    pub fn from_price(price: &str) -> Self {
        Self {
            subtotal: price.to_string(),
            tax: "0".to_string(),
            total: price.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposerSettings {
    pub page_size: Size,
    pub margins: Margins,
    pub seller: SellerIdentity,
    pub body_font_size: f32,
    pub heading_font_size: f32,
    pub field_policy: FieldPolicy,
    pub clauses: String,
}

pub(crate) struct Composition {
    pub document: Document,
    pub metrics: DocumentMetrics,
    pub assets: AssetBundle,
}

#[derive(Clone)]
pub struct DocumentComposer {
    settings: ComposerSettings,
    debug: Option<DebugLogger>,
}

impl DocumentComposer {
    pub fn builder() -> ComposerBuilder {
        ComposerBuilder::new()
    }

    pub(crate) fn from_settings(settings: ComposerSettings, debug: Option<DebugLogger>) -> Self {
        Self { settings, debug }
    }

    pub fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    pub fn compose_contract(
        &self,
        buyer: &BuyerRecord,
        product: &ProductRecord,
    ) -> Result<Artifact, DocumentError> {
        let composition = self.contract_composition(buyer, product)?;
        self.render(ArtifactKind::Contract, composition, buyer, product, None)
    }

    // Invoice with a random cosmetic number in 100000..=999999.
    pub fn compose_invoice(
        &self,
        buyer: &BuyerRecord,
        product: &ProductRecord,
        payment: &PaymentRecord,
    ) -> Result<Artifact, DocumentError> {
        let number = rand::rng().random_range(100_000..=999_999);
        self.compose_invoice_numbered(buyer, product, payment, number)
    }

    pub fn compose_invoice_numbered(
        &self,
        buyer: &BuyerRecord,
        product: &ProductRecord,
        payment: &PaymentRecord,
        number: u32,
    ) -> Result<Artifact, DocumentError> {
        let composition = self.invoice_composition(buyer, product, payment, number)?;
        self.render(ArtifactKind::Invoice, composition, buyer, product, Some(number))
    }

    pub(crate) fn contract_composition(
        &self,
        buyer: &BuyerRecord,
        product: &ProductRecord,
    ) -> Result<Composition, DocumentError> {
        require_buyer(buyer)?;
        self.log_event("compose.start", json!({ "kind": "contract" }));
        let seller = &self.settings.seller;
        let mut blocks = Vec::new();

        blocks.push(Block::heading("Datos del Vendedor:", self.label_style()));
        blocks.push(Block::paragraph(seller.organization.clone(), self.body_style()));
        blocks.push(self.field("Email:", &seller.email));
        blocks.push(self.field("Teléfono:", &seller.phone));

        blocks.push(Block::heading("Datos del Comprador:", self.label_style()));
        blocks.push(self.field("Nombre:", buyer.display_name()));
        blocks.push(self.field("Identificación:", buyer.display_identification()));
        blocks.push(self.field("Email:", buyer.display_email()));
        blocks.push(self.field("Teléfono:", buyer.display_phone()));
        blocks.push(self.field("Dirección:", buyer.display_address()));
        blocks.push(self.field("Ciudad:", buyer.display_city()));
        blocks.push(self.field("Fecha:", &buyer.formatted_date()));

        blocks.push(Block::heading("Producto:", self.label_style()));
        blocks.push(self.field("Software:", &product.name));
        blocks.push(self.field("Precio:", &product.price_label()));
        if let Some(description) = product.description.as_deref() {
            blocks.push(self.field("Descripción:", description));
        }
        blocks.push(Block::rule(gray(200)));

        blocks.extend(clause_blocks(
            &self.settings.clauses,
            &self.body_style(),
            &self.heading_style(),
        ));

        let mut assets = AssetBundle::default();
        blocks.extend(self.signature_blocks(buyer, &mut assets));

        self.layout(ArtifactKind::Contract, blocks, assets)
    }

    pub(crate) fn invoice_composition(
        &self,
        buyer: &BuyerRecord,
        product: &ProductRecord,
        payment: &PaymentRecord,
        number: u32,
    ) -> Result<Composition, DocumentError> {
        require_buyer(buyer)?;
        if payment.reference.trim().is_empty() {
            return Err(ValidationError::MissingPaymentReference.into());
        }
        self.log_event("compose.start", json!({ "kind": "invoice", "number": number }));
        let seller = &self.settings.seller;
        let totals = InvoiceTotals::from_price(&product.price);
        let amount_width = Pt::from_f32(AMOUNT_WIDTH);
        let mut blocks = Vec::new();

        blocks.push(self.field("Factura No:", &number.to_string()));
        blocks.push(self.field("Fecha:", &buyer.formatted_date()));

        blocks.push(Block::heading("Vendedor:", self.label_style()));
        blocks.push(Block::paragraph(seller.organization.clone(), self.body_style()));
        blocks.push(self.field("Email:", &seller.email));
        blocks.push(self.field("Teléfono:", &seller.phone));

        blocks.push(Block::heading("Comprador:", self.label_style()));
        blocks.push(self.field("Nombre:", buyer.display_name()));
        blocks.push(self.field("Identificación:", buyer.display_identification()));
        blocks.push(self.field("Email:", buyer.display_email()));
        blocks.push(self.field("Teléfono:", buyer.display_phone()));
        blocks.push(self.field("Dirección:", buyer.display_address()));
        blocks.push(self.field("Ciudad:", buyer.display_city()));

        blocks.push(Block::rule(gray(200)));
        blocks.push(Block::line_item(
            "Descripción",
            "Valor",
            self.body_style().bold().with_color(gray(100)),
            amount_width,
        ));
        let description = match product.description.as_deref() {
            Some(text) => format!("{} - {}", product.name, text),
            None => product.name.clone(),
        };
        blocks.push(Block::line_item(
            description,
            product.price_label(),
            self.body_style(),
            amount_width,
        ));
        blocks.push(Block::rule(gray(200)));
        blocks.push(Block::line_item(
            "Subtotal:",
            usd(&totals.subtotal),
            self.body_style(),
            amount_width,
        ));
        blocks.push(Block::line_item(
            "Impuestos (0%):",
            usd(&totals.tax),
            self.body_style(),
            amount_width,
        ));
        blocks.push(Block::line_item(
            "Total:",
            usd(&totals.total),
            self.body_style().bold(),
            amount_width,
        ));

        blocks.push(Block::heading("Información de pago:", self.label_style()));
        blocks.push(self.field("Método de pago:", payment.method.label()));
        blocks.push(self.field("Referencia:", &payment.reference));
        blocks.push(self.field("Fecha de pago:", &payment.formatted_date()));

        self.layout(ArtifactKind::Invoice, blocks, AssetBundle::default())
    }

    // A raster that fails to decode drops the whole signature block.
    fn signature_blocks(&self, buyer: &BuyerRecord, assets: &mut AssetBundle) -> Vec<Block> {
        let Some(raster) = buyer.signature.as_ref() else {
            return Vec::new();
        };
        match raster.decode() {
            Ok(image) => {
                let width = Pt::from_f32(SIGNATURE_WIDTH);
                let height = width * (1.0 / image.aspect_ratio());
                assets.add_image(SIGNATURE_RESOURCE, image);
                vec![
                    Block::Spacer(Pt::from_f32(12.0)),
                    Block::image(SIGNATURE_RESOURCE, width, height)
                        .with_caption(SIGNATURE_CAPTION, self.body_style()),
                ]
            }
            Err(err) => {
                tracing::warn!(error = %err, "signature could not be embedded; omitting it");
                self.log_event(
                    "compose.signature_skipped",
                    json!({ "error": err.to_string() }),
                );
                Vec::new()
            }
        }
    }

    fn layout(
        &self,
        kind: ArtifactKind,
        blocks: Vec<Block>,
        assets: AssetBundle,
    ) -> Result<Composition, DocumentError> {
        let mut doc = DocTemplate::new(self.page_templates(kind.title()));
        if let Some(debug) = self.debug.as_ref() {
            doc = doc.with_debug(debug.clone(), kind.label());
        }
        doc.extend(blocks);
        let (document, metrics) = doc.build_with_metrics()?;
        Ok(Composition {
            document,
            metrics,
            assets,
        })
    }

    fn render(
        &self,
        kind: ArtifactKind,
        composition: Composition,
        buyer: &BuyerRecord,
        product: &ProductRecord,
        invoice_number: Option<u32>,
    ) -> Result<Artifact, DocumentError> {
        let Composition {
            document,
            mut metrics,
            assets,
        } = composition;
        let options = PdfOptions {
            title: Some(kind.title().to_string()),
            author: Some(self.settings.seller.organization.clone()),
            subject: Some(product.name.clone()),
        };
        let bytes = document_to_pdf_with_metrics(&document, &assets, &options, &mut metrics)?;
        tracing::debug!(
            kind = kind.label(),
            pages = document.page_count(),
            page_breaks = metrics.page_breaks,
            blocks = metrics.block_count(),
            bytes = bytes.len(),
            "document composed"
        );
        self.log_event(
            "compose.finish",
            json!({
                "kind": kind.label(),
                "pages": document.page_count(),
                "bytes": bytes.len(),
                "render_ms": metrics.total_render_ms,
            }),
        );
        if let Some(debug) = self.debug.as_ref() {
            debug.emit_summary(kind.label());
            debug.flush();
        }
        Ok(Artifact {
            kind,
            filename: artifact_filename(kind, &product.name, &buyer.name),
            bytes,
            page_count: document.page_count(),
            invoice_number,
        })
    }

    fn page_templates(&self, title: &str) -> Vec<PageTemplate> {
        let s = &self.settings;
        let decor = PageDecor {
            page_size: s.page_size,
            margins: s.margins,
            organization: s.seller.organization.clone(),
            title: title.to_string(),
        };
        let first_decor = decor.clone();
        let first = PageTemplate::with_margins(
            "first",
            s.page_size,
            s.margins,
            Pt::from_f32(HEADER_BAND),
            Pt::from_f32(FOOTER_BAND),
        )
        .set_on_page(move |canvas, ctx| {
            first_decor.draw_header(canvas);
            first_decor.draw_footer(canvas, ctx);
        });
        let rest = PageTemplate::with_margins(
            "rest",
            s.page_size,
            s.margins,
            Pt::ZERO,
            Pt::from_f32(FOOTER_BAND),
        )
        .set_on_page(move |canvas, ctx| decor.draw_footer(canvas, ctx));
        vec![first, rest]
    }

    fn field(&self, key: &str, value: &str) -> Block {
        Block::key_value(
            key,
            value,
            self.body_style().bold(),
            self.body_style(),
            Pt::from_f32(KEY_WIDTH),
        )
    }

    fn body_style(&self) -> TextStyle {
        TextStyle::sized(self.settings.body_font_size)
    }

    fn heading_style(&self) -> TextStyle {
        TextStyle::sized(self.settings.heading_font_size).bold()
    }

    fn label_style(&self) -> TextStyle {
        self.heading_style().with_color(gray(100))
    }

    fn log_event(&self, event_type: &str, fields: serde_json::Value) {
        if let Some(debug) = self.debug.as_ref() {
            debug.log_event(event_type, fields);
            debug.increment(event_type, 1);
        }
    }
}

fn require_buyer(buyer: &BuyerRecord) -> Result<(), ValidationError> {
    if buyer.has_name() {
        Ok(())
    } else {
        Err(ValidationError::MissingField("name"))
    }
}

pub(crate) fn clause_blocks(text: &str, body: &TextStyle, heading: &TextStyle) -> Vec<Block> {
    let mut blocks = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            blocks.push(Block::Spacer(body.line_height().mul_ratio(1, 2)));
        } else if CLAUSE_HEADING_RE.is_match(line) {
            blocks.push(Block::heading(line, heading.clone()));
        } else if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("• ")) {
            blocks.push(Block::bullet(
                item.trim(),
                body.clone(),
                Pt::from_f32(BULLET_INDENT),
            ));
        } else {
            blocks.push(Block::paragraph(line, body.clone()));
        }
    }
    blocks
}

fn usd(amount: &str) -> String {
    format!("${amount} USD")
}

fn gray(level: u8) -> Color {
    Color::rgb8(level, level, level)
}

#[derive(Clone)]
struct PageDecor {
    page_size: Size,
    margins: Margins,
    organization: String,
    title: String,
}

impl PageDecor {
    fn draw_header(&self, canvas: &mut Canvas) {
        let org_style = TextStyle::sized(18.0)
            .bold()
            .with_color(Color::rgb8(255, 215, 0));
        let title_style = TextStyle::sized(13.0)
            .bold()
            .with_color(Color::rgb8(255, 255, 255));
        let band_bottom = self.margins.top + Pt::from_f32(HEADER_BAND) - Pt::from_f32(10.0);

        canvas.save_state();
        canvas.set_fill_color(Color::rgb8(5, 5, 5));
        canvas.draw_rect(Pt::ZERO, Pt::ZERO, self.page_size.width, band_bottom);
        let org_y = self.margins.top;
        self.centered(canvas, &self.organization.to_uppercase(), &org_style, org_y);
        let title_y = org_y + org_style.line_height() + Pt::from_f32(4.0);
        self.centered(canvas, &self.title, &title_style, title_y);
        canvas.restore_state();
    }

    fn draw_footer(&self, canvas: &mut Canvas, ctx: &DocContext) {
        let style = TextStyle::sized(8.0).with_color(gray(150));
        let y = self.page_size.height - self.margins.bottom - style.line_height() - Pt::from_f32(4.0);

        canvas.save_state();
        let note = format!("Documento generado automáticamente por {}", self.organization);
        self.centered(canvas, &note, &style, y);
        let page = format!("Página {}", ctx.page_number);
        let x = self.page_size.width - self.margins.right - style.measure(&page);
        draw_text(canvas, &page, &style, x, y);
        canvas.restore_state();
    }

    fn centered(&self, canvas: &mut Canvas, text: &str, style: &TextStyle, y: Pt) {
        let x = ((self.page_size.width - style.measure(text)) / 2).max(Pt::ZERO);
        draw_text(canvas, text, style, x, y);
    }
}

fn draw_text(canvas: &mut Canvas, text: &str, style: &TextStyle, x: Pt, y: Pt) {
    canvas.set_font_name(style.font_name());
    canvas.set_font_size(style.font_size);
    canvas.set_fill_color(style.color);
    canvas.draw_string(x, y, text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::png_data_uri;
    use crate::canvas::{Command, TextRun};
    use crate::pdfinspect::inspect_pdf_bytes;
    use crate::records::{NOT_PROVIDED, NOT_PROVIDED_FEM, PaymentMethod, SignatureRaster};
    use chrono::NaiveDate;

    fn composer() -> DocumentComposer {
        DocumentComposer::builder().build().expect("composer")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 3).expect("date")
    }

    fn bare_buyer() -> BuyerRecord {
        BuyerRecord::new("Ana Ruiz", date())
    }

    fn full_buyer() -> BuyerRecord {
        BuyerRecord {
            email: Some("ana@correo.co".to_string()),
            phone: Some("+57 300 123 4567".to_string()),
            identification: Some("1020304050".to_string()),
            address: Some("Calle 10 # 20-30".to_string()),
            city: Some("Medellín".to_string()),
            ..bare_buyer()
        }
    }

    fn product() -> ProductRecord {
        ProductRecord::from_offer(None, None)
    }

    fn runs(document: &Document) -> Vec<(usize, TextRun)> {
        document.text_runs().collect()
    }

    // Number of key/value lines whose key is `key` and whose value is `value`.
    fn field_lines(document: &Document, key: &str, value: &str) -> usize {
        let runs = runs(document);
        runs.iter()
            .filter(|(page, run)| {
                run.text == key
                    && runs
                        .iter()
                        .any(|(p, other)| p == page && other.y == run.y && other.x > run.x && other.text == value)
            })
            .count()
    }

    #[test]
    fn filename_collapses_whitespace() {
        assert_eq!(
            artifact_filename(ArtifactKind::Contract, "LeidyBot1", "Ana Ruiz"),
            "Contrato_LeidyBot1_Ana_Ruiz.pdf"
        );
        assert_eq!(
            artifact_filename(ArtifactKind::Invoice, "LeidyBot1", "Ana \t  María  Ruiz"),
            "Factura_LeidyBot1_Ana_María_Ruiz.pdf"
        );
    }

    #[test]
    fn invoice_totals_are_the_price() {
        let totals = InvoiceTotals::from_price("260");
        assert_eq!(totals.subtotal, "260");
        assert_eq!(totals.tax, "0");
        assert_eq!(totals.total, "260");
    }

    #[test]
    fn contract_requires_a_name() {
        let buyer = BuyerRecord::new("  ", date());
        let err = composer().compose_contract(&buyer, &product()).expect_err("no name");
        assert!(matches!(
            err,
            DocumentError::Validation(ValidationError::MissingField("name"))
        ));
    }

    #[test]
    fn empty_optional_fields_render_placeholders_once() {
        let composition = composer()
            .contract_composition(&bare_buyer(), &product())
            .expect("compose");
        let doc = &composition.document;
        assert_eq!(field_lines(doc, "Nombre:", "Ana Ruiz"), 1);
        assert_eq!(field_lines(doc, "Identificación:", NOT_PROVIDED_FEM), 1);
        assert_eq!(field_lines(doc, "Email:", NOT_PROVIDED), 1);
        assert_eq!(field_lines(doc, "Teléfono:", NOT_PROVIDED), 1);
        assert_eq!(field_lines(doc, "Dirección:", NOT_PROVIDED_FEM), 1);
        assert_eq!(field_lines(doc, "Ciudad:", NOT_PROVIDED_FEM), 1);
        assert_eq!(field_lines(doc, "Fecha:", "03/02/2025"), 1);
        // Seller identity is static and never a placeholder.
        assert_eq!(field_lines(doc, "Email:", "tradinginteligenteap@gmail.com"), 1);
    }

    #[test]
    fn provided_fields_replace_placeholders() {
        let composition = composer()
            .contract_composition(&full_buyer(), &product())
            .expect("compose");
        let doc = &composition.document;
        assert_eq!(field_lines(doc, "Ciudad:", "Medellín"), 1);
        assert!(runs(doc).iter().all(|(_, run)| run.text != NOT_PROVIDED_FEM));
    }

    #[test]
    fn clauses_are_classified() {
        let body = TextStyle::sized(10.0);
        let heading = TextStyle::sized(12.0).bold();
        let blocks = clause_blocks(
            "1. OBJETO\nTexto libre.\n- primero\n• segundo\n\n12. FINAL",
            &body,
            &heading,
        );
        let names: Vec<&str> = blocks.iter().map(Block::debug_name).collect();
        assert_eq!(
            names,
            vec!["heading", "paragraph", "bullet", "bullet", "spacer", "heading"]
        );
        match &blocks[3] {
            Block::Bullet { text, .. } => assert_eq!(text, "segundo"),
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn contract_layout_has_header_footer_and_clauses() {
        let composition = composer()
            .contract_composition(&full_buyer(), &product())
            .expect("compose");
        let doc = &composition.document;
        assert!(doc.pages[0].contains_text("TRADING INTELIGENTE"));
        assert!(doc.pages[0].contains_text(CONTRACT_TITLE));
        assert!(doc.pages[0].contains_text("1. OBJETO DEL CONTRATO"));
        for (idx, page) in doc.pages.iter().enumerate() {
            assert!(page.contains_text(&format!("Página {}", idx + 1)));
            assert!(page.contains_text("Documento generado automáticamente por Trading Inteligente"));
        }
        let headings = runs(doc)
            .into_iter()
            .filter(|(_, run)| CLAUSE_HEADING_RE.is_match(&run.text))
            .collect::<Vec<_>>();
        assert_eq!(headings.len(), 7);
        assert!(headings.iter().all(|(_, run)| run.font_name == "Helvetica-Bold"));
    }

    #[test]
    fn long_clause_list_paginates_within_printable_height() {
        let long = vec![CONTRACT_CLAUSES; 5].join("\n\n");
        let composer = DocumentComposer::builder()
            .clauses(long)
            .build()
            .expect("composer");
        let composition = composer
            .contract_composition(&full_buyer(), &product())
            .expect("compose");
        let doc = &composition.document;
        assert!(doc.page_count() > 1);
        assert_eq!(composition.metrics.page_breaks, doc.page_count() - 1);
        assert_within_printable_height(&composer, doc);
        // Header band only on the first page.
        assert!(!doc.pages[1].contains_text("TRADING INTELIGENTE"));

        let artifact = composer
            .compose_contract(&full_buyer(), &product())
            .expect("artifact");
        let report = inspect_pdf_bytes(&artifact.bytes).expect("inspect");
        assert_eq!(report.page_count, artifact.page_count);
        assert_eq!(report.title.as_deref(), Some(CONTRACT_TITLE));
    }

    #[test]
    fn signature_is_embedded_with_caption() {
        let mut buyer = full_buyer();
        buyer.signature = Some(SignatureRaster::DataUrl(png_data_uri(40, 20)));
        let composition = composer()
            .contract_composition(&buyer, &product())
            .expect("compose");
        let images: Vec<&Command> = composition
            .document
            .pages
            .iter()
            .flat_map(|page| page.commands.iter())
            .filter(|cmd| matches!(cmd, Command::DrawImage { .. }))
            .collect();
        assert_eq!(images.len(), 1);
        match images[0] {
            Command::DrawImage { width, height, .. } => {
                assert_eq!(*width, Pt::from_f32(SIGNATURE_WIDTH));
                assert_eq!(*height, Pt::from_f32(SIGNATURE_WIDTH) * 0.5);
            }
            _ => unreachable!(),
        }
        assert!(composition.assets.image(SIGNATURE_RESOURCE).is_some());
        assert!(runs(&composition.document)
            .iter()
            .any(|(_, run)| run.text == SIGNATURE_CAPTION));

        let artifact = composer().compose_contract(&buyer, &product()).expect("artifact");
        assert!(String::from_utf8_lossy(&artifact.bytes).contains("/Im1 Do"));
    }

    #[test]
    fn corrupt_signature_matches_unsigned_output() {
        let unsigned = composer()
            .compose_contract(&full_buyer(), &product())
            .expect("unsigned");

        let mut buyer = full_buyer();
        buyer.signature = Some(SignatureRaster::DataUrl(
            "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAAB".to_string(),
        ));
        let corrupt = composer().compose_contract(&buyer, &product()).expect("corrupt");
        assert_eq!(corrupt.bytes, unsigned.bytes);
        assert_eq!(corrupt.filename, unsigned.filename);

        buyer.signature = Some(SignatureRaster::Png(b"not a png".to_vec()));
        let garbage = composer().compose_contract(&buyer, &product()).expect("garbage");
        assert_eq!(garbage.bytes, unsigned.bytes);
    }

    #[test]
    fn contract_output_is_deterministic() {
        let a = composer().compose_contract(&full_buyer(), &product()).expect("a");
        let b = composer().compose_contract(&full_buyer(), &product()).expect("b");
        assert_eq!(a, b);
        assert_eq!(a.kind, ArtifactKind::Contract);
        assert_eq!(a.invoice_number, None);
        assert_eq!(a.filename, "Contrato_LeidyBot1_Ana_Ruiz.pdf");
    }

    #[test]
    fn invoice_shows_totals_and_payment() {
        let payment = PaymentRecord::new(PaymentMethod::BankTransfer, date());
        let composition = composer()
            .invoice_composition(&bare_buyer(), &product(), &payment, 123_456)
            .expect("compose");
        let doc = &composition.document;
        assert!(doc.pages[0].contains_text(INVOICE_TITLE));
        assert_eq!(field_lines(doc, "Factura No:", "123456"), 1);
        assert_eq!(field_lines(doc, "Método de pago:", "Transferencia Bancaria"), 1);
        assert_eq!(field_lines(doc, "Referencia:", "@WAV687"), 1);
        assert_eq!(field_lines(doc, "Identificación:", NOT_PROVIDED_FEM), 1);
        for (label, amount) in [
            ("Subtotal:", "$260 USD"),
            ("Impuestos (0%):", "$0 USD"),
            ("Total:", "$260 USD"),
        ] {
            assert_eq!(field_lines(doc, label, amount), 1, "{label}");
        }
    }

    #[test]
    fn invoice_number_is_six_digits() {
        let payment = PaymentRecord::new(PaymentMethod::PayPal, date());
        for _ in 0..20 {
            let artifact = composer()
                .compose_invoice(&bare_buyer(), &product(), &payment)
                .expect("invoice");
            let number = artifact.invoice_number.expect("number");
            assert!((100_000..=999_999).contains(&number));
            assert_eq!(artifact.filename, "Factura_LeidyBot1_Ana_Ruiz.pdf");
        }
    }

    #[test]
    fn numbered_invoice_is_reproducible() {
        let payment = PaymentRecord::new(PaymentMethod::PayPal, date());
        let a = composer()
            .compose_invoice_numbered(&bare_buyer(), &product(), &payment, 500_000)
            .expect("a");
        let b = composer()
            .compose_invoice_numbered(&bare_buyer(), &product(), &payment, 500_000)
            .expect("b");
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.invoice_number, Some(500_000));
        assert_eq!(inspect_pdf_bytes(&a.bytes).expect("inspect").page_count, 1);
    }

    #[test]
    fn invoice_requires_payment_reference() {
        let mut payment = PaymentRecord::new(PaymentMethod::PayPal, date());
        payment.reference = "  ".to_string();
        let err = composer()
            .compose_invoice(&bare_buyer(), &product(), &payment)
            .expect_err("no reference");
        assert!(matches!(
            err,
            DocumentError::Validation(ValidationError::MissingPaymentReference)
        ));
    }

    #[test]
    fn debug_log_records_composition_and_skipped_signature() {
        let path = std::env::temp_dir().join(format!(
            "trading_docs_composer_{}_{}.jsonl",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        let composer = DocumentComposer::builder()
            .debug_log(&path)
            .build()
            .expect("composer");
        let mut buyer = full_buyer();
        buyer.signature = Some(SignatureRaster::Png(vec![1, 2, 3]));
        composer.compose_contract(&buyer, &product()).expect("contract");
        let log = std::fs::read_to_string(&path).expect("log");
        assert!(log.contains("\"compose.start\""));
        assert!(log.contains("\"compose.signature_skipped\""));
        let summary: serde_json::Value = log
            .lines()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .find(|event| event["type"] == "debug.summary")
            .expect("summary");
        assert_eq!(summary["context"], "Contrato");
        assert_eq!(summary["counts"]["compose.start"], 1);
        assert_eq!(summary["counts"]["compose.finish"], 1);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn filename_cannot_escape_the_output_dir() {
        assert_eq!(
            artifact_filename(ArtifactKind::Contract, "../x", "Ana Ruiz"),
            "Contrato___x_Ana_Ruiz.pdf"
        );
        assert_eq!(
            artifact_filename(ArtifactKind::Invoice, "LeidyBot1", "Ana/Ruiz"),
            "Factura_LeidyBot1_Ana_Ruiz.pdf"
        );
        assert_eq!(
            artifact_filename(ArtifactKind::Invoice, "Bot\\1", "..\\Ana"),
            "Factura_Bot_1___Ana.pdf"
        );
    }

    #[test]
    fn odd_names_are_written_inside_the_output_dir() {
        let dir = std::env::temp_dir().join(format!("trading_docs_odd_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let product = ProductRecord::new("../x", "260");
        let buyer = BuyerRecord::new("Ana/Ruiz", date());
        let artifact = composer()
            .compose_contract(&buyer, &product)
            .expect("artifact");
        let path = artifact.write_to_dir(&dir).expect("write");
        assert_eq!(path.parent(), Some(dir.as_path()));
        assert!(path.is_file());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn write_refuses_filenames_with_directories() {
        let artifact = Artifact {
            kind: ArtifactKind::Contract,
            filename: "../Contrato.pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
            page_count: 1,
            invoice_number: None,
        };
        let err = artifact
            .write_to_dir(std::env::temp_dir())
            .expect_err("refused");
        assert!(matches!(err, DocumentError::Storage(_)));
    }

    fn assert_within_printable_height(composer: &DocumentComposer, doc: &Document) {
        let settings = composer.settings();
        let printable_bottom = settings.page_size.height - settings.margins.bottom;
        for (page, run) in runs(doc) {
            assert!(
                run.y + run.font_size.mul_ratio(6, 5) <= printable_bottom,
                "{:?} on page {} crosses the printable height",
                run.text,
                page + 1
            );
        }
    }

    #[test]
    fn very_long_address_flows_over_pages() {
        let composer = composer();
        let buyer = BuyerRecord {
            address: Some("Calle larga numero veinte ".repeat(800)),
            ..full_buyer()
        };
        let composition = composer
            .contract_composition(&buyer, &product())
            .expect("compose");
        let doc = &composition.document;
        assert!(doc.page_count() > 1);
        assert_within_printable_height(&composer, doc);
        // The key is drawn once, on the first part of the address.
        assert_eq!(
            runs(doc).iter().filter(|(_, run)| run.text == "Dirección:").count(),
            1
        );

        let artifact = composer
            .compose_contract(&buyer, &product())
            .expect("artifact");
        assert!(artifact.page_count > 1);
    }

    #[test]
    fn very_long_buyer_name_flows_over_pages() {
        let composer = composer();
        let buyer = BuyerRecord {
            name: "Ana Maria ".repeat(900).trim().to_string(),
            ..full_buyer()
        };
        let composition = composer
            .contract_composition(&buyer, &product())
            .expect("compose");
        assert!(composition.document.page_count() > 1);
        assert_within_printable_height(&composer, &composition.document);
    }

    #[test]
    fn very_long_product_description_flows_over_pages() {
        let composer = composer();
        let product = ProductRecord {
            description: Some("texto ".repeat(3000)),
            ..product()
        };
        let payment = PaymentRecord::new(PaymentMethod::PayPal, date());
        let artifact = composer
            .compose_invoice_numbered(&full_buyer(), &product, &payment, 123_456)
            .expect("invoice");
        assert!(artifact.page_count > 1);

        let composition = composer
            .invoice_composition(&full_buyer(), &product, &payment, 123_456)
            .expect("compose");
        let doc = &composition.document;
        assert_within_printable_height(&composer, doc);
        // Line item, subtotal and total; the description continuation
        // carries no amount.
        let price = product.price_label();
        let amount_pages: Vec<usize> = runs(doc)
            .into_iter()
            .filter(|(_, run)| run.text == price)
            .map(|(page, _)| page)
            .collect();
        assert_eq!(amount_pages.len(), 3);
        assert_eq!(amount_pages[0], 0);
        assert!(amount_pages[1] > 0);
    }

    #[test]
    fn written_artifact_uses_its_filename() {
        let artifact = composer()
            .compose_contract(&bare_buyer(), &product())
            .expect("artifact");
        let dir = std::env::temp_dir().join(format!("trading_docs_out_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = artifact.write_to_dir(&dir).expect("write");
        assert!(path.ends_with("Contrato_LeidyBot1_Ana_Ruiz.pdf"));
        assert_eq!(std::fs::read(&path).expect("read"), artifact.bytes);
        let _ = std::fs::remove_dir_all(dir);
    }
}

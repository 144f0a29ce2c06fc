use crate::assets::{AssetBundle, ImageAsset, ImageFilter};
use crate::canvas::{Command, DEFAULT_FONT, Document, Page};
use crate::metrics::DocumentMetrics;
use crate::types::{Color, Pt, Size};
use fixed::types::I32F32;
use std::collections::{BTreeMap, BTreeSet};
use std::io;

// Document information written to the `/Info` dictionary. No creation or
// modification dates are emitted, so identical input gives identical bytes.
#[derive(Debug, Clone, Default)]
pub struct PdfOptions {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}

impl PdfOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

const PRODUCER: &str = "trading-docs";

pub fn document_to_pdf(
    document: &Document,
    assets: &AssetBundle,
    options: &PdfOptions,
) -> io::Result<Vec<u8>> {
    let mut metrics = DocumentMetrics::default();
    document_to_pdf_with_metrics(document, assets, options, &mut metrics)
}

// Serializes a laid-out document. Per-page content sizes and the total
// file size are recorded into `metrics`.
pub fn document_to_pdf_with_metrics(
    document: &Document,
    assets: &AssetBundle,
    options: &PdfOptions,
    metrics: &mut DocumentMetrics,
) -> io::Result<Vec<u8>> {
    if document.pages.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "document has no pages",
        ));
    }

    // Slot 0 is the catalog, slot 1 the page tree; both are filled last.
    let mut objects: Vec<String> = vec![String::new(), String::new()];
    let catalog_id = 1;
    let pages_id = 2;

    let font_map = build_font_map(&collect_font_names(document));
    let mut font_refs = Vec::with_capacity(font_map.len());
    for (name, resource) in &font_map {
        objects.push(font_object(name));
        font_refs.push((resource.clone(), objects.len()));
    }

    let mut image_map: BTreeMap<String, String> = BTreeMap::new();
    let mut image_refs = Vec::new();
    for (index, resource_id) in collect_image_ids(document).into_iter().enumerate() {
        let Some(image) = assets.image(&resource_id) else {
            tracing::warn!(resource = %resource_id, "image resource missing from asset bundle");
            continue;
        };
        let smask_id = match image.alpha.as_deref() {
            Some(alpha) => {
                objects.push(image_smask_object(image, alpha));
                Some(objects.len())
            }
            None => None,
        };
        objects.push(image_object(image, smask_id));
        let name = format!("Im{}", index + 1);
        image_refs.push((name.clone(), objects.len()));
        image_map.insert(resource_id, name);
    }

    let mut resources = format!("<< /Font {}", font_resources(&font_refs));
    if !image_refs.is_empty() {
        resources.push_str(&format!(" /XObject {}", xobject_resources(&image_refs)));
    }
    resources.push_str(" >>");

    let page_height = document.page_size.height;
    let mut page_ids = Vec::with_capacity(document.pages.len());
    for (page_index, page) in document.pages.iter().enumerate() {
        let content = render_page(page, page_height, &font_map, &image_map);
        if let Some(page_metrics) = metrics.pages.get_mut(page_index) {
            page_metrics.content_bytes = content.len();
        }
        objects.push(stream_object(&content));
        let content_id = objects.len();
        objects.push(page_object(
            pages_id,
            document.page_size,
            &resources,
            content_id,
        ));
        page_ids.push(objects.len());
    }

    objects.push(info_object(options));
    let info_id = objects.len();

    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    objects[pages_id - 1] = format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids,
        page_ids.len()
    );
    objects[catalog_id - 1] = format!("<< /Type /Catalog /Pages {pages_id} 0 R >>");

    let bytes = build_pdf(&objects, catalog_id, info_id);
    metrics.total_bytes = bytes.len();
    Ok(bytes)
}

fn collect_font_names(document: &Document) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for page in &document.pages {
        // DrawString before any SetFontName uses the canvas default font.
        let mut current = DEFAULT_FONT;
        for cmd in &page.commands {
            match cmd {
                Command::SetFontName(name) => current = name.as_str(),
                Command::DrawString { .. } => {
                    names.insert(current.to_string());
                }
                _ => {}
            }
        }
    }
    if names.is_empty() {
        names.insert(DEFAULT_FONT.to_string());
    }
    names
}

fn collect_image_ids(document: &Document) -> BTreeSet<String> {
    document
        .pages
        .iter()
        .flat_map(|page| page.commands.iter())
        .filter_map(|cmd| match cmd {
            Command::DrawImage { resource_id, .. } => Some(resource_id.clone()),
            _ => None,
        })
        .collect()
}

fn build_font_map(fonts: &BTreeSet<String>) -> BTreeMap<String, String> {
    fonts
        .iter()
        .enumerate()
        .map(|(index, name)| (name.clone(), format!("F{}", index + 1)))
        .collect()
}

fn render_page(
    page: &Page,
    page_height: Pt,
    font_map: &BTreeMap<String, String>,
    image_map: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();
    let mut font_size = Pt::from_f32(12.0);
    let mut font_name = DEFAULT_FONT.to_string();
    let mut stack: Vec<(String, Pt)> = Vec::new();

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                stack.push((font_name.clone(), font_size));
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some((name, size)) = stack.pop() {
                    font_name = name;
                    font_size = size;
                }
                out.push_str("Q\n");
            }
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontName(name) => font_name = name.clone(),
            Command::SetFontSize(size) => font_size = *size,
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::Stroke => out.push_str("S\n"),
            Command::DrawString { x, y, text } => {
                let Some(resource) = font_map.get(&font_name) else {
                    continue;
                };
                let encoded = encode_winansi_pdf_string(text);
                if encoded.replaced > 0 {
                    tracing::debug!(
                        font = %font_name,
                        replaced = encoded.replaced,
                        "characters outside WinAnsi replaced"
                    );
                }
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(font_size)));
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - font_size)
                ));
                out.push_str(&format!("({}) Tj\n", encoded.text));
                out.push_str("ET\n");
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                let draw_y = page_height - *y - *height;
                out.push_str(&format!(
                    "{} {} {} {} re\nf\n",
                    fmt_pt(*x),
                    fmt_pt(draw_y),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let Some(name) = image_map.get(resource_id) else {
                    continue;
                };
                let draw_y = page_height - *y - *height;
                out.push_str("q\n");
                out.push_str(&format!(
                    "{} 0 0 {} {} {} cm\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    fmt_pt(draw_y)
                ));
                out.push_str(&format!("/{name} Do\n"));
                out.push_str("Q\n");
            }
        }
    }
    out
}

fn page_object(pages_id: usize, page_size: Size, resources: &str, content_id: usize) -> String {
    format!(
        "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} /Contents {} 0 R >>",
        pages_id,
        fmt_pt(page_size.width),
        fmt_pt(page_size.height),
        resources,
        content_id
    )
}

fn image_object(image: &ImageAsset, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let filters = match image.filter {
        ImageFilter::Dct => "[/ASCIIHexDecode /DCTDecode]",
        ImageFilter::Flate => "[/ASCIIHexDecode /FlateDecode]",
    };
    let smask = smask_id
        .map(|id| format!(" /SMask {id} 0 R"))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent {} /Length {} /Filter {}{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        image.bits_per_component,
        stream_data.len(),
        filters,
        smask,
        stream_data
    )
}

fn image_smask_object(image: &ImageAsset, alpha: &[u8]) -> String {
    let stream_data = encode_stream_data(alpha);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        stream_data.len(),
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(&mut out, "{byte:02X}");
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn font_object(name: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        sanitize_font_name(name)
    )
}

fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .collect();
    if cleaned.is_empty() {
        DEFAULT_FONT.to_string()
    } else {
        cleaned
    }
}

fn font_resources(fonts: &[(String, usize)]) -> String {
    let entries = fonts
        .iter()
        .map(|(resource, id)| format!("/{resource} {id} 0 R"))
        .collect::<Vec<_>>();
    format!("<< {} >>", entries.join(" "))
}

fn xobject_resources(images: &[(String, usize)]) -> String {
    let entries = images
        .iter()
        .map(|(resource, id)| format!("/{resource} {id} 0 R"))
        .collect::<Vec<_>>();
    format!("<< {} >>", entries.join(" "))
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn info_object(options: &PdfOptions) -> String {
    let mut entries = Vec::new();
    if let Some(title) = options.title.as_deref() {
        entries.push(format!("/Title ({})", encode_winansi_pdf_string(title).text));
    }
    if let Some(author) = options.author.as_deref() {
        entries.push(format!("/Author ({})", encode_winansi_pdf_string(author).text));
    }
    if let Some(subject) = options.subject.as_deref() {
        entries.push(format!(
            "/Subject ({})",
            encode_winansi_pdf_string(subject).text
        ));
    }
    entries.push(format!("/Producer ({PRODUCER})"));
    format!("<< {} >>", entries.join(" "))
}

fn build_pdf(objects: &[String], catalog_id: usize, info_id: usize) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(obj.as_bytes());
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            catalog_id,
            info_id,
            xref_start
        )
        .as_bytes(),
    );
    out
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

// Maps to cp1252 and escapes for a PDF literal string.
fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::with_capacity(input.len());
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => {
                replaced += 1;
                b'?'
            }
        };

        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{b:03o}")),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::saturating_from_num(value);
    let milli: i64 = (fixed * I32F32::from_num(1000)).round().to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{sign}{int_part}");
    }
    let mut s = format!("{sign}{int_part}.{frac_part:03}");
    while s.ends_with('0') {
        s.pop();
    }
    s
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn color_to_pdf_fill(color: Color) -> String {
    format!(
        "{} {} {} rg\n",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!(
        "{} {} {} RG\n",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::decode_image_bytes;
    use crate::assets::tests::png_bytes;
    use crate::canvas::Canvas;

    fn sample_document() -> Document {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_fill_color(Color::rgb8(255, 215, 0));
        canvas.draw_rect(Pt::ZERO, Pt::ZERO, Pt::from_f32(595.28), Pt::from_f32(60.0));
        canvas.set_font_name("Helvetica-Bold");
        canvas.set_font_size(Pt::from_f32(18.0));
        canvas.draw_string(Pt::from_f32(40.0), Pt::from_f32(20.0), "CONTRATO (copia)");
        canvas.show_page();
        canvas.set_font_name("Helvetica");
        canvas.draw_string(Pt::from_f32(40.0), Pt::from_f32(100.0), "Página 2");
        canvas.draw_image(
            Pt::from_f32(40.0),
            Pt::from_f32(200.0),
            Pt::from_f32(100.0),
            Pt::from_f32(50.0),
            "firma",
        );
        canvas.finish()
    }

    fn sample_assets() -> AssetBundle {
        let mut assets = AssetBundle::default();
        let image = decode_image_bytes(&png_bytes(4, 2, false), None).expect("decode");
        assets.add_image("firma", image);
        assets
    }

    #[test]
    fn numbers_are_formatted_without_trailing_zeros() {
        assert_eq!(format_milli(0), "0");
        assert_eq!(format_milli(12_000), "12");
        assert_eq!(format_milli(12_500), "12.5");
        assert_eq!(format_milli(-1_250), "-1.25");
        assert_eq!(fmt(0.333_33), "0.333");
        assert_eq!(fmt(f32::NAN), "0");
    }

    #[test]
    fn winansi_escapes_accents_and_delimiters() {
        let encoded = encode_winansi_pdf_string("Página (1)");
        assert_eq!(encoded.text, "P\\341gina \\(1\\)");
        assert_eq!(encoded.replaced, 0);

        let encoded = encode_winansi_pdf_string("\u{2022} ok \u{4E2D}");
        assert_eq!(encoded.text, "\\225 ok ?");
        assert_eq!(encoded.replaced, 1);
    }

    #[test]
    fn baseline_is_flipped_from_top_left_origin() {
        let mut canvas = Canvas::new(Size::letter());
        canvas.set_font_size(Pt::from_f32(10.0));
        canvas.draw_string(Pt::from_f32(72.0), Pt::from_f32(100.0), "hola");
        let doc = canvas.finish();
        let map = build_font_map(&collect_font_names(&doc));
        let content = render_page(&doc.pages[0], doc.page_size.height, &map, &BTreeMap::new());
        assert!(content.contains("/F1 10 Tf\n72 682 Td\n(hola) Tj"));
    }

    #[test]
    fn output_is_deterministic() {
        let doc = sample_document();
        let assets = sample_assets();
        let options = PdfOptions::titled("Contrato");
        let first = document_to_pdf(&doc, &assets, &options).expect("pdf");
        let second = document_to_pdf(&doc, &assets, &options).expect("pdf");
        assert_eq!(first, second);
        assert!(first.starts_with(b"%PDF-1.7"));
        let text = String::from_utf8_lossy(&first);
        assert!(!text.contains("/CreationDate"));
        assert!(text.contains("/Title (Contrato)"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn images_get_an_smask_when_transparent() {
        let pdf = document_to_pdf(&sample_document(), &sample_assets(), &PdfOptions::default())
            .expect("pdf");
        let text = String::from_utf8_lossy(&pdf);
        assert!(text.contains("/SMask"));
        assert!(text.contains("/Im1 Do"));
        assert!(text.contains("/BaseFont /Helvetica-Bold"));
    }

    #[test]
    fn missing_image_resource_is_skipped() {
        let pdf = document_to_pdf(&sample_document(), &AssetBundle::default(), &PdfOptions::default())
            .expect("pdf");
        let text = String::from_utf8_lossy(&pdf);
        assert!(!text.contains("/XObject"));
        assert!(!text.contains(" Do\n"));
    }

    #[test]
    fn metrics_record_content_and_total_size() {
        let doc = sample_document();
        let mut metrics = DocumentMetrics::default();
        metrics.pages = vec![Default::default(); doc.page_count()];
        let pdf = document_to_pdf_with_metrics(&doc, &sample_assets(), &PdfOptions::default(), &mut metrics)
            .expect("pdf");
        assert_eq!(metrics.total_bytes, pdf.len());
        assert!(metrics.pages.iter().all(|page| page.content_bytes > 0));
    }

    #[test]
    fn lopdf_reads_the_output() {
        let pdf = document_to_pdf(&sample_document(), &sample_assets(), &PdfOptions::default())
            .expect("pdf");
        let parsed = lopdf::Document::load_mem(&pdf).expect("parse");
        assert_eq!(parsed.get_pages().len(), 2);
    }
}

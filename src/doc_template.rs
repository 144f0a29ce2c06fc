use crate::block::{Block, BreakBefore};
use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::doc_context::DocContext;
use crate::error::DocumentError;
use crate::frame::{AddResult, Frame};
use crate::metrics::{DocumentMetrics, PageMetrics};
use crate::page_template::PageTemplate;
use serde_json::json;
use std::collections::VecDeque;
use std::time::Instant;

pub const META_PAGE_TEMPLATE_KEY: &str = "td.page_template";

// The single pagination engine: flows an ordered list of blocks through
// page templates, starting a new page whenever the next block does not fit.
pub struct DocTemplate {
    page_templates: Vec<PageTemplate>,
    story: Vec<Block>,
    debug: Option<DebugLogger>,
    debug_label: String,
}

struct PageState {
    canvas: Canvas,
    page_number: usize,
    frame: Frame,
    placed_on_page: bool,
    page_blocks: usize,
    page_start: Instant,
    metrics: DocumentMetrics,
}

impl DocTemplate {
    pub fn new(page_templates: Vec<PageTemplate>) -> Self {
        Self {
            page_templates,
            story: Vec::new(),
            debug: None,
            debug_label: String::new(),
        }
    }

    pub(crate) fn with_debug(mut self, debug: DebugLogger, label: impl Into<String>) -> Self {
        self.debug = Some(debug);
        self.debug_label = label.into();
        self
    }

    pub fn add_block(&mut self, block: Block) {
        self.story.push(block);
    }

    pub fn extend(&mut self, blocks: impl IntoIterator<Item = Block>) {
        self.story.extend(blocks);
    }

    pub fn build(self) -> Result<Document, DocumentError> {
        Ok(self.build_with_metrics()?.0)
    }

    pub fn build_with_metrics(mut self) -> Result<(Document, DocumentMetrics), DocumentError> {
        if self.page_templates.is_empty() {
            return Err(DocumentError::MissingPageTemplate);
        }

        let first = select_template(&self.page_templates, 1);
        let mut state = PageState {
            canvas: Canvas::new(first.page_size),
            page_number: 1,
            frame: first.instantiate_frame(),
            placed_on_page: false,
            page_blocks: 0,
            page_start: Instant::now(),
            metrics: DocumentMetrics::default(),
        };
        self.begin_page(&mut state);

        let mut story: VecDeque<Block> = std::mem::take(&mut self.story).into();
        while let Some(block) = story.pop_front() {
            let mut current = block;
            loop {
                let name = current.debug_name();
                if matches!(current.pagination().break_before, BreakBefore::Page) {
                    if state.placed_on_page {
                        self.next_page(&mut state, "break_before_page", name);
                    }
                    break;
                }

                match state.frame.add(current, &mut state.canvas) {
                    AddResult::Placed => {
                        state.placed_on_page = true;
                        state.page_blocks += 1;
                        break;
                    }
                    AddResult::Split(rest) => {
                        state.placed_on_page = true;
                        state.page_blocks += 1;
                        self.next_page(&mut state, "block_split", name);
                        current = rest;
                    }
                    AddResult::Overflow(rest) => {
                        if !state.placed_on_page {
                            let rect = state.frame.rect();
                            return Err(DocumentError::UnplaceableBlock(format!(
                                "{} height={}pt frame={}x{}pt",
                                name,
                                rest.wrap(rect.width).to_f32(),
                                rect.width.to_f32(),
                                rect.height.to_f32(),
                            )));
                        }
                        self.next_page(&mut state, "frame_overflow", name);
                        current = rest;
                    }
                }
            }
        }

        self.finish_page(&mut state);
        let PageState {
            canvas, metrics, ..
        } = state;
        Ok((canvas.finish(), metrics))
    }

    fn begin_page(&self, state: &mut PageState) {
        let template = select_template(&self.page_templates, state.page_number);
        if let Some(callback) = template.on_page() {
            callback(
                &mut state.canvas,
                &DocContext::new(state.page_number, &template.name),
            );
        }
        state
            .canvas
            .meta(META_PAGE_TEMPLATE_KEY, template.name.clone());
        state.frame = template.instantiate_frame();
        state.placed_on_page = false;
        state.page_blocks = 0;
        state.page_start = Instant::now();
    }

    fn finish_page(&self, state: &mut PageState) {
        let elapsed = state.page_start.elapsed().as_secs_f64() * 1000.0;
        state.metrics.total_render_ms += elapsed;
        state.metrics.pages.push(PageMetrics {
            page_number: state.page_number,
            render_ms: elapsed,
            command_count: state.canvas.current_command_count(),
            block_count: state.page_blocks,
            content_bytes: 0,
        });
        state.canvas.show_page();
    }

    fn next_page(&self, state: &mut PageState, reason: &str, block_name: &str) {
        tracing::debug!(
            document = %self.debug_label,
            from_page = state.page_number,
            reason,
            block = block_name,
            "page break"
        );
        if let Some(logger) = self.debug.as_ref() {
            logger.log_event(
                "layout.page_break",
                json!({
                    "document": self.debug_label,
                    "reason": reason,
                    "from_page": state.page_number,
                    "to_page": state.page_number + 1,
                    "block": block_name,
                }),
            );
            logger.increment("layout.page_break", 1);
        }
        self.finish_page(state);
        state.metrics.page_breaks += 1;
        state.page_number += 1;
        self.begin_page(state);
    }
}

// page n uses templates[min(n-1, len-1)]; the last template repeats.
fn select_template(page_templates: &[PageTemplate], page_number: usize) -> &PageTemplate {
    let idx = page_number
        .saturating_sub(1)
        .min(page_templates.len().saturating_sub(1));
    &page_templates[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TextStyle;
    use crate::types::{Margins, Pt, Size};

    fn templates() -> Vec<PageTemplate> {
        let first = PageTemplate::with_margins(
            "first",
            Size::a4(),
            Margins::all(40.0),
            Pt::from_f32(80.0),
            Pt::from_f32(20.0),
        )
        .set_on_page(|canvas, ctx| {
            canvas.draw_string(Pt::from_f32(40.0), Pt::from_f32(10.0), format!("cabecera {}", ctx.page_number));
        });
        let rest = PageTemplate::with_margins(
            "rest",
            Size::a4(),
            Margins::all(40.0),
            Pt::ZERO,
            Pt::from_f32(20.0),
        );
        vec![first, rest]
    }

    fn long_story(paragraphs: usize) -> Vec<Block> {
        let text = "El vendedor transfiere al comprador los derechos de uso del software indicado. ".repeat(6);
        (0..paragraphs)
            .map(|i| {
                if i % 4 == 0 {
                    Block::heading(format!("{}. CLÁUSULA", i / 4 + 1), TextStyle::sized(12.0).bold())
                } else {
                    Block::paragraph(text.clone(), TextStyle::sized(10.0))
                }
            })
            .collect()
    }

    #[test]
    fn requires_a_template() {
        let err = DocTemplate::new(Vec::new()).build().expect_err("no templates");
        assert!(matches!(err, DocumentError::MissingPageTemplate));
    }

    #[test]
    fn short_story_fits_one_page() {
        let mut doc = DocTemplate::new(templates());
        doc.add_block(Block::paragraph("Hola", TextStyle::default()));
        let (document, metrics) = doc.build_with_metrics().expect("build");
        assert_eq!(document.page_count(), 1);
        assert_eq!(metrics.pages.len(), 1);
        assert_eq!(metrics.page_breaks, 0);
        assert!(document.pages[0].contains_text("cabecera 1"));
    }

    #[test]
    fn long_story_paginates_within_printable_height() {
        let templates = templates();
        let bottoms: Vec<Pt> = templates.iter().map(|t| t.frame_rect().bottom()).collect();
        let mut doc = DocTemplate::new(templates);
        doc.extend(long_story(40));
        let (document, metrics) = doc.build_with_metrics().expect("build");

        assert!(document.page_count() > 1);
        assert_eq!(metrics.pages.len(), document.page_count());
        assert_eq!(metrics.page_breaks, document.page_count() - 1);
        for (page_idx, run) in document.text_runs() {
            if run.text.starts_with("cabecera") {
                continue;
            }
            let bottom = bottoms[page_idx.min(bottoms.len() - 1)];
            assert!(
                run.y + run.font_size.mul_ratio(6, 5) <= bottom,
                "line {:?} on page {} crosses the frame bottom",
                run.text,
                page_idx + 1
            );
        }
        // Only the first page carries the header band.
        assert!(document.pages[0].contains_text("cabecera 1"));
        assert!(!document.pages[1].contains_text("cabecera"));
        assert_eq!(document.pages[1].meta_values(META_PAGE_TEMPLATE_KEY), vec!["rest"]);
    }

    #[test]
    fn page_break_block_starts_new_page() {
        let mut doc = DocTemplate::new(templates());
        doc.add_block(Block::paragraph("antes", TextStyle::default()));
        doc.add_block(Block::PageBreak);
        doc.add_block(Block::paragraph("después", TextStyle::default()));
        let document = doc.build().expect("build");
        assert_eq!(document.page_count(), 2);
        assert!(document.pages[1].contains_text("después"));
    }

    #[test]
    fn leading_page_break_is_ignored() {
        let mut doc = DocTemplate::new(templates());
        doc.add_block(Block::PageBreak);
        doc.add_block(Block::paragraph("único", TextStyle::default()));
        assert_eq!(doc.build().expect("build").page_count(), 1);
    }

    #[test]
    fn unplaceable_block_is_reported() {
        let tiny = PageTemplate::with_margins(
            "tiny",
            Size::from_mm(50.0, 20.0),
            Margins::all(20.0),
            Pt::ZERO,
            Pt::ZERO,
        );
        let mut doc = DocTemplate::new(vec![tiny]);
        doc.add_block(Block::heading("ENCABEZADO", TextStyle::sized(24.0)));
        let err = doc.build().expect_err("does not fit");
        assert!(matches!(err, DocumentError::UnplaceableBlock(_)));
    }

    #[test]
    fn page_breaks_are_logged() {
        use std::io::Write;
        #[derive(Clone, Default)]
        struct Sink(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
        impl Write for Sink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sink = Sink::default();
        let logger = DebugLogger::from_writer(sink.clone());
        let mut doc = DocTemplate::new(templates()).with_debug(logger.clone(), "test");
        doc.extend(long_story(40));
        let document = doc.build().expect("build");
        let log = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        let breaks = log
            .lines()
            .filter(|l| l.contains("\"type\":\"layout.page_break\""))
            .count();
        assert_eq!(breaks, document.page_count() - 1);

        logger.emit_summary("test");
        let log = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        let summary: serde_json::Value = log
            .lines()
            .last()
            .and_then(|line| serde_json::from_str(line).ok())
            .expect("summary line");
        assert_eq!(summary["counts"]["layout.page_break"], breaks as u64);
    }
}

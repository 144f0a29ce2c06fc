use crate::canvas::Canvas;
use crate::doc_context::DocContext;
use crate::frame::Frame;
use crate::types::{Margins, Pt, Rect, Size};
use std::sync::Arc;

pub type OnPageCallback = Arc<dyn Fn(&mut Canvas, &DocContext) + Send + Sync>;

#[derive(Clone)]
pub struct PageTemplate {
    pub name: String,
    pub page_size: Size,
    frame: Rect,
    on_page: Option<OnPageCallback>,
}

impl PageTemplate {
    pub fn new(name: impl Into<String>, page_size: Size, frame: Rect) -> Self {
        Self {
            name: name.into(),
            page_size,
            frame,
            on_page: None,
        }
    }

    // Template whose frame is the page minus margins, with extra bands
    // reserved at the top (header) and bottom (footer).
    pub fn with_margins(
        name: impl Into<String>,
        page_size: Size,
        margins: Margins,
        header_band: Pt,
        footer_band: Pt,
    ) -> Self {
        let frame = Rect {
            x: margins.left,
            y: margins.top + header_band,
            width: page_size.width - margins.left - margins.right,
            height: page_size.height - margins.top - margins.bottom - header_band - footer_band,
        };
        Self::new(name, page_size, frame)
    }

    pub fn set_on_page<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Canvas, &DocContext) + Send + Sync + 'static,
    {
        self.on_page = Some(Arc::new(callback));
        self
    }

    pub fn on_page(&self) -> Option<&OnPageCallback> {
        self.on_page.as_ref()
    }

    pub fn frame_rect(&self) -> Rect {
        self.frame
    }

    pub fn instantiate_frame(&self) -> Frame {
        Frame::new(self.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_excludes_margins_and_bands() {
        let template = PageTemplate::with_margins(
            "body",
            Size::letter(),
            Margins::all(36.0),
            Pt::from_f32(60.0),
            Pt::from_f32(20.0),
        );
        let rect = template.frame_rect();
        assert_eq!(rect.x, Pt::from_f32(36.0));
        assert_eq!(rect.y, Pt::from_f32(96.0));
        assert_eq!(rect.width, Pt::from_f32(540.0));
        assert_eq!(rect.bottom(), Pt::from_f32(792.0 - 36.0 - 20.0));
    }
}

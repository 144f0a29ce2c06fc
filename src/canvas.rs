use crate::types::{Color, Pt, Rect, Size};

// Drawing commands in top-left-origin page space. The PDF writer flips
// coordinates when it serializes them.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    // Non-rendered metadata used for layout reporting. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontName(String),
    SetFontSize(Pt),
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    Stroke,
    // `y` is the top of the line box; the writer places the baseline one font size below.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
}

// A string drawn on a page together with the font state active at the time.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: Pt,
    pub y: Pt,
    pub font_name: String,
    pub font_size: Pt,
    pub text: String,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn text_runs(&self) -> Vec<TextRun> {
        let mut font_name = DEFAULT_FONT.to_string();
        let mut font_size = default_font_size();
        let mut stack: Vec<(String, Pt)> = Vec::new();
        let mut runs = Vec::new();
        for cmd in &self.commands {
            match cmd {
                Command::SetFontName(name) => font_name = name.clone(),
                Command::SetFontSize(size) => font_size = *size,
                Command::SaveState => stack.push((font_name.clone(), font_size)),
                Command::RestoreState => {
                    if let Some((name, size)) = stack.pop() {
                        font_name = name;
                        font_size = size;
                    }
                }
                Command::DrawString { x, y, text } => runs.push(TextRun {
                    x: *x,
                    y: *y,
                    font_name: font_name.clone(),
                    font_size,
                    text: text.clone(),
                }),
                _ => {}
            }
        }
        runs
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.commands.iter().any(|cmd| match cmd {
            Command::DrawString { text, .. } => text.contains(needle),
            _ => false,
        })
    }

    pub fn meta_values(&self, key: &str) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::Meta { key: k, value } if k == key => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn text_runs(&self) -> impl Iterator<Item = (usize, TextRun)> + '_ {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(idx, page)| page.text_runs().into_iter().map(move |run| (idx, run)))
    }
}

pub(crate) const DEFAULT_FONT: &str = "Helvetica";

fn default_font_size() -> Pt {
    Pt::from_f32(12.0)
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font_name: String,
}

impl GraphicsState {
    fn initial() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_size: default_font_size(),
            font_name: DEFAULT_FONT.to_string(),
        }
    }
}

pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::new(),
            state_stack: Vec::new(),
            current_state: GraphicsState::initial(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.current.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.current.commands.push(Command::RestoreState);
        }
    }

    pub fn record_block_bounds(&mut self, rect: Rect) {
        let value = format!(
            "{},{},{},{}",
            rect.x.to_milli_i64(),
            rect.y.to_milli_i64(),
            rect.width.to_milli_i64(),
            rect.height.to_milli_i64()
        );
        self.meta(META_BLOCK_BOUNDS_KEY, value);
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        emit_if_changed(
            &mut self.current_state.fill_color,
            color,
            &mut self.current.commands,
            Command::SetFillColor,
        );
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        emit_if_changed(
            &mut self.current_state.stroke_color,
            color,
            &mut self.current.commands,
            Command::SetStrokeColor,
        );
    }

    // Negative widths clamp to zero.
    pub fn set_line_width(&mut self, width: Pt) {
        emit_if_changed(
            &mut self.current_state.line_width,
            width.max(Pt::ZERO),
            &mut self.current.commands,
            Command::SetLineWidth,
        );
    }

    pub fn set_font_name(&mut self, name: &str) {
        if self.current_state.font_name != name {
            emit_if_changed(
                &mut self.current_state.font_name,
                name.to_string(),
                &mut self.current.commands,
                Command::SetFontName,
            );
        }
    }

    pub fn set_font_size(&mut self, size: Pt) {
        emit_if_changed(
            &mut self.current_state.font_size,
            size,
            &mut self.current.commands,
            Command::SetFontSize,
        );
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::LineTo { x, y });
    }

    pub fn stroke(&mut self) {
        self.current.commands.push(Command::Stroke);
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.current.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn draw_image(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: impl Into<String>,
    ) {
        self.current.commands.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.into(),
        });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(current);
        self.state_stack.clear();
        self.current_state = GraphicsState::initial();
    }

    pub fn current_command_count(&self) -> usize {
        self.current.commands.len()
    }

    pub fn is_current_empty(&self) -> bool {
        self.current.commands.is_empty()
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

pub const META_BLOCK_BOUNDS_KEY: &str = "td.block_bounds";

// Records `value` as the current state and emits a command only on change.
fn emit_if_changed<T: Clone + PartialEq>(
    slot: &mut T,
    value: T,
    commands: &mut Vec<Command>,
    command: impl FnOnce(T) -> Command,
) {
    if *slot == value {
        return;
    }
    *slot = value.clone();
    commands.push(command(value));
}

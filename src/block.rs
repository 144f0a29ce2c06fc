use crate::canvas::Canvas;
use crate::text::{TextStyle, wrap_lines};
use crate::types::{Color, Pt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakBefore {
    #[default]
    Auto,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakInside {
    #[default]
    Auto,
    Avoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub break_before: BreakBefore,
    pub break_inside: BreakInside,
}

impl Pagination {
    fn avoid() -> Self {
        Self {
            break_before: BreakBefore::Auto,
            break_inside: BreakInside::Avoid,
        }
    }
}

// One entry of the declarative layout description consumed by the
// pagination engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        text: String,
        style: TextStyle,
        space_before: Pt,
        space_after: Pt,
    },
    Paragraph {
        text: String,
        style: TextStyle,
        indent: Pt,
        space_before: Pt,
        space_after: Pt,
    },
    Bullet {
        text: String,
        style: TextStyle,
        indent: Pt,
        // False for the continuation of a bullet split across pages.
        marker: bool,
    },
    KeyValue {
        key: String,
        value: String,
        key_style: TextStyle,
        value_style: TextStyle,
        key_width: Pt,
    },
    LineItem {
        description: String,
        amount: String,
        style: TextStyle,
        amount_width: Pt,
    },
    Rule {
        thickness: Pt,
        color: Color,
        space: Pt,
    },
    Spacer(Pt),
    Image {
        resource_id: String,
        width: Pt,
        height: Pt,
        caption: Option<(String, TextStyle)>,
    },
    PageBreak,
}

pub const BULLET_MARKER: &str = "\u{2022}";

impl Block {
    pub fn heading(text: impl Into<String>, style: TextStyle) -> Self {
        let space_before = style.font_size.mul_ratio(1, 2);
        let space_after = style.font_size.mul_ratio(1, 4);
        Block::Heading {
            text: text.into(),
            style,
            space_before,
            space_after,
        }
    }

    pub fn paragraph(text: impl Into<String>, style: TextStyle) -> Self {
        let space_after = style.font_size.mul_ratio(1, 4);
        Block::Paragraph {
            text: text.into(),
            style,
            indent: Pt::ZERO,
            space_before: Pt::ZERO,
            space_after,
        }
    }

    pub fn bullet(text: impl Into<String>, style: TextStyle, indent: Pt) -> Self {
        Block::Bullet {
            text: text.into(),
            style,
            indent,
            marker: true,
        }
    }

    pub fn key_value(
        key: impl Into<String>,
        value: impl Into<String>,
        key_style: TextStyle,
        value_style: TextStyle,
        key_width: Pt,
    ) -> Self {
        Block::KeyValue {
            key: key.into(),
            value: value.into(),
            key_style,
            value_style,
            key_width,
        }
    }

    pub fn line_item(
        description: impl Into<String>,
        amount: impl Into<String>,
        style: TextStyle,
        amount_width: Pt,
    ) -> Self {
        Block::LineItem {
            description: description.into(),
            amount: amount.into(),
            style,
            amount_width,
        }
    }

    pub fn rule(color: Color) -> Self {
        Block::Rule {
            thickness: Pt::from_f32(0.75),
            color,
            space: Pt::from_f32(4.0),
        }
    }

    pub fn image(resource_id: impl Into<String>, width: Pt, height: Pt) -> Self {
        Block::Image {
            resource_id: resource_id.into(),
            width,
            height,
            caption: None,
        }
    }

    pub fn with_caption(self, caption: impl Into<String>, style: TextStyle) -> Self {
        match self {
            Block::Image {
                resource_id,
                width,
                height,
                ..
            } => Block::Image {
                resource_id,
                width,
                height,
                caption: Some((caption.into(), style)),
            },
            other => other,
        }
    }

    pub fn pagination(&self) -> Pagination {
        match self {
            Block::Paragraph { .. } | Block::Bullet { .. } | Block::Spacer(_) => {
                Pagination::default()
            }
            Block::PageBreak => Pagination {
                break_before: BreakBefore::Page,
                break_inside: BreakInside::Auto,
            },
            _ => Pagination::avoid(),
        }
    }

    pub fn debug_name(&self) -> &'static str {
        match self {
            Block::Heading { .. } => "heading",
            Block::Paragraph { .. } => "paragraph",
            Block::Bullet { .. } => "bullet",
            Block::KeyValue { .. } => "key_value",
            Block::LineItem { .. } => "line_item",
            Block::Rule { .. } => "rule",
            Block::Spacer(_) => "spacer",
            Block::Image { .. } => "image",
            Block::PageBreak => "page_break",
        }
    }

    // Height the block needs at the given width.
    pub fn wrap(&self, avail_width: Pt) -> Pt {
        match self {
            Block::Heading {
                text,
                style,
                space_before,
                space_after,
            } => {
                let lines = wrap_lines(text, style, avail_width);
                *space_before + style.line_height() * lines.len() as i32 + *space_after
            }
            Block::Paragraph {
                text,
                style,
                indent,
                space_before,
                space_after,
            } => {
                let lines = wrap_lines(text, style, avail_width - *indent);
                *space_before + style.line_height() * lines.len() as i32 + *space_after
            }
            Block::Bullet {
                text,
                style,
                indent,
                ..
            } => {
                let lines = wrap_lines(text, style, avail_width - *indent);
                style.line_height() * lines.len() as i32
            }
            Block::KeyValue {
                key,
                value,
                key_style,
                value_style,
                key_width,
            } => {
                let key_lines = wrap_lines(key, key_style, *key_width).len() as i32;
                let value_lines =
                    wrap_lines(value, value_style, avail_width - *key_width).len() as i32;
                (key_style.line_height() * key_lines).max(value_style.line_height() * value_lines)
            }
            Block::LineItem {
                description,
                style,
                amount_width,
                ..
            } => {
                let lines = wrap_lines(description, style, avail_width - *amount_width);
                style.line_height() * lines.len() as i32 + line_item_padding(style) * 2
            }
            Block::Rule {
                thickness, space, ..
            } => *space * 2 + *thickness,
            Block::Spacer(height) => *height,
            Block::Image {
                width,
                height,
                caption,
                ..
            } => {
                let (_, draw_height) = fit_image(*width, *height, avail_width);
                draw_height + caption_height(caption)
            }
            Block::PageBreak => Pt::ZERO,
        }
    }

    // Splits text blocks between lines so that the first part fits
    // `avail_height`. Keys, amounts and bullet markers stay on the first part.
    pub fn split(&self, avail_width: Pt, avail_height: Pt) -> Option<(Block, Block)> {
        match self {
            Block::Heading {
                text,
                style,
                space_before,
                space_after,
            } => {
                let lines = wrap_lines(text, style, avail_width);
                let fit = lines_that_fit(avail_height - *space_before, style.line_height());
                let (head, tail) = split_lines(&lines, fit)?;
                Some((
                    Block::Heading {
                        text: head,
                        style: style.clone(),
                        space_before: *space_before,
                        space_after: Pt::ZERO,
                    },
                    Block::Heading {
                        text: tail,
                        style: style.clone(),
                        space_before: Pt::ZERO,
                        space_after: *space_after,
                    },
                ))
            }
            Block::Paragraph {
                text,
                style,
                indent,
                space_before,
                space_after,
            } => {
                let lines = wrap_lines(text, style, avail_width - *indent);
                let fit = lines_that_fit(avail_height - *space_before, style.line_height());
                let (head, tail) = split_lines(&lines, fit)?;
                Some((
                    Block::Paragraph {
                        text: head,
                        style: style.clone(),
                        indent: *indent,
                        space_before: *space_before,
                        space_after: Pt::ZERO,
                    },
                    Block::Paragraph {
                        text: tail,
                        style: style.clone(),
                        indent: *indent,
                        space_before: Pt::ZERO,
                        space_after: *space_after,
                    },
                ))
            }
            Block::Bullet {
                text,
                style,
                indent,
                marker,
            } => {
                let lines = wrap_lines(text, style, avail_width - *indent);
                let fit = lines_that_fit(avail_height, style.line_height());
                let (head, tail) = split_lines(&lines, fit)?;
                Some((
                    Block::Bullet {
                        text: head,
                        style: style.clone(),
                        indent: *indent,
                        marker: *marker,
                    },
                    Block::Bullet {
                        text: tail,
                        style: style.clone(),
                        indent: *indent,
                        marker: false,
                    },
                ))
            }
            Block::KeyValue {
                key,
                value,
                key_style,
                value_style,
                key_width,
            } => {
                let key_lines = wrap_lines(key, key_style, *key_width).len() as i32;
                if key_style.line_height() * key_lines > avail_height {
                    return None;
                }
                let lines = wrap_lines(value, value_style, avail_width - *key_width);
                let fit = lines_that_fit(avail_height, value_style.line_height());
                let (head, tail) = split_lines(&lines, fit)?;
                Some((
                    Block::KeyValue {
                        key: key.clone(),
                        value: head,
                        key_style: key_style.clone(),
                        value_style: value_style.clone(),
                        key_width: *key_width,
                    },
                    Block::KeyValue {
                        key: String::new(),
                        value: tail,
                        key_style: key_style.clone(),
                        value_style: value_style.clone(),
                        key_width: *key_width,
                    },
                ))
            }
            Block::LineItem {
                description,
                amount,
                style,
                amount_width,
            } => {
                let lines = wrap_lines(description, style, avail_width - *amount_width);
                let room = avail_height - line_item_padding(style) * 2;
                let fit = lines_that_fit(room, style.line_height());
                let (head, tail) = split_lines(&lines, fit)?;
                Some((
                    Block::LineItem {
                        description: head,
                        amount: amount.clone(),
                        style: style.clone(),
                        amount_width: *amount_width,
                    },
                    Block::LineItem {
                        description: tail,
                        amount: String::new(),
                        style: style.clone(),
                        amount_width: *amount_width,
                    },
                ))
            }
            _ => None,
        }
    }

    // Image scaled down to fit a frame it would otherwise overflow.
    pub fn shrink_to(&self, avail_width: Pt, avail_height: Pt) -> Option<Block> {
        let Block::Image {
            resource_id,
            width,
            height,
            caption,
        } = self
        else {
            return None;
        };
        let (draw_width, draw_height) = fit_image(*width, *height, avail_width);
        let room = avail_height - caption_height(caption);
        if room <= Pt::ZERO || draw_height <= Pt::ZERO {
            return None;
        }
        if draw_height <= room {
            return Some(self.clone());
        }
        let scale = room.to_f32() / draw_height.to_f32();
        Some(Block::Image {
            resource_id: resource_id.clone(),
            width: draw_width * scale,
            height: room,
            caption: caption.clone(),
        })
    }

    pub fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt) {
        match self {
            Block::Heading {
                text,
                style,
                space_before,
                ..
            } => {
                let lines = wrap_lines(text, style, avail_width);
                draw_lines(canvas, &lines, style, x, y + *space_before);
            }
            Block::Paragraph {
                text,
                style,
                indent,
                space_before,
                ..
            } => {
                let lines = wrap_lines(text, style, avail_width - *indent);
                draw_lines(canvas, &lines, style, x + *indent, y + *space_before);
            }
            Block::Bullet {
                text,
                style,
                indent,
                marker,
            } => {
                let lines = wrap_lines(text, style, avail_width - *indent);
                if *marker {
                    let marker_x = x + *indent - style.measure(BULLET_MARKER) - style.font_size / 2;
                    apply_style(canvas, style);
                    canvas.draw_string(marker_x.max(x), y, BULLET_MARKER);
                }
                draw_lines(canvas, &lines, style, x + *indent, y);
            }
            Block::KeyValue {
                key,
                value,
                key_style,
                value_style,
                key_width,
            } => {
                let key_lines = wrap_lines(key, key_style, *key_width);
                draw_lines(canvas, &key_lines, key_style, x, y);
                let value_lines = wrap_lines(value, value_style, avail_width - *key_width);
                draw_lines(canvas, &value_lines, value_style, x + *key_width, y);
            }
            Block::LineItem {
                description,
                amount,
                style,
                amount_width,
            } => {
                let padding = line_item_padding(style);
                let lines = wrap_lines(description, style, avail_width - *amount_width);
                draw_lines(canvas, &lines, style, x, y + padding);
                if !amount.is_empty() {
                    let amount_x = x + avail_width - style.measure(amount);
                    apply_style(canvas, style);
                    canvas.draw_string(amount_x, y + padding, amount.clone());
                }
            }
            Block::Rule {
                thickness,
                color,
                space,
            } => {
                let line_y = y + *space + thickness.mul_ratio(1, 2);
                canvas.set_stroke_color(*color);
                canvas.set_line_width(*thickness);
                canvas.move_to(x, line_y);
                canvas.line_to(x + avail_width, line_y);
                canvas.stroke();
            }
            Block::Spacer(_) | Block::PageBreak => {}
            Block::Image {
                resource_id,
                width,
                height,
                caption,
            } => {
                let (draw_width, draw_height) = fit_image(*width, *height, avail_width);
                canvas.draw_image(x, y, draw_width, draw_height, resource_id.clone());
                if let Some((text, style)) = caption {
                    let caption_y = y + draw_height + style.font_size.mul_ratio(1, 2);
                    draw_lines(canvas, &[text.clone()], style, x, caption_y);
                }
            }
        }
    }
}

fn apply_style(canvas: &mut Canvas, style: &TextStyle) {
    canvas.set_font_name(style.font_name());
    canvas.set_font_size(style.font_size);
    canvas.set_fill_color(style.color);
}

fn draw_lines(canvas: &mut Canvas, lines: &[String], style: &TextStyle, x: Pt, y: Pt) {
    apply_style(canvas, style);
    let line_height = style.line_height();
    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        canvas.draw_string(x, y + line_height * idx as i32, line.clone());
    }
}

fn split_lines(lines: &[String], fit: usize) -> Option<(String, String)> {
    if fit == 0 || fit >= lines.len() {
        return None;
    }
    let (head, tail) = lines.split_at(fit);
    Some((head.join("\n"), tail.join("\n")))
}

fn lines_that_fit(avail_height: Pt, line_height: Pt) -> usize {
    if avail_height <= Pt::ZERO || line_height <= Pt::ZERO {
        return 0;
    }
    (avail_height.to_milli_i64() / line_height.to_milli_i64()).max(0) as usize
}

fn line_item_padding(style: &TextStyle) -> Pt {
    style.font_size.mul_ratio(1, 4)
}

fn caption_height(caption: &Option<(String, TextStyle)>) -> Pt {
    caption
        .as_ref()
        .map(|(_, style)| style.font_size.mul_ratio(1, 2) + style.line_height())
        .unwrap_or(Pt::ZERO)
}

fn fit_image(width: Pt, height: Pt, avail_width: Pt) -> (Pt, Pt) {
    if width <= avail_width || width <= Pt::ZERO {
        return (width, height);
    }
    let scale = avail_width.to_f32() / width.to_f32();
    (avail_width, height * scale)
}

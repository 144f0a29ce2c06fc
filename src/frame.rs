use crate::block::{Block, BreakInside};
use crate::canvas::Canvas;
use crate::types::{Pt, Rect};

pub enum AddResult {
    Placed,
    Split(Block),
    Overflow(Block),
}

// Printable rectangle of one page with a running vertical cursor.
pub struct Frame {
    rect: Rect,
    cursor_y: Pt,
}

impl Frame {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            cursor_y: Pt::ZERO,
        }
    }

    pub fn remaining_height(&self) -> Pt {
        (self.rect.height - self.cursor_y).max(Pt::ZERO)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_empty(&self) -> bool {
        self.cursor_y <= Pt::ZERO
    }

    pub fn add(&mut self, block: Block, canvas: &mut Canvas) -> AddResult {
        let avail_width = self.rect.width;
        let avail_height = self.remaining_height();
        if avail_height <= Pt::ZERO {
            return AddResult::Overflow(block);
        }

        let height = block.wrap(avail_width);
        if height <= avail_height {
            self.place(&block, height, canvas);
            return AddResult::Placed;
        }

        let keep_together = matches!(block.pagination().break_inside, BreakInside::Avoid);
        if keep_together && height <= self.rect.height && !self.is_empty() {
            return AddResult::Overflow(block);
        }

        if let Some((first, second)) = block.split(avail_width, avail_height) {
            let first_height = first.wrap(avail_width);
            if first_height > Pt::ZERO && first_height <= avail_height {
                self.place(&first, first_height, canvas);
                return AddResult::Split(second);
            }
        }

        // A block taller than an empty frame: images shrink to fit, anything
        // else is left for the caller to report.
        if self.is_empty() {
            if let Some(shrunk) = block.shrink_to(avail_width, avail_height) {
                let shrunk_height = shrunk.wrap(avail_width);
                if shrunk_height <= avail_height {
                    self.place(&shrunk, shrunk_height, canvas);
                    return AddResult::Placed;
                }
            }
        }

        AddResult::Overflow(block)
    }

    fn place(&mut self, block: &Block, height: Pt, canvas: &mut Canvas) {
        let top = self.rect.y + self.cursor_y;
        block.draw(canvas, self.rect.x, top, self.rect.width);
        canvas.record_block_bounds(Rect {
            x: self.rect.x,
            y: top,
            width: self.rect.width,
            height,
        });
        self.cursor_y += height;
    }
}

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Sub};

const MILLI_PER_PT: i64 = 1000;

// Layout length in PDF points, held as whole thousandths of a point.
// Every constructor quantizes, so cursor sums are exact and identical
// from run to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pt(i64);

impl Pt {
    pub const ZERO: Pt = Pt(0);

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        // `as` saturates out-of-range floats.
        Pt((f64::from(value) * MILLI_PER_PT as f64).round() as i64)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt(i64::from(value) * MILLI_PER_PT)
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt(milli)
    }

    pub fn to_milli_i64(self) -> i64 {
        self.0
    }

    pub fn to_f32(self) -> f32 {
        (self.0 as f64 / MILLI_PER_PT as f64) as f32
    }

    // `self * num / denom`, rounded half away from zero. Zero when `denom` is zero.
    pub fn mul_ratio(self, num: i32, denom: i32) -> Pt {
        let scaled = i128::from(self.0) * i128::from(num);
        Pt(saturate(div_round(scaled, i128::from(denom))))
    }
}

fn div_round(num: i128, denom: i128) -> i128 {
    if denom == 0 {
        return 0;
    }
    let half = denom.abs() / 2;
    let magnitude = (num.abs() + half) / denom.abs();
    if (num < 0) != (denom < 0) { -magnitude } else { magnitude }
}

fn saturate(value: i128) -> i64 {
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

impl Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Pt {
    fn add_assign(&mut self, rhs: Pt) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt(self.0.saturating_sub(rhs.0))
    }
}

impl Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        Pt(self.0.saturating_mul(i64::from(rhs)))
    }
}

impl Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        Pt::from_f32(self.to_f32() * rhs)
    }
}

impl Div<i32> for Pt {
    type Output = Pt;
    fn div(self, rhs: i32) -> Pt {
        self.mul_ratio(1, rhs)
    }
}

impl std::iter::Sum for Pt {
    fn sum<I: Iterator<Item = Pt>>(iter: I) -> Pt {
        iter.fold(Pt::ZERO, Add::add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn a4() -> Self {
        Self {
            width: Pt::from_f32(595.28),
            height: Pt::from_f32(841.89),
        }
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 72pt/in.
        Self {
            width: Pt::from_f32(612.0),
            height: Pt::from_f32(792.0),
        }
    }

    pub fn from_mm(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width: Pt::from_f32(width_mm * 72.0 / 25.4),
            height: Pt::from_f32(height_mm * 72.0 / 25.4),
        }
    }
}

// Named page sizes accepted by configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSizeName {
    #[default]
    A4,
    Letter,
}

impl PageSizeName {
    pub fn size(self) -> Size {
        match self {
            PageSizeName::A4 => Size::a4(),
            PageSizeName::Letter => Size::letter(),
        }
    }
}

// Top-left origin rectangle; y grows downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

impl Rect {
    pub fn bottom(&self) -> Pt {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

impl Margins {
    pub fn all(value: f32) -> Self {
        let v = Pt::from_f32(value);
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f32, horizontal: f32) -> Self {
        let v = Pt::from_f32(vertical);
        let h = Pt::from_f32(horizontal);
        Self {
            top: v,
            right: h,
            bottom: v,
            left: h,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pt_round_trips_through_milli() {
        let value = Pt::from_f32(12.345);
        assert_eq!(value.to_milli_i64(), 12_345);
        assert_eq!(Pt::from_i32(3).to_milli_i64(), 3_000);
    }

    #[test]
    fn mul_ratio_matches_line_height_rule() {
        let size = Pt::from_f32(10.0);
        assert_eq!(size.mul_ratio(6, 5), Pt::from_f32(12.0));
        assert_eq!(Pt::from_milli_i64(-7).mul_ratio(1, 2), Pt::from_milli_i64(-4));
        assert_eq!(size.mul_ratio(1, 0), Pt::ZERO);
        assert_eq!(Pt::from_f32(9.0) / 2, Pt::from_f32(4.5));
    }

    #[test]
    fn non_finite_input_is_zero() {
        assert_eq!(Pt::from_f32(f32::NAN), Pt::ZERO);
        assert_eq!(Pt::from_f32(10.0) * f32::INFINITY, Pt::ZERO);
        assert!(Pt::from_f32(-1.0) < Pt::ZERO);
        assert_eq!(Pt::from_f32(3.0).max(Pt::ZERO), Pt::from_i32(3));
    }

    #[test]
    fn repeated_addition_does_not_drift() {
        let step = Pt::from_f32(13.2);
        let total: Pt = (0..50).map(|_| step).sum();
        assert_eq!(total.to_milli_i64(), 660_000);
    }

    #[test]
    fn page_size_names_resolve() {
        assert_eq!(PageSizeName::A4.size(), Size::a4());
        assert_eq!(PageSizeName::Letter.size(), Size::letter());
        let from_mm = Size::from_mm(210.0, 297.0).width.to_milli_i64();
        assert!((from_mm - Size::a4().width.to_milli_i64()).abs() < 10);
    }
}

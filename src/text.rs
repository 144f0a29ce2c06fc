use crate::types::{Color, Pt};

// Helvetica advance widths (1/1000 em) for U+0020..=U+007E, from the base-14 AFM files.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333,
    500, 278, 556, 500, 722, 500, 500, 500, // a..z
    334, 260, 334, 584, // {..~
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    333, 333, 584, 584, 584, 611, 975, // :..@
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    333, 278, 333, 584, 556, 333, // [..`
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389,
    556, 333, 611, 556, 778, 556, 556, 500, // a..z
    389, 280, 389, 584, // {..~
];

const FALLBACK_WIDTH: u16 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_size: Pt,
    pub weight: FontWeight,
    pub italic: bool,
    pub color: Color,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: Pt::from_f32(11.0),
            weight: FontWeight::Regular,
            italic: false,
            color: Color::BLACK,
        }
    }
}

impl TextStyle {
    pub fn sized(font_size: f32) -> Self {
        Self {
            font_size: Pt::from_f32(font_size),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.weight = FontWeight::Bold;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn font_name(&self) -> &'static str {
        match (self.weight, self.italic) {
            (FontWeight::Bold, true) => "Helvetica-BoldOblique",
            (FontWeight::Bold, false) => "Helvetica-Bold",
            (FontWeight::Regular, true) => "Helvetica-Oblique",
            (FontWeight::Regular, false) => "Helvetica",
        }
    }

    pub fn line_height(&self) -> Pt {
        self.font_size.mul_ratio(6, 5)
    }

    pub fn measure(&self, text: &str) -> Pt {
        let table = match self.weight {
            FontWeight::Regular => &HELVETICA_WIDTHS,
            FontWeight::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        let units: i64 = text.chars().map(|ch| advance_units(table, ch) as i64).sum();
        Pt::from_milli_i64(self.font_size.to_milli_i64() * units / 1000)
    }
}

fn advance_units(table: &[u16; 95], ch: char) -> u16 {
    let ch = fold_latin1(ch);
    let code = ch as u32;
    if (0x20..=0x7e).contains(&code) {
        table[(code - 0x20) as usize]
    } else {
        FALLBACK_WIDTH
    }
}

// Accented Latin-1 letters share the advance of their base letter in Helvetica.
fn fold_latin1(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        '¿' => '?',
        '¡' => '!',
        '\u{00A0}' => ' ',
        '•' => '-',
        other => other,
    }
}

// Greedy word wrap. Explicit newlines are hard breaks; a word wider than the
// line is broken by character.
pub fn wrap_lines(text: &str, style: &TextStyle, max_width: Pt) -> Vec<String> {
    let max_width = max_width.max(Pt::from_f32(1.0));
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        let mut current = String::new();
        let mut current_width = Pt::ZERO;
        let space_width = style.measure(" ");
        for word in raw_line.split_whitespace() {
            let word_width = style.measure(word);
            if current.is_empty() {
                if word_width <= max_width {
                    current.push_str(word);
                    current_width = word_width;
                } else {
                    let mut pieces = break_word(word, style, max_width);
                    if let Some(last) = pieces.pop() {
                        lines.extend(pieces);
                        current_width = style.measure(&last);
                        current = last;
                    }
                }
                continue;
            }
            if current_width + space_width + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width = current_width + space_width + word_width;
                continue;
            }
            lines.push(std::mem::take(&mut current));
            if word_width <= max_width {
                current.push_str(word);
                current_width = word_width;
            } else {
                let mut pieces = break_word(word, style, max_width);
                if let Some(last) = pieces.pop() {
                    lines.extend(pieces);
                    current_width = style.measure(&last);
                    current = last;
                }
            }
        }
        lines.push(current);
    }
    lines
}

fn break_word(word: &str, style: &TextStyle, max_width: Pt) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        if !current.is_empty() && style.measure(&candidate) > max_width {
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_with_afm_widths() {
        let style = TextStyle::sized(10.0);
        // "Hi" = 722 + 222 units.
        assert_eq!(style.measure("Hi"), Pt::from_f32(9.44));
        assert!(style.clone().bold().measure("Hi") > style.measure("Hi"));
    }

    #[test]
    fn accented_letters_measure_as_base_letter() {
        let style = TextStyle::default();
        assert_eq!(style.measure("Teléfono"), style.measure("Telefono"));
        assert_eq!(style.measure("Dirección"), style.measure("Direccion"));
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let style = TextStyle::sized(10.0);
        let width = style.measure("uno dos tres");
        let lines = wrap_lines("uno dos tres cuatro cinco", &style, width);
        assert_eq!(lines, vec!["uno dos tres", "cuatro cinco"]);
        for line in &lines {
            assert!(style.measure(line) <= width);
        }
    }

    #[test]
    fn newline_is_a_hard_break() {
        let style = TextStyle::default();
        let lines = wrap_lines("primera\nsegunda", &style, Pt::from_f32(500.0));
        assert_eq!(lines, vec!["primera", "segunda"]);
    }

    #[test]
    fn long_words_break_by_character() {
        let style = TextStyle::sized(10.0);
        let width = style.measure("abcde");
        let lines = wrap_lines("abcdefghijkl", &style, width);
        assert_eq!(lines, vec!["abcde", "fghijkl"]);
        for line in &lines {
            assert!(style.measure(line) <= width);
        }
    }

    #[test]
    fn rewrapping_wrapped_output_is_stable() {
        let style = TextStyle::default();
        let width = Pt::from_f32(120.0);
        let text = "El comprador entiende que el software puede permanecer inactivo en periodos de riesgo elevado.";
        let first = wrap_lines(text, &style, width);
        let second = wrap_lines(&first.join("\n"), &style, width);
        assert_eq!(first, second);
    }

    #[test]
    fn font_names_follow_weight_and_slant() {
        assert_eq!(TextStyle::default().font_name(), "Helvetica");
        assert_eq!(TextStyle::default().bold().font_name(), "Helvetica-Bold");
        assert_eq!(TextStyle::default().italic().font_name(), "Helvetica-Oblique");
    }
}

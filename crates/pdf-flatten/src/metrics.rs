//! Helvetica advance widths for label placement.
//!
//! Widths are in 1/1000 em, taken from the Helvetica AFM.

/// Helvetica widths for printable ASCII, indexed by `code - 0x20`.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' ' .. '/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0' .. '9'
    278, 278, 584, 584, 584, 556, 1015, // ':' .. '@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A' .. 'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N' .. 'Z'
    278, 278, 278, 469, 556, 333, // '[' .. '`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a' .. 'm'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n' .. 'z'
    334, 260, 334, 584, // '{' .. '~'
];

const DEFAULT_WIDTH: u16 = 556;

fn char_width(ch: char) -> u16 {
    let code = ch as u32;
    if (0x20..0x7f).contains(&code) {
        HELVETICA_ASCII[(code - 0x20) as usize]
    } else {
        DEFAULT_WIDTH
    }
}

/// Width of `text` in points when set in Helvetica at `font_size`.
pub fn text_width(text: &str, font_size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| char_width(c) as u32).sum();
    units as f64 * font_size / 1000.0
}

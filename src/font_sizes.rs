//! Text measurement from per-character width tables.
//!
//! Layout has to measure accolade labels without a real font rasterizer, and
//! a worker has to measure them exactly like the control side does, so the
//! tables travel with the `renderScore` command.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::renderer::canvas::Font;

/// Font size the tables were captured at.
const TABLE_FONT_SIZE: f64 = 11.0;
/// First character covered by a table (space).
const FIRST_CHAR: u32 = 32;
const BOLD_FACTOR: f64 = 1.1;
const ITALIC_FACTOR: f64 = 1.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSizes {
    /// Family name → width of each character from `FIRST_CHAR` on, at
    /// `TABLE_FONT_SIZE`
    pub tables: BTreeMap<String, Vec<u8>>,
}

impl Default for FontSizes {
    fn default() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert("Georgia".to_string(), approximate_table(6, 8));
        tables.insert("Times New Roman".to_string(), approximate_table(5, 7));
        tables.insert("Arial".to_string(), approximate_table(6, 7));
        Self { tables }
    }
}

impl FontSizes {
    /// Width of `text` rendered with `font`. Unknown families use the
    /// first table; characters past the table use its last entry.
    pub fn measure(&self, text: &str, font: &Font) -> f64 {
        let table = match self
            .tables
            .get(&font.family)
            .or_else(|| self.tables.values().next())
        {
            Some(t) if !t.is_empty() => t,
            _ => return text.chars().count() as f64 * font.size * 0.5,
        };

        let mut width = 0.0;
        for ch in text.chars() {
            let code = ch as u32;
            if code < FIRST_CHAR {
                continue;
            }
            let idx = ((code - FIRST_CHAR) as usize).min(table.len() - 1);
            width += table[idx] as f64 * font.size / TABLE_FONT_SIZE;
        }

        let mut factor = 1.0;
        if font.bold {
            factor *= BOLD_FACTOR;
        }
        if font.italic {
            factor *= ITALIC_FACTOR;
        }
        width * factor
    }
}

/// Build a table for printable ASCII from a lowercase and an uppercase base width.
fn approximate_table(lower: u8, upper: u8) -> Vec<u8> {
    (FIRST_CHAR..127)
        .map(|code| {
            let ch = char::from_u32(code).unwrap_or(' ');
            match ch {
                ' ' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 3,
                'i' | 'j' | 'l' | 'I' | 't' | 'f' | 'r' => lower.saturating_sub(2).max(3),
                'm' | 'w' => lower + 3,
                'M' | 'W' => upper + 3,
                'A'..='Z' => upper,
                '0'..='9' => lower,
                _ => lower,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_scales_with_font_size() {
        let sizes = FontSizes::default();
        let small = sizes.measure("Gtr.", &Font::new("Georgia", 11.0));
        let large = sizes.measure("Gtr.", &Font::new("Georgia", 22.0));
        assert!(small > 0.0);
        assert!((large - 2.0 * small).abs() < 1e-9);
    }

    #[test]
    fn unknown_family_uses_a_fallback_table() {
        let sizes = FontSizes::default();
        let w = sizes.measure("Pno.", &Font::new("Missing Sans", 11.0));
        assert!(w > 0.0);
        assert_eq!(sizes.measure("", &Font::new("Georgia", 11.0)), 0.0);
    }
}

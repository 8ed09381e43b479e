//! Cursor color palette and validation.
//!
//! Every user gets a stable cursor color the first time one is needed. New
//! colors are drawn uniformly from [`CURSOR_PALETTE`]; users may later pick
//! any `#rrggbb` value.

use std::sync::LazyLock;

use rand::seq::IndexedRandom;
use regex::Regex;

use crate::error::CoreError;

/// Visually distinguishable cursor colors.
pub const CURSOR_PALETTE: &[&str] = &[
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#fabebe", "#008080", "#e6beff", "#9a6324", "#fffac8", "#800000", "#aaffc3",
    "#808000", "#ffd8b1", "#000075", "#808080",
];

/// Fallback when the palette is somehow empty.
const DEFAULT_COLOR: &str = "#4363d8";

static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid regex"));

/// Pick a palette color uniformly at random.
pub fn generate_color() -> String {
    CURSOR_PALETTE
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DEFAULT_COLOR)
        .to_string()
}

/// Validate the exact form `#` followed by six hex digits.
pub fn validate_color(color: &str) -> Result<(), CoreError> {
    if HEX_COLOR_RE.is_match(color) {
        Ok(())
    } else {
        Err(CoreError::InvalidColor(format!(
            "'{color}' is not a #rrggbb hex color"
        )))
    }
}

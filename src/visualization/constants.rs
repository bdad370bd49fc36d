//! Visual constants for the graph visualization.

// =============================================================================
// Node Colors by Entity Type
// =============================================================================

/// Palette keyed by normalized entity type.
pub const NODE_PALETTE: &[(&str, &str)] = &[
    ("person", "#3b82f6"),
    ("organization", "#10b981"),
    ("org", "#10b981"),
    ("location", "#f59e0b"),
    ("event", "#ef4444"),
    ("concept", "#8b5cf6"),
    ("document", "#06b6d4"),
    ("product", "#ec4899"),
    ("technology", "#14b8a6"),
];

/// Color for entity types not in the palette.
pub const COLOR_NODE_DEFAULT: &str = "#94a3b8";

// =============================================================================
// Edge and Highlight Colors
// =============================================================================

/// Default edge color.
pub const COLOR_EDGE_DEFAULT: &str = "#cbd5e1";
/// Outline/edge color for highlighted elements (search matches).
pub const COLOR_HIGHLIGHT: &str = "#facc15";
/// Outline/edge color for the selected element and its neighborhood.
pub const COLOR_SELECTED: &str = "#f97316";

// =============================================================================
// Edge Sizing
// =============================================================================

/// Weight used when a relation has no usable `weight` property.
pub const DEFAULT_EDGE_WEIGHT: f64 = 1.0;
/// Stroke width of an edge with weight 1 (world units).
pub const BASE_EDGE_WIDTH: f64 = 2.0;
/// Edge stroke width never exceeds this, regardless of weight.
pub const MAX_EDGE_WIDTH: f64 = 8.0;
/// Opacity applied to elements outside the active highlight.
pub const FADED_ALPHA: f32 = 0.2;

// =============================================================================
// Hit Testing
// =============================================================================

/// Extra screen pixels around a node that still count as a tap on it.
pub const NODE_HIT_SLOP: f64 = 4.0;
/// Maximum screen distance from an edge segment that counts as a tap on it.
pub const EDGE_HIT_TOLERANCE: f64 = 6.0;

// =============================================================================
// Helpers
// =============================================================================

/// Normalize a free-form type string: lowercase, non-alphanumerics collapsed to `-`.
pub fn normalize_type(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "default".to_string()
    } else {
        out
    }
}

/// Get color for a normalized entity type.
pub fn node_color_for_type(normalized: &str) -> &'static str {
    NODE_PALETTE
        .iter()
        .find(|(ty, _)| *ty == normalized)
        .map(|(_, color)| *color)
        .unwrap_or(COLOR_NODE_DEFAULT)
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` into RGBA bytes.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 4]> {
    let digits = hex.trim().strip_prefix('#')?;
    if !digits.is_ascii() {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in digits.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some([rgb[0], rgb[1], rgb[2], 255])
        }
        6 => Some([
            byte(&digits[0..2])?,
            byte(&digits[2..4])?,
            byte(&digits[4..6])?,
            255,
        ]),
        8 => Some([
            byte(&digits[0..2])?,
            byte(&digits[2..4])?,
            byte(&digits[4..6])?,
            byte(&digits[6..8])?,
        ]),
        _ => None,
    }
}

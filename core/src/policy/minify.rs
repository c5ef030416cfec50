use serde::Serialize;

pub const DEFAULT_AVG_LINE_LEN: f64 = 80.0;
pub const DEFAULT_WHITESPACE_RATIO: f64 = 0.25;

/// Minified means: average line length above `avg_line_len` AND whitespace
/// share below `whitespace_ratio`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinifyThresholds {
    pub avg_line_len: f64,
    pub whitespace_ratio: f64,
}

impl Default for MinifyThresholds {
    fn default() -> Self {
        Self {
            avg_line_len: DEFAULT_AVG_LINE_LEN,
            whitespace_ratio: DEFAULT_WHITESPACE_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextShape {
    pub avg_line_len: f64,
    pub whitespace_ratio: f64,
}

pub fn text_shape(s: &str) -> Option<TextShape> {
    let total_chars = s.chars().count();
    if total_chars == 0 {
        return None;
    }
    let mut lines = 0usize;
    let mut line_chars = 0usize;
    for line in s.lines() {
        lines += 1;
        line_chars += line.chars().count();
    }
    if lines == 0 {
        lines = 1;
        line_chars = total_chars;
    }
    let ws = s.chars().filter(|c| c.is_whitespace()).count();
    Some(TextShape {
        avg_line_len: line_chars as f64 / lines as f64,
        whitespace_ratio: ws as f64 / total_chars as f64,
    })
}

pub fn looks_minified(s: &str, t: &MinifyThresholds) -> bool {
    match text_shape(s) {
        Some(shape) => {
            shape.avg_line_len > t.avg_line_len && shape.whitespace_ratio < t.whitespace_ratio
        }
        None => false,
    }
}

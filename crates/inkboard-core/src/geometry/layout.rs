//! Text measurement and word wrapping.

use kurbo::Size;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.25;
/// Ascent as a multiple of the font size.
const ASCENT_FACTOR: f64 = 0.8;
/// Largest font a sticky note auto-fits to.
pub const NOTE_MAX_FONT: f64 = 48.0;
/// Inner padding of sticky notes and labelled shapes.
pub const NOTE_PADDING: f64 = 12.0;

/// Text measurement backend.
pub trait MeasureContext {
    /// Advance width of a single line of `text`.
    fn text_width(&self, text: &str, font_size: f64) -> f64;

    fn line_height(&self, font_size: f64) -> f64 {
        font_size * LINE_HEIGHT_FACTOR
    }
}

/// Font-free measurement from per-character width factors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxMeasure;

impl MeasureContext for ApproxMeasure {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(char_width_factor).sum::<f64>() * font_size
    }
}

fn char_width_factor(ch: char) -> f64 {
    match ch {
        ' ' => 0.3,
        'i' | 'j' | 'l' | 'I' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.28,
        'f' | 't' | 'r' | '(' | ')' | '[' | ']' => 0.36,
        'm' | 'w' => 0.86,
        'M' | 'W' => 0.92,
        'A'..='Z' => 0.66,
        '0'..='9' => 0.56,
        c if c.is_ascii() => 0.55,
        // CJK and other wide glyphs
        c if c as u32 >= 0x2E80 => 1.0,
        _ => 0.6,
    }
}

/// One laid-out line.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub text: String,
    pub width: f64,
    /// Distance from the top of the block to this line's baseline.
    pub baseline: f64,
}

/// Result of laying out a text block.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<LayoutLine>,
    pub font_size: f64,
    pub line_height: f64,
    /// Widest line.
    pub width: f64,
    /// Total block height (at least one line).
    pub height: f64,
}

impl TextLayout {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Lay `text` out, wrapping against `wrap_width` when given.
///
/// Explicit newlines always break. Wrapping is greedy by word; a single
/// word wider than the wrap width is split by character.
pub fn layout_text(
    text: &str,
    font_size: f64,
    wrap_width: Option<f64>,
    measure: &dyn MeasureContext,
) -> TextLayout {
    let line_height = measure.line_height(font_size);
    let mut raw_lines = Vec::new();
    for hard_line in text.split('\n') {
        match wrap_width {
            Some(max) => raw_lines.extend(wrap_line(hard_line, max, font_size, measure)),
            None => raw_lines.push(hard_line.to_string()),
        }
    }
    if raw_lines.is_empty() {
        raw_lines.push(String::new());
    }

    let ascent = font_size * ASCENT_FACTOR + (line_height - font_size) / 2.0;
    let lines: Vec<LayoutLine> = raw_lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| LayoutLine {
            width: measure.text_width(&text, font_size),
            baseline: i as f64 * line_height + ascent,
            text,
        })
        .collect();
    let width = lines.iter().map(|l| l.width).fold(0.0, f64::max);
    let height = lines.len() as f64 * line_height;
    TextLayout {
        lines,
        font_size,
        line_height,
        width,
        height,
    }
}

/// Greedy word wrap of a single hard line.
pub fn wrap_line(line: &str, max_width: f64, font_size: f64, measure: &dyn MeasureContext) -> Vec<String> {
    if measure.text_width(line, font_size) <= max_width {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if measure.text_width(&candidate, font_size) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if measure.text_width(word, font_size) <= max_width {
            current.push_str(word);
        } else {
            let mut pieces = split_word(word, max_width, font_size, measure);
            // The tail keeps accepting following words.
            current = pieces.pop().unwrap_or_default();
            lines.extend(pieces);
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Character-level split of a word that does not fit on one line.
fn split_word(word: &str, max_width: f64, font_size: f64, measure: &dyn MeasureContext) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        current.push(ch);
        if measure.text_width(&current, font_size) > max_width && current.chars().count() > 1 {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Largest font size (whole points, `MIN_FONT_SIZE..=NOTE_MAX_FONT`) whose
/// wrapped layout fits inside `size` minus padding.
pub fn fit_font_size(text: &str, size: Size, measure: &dyn MeasureContext) -> f64 {
    let inner = Size::new(
        (size.width - NOTE_PADDING * 2.0).max(1.0),
        (size.height - NOTE_PADDING * 2.0).max(1.0),
    );
    let min = crate::shapes::MIN_FONT_SIZE;
    let mut font = NOTE_MAX_FONT;
    while font > min {
        let layout = layout_text(text, font, Some(inner.width), measure);
        if layout.height <= inner.height && layout.width <= inner.width {
            return font;
        }
        font -= 1.0;
    }
    min
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is exactly `font_size` wide.
    struct Mono;

    impl MeasureContext for Mono {
        fn text_width(&self, text: &str, font_size: f64) -> f64 {
            text.chars().count() as f64 * font_size
        }
    }

    #[test]
    fn test_short_text_is_not_wrapped() {
        let layout = layout_text("hello", 10.0, Some(100.0), &Mono);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.width, 50.0);
        assert_eq!(layout.height, 12.5);
    }

    #[test]
    fn test_greedy_word_wrap() {
        let lines = wrap_line("aa bb cc dd", 50.0, 10.0, &Mono);
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn test_long_word_splits_by_character() {
        let lines = wrap_line("abcdefgh ij", 30.0, 10.0, &Mono);
        assert_eq!(lines, vec!["abc", "def", "gh", "ij"]);
    }

    #[test]
    fn test_split_tail_accepts_next_word() {
        let lines = wrap_line("abcdefg h", 50.0, 10.0, &Mono);
        assert_eq!(lines, vec!["abcde", "fg h"]);
    }

    #[test]
    fn test_newlines_are_hard_breaks() {
        let layout = layout_text("a\n\nb", 10.0, None, &Mono);
        assert_eq!(layout.lines.len(), 3);
        assert_eq!(layout.lines[1].text, "");
        assert!(layout.lines[2].baseline > layout.lines[1].baseline);
    }

    #[test]
    fn test_empty_text_has_one_line() {
        let layout = layout_text("", 20.0, Some(100.0), &ApproxMeasure);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.height, 25.0);
    }

    #[test]
    fn test_fit_font_size_shrinks_for_long_text() {
        let size = Size::new(200.0, 200.0);
        let short = fit_font_size("hi", size, &ApproxMeasure);
        let long = fit_font_size(&"lorem ipsum dolor ".repeat(20), size, &ApproxMeasure);
        assert_eq!(short, NOTE_MAX_FONT);
        assert!(long < short);
        assert!(long >= crate::shapes::MIN_FONT_SIZE);
    }

    #[test]
    fn test_approx_width_scales_with_font_size() {
        let w16 = ApproxMeasure.text_width("Hello", 16.0);
        let w32 = ApproxMeasure.text_width("Hello", 32.0);
        assert!((w32 - 2.0 * w16).abs() < 1e-9);
    }
}

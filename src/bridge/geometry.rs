//! Bounding geometry repair for exported SVG documents.
//!
//! The map generator computes the root `viewBox` tightly around its content,
//! which clips labels and decoration near the edges. [`repair_bounds`] grows
//! both the physical canvas (`width`/`height`) and the logical view-rectangle
//! outward by a fixed padding without rescaling content.
//!
//! Only the root start tag is rewritten; the rest of the document is carried
//! over byte for byte.
//!
//! # Example
//!
//! ```
//! use fmg_export_bridge::{repair_bounds, BoundsPadding};
//!
//! let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="1200" height="800" viewBox="10 20 300 200"/>"#;
//! let fixed = repair_bounds(svg, BoundsPadding::default()).unwrap();
//!
//! assert!(fixed.contains(r#"width="1480""#));
//! assert!(fixed.contains(r#"viewBox="-130 -120 580 480""#));
//! ```
//!
//! Repair is not idempotent: feeding the output back in pads it again.

// ============================================================================
// Imports
// ============================================================================

use std::ops::Range;

use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default outward padding in user units.
pub const DEFAULT_PADDING: f64 = 140.0;

/// Width assumed when the root declares none.
pub const FALLBACK_WIDTH: f64 = 1200.0;

/// Height assumed when the root declares none.
pub const FALLBACK_HEIGHT: f64 = 800.0;

// ============================================================================
// BoundsPadding
// ============================================================================

/// Padding parameters for [`repair_bounds`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsPadding {
    /// Distance each edge moves outward.
    pub amount: f64,
    /// Width used when `width` is missing, zero or non-numeric.
    pub fallback_width: f64,
    /// Height used when `height` is missing, zero or non-numeric.
    pub fallback_height: f64,
}

impl Default for BoundsPadding {
    fn default() -> Self {
        Self::new(DEFAULT_PADDING)
    }
}

impl BoundsPadding {
    /// Creates a padding with the default fallback canvas (1200 × 800).
    #[inline]
    #[must_use]
    pub const fn new(amount: f64) -> Self {
        Self {
            amount,
            fallback_width: FALLBACK_WIDTH,
            fallback_height: FALLBACK_HEIGHT,
        }
    }
}

// ============================================================================
// ViewBox
// ============================================================================

/// A `viewBox` value: min-x, min-y, width, height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    /// Left edge.
    pub min_x: f64,
    /// Top edge.
    pub min_y: f64,
    /// Logical width.
    pub width: f64,
    /// Logical height.
    pub height: f64,
}

impl ViewBox {
    /// Parses a four-number `viewBox` list (whitespace and/or comma separated).
    ///
    /// Returns `None` unless the value holds exactly four finite numbers.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let mut numbers = value
            .split(|c: char| c.is_ascii_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<f64>().ok().filter(|n| n.is_finite()));

        let view_box = Self {
            min_x: numbers.next()??,
            min_y: numbers.next()??,
            width: numbers.next()??,
            height: numbers.next()??,
        };

        numbers.next().is_none().then_some(view_box)
    }

    /// Moves every edge outward by `padding`.
    #[inline]
    #[must_use]
    pub fn expand(self, padding: f64) -> Self {
        Self {
            min_x: self.min_x - padding,
            min_y: self.min_y - padding,
            width: self.width + padding * 2.0,
            height: self.height + padding * 2.0,
        }
    }

    /// Formats the value as `min-x min-y width height`.
    #[must_use]
    pub fn to_attribute(self) -> String {
        format!(
            "{} {} {} {}",
            format_number(self.min_x),
            format_number(self.min_y),
            format_number(self.width),
            format_number(self.height)
        )
    }
}

// ============================================================================
// Repair
// ============================================================================

/// Pads the root bounds of an SVG document.
///
/// 1. `width`/`height` become the declared (or fallback) size plus twice the padding.
/// 2. An existing `viewBox` is moved out by the padding on every side.
/// 3. A missing `viewBox` is synthesized at `-padding, -padding` with the padded size.
///
/// # Errors
///
/// Returns [`Error::MalformedDocument`] if `svg` is not well-formed markup.
pub fn repair_bounds(svg: &str, padding: BoundsPadding) -> Result<String> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(svg, options)
        .map_err(|e| Error::malformed_document(e.to_string()))?;
    let root = doc.root_element();

    let declared_width = root.attribute("width").and_then(parse_length);
    let declared_height = root.attribute("height").and_then(parse_length);
    let width = declared_width.unwrap_or(padding.fallback_width);
    let height = declared_height.unwrap_or(padding.fallback_height);

    let padded_width = width + padding.amount * 2.0;
    let padded_height = height + padding.amount * 2.0;

    let view_box = match root.attribute("viewBox").and_then(ViewBox::parse) {
        Some(declared) => declared.expand(padding.amount),
        None => ViewBox {
            min_x: -padding.amount,
            min_y: -padding.amount,
            width: padded_width,
            height: padded_height,
        },
    };

    debug!(
        root = root.tag_name().name(),
        width,
        height,
        padding = padding.amount,
        "Repairing document bounds"
    );

    let mut rewriter = StartTagRewriter::new(svg, root);
    rewriter.set("width", format_number(padded_width));
    rewriter.set("height", format_number(padded_height));
    rewriter.set("viewBox", view_box.to_attribute());

    Ok(rewriter.finish())
}

// ============================================================================
// StartTagRewriter
// ============================================================================

/// Collects attribute edits on one element's start tag and splices them into
/// the source text.
struct StartTagRewriter<'a, 'input> {
    source: &'input str,
    node: Node<'a, 'input>,
    /// Byte offset where new attributes are appended.
    insert_at: usize,
    edits: Vec<(Range<usize>, String)>,
}

impl<'a, 'input> StartTagRewriter<'a, 'input> {
    fn new(source: &'input str, node: Node<'a, 'input>) -> Self {
        let insert_at = start_tag_insert_point(source, node.range().start);
        Self {
            source,
            node,
            insert_at,
            edits: Vec::new(),
        }
    }

    /// Replaces the value of an unprefixed attribute, or appends it.
    fn set(&mut self, name: &str, value: String) {
        let existing = self
            .node
            .attributes()
            .find(|attr| attr.name() == name && attr.namespace().is_none());

        match existing {
            Some(attr) => {
                trace!(name, value = %value, "Replacing attribute");
                self.edits.push((attr.range_value(), value));
            }
            None => {
                trace!(name, value = %value, "Appending attribute");
                let at = self.insert_at;
                self.edits.push((at..at, format!(" {name}=\"{value}\"")));
            }
        }
    }

    fn finish(mut self) -> String {
        // Stable: appended attributes keep their call order.
        self.edits.sort_by_key(|(range, _)| range.start);

        let mut out = String::with_capacity(self.source.len() + 64);
        let mut cursor = 0;
        for (range, replacement) in self.edits {
            out.push_str(&self.source[cursor..range.start]);
            out.push_str(&replacement);
            cursor = range.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}

/// Returns the offset just before `>` or `/>` closing the start tag at `tag_start`.
fn start_tag_insert_point(source: &str, tag_start: usize) -> usize {
    let bytes = source.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = tag_start;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' if i > tag_start && bytes[i - 1] == b'/' => return i - 1,
                b'>' => return i,
                _ => {}
            },
        }
        i += 1;
    }

    bytes.len()
}

// ============================================================================
// Number Handling
// ============================================================================

/// Reads a length attribute the way a lenient float parser does: the longest
/// numeric prefix counts (`"800px"` → 800), and zero or garbage yields `None`.
fn parse_length(value: &str) -> Option<f64> {
    parse_float_prefix(value).filter(|n| *n != 0.0 && n.is_finite())
}

/// Parses the longest leading decimal number, skipping leading whitespace.
fn parse_float_prefix(value: &str) -> Option<f64> {
    let s = value.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// Formats a number the way ECMAScript `Number.prototype.toString` does.
///
/// Plain notation for decimal exponents in `-6..21`, exponent notation
/// (`1e+21`, `1.5e-7`) outside it, and no negative zero.
fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }

    // Shortest round-trip digits and their decimal exponent.
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let n = exponent.parse::<i32>().unwrap_or(0) + 1;

    let body = if k <= n && n <= 21 {
        format!("{digits}{}", "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        format!("{int}.{frac}")
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat(n.unsigned_abs() as usize))
    } else {
        let exp_sign = if n > 0 { '+' } else { '-' };
        let exp = (n - 1).unsigned_abs();
        match digits.split_at(1) {
            (lead, "") => format!("{lead}e{exp_sign}{exp}"),
            (lead, rest) => format!("{lead}.{rest}e{exp_sign}{exp}"),
        }
    };

    if value < 0.0 {
        format!("-{body}")
    } else {
        body
    }
}

// ============================================================================
// Tests
// ============================================================================

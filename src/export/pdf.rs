//! PDF encoding via `printpdf` built-in fonts.
//!
//! Built-in fonts only carry the WinAnsi character set. Text outside it is
//! rejected with `UnsupportedCharacter` rather than silently replaced, so
//! the caller can fall back to the lossless plain-text format.

use std::io::BufWriter;

use printpdf::lopdf::{self, Object, StringFormat};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

use super::layout::{Layout, LineStyle};
use super::RenderError;
use crate::models::ArtifactFormat;
use crate::report::Report;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const MARGIN_RIGHT: f32 = 20.0;
/// Usable line width in mm.
pub(crate) const BODY_WIDTH: f32 = PAGE_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
const HEADER_Y: f32 = 282.0;
const BODY_TOP: f32 = 272.0;
const BODY_BOTTOM: f32 = 20.0;
const FOOTER_Y: f32 = 12.0;
const MAX_PITCH: f32 = 4.5;
const PT_TO_MM: f32 = 25.4 / 72.0;

/// Encode a laid-out report. Metadata dates and both trailer ids are pinned
/// to the report, so equal reports encode to identical bytes.
pub fn encode(layout: &Layout, report: &Report, digest: &str) -> Result<Vec<u8>, RenderError> {
    check_encodable(layout)?;

    let stamp = time::OffsetDateTime::from_unix_timestamp(report.generated_at.timestamp())
        .map_err(|e| RenderError::Backend(format!("PDF date error: {e}")))?;

    let (doc, page1, layer1) = PdfDocument::new(
        &layout.title,
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Page 1",
    );
    let document_id: String = digest.chars().take(32).collect();
    let doc = doc
        .with_document_id(document_id)
        .with_creation_date(stamp)
        .with_mod_date(stamp);

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Backend(format!("PDF font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Backend(format!("PDF font error: {e}")))?;

    let budget = layout
        .pages
        .iter()
        .map(|p| p.lines.len())
        .max()
        .unwrap_or(1)
        .max(1);
    let pitch = MAX_PITCH.min((BODY_TOP - BODY_BOTTOM) / budget as f32);
    let total = layout.page_count();

    for page in &layout.pages {
        let layer = if page.number == 1 {
            doc.get_page(page1).get_layer(layer1)
        } else {
            let (p, l) = doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Page {}", page.number),
            );
            doc.get_page(p).get_layer(l)
        };

        draw_page_frame(&layer, layout, page.number, total, &font);

        let mut y = BODY_TOP;
        for line in &page.lines {
            if !line.text.is_empty() {
                let face = match line.style {
                    LineStyle::Title | LineStyle::Heading => &bold,
                    LineStyle::Body | LineStyle::Fine => &font,
                };
                let size = font_size(line.style);
                layer.use_text(line.text.as_str(), size, Mm(MARGIN_LEFT), Mm(y), face);
            }
            y -= pitch;
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| RenderError::Backend(format!("PDF save error: {e}")))?;
    let bytes = buf
        .into_inner()
        .map_err(|e| RenderError::Backend(format!("PDF buffer error: {e}")))?;
    pin_trailer_id(&bytes, digest)
}

/// printpdf writes a random id pair into the trailer on every save. Both
/// entries are replaced with halves of the content digest.
fn pin_trailer_id(bytes: &[u8], digest: &str) -> Result<Vec<u8>, RenderError> {
    let mut raw = lopdf::Document::load_mem(bytes)
        .map_err(|e| RenderError::Backend(format!("PDF reload error: {e}")))?;

    let (first, second) = digest.split_at(digest.len() / 2);
    raw.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(first.as_bytes().to_vec(), StringFormat::Literal),
            Object::String(second.as_bytes().to_vec(), StringFormat::Literal),
        ]),
    );

    let mut out = Vec::new();
    raw.save_to(&mut out)
        .map_err(|e| RenderError::Backend(format!("PDF save error: {e}")))?;
    Ok(out)
}

fn font_size(style: LineStyle) -> f32 {
    match style {
        LineStyle::Title => 14.0,
        LineStyle::Heading => 11.0,
        LineStyle::Body => 9.0,
        LineStyle::Fine => 7.0,
    }
}

/// Whether `text` drawn in regular Helvetica at the size of `style` fits
/// the body width.
pub(crate) fn fits_body(text: &str, style: LineStyle) -> bool {
    let em: u32 = text.chars().map(helvetica_advance).sum();
    em as f32 / 1000.0 * font_size(style) * PT_TO_MM <= BODY_WIDTH
}

/// Helvetica advance widths in 1/1000 em (standard AFM metrics). Characters
/// outside printable ASCII are measured at the widest glyph.
fn helvetica_advance(c: char) -> u32 {
    match c {
        ' ' | '!' | ',' | '.' | '/' | ':' | ';' | '[' | '\\' | ']' | 'I' | 'f' | 't' => 278,
        'i' | 'j' | 'l' => 222,
        '\'' => 191,
        '"' => 355,
        '#' | '$' | '0'..='9' | '?' | '_' | 'L' | 'a' | 'b' | 'd' | 'e' | 'g' | 'h' | 'n'
        | 'o' | 'p' | 'q' | 'u' => 556,
        '%' => 889,
        '&' | 'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' => 667,
        '(' | ')' | '-' | '`' | 'r' => 333,
        '*' => 389,
        '+' | '<' | '=' | '>' | '~' => 584,
        '@' => 1015,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' | 'w' => 722,
        'F' | 'T' | 'Z' => 611,
        'G' | 'O' | 'Q' => 778,
        'J' | 'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' => 500,
        'M' | 'm' => 833,
        'W' => 944,
        '^' => 469,
        '{' | '}' => 334,
        '|' => 260,
        _ => 1015,
    }
}

fn draw_page_frame(
    layer: &PdfLayerReference,
    layout: &Layout,
    number: usize,
    total: usize,
    font: &IndirectFontRef,
) {
    layer.use_text(layout.stamp.as_str(), 8.0, Mm(MARGIN_LEFT), Mm(HEADER_Y), font);
    layer.use_text(
        format!("Page {number} of {total}"),
        8.0,
        Mm(MARGIN_LEFT),
        Mm(FOOTER_Y),
        font,
    );
}

fn check_encodable(layout: &Layout) -> Result<(), RenderError> {
    let texts = std::iter::once(layout.title.as_str())
        .chain(std::iter::once(layout.stamp.as_str()))
        .chain(layout.lines().map(|l| l.text.as_str()));

    for text in texts {
        if let Some(ch) = text.chars().find(|c| !is_winansi(*c)) {
            return Err(RenderError::UnsupportedCharacter {
                ch,
                context: text.chars().take(40).collect(),
                format: ArtifactFormat::Pdf,
            });
        }
    }
    Ok(())
}

/// Characters representable in WinAnsiEncoding (Windows-1252).
pub(crate) fn is_winansi(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{A0}'..='\u{FF}')
        || matches!(
            c,
            '€' | '‚' | 'ƒ' | '„' | '…' | '†' | '‡' | 'ˆ' | '‰' | 'Š' | '‹' | 'Œ' | 'Ž'
                | '‘' | '’' | '“' | '”' | '•' | '–' | '—' | '˜' | '™' | 'š' | '›' | 'œ'
                | 'ž' | 'Ÿ'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winansi_accepts_latin1_and_typographic_punctuation() {
        for c in ['a', 'é', 'ß', '²', '–', '€', '“', ' '] {
            assert!(is_winansi(c), "{c:?}");
        }
    }

    #[test]
    fn wide_glyphs_fill_the_body_sooner() {
        let caps = "M".repeat(80);
        let lower = "i".repeat(80);
        assert!(!fits_body(&caps, LineStyle::Body));
        assert!(fits_body(&lower, LineStyle::Body));
        // 'M' is 833/1000 em: 2.645mm at 9pt, 64 per 170mm line
        assert!(fits_body(&"M".repeat(64), LineStyle::Body));
        assert!(!fits_body(&"M".repeat(65), LineStyle::Body));
    }

    #[test]
    fn fine_print_fits_more_per_line() {
        let caps = "M".repeat(70);
        assert!(!fits_body(&caps, LineStyle::Body));
        assert!(fits_body(&caps, LineStyle::Fine));
    }

    #[test]
    fn winansi_rejects_other_scripts_and_controls() {
        for c in ['≥', 'Ж', '中', '\u{1F600}', '\t', '\u{7F}'] {
            assert!(!is_winansi(c), "{c:?}");
        }
    }
}

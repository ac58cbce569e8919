//! Fixed pagination shared by every artifact format.
//!
//! A report document is flattened into wrapped lines of at most
//! `wrap_width` characters; PDF lines are additionally wrapped to the
//! measured width of the page body. Pages hold at most `line_budget`
//! lines. Long advice overflows onto further pages and is never cut. The
//! generation stamp is kept apart from the page lines so it can be drawn on
//! every page without entering the content digest.

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{pdf, RenderError};
use crate::models::ArtifactFormat;
use crate::report::{Report, ReportDocument};

/// Lines per page that fit the A4 body area at the default pitch.
pub const DEFAULT_LINE_BUDGET: usize = 56;
pub const DEFAULT_WRAP_WIDTH: usize = 90;
const MIN_WRAP_WIDTH: usize = 20;
const CONTINUATION_INDENT: &str = "  ";
/// Built-in PDF fonts have no tab glyph.
const PDF_TAB: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOptions {
    pub line_budget: usize,
    pub wrap_width: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            line_budget: DEFAULT_LINE_BUDGET,
            wrap_width: DEFAULT_WRAP_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineStyle {
    Title,
    Heading,
    Body,
    Fine,
}

impl LineStyle {
    fn tag(&self) -> &'static str {
        match self {
            Self::Title => "T",
            Self::Heading => "H",
            Self::Body => "B",
            Self::Fine => "F",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    pub style: LineStyle,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub number: usize,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub title: String,
    /// Generation time, drawn on every page, excluded from the digest.
    pub stamp: String,
    pub pages: Vec<Page>,
}

impl Layout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.pages.iter().flat_map(|p| p.lines.iter())
    }

    /// SHA-256 over the format and every page line, hex encoded.
    pub fn digest(&self, format: ArtifactFormat) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.title.as_bytes());
        for page in &self.pages {
            hasher.update(b"\x0c");
            for line in &page.lines {
                hasher.update(line.style.tag().as_bytes());
                hasher.update(b" ");
                hasher.update(line.text.as_bytes());
                hasher.update(b"\n");
            }
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

pub fn generation_stamp(report: &Report) -> String {
    format!(
        "Generated on: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

/// Flatten and paginate a report for `format`.
pub fn lay_out(
    report: &Report,
    format: ArtifactFormat,
    options: &LayoutOptions,
) -> Result<Layout, RenderError> {
    if options.line_budget == 0 {
        return Err(RenderError::InvalidOptions(
            "line budget must be at least 1".into(),
        ));
    }
    if options.wrap_width < MIN_WRAP_WIDTH {
        return Err(RenderError::InvalidOptions(format!(
            "wrap width must be at least {MIN_WRAP_WIDTH}"
        )));
    }

    let document = report.document();
    let lines = flatten(&document, format, options.wrap_width);

    let pages = lines
        .chunks(options.line_budget)
        .enumerate()
        .map(|(i, chunk)| Page {
            number: i + 1,
            lines: chunk.to_vec(),
        })
        .collect();

    Ok(Layout {
        title: document.title,
        stamp: generation_stamp(report),
        pages,
    })
}

fn flatten(document: &ReportDocument, format: ArtifactFormat, width: usize) -> Vec<Line> {
    let mut lines = vec![
        Line {
            style: LineStyle::Title,
            text: document.title.clone(),
        },
        blank(),
    ];

    for (i, section) in document.sections.iter().enumerate() {
        if i > 0 {
            lines.push(blank());
        }
        let style = if section.heading == "Disclaimer" {
            LineStyle::Fine
        } else {
            LineStyle::Body
        };
        lines.push(Line {
            style: LineStyle::Heading,
            text: section.heading.clone(),
        });
        for entry in &section.entries {
            let text = match &entry.label {
                Some(label) => format!("{label}: {}", entry.text),
                None => entry.text.clone(),
            };
            // Measured against the indented form so continuation lines fit too
            let max_chars = width - CONTINUATION_INDENT.len();
            let wrapped = match format {
                ArtifactFormat::Text => wrap_text(&text, max_chars),
                ArtifactFormat::Pdf => {
                    let text = text.replace('\t', PDF_TAB);
                    wrap_by(&text, |candidate| {
                        candidate.chars().count() <= max_chars
                            && pdf::fits_body(&format!("{CONTINUATION_INDENT}{candidate}"), style)
                    })
                }
            };
            for (n, piece) in wrapped.into_iter().enumerate() {
                let text = if n == 0 {
                    piece
                } else {
                    format!("{CONTINUATION_INDENT}{piece}")
                };
                lines.push(Line { style, text });
            }
        }
    }
    lines
}

fn blank() -> Line {
    Line {
        style: LineStyle::Body,
        text: String::new(),
    }
}

/// Word-wrap by character count.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    wrap_by(text, |candidate| candidate.chars().count() <= max_chars)
}

/// Word-wrap with `fits` deciding whether a candidate line is short enough.
///
/// Explicit newlines start new lines and blank paragraphs are kept.
/// Whitespace inside a line is kept as written; a run of whitespace where
/// the line breaks is replaced by the break. Words that do not fit alone are
/// split so no line overflows, at least one character per line.
pub fn wrap_by(text: &str, fits: impl Fn(&str) -> bool) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let start = lines.len();
        let mut current = String::new();
        let mut gap = "";

        for (is_space, token) in tokens(paragraph) {
            if is_space {
                gap = token;
                continue;
            }
            let candidate = format!("{current}{gap}{token}");
            if fits(&candidate) {
                current = candidate;
            } else {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let mut rest = token;
                while !rest.is_empty() && !fits(rest) {
                    let cut = fitting_prefix(rest, &fits);
                    lines.push(rest[..cut].to_string());
                    rest = &rest[cut..];
                }
                current = rest.to_string();
            }
            gap = "";
        }
        if !current.is_empty() || lines.len() == start {
            lines.push(current);
        }
    }
    lines
}

/// Split into alternating whitespace and word runs, flagging whitespace.
fn tokens(paragraph: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut in_space = None;
    for (i, c) in paragraph.char_indices() {
        let space = c.is_whitespace();
        match in_space {
            Some(prev) if prev != space => {
                runs.push((prev, &paragraph[start..i]));
                start = i;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if let Some(space) = in_space {
        runs.push((space, &paragraph[start..]));
    }
    runs
}

/// Byte length of the longest prefix of `word` that fits, never less than
/// one character.
fn fitting_prefix(word: &str, fits: &impl Fn(&str) -> bool) -> usize {
    let mut cut = 0;
    for (i, c) in word.char_indices() {
        let end = i + c.len_utf8();
        if cut > 0 && !fits(&word[..end]) {
            break;
        }
        cut = end;
    }
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text() {
        let text = "This is a long sentence that should be wrapped at around forty characters or so.";
        let lines = wrap_text(text, 40);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.chars().count() <= 40);
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_wrap_text_short() {
        let lines = wrap_text("Short", 40);
        assert_eq!(lines, vec!["Short".to_string()]);
    }

    #[test]
    fn test_wrap_text_empty() {
        let lines = wrap_text("", 40);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn wrap_counts_characters_not_bytes() {
        let text = "ééééé ééééé";
        assert_eq!(wrap_text(text, 11), vec![text.to_string()]);
        assert_eq!(wrap_text(text, 10).len(), 2);
    }

    #[test]
    fn wrap_splits_overlong_words_without_loss() {
        let word = "x".repeat(25);
        let lines = wrap_text(&format!("a {word} b"), 10);
        assert_eq!(lines, vec!["a", "xxxxxxxxxx", "xxxxxxxxxx", "xxxxx b"]);
    }

    #[test]
    fn wrap_keeps_explicit_paragraphs() {
        let lines = wrap_text("first\nsecond", 40);
        assert_eq!(lines, vec!["first", "second"]);
        let lines = wrap_text("first\n\nsecond", 40);
        assert_eq!(lines, vec!["first", "", "second"]);
    }

    #[test]
    fn wrap_keeps_interior_whitespace() {
        let text = "Step 1:\tweigh daily.  Then  log it";
        assert_eq!(wrap_text(text, 40), vec![text.to_string()]);

        // The run at the break point is consumed by the break
        let lines = wrap_text("alpha   beta\tgamma", 12);
        assert_eq!(lines, vec!["alpha   beta", "gamma"]);
    }

    #[test]
    fn wrap_by_measures_with_the_given_predicate() {
        let narrow = |s: &str| s.chars().filter(|c| *c == 'W').count() <= 2;
        let lines = wrap_by("aW bW cW dW", narrow);
        assert_eq!(lines, vec!["aW bW", "cW dW"]);
    }
}

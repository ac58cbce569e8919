//! Paginated UTF-8 plain text. Lossless for any advice text; pages are
//! separated by a form feed.

use super::layout::{Layout, LineStyle};

pub fn encode(layout: &Layout) -> Vec<u8> {
    let total = layout.page_count();
    let mut out = String::new();

    for page in &layout.pages {
        if page.number > 1 {
            out.push('\u{0C}');
        }
        out.push_str(&format!("{} | Page {} of {}\n", layout.title, page.number, total));
        out.push_str(&layout.stamp);
        out.push_str("\n\n");

        for line in &page.lines {
            match line.style {
                LineStyle::Title => {
                    out.push_str(&line.text.to_uppercase());
                    out.push('\n');
                    out.push_str(&"=".repeat(line.text.chars().count()));
                }
                LineStyle::Heading => {
                    out.push_str(&line.text.to_uppercase());
                }
                LineStyle::Body | LineStyle::Fine => out.push_str(&line.text),
            }
            out.push('\n');
        }
    }

    out.into_bytes()
}

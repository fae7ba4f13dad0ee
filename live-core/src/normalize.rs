//! Detail page cleanup: body extraction and markup normalization.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// Element holding the post body on the mobile detail page.
pub const CONTENT_SELECTOR: &str = ".thum-txtin";

const KEEP_WHEN_EMPTY: [&str; 10] = [
    "img", "iframe", "br", "video", "audio", "source", "track", "embed", "object", "picture",
];

const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContent {
    pub html: String,
    pub text: String,
}

fn body_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<body[^>]*>.*</body>").expect("valid body pattern"))
}

fn break_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(?:<br(?:\s*/)?>\s*){2,}").expect("valid break pattern"))
}

fn content_selector() -> Option<&'static Selector> {
    static SELECTOR: OnceLock<Option<Selector>> = OnceLock::new();
    SELECTOR
        .get_or_init(|| Selector::parse(CONTENT_SELECTOR).ok())
        .as_ref()
}

/// The `<body>...</body>` fragment of a document, if any.
pub fn extract_body(document: &str) -> Option<&str> {
    body_pattern().find(document).map(|m| m.as_str())
}

/// Extracts and cleans the post body. `None` means the response did not
/// have the expected structure.
pub fn normalize_detail(document: &str) -> Option<NormalizedContent> {
    let body = extract_body(document)?;
    let parsed = Html::parse_document(body);
    let content = parsed.select(content_selector()?).next()?;

    let mut html = String::new();
    write_children(content, &mut html);
    let html = break_run_pattern().replace_all(&html, "<br>").trim().to_owned();

    let text = content.text().collect::<String>().trim().to_owned();
    Some(NormalizedContent { html, text })
}

fn write_children(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        if let Some(element) = ElementRef::wrap(child) {
            write_element(element, out);
        } else if let Node::Text(text) = child.value() {
            escape_into(text, false, out);
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    if is_strippable_empty(element) || is_break_only_paragraph(element) {
        return;
    }

    let name = element.value().name();
    if name == "img" {
        let src = element
            .value()
            .attr("data-original")
            .or_else(|| element.value().attr("src"))
            .unwrap_or_default();
        out.push_str("<img src=\"");
        escape_into(src, true, out);
        out.push_str("\">");
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    write_children(element, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Same rule as CSS `:empty`: only comments may be inside.
fn is_strippable_empty(element: ElementRef<'_>) -> bool {
    !KEEP_WHEN_EMPTY.contains(&element.value().name())
        && element
            .children()
            .all(|child| matches!(child.value(), Node::Comment(_)))
}

fn is_break_only_paragraph(element: ElementRef<'_>) -> bool {
    if element.value().name() != "p" {
        return false;
    }
    let mut elements = element.children().filter_map(ElementRef::wrap);
    let only_break = matches!(
        (elements.next(), elements.next()),
        (Some(first), None) if first.value().name() == "br"
    );
    only_break
        && element.children().all(|child| match child.value() {
            Node::Text(text) => text.trim().is_empty(),
            _ => true,
        })
}

fn escape_into(raw: &str, attribute: bool, out: &mut String) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

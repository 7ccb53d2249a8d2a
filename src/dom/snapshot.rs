use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Serialized DOM of a page at one point in time.
///
/// Only the HTML string is stored; parsing happens inside the synchronous
/// extraction functions, so a snapshot can be held across `.await` points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    html: String,
}

impl PageSnapshot {
    pub fn parse(html: &str) -> Self {
        Self {
            html: html.to_string(),
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Number of elements matching `selector`. Invalid selectors match nothing.
    pub fn count(&self, selector: &str) -> usize {
        match parse_selector(selector) {
            Some(sel) => self.document().select(&sel).count(),
            None => 0,
        }
    }

    /// Title attribute, else trimmed text, of the first non-blank match.
    pub fn first_title_or_text(&self, selector: &str) -> Option<String> {
        let sel = parse_selector(selector)?;
        let document = self.document();
        let first = document.select(&sel).next()?;
        let value = title_or_text(first);
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

pub fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!(selector, error = ?e, "ignoring unparsable selector");
            None
        }
    }
}

/// Concatenated descendant text, like the DOM's `textContent`.
pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

pub fn trimmed_text(element: ElementRef<'_>) -> String {
    text_content(element).trim().to_string()
}

/// Non-empty `title` attribute, falling back to the trimmed text.
pub fn title_or_text(element: ElementRef<'_>) -> String {
    match element.value().attr("title") {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => trimmed_text(element),
    }
}

/// Substring test on the raw `class` attribute.
pub fn class_contains(element: ElementRef<'_>, fragment: &str) -> bool {
    element
        .value()
        .attr("class")
        .map(|c| c.contains(fragment))
        .unwrap_or(false)
}

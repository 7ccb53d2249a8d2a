use crate::core::SelectorTable;
use crate::dom::snapshot::{class_contains, parse_selector, text_content, trimmed_text};
use crate::dom::PageSnapshot;
use crate::types::MessageRecord;
use regex::Regex;
use scraper::ElementRef;
use std::sync::OnceLock;

pub const SENDER_ME: &str = "Me";
pub const SENDER_CONTACT: &str = "Contact";
pub const SENDER_UNKNOWN: &str = "Unknown";

/// `data-pre-plain-text` looks like `[10:32, 18/10/2026] Alice: `.
fn meta_pattern() -> &'static Regex {
    static META: OnceLock<Regex> = OnceLock::new();
    META.get_or_init(|| Regex::new(r"\[(.*?)\]\s*(.*?):").expect("static regex"))
}

/// Projects the open conversation pane into [`MessageRecord`] values.
pub struct MessageExtractor<'a> {
    selectors: &'a SelectorTable,
}

impl<'a> MessageExtractor<'a> {
    pub fn new(selectors: &'a SelectorTable) -> Self {
        Self { selectors }
    }

    /// The most recent `limit` text-bearing rows, oldest first.
    ///
    /// Every row candidate is evaluated and the one with the most matches is
    /// used: row markup differs between WhatsApp Web versions and picking a
    /// narrower match would silently drop history.
    pub fn extract(&self, snapshot: &PageSnapshot, limit: usize) -> Vec<MessageRecord> {
        let document = snapshot.document();

        let Some(pane) = parse_selector(&self.selectors.conversation_pane)
            .and_then(|sel| document.select(&sel).next())
        else {
            return vec![];
        };

        let mut rows: Vec<ElementRef<'_>> = vec![];
        for sel in self.selectors.message_rows.iter().filter_map(parse_selector) {
            let found: Vec<_> = pane.select(&sel).collect();
            if found.len() > rows.len() {
                rows = found;
            }
        }

        let has_text = parse_selector(&self.selectors.message_has_text);
        let rows: Vec<_> = rows
            .into_iter()
            .filter(|row| {
                has_text
                    .as_ref()
                    .map(|sel| row.select(sel).next().is_some())
                    .unwrap_or(false)
                    && !trimmed_text(*row).is_empty()
            })
            .collect();

        let skip = rows.len().saturating_sub(limit);
        rows.into_iter()
            .skip(skip)
            .map(|row| self.record(row))
            .collect()
    }

    fn record(&self, row: ElementRef<'_>) -> MessageRecord {
        // The dedicated text node wins even when empty; the span fallback
        // only applies to rows that lack it.
        let content = self
            .first_text(row, &self.selectors.message_text)
            .or_else(|| self.first_text(row, &self.selectors.message_fallback_text))
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| trimmed_text(row));

        let (timestamp, mut sender) = self.metadata(row).unwrap_or_default();

        if sender.is_empty() {
            sender = self.sender_from_markers(row).to_string();
        }

        MessageRecord {
            sender,
            content,
            timestamp,
        }
    }

    fn first_text(&self, row: ElementRef<'_>, selector: &str) -> Option<String> {
        let sel = parse_selector(selector)?;
        row.select(&sel)
            .next()
            .map(|el| text_content(el).trim().to_string())
    }

    fn metadata(&self, row: ElementRef<'_>) -> Option<(String, String)> {
        let sel = parse_selector(&self.selectors.message_meta)?;
        let meta = row
            .select(&sel)
            .next()?
            .value()
            .attr(&self.selectors.message_meta_attribute)?;
        let caps = meta_pattern().captures(meta)?;
        Some((caps[1].to_string(), caps[2].to_string()))
    }

    fn sender_from_markers(&self, row: ElementRef<'_>) -> &'static str {
        let marked = |fragment: &str| {
            class_contains(row, fragment)
                || parse_selector(&format!(".{}", fragment))
                    .map(|sel| row.select(&sel).next().is_some())
                    .unwrap_or(false)
        };

        if marked(&self.selectors.outgoing_marker) {
            SENDER_ME
        } else if marked(&self.selectors.incoming_marker) {
            SENDER_CONTACT
        } else {
            SENDER_UNKNOWN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{self, FixtureMessage};

    fn extract(html: &str, limit: usize) -> Vec<MessageRecord> {
        let table = SelectorTable::default();
        MessageExtractor::new(&table).extract(&PageSnapshot::parse(html), limit)
    }

    fn page_with(messages: &[FixtureMessage]) -> String {
        fixtures::logged_in_page(
            &[("Alice", "")],
            Some(&fixtures::conversation("Alice", messages)),
        )
    }

    fn numbered(n: usize) -> Vec<FixtureMessage> {
        (0..n)
            .map(|i| {
                FixtureMessage::incoming("Alice", &format!("10:{:02}", i), &format!("msg {}", i))
            })
            .collect()
    }

    #[test]
    fn keeps_the_most_recent_in_chronological_order() {
        let records = extract(&page_with(&numbered(8)), 3);
        let contents: Vec<_> = records.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 5", "msg 6", "msg 7"]);
    }

    #[test]
    fn never_returns_more_than_available() {
        let records = extract(&page_with(&numbered(2)), 5);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn never_returns_more_than_limit() {
        for limit in 0..6 {
            assert!(extract(&page_with(&numbered(4)), limit).len() <= limit);
        }
    }

    #[test]
    fn metadata_gives_sender_and_timestamp() {
        let html = page_with(&[
            FixtureMessage::incoming("Alice", "09:15, 18/10/2026", "hello"),
            FixtureMessage::outgoing("You", "09:16, 18/10/2026", "hi back"),
        ]);
        let records = extract(&html, 10);
        assert_eq!(
            records,
            vec![
                MessageRecord {
                    sender: "Alice".to_string(),
                    content: "hello".to_string(),
                    timestamp: "09:15, 18/10/2026".to_string(),
                },
                MessageRecord {
                    sender: "You".to_string(),
                    content: "hi back".to_string(),
                    timestamp: "09:16, 18/10/2026".to_string(),
                },
            ]
        );
    }

    #[test]
    fn class_markers_stand_in_for_missing_metadata() {
        let html = r#"<html><body><div id="main">
            <div role="row"><div class="message-out">
                <span class="selectable-text">sent</span>
            </div></div>
            <div role="row"><div class="message-in">
                <span class="selectable-text">received</span>
            </div></div>
            <div role="row"><div><span>system notice</span></div></div>
        </div></body></html>"#;
        let senders: Vec<_> = extract(html, 10)
            .into_iter()
            .map(|r| (r.sender, r.timestamp))
            .collect();
        assert_eq!(
            senders,
            vec![
                ("Me".to_string(), String::new()),
                ("Contact".to_string(), String::new()),
                ("Unknown".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn candidate_with_most_rows_wins() {
        // Only two rows carry role="row", but four carry the message classes.
        let html = r#"<html><body><div id="main">
            <div role="row"><div class="message-in"><span>a</span></div></div>
            <div class="message-in"><span>b</span></div>
            <div class="message-in"><span>c</span></div>
            <div role="row"><div class="message-in"><span>d</span></div></div>
        </div></body></html>"#;
        let contents: Vec<_> = extract(html, 10).into_iter().map(|r| r.content).collect();
        assert_eq!(contents, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn rows_without_text_are_dropped() {
        let html = r#"<html><body><div id="main">
            <div role="row"><div class="message-in"><img src="sticker.webp"></div></div>
            <div role="row"><div class="message-in"><span>   </span></div></div>
            <div role="row"><div class="message-in"><span>kept</span></div></div>
        </div></body></html>"#;
        let records = extract(html, 10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "kept");
    }

    #[test]
    fn empty_text_node_falls_back_to_row_text() {
        let html = r#"<html><body><div id="main">
            <div role="row"><div class="message-in">
                <span class="selectable-text"></span><div>raw body 10:01</div>
            </div></div>
        </div></body></html>"#;
        let records = extract(html, 10);
        assert_eq!(records[0].content, "raw body 10:01");
    }

    #[test]
    fn empty_text_node_skips_the_span_fallback() {
        let html = concat!(
            r#"<html><body><div id="main"><div role="row">"#,
            r#"<div class="selectable-text"></div><span>10:01</span><div>real body</div>"#,
            r#"</div></div></body></html>"#,
        );
        let records = extract(html, 10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "10:01real body");
    }

    #[test]
    fn span_fallback_applies_without_a_text_node() {
        let html = r#"<html><body><div id="main">
            <div role="row"><div class="message-in">
                <span>via span</span><div>extra</div>
            </div></div>
        </div></body></html>"#;
        assert_eq!(extract(html, 10)[0].content, "via span");
    }

    #[test]
    fn missing_pane_is_empty_not_error() {
        let html = fixtures::logged_in_page(&[("Alice", "hi")], None);
        assert!(extract(&html, 10).is_empty());
    }
}

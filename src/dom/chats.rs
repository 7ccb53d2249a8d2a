use crate::core::SelectorTable;
use crate::dom::snapshot::{parse_selector, title_or_text, trimmed_text};
use crate::dom::PageSnapshot;
use crate::types::{ChatSummary, UNKNOWN_TITLE};

/// Longer texts in a chat row are not a preview (usually a whole draft or
/// a concatenated container).
pub const PREVIEW_MAX_CHARS: usize = 200;

/// Projects the rendered chat sidebar into [`ChatSummary`] records.
pub struct ChatListExtractor<'a> {
    selectors: &'a SelectorTable,
}

impl<'a> ChatListExtractor<'a> {
    pub fn new(selectors: &'a SelectorTable) -> Self {
        Self { selectors }
    }

    /// Up to `limit` rows in document order, which is the sidebar's own
    /// recency order. Returns the single "no chats found" sentinel when none
    /// of the row-container layouts match.
    pub fn extract(&self, snapshot: &PageSnapshot, limit: usize) -> Vec<ChatSummary> {
        let document = snapshot.document();

        let rows = self
            .selectors
            .chat_rows
            .iter()
            .filter_map(parse_selector)
            .map(|sel| document.select(&sel).collect::<Vec<_>>())
            .find(|rows| !rows.is_empty());

        let Some(rows) = rows else {
            return vec![ChatSummary::no_chats_found()];
        };

        let title_sel = parse_selector(&self.selectors.chat_row_title);
        let preview_sel = parse_selector(&self.selectors.chat_row_preview);

        rows.into_iter()
            .take(limit)
            .map(|row| {
                let title = title_sel
                    .as_ref()
                    .and_then(|sel| row.select(sel).next())
                    .map(title_or_text)
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

                let preview = preview_sel
                    .as_ref()
                    .map(|sel| {
                        row.select(sel)
                            .map(trimmed_text)
                            .filter(|t| is_preview_text(t, &title))
                            .last()
                            .unwrap_or_default()
                    })
                    .unwrap_or_default();

                ChatSummary::new(title, preview)
            })
            .collect()
    }
}

fn is_preview_text(text: &str, title: &str) -> bool {
    !text.is_empty() && text != title && text.chars().count() < PREVIEW_MAX_CHARS
}

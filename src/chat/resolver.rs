use crate::browser::Page;
use crate::core::{BrowserTrait, Config, DelayRange, KeyModifier, SelectorCandidates};
use crate::dom::locator::resolve_in;
use crate::dom::snapshot::{parse_selector, title_or_text};
use crate::dom::{ElementLocator, PageSnapshot};
use crate::errors::{ChatAgentError, Result};
use crate::types::{InteractionOutcome, ResolveFailure};
use crate::utils::pacing;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResolverState {
    Idle,
    CheckingCurrent,
    Searching,
    Typing { input: String },
    AwaitingResults,
    Selecting,
    Fallback,
    Finished(InteractionOutcome),
}

/// One clickable search result whose text equals the requested chat name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultHit {
    pub selector: String,
    pub index: usize,
}

/// Opens a chat by name: reuse the open one, or search, type and select.
pub struct ChatResolver<'p, 'a, B: BrowserTrait> {
    page: &'p Page<'a, B>,
    config: &'p Config,
    keystroke: DelayRange,
}

impl<'p, 'a, B: BrowserTrait> ChatResolver<'p, 'a, B> {
    pub fn new(page: &'p Page<'a, B>, config: &'p Config) -> Self {
        Self {
            page,
            config,
            keystroke: config.pacing.search_keystroke,
        }
    }

    /// Per-character delay used while typing the name into the search box.
    pub fn with_keystroke(mut self, keystroke: DelayRange) -> Self {
        self.keystroke = keystroke;
        self
    }

    pub async fn open(&self, chat_name: &str) -> Result<InteractionOutcome> {
        if chat_name.trim().is_empty() {
            return Err(ChatAgentError::EmptyChatName);
        }

        let mut state = ResolverState::Idle;

        loop {
            debug!(chat = chat_name, state = ?state, "chat resolver");
            state = match state {
                ResolverState::Idle => ResolverState::CheckingCurrent,

                ResolverState::CheckingCurrent => {
                    let snapshot = self.page.snapshot().await?;
                    match self.header_title(&snapshot) {
                        Some(title) if contains_ignore_case(&title, chat_name) => {
                            info!(chat = chat_name, "chat already open");
                            ResolverState::Finished(InteractionOutcome::Opened {
                                already_open: true,
                                confirmed: true,
                            })
                        }
                        _ => ResolverState::Searching,
                    }
                }

                ResolverState::Searching => {
                    let located = ElementLocator::new(self.page)
                        .locate(
                            "search input",
                            &self.config.selectors.search_input,
                            self.config.timeouts.element_ms,
                        )
                        .await;
                    match located {
                        Ok(resolved) => ResolverState::Typing {
                            input: resolved.selector,
                        },
                        Err(e) if e.is_target_not_found() => ResolverState::Finished(
                            InteractionOutcome::Failed(ResolveFailure::SearchInputNotFound),
                        ),
                        Err(e) => return Err(e),
                    }
                }

                ResolverState::Typing { input } => {
                    self.type_query(&input, chat_name).await?;
                    ResolverState::AwaitingResults
                }

                // WhatsApp Web exposes no "results rendered" signal.
                ResolverState::AwaitingResults => {
                    pacing::pause(self.config.pacing.awaiting_results).await;
                    ResolverState::Selecting
                }

                ResolverState::Selecting => {
                    if self.click_exact_match(chat_name).await? {
                        ResolverState::Finished(InteractionOutcome::Opened {
                            already_open: false,
                            confirmed: true,
                        })
                    } else {
                        ResolverState::Fallback
                    }
                }

                ResolverState::Fallback => {
                    debug!(chat = chat_name, "no exact result, pressing Enter");
                    self.page.press_key("Enter").await?;
                    let confirmed = self.confirm_open(chat_name).await?;
                    if !confirmed {
                        warn!(
                            chat = chat_name,
                            "highlighted result opened but the header names another chat"
                        );
                    }
                    ResolverState::Finished(InteractionOutcome::Opened {
                        already_open: false,
                        confirmed,
                    })
                }

                ResolverState::Finished(outcome) => return Ok(outcome),
            };
        }
    }

    fn header_title(&self, snapshot: &PageSnapshot) -> Option<String> {
        let candidates = &self.config.selectors.header_title;
        let resolved = resolve_in(snapshot, "chat header", candidates).ok()?;
        snapshot.first_title_or_text(&resolved.selector)
    }

    async fn type_query(&self, input: &str, chat_name: &str) -> Result<()> {
        let delays = &self.config.pacing;

        pacing::pause(delays.before_search_click).await;
        self.page.click(input).await?;
        pacing::pause(delays.after_search_click).await;

        // Clear whatever a previous search left behind.
        self.page.press_key_with("a", &[KeyModifier::Ctrl]).await?;
        pacing::pause(delays.after_select_all).await;
        self.page.press_key("Backspace").await?;
        pacing::pause(delays.after_clear).await;

        self.page.type_like_human(chat_name, self.keystroke).await
    }

    async fn click_exact_match(&self, chat_name: &str) -> Result<bool> {
        let snapshot = self.page.snapshot().await?;
        let candidates = self.config.selectors.search_results.with_name(chat_name);
        let hits = exact_result_hits(&snapshot, &candidates, chat_name);

        for hit in hits {
            match self.page.click_nth(&hit.selector, hit.index).await {
                Ok(()) => {
                    info!(
                        chat = chat_name,
                        selector = %hit.selector,
                        index = hit.index,
                        "opened chat from search results"
                    );
                    return Ok(true);
                }
                Err(e) => warn!(
                    selector = %hit.selector,
                    index = hit.index,
                    error = %e,
                    "result click failed"
                ),
            }
        }

        Ok(false)
    }

    async fn confirm_open(&self, chat_name: &str) -> Result<bool> {
        let located = ElementLocator::new(self.page)
            .locate(
                "chat header",
                &self.config.selectors.header_title,
                self.config.timeouts.verify_ms,
            )
            .await;
        if located.is_err() {
            return Ok(false);
        }

        // Enter opens whatever result is highlighted, so only an exact
        // header match counts here.
        let snapshot = self.page.snapshot().await?;
        Ok(self
            .header_title(&snapshot)
            .map(|title| same_name(&title, chat_name))
            .unwrap_or(false))
    }
}

/// Every result element, candidate by candidate and in document order,
/// whose title (or text) equals `chat_name` ignoring case. Substring matches
/// are rejected: "Jon" must never be opened for "John".
pub fn exact_result_hits(
    snapshot: &PageSnapshot,
    candidates: &SelectorCandidates,
    chat_name: &str,
) -> Vec<ResultHit> {
    let document = snapshot.document();
    let wanted = chat_name.trim();
    let mut hits = vec![];

    for selector in candidates.iter() {
        let Some(sel) = parse_selector(selector) else {
            continue;
        };
        for (index, element) in document.select(&sel).enumerate() {
            if same_name(&title_or_text(element), wanted) {
                hits.push(ResultHit {
                    selector: selector.to_string(),
                    index,
                });
            }
        }
    }

    hits
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

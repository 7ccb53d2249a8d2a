use crate::browser::Page;
use crate::core::{BrowserTrait, SelectorCandidates};
use crate::dom::PageSnapshot;
use crate::errors::{ChatAgentError, Result};
use tracing::debug;

/// The candidate that matched, and its position in the candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelector {
    pub selector: String,
    pub position: usize,
}

/// Resolves a logical UI target to the first candidate selector that
/// currently matches.
///
/// Candidates are tried strictly in order and resolution stops at the first
/// hit, so a more specific selector always wins over a generic one even when
/// both would match.
pub struct ElementLocator<'p, 'a, B: BrowserTrait> {
    page: &'p Page<'a, B>,
}

impl<'p, 'a, B: BrowserTrait> ElementLocator<'p, 'a, B> {
    pub fn new(page: &'p Page<'a, B>) -> Self {
        Self { page }
    }

    /// Waits up to `timeout_ms` per candidate. Worst case is
    /// `candidates.len() * timeout_ms`.
    pub async fn locate(
        &self,
        target: &str,
        candidates: &SelectorCandidates,
        timeout_ms: u64,
    ) -> Result<ResolvedSelector> {
        for (position, selector) in candidates.iter().enumerate() {
            match self.page.wait_for_element(selector, timeout_ms).await {
                Ok(()) => {
                    debug!(target, selector, position, "selector resolved");
                    return Ok(ResolvedSelector {
                        selector: selector.to_string(),
                        position,
                    });
                }
                Err(e) => debug!(target, selector, error = %e, "selector missed"),
            }
        }

        Err(not_found(target, candidates))
    }
}

/// Same priority rule as [`ElementLocator::locate`], against a snapshot and
/// without waiting.
pub fn resolve_in(
    snapshot: &PageSnapshot,
    target: &str,
    candidates: &SelectorCandidates,
) -> Result<ResolvedSelector> {
    candidates
        .iter()
        .enumerate()
        .find(|(_, selector)| snapshot.count(selector) > 0)
        .map(|(position, selector)| ResolvedSelector {
            selector: selector.to_string(),
            position,
        })
        .ok_or_else(|| not_found(target, candidates))
}

fn not_found(target: &str, candidates: &SelectorCandidates) -> ChatAgentError {
    ChatAgentError::TargetNotFound {
        target: target.to_string(),
        attempted: candidates.to_vec(),
    }
}

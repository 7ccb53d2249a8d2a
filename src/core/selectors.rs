use serde::{Deserialize, Serialize};
use std::path::Path;

const NAME_PLACEHOLDER: &str = "{name}";

/// Ordered alternatives for one logical UI target, most stable first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorCandidates(Vec<String>);

impl SelectorCandidates {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(selectors.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }

    /// Substitutes `{name}` in every candidate with a CSS-string-escaped name.
    pub fn with_name(&self, name: &str) -> Self {
        let escaped = escape_css_string(name);
        Self(
            self.0
                .iter()
                .map(|s| s.replace(NAME_PLACEHOLDER, &escaped))
                .collect(),
        )
    }
}

pub fn escape_css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '"' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out
}

/// Logical target → candidate selectors for the WhatsApp Web markup.
///
/// Host markup changes (new test ids, new locales) should only need an edit
/// here, or a JSON override loaded with [`SelectorTable::from_json_file`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    pub sidebar: SelectorCandidates,
    pub search_input: SelectorCandidates,
    pub header_title: SelectorCandidates,
    pub search_results: SelectorCandidates,
    pub compose_box: SelectorCandidates,
    pub chat_rows: SelectorCandidates,
    pub chat_row_title: String,
    pub chat_row_preview: String,
    pub conversation_pane: String,
    pub message_rows: SelectorCandidates,
    pub message_has_text: String,
    pub message_text: String,
    pub message_fallback_text: String,
    pub message_meta: String,
    pub message_meta_attribute: String,
    pub incoming_marker: String,
    pub outgoing_marker: String,
    pub interstitial_buttons: String,
    pub interstitial_labels: Vec<String>,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            sidebar: SelectorCandidates::new(["#side"]),
            search_input: SelectorCandidates::new([
                "div[contenteditable='true'][data-tab='3']",
                "div[role='textbox'][title='Search input textbox']",
                "div[role='textbox'][title='Champ de recherche']",
                "div[role='textbox'][aria-label='Champ de recherche']",
                "#side div[contenteditable='true']",
            ]),
            header_title: SelectorCandidates::new([
                "header span[title]",
                "header [data-testid=\"conversation-info-header\"] span",
            ]),
            search_results: SelectorCandidates::new([
                "span[title=\"{name}\"]",
                "[aria-label=\"{name}\"]",
                "div[role=\"listitem\"] span[title]",
                "#search-results div[role=\"listitem\"]",
            ]),
            compose_box: SelectorCandidates::new([
                "div[contenteditable='true'][data-tab='10']",
                "div[contenteditable='true'][data-tab='11']",
                "div[contenteditable='true'][data-tab='6']",
                "footer div[contenteditable='true']",
                "div[role='textbox'][aria-label*='message']",
                "div[role='textbox'][title='Entrez du texte']",
                "div[role='textbox']",
            ]),
            chat_rows: SelectorCandidates::new([
                "div[aria-label=\"Chat list\"] > div[role=\"listitem\"]",
                "div[aria-label=\"Liste de discussions\"] > div[role=\"listitem\"]",
                "#pane-side div[role=\"listitem\"]",
                "#pane-side [data-testid=\"cell-frame-container\"]",
            ]),
            chat_row_title: "span[title], [data-testid=\"cell-frame-title\"] span".to_string(),
            chat_row_preview:
                "div[dir=\"auto\"], span[dir=\"ltr\"], [data-testid=\"last-msg-status\"] + span"
                    .to_string(),
            conversation_pane: "#main".to_string(),
            message_rows: SelectorCandidates::new([
                "div[role=\"row\"]",
                "div.message-in",
                "div.message-out",
                "[data-testid=\"msg-container\"]",
            ]),
            message_has_text: ".selectable-text, [data-testid=\"selectable-text\"], span"
                .to_string(),
            message_text: ".selectable-text, [data-testid=\"selectable-text\"]".to_string(),
            message_fallback_text: "span".to_string(),
            message_meta: "[data-pre-plain-text]".to_string(),
            message_meta_attribute: "data-pre-plain-text".to_string(),
            incoming_marker: "message-in".to_string(),
            outgoing_marker: "message-out".to_string(),
            interstitial_buttons: "button, div[role=\"button\"], span[role=\"button\"]"
                .to_string(),
            interstitial_labels: vec![
                "Use Here".to_string(),
                "Use here".to_string(),
                "Utiliser ici".to_string(),
                "Usar aquí".to_string(),
                "Usar aqui".to_string(),
                "Hier verwenden".to_string(),
                "Usa qui".to_string(),
            ],
        }
    }
}

impl SelectorTable {
    /// Loads a table from JSON. Missing keys keep their built-in defaults.
    pub fn from_json_file(path: &Path) -> crate::errors::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let table: SelectorTable = serde_json::from_str(&raw)?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> crate::errors::Result<()> {
        let required = [
            ("sidebar", &self.sidebar),
            ("search_input", &self.search_input),
            ("header_title", &self.header_title),
            ("search_results", &self.search_results),
            ("compose_box", &self.compose_box),
            ("chat_rows", &self.chat_rows),
            ("message_rows", &self.message_rows),
        ];
        for (name, candidates) in required {
            if candidates.is_empty() {
                return Err(crate::errors::ChatAgentError::ConfigurationError(format!(
                    "selector list '{}' must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

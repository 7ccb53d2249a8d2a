use crate::browser::{Page, SessionManager};
use crate::chat::ChatResolver;
use crate::core::{BrowserTrait, Config, KeyModifier};
use crate::dom::{ChatListExtractor, ElementLocator, MessageExtractor};
use crate::errors::{ChatAgentError, Result};
use crate::types::{ChatMessages, ChatSummary, ReadOutcome, SessionDescriptor};
use crate::utils::pacing;
use tracing::{debug, info};

/// High-level WhatsApp Web operations on top of one [`SessionManager`].
///
/// Every operation needs a prior successful [`connect`](Self::connect);
/// without one it fails with [`ChatAgentError::NotConnected`].
pub struct WhatsAppClient<B: BrowserTrait> {
    session: SessionManager<B>,
}

impl<B: BrowserTrait> WhatsAppClient<B> {
    pub fn new(browser: B, config: Config) -> Self {
        Self {
            session: SessionManager::new(browser, config),
        }
    }

    pub fn session(&self) -> &SessionManager<B> {
        &self.session
    }

    pub fn config(&self) -> &Config {
        self.session.config()
    }

    /// Launch (or relaunch) the browser on the persistent profile.
    pub async fn connect(&mut self, headless: bool) -> Result<SessionDescriptor> {
        self.session.connect(headless).await
    }

    pub async fn disconnect(&mut self) {
        self.session.disconnect().await;
    }

    /// The first `limit` chats of the sidebar, in display order.
    pub async fn list_chats(&mut self, limit: usize) -> Result<Vec<ChatSummary>> {
        let page = self.session.page()?;
        let config = self.session.config();

        wait_for_sidebar(&page, config).await?;
        pacing::pause(config.pacing.after_sidebar_list).await;

        let snapshot = page.snapshot().await?;
        let chats = ChatListExtractor::new(&config.selectors).extract(&snapshot, limit);
        info!(count = chats.len(), limit, "listed chats");
        Ok(chats)
    }

    /// Opens `chat_name` and returns its most recent `limit` messages.
    pub async fn read_messages(&mut self, chat_name: &str, limit: usize) -> Result<ReadOutcome> {
        let page = self.session.page()?;
        let config = self.session.config();

        wait_for_sidebar(&page, config).await?;
        pacing::pause(config.pacing.after_sidebar_chat).await;

        let outcome = ChatResolver::new(&page, config)
            .open(chat_name)
            .await?
            .into_result()?;
        if !outcome.is_confirmed() {
            return Err(ChatAgentError::ChatNotOpened(chat_name.to_string()));
        }
        pacing::pause(config.pacing.after_open_for_read).await;

        let snapshot = page.snapshot().await?;
        let messages = MessageExtractor::new(&config.selectors).extract(&snapshot, limit);
        info!(chat = chat_name, count = messages.len(), limit, "read messages");

        if messages.is_empty() {
            return Ok(ReadOutcome::Empty {
                chat: chat_name.to_string(),
            });
        }

        Ok(ReadOutcome::Messages(ChatMessages {
            chat: chat_name.to_string(),
            messages,
        }))
    }

    /// Opens `chat_name`, types `message` into the compose box and presses Enter.
    ///
    /// Line breaks are entered with Shift+Enter so a multi-line message is
    /// sent as one.
    pub async fn send_message(&mut self, chat_name: &str, message: &str) -> Result<()> {
        let page = self.session.page()?;
        let config = self.session.config();

        wait_for_sidebar(&page, config).await?;
        pacing::pause(config.pacing.after_sidebar_chat).await;

        let outcome = ChatResolver::new(&page, config)
            .with_keystroke(config.pacing.send_search_keystroke)
            .open(chat_name)
            .await?
            .into_result()?;
        pacing::pause(config.pacing.after_open_for_send).await;

        let compose = ElementLocator::new(&page)
            .locate(
                "message input",
                &config.selectors.compose_box,
                config.timeouts.element_ms,
            )
            .await
            .map_err(|e| {
                if e.is_target_not_found() {
                    ChatAgentError::MessageInputNotFound
                } else {
                    e
                }
            })?;

        // Never type into a chat Enter opened by accident.
        if !outcome.is_confirmed() {
            return Err(ChatAgentError::ChatNotOpened(chat_name.to_string()));
        }

        page.click(&compose.selector).await?;
        pacing::pause(config.pacing.after_compose_click).await;

        for (i, line) in message.split('\n').enumerate() {
            if i > 0 {
                page.press_key_with("Enter", &[KeyModifier::Shift]).await?;
            }
            page.type_like_human(line, config.pacing.compose_keystroke).await?;
        }

        pacing::pause(config.pacing.before_send).await;
        page.press_key("Enter").await?;

        info!(chat = chat_name, chars = message.chars().count(), "message sent");
        Ok(())
    }
}

async fn wait_for_sidebar<B: BrowserTrait>(page: &Page<'_, B>, config: &Config) -> Result<()> {
    ElementLocator::new(page)
        .locate(
            "chat sidebar",
            &config.selectors.sidebar,
            config.timeouts.sidebar_ms,
        )
        .await
        .map(|resolved| debug!(selector = %resolved.selector, "sidebar ready"))
        .map_err(|e| {
            if e.is_target_not_found() {
                ChatAgentError::SidebarNotReady
            } else {
                e
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DelayRange;
    use crate::testing::fixtures::{self, FixtureMessage};
    use crate::testing::{FakeBrowser, FakeEvent};
    use crate::types::MessageRecord;
    use tokio_test::{assert_err, assert_ok};

    async fn connected(browser: &FakeBrowser) -> WhatsAppClient<FakeBrowser> {
        let dir = std::env::temp_dir().join(format!("wa-client-{}", uuid::Uuid::new_v4()));
        let config = Config::instant().with_session_dir(dir);
        let mut client = WhatsAppClient::new(browser.clone(), config);
        client.connect(false).await.unwrap();
        client
    }

    fn five_chats() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Alice", "see you"),
            ("Bob", "ok"),
            ("Carol", "lunch?"),
            ("Dave", "thanks"),
            ("Eve", "bye"),
        ]
    }

    #[tokio::test]
    async fn operations_before_connect_fail() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&five_chats(), None));
        let mut client = WhatsAppClient::new(browser, Config::instant());

        assert!(matches!(client.list_chats(3).await, Err(ChatAgentError::NotConnected)));
        assert!(matches!(
            client.read_messages("Alice", 3).await,
            Err(ChatAgentError::NotConnected)
        ));
        assert!(matches!(
            client.send_message("Alice", "hi").await,
            Err(ChatAgentError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn list_chats_honours_limit() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&five_chats(), None));
        let mut client = connected(&browser).await;

        let chats = assert_ok!(client.list_chats(3).await);
        let titles: Vec<_> = chats.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Alice", "Bob", "Carol"]);
    }

    #[tokio::test]
    async fn list_chats_without_sidebar_is_not_ready() {
        let browser =
            FakeBrowser::new("<html><body><div id=\"app\">Scan the QR code</div></body></html>");
        let mut client = connected(&browser).await;

        let err = assert_err!(client.list_chats(10).await);
        assert!(matches!(err, ChatAgentError::SidebarNotReady));
    }

    #[tokio::test]
    async fn read_messages_returns_everything_under_the_limit() {
        let conversation = fixtures::conversation(
            "Alice",
            &[
                FixtureMessage::incoming("Alice", "09:15, 18/10/2026", "are you coming?"),
                FixtureMessage::outgoing("You", "09:16, 18/10/2026", "on my way"),
            ],
        );
        let html = fixtures::logged_in_page(&five_chats(), Some(&conversation));
        let browser = FakeBrowser::new(html);
        let mut client = connected(&browser).await;

        let outcome = assert_ok!(client.read_messages("Alice", 5).await);
        match outcome {
            ReadOutcome::Messages(read) => {
                assert_eq!(read.chat, "Alice");
                assert_eq!(read.messages.len(), 2);
                assert_eq!(
                    read.messages[1],
                    MessageRecord {
                        sender: "You".to_string(),
                        content: "on my way".to_string(),
                        timestamp: "09:16, 18/10/2026".to_string(),
                    }
                );
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_messages_of_empty_chat_is_empty_outcome() {
        let conversation = fixtures::conversation("Bob", &[]);
        let html = fixtures::logged_in_page(&five_chats(), Some(&conversation));
        let browser = FakeBrowser::new(html);
        let mut client = connected(&browser).await;

        let outcome = assert_ok!(client.read_messages("Bob", 10).await);
        assert_eq!(
            outcome,
            ReadOutcome::Empty {
                chat: "Bob".to_string()
            }
        );
    }

    #[tokio::test]
    async fn read_messages_without_search_box_fails() {
        let html =
            r#"<html><body><div id="side"><div aria-label="Chat list"></div></div></body></html>"#;
        let browser = FakeBrowser::new(html);
        let mut client = connected(&browser).await;

        let err = assert_err!(client.read_messages("Alice", 10).await);
        assert!(matches!(err, ChatAgentError::SearchInputNotFound));
    }

    #[tokio::test]
    async fn send_types_into_compose_box_then_presses_enter() {
        let conversation = fixtures::conversation("Alice", &[]);
        let html = fixtures::logged_in_page(&five_chats(), Some(&conversation));
        let browser = FakeBrowser::new(html);
        let mut client = connected(&browser).await;

        assert_ok!(client.send_message("Alice", "Hello!").await);

        assert_eq!(browser.typed_segments(), vec!["Hello!".to_string()]);
        assert_eq!(
            browser.clicks(),
            vec![("div[contenteditable='true'][data-tab='10']".to_string(), 0)]
        );
        assert_eq!(browser.events().last(), Some(&FakeEvent::Key("Enter".to_string())));
    }

    #[tokio::test]
    async fn multi_line_message_uses_shift_enter() {
        let conversation = fixtures::conversation("Alice", &[]);
        let html = fixtures::logged_in_page(&five_chats(), Some(&conversation));
        let browser = FakeBrowser::new(html);
        let mut client = connected(&browser).await;

        assert_ok!(client.send_message("Alice", "line one\nline two").await);

        assert_eq!(
            browser.typed_segments(),
            vec!["line one".to_string(), "line two".to_string()]
        );
        assert!(browser.events().contains(&FakeEvent::KeyCombo {
            key: "Enter".to_string(),
            modifiers: vec![KeyModifier::Shift],
        }));
        assert_eq!(browser.keys(), vec!["Enter".to_string()]);
    }

    #[tokio::test]
    async fn send_without_compose_box_fails_after_opening() {
        let html = fixtures::with_search_results(&fixtures::logged_in_page(&[], None), &["Alice"]);
        let browser = FakeBrowser::new(html);
        let mut client = connected(&browser).await;

        let err = assert_err!(client.send_message("Alice", "hi").await);
        assert!(matches!(err, ChatAgentError::MessageInputNotFound));
        assert_eq!(err.to_string(), "Message input not found after opening chat.");
        assert!(!browser.keys().contains(&"Enter".to_string()));
    }

    fn enter_opens(chat_shown: &str, results: &[&str]) -> FakeBrowser {
        let base = fixtures::with_search_results(&fixtures::logged_in_page(&[], None), results);
        let opened = fixtures::logged_in_page(&[], Some(&fixtures::conversation(chat_shown, &[])));
        let browser = FakeBrowser::new(base);
        browser.on_key("Enter", &opened);
        browser
    }

    #[tokio::test]
    async fn send_refuses_a_chat_the_enter_fallback_opened_by_mistake() {
        let browser = enter_opens("Johnny", &["Johnny"]);
        let mut client = connected(&browser).await;

        let err = assert_err!(client.send_message("John", "secret for John").await);

        assert!(matches!(err, ChatAgentError::ChatNotOpened(ref name) if name == "John"));
        assert_eq!(browser.typed_segments(), vec!["John".to_string()]);
        assert_eq!(browser.keys(), vec!["Backspace".to_string(), "Enter".to_string()]);
    }

    #[tokio::test]
    async fn read_refuses_a_chat_the_enter_fallback_opened_by_mistake() {
        let browser = enter_opens("Johnny", &["Johnny"]);
        let mut client = connected(&browser).await;

        let err = assert_err!(client.read_messages("John", 10).await);
        assert!(matches!(err, ChatAgentError::ChatNotOpened(_)));
    }

    #[tokio::test]
    async fn send_with_no_matching_result_and_no_compose_box() {
        let html = fixtures::with_search_results(&fixtures::logged_in_page(&[], None), &["Jon"]);
        let browser = FakeBrowser::new(html);
        let mut client = connected(&browser).await;

        let err = assert_err!(client.send_message("John", "hi").await);

        assert!(matches!(err, ChatAgentError::MessageInputNotFound));
        assert_eq!(browser.keys(), vec!["Backspace".to_string(), "Enter".to_string()]);
        assert_eq!(browser.typed_segments(), vec!["John".to_string()]);
    }

    #[tokio::test]
    async fn blank_chat_name_is_rejected() {
        let conversation = fixtures::conversation(
            "Alice",
            &[FixtureMessage::incoming("Alice", "09:15", "hello")],
        );
        let html = fixtures::logged_in_page(&five_chats(), Some(&conversation));
        let browser = FakeBrowser::new(html);
        let mut client = connected(&browser).await;

        let err = assert_err!(client.read_messages("  ", 10).await);
        assert!(matches!(err, ChatAgentError::EmptyChatName));
        let err = assert_err!(client.send_message("", "hi").await);
        assert!(matches!(err, ChatAgentError::EmptyChatName));
        assert!(browser.typed_segments().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_types_the_chat_name_at_send_pace() {
        let base = fixtures::with_search_results(&fixtures::logged_in_page(&[], None), &["Alice"]);
        let opened = fixtures::logged_in_page(
            &[("Alice", "")],
            Some(&fixtures::conversation("Alice", &[])),
        );
        let browser = FakeBrowser::new(base);
        browser.on_click("span[title=\"Alice\"]", 0, &opened);

        let dir = std::env::temp_dir().join(format!("wa-client-{}", uuid::Uuid::new_v4()));
        let mut config = Config::instant().with_session_dir(dir);
        config.pacing.send_search_keystroke = DelayRange::new(100, 100);
        let mut client = WhatsAppClient::new(browser.clone(), config);
        assert_ok!(client.connect(false).await);

        let started = tokio::time::Instant::now();
        assert_ok!(client.send_message("Alice", "hi").await);

        assert!(started.elapsed() >= std::time::Duration::from_millis(500));
        assert_eq!(
            browser.typed_segments(),
            vec!["Alice".to_string(), "hi".to_string()]
        );
    }
}

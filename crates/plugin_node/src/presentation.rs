//! # Presentation
//!
//! Player-facing notifications: chat lines, screen titles and action bars.
//! Builders render `%placeholder%` substitutions and produce a
//! [`Notification`], which is serialized as JSON and handed to the host.
//! Legacy `&` color codes are passed through untouched; the client side is
//! responsible for translating them.

use event_system::{PlayerId, ServerContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{trace, warn};

/// Default title timings, in server ticks
pub const DEFAULT_FADE_IN: u32 = 20;
pub const DEFAULT_STAY: u32 = 60;
pub const DEFAULT_FADE_OUT: u32 = 20;

/// Action triggered when a chat line is clicked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum ClickAction {
    RunCommand(String),
    SuggestCommand(String),
    OpenUrl(String),
}

/// Rendered payload delivered to a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Chat {
        text: String,
        hover: Option<String>,
        click: Option<ClickAction>,
    },
    Title {
        title: String,
        subtitle: String,
        fade_in: u32,
        stay: u32,
        fade_out: u32,
    },
    ActionBar {
        text: String,
    },
}

impl Notification {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Renders `%key%` tokens in one left-to-right pass.
///
/// Substituted text is never scanned again, so a value that itself looks
/// like a placeholder (a player named `%reward%`) is emitted verbatim.
/// Unknown tokens and stray `%` are kept as written.
fn apply_placeholders(template: &str, placeholders: &[(String, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let token = tail[1..].find('%').map(|end| &tail[..end + 2]);
        let value = token.and_then(|token| {
            placeholders
                .iter()
                .find(|(key, _)| key == token)
                .map(|(_, value)| (token.len(), value))
        });

        match value {
            Some((consumed, value)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Chat line with optional hover text and click action
#[derive(Debug, Clone, Default)]
pub struct ChatMessage {
    template: String,
    placeholders: Vec<(String, String)>,
    hover: Option<String>,
    click: Option<ClickAction>,
}

impl ChatMessage {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    /// Replaces every occurrence of `key` (e.g. `%player%`) when rendered.
    pub fn placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.placeholders.push((key.into(), value.into()));
        self
    }

    pub fn hover(mut self, text: impl Into<String>) -> Self {
        self.hover = Some(text.into());
        self
    }

    pub fn click(mut self, action: ClickAction) -> Self {
        self.click = Some(action);
        self
    }

    pub fn render(&self) -> String {
        apply_placeholders(&self.template, &self.placeholders)
    }

    pub fn build(self) -> Notification {
        Notification::Chat {
            text: self.render(),
            hover: self.hover,
            click: self.click,
        }
    }
}

/// Title and subtitle shown in the middle of the screen
#[derive(Debug, Clone)]
pub struct Title {
    title: String,
    subtitle: String,
    placeholders: Vec<(String, String)>,
    fade_in: u32,
    stay: u32,
    fade_out: u32,
}

impl Title {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            placeholders: Vec::new(),
            fade_in: DEFAULT_FADE_IN,
            stay: DEFAULT_STAY,
            fade_out: DEFAULT_FADE_OUT,
        }
    }

    /// Applied to both title and subtitle.
    pub fn placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.placeholders.push((key.into(), value.into()));
        self
    }

    pub fn fade_in(mut self, ticks: u32) -> Self {
        self.fade_in = ticks;
        self
    }

    pub fn stay(mut self, ticks: u32) -> Self {
        self.stay = ticks;
        self
    }

    pub fn fade_out(mut self, ticks: u32) -> Self {
        self.fade_out = ticks;
        self
    }

    pub fn build(self) -> Notification {
        Notification::Title {
            title: apply_placeholders(&self.title, &self.placeholders),
            subtitle: apply_placeholders(&self.subtitle, &self.placeholders),
            fade_in: self.fade_in,
            stay: self.stay,
            fade_out: self.fade_out,
        }
    }
}

/// Single line shown above the hotbar
#[derive(Debug, Clone, Default)]
pub struct ActionBar {
    template: String,
    placeholders: Vec<(String, String)>,
}

impl ActionBar {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            placeholders: Vec::new(),
        }
    }

    pub fn placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.placeholders.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> Notification {
        Notification::ActionBar {
            text: apply_placeholders(&self.template, &self.placeholders),
        }
    }
}

/// Outbound seam to whatever displays notifications to players.
///
/// Delivery is fire-and-forget: callers never wait on it and must not assume
/// a notification lands before another reader observes newer state.
pub trait Presenter: Send + Sync {
    fn present(&self, player_id: PlayerId, notification: Notification);
}

/// Presenter that delivers through [`ServerContext::send_to_player`] on a
/// spawned task.
pub struct ContextPresenter {
    context: Arc<dyn ServerContext>,
}

impl ContextPresenter {
    pub fn new(context: Arc<dyn ServerContext>) -> Self {
        Self { context }
    }
}

impl Presenter for ContextPresenter {
    fn present(&self, player_id: PlayerId, notification: Notification) {
        let data = match notification.to_bytes() {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to encode notification for {}: {}", player_id, e);
                return;
            }
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available to deliver notification to {}", player_id);
            return;
        };

        let context = Arc::clone(&self.context);
        runtime.spawn(async move {
            match context.send_to_player(player_id, &data).await {
                Ok(()) => trace!("Delivered notification to {}", player_id),
                Err(e) => warn!("Notification to {} dropped: {}", player_id, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_placeholders() {
        let message = ChatMessage::new("&a[MC-NODE] Break Block by %player% and add %coins% coin")
            .placeholder("%player%", "Steve")
            .placeholder("%coins%", "1");

        assert_eq!(message.render(), "&a[MC-NODE] Break Block by Steve and add 1 coin");
    }

    #[test]
    fn test_chat_keeps_hover_and_click() {
        let notification = ChatMessage::new("&aRunning example")
            .hover("This is a hover message!")
            .click(ClickAction::RunCommand("/example".to_string()))
            .build();

        assert_eq!(
            notification,
            Notification::Chat {
                text: "&aRunning example".to_string(),
                hover: Some("This is a hover message!".to_string()),
                click: Some(ClickAction::RunCommand("/example".to_string())),
            }
        );
    }

    #[test]
    fn test_title_default_timings() {
        match Title::new("Hi %player%", "sub %player%").placeholder("%player%", "Alex").build() {
            Notification::Title { title, subtitle, fade_in, stay, fade_out } => {
                assert_eq!(title, "Hi Alex");
                assert_eq!(subtitle, "sub Alex");
                assert_eq!((fade_in, stay, fade_out), (20, 60, 20));
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn test_title_custom_timings() {
        let notification = Title::new("a", "b").fade_in(5).stay(100).fade_out(0).build();
        assert!(matches!(
            notification,
            Notification::Title { fade_in: 5, stay: 100, fade_out: 0, .. }
        ));
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let message = ChatMessage::new("Break Block by %player% and add %reward% coin")
            .placeholder("%player%", "%reward%")
            .placeholder("%reward%", "1");

        assert_eq!(message.render(), "Break Block by %reward% and add 1 coin");
    }

    #[test]
    fn test_unknown_tokens_and_stray_percent_are_kept() {
        let bar = ActionBar::new("100% of %missing% and %n%%").placeholder("%n%", "7").build();
        assert_eq!(
            bar,
            Notification::ActionBar { text: "100% of %missing% and 7%".to_string() }
        );
    }

    #[test]
    fn test_action_bar_repeated_placeholder() {
        let notification = ActionBar::new("%n% + %n%").placeholder("%n%", "2").build();
        assert_eq!(notification, Notification::ActionBar { text: "2 + 2".to_string() });
    }

    #[test]
    fn test_notification_wire_shape() {
        let bytes = ActionBar::new("hi").build().to_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "action_bar");
        assert_eq!(json["text"], "hi");

        let decoded = Notification::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, Notification::ActionBar { text: "hi".to_string() });
    }
}

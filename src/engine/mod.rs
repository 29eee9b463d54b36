//! Conversation state machine
//!
//! [`ConversationEngine::handle`] is a pure function of the current chat state
//! and the incoming text. It decides the next state and what to reply; the
//! [`crate::service`] layer performs the reply.

/// Main menu keyboard layout
pub mod keyboard;
/// Per-chat state registry
pub mod registry;

pub use keyboard::main_menu_layout;
pub use registry::ChatStates;

use crate::catalog::{NodeCatalog, NodeDefinition, PersonalQa};
use crate::config::Settings;
use crate::transport::ReplyKeyboard;
use std::sync::Arc;

/// Current position of a chat in the conversation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConversationState {
    /// Main menu, node names are matched
    #[default]
    Idle,
    /// A gated node was selected and its code is expected
    AwaitingCode(Arc<NodeDefinition>),
    /// Personal questions mode
    AwaitingPersonalAnswer,
}

/// What to send back for one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Text followed by the main menu keyboard
    Menu(String),
    /// Text with a keyboard holding only the back button
    Prompt(String),
    /// Plain text, keyboard left as is
    Text(String),
    /// Deliver a node's content, then restore the main menu
    Deliver {
        /// Node to deliver
        node: Arc<NodeDefinition>,
        /// Code that unlocked the node, if it was gated
        redeemed_code: Option<String>,
    },
}

/// Outcome of one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// State to store for the chat
    pub next: ConversationState,
    /// Reply to perform
    pub reply: Reply,
}

impl Transition {
    const fn new(next: ConversationState, reply: Reply) -> Self {
        Self { next, reply }
    }
}

/// Fixed texts and reserved button labels
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Messages {
    /// Welcome text for the start command
    pub start: String,
    /// Fallback reply
    pub default: String,
    /// Reply shown with the main menu after going back
    pub back: String,
    /// Prompt for the personal questions mode
    pub help: String,
    /// Back button label, recognized in every state
    pub back_button: String,
    /// Help button label
    pub help_button: String,
}

impl Messages {
    /// Take the texts from loaded settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            start: settings.start_message.clone(),
            default: settings.default_message.clone(),
            back: settings.back_message.clone(),
            help: settings.help_message.clone(),
            back_button: settings.back_button.clone(),
            help_button: settings.help_button.clone(),
        }
    }
}

/// Decides state transitions and replies
pub struct ConversationEngine {
    catalog: NodeCatalog,
    personal: PersonalQa,
    messages: Messages,
    main_menu: ReplyKeyboard,
    back_only: ReplyKeyboard,
}

impl ConversationEngine {
    /// Build the engine; the main menu keyboard is laid out once here.
    #[must_use]
    pub fn new(catalog: NodeCatalog, personal: PersonalQa, messages: Messages) -> Self {
        let names: Vec<String> = catalog.names().map(str::to_string).collect();
        let main_menu = main_menu_layout(&names, &messages.help_button);
        let back_only = ReplyKeyboard::single(messages.back_button.clone());
        Self {
            catalog,
            personal,
            messages,
            main_menu,
            back_only,
        }
    }

    /// Node catalog
    #[must_use]
    pub const fn catalog(&self) -> &NodeCatalog {
        &self.catalog
    }

    /// Configured texts
    #[must_use]
    pub const fn messages(&self) -> &Messages {
        &self.messages
    }

    /// Main menu keyboard
    #[must_use]
    pub const fn main_menu(&self) -> &ReplyKeyboard {
        &self.main_menu
    }

    /// Keyboard with only the back button
    #[must_use]
    pub const fn back_only(&self) -> &ReplyKeyboard {
        &self.back_only
    }

    /// Names of nodes that can never be selected because they equal a reserved label
    #[must_use]
    pub fn shadowed_nodes(&self) -> Vec<&str> {
        self.catalog
            .names()
            .filter(|name| self.is_reserved(name))
            .collect()
    }

    /// Transition for the start command: always back to the main menu
    #[must_use]
    pub fn start(&self) -> Transition {
        Transition::new(
            ConversationState::Idle,
            Reply::Menu(self.messages.start.clone()),
        )
    }

    /// Decide the transition for `text` received in `state`.
    #[must_use]
    pub fn handle(&self, state: &ConversationState, text: &str) -> Transition {
        if text == self.messages.back_button {
            return Transition::new(
                ConversationState::Idle,
                Reply::Menu(self.messages.back.clone()),
            );
        }

        match state {
            ConversationState::Idle => self.handle_idle(text),
            ConversationState::AwaitingCode(node) => self.handle_code(node, text),
            ConversationState::AwaitingPersonalAnswer => self.handle_personal(text),
        }
    }

    fn handle_idle(&self, text: &str) -> Transition {
        if text == self.messages.help_button {
            return Transition::new(
                ConversationState::AwaitingPersonalAnswer,
                Reply::Prompt(self.messages.help.clone()),
            );
        }

        let Some(node) = self.catalog.by_name(text) else {
            return self.fallback(ConversationState::Idle);
        };

        if node.is_gated() {
            Transition::new(
                ConversationState::AwaitingCode(node.clone()),
                Reply::Prompt(node.prompt_message.clone()),
            )
        } else {
            Transition::new(
                ConversationState::Idle,
                Reply::Deliver {
                    node: node.clone(),
                    redeemed_code: None,
                },
            )
        }
    }

    fn handle_code(&self, node: &Arc<NodeDefinition>, text: &str) -> Transition {
        if !node.accepts_code(text) {
            return self.fallback(ConversationState::AwaitingCode(node.clone()));
        }
        Transition::new(
            ConversationState::Idle,
            Reply::Deliver {
                node: node.clone(),
                redeemed_code: Some(text.to_string()),
            },
        )
    }

    fn handle_personal(&self, text: &str) -> Transition {
        match self.personal.answer(text) {
            Some(answer) => Transition::new(
                ConversationState::AwaitingPersonalAnswer,
                Reply::Text(answer.to_string()),
            ),
            None => self.fallback(ConversationState::AwaitingPersonalAnswer),
        }
    }

    fn fallback(&self, next: ConversationState) -> Transition {
        Transition::new(next, Reply::Text(self.messages.default.clone()))
    }

    fn is_reserved(&self, text: &str) -> bool {
        text == self.messages.back_button || text == self.messages.help_button
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NodeContent;
    use crate::config::{ContentKind, NodeRecord};
    use std::collections::HashMap;

    fn messages() -> Messages {
        Messages {
            start: "welcome".to_string(),
            default: "default".to_string(),
            back: "back to menu".to_string(),
            help: "ask me".to_string(),
            back_button: "Back".to_string(),
            help_button: "Help".to_string(),
        }
    }

    fn record(name: &str, code: Option<&str>, kind: ContentKind, content: &str) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            code: code.map(str::to_string),
            content: content.to_string(),
            kind,
            message: format!("enter code for {name}"),
        }
    }

    fn engine() -> ConversationEngine {
        let catalog = NodeCatalog::from_records(vec![
            record("Prices", Some("1234"), ContentKind::Text, "Our prices..."),
            record("Contacts", None, ContentKind::Photo, "contacts.jpg"),
            record("Back", None, ContentKind::Text, "shadowed"),
        ])
        .expect("valid catalog");
        let personal = PersonalQa::new(HashMap::from([(
            "Who are you?".to_string(),
            "A bot".to_string(),
        )]));
        ConversationEngine::new(catalog, personal, messages())
    }

    fn node(engine: &ConversationEngine, name: &str) -> Arc<NodeDefinition> {
        engine.catalog().by_name(name).cloned().expect("node exists")
    }

    #[test]
    fn test_ungated_node_delivers_and_stays_idle() {
        let engine = engine();
        let t = engine.handle(&ConversationState::Idle, "Contacts");
        assert_eq!(t.next, ConversationState::Idle);
        let Reply::Deliver {
            node,
            redeemed_code,
        } = t.reply
        else {
            panic!("expected delivery, got {:?}", t.reply);
        };
        assert_eq!(
            node.content,
            NodeContent::Photo {
                key: "contacts.jpg".to_string()
            }
        );
        assert_eq!(redeemed_code, None);
    }

    #[test]
    fn test_gated_node_prompts_for_code() {
        let engine = engine();
        let t = engine.handle(&ConversationState::Idle, "Prices");
        assert_eq!(
            t.next,
            ConversationState::AwaitingCode(node(&engine, "Prices"))
        );
        assert_eq!(t.reply, Reply::Prompt("enter code for Prices".to_string()));
    }

    #[test]
    fn test_wrong_code_keeps_waiting() {
        let engine = engine();
        let waiting = ConversationState::AwaitingCode(node(&engine, "Prices"));
        for attempt in ["9999", "", "1234 ", "Contacts", "Help"] {
            let t = engine.handle(&waiting, attempt);
            assert_eq!(t.next, waiting, "attempt {attempt:?}");
            assert_eq!(t.reply, Reply::Text("default".to_string()));
        }
    }

    #[test]
    fn test_right_code_delivers_and_resets() {
        let engine = engine();
        let prices = node(&engine, "Prices");
        let t = engine.handle(&ConversationState::AwaitingCode(prices.clone()), "1234");
        assert_eq!(t.next, ConversationState::Idle);
        assert_eq!(
            t.reply,
            Reply::Deliver {
                node: prices,
                redeemed_code: Some("1234".to_string()),
            }
        );
    }

    #[test]
    fn test_back_is_global() {
        let engine = engine();
        let states = [
            ConversationState::Idle,
            ConversationState::AwaitingCode(node(&engine, "Prices")),
            ConversationState::AwaitingPersonalAnswer,
        ];
        for state in states {
            let t = engine.handle(&state, "Back");
            assert_eq!(t.next, ConversationState::Idle);
            assert_eq!(t.reply, Reply::Menu("back to menu".to_string()));
        }
    }

    #[test]
    fn test_help_enters_personal_mode() {
        let engine = engine();
        let t = engine.handle(&ConversationState::Idle, "Help");
        assert_eq!(t.next, ConversationState::AwaitingPersonalAnswer);
        assert_eq!(t.reply, Reply::Prompt("ask me".to_string()));
    }

    #[test]
    fn test_personal_mode_never_matches_nodes() {
        let engine = engine();
        let state = ConversationState::AwaitingPersonalAnswer;

        let answered = engine.handle(&state, "Who are you?");
        assert_eq!(answered.next, state);
        assert_eq!(answered.reply, Reply::Text("A bot".to_string()));

        let node_name = engine.handle(&state, "Contacts");
        assert_eq!(node_name.next, state);
        assert_eq!(node_name.reply, Reply::Text("default".to_string()));
    }

    #[test]
    fn test_unknown_text_falls_back() {
        let engine = engine();
        let t = engine.handle(&ConversationState::Idle, "nothing");
        assert_eq!(t.next, ConversationState::Idle);
        assert_eq!(t.reply, Reply::Text("default".to_string()));
    }

    #[test]
    fn test_reserved_names_are_shadowed() {
        let engine = engine();
        assert_eq!(engine.shadowed_nodes(), vec!["Back"]);
    }

    #[test]
    fn test_start_resets_to_menu() {
        let engine = engine();
        let t = engine.start();
        assert_eq!(t.next, ConversationState::Idle);
        assert_eq!(t.reply, Reply::Menu("welcome".to_string()));
    }
}

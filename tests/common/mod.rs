#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use node_gate_bot::catalog::{NodeCatalog, PersonalQa};
use node_gate_bot::config::{ContentKind, NodeRecord};
use node_gate_bot::content::ContentResolver;
use node_gate_bot::delivery::{DeliveryHandleCache, MediaDelivery};
use node_gate_bot::engine::{ConversationEngine, Messages};
use node_gate_bot::service::{ConversationService, InboundEvent};
use node_gate_bot::storage::{ObjectStore, StorageError, StoredObject};
use node_gate_bot::transport::{
    AdminNotifier, ChatTransport, CodeRedeemed, DeliveryHandle, MediaKind, MediaSource,
    ReplyKeyboard, Requester, TransportError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BUCKET: &str = "media";

/// Everything the service sent, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        keyboard: Option<ReplyKeyboard>,
    },
    Media {
        chat_id: i64,
        kind: MediaKind,
        source: MediaSource,
        keyboard: ReplyKeyboard,
    },
    Admin(CodeRedeemed),
}

pub type Log = Arc<Mutex<Vec<Sent>>>;

pub struct RecordingTransport {
    log: Log,
    uploads: AtomicUsize,
    rejected_text: Option<String>,
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<(), TransportError> {
        if self.rejected_text.as_deref() == Some(text) {
            return Err(TransportError::Other("message rejected".to_string()));
        }
        self.log.lock().expect("log poisoned").push(Sent::Text {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        source: MediaSource,
        keyboard: &ReplyKeyboard,
    ) -> Result<DeliveryHandle, TransportError> {
        let handle = match &source {
            MediaSource::Upload(payload) => {
                let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
                DeliveryHandle(format!("file-{}-{n}", payload.key))
            }
            MediaSource::Handle(handle) => handle.clone(),
        };
        self.log.lock().expect("log poisoned").push(Sent::Media {
            chat_id,
            kind,
            source,
            keyboard: keyboard.clone(),
        });
        Ok(handle)
    }
}

pub struct RecordingNotifier {
    log: Log,
    fail: bool,
}

#[async_trait]
impl AdminNotifier for RecordingNotifier {
    async fn notify(&self, event: &CodeRedeemed) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Other("admin chat unavailable".to_string()));
        }
        self.log
            .lock()
            .expect("log poisoned")
            .push(Sent::Admin(event.clone()));
        Ok(())
    }
}

/// In-memory object store counting every fetch
pub struct CountingStore {
    objects: HashMap<String, StoredObject>,
    fetches: AtomicUsize,
    delay: Duration,
}

impl CountingStore {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

pub struct Harness {
    pub service: Arc<ConversationService>,
    pub log: Log,
    pub store: Arc<CountingStore>,
    pub transport: Arc<RecordingTransport>,
}

impl Harness {
    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().expect("log poisoned").clone()
    }

    pub fn clear(&self) {
        self.log.lock().expect("log poisoned").clear();
    }

    pub fn uploads(&self) -> usize {
        self.transport.uploads.load(Ordering::SeqCst)
    }

    pub fn main_menu(&self) -> ReplyKeyboard {
        self.service.engine().main_menu().clone()
    }

    pub fn back_only(&self) -> ReplyKeyboard {
        ReplyKeyboard::single("Back")
    }
}

pub fn messages() -> Messages {
    Messages {
        start: "Welcome!".to_string(),
        default: "Sorry, I don't understand.".to_string(),
        back: "Main menu".to_string(),
        help: "Ask your question".to_string(),
        back_button: "Back".to_string(),
        help_button: "Help".to_string(),
    }
}

pub const ERROR_MESSAGE: &str = "Something went wrong";

pub fn node(name: &str, code: Option<&str>, kind: ContentKind, content: &str) -> NodeRecord {
    NodeRecord {
        name: name.to_string(),
        code: code.map(str::to_string),
        content: content.to_string(),
        kind,
        message: format!("Enter the code for {name}"),
    }
}

/// Nodes used by most tests
pub fn default_nodes() -> Vec<NodeRecord> {
    vec![
        node("Prices", Some("1234"), ContentKind::Text, "Our prices..."),
        node("Contacts", None, ContentKind::Photo, "contacts.jpg"),
        node("Greeting", None, ContentKind::Voice, "hello.ogg"),
        node("About", None, ContentKind::Text, "We are a small team."),
        node("Secret photo", Some("s3cr3t"), ContentKind::Photo, "secret.jpg"),
        node("Missing", None, ContentKind::Photo, "missing.jpg"),
    ]
}

pub struct HarnessBuilder {
    nodes: Vec<NodeRecord>,
    personal: Vec<(String, String)>,
    objects: HashMap<String, StoredObject>,
    fetch_delay: Duration,
    failing_notifier: bool,
    rejected_text: Option<String>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        let objects = [
            ("contacts.jpg", "image/jpeg"),
            ("hello.ogg", "audio/ogg"),
            ("secret.jpg", "image/jpeg"),
        ]
        .into_iter()
        .map(|(key, mime)| {
            (
                key.to_string(),
                StoredObject {
                    bytes: Bytes::from(format!("bytes of {key}")),
                    content_type: Some(mime.to_string()),
                },
            )
        })
        .collect();

        Self {
            nodes: default_nodes(),
            personal: vec![(
                "Where are you?".to_string(),
                "In the cloud.".to_string(),
            )],
            objects,
            fetch_delay: Duration::ZERO,
            failing_notifier: false,
            rejected_text: None,
        }
    }
}

impl HarnessBuilder {
    pub fn nodes(mut self, nodes: Vec<NodeRecord>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn failing_notifier(mut self) -> Self {
        self.failing_notifier = true;
        self
    }

    /// Make the transport fail every text message equal to `text`
    pub fn reject_text(mut self, text: &str) -> Self {
        self.rejected_text = Some(text.to_string());
        self
    }

    pub fn build(self) -> Harness {
        let catalog = NodeCatalog::from_records(self.nodes).expect("valid catalog");
        let personal = PersonalQa::new(self.personal.into_iter().collect());
        let engine = ConversationEngine::new(catalog, personal, messages());

        let store = Arc::new(CountingStore {
            objects: self.objects,
            fetches: AtomicUsize::new(0),
            delay: self.fetch_delay,
        });
        let resolver = ContentResolver::new(store.clone(), BUCKET);
        let media = MediaDelivery::new(resolver, DeliveryHandleCache::new());

        let log: Log = Arc::default();
        let transport = Arc::new(RecordingTransport {
            log: log.clone(),
            uploads: AtomicUsize::new(0),
            rejected_text: self.rejected_text,
        });
        let notifier = Arc::new(RecordingNotifier {
            log: log.clone(),
            fail: self.failing_notifier,
        });

        let service = Arc::new(ConversationService::new(
            engine,
            media,
            transport.clone(),
            notifier,
            ERROR_MESSAGE,
        ));

        Harness {
            service,
            log,
            store,
            transport,
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::default().build()
}

pub fn requester(user_id: i64) -> Requester {
    Requester {
        user_id,
        display_name: format!("user{user_id}"),
    }
}

pub fn event(chat_id: i64, text: &str) -> InboundEvent {
    InboundEvent {
        chat_id,
        requester: requester(chat_id),
        text: text.to_string(),
    }
}

pub fn text(chat_id: i64, text: &str, keyboard: Option<ReplyKeyboard>) -> Sent {
    Sent::Text {
        chat_id,
        text: text.to_string(),
        keyboard,
    }
}

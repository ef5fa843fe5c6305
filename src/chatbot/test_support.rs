//! Test doubles shared by the chatbot unit tests.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;

use crate::chatbot::catalog::Catalog;
use crate::chatbot::engine::ConversationEngine;
use crate::chatbot::messenger::Messenger;
use crate::chatbot::record::ClientRecord;
use crate::chatbot::reminders::{ReminderEngine, ReminderTemplate};
use crate::chatbot::store::{ClientStore, SharedStore};

/// Records every message; can be told to fail all sends or sends to one address.
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
    fail_for: Option<String>,
    delay: Option<Duration>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()), failing: AtomicBool::new(false), fail_for: None, delay: None }
    }

    /// Takes `delay` to deliver each message.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::new() }
    }

    pub fn failing() -> Self {
        let m = Self::new();
        m.set_failing(true);
        m
    }

    pub fn failing_for(address: &str) -> Self {
        Self { fail_for: Some(address.to_string()), ..Self::new() }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) || self.fail_for.as_deref() == Some(to) {
            return Err(format!("send to {to} refused"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(format!("SM{}", sent.len()))
    }
}

/// Holds every send until the test calls `release`.
pub struct GatedMessenger {
    started: Notify,
    gate: Notify,
    sent: Mutex<Vec<(String, String)>>,
}

impl GatedMessenger {
    pub fn new() -> Self {
        Self { started: Notify::new(), gate: Notify::new(), sent: Mutex::new(Vec::new()) }
    }

    /// Wait until a send is in flight.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for GatedMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, String> {
        self.started.notify_one();
        self.gate.notified().await;
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok("SM-gated".to_string())
    }
}

/// Panics on every send.
pub struct PanickingMessenger;

#[async_trait]
impl Messenger for PanickingMessenger {
    async fn send_text(&self, _to: &str, _body: &str) -> Result<String, String> {
        panic!("messenger exploded");
    }
}

/// A keratina client last treated on 2024-10-15, no manual reminder.
pub fn client(id: u32) -> ClientRecord {
    ClientRecord {
        id,
        name: Some(format!("Cliente {id}")),
        phone: Some(format!("+5730000000{id:02}")),
        last_treatment_date: NaiveDate::from_ymd_opt(2024, 10, 15),
        treatment_type: Some("keratina".to_string()),
        hair_type: None,
        notes: None,
        next_reminder: None,
        last_reminder_sent: None,
    }
}

/// Engine over an in-memory store with the default catalog, Bogotá time and no session expiry.
pub fn engine_with(
    clients: Vec<ClientRecord>,
    messenger: Arc<dyn Messenger>,
) -> (Arc<ConversationEngine>, SharedStore) {
    let tz = chrono_tz::America::Bogota;
    let store = ClientStore::with_clients(clients).into_shared();
    let catalog = Arc::new(Catalog::default());
    let reminders = Arc::new(ReminderEngine::new(
        store.clone(),
        catalog.clone(),
        messenger,
        ReminderTemplate::default(),
        tz,
    ));
    let engine = ConversationEngine::new(store.clone(), catalog, reminders, None, tz);
    (Arc::new(engine), store)
}

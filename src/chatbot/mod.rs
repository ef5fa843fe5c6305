//! Chatbot module - client records, reminders and the WhatsApp conversation flow.

pub mod catalog;
pub mod engine;
pub mod messenger;
pub mod record;
pub mod reminders;
pub mod replies;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod validate;
pub mod webhook;
pub mod whatsapp;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod tests;

pub use catalog::{Catalog, Treatment};
pub use engine::ConversationEngine;
pub use messenger::{DryRunMessenger, Messenger};
pub use record::{ClientRecord, NewClient};
pub use reminders::{ReminderEngine, ReminderTemplate};
pub use scheduler::Scheduler;
pub use store::{ClientStore, SharedStore, StoreError};
pub use whatsapp::WhatsAppClient;

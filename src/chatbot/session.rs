//! Per-sender conversation state.
//!
//! Sessions live in memory only and are lost on restart. Each state carries
//! the data entered so far, so resetting to `Menu` discards it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::debug;

use crate::chatbot::record::{ClientField, NewClient};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Menu,
    AddName,
    AddPhone {
        name: String,
    },
    AddTreatment {
        name: String,
        phone: String,
    },
    AddLastDate {
        name: String,
        phone: String,
        treatment_type: String,
    },
    /// Everything but the optional manual reminder date is known.
    AddNextDate {
        draft: NewClient,
    },
    UpdateSelectId,
    UpdateSelectField {
        client_id: u32,
    },
    UpdateValue {
        client_id: u32,
        field: ClientField,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Menu => "MENU",
            Self::AddName => "ADD_NAME",
            Self::AddPhone { .. } => "ADD_PHONE",
            Self::AddTreatment { .. } => "ADD_TREATMENT",
            Self::AddLastDate { .. } => "ADD_LAST_DATE",
            Self::AddNextDate { .. } => "ADD_NEXT_DATE",
            Self::UpdateSelectId => "UPDATE_SELECT_ID",
            Self::UpdateSelectField { .. } => "UPDATE_SELECT_FIELD",
            Self::UpdateValue { .. } => "UPDATE_VALUE",
        }
    }

    pub(crate) fn add_next_date(name: String, phone: String, treatment_type: String, last: NaiveDate) -> Self {
        Self::AddNextDate {
            draft: NewClient {
                name,
                phone,
                treatment_type,
                last_treatment_date: last,
                ..Default::default()
            },
        }
    }
}

struct Session {
    state: SessionState,
    last_seen: Instant,
}

/// Sessions keyed by sender address.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    /// Idle sessions older than this are dropped. `None` keeps them forever.
    ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { sessions: HashMap::new(), ttl }
    }

    /// Current state for `sender`, creating a `Menu` session on first contact.
    pub fn state(&mut self, sender: &str) -> SessionState {
        let now = Instant::now();
        self.evict_idle_at(now);
        let session = self
            .sessions
            .entry(sender.to_string())
            .or_insert_with(|| Session { state: SessionState::Menu, last_seen: now });
        session.last_seen = now;
        session.state.clone()
    }

    pub fn set(&mut self, sender: &str, state: SessionState) {
        let session = Session { state, last_seen: Instant::now() };
        self.sessions.insert(sender.to_string(), session);
    }

    pub fn reset(&mut self, sender: &str) {
        self.set(sender, SessionState::Menu);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn evict_idle_at(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_seen) <= ttl);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!("Evicted {evicted} idle session(s)");
        }
        evicted
    }
}

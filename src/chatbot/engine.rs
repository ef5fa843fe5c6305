//! Conversation engine - turns chat messages from staff into menu actions
//! and guided data entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::chatbot::catalog::Catalog;
use crate::chatbot::record::{ClientField, FieldValue};
use crate::chatbot::reminders::{ReminderEngine, today_in};
use crate::chatbot::replies;
use crate::chatbot::session::{SessionState, SessionStore};
use crate::chatbot::store::SharedStore;
use crate::chatbot::validate::{is_valid_phone, parse_date};

const SKIP: &str = "SALTAR";
const CLEAR: &str = "NINGUNO";

/// Reply plus the state the session moves to.
struct Transition {
    reply: String,
    next: SessionState,
}

impl Transition {
    fn to(next: SessionState, reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), next }
    }

    fn menu(reply: impl Into<String>) -> Self {
        Self::to(SessionState::Menu, reply)
    }
}

fn is_menu_command(upper: &str) -> bool {
    matches!(upper, "MENU" | "MENÚ" | "INICIO")
}

fn is_help_command(upper: &str) -> bool {
    matches!(upper, "AYUDA" | "HELP")
}

/// The conversation engine.
pub struct ConversationEngine {
    store: SharedStore,
    catalog: Arc<Catalog>,
    reminders: Arc<ReminderEngine>,
    sessions: Mutex<SessionStore>,
    /// One lock per sender; a message waits for the previous one from the
    /// same sender to finish its transition.
    turns: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    tz: Tz,
}

impl ConversationEngine {
    pub fn new(
        store: SharedStore,
        catalog: Arc<Catalog>,
        reminders: Arc<ReminderEngine>,
        session_ttl: Option<Duration>,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            catalog,
            reminders,
            sessions: Mutex::new(SessionStore::new(session_ttl)),
            turns: Mutex::new(HashMap::new()),
            tz,
        }
    }

    /// Handle one inbound message and return the reply text.
    pub async fn handle_message(&self, sender: &str, text: &str) -> String {
        let text = text.trim();
        let upper = text.to_uppercase();
        info!("📨 {}: \"{}\"", sender, text.chars().take(50).collect::<String>());

        let turn = self.turns.lock().await.entry(sender.to_string()).or_default().clone();
        let reply = {
            let _turn = turn.lock().await;
            self.take_turn(sender, text, &upper).await
        };

        // the map and this call hold the only references
        let mut turns = self.turns.lock().await;
        if Arc::strong_count(&turn) == 2 {
            turns.remove(sender);
        }
        reply
    }

    async fn take_turn(&self, sender: &str, text: &str, upper: &str) -> String {
        // Global commands work from any state.
        if is_menu_command(upper) {
            self.sessions.lock().await.reset(sender);
            return replies::menu();
        }
        if is_help_command(upper) {
            self.sessions.lock().await.state(sender);
            return replies::help();
        }

        let state = self.sessions.lock().await.state(sender);
        let from = state.name();
        let Transition { reply, next } = self.step(state, text, upper).await;
        debug!("Session {sender}: {from} -> {}", next.name());
        self.sessions.lock().await.set(sender, next);
        reply
    }

    /// Current state for `sender` (creates a session if there is none).
    pub async fn session_state(&self, sender: &str) -> SessionState {
        self.sessions.lock().await.state(sender)
    }

    fn today(&self) -> NaiveDate {
        today_in(self.tz)
    }

    async fn step(&self, state: SessionState, input: &str, upper: &str) -> Transition {
        match state {
            SessionState::Menu => self.menu_choice(input).await,

            SessionState::AddName => {
                if input.is_empty() {
                    Transition::to(SessionState::AddName, replies::ADD_NAME_EMPTY)
                } else {
                    let name = input.to_string();
                    let reply = replies::phone_prompt(&name);
                    Transition::to(SessionState::AddPhone { name }, reply)
                }
            }

            SessionState::AddPhone { name } => {
                if is_valid_phone(input) {
                    let phone = input.trim().to_string();
                    Transition::to(SessionState::AddTreatment { name, phone }, replies::treatments(&self.catalog))
                } else {
                    Transition::to(SessionState::AddPhone { name }, replies::INVALID_PHONE)
                }
            }

            SessionState::AddTreatment { name, phone } => match self.catalog.by_choice(input) {
                Some(treatment) => Transition::to(
                    SessionState::AddLastDate { name, phone, treatment_type: treatment.key.clone() },
                    replies::LAST_DATE_PROMPT,
                ),
                None => Transition::to(
                    SessionState::AddTreatment { name, phone },
                    replies::invalid_treatment(&self.catalog),
                ),
            },

            SessionState::AddLastDate { name, phone, treatment_type } => {
                let date = if upper == SKIP { Some(self.today()) } else { parse_date(input) };
                match date {
                    Some(last) => Transition::to(
                        SessionState::add_next_date(name, phone, treatment_type, last),
                        replies::NEXT_DATE_PROMPT,
                    ),
                    None => Transition::to(
                        SessionState::AddLastDate { name, phone, treatment_type },
                        replies::INVALID_LAST_DATE,
                    ),
                }
            }

            SessionState::AddNextDate { mut draft } => {
                let next = if upper == SKIP { Some(None) } else { parse_date(input).map(Some) };
                let Some(next) = next else {
                    return Transition::to(SessionState::AddNextDate { draft }, replies::INVALID_NEXT_DATE);
                };
                draft.next_reminder = next;
                let record = self.store.lock().await.add(draft);
                Transition::menu(replies::client_created(&record, &self.catalog))
            }

            SessionState::UpdateSelectId => {
                let Ok(client_id) = input.parse::<u32>() else {
                    return Transition::to(SessionState::UpdateSelectId, replies::UPDATE_ID_NOT_NUMBER);
                };
                let store = self.store.lock().await;
                match store.find_by_id(client_id) {
                    Some(client) => Transition::to(
                        SessionState::UpdateSelectField { client_id },
                        replies::field_menu(client),
                    ),
                    None => Transition::to(SessionState::UpdateSelectId, replies::update_id_unknown(client_id)),
                }
            }

            SessionState::UpdateSelectField { client_id } => match ClientField::from_choice(input) {
                Some(field) => Transition::to(
                    SessionState::UpdateValue { client_id, field },
                    replies::value_prompt(field, &self.catalog),
                ),
                None => Transition::to(
                    SessionState::UpdateSelectField { client_id },
                    replies::UPDATE_FIELD_INVALID,
                ),
            },

            SessionState::UpdateValue { client_id, field } => match self.parse_value(field, input, upper) {
                Ok(value) => {
                    let mut store = self.store.lock().await;
                    if !store.update_field(client_id, value) {
                        return Transition::menu(replies::client_not_found(client_id));
                    }
                    let name = store
                        .find_by_id(client_id)
                        .map(|c| c.display_name().to_string())
                        .unwrap_or_default();
                    Transition::menu(replies::field_updated(field, &name))
                }
                Err(reprompt) => Transition::to(SessionState::UpdateValue { client_id, field }, reprompt),
            },
        }
    }

    async fn menu_choice(&self, input: &str) -> Transition {
        match input {
            "1" => Transition::to(SessionState::AddName, replies::ADD_NAME_PROMPT),
            "2" => {
                let store = self.store.lock().await;
                Transition::menu(replies::client_list(store.clients()))
            }
            "3" => Transition::menu(replies::VIEW_PROMPT),
            "4" => Transition::to(SessionState::UpdateSelectId, replies::UPDATE_PROMPT),
            "5" => {
                let sent = self.reminders.run_check().await;
                Transition::menu(replies::reminders_run(sent))
            }
            "6" => Transition::menu(replies::help()),
            other => match other.parse::<u32>() {
                Ok(id) => {
                    let store = self.store.lock().await;
                    match store.find_by_id(id) {
                        Some(client) => Transition::menu(replies::client_detail(client, &self.catalog)),
                        None => Transition::menu(replies::client_not_found(id)),
                    }
                }
                Err(_) => Transition::menu(replies::menu()),
            },
        }
    }

    /// Validate a new value for `field`. The error is the re-prompt text.
    fn parse_value(&self, field: ClientField, input: &str, upper: &str) -> Result<FieldValue, String> {
        if upper == CLEAR {
            return Ok(FieldValue::cleared(field));
        }
        match field {
            ClientField::Name if input.is_empty() => Err(replies::value_prompt(field, &self.catalog)),
            ClientField::Name => Ok(FieldValue::Name(Some(input.to_string()))),
            ClientField::Phone if is_valid_phone(input) => Ok(FieldValue::Phone(Some(input.trim().to_string()))),
            ClientField::Phone => Err(replies::UPDATE_INVALID_PHONE.to_string()),
            ClientField::Treatment => self
                .catalog
                .by_choice(input)
                .map(|t| FieldValue::Treatment(Some(t.key.clone())))
                .ok_or_else(|| replies::invalid_treatment(&self.catalog)),
            ClientField::LastTreatment => parse_date(input)
                .map(|d| FieldValue::LastTreatment(Some(d)))
                .ok_or_else(|| replies::UPDATE_INVALID_DATE.to_string()),
            ClientField::NextReminder => parse_date(input)
                .map(|d| FieldValue::NextReminder(Some(d)))
                .ok_or_else(|| replies::UPDATE_INVALID_DATE.to_string()),
        }
    }
}

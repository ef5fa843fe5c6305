//! Conversation flow tests for the chatbot module.
//!
//! Run with: cargo test chatbot

use std::sync::Arc;

use chrono::NaiveDate;

use super::record::{ClientField, ClientRecord};
use super::reminders::today_in;
use super::replies;
use super::session::SessionState;
use super::store::SharedStore;
use super::test_support::{GatedMessenger, RecordingMessenger, client, engine_with};
use super::ConversationEngine;

const STAFF: &str = "+573009998877";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    today_in(chrono_tz::America::Bogota)
}

fn setup(clients: Vec<ClientRecord>) -> (Arc<ConversationEngine>, SharedStore, Arc<RecordingMessenger>) {
    let messenger = Arc::new(RecordingMessenger::new());
    let (engine, store) = engine_with(clients, messenger.clone());
    (engine, store, messenger)
}

async fn send_all(engine: &ConversationEngine, inputs: &[&str]) -> Vec<String> {
    let mut replies = Vec::new();
    for input in inputs {
        replies.push(engine.handle_message(STAFF, input).await);
    }
    replies
}

// =============================================================================
// GLOBAL COMMANDS
// =============================================================================

mod global_commands {
    use super::*;

    #[tokio::test]
    async fn test_menu_resets_from_update_value() {
        let (engine, _, _) = setup(vec![client(7)]);
        send_all(&engine, &["4", "7", "5"]).await;
        assert_eq!(
            engine.session_state(STAFF).await,
            SessionState::UpdateValue { client_id: 7, field: ClientField::NextReminder }
        );

        let reply = engine.handle_message(STAFF, "MENU").await;
        assert_eq!(reply, replies::menu());
        assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);
    }

    #[tokio::test]
    async fn test_menu_is_case_insensitive_with_aliases() {
        let (engine, _, _) = setup(vec![]);
        for command in ["menu", "Inicio", "MENÚ", "  MENU  "] {
            send_all(&engine, &["1", "Jane"]).await;
            assert_eq!(engine.handle_message(STAFF, command).await, replies::menu());
            assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);
        }
    }

    #[tokio::test]
    async fn test_menu_discards_partial_add() {
        let (engine, store, _) = setup(vec![]);
        send_all(&engine, &["1", "Jane Doe", "+573001234567", "MENU", "SALTAR"]).await;
        assert!(store.lock().await.is_empty());
        assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);
    }

    #[tokio::test]
    async fn test_help_keeps_state() {
        let (engine, _, _) = setup(vec![]);
        send_all(&engine, &["1", "Jane Doe"]).await;

        for command in ["AYUDA", "help"] {
            assert_eq!(engine.handle_message(STAFF, command).await, replies::help());
            assert_eq!(
                engine.session_state(STAFF).await,
                SessionState::AddPhone { name: "Jane Doe".to_string() }
            );
        }
    }
}

// =============================================================================
// MAIN MENU
// =============================================================================

mod main_menu {
    use super::*;

    #[tokio::test]
    async fn test_unknown_input_shows_menu() {
        let (engine, _, _) = setup(vec![]);
        assert_eq!(engine.handle_message(STAFF, "hola").await, replies::menu());
        assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);
    }

    #[tokio::test]
    async fn test_list_clients() {
        let (engine, _, _) = setup((1..=3).map(client).collect());
        let reply = engine.handle_message(STAFF, "2").await;
        assert!(reply.contains("(Total: 3)"));
        assert!(reply.contains("*2* - Cliente 2"));
        assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);
    }

    #[tokio::test]
    async fn test_view_prompt_then_id_shows_detail() {
        let (engine, _, _) = setup(vec![client(12)]);
        assert_eq!(engine.handle_message(STAFF, "3").await, replies::VIEW_PROMPT);
        assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);

        let reply = engine.handle_message(STAFF, "12").await;
        assert!(reply.contains("Cliente 12"));
        assert!(reply.contains("(ID: 12)"));
    }

    #[tokio::test]
    async fn test_unknown_id_shows_not_found() {
        let (engine, _, _) = setup(vec![client(12)]);
        let reply = engine.handle_message(STAFF, "99").await;
        assert!(reply.starts_with("⚠️ No existe clienta con ID 99"));
        assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);
    }

    #[tokio::test]
    async fn test_run_reminders_now() {
        let mut due = client(8);
        due.next_reminder = Some(today());
        let (engine, store, messenger) = setup(vec![due, client(9)]);

        let reply = engine.handle_message(STAFF, "5").await;
        assert!(reply.starts_with(replies::REMINDERS_RUN));
        assert!(reply.contains("enviados: 1"));
        assert_eq!(messenger.sent().len(), 1);
        assert_eq!(store.lock().await.find_by_id(8).unwrap().next_reminder, None);
        assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);
    }

    #[tokio::test]
    async fn test_messages_from_one_sender_take_turns() {
        let mut due = client(8);
        due.next_reminder = Some(today());
        let messenger = Arc::new(GatedMessenger::new());
        let (engine, _) = engine_with(vec![due], messenger.clone());

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.handle_message(STAFF, "5").await }
        });
        messenger.wait_started().await;
        let second = tokio::spawn({
            let engine = engine.clone();
            async move { engine.handle_message(STAFF, "1").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        messenger.release();
        assert!(first.await.unwrap().starts_with(replies::REMINDERS_RUN));
        assert_eq!(second.await.unwrap(), replies::ADD_NAME_PROMPT);
        assert_eq!(engine.session_state(STAFF).await, SessionState::AddName);
        assert_eq!(messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_option_six_is_help() {
        let (engine, _, _) = setup(vec![]);
        assert_eq!(engine.handle_message(STAFF, "6").await, replies::help());
    }
}

// =============================================================================
// ADD CLIENT FLOW
// =============================================================================

mod add_flow {
    use super::*;

    #[tokio::test]
    async fn test_add_with_skips() {
        let (engine, store, _) = setup(vec![]);
        let replies = send_all(
            &engine,
            &["1", "Jane Doe", "+573001234567", "1", "SALTAR", "SALTAR"],
        )
        .await;

        let last = replies.last().unwrap();
        assert!(last.contains("Clienta agregada exitosamente"));
        assert!(last.contains("ID: 1"));
        assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);

        let store = store.lock().await;
        let created = store.find_by_id(1).unwrap();
        assert_eq!(created.name.as_deref(), Some("Jane Doe"));
        assert_eq!(created.phone.as_deref(), Some("+573001234567"));
        assert_eq!(created.treatment_type.as_deref(), Some("keratina"));
        assert_eq!(created.last_treatment_date, Some(today()));
        assert_eq!(created.next_reminder, None);
        assert_eq!(created.last_reminder_sent, None);
    }

    #[tokio::test]
    async fn test_add_with_explicit_dates() {
        let (engine, store, _) = setup(vec![client(4)]);
        send_all(
            &engine,
            &["1", "Carolina Ruiz", "+573007654321", "2", "2024-09-20", "2024-11-20"],
        )
        .await;

        let store = store.lock().await;
        let created = store.find_by_id(5).unwrap();
        assert_eq!(created.treatment_type.as_deref(), Some("botox_capilar"));
        assert_eq!(created.last_treatment_date, Some(date(2024, 9, 20)));
        assert_eq!(created.next_reminder, Some(date(2024, 11, 20)));
    }

    #[tokio::test]
    async fn test_phone_without_plus_is_rejected() {
        let (engine, _, _) = setup(vec![]);
        send_all(&engine, &["1", "Jane Doe"]).await;

        let first = engine.handle_message(STAFF, "5551234").await;
        assert_eq!(first, replies::INVALID_PHONE);
        assert_eq!(
            engine.session_state(STAFF).await,
            SessionState::AddPhone { name: "Jane Doe".to_string() }
        );

        let second = engine.handle_message(STAFF, "+12345").await;
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_invalid_treatment_reprompts_with_catalog() {
        let (engine, _, _) = setup(vec![]);
        send_all(&engine, &["1", "Jane Doe", "+573001234567"]).await;

        for input in ["0", "3", "keratina"] {
            let reply = engine.handle_message(STAFF, input).await;
            assert!(reply.starts_with("⚠️ Opción inválida."));
            assert!(reply.contains("TRATAMIENTOS DISPONIBLES"));
            assert_eq!(engine.session_state(STAFF).await.name(), "ADD_TREATMENT");
        }
    }

    #[tokio::test]
    async fn test_invalid_dates_reprompt() {
        let (engine, store, _) = setup(vec![]);
        send_all(&engine, &["1", "Jane Doe", "+573001234567", "1"]).await;

        assert_eq!(engine.handle_message(STAFF, "15/10/2024").await, replies::INVALID_LAST_DATE);
        assert_eq!(engine.session_state(STAFF).await.name(), "ADD_LAST_DATE");

        engine.handle_message(STAFF, "2024-10-15").await;
        assert_eq!(engine.handle_message(STAFF, "mañana").await, replies::INVALID_NEXT_DATE);
        assert_eq!(engine.session_state(STAFF).await.name(), "ADD_NEXT_DATE");
        assert!(store.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_per_sender() {
        let (engine, _, _) = setup(vec![]);
        engine.handle_message(STAFF, "1").await;
        engine.handle_message("+570000000000", "4").await;

        assert_eq!(engine.session_state(STAFF).await, SessionState::AddName);
        assert_eq!(engine.session_state("+570000000000").await, SessionState::UpdateSelectId);
    }
}

// =============================================================================
// UPDATE CLIENT FLOW
// =============================================================================

mod update_flow {
    use super::*;

    #[tokio::test]
    async fn test_update_next_reminder() {
        let (engine, store, _) = setup(vec![client(7)]);
        let replies = send_all(&engine, &["4", "7", "5", "2025-01-15"]).await;

        assert!(replies[1].contains("Actualizando: *Cliente 7*"));
        assert!(replies[3].contains("Campo *next_reminder* actualizado para Cliente 7"));
        assert_eq!(engine.session_state(STAFF).await, SessionState::Menu);
        assert_eq!(store.lock().await.find_by_id(7).unwrap().next_reminder, Some(date(2025, 1, 15)));
    }

    #[tokio::test]
    async fn test_update_treatment_resolves_key() {
        let (engine, store, _) = setup(vec![client(7)]);
        send_all(&engine, &["4", "7", "3"]).await;

        let reply = engine.handle_message(STAFF, "9").await;
        assert!(reply.contains("TRATAMIENTOS DISPONIBLES"));
        assert_eq!(engine.session_state(STAFF).await.name(), "UPDATE_VALUE");

        engine.handle_message(STAFF, "2").await;
        assert_eq!(
            store.lock().await.find_by_id(7).unwrap().treatment_type.as_deref(),
            Some("botox_capilar")
        );
    }

    #[tokio::test]
    async fn test_ninguno_clears_any_field() {
        let (engine, store, _) = setup(vec![client(7)]);
        for choice in ["1", "2", "3", "4"] {
            send_all(&engine, &["4", "7", choice, "ninguno"]).await;
        }

        let store = store.lock().await;
        let c = store.find_by_id(7).unwrap();
        assert_eq!(c.name, None);
        assert_eq!(c.phone, None);
        assert_eq!(c.treatment_type, None);
        assert_eq!(c.last_treatment_date, None);
        assert_eq!(c.display_name(), "Desconocida");
    }

    #[tokio::test]
    async fn test_update_validation_reprompts() {
        let (engine, store, _) = setup(vec![client(7)]);
        send_all(&engine, &["4", "7", "2"]).await;
        assert_eq!(engine.handle_message(STAFF, "3001234567").await, replies::UPDATE_INVALID_PHONE);

        send_all(&engine, &["MENU", "4", "7", "4"]).await;
        assert_eq!(engine.handle_message(STAFF, "2024/10/15").await, replies::UPDATE_INVALID_DATE);
        assert_eq!(
            engine.session_state(STAFF).await,
            SessionState::UpdateValue { client_id: 7, field: ClientField::LastTreatment }
        );
        assert_eq!(store.lock().await.find_by_id(7).unwrap(), &client(7));
    }

    #[tokio::test]
    async fn test_unknown_or_non_numeric_id() {
        let (engine, _, _) = setup(vec![client(7)]);
        engine.handle_message(STAFF, "4").await;

        assert_eq!(engine.handle_message(STAFF, "8").await, replies::update_id_unknown(8));
        assert_eq!(engine.handle_message(STAFF, "siete").await, replies::UPDATE_ID_NOT_NUMBER);
        assert_eq!(engine.session_state(STAFF).await, SessionState::UpdateSelectId);
    }

    #[tokio::test]
    async fn test_invalid_field_choice() {
        let (engine, _, _) = setup(vec![client(7)]);
        send_all(&engine, &["4", "7"]).await;

        assert_eq!(engine.handle_message(STAFF, "6").await, replies::UPDATE_FIELD_INVALID);
        assert_eq!(engine.session_state(STAFF).await, SessionState::UpdateSelectField { client_id: 7 });
    }
}

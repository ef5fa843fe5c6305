//! Inbound WhatsApp webhook.
//!
//! Twilio posts each inbound message as a form with `From` and `Body` and
//! expects a TwiML document back; the `<Message>` in it is the reply.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{State, rejection::FormRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::chatbot::engine::ConversationEngine;
use crate::chatbot::replies;
use crate::chatbot::whatsapp::strip_transport_prefix;

pub const HEALTH_TEXT: &str = "Estilista: OK\n";

#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<ConversationEngine>,
}

/// Form fields Twilio sends for an inbound message.
#[derive(Debug, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

pub fn build_router(engine: Arc<ConversationEngine>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/whatsapp", post(whatsapp_handler))
        .with_state(GatewayState { engine })
}

async fn health_handler() -> &'static str {
    HEALTH_TEXT
}

async fn whatsapp_handler(
    State(state): State<GatewayState>,
    form: Result<Form<InboundMessage>, FormRejection>,
) -> Response {
    let Form(message) = match form {
        Ok(form) => form,
        Err(e) => {
            warn!("Bad webhook request: {e}");
            return twiml(StatusCode::BAD_REQUEST, replies::BAD_REQUEST);
        }
    };

    let reply = reply_to(state.engine.clone(), &message.from, &message.body).await;
    twiml(StatusCode::OK, &reply)
}

/// Run one inbound message through the engine.
///
/// An empty body gets the menu without touching the session. Processing runs
/// in its own task so a panic turns into the generic apology instead of
/// tearing down the connection.
pub async fn reply_to(engine: Arc<ConversationEngine>, from: &str, body: &str) -> String {
    let sender = strip_transport_prefix(from).to_string();
    let body = body.trim().to_string();
    if body.is_empty() {
        return replies::menu();
    }

    let task = tokio::spawn(async move { engine.handle_message(&sender, &body).await });
    match task.await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Error processing webhook message: {e}");
            replies::INTERNAL_ERROR.to_string()
        }
    }
}

fn twiml(status: StatusCode, text: &str) -> Response {
    (status, [(header::CONTENT_TYPE, "application/xml")], envelope(text)).into_response()
}

/// Wrap reply text in a TwiML message document.
pub fn envelope(text: &str) -> String {
    format!(
        "<?xml version='1.0' encoding='UTF-8'?><Response><Message>{}</Message></Response>",
        xml_escape(text)
    )
}

/// Escape a string for safe inclusion in XML content.
fn xml_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    result
}

pub async fn serve(engine: Arc<ConversationEngine>, bind_addr: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(engine);

    let ip: IpAddr = bind_addr.parse().unwrap_or_else(|_| {
        warn!("Invalid bind address '{bind_addr}', using 0.0.0.0");
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    });
    let addr = SocketAddr::new(ip, port);
    info!("🌐 Webhook listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::session::SessionState;
    use crate::chatbot::test_support::{PanickingMessenger, RecordingMessenger, engine_with};

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_envelope_escapes_markup() {
        assert_eq!(
            envelope("a < b & c > d"),
            "<?xml version='1.0' encoding='UTF-8'?><Response><Message>a &lt; b &amp; c &gt; d</Message></Response>"
        );
    }

    #[tokio::test]
    async fn test_empty_body_returns_menu() {
        let (engine, _) = engine_with(vec![], Arc::new(RecordingMessenger::new()));
        let reply = reply_to(engine, "whatsapp:+573001234567", "   ").await;
        assert_eq!(reply, replies::menu());
    }

    #[tokio::test]
    async fn test_sender_prefix_is_stripped() {
        let (engine, _) = engine_with(vec![], Arc::new(RecordingMessenger::new()));
        reply_to(engine.clone(), "whatsapp:+573001234567", "1").await;
        assert_eq!(engine.session_state("+573001234567").await, SessionState::AddName);
    }

    #[tokio::test]
    async fn test_panic_becomes_apology() {
        let mut client = crate::chatbot::test_support::client(7);
        client.next_reminder = Some(crate::chatbot::reminders::today_in(chrono_tz::America::Bogota));
        let (engine, _) = engine_with(vec![client], Arc::new(PanickingMessenger));

        let reply = reply_to(engine, "whatsapp:+573001234567", "5").await;
        assert_eq!(reply, replies::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn test_handler_wraps_reply_in_twiml() {
        let (engine, _) = engine_with(vec![], Arc::new(RecordingMessenger::new()));
        let message = InboundMessage { from: "whatsapp:+573001234567".into(), body: "AYUDA".into() };

        let response = whatsapp_handler(State(GatewayState { engine }), Ok(Form(message))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");
        let body = body_text(response).await;
        assert!(body.starts_with("<?xml"));
        assert!(body.contains("AYUDA DEL SISTEMA"));
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health_handler().await, HEALTH_TEXT);
    }
}

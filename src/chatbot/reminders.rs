//! Follow-up reminders for clients whose treatment is due.
//!
//! A staff-set `next_reminder` always wins. Without one, the due date is
//! `last_treatment_date + 30 days × duration_months` (a fixed 30-day month,
//! not calendar months). At most one reminder goes out per client per day.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chatbot::catalog::Catalog;
use crate::chatbot::messenger::Messenger;
use crate::chatbot::record::ClientRecord;
use crate::chatbot::store::SharedStore;

const DAYS_PER_MONTH: u64 = 30;

pub const DEFAULT_PROMO: &str = "PROMO: Si agendas esta semana, trato hidratante GRATIS + 10% dto.";
pub const DEFAULT_SALON_PHONE: &str = "350-231-7566";

/// What a reminder pass should do with one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The staff-set date is today.
    Manual,
    /// The computed date is today.
    Fallback(NaiveDate),
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoPhone,
    ManualNotToday(NaiveDate),
    AlreadySentToday,
    MissingData,
    UnknownTreatment(String),
    FallbackNotToday(NaiveDate),
    /// The computed date falls outside the supported calendar.
    DateOutOfRange,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPhone => write!(f, "no phone on file"),
            Self::ManualNotToday(d) => write!(f, "manual reminder set for {d}"),
            Self::AlreadySentToday => write!(f, "already reminded today"),
            Self::MissingData => write!(f, "no reminder date and not enough data to compute one"),
            Self::UnknownTreatment(key) => write!(f, "unknown treatment '{key}'"),
            Self::FallbackNotToday(d) => write!(f, "computed reminder date is {d}"),
            Self::DateOutOfRange => write!(f, "computed reminder date is out of range"),
        }
    }
}

/// `last + 30 × months` days, `None` past the end of the calendar.
pub fn fallback_date(last_treatment: NaiveDate, duration_months: u32) -> Option<NaiveDate> {
    last_treatment.checked_add_days(Days::new(DAYS_PER_MONTH * u64::from(duration_months)))
}

pub fn decide(client: &ClientRecord, catalog: &Catalog, today: NaiveDate) -> Decision {
    if client.phone.as_deref().is_none_or(|p| p.trim().is_empty()) {
        return Decision::Skip(SkipReason::NoPhone);
    }

    let already_sent = client.last_reminder_sent == Some(today);

    if let Some(manual) = client.next_reminder {
        return if manual != today {
            Decision::Skip(SkipReason::ManualNotToday(manual))
        } else if already_sent {
            Decision::Skip(SkipReason::AlreadySentToday)
        } else {
            Decision::Manual
        };
    }

    let (Some(last), Some(key)) = (client.last_treatment_date, client.treatment_type.as_deref()) else {
        return Decision::Skip(SkipReason::MissingData);
    };
    let Some(treatment) = catalog.get(key) else {
        return Decision::Skip(SkipReason::UnknownTreatment(key.to_string()));
    };
    if treatment.duration_months == 0 {
        return Decision::Skip(SkipReason::MissingData);
    }

    let Some(due) = fallback_date(last, treatment.duration_months) else {
        return Decision::Skip(SkipReason::DateOutOfRange);
    };
    if due != today {
        Decision::Skip(SkipReason::FallbackNotToday(due))
    } else if already_sent {
        Decision::Skip(SkipReason::AlreadySentToday)
    } else {
        Decision::Fallback(due)
    }
}

/// Text of the reminder message.
#[derive(Debug, Clone)]
pub struct ReminderTemplate {
    pub salon_phone: String,
    pub promo: Option<String>,
}

impl Default for ReminderTemplate {
    fn default() -> Self {
        Self {
            salon_phone: DEFAULT_SALON_PHONE.to_string(),
            promo: Some(DEFAULT_PROMO.to_string()),
        }
    }
}

impl ReminderTemplate {
    pub fn render(&self, client: &ClientRecord, catalog: &Catalog) -> String {
        let treatment = client.treatment_type.as_deref().and_then(|k| catalog.get(k));
        let (service, price) = match treatment {
            Some(t) => (t.name.as_str(), t.price.as_str()),
            None => ("tu tratamiento", "Consultar"),
        };
        let date = client
            .next_reminder
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Hoy".to_string());

        let mut text = format!(
            "💆‍♀️ ¡Hola {}! ✨\n\n\
             Es momento de consentir tu cabello de nuevo 💕\n\
             📅 Tu recordatorio: {date}\n\n\
             🔸 Servicio: {service}\n\
             💰 Inversión estimada: {price}\n\n",
            client.display_name()
        );
        if let Some(ref promo) = self.promo {
            text.push_str(&format!("🎁 {promo}\n\n"));
        }
        text.push_str(&format!(
            "📱 Agenda tu cita respondiendo este mensaje o llamando al: {}\n\n\
             ¿Te va bien este día para agendar? 😊",
            self.salon_phone
        ));
        text
    }
}

/// A reminder selected for sending.
struct DueReminder {
    client_id: u32,
    name: String,
    phone: String,
    message: String,
    clear_next: bool,
}

/// Runs reminder passes over the client store.
pub struct ReminderEngine {
    store: SharedStore,
    catalog: Arc<Catalog>,
    messenger: Arc<dyn Messenger>,
    template: ReminderTemplate,
    tz: Tz,
    /// Held for a whole pass so overlapping passes run one after the other.
    pass: Mutex<()>,
}

impl ReminderEngine {
    pub fn new(
        store: SharedStore,
        catalog: Arc<Catalog>,
        messenger: Arc<dyn Messenger>,
        template: ReminderTemplate,
        tz: Tz,
    ) -> Self {
        Self { store, catalog, messenger, template, tz, pass: Mutex::new(()) }
    }

    pub fn today(&self) -> NaiveDate {
        today_in(self.tz)
    }

    /// Run a pass for today in the configured timezone.
    pub async fn run_check(&self) -> usize {
        self.run_check_on(self.today()).await
    }

    /// Run a pass as if `today` were the current date. Returns how many
    /// reminders were sent.
    pub async fn run_check_on(&self, today: NaiveDate) -> usize {
        let _pass = self.pass.lock().await;
        info!("🔔 Reminder check for {today}");

        // Select under the lock, send without it.
        let due: Vec<DueReminder> = {
            let store = self.store.lock().await;
            store
                .clients()
                .iter()
                .filter_map(|client| self.select(client, today))
                .collect()
        };

        let mut sent = 0;
        for reminder in due {
            match self.messenger.send_text(&reminder.phone, &reminder.message).await {
                Ok(message_id) => {
                    info!("Sent reminder to {} (msg {})", reminder.name, message_id);
                    sent += 1;
                    self.mark_sent(&reminder, today).await;
                }
                Err(e) => {
                    // Left unmarked so the next pass retries.
                    warn!("Failed to send reminder to {}: {}", reminder.name, e);
                }
            }
        }

        info!("✅ Reminder check finished, {sent} sent");
        sent
    }

    /// Record a delivered reminder. The record may have been edited while
    /// the message was in flight, so the manual date is only cleared if it
    /// still is the one that triggered the send.
    async fn mark_sent(&self, reminder: &DueReminder, today: NaiveDate) {
        let mut store = self.store.lock().await;
        let Some(client) = store.find_by_id(reminder.client_id) else {
            warn!("Client {} vanished before it could be marked", reminder.client_id);
            return;
        };
        let unchanged = match decide(client, &self.catalog, today) {
            Decision::Manual => reminder.clear_next,
            Decision::Fallback(_) => !reminder.clear_next,
            Decision::Skip(_) => false,
        };
        if !unchanged {
            info!("Client {} changed during send, keeping its reminder date", reminder.client_id);
        }
        store.mark_reminder_sent(reminder.client_id, today, reminder.clear_next && unchanged);
    }

    fn select(&self, client: &ClientRecord, today: NaiveDate) -> Option<DueReminder> {
        let name = client.display_name().to_string();
        let clear_next = match decide(client, &self.catalog, today) {
            Decision::Manual => true,
            Decision::Fallback(_) => false,
            Decision::Skip(reason @ (SkipReason::ManualNotToday(_) | SkipReason::FallbackNotToday(_))) => {
                debug!("Skipping {name}: {reason}");
                return None;
            }
            Decision::Skip(reason) => {
                info!("ℹ️ Skipping {name}: {reason}");
                return None;
            }
        };

        Some(DueReminder {
            client_id: client.id,
            phone: client.phone.clone().unwrap_or_default(),
            message: self.template.render(client, &self.catalog),
            name,
            clear_next,
        })
    }
}

/// Current date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Parse a 7-field cron expression (sec min hour day month dow year).
pub fn parse_schedule(expr: &str) -> Result<Schedule, String> {
    Schedule::from_str(expr).map_err(|e| format!("Invalid cron: {}", e))
}

/// Validate cron expression.
pub fn validate_cron(expr: &str) -> Result<(), String> {
    parse_schedule(expr).map(|_| ())
}

/// Get next trigger time from cron expression.
pub fn next_cron_trigger<Z: TimeZone>(expr: &str, after: &DateTime<Z>) -> Result<DateTime<Z>, String> {
    let schedule = parse_schedule(expr)?;
    schedule
        .after(after)
        .next()
        .ok_or_else(|| "No future occurrence for cron".to_string())
}

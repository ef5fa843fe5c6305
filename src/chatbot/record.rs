//! Client records as persisted in the client file.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Shown wherever a client has no name on file.
pub const UNKNOWN_NAME: &str = "Desconocida";

/// A salon client.
///
/// Saved with the English field names; the Spanish aliases let older
/// client files load without conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: u32,
    #[serde(default, alias = "nombre")]
    pub name: Option<String>,
    #[serde(default, alias = "telefono")]
    pub phone: Option<String>,
    #[serde(default, alias = "ultimo_tratamiento")]
    pub last_treatment_date: Option<NaiveDate>,
    #[serde(default, alias = "tipo_tratamiento")]
    pub treatment_type: Option<String>,
    #[serde(default, alias = "tipo_cabello")]
    pub hair_type: Option<String>,
    #[serde(default, alias = "notas")]
    pub notes: Option<String>,
    /// Staff-set reminder date. `None` means the date is computed from the treatment.
    #[serde(default, alias = "proximo_recordatorio")]
    pub next_reminder: Option<NaiveDate>,
    #[serde(default, alias = "ultimo_recordatorio_enviado")]
    pub last_reminder_sent: Option<NaiveDate>,
}

impl ClientRecord {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_NAME)
    }
}

/// Fields a client record is built from. The store assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
    pub treatment_type: String,
    pub last_treatment_date: NaiveDate,
    pub hair_type: Option<String>,
    pub notes: Option<String>,
    pub next_reminder: Option<NaiveDate>,
}

/// The fields staff can edit from the chat menu, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientField {
    Name,
    Phone,
    Treatment,
    LastTreatment,
    NextReminder,
}

impl ClientField {
    /// Parse the menu choice "1".."5".
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice {
            "1" => Some(Self::Name),
            "2" => Some(Self::Phone),
            "3" => Some(Self::Treatment),
            "4" => Some(Self::LastTreatment),
            "5" => Some(Self::NextReminder),
            _ => None,
        }
    }

    /// Key of the field in the persisted record.
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Treatment => "treatment_type",
            Self::LastTreatment => "last_treatment_date",
            Self::NextReminder => "next_reminder",
        }
    }

    pub fn is_date(self) -> bool {
        matches!(self, Self::LastTreatment | Self::NextReminder)
    }
}

/// A validated value for one field. `None` clears the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Name(Option<String>),
    Phone(Option<String>),
    Treatment(Option<String>),
    LastTreatment(Option<NaiveDate>),
    NextReminder(Option<NaiveDate>),
}

impl FieldValue {
    /// The value that clears `field`.
    pub fn cleared(field: ClientField) -> Self {
        match field {
            ClientField::Name => Self::Name(None),
            ClientField::Phone => Self::Phone(None),
            ClientField::Treatment => Self::Treatment(None),
            ClientField::LastTreatment => Self::LastTreatment(None),
            ClientField::NextReminder => Self::NextReminder(None),
        }
    }

    pub fn field(&self) -> ClientField {
        match self {
            Self::Name(_) => ClientField::Name,
            Self::Phone(_) => ClientField::Phone,
            Self::Treatment(_) => ClientField::Treatment,
            Self::LastTreatment(_) => ClientField::LastTreatment,
            Self::NextReminder(_) => ClientField::NextReminder,
        }
    }

    pub(crate) fn apply(self, client: &mut ClientRecord) {
        match self {
            Self::Name(v) => client.name = v,
            Self::Phone(v) => client.phone = v,
            Self::Treatment(v) => client.treatment_type = v,
            Self::LastTreatment(v) => client.last_treatment_date = v,
            Self::NextReminder(v) => client.next_reminder = v,
        }
    }
}

//! Client store: the whole collection in memory, mirrored to one JSON file.
//!
//! Every mutation rewrites the file. Saving is best-effort: failures are
//! logged and the in-memory collection stays authoritative.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chatbot::record::{ClientRecord, FieldValue, NewClient};

/// Store shared by the gateway, the console and the timer.
pub type SharedStore = Arc<Mutex<ClientStore>>;

/// Errors reading or writing the client file.
#[derive(Debug)]
pub enum StoreError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Serialize(serde_json::Error),
    Write { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read client file '{}': {}", path.display(), source)
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse client file '{}': {}", path.display(), source)
            }
            Self::Serialize(source) => write!(f, "failed to serialize clients: {}", source),
            Self::Write { path, source } => {
                write!(f, "failed to write client file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(source) => Some(source),
            Self::Write { source, .. } => Some(source),
        }
    }
}

pub struct ClientStore {
    /// `None` keeps the store in memory only.
    path: Option<PathBuf>,
    clients: Vec<ClientRecord>,
}

impl ClientStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self { path: None, clients: Vec::new() }
    }

    /// Create an in-memory store holding `clients`.
    pub fn with_clients(clients: Vec<ClientRecord>) -> Self {
        Self { path: None, clients }
    }

    /// Read the client file. A missing file yields an empty store bound to `path`.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let path = path.to_path_buf();
        if !path.exists() {
            return Ok(Self { path: Some(path), clients: Vec::new() });
        }

        let json = std::fs::read_to_string(&path)
            .map_err(|e| StoreError::Read { path: path.clone(), source: e })?;
        let clients: Vec<ClientRecord> = serde_json::from_str(&json)
            .map_err(|e| StoreError::Parse { path: path.clone(), source: e })?;

        Ok(Self { path: Some(path), clients })
    }

    /// Load from file, falling back to an empty collection on any error.
    pub fn load_or_new(path: &Path) -> Self {
        match Self::load(path) {
            Ok(store) if store.clients.is_empty() => {
                info!("📁 No clients in {:?}, starting fresh", path);
                store
            }
            Ok(store) => {
                info!("📂 Loaded {} clients from {:?}", store.clients.len(), path);
                store
            }
            Err(e) => {
                warn!("Failed to load clients: {e}");
                Self { path: Some(path.to_path_buf()), clients: Vec::new() }
            }
        }
    }

    /// Write the whole collection. Writes a temp file next to the target and
    /// renames it into place so a crash never leaves a truncated file.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(&self.clients).map_err(StoreError::Serialize)?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let write_err = |e: std::io::Error| StoreError::Write { path: path.clone(), source: e };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        info!("💾 Saved {} clients", self.clients.len());
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            error!("{e}");
        }
    }

    pub fn clients(&self) -> &[ClientRecord] {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Next id: max existing + 1.
    pub fn next_id(&self) -> u32 {
        self.clients.iter().map(|c| c.id).max().unwrap_or(0) + 1
    }

    /// Append a new client and persist. Returns the stored record.
    pub fn add(&mut self, new: NewClient) -> ClientRecord {
        let record = ClientRecord {
            id: self.next_id(),
            name: Some(new.name),
            phone: Some(new.phone),
            last_treatment_date: Some(new.last_treatment_date),
            treatment_type: Some(new.treatment_type),
            hair_type: new.hair_type,
            notes: new.notes,
            next_reminder: new.next_reminder,
            last_reminder_sent: None,
        };
        self.clients.push(record.clone());
        self.persist();
        info!("➕ Added client {} (id {})", record.display_name(), record.id);
        record
    }

    pub fn find_by_id(&self, id: u32) -> Option<&ClientRecord> {
        self.clients.iter().find(|c| c.id == id)
    }

    /// Set one field on a client and persist. Returns false if the id is unknown.
    pub fn update_field(&mut self, id: u32, value: FieldValue) -> bool {
        let field = value.field();
        let Some(client) = self.clients.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        value.apply(client);
        self.persist();
        info!("✏️ Updated {} for client {}", field.key(), id);
        true
    }

    /// Record a successful reminder send. `clear_next` drops the manual date
    /// that triggered it.
    pub fn mark_reminder_sent(&mut self, id: u32, day: NaiveDate, clear_next: bool) -> bool {
        let Some(client) = self.clients.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        client.last_reminder_sent = Some(day);
        if clear_next {
            client.next_reminder = None;
        }
        self.persist();
        true
    }

    /// Insert two sample clients if the store is empty.
    pub fn seed_examples(&mut self) {
        if !self.clients.is_empty() {
            return;
        }
        self.clients = vec![
            ClientRecord {
                id: 1,
                name: Some("Ana María López".to_string()),
                phone: Some("+573001234567".to_string()),
                last_treatment_date: NaiveDate::from_ymd_opt(2024, 8, 15),
                treatment_type: Some("keratina".to_string()),
                hair_type: Some("rizado".to_string()),
                notes: Some("Prefiere citas los sábados".to_string()),
                next_reminder: None,
                last_reminder_sent: None,
            },
            ClientRecord {
                id: 2,
                name: Some("Carolina Ruiz".to_string()),
                phone: Some("+573007654321".to_string()),
                last_treatment_date: NaiveDate::from_ymd_opt(2024, 9, 20),
                treatment_type: Some("botox_capilar".to_string()),
                hair_type: Some("ondulado".to_string()),
                notes: Some("Cabello teñido, usar productos sin sal".to_string()),
                next_reminder: None,
                last_reminder_sent: None,
            },
        ];
        info!("🌱 Seeded sample clients");
        self.persist();
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }
}

impl Default for ClientStore {
    fn default() -> Self {
        Self::new()
    }
}

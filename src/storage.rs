use crate::models::{CapacityRecord, EntryRecord};
use crate::session::{AdminFlag, FlagStore, SessionError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::{fs, sync::{broadcast, Mutex}};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    ParkingControl,
    CarEntries,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::ParkingControl => "parking_control",
            Table::CarEntries => "car_entries",
        }
    }
}

/// Notification that a table changed. Carries no row data: receivers
/// always re-fetch the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("table '{0}' does not exist")]
    TableMissing(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Message shown to the operator.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::TableMissing(table) => format!(
                "Tabela '{table}' não encontrada no banco de dados! Crie a tabela antes de continuar."
            ),
            StoreError::Permission(_) => {
                "Erro de permissão! Verifique as políticas de acesso do banco.".to_string()
            }
            StoreError::Unreachable(_) => {
                "Erro ao acessar o banco de dados. Verifique sua conexão.".to_string()
            }
            StoreError::Io(_) | StoreError::Decode(_) => self.to_string(),
        }
    }
}

#[async_trait]
pub trait ParkingBackend: Send + Sync {
    /// The capacity row with the latest timestamp, if any.
    async fn latest_capacity(&self) -> Result<Option<CapacityRecord>, StoreError>;

    async fn append_capacity(&self, available: u32) -> Result<CapacityRecord, StoreError>;

    /// Every entry, newest first.
    async fn list_entries(&self) -> Result<Vec<EntryRecord>, StoreError>;

    async fn insert_entry(
        &self,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<EntryRecord, StoreError>;

    /// Push channel of table changes, when the backend has one.
    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeEvent>>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendData {
    #[serde(default)]
    pub parking_control: Vec<CapacityRecord>,
    #[serde(default)]
    pub car_entries: Vec<EntryRecord>,
}

/// Both tables kept in one JSON file, with an in-process change feed.
pub struct FileBackend {
    path: PathBuf,
    data: Mutex<BackendData>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl FileBackend {
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let data = load_data(&path).await;
        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            path,
            data: Mutex::new(data),
            changes,
        })
    }

    fn notify(&self, table: Table) {
        // No subscribers is fine; the poll picks the change up.
        let _ = self.changes.send(ChangeEvent { table });
    }
}

#[async_trait]
impl ParkingBackend for FileBackend {
    async fn latest_capacity(&self) -> Result<Option<CapacityRecord>, StoreError> {
        let data = self.data.lock().await;
        Ok(data
            .parking_control
            .iter()
            .max_by_key(|record| record.recorded_at)
            .cloned())
    }

    async fn append_capacity(&self, available: u32) -> Result<CapacityRecord, StoreError> {
        let record = CapacityRecord {
            id: Uuid::new_v4().to_string(),
            available_spaces: i64::from(available),
            recorded_at: Utc::now(),
        };
        {
            let mut data = self.data.lock().await;
            data.parking_control.push(record.clone());
            persist_data(&self.path, &data).await?;
        }
        self.notify(Table::ParkingControl);
        Ok(record)
    }

    async fn list_entries(&self) -> Result<Vec<EntryRecord>, StoreError> {
        let data = self.data.lock().await;
        let mut entries = data.car_entries.clone();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn insert_entry(
        &self,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<EntryRecord, StoreError> {
        let entry = EntryRecord {
            id: Uuid::new_v4().to_string(),
            created_at,
            amount_paid: Some(amount),
        };
        {
            let mut data = self.data.lock().await;
            data.car_entries.push(entry.clone());
            persist_data(&self.path, &data).await?;
        }
        self.notify(Table::CarEntries);
        Ok(entry)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeEvent>> {
        Some(self.changes.subscribe())
    }
}

pub async fn load_data(path: &Path) -> BackendData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file: {err}");
                BackendData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BackendData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            BackendData::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &BackendData) -> Result<(), StoreError> {
    let payload =
        serde_json::to_vec_pretty(data).map_err(|err| StoreError::Decode(err.to_string()))?;
    fs::write(path, payload).await?;
    Ok(())
}

/// Client for a hosted PostgREST endpoint (`<url>/rest/v1/<table>`).
/// There is no push channel here, so only the periodic poll refreshes it.
pub struct RestBackend {
    client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize, Default)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
struct NewCapacity {
    vagas_disponiveis: u32,
}

#[derive(Serialize)]
struct NewEntry {
    #[serde(with = "rust_decimal::serde::float")]
    valor: Decimal,
    created_at: DateTime<Utc>,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            anon_key: anon_key.into(),
        }
    }

    fn request(&self, method: reqwest::Method, table: Table) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, table.name()))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        table: Table,
        request: RequestBuilder,
    ) -> Result<Vec<T>, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|err| StoreError::Unreachable(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| StoreError::Unreachable(err.to_string()))?;
        if !status.is_success() {
            return Err(classify_error(table, status, &body));
        }
        debug!(table = table.name(), bytes = body.len(), "fetched rows");
        serde_json::from_str(&body).map_err(|err| StoreError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ParkingBackend for RestBackend {
    async fn latest_capacity(&self) -> Result<Option<CapacityRecord>, StoreError> {
        let request = self
            .request(reqwest::Method::GET, Table::ParkingControl)
            .query(&[("select", "*"), ("order", "created_at.desc"), ("limit", "1")]);
        let rows: Vec<CapacityRecord> = self.fetch(Table::ParkingControl, request).await?;
        Ok(rows.into_iter().next())
    }

    async fn append_capacity(&self, available: u32) -> Result<CapacityRecord, StoreError> {
        let request = self
            .request(reqwest::Method::POST, Table::ParkingControl)
            .header("Prefer", "return=representation")
            .json(&[NewCapacity {
                vagas_disponiveis: available,
            }]);
        let rows: Vec<CapacityRecord> = self.fetch(Table::ParkingControl, request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn list_entries(&self) -> Result<Vec<EntryRecord>, StoreError> {
        let request = self
            .request(reqwest::Method::GET, Table::CarEntries)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.fetch(Table::CarEntries, request).await
    }

    async fn insert_entry(
        &self,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<EntryRecord, StoreError> {
        let request = self
            .request(reqwest::Method::POST, Table::CarEntries)
            .header("Prefer", "return=representation")
            .json(&[NewEntry {
                valor: amount,
                created_at,
            }]);
        let rows: Vec<EntryRecord> = self.fetch(Table::CarEntries, request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeEvent>> {
        None
    }
}

fn classify_error(table: Table, status: StatusCode, body: &str) -> StoreError {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code.unwrap_or_default();
    let message = parsed.message.unwrap_or_else(|| format!("{status}: {body}"));

    if code == "PGRST116" || code == "42P01" || message.contains("does not exist") {
        StoreError::TableMissing(table.name().to_string())
    } else if code == "42501" || status == StatusCode::FORBIDDEN {
        StoreError::Permission(message)
    } else if status.is_server_error() {
        StoreError::Unreachable(message)
    } else {
        StoreError::Decode(message)
    }
}

/// Admin flag persisted as a small JSON file next to the data file.
pub struct FileFlagStore {
    path: PathBuf,
}

impl FileFlagStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl FlagStore for FileFlagStore {
    async fn load(&self) -> Result<Option<AdminFlag>, SessionError> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| SessionError::Storage(err.to_string())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SessionError::Storage(err.to_string())),
        }
    }

    async fn save(&self, flag: &AdminFlag) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| SessionError::Storage(err.to_string()))?;
        }
        let payload =
            serde_json::to_vec_pretty(flag).map_err(|err| SessionError::Storage(err.to_string()))?;
        fs::write(&self.path, payload)
            .await
            .map_err(|err| SessionError::Storage(err.to_string()))
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SessionError::Storage(err.to_string())),
        }
    }
}

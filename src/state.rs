use crate::config::{BackendConfig, Config};
use crate::display::Occupancy;
use crate::export::{ExportError, ExportInput, ExportPayload, build_today_export};
use crate::models::{CapacityRecord, EntryRecord};
use crate::revenue::{self, Aggregates, DayRevenue};
use crate::session::AdminGate;
use crate::storage::{FileBackend, FileFlagStore, ParkingBackend, RestBackend, StoreError, Table};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub const RECENT_ENTRIES: usize = 10;

/// Last fetched copies of both tables plus everything derived from them.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub occupancy: Occupancy,
    pub entries: Vec<EntryRecord>,
    pub aggregates: Aggregates,
    pub last_update: Option<DateTime<Utc>>,
}

impl Dashboard {
    pub fn new(total_spaces: u32, today: chrono::NaiveDate) -> Self {
        Self {
            occupancy: Occupancy::vacant(total_spaces),
            entries: Vec::new(),
            aggregates: Aggregates::empty(today),
            last_update: None,
        }
    }

    /// Replaces the entry log and recomputes every aggregate from it.
    pub fn apply_entries<Tz: TimeZone>(
        &mut self,
        entries: Vec<EntryRecord>,
        now: &DateTime<Tz>,
        price: rust_decimal::Decimal,
    ) {
        let mut next = revenue::aggregate(&entries, self.occupancy, now, price);
        next.today = revenue::carry_forward(Some(&self.aggregates.today), next.today);
        self.entries = entries;
        self.aggregates = next;
        self.last_update = Some(Utc::now());
    }

    /// Takes a new occupancy reading and reconciles today's figure with it.
    pub fn apply_occupancy(&mut self, occupancy: Occupancy, price: rust_decimal::Decimal) {
        self.occupancy = occupancy;
        self.aggregates.today =
            revenue::reconcile(self.aggregates.today.clone(), occupancy, price);
        self.last_update = Some(Utc::now());
    }

    /// Today's entries as cached by the last refresh.
    pub fn entries_today<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<EntryRecord> {
        revenue::entries_on_date(&self.entries, now.date_naive(), &now.timezone())
            .into_iter()
            .cloned()
            .collect()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn ParkingBackend>,
    pub dashboard: Arc<Mutex<Dashboard>>,
    pub gate: Arc<Mutex<AdminGate>>,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn ParkingBackend>, gate: AdminGate) -> Self {
        let dashboard = Dashboard::new(config.total_spaces, Local::now().date_naive());
        Self {
            config: Arc::new(config),
            backend,
            dashboard: Arc::new(Mutex::new(dashboard)),
            gate: Arc::new(Mutex::new(gate)),
        }
    }

    /// Opens the configured backend, restores the admin flag and loads the
    /// first snapshot. A failed first load is logged; the poll retries it.
    pub async fn initialize(config: Config) -> Result<Self, StoreError> {
        let backend: Arc<dyn ParkingBackend> = match &config.backend {
            BackendConfig::File { data_path } => {
                info!("using file backend at {}", data_path.display());
                Arc::new(FileBackend::open(data_path.clone()).await?)
            }
            BackendConfig::Rest { url, anon_key } => {
                info!("using REST backend at {url}");
                Arc::new(RestBackend::new(url.clone(), anon_key.clone()))
            }
        };
        let flags = Arc::new(FileFlagStore::new(config.session_path.clone()));
        let gate = AdminGate::restore(flags, config.admin_password.clone()).await;

        let state = Self::new(config, backend, gate);
        if let Err(err) = state.refresh_all().await {
            error!("initial refresh failed: {err}");
        }
        Ok(state)
    }

    pub async fn refresh_all(&self) -> Result<(), StoreError> {
        self.refresh_table(Table::ParkingControl).await?;
        self.refresh_table(Table::CarEntries).await
    }

    /// Re-fetches one table and rewrites the snapshot. Safe to call from the
    /// push and poll paths at the same time.
    pub async fn refresh_table(&self, table: Table) -> Result<(), StoreError> {
        match table {
            Table::ParkingControl => {
                let latest = self.backend.latest_capacity().await?;
                let occupancy = self.occupancy_from(latest.as_ref());
                let mut dashboard = self.dashboard.lock().await;
                dashboard.apply_occupancy(occupancy, self.config.price_per_entry);
            }
            Table::CarEntries => {
                let entries = self.backend.list_entries().await?;
                let mut dashboard = self.dashboard.lock().await;
                dashboard.apply_entries(entries, &Local::now(), self.config.price_per_entry);
            }
        }
        Ok(())
    }

    /// No capacity row yet means nothing has been parked.
    fn occupancy_from(&self, record: Option<&CapacityRecord>) -> Occupancy {
        let total = i64::from(self.config.total_spaces);
        match record {
            Some(record) => Occupancy::new(record.available_spaces, total),
            None => Occupancy::vacant(self.config.total_spaces),
        }
    }

    /// Registers a paid entry and takes one space from the lot.
    pub async fn register_entry(&self) -> Result<EntryRecord, StoreError> {
        let entry = self
            .backend
            .insert_entry(self.config.price_per_entry, Utc::now())
            .await?;
        info!(id = %entry.id, "car entry registered");

        let latest = self.backend.latest_capacity().await?;
        let current = self.occupancy_from(latest.as_ref());
        self.backend
            .append_capacity(current.available().saturating_sub(1))
            .await?;

        self.refresh_all().await?;
        Ok(entry)
    }

    /// Appends an occupancy reading, clamped to the lot size.
    pub async fn record_capacity(&self, available: i64) -> Result<CapacityRecord, StoreError> {
        let occupancy = Occupancy::new(available, i64::from(self.config.total_spaces));
        let record = self.backend.append_capacity(occupancy.available()).await?;
        info!(available = occupancy.available(), "capacity recorded");
        self.refresh_table(Table::ParkingControl).await?;
        Ok(record)
    }

    /// Picks the figures for today's export: the cached figures when they
    /// are complete, the occupancy otherwise, and a live read of the entry
    /// log as a last resort.
    pub async fn export_today(&self) -> Result<ExportPayload, ExportError> {
        let now = Local::now();
        let price = self.config.price_per_entry;
        let (cached, occupancy, cached_entries) = {
            let dashboard = self.dashboard.lock().await;
            (
                dashboard.aggregates.today.clone(),
                dashboard.occupancy,
                dashboard.entries_today(&now),
            )
        };

        let input = if cached.revenue > rust_decimal::Decimal::ZERO && cached.count > 0 {
            ExportInput {
                figures: cached,
                entries: Some(cached_entries),
            }
        } else if occupancy.occupied() > 0 {
            warn!("exporting from occupied spaces");
            ExportInput {
                figures: revenue::reconcile(
                    DayRevenue::empty(now.date_naive()),
                    occupancy,
                    price,
                ),
                entries: None,
            }
        } else {
            let entries = self
                .backend
                .list_entries()
                .await
                .map_err(|err| ExportError::BackendUnavailable(err.to_string()))?;
            let todays: Vec<EntryRecord> =
                revenue::entries_on_date(&entries, now.date_naive(), &now.timezone())
                    .into_iter()
                    .cloned()
                    .collect();
            let figures = revenue::today_revenue(&todays, occupancy, &now, price);
            ExportInput {
                figures,
                entries: Some(todays),
            }
        };

        let payload = build_today_export(&input, &now, price)?;
        info!(
            cars = payload.document.financial.total_cars,
            revenue = %payload.document.financial.revenue,
            "daily report exported"
        );
        Ok(payload)
    }

    /// Drops the admin-only figures on logout and rebuilds them from the
    /// backend. The occupancy and today's figure survive the reset: the
    /// public display keeps reading them and recorded income is never erased.
    pub async fn reset_dashboard(&self) {
        {
            let mut dashboard = self.dashboard.lock().await;
            let mut fresh = Dashboard::new(self.config.total_spaces, Local::now().date_naive());
            fresh.occupancy = dashboard.occupancy;
            fresh.aggregates.today = dashboard.aggregates.today.clone();
            *dashboard = fresh;
        }
        if let Err(err) = self.refresh_all().await {
            warn!("refresh after logout failed: {err}");
        }
    }
}

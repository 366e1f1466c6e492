use serde::{Deserialize, Serialize};

/// Parking occupancy with both counts clamped into a consistent range:
/// `0 <= available <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    available: u32,
    total: u32,
}

impl Occupancy {
    pub fn new(available: i64, total: i64) -> Self {
        let total = total.clamp(0, i64::from(u32::MAX)) as u32;
        let available = available.clamp(0, i64::from(total)) as u32;
        Self { available, total }
    }

    /// A lot with every space free.
    pub fn vacant(total: u32) -> Self {
        Self {
            available: total,
            total,
        }
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn occupied(&self) -> u32 {
        self.total - self.available
    }

    pub fn is_full(&self) -> bool {
        self.available == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityView {
    pub available: u32,
    pub occupied: u32,
    pub total: u32,
    pub percent_available: f64,
    pub percent_full: f64,
    pub is_full: bool,
}

impl From<Occupancy> for CapacityView {
    fn from(occupancy: Occupancy) -> Self {
        Self {
            available: occupancy.available(),
            occupied: occupancy.occupied(),
            total: occupancy.total(),
            percent_available: percent(occupancy.available(), occupancy.total()),
            percent_full: percent(occupancy.occupied(), occupancy.total()),
            is_full: occupancy.is_full(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    Available,
    Occupied,
}

/// Card shown side by side in the admin panel, one per [`DisplayKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactView {
    pub kind: DisplayKind,
    pub label: &'static str,
    pub value: u32,
    pub total: u32,
    pub percent: f64,
    pub is_full: bool,
    pub is_empty: bool,
}

impl CompactView {
    pub fn new(occupancy: Occupancy, kind: DisplayKind) -> Self {
        let (label, value) = match kind {
            DisplayKind::Available => ("Vagas Disponíveis", occupancy.available()),
            DisplayKind::Occupied => ("Vagas Ocupadas", occupancy.occupied()),
        };
        Self {
            kind,
            label,
            value,
            total: occupancy.total(),
            percent: percent(value, occupancy.total()),
            is_full: occupancy.is_full(),
            is_empty: occupancy.occupied() == 0,
        }
    }

    pub fn pair(occupancy: Occupancy) -> [Self; 2] {
        [
            Self::new(occupancy, DisplayKind::Available),
            Self::new(occupancy, DisplayKind::Occupied),
        ]
    }
}

fn percent(part: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(part) / f64::from(total) * 100.0
}

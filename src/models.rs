use crate::display::{CapacityView, CompactView};
use crate::revenue::DayRevenue;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// One row of the `parking_control` table. A new row is appended on every
/// occupancy change; the current state is the row with the latest timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(rename = "vagas_disponiveis", default, deserialize_with = "lenient_count")]
    pub available_spaces: i64,
    #[serde(rename = "created_at")]
    pub recorded_at: DateTime<Utc>,
}

/// One row of the `car_entries` table: a car that entered and paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "valor", default, with = "rust_decimal::serde::float_option")]
    pub amount_paid: Option<Decimal>,
}

impl EntryRecord {
    /// Amount this entry contributes to revenue. Missing and zero amounts
    /// count as the fixed entry price.
    pub fn amount_or(&self, price: Decimal) -> Decimal {
        match self.amount_paid {
            Some(amount) if !amount.is_zero() => amount,
            _ => price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub total_entries: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CapacityRequest {
    #[serde(deserialize_with = "lenient_count")]
    pub available: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub login_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    pub total_entries: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_entry: Decimal,
    pub today: DayRevenue,
    pub yesterday: DayRevenue,
    pub recent_entries: Vec<EntryRecord>,
    pub capacity: CapacityView,
    pub compact: [CompactView; 2],
    pub last_update: Option<DateTime<Utc>>,
}

/// Accepts integers, floats and numeric strings; anything else reads as 0.
/// Range clamping happens later in [`crate::display::Occupancy`].
pub(crate) fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
            .unwrap_or(0),
        Some(serde_json::Value::String(text)) => text.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Number(number)) => number.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_record_reads_backend_row() {
        let row: CapacityRecord = serde_json::from_str(
            r#"{"id": 7, "vagas_disponiveis": "3", "created_at": "2026-10-19T12:00:00+00:00"}"#,
        )
        .unwrap();
        assert_eq!(row.id, "7");
        assert_eq!(row.available_spaces, 3);
    }

    #[test]
    fn non_numeric_capacity_reads_as_zero() {
        let row: CapacityRecord = serde_json::from_str(
            r#"{"id": "a", "vagas_disponiveis": null, "created_at": "2026-10-19T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(row.available_spaces, 0);

        let row: CapacityRecord = serde_json::from_str(
            r#"{"id": "a", "vagas_disponiveis": "many", "created_at": "2026-10-19T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(row.available_spaces, 0);
    }

    #[test]
    fn missing_amount_falls_back_to_price() {
        let entry: EntryRecord =
            serde_json::from_str(r#"{"id": "e1", "created_at": "2026-10-19T12:00:00Z"}"#).unwrap();
        assert_eq!(entry.amount_paid, None);
        assert_eq!(entry.amount_or(Decimal::new(4500, 2)), Decimal::new(4500, 2));

        let entry: EntryRecord = serde_json::from_str(
            r#"{"id": "e2", "created_at": "2026-10-19T12:00:00Z", "valor": 50.5}"#,
        )
        .unwrap();
        assert_eq!(entry.amount_or(Decimal::new(4500, 2)), Decimal::new(505, 1));
    }
}

use rust_decimal::Decimal;
use std::{env, path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TOTAL_SPACES: u32 = 4;
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_REFRESH_SECS: u64 = 5;

pub fn default_price() -> Decimal {
    Decimal::new(4500, 2)
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    File { data_path: PathBuf },
    Rest { url: String, anon_key: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: BackendConfig,
    pub session_path: PathBuf,
    pub admin_password: String,
    pub total_spaces: u32,
    pub price_per_entry: Decimal,
    pub refresh_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unparsable values fall
    /// back to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_path = lookup("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/parking.json"));
        let session_path = lookup("APP_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_path.with_file_name("session.json"));

        let backend = match (lookup("SUPABASE_URL"), lookup("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) if !url.trim().is_empty() => BackendConfig::Rest {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            },
            _ => BackendConfig::File { data_path },
        };

        let refresh_secs = parse_or(&lookup, "REFRESH_INTERVAL_SECS", DEFAULT_REFRESH_SECS).max(1);

        Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            backend,
            session_path,
            admin_password: lookup("ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
            total_spaces: parse_or(&lookup, "PARKING_TOTAL_SPACES", DEFAULT_TOTAL_SPACES),
            price_per_entry: parse_or(&lookup, "PARKING_PRICE_PER_ENTRY", default_price()),
            refresh_interval: Duration::from_secs(refresh_secs),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring invalid {key}={value:?}");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_lot() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.total_spaces, 4);
        assert_eq!(config.price_per_entry, Decimal::from(45));
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.admin_password, "admin123");
        assert_eq!(
            config.backend,
            BackendConfig::File {
                data_path: PathBuf::from("data/parking.json")
            }
        );
        assert_eq!(config.session_path, PathBuf::from("data/session.json"));
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("PARKING_PRICE_PER_ENTRY", "abc"),
            ("REFRESH_INTERVAL_SECS", "0"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.price_per_entry, Decimal::from(45));
        assert_eq!(config.refresh_interval, Duration::from_secs(1));
    }

    #[test]
    fn supabase_settings_select_rest_backend() {
        let config = Config::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://example.supabase.co/"),
            ("SUPABASE_ANON_KEY", "key"),
        ]));
        assert_eq!(
            config.backend,
            BackendConfig::Rest {
                url: "https://example.supabase.co".to_string(),
                anon_key: "key".to_string(),
            }
        );
    }
}

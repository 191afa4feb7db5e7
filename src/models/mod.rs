//! API Data Transfer Objects
//!
//! Types mirrored from the energy REST API. No invariants are enforced
//! client-side beyond what deserialization requires.

mod alert;
mod energy;
mod favourite;
mod forecast;
mod user;

pub use alert::{Alert, AlertIn, Direction};
pub use energy::{EnergyRow, ENERGY_METRICS};
pub use favourite::{Favourite, FavouriteIn};
pub use forecast::{ForecastModel, ForecastParams, ForecastPoint, MAX_HORIZON};
pub use user::{Credentials, Registration, TokenPair, UserProfile};

/// Items that carry a server-assigned identity
pub trait Identified {
    fn id(&self) -> &str;
}

/// Serde helpers for the server's decimal and datetime encodings
pub(crate) mod de {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    /// Decimal columns arrive either as JSON numbers or numeric strings
    pub fn decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| serde::de::Error::custom(format!("invalid decimal {s:?}: {e}"))),
        }
    }

    /// Parse an API timestamp, keeping the wall-clock time of the reading
    pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.naive_local());
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    }

    /// Timestamps with or without an offset
    pub fn timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {s:?}")))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_timestamp_variants() {
            let naive = parse_timestamp("2024-03-01T13:00:00").unwrap();
            assert_eq!(naive.to_string(), "2024-03-01 13:00:00");

            let offset = parse_timestamp("2024-03-01T13:00:00+02:00").unwrap();
            assert_eq!(offset.to_string(), "2024-03-01 13:00:00");

            let frac = parse_timestamp("2024-03-01T13:00:00.250").unwrap();
            assert_eq!(frac.and_utc().timestamp_subsec_millis(), 250);

            assert!(parse_timestamp("yesterday").is_none());
        }
    }
}

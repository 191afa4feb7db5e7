use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{de, Identified};

/// Wire names of the per-source kWh columns, in API order
pub const ENERGY_METRICS: [&str; 9] = [
    "consumption_kwh",
    "production_kwh",
    "nuclear_kwh",
    "wind_kwh",
    "hydroelectric_kwh",
    "oil_and_gas_kwh",
    "coal_kwh",
    "solar_kwh",
    "biomass_kwh",
];

/// A timestamped energy reading with per-source kWh fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyRow {
    pub id: String,
    #[serde(deserialize_with = "de::timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(deserialize_with = "de::decimal")]
    pub consumption_kwh: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub production_kwh: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub nuclear_kwh: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub wind_kwh: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub hydroelectric_kwh: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub oil_and_gas_kwh: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub coal_kwh: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub solar_kwh: f64,
    #[serde(deserialize_with = "de::decimal")]
    pub biomass_kwh: f64,
}

impl EnergyRow {
    /// Look up a kWh column by its wire name
    pub fn metric(&self, name: &str) -> Option<f64> {
        let value = match name {
            "consumption_kwh" => self.consumption_kwh,
            "production_kwh" => self.production_kwh,
            "nuclear_kwh" => self.nuclear_kwh,
            "wind_kwh" => self.wind_kwh,
            "hydroelectric_kwh" => self.hydroelectric_kwh,
            "oil_and_gas_kwh" => self.oil_and_gas_kwh,
            "coal_kwh" => self.coal_kwh,
            "solar_kwh" => self.solar_kwh,
            "biomass_kwh" => self.biomass_kwh,
            _ => return None,
        };
        Some(value)
    }
}

impl Identified for EnergyRow {
    fn id(&self) -> &str {
        &self.id
    }
}

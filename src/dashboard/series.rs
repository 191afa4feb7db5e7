use chrono::{NaiveDate, Timelike};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::models::{de, EnergyRow, ForecastPoint};

/// A charted series and the reading column it reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Series {
    pub name: &'static str,
    pub field: &'static str,
    pub color: &'static str,
    /// Drawn with a heavier stroke
    pub emphasized: bool,
}

const fn series(name: &'static str, field: &'static str, color: &'static str) -> Series {
    Series {
        name,
        field,
        color,
        emphasized: false,
    }
}

pub const SERIES: [Series; 7] = [
    series("Solar", "solar_kwh", "#eab308"),
    series("Wind", "wind_kwh", "#1d4ed8"),
    series("Geothermal", "nuclear_kwh", "#7c2d12"),
    series("Biomass", "biomass_kwh", "#15803d"),
    series("Biogas", "oil_and_gas_kwh", "#a16207"),
    series("Small hydro", "hydroelectric_kwh", "#0284c7"),
    Series {
        name: "Demand",
        field: "consumption_kwh",
        color: "#0f766e",
        emphasized: true,
    },
];

impl Series {
    pub fn find(name: &str) -> Option<&'static Series> {
        SERIES.iter().find(|s| s.name == name)
    }
}

/// One point on the day chart; `value` is in MW
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub hour: u32,
    pub series: String,
    pub value: f64,
}

impl ChartRow {
    pub fn is_forecast(&self) -> bool {
        self.series.ends_with("-forecast")
    }
}

/// Rows for every visible series of every reading taken on `day`
pub fn day_rows(readings: &[EnergyRow], day: NaiveDate, hidden: &BTreeSet<String>) -> Vec<ChartRow> {
    let mut rows = Vec::new();
    for reading in readings.iter().filter(|r| r.timestamp.date() == day) {
        for series in SERIES.iter().filter(|s| !hidden.contains(s.name)) {
            if let Some(kwh) = reading.metric(series.field) {
                rows.push(ChartRow {
                    hour: reading.timestamp.hour(),
                    series: series.name.to_string(),
                    value: kwh / 1000.0,
                });
            }
        }
    }
    rows
}

/// Forecast points as `"{label}-forecast"` rows, never below zero
pub fn forecast_rows(points: &[ForecastPoint], label: &str) -> Vec<ChartRow> {
    let series = format!("{label}-forecast");
    points
        .iter()
        .filter_map(|p| {
            let Some(ts) = de::parse_timestamp(p.timestamp()) else {
                tracing::debug!(timestamp = %p.timestamp(), "Skipping forecast point");
                return None;
            };
            Some(ChartRow {
                hour: ts.hour(),
                series: series.clone(),
                value: (p.value() / 1000.0).max(0.0),
            })
        })
        .collect()
}

/// First and last calendar day covered by the readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DayRange {
    /// The day shown when nothing else is selected
    pub fn default_day(&self) -> NaiveDate {
        self.last
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.first <= day && day <= self.last
    }
}

/// `None` without readings; expects them sorted by timestamp
pub fn day_range(readings: &[EnergyRow]) -> Option<DayRange> {
    let first = readings.first()?.timestamp.date();
    let last = readings.last()?.timestamp.date();
    Some(DayRange { first, last })
}

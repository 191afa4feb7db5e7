use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::models::{Alert, Direction, EnergyRow};

/// A rule that crossed its threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredAlert {
    pub alert_id: String,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub direction: Direction,
    pub reading_id: String,
    pub fired_at: DateTime<Utc>,
}

impl TriggeredAlert {
    /// One-line notification, e.g. `consumption_kwh: 5200 kWh (above 5000)`
    pub fn message(&self) -> String {
        format!(
            "{}: {:.0} kWh ({} {})",
            self.metric, self.value, self.direction, self.threshold
        )
    }
}

impl fmt::Display for TriggeredAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Fires each rule at most once until [`reset`](Self::reset)
#[derive(Debug, Default)]
pub struct AlertEvaluator {
    fired: HashSet<String>,
    triggered: Vec<TriggeredAlert>,
}

impl AlertEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every rule against `reading`, returning the ones that fired now
    pub fn evaluate(&mut self, alerts: &[Alert], reading: &EnergyRow) -> Vec<TriggeredAlert> {
        let mut fired_now = Vec::new();

        for alert in alerts {
            if self.fired.contains(&alert.id) {
                continue;
            }
            // Unknown metrics never fire
            let Some(value) = reading.metric(&alert.metric) else {
                tracing::trace!(alert = %alert.id, metric = %alert.metric, "Unknown alert metric");
                continue;
            };
            if !alert.direction.crosses(value, alert.threshold) {
                continue;
            }

            let hit = TriggeredAlert {
                alert_id: alert.id.clone(),
                metric: alert.metric.clone(),
                value,
                threshold: alert.threshold,
                direction: alert.direction,
                reading_id: reading.id.clone(),
                fired_at: Utc::now(),
            };
            tracing::info!(
                alert = %alert.id,
                metric = %alert.metric,
                value,
                threshold = alert.threshold,
                "Alert triggered"
            );

            self.fired.insert(alert.id.clone());
            self.triggered.push(hit.clone());
            fired_now.push(hit);
        }

        fired_now
    }

    pub fn has_fired(&self, alert_id: &str) -> bool {
        self.fired.contains(alert_id)
    }

    /// Everything fired since the last reset, oldest first
    pub fn triggered(&self) -> &[TriggeredAlert] {
        &self.triggered
    }

    /// Forget fired rules; called on logout
    pub fn reset(&mut self) {
        self.fired.clear();
        self.triggered.clear();
    }
}

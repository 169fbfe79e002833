//! Snapshot-level metrics
//!
//! Records per-user gauges and availability transitions from each published
//! `Snapshot`, and keeps an in-memory aggregate for the end-of-run summary.

use std::collections::BTreeMap;

use contracts::{RoleStatus, Snapshot};
use metrics::{counter, gauge};

/// Record metrics for one published snapshot.
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_snapshot_metrics;
///
/// let snapshot = engine.tick(clock.now());
/// record_snapshot_metrics(&snapshot);
/// ```
pub fn record_snapshot_metrics(snapshot: &Snapshot) {
    counter!("ant_fusion_snapshots_total").increment(1);
    gauge!("ant_fusion_last_tick_id").set(snapshot.tick_id as f64);

    for user in &snapshot.users {
        let name = user.name.clone();

        if let Some(bpm) = user.heart_rate.bpm {
            gauge!("ant_fusion_heart_rate_bpm", "user" => name.clone()).set(f64::from(bpm));
        }
        if let Some(speed) = user.bike.speed_kmh {
            gauge!("ant_fusion_speed_kmh", "user" => name.clone()).set(speed);
        }
        if let Some(cadence) = user.bike.cadence_rpm {
            gauge!("ant_fusion_cadence_rpm", "user" => name.clone()).set(cadence);
        }
        gauge!("ant_fusion_distance_m", "user" => name.clone()).set(user.bike.distance_m);

        for (role, status) in [
            ("heart_rate", &user.heart_rate.status),
            ("speed", &user.bike.speed),
            ("cadence", &user.bike.cadence),
        ] {
            record_transition(&name, role, status);
        }
    }
}

fn record_transition(user: &str, role: &'static str, status: &RoleStatus) {
    if !status.availability_changed {
        return;
    }
    counter!(
        "ant_fusion_availability_transitions_total",
        "user" => user.to_string(),
        "role" => role,
        "state" => status.availability.as_str()
    )
    .increment(1);
}

/// Record the ingestion queue depth
pub fn record_queue_depth(depth: usize) {
    gauge!("ant_fusion_ingestion_queue_depth").set(depth as f64);
}

/// Per-user aggregate over a run
#[derive(Debug, Clone, Default)]
pub struct UserAggregate {
    pub snapshots: u64,
    pub online_snapshots: u64,
    pub heart_rate: RunningStats,
    pub speed_kmh: RunningStats,
    pub cadence_rpm: RunningStats,
    pub distance_m: f64,
    pub transitions: u64,
}

impl UserAggregate {
    /// Share of snapshots in which the user was online (0-100)
    pub fn online_ratio(&self) -> f64 {
        if self.snapshots == 0 {
            0.0
        } else {
            self.online_snapshots as f64 / self.snapshots as f64 * 100.0
        }
    }
}

/// Snapshot aggregator
///
/// Folds every published snapshot into per-user statistics.
#[derive(Debug, Clone, Default)]
pub struct SnapshotAggregator {
    pub total_snapshots: u64,
    pub last_tick_id: u64,
    pub users: BTreeMap<String, UserAggregate>,
}

impl SnapshotAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, snapshot: &Snapshot) {
        self.total_snapshots += 1;
        self.last_tick_id = snapshot.tick_id;

        for user in &snapshot.users {
            let agg = self.users.entry(user.name.clone()).or_default();
            agg.snapshots += 1;
            if user.online {
                agg.online_snapshots += 1;
            }
            if let Some(bpm) = user.heart_rate.bpm {
                agg.heart_rate.push(f64::from(bpm));
            }
            if let Some(speed) = user.bike.speed_kmh {
                agg.speed_kmh.push(speed);
            }
            if let Some(cadence) = user.bike.cadence_rpm {
                agg.cadence_rpm.push(cadence);
            }
            agg.distance_m = user.bike.distance_m;
            agg.transitions += [
                &user.heart_rate.status,
                &user.bike.speed,
                &user.bike.cadence,
            ]
            .iter()
            .filter(|s| s.availability_changed)
            .count() as u64;
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_snapshots: self.total_snapshots,
            last_tick_id: self.last_tick_id,
            users: self
                .users
                .iter()
                .map(|(name, agg)| UserSummary {
                    name: name.clone(),
                    online_ratio: agg.online_ratio(),
                    heart_rate: StatsSummary::from(&agg.heart_rate),
                    speed_kmh: StatsSummary::from(&agg.speed_kmh),
                    cadence_rpm: StatsSummary::from(&agg.cadence_rpm),
                    distance_m: agg.distance_m,
                    transitions: agg.transitions,
                })
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserSummary {
    pub name: String,
    pub online_ratio: f64,
    pub heart_rate: StatsSummary,
    pub speed_kmh: StatsSummary,
    pub cadence_rpm: StatsSummary,
    pub distance_m: f64,
    pub transitions: u64,
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_snapshots: u64,
    pub last_tick_id: u64,
    pub users: Vec<UserSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Telemetry Summary ===")?;
        writeln!(f, "Snapshots: {} (last tick {})", self.total_snapshots, self.last_tick_id)?;

        for user in &self.users {
            writeln!(f, "[{}] online {:.1}%", user.name, user.online_ratio)?;
            writeln!(f, "  heart rate (bpm): {}", user.heart_rate)?;
            writeln!(f, "  speed (km/h):     {}", user.speed_kmh)?;
            writeln!(f, "  cadence (rpm):    {}", user.cadence_rpm)?;
            writeln!(f, "  distance:         {:.3} km", user.distance_m / 1000.0)?;
            writeln!(f, "  transitions:      {}", user.transitions)?;
        }

        Ok(())
    }
}

/// Summary of a `RunningStats`
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

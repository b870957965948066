//! Optional accumulation window toggled by the host.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Recorder {
    pub active: bool,
    pub started_at: u64,
    pub elapsed_hours: f64,
    /// Saleable product, kbbl.
    pub production: f64,
    pub profit: f64,
    pub penalty: f64,
    pub incidents: u32,
    /// Reliability integrated over hours.
    pub reliability_hours: f64,
    /// kt CO2e emitted.
    pub carbon: f64,
    pub shipments_completed: u32,
    pub shipments_missed: u32,
}

/// What one tick contributes to an active recording.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderTick {
    /// kbpd.
    pub output_rate: f64,
    /// Dollars this tick.
    pub profit: f64,
    pub penalty: f64,
    pub incidents: u32,
    pub reliability: f64,
    /// kt per day.
    pub carbon_rate: f64,
    pub completed: u32,
    pub missed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub hours: f64,
    pub production: f64,
    pub profit: f64,
    pub penalty: f64,
    pub incidents: u32,
    pub average_reliability: f64,
    /// kt per day.
    pub average_carbon: f64,
    pub shipments_completed: u32,
    pub shipments_missed: u32,
}

impl Recorder {
    pub fn start(&mut self, minute: u64) {
        *self = Recorder {
            active: true,
            started_at: minute,
            ..Recorder::default()
        };
    }

    /// Stop recording and return what was gathered.
    pub fn stop(&mut self) -> RecordingSummary {
        self.active = false;
        self.summary()
    }

    pub fn record(&mut self, tick: &RecorderTick) {
        if !self.active {
            return;
        }
        let hours = 1.0 / 60.0;
        self.elapsed_hours += hours;
        self.production += tick.output_rate.max(0.0) / 1440.0;
        self.profit += tick.profit;
        self.penalty += tick.penalty;
        self.incidents += tick.incidents;
        self.reliability_hours += tick.reliability * hours;
        self.carbon += tick.carbon_rate.max(0.0) / 1440.0;
        self.shipments_completed += tick.completed;
        self.shipments_missed += tick.missed;
    }

    pub fn summary(&self) -> RecordingSummary {
        let hours = self.elapsed_hours;
        let (average_reliability, average_carbon) = if hours > 0.0 {
            (self.reliability_hours / hours, self.carbon / hours * 24.0)
        } else {
            (0.0, 0.0)
        };
        RecordingSummary {
            hours,
            production: self.production,
            profit: self.profit,
            penalty: self.penalty,
            incidents: self.incidents,
            average_reliability,
            average_carbon,
            shipments_completed: self.shipments_completed,
            shipments_missed: self.shipments_missed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_recorder_ignores_ticks() {
        let mut recorder = Recorder::default();
        recorder.record(&RecorderTick {
            output_rate: 100.0,
            ..RecorderTick::default()
        });
        assert!(recorder.production.abs() < 1e-12);
    }

    #[test]
    fn one_hour_summary_averages() {
        let mut recorder = Recorder::default();
        recorder.start(10);
        for _ in 0..60 {
            recorder.record(&RecorderTick {
                output_rate: 144.0,
                profit: 10.0,
                penalty: 1.0,
                incidents: 0,
                reliability: 0.9,
                carbon_rate: 6.0,
                completed: 0,
                missed: 0,
            });
        }
        let summary = recorder.stop();
        assert!(!recorder.active);
        assert!((summary.hours - 1.0).abs() < 1e-9);
        assert!((summary.production - 6.0).abs() < 1e-9);
        assert!((summary.profit - 600.0).abs() < 1e-9);
        assert!((summary.average_reliability - 0.9).abs() < 1e-9);
        assert!((summary.average_carbon - 6.0).abs() < 1e-9);
    }
}

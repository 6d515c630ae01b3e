use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MotionLevel {
    #[default]
    Normal,
    High,
}

/// Latest orientation sample. Only the newest value matters; older samples
/// are overwritten, never queued.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MotionState {
    pub tilt_degrees: Option<f64>,
    pub level: MotionLevel,
    pub sampled_at: Option<DateTime<Utc>>,
}

/// Fan-out point for the tilt/orientation sensor.
pub struct MotionMonitor {
    tx: watch::Sender<MotionState>,
}

impl Default for MotionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionMonitor {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(MotionState::default());
        Self { tx }
    }

    pub fn record_tilt(&self, tilt_degrees: f64) {
        if !tilt_degrees.is_finite() {
            return;
        }
        self.tx.send_modify(|state| {
            state.tilt_degrees = Some(tilt_degrees);
            state.sampled_at = Some(Utc::now());
        });
    }

    /// Only notifies subscribers when the level actually changes.
    pub fn set_level(&self, level: MotionLevel) {
        self.tx.send_if_modified(|state| {
            if state.level == level {
                false
            } else {
                state.level = level;
                true
            }
        });
    }

    pub fn latest(&self) -> MotionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<MotionState> {
        self.tx.subscribe()
    }
}

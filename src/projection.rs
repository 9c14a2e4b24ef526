//! Evaluates measurement rules against the latest snapshot.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::measurement::{Cast, Doc, MaxChannel, Rule};
use crate::meter::Snapshot;

/// Value of one measurement after evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementValue {
    F64(f64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Missing or unusable input. Rendered downstream as an unknown state,
    /// never as an error and never as zero.
    Unknown,
}

/// Running maximum for one channel, reset at local-day rollover.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyMax {
    value: f64,
    day: NaiveDate,
}

impl DailyMax {
    pub fn new(today: NaiveDate) -> Self {
        Self { value: 0.0, day: today }
    }

    /// Fold one reading into the tracked maximum. A new calendar day zeroes
    /// the stored value before the comparison, so the first reading after
    /// midnight stands as the new maximum on its own. A missing reading
    /// still applies the rollover but never lowers the value.
    pub fn observe(&mut self, reading: Option<f64>, today: NaiveDate) -> f64 {
        if today != self.day {
            self.value = 0.0;
            self.day = today;
        }
        if let Some(v) = reading {
            if v > self.value {
                self.value = v;
            }
        }
        self.value
    }
}

/// All running maxima: one per phase current plus total power. Owned by the
/// poller so values survive failed refreshes.
#[derive(Debug, Clone)]
pub struct DailyMaxima {
    phase_current: [DailyMax; 3],
    total_power: DailyMax,
}

impl DailyMaxima {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            phase_current: [
                DailyMax::new(today),
                DailyMax::new(today),
                DailyMax::new(today),
            ],
            total_power: DailyMax::new(today),
        }
    }

    fn observe(
        &mut self,
        channel: MaxChannel,
        snapshot: Option<&Snapshot>,
        today: NaiveDate,
    ) -> f64 {
        let reading = snapshot.and_then(|s| match channel {
            MaxChannel::PhaseCurrent(index) => array_f64(&s.realtime, "i", index),
            MaxChannel::TotalPower => array_f64(&s.realtime, "p", 0),
        });
        match channel {
            MaxChannel::PhaseCurrent(index) => match self.phase_current.get_mut(index) {
                Some(tracker) => tracker.observe(reading, today),
                None => 0.0,
            },
            MaxChannel::TotalPower => self.total_power.observe(reading, today),
        }
    }
}

/// Evaluate one rule. Snapshot-independent rules (fixed values, daily maxima)
/// produce a value even before the first successful refresh; everything else
/// is unknown until a snapshot exists.
pub fn evaluate(
    rule: &Rule,
    snapshot: Option<&Snapshot>,
    maxima: &mut DailyMaxima,
    today: NaiveDate,
) -> MeasurementValue {
    match rule {
        Rule::DirectScalar { key } => snapshot
            .and_then(|s| scalar_f64(&s.realtime, key))
            .map(MeasurementValue::F64)
            .unwrap_or(MeasurementValue::Unknown),
        Rule::ArrayIndexed { key, index } => match snapshot {
            // Short arrays read as 0.0, not unknown: single-phase installs
            // report fewer elements than the three-phase table expects.
            Some(s) => MeasurementValue::F64(array_f64(&s.realtime, key, *index).unwrap_or(0.0)),
            None => MeasurementValue::Unknown,
        },
        Rule::NestedPath { doc, path, cast } => match snapshot {
            Some(s) => {
                let root = match doc {
                    Doc::Config => &s.config,
                    Doc::Status => &s.status,
                };
                walk(root, path)
                    .and_then(|v| cast_value(v, *cast))
                    .unwrap_or(MeasurementValue::Unknown)
            }
            None => MeasurementValue::Unknown,
        },
        Rule::OnlineFlag { key } => match snapshot {
            Some(s) => {
                let online = s.status.get(*key).and_then(Value::as_bool) == Some(true);
                MeasurementValue::Text(if online { "Online" } else { "Offline" }.to_string())
            }
            None => MeasurementValue::Unknown,
        },
        Rule::EpochTimestamp { key } => snapshot
            .and_then(|s| epoch_utc(&s.realtime, key))
            .map(MeasurementValue::Timestamp)
            .unwrap_or(MeasurementValue::Unknown),
        Rule::DailyMaximum { channel } => {
            MeasurementValue::F64(maxima.observe(*channel, snapshot, today))
        }
        Rule::Fixed { value } => value
            .clone()
            .map(MeasurementValue::Text)
            .unwrap_or(MeasurementValue::Unknown),
    }
}

fn scalar_f64(doc: &Value, key: &str) -> Option<f64> {
    doc.get(key).and_then(Value::as_f64)
}

fn array_f64(doc: &Value, key: &str, index: usize) -> Option<f64> {
    doc.get(key)?.as_array()?.get(index)?.as_f64()
}

/// Walk a fixed key path. JSON null counts as absent.
fn walk<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for key in path {
        current = current.get(key)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn cast_value(v: &Value, cast: Cast) -> Option<MeasurementValue> {
    match cast {
        Cast::Float => v.as_f64().map(MeasurementValue::F64),
        Cast::Bool => v.as_bool().map(MeasurementValue::Bool),
        Cast::Text => Some(MeasurementValue::Text(stringify_json(v))),
    }
}

fn stringify_json(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn epoch_utc(doc: &Value, key: &str) -> Option<DateTime<Utc>> {
    let seconds = doc.get(key)?.as_f64()?;
    // A zero timestamp means the device clock never synced.
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Utc.timestamp_opt(seconds.trunc() as i64, (seconds.fract() * 1e9) as u32)
        .single()
}

/// Rate, Observation, Flow and the errors raised while building them.
///
/// Core data types for the SWMM to HDG converter.
///
/// This module defines the shared domain model imported by the readers,
/// the writers and the conversion pipeline. It performs no I/O.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::units::{self, Unit};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Placeholder used for the water body and the author when none is known.
pub const UNKNOWN: &str = "Unknown";

/// Rates strictly below this value (in the flow's unit) are considered too
/// small to survive the two-decimal HDG rendering.
pub const NEAR_ZERO_THRESHOLD: f64 = 1e-2;

/// Start date assumed until the caller provides one: 2017-01-01T12:00.
pub fn default_start_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 1, 1)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Values rejected at construction time. Never silently clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Rate cannot be negative, but found (value={0})")]
    NegativeRate(f64),

    #[error("Rate must be a finite number, but found (value={0})")]
    NonFiniteRate(f64),

    #[error("Unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("Unknown file format '{0}'")]
    UnknownFormat(String),

    #[error("Date out of range: {start} plus {offset_seconds} s")]
    DateOutOfRange {
        start: NaiveDateTime,
        offset_seconds: i64,
    },
}

/// Malformed input, reported with the 1-based line number and the raw
/// content of the offending line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("input is empty, expected a title line")]
    MissingTitle,

    #[error("line {line}: no '-' before the water body name in '{content}'")]
    MissingSeparator { line: usize, content: String },

    #[error("line {line}: input ended while reading the {expected}")]
    UnexpectedEnd { line: usize, expected: &'static str },

    #[error("line {line}: expected 3 tab-separated fields, found {found} in '{content}'")]
    FieldCount {
        line: usize,
        found: usize,
        content: String,
    },

    #[error("line {line}: invalid day offset in '{content}'")]
    InvalidDay { line: usize, content: String },

    #[error("line {line}: invalid time (expected hh:mm:ss) in '{content}'")]
    InvalidTime { line: usize, content: String },

    #[error("line {line}: invalid rate in '{content}'")]
    InvalidRate { line: usize, content: String },

    #[error("line {line}: {source}")]
    RejectedRate {
        line: usize,
        content: String,
        #[source]
        source: ValidationError,
    },
}

impl ParseError {
    /// Line the error was detected on, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::MissingTitle => None,
            ParseError::MissingSeparator { line, .. }
            | ParseError::UnexpectedEnd { line, .. }
            | ParseError::FieldCount { line, .. }
            | ParseError::InvalidDay { line, .. }
            | ParseError::InvalidTime { line, .. }
            | ParseError::InvalidRate { line, .. }
            | ParseError::RejectedRate { line, .. } => Some(*line),
        }
    }
}

// ---------------------------------------------------------------------------
// Rate
// ---------------------------------------------------------------------------

/// A non-negative flow rate tagged with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    value: f64,
    unit: Unit,
}

impl Rate {
    pub fn new(value: f64, unit: Unit) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteRate(value));
        }
        if value < 0.0 {
            return Err(ValidationError::NegativeRate(value));
        }
        // -0.0 passes the check above; store it as 0.0.
        Ok(Self {
            value: value + 0.0,
            unit,
        })
    }

    /// A rate in `units::DEFAULT_UNIT` (LPS).
    pub fn in_default_unit(value: f64) -> Result<Self, ValidationError> {
        Self::new(value, units::DEFAULT_UNIT)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Returns the same rate expressed in `unit`.
    pub fn convert_to(&self, unit: Unit) -> Rate {
        Rate {
            value: self.unit.convert(self.value, unit),
            unit,
        }
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// A rate observed at some offset from the flow's start date.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    rate: Rate,
    offset: Duration,
}

impl Observation {
    pub fn new(rate: Rate, offset: Duration) -> Self {
        Self { rate, offset }
    }

    pub fn rate(&self) -> &Rate {
        &self.rate
    }

    /// Time elapsed since the flow's start date.
    pub fn offset(&self) -> Duration {
        self.offset
    }

    pub fn convert_to(&self, unit: Unit) -> Observation {
        Observation {
            rate: self.rate.convert_to(unit),
            offset: self.offset,
        }
    }
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// Caller-provided metadata replacing what the reader produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowOverrides {
    pub start_date: Option<NaiveDateTime>,
    pub user_name: Option<String>,
    pub water_body: Option<String>,
}

impl FlowOverrides {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.user_name.is_none() && self.water_body.is_none()
    }
}

/// A time series of observations plus its descriptive metadata.
///
/// Observations are kept in insertion order, which is chronological order.
/// A `Flow` is never edited in place: overrides and unit conversions both
/// produce a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    water_body: String,
    user_name: String,
    start_date: NaiveDateTime,
    observations: Vec<Observation>,
}

impl Flow {
    /// Builds a flow starting at the default start date. A blank water body
    /// name falls back to `UNKNOWN`.
    pub fn new(water_body: &str, observations: Vec<Observation>) -> Self {
        Self {
            water_body: or_unknown(water_body),
            user_name: UNKNOWN.to_string(),
            start_date: default_start_date(),
            observations,
        }
    }

    pub fn empty() -> Self {
        Self::new(UNKNOWN, Vec::new())
    }

    pub fn water_body(&self) -> &str {
        &self.water_body
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn start_date(&self) -> NaiveDateTime {
        self.start_date
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observation_at(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    /// Start date plus the offset of the last observation. `Ok(None)` when
    /// the flow has no observations.
    pub fn end_date(&self) -> Result<Option<NaiveDateTime>, ValidationError> {
        self.observations
            .last()
            .map(|last| self.at_offset(last.offset()))
            .transpose()
    }

    /// Unit of the first observation, `None` when the flow is empty.
    pub fn unit(&self) -> Option<Unit> {
        self.observations.first().map(|o| o.rate().unit())
    }

    /// Absolute time of every observation, in order. Fails if any of them
    /// falls outside the representable calendar.
    pub fn timestamps(&self) -> Result<Vec<NaiveDateTime>, ValidationError> {
        self.observations
            .iter()
            .map(|o| self.at_offset(o.offset()))
            .collect()
    }

    fn at_offset(&self, offset: Duration) -> Result<NaiveDateTime, ValidationError> {
        self.start_date
            .checked_add_signed(offset)
            .ok_or(ValidationError::DateOutOfRange {
                start: self.start_date,
                offset_seconds: offset.num_seconds(),
            })
    }

    /// Returns a copy of this flow with every rate expressed in `unit`.
    pub fn convert_to(&self, unit: Unit) -> Flow {
        Flow {
            water_body: self.water_body.clone(),
            user_name: self.user_name.clone(),
            start_date: self.start_date,
            observations: self
                .observations
                .iter()
                .map(|o| o.convert_to(unit))
                .collect(),
        }
    }

    /// Returns this flow with the given metadata replaced. Fields left as
    /// `None` keep their current value; blank names fall back to `UNKNOWN`.
    pub fn with_overrides(self, overrides: &FlowOverrides) -> Flow {
        Flow {
            water_body: overrides
                .water_body
                .as_deref()
                .map(or_unknown)
                .unwrap_or(self.water_body),
            user_name: overrides
                .user_name
                .as_deref()
                .map(or_unknown)
                .unwrap_or(self.user_name),
            start_date: overrides.start_date.unwrap_or(self.start_date),
            observations: self.observations,
        }
    }

    /// `true` when the flow has observations and every one of them is
    /// strictly below `epsilon`.
    pub fn all_rates_below(&self, epsilon: f64) -> bool {
        !self.observations.is_empty()
            && self
                .observations
                .iter()
                .all(|o| o.rate().value() < epsilon)
    }

    /// Whether the values would all render as (nearly) zero in HDG.
    pub fn is_near_zero(&self) -> bool {
        self.all_rates_below(NEAR_ZERO_THRESHOLD)
    }
}

impl Default for Flow {
    fn default() -> Self {
        Self::empty()
    }
}

fn or_unknown(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn sample_flow() -> Flow {
        let rates = [0.18, 2.30, 2.06];
        let observations = rates
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Observation::new(
                    Rate::new(*v, Unit::Cmd).unwrap(),
                    Duration::minutes(15 * (i as i64 + 1)),
                )
            })
            .collect();
        Flow::new("Node 3", observations)
    }

    // --- Rate ---------------------------------------------------------------

    #[test]
    fn test_rate_keeps_value_and_unit() {
        let rate = Rate::new(0.89, Unit::Cfs).unwrap();
        assert_eq!(rate.value(), 0.89);
        assert_eq!(rate.unit(), Unit::Cfs);
    }

    #[test]
    fn test_rate_accepts_zero() {
        assert!(Rate::new(0.0, Unit::Lps).is_ok());
    }

    #[test]
    fn test_rate_stores_negative_zero_as_zero() {
        let rate = Rate::new(-0.0, Unit::Lps).unwrap();
        assert!(rate.value().is_sign_positive(), "-0.0 must be stored as 0.0");
        assert_eq!(format!("{:.2}", rate.value()), "0.00");
    }

    #[test]
    fn test_rate_rejects_negative_value() {
        let err = Rate::new(-4.56, Unit::Lps).unwrap_err();
        assert_eq!(err, ValidationError::NegativeRate(-4.56));
    }

    #[test]
    fn test_rate_rejects_nan_and_infinity() {
        assert!(matches!(
            Rate::new(f64::NAN, Unit::Lps),
            Err(ValidationError::NonFiniteRate(_))
        ));
        assert!(Rate::new(f64::INFINITY, Unit::Lps).is_err());
    }

    #[test]
    fn test_rate_defaults_to_lps() {
        assert_eq!(Rate::in_default_unit(1.0).unwrap().unit(), Unit::Lps);
    }

    #[test]
    fn test_rate_conversion_returns_new_rate() {
        let rate = Rate::new(1.0, Unit::Lps).unwrap();
        let converted = rate.convert_to(Unit::Cmd);
        assert_eq!(rate.unit(), Unit::Lps, "source rate must not change");
        assert_eq!(converted.unit(), Unit::Cmd);
        assert!((converted.value() - 86.4).abs() < 1e-9);
    }

    // --- Flow ---------------------------------------------------------------

    #[test]
    fn test_empty_flow_has_defaults() {
        let flow = Flow::empty();
        assert_eq!(flow.water_body(), UNKNOWN);
        assert_eq!(flow.user_name(), UNKNOWN);
        assert_eq!(flow.start_date(), at(2017, 1, 1, 12, 0));
        assert!(flow.is_empty());
        assert_eq!(flow.end_date(), Ok(None));
        assert_eq!(flow.unit(), None);
    }

    #[test]
    fn test_blank_water_body_falls_back_to_unknown() {
        assert_eq!(Flow::new("   ", Vec::new()).water_body(), UNKNOWN);
    }

    #[test]
    fn test_end_date_is_start_plus_last_offset() {
        let flow = sample_flow();
        assert_eq!(flow.end_date(), Ok(Some(at(2017, 1, 1, 12, 45))));
    }

    #[test]
    fn test_end_date_can_cross_midnight() {
        let observations = vec![Observation::new(
            Rate::new(1.0, Unit::Lps).unwrap(),
            Duration::days(1) + Duration::hours(13),
        )];
        let flow = Flow::new("River", observations);
        assert_eq!(flow.end_date(), Ok(Some(at(2017, 1, 3, 1, 0))));
    }

    #[test]
    fn test_end_date_out_of_calendar_is_an_error() {
        let observations = vec![Observation::new(
            Rate::new(1.0, Unit::Lps).unwrap(),
            Duration::days(4_000_000_000),
        )];
        let flow = Flow::new("River", observations);
        assert!(matches!(
            flow.end_date(),
            Err(ValidationError::DateOutOfRange { .. })
        ));
        assert!(flow.timestamps().is_err());
    }

    #[test]
    fn test_start_date_override_can_push_dates_out_of_range() {
        let observations = vec![Observation::new(
            Rate::new(1.0, Unit::Lps).unwrap(),
            Duration::days(365),
        )];
        let overrides = FlowOverrides {
            start_date: Some(NaiveDateTime::MAX),
            ..FlowOverrides::default()
        };
        let flow = Flow::new("River", observations).with_overrides(&overrides);
        let err = flow.end_date().unwrap_err();
        assert_eq!(
            err,
            ValidationError::DateOutOfRange {
                start: NaiveDateTime::MAX,
                offset_seconds: 365 * 86_400,
            }
        );
    }

    #[test]
    fn test_unit_is_first_observation_unit() {
        assert_eq!(sample_flow().unit(), Some(Unit::Cmd));
    }

    #[test]
    fn test_timestamps_are_absolute() {
        let stamps = sample_flow().timestamps().unwrap();
        assert_eq!(
            stamps,
            vec![
                at(2017, 1, 1, 12, 15),
                at(2017, 1, 1, 12, 30),
                at(2017, 1, 1, 12, 45)
            ]
        );
    }

    #[test]
    fn test_convert_to_does_not_mutate_source() {
        let flow = sample_flow();
        let converted = flow.convert_to(Unit::Cmh);

        assert_eq!(flow.unit(), Some(Unit::Cmd));
        assert_eq!(flow.observation_at(0).unwrap().rate().value(), 0.18);

        assert_eq!(converted.unit(), Some(Unit::Cmh));
        assert!((converted.observation_at(0).unwrap().rate().value() - 0.0075).abs() < 1e-9);
        assert_eq!(converted.len(), flow.len());
        assert_eq!(converted.end_date(), flow.end_date());
        assert_eq!(converted.water_body(), flow.water_body());
    }

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let overrides = FlowOverrides {
            start_date: Some(at(2020, 6, 1, 0, 0)),
            user_name: Some("Di Wu".to_string()),
            water_body: None,
        };
        let flow = sample_flow().with_overrides(&overrides);
        assert_eq!(flow.start_date(), at(2020, 6, 1, 0, 0));
        assert_eq!(flow.user_name(), "Di Wu");
        assert_eq!(flow.water_body(), "Node 3");
        assert_eq!(flow.end_date(), Ok(Some(at(2020, 6, 1, 0, 45))));
    }

    #[test]
    fn test_empty_overrides_leave_flow_unchanged() {
        let overrides = FlowOverrides::default();
        assert!(overrides.is_empty());
        assert_eq!(sample_flow().with_overrides(&overrides), sample_flow());
    }

    #[test]
    fn test_near_zero_detection() {
        assert!(!sample_flow().is_near_zero());
        // 2.30 CMD / 24 = 0.0958 CMH, still visible.
        assert!(!sample_flow().convert_to(Unit::Cmh).is_near_zero());
        // In CMS every value is far below 0.01.
        assert!(sample_flow().convert_to(Unit::Cms).is_near_zero());
    }

    #[test]
    fn test_empty_flow_is_not_near_zero() {
        assert!(!Flow::empty().is_near_zero());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = ParseError::InvalidDay {
            line: 7,
            content: "x\t00:15:00\t1.0".to_string(),
        };
        assert_eq!(err.line(), Some(7));
        assert_eq!(ParseError::MissingTitle.line(), None);
    }
}

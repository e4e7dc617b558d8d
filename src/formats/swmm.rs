//! SWMM text export reader.
//!
//! Parses the "table" text that SWMM produces for a node time series:
//!
//! ```text
//! Table - Node 3
//!                             Total Inflow
//! Days      	Hours     	(LPS)
//! 0         	00:15:00  	0.18
//! 0         	00:30:00  	2.30
//! 0         	00:45:00  	2.06
//! ```
//!
//! The water body is whatever follows the first '-' of the title line. The
//! two lines after the title are column captions; the unit, when given, is
//! the parenthesised label in them. Data lines hold a day count, a
//! time-of-day and a rate, separated by tabs, and end at the first blank
//! line or at the end of input.

use chrono::Duration;

use crate::logging::{self, Stage};
use crate::model::{self, Flow, Observation, ParseError, Rate};
use crate::units::{self, Unit};

/// Number of caption lines between the title and the data.
const HEADER_LINES: usize = 2;

const FIELD_SEPARATOR: char = '\t';
const TITLE_SEPARATOR: char = '-';

#[derive(Debug, Clone, Copy, Default)]
pub struct SwmmReader;

impl SwmmReader {
    pub fn read(&self, text: &str) -> Result<Flow, ParseError> {
        let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

        let (title_line, title) = lines
            .by_ref()
            .find(|(_, line)| !line.trim().is_empty())
            .ok_or(ParseError::MissingTitle)?;
        let water_body = extract_water_body(title_line, title)?;

        let mut declared_unit = None;
        let mut last_line = title_line;
        for _ in 0..HEADER_LINES {
            let (number, caption) = lines.next().ok_or(ParseError::UnexpectedEnd {
                line: last_line + 1,
                expected: "column headers",
            })?;
            last_line = number;
            if declared_unit.is_none() {
                declared_unit = unit_from_caption(caption);
            }
        }

        let unit = declared_unit.unwrap_or_else(|| {
            logging::debug(
                Stage::Reader,
                Some(&water_body),
                &format!("no unit in column headers, assuming {}", units::DEFAULT_UNIT),
            );
            units::DEFAULT_UNIT
        });

        let mut observations = Vec::new();
        for (number, line) in lines {
            if line.trim().is_empty() {
                if observations.is_empty() {
                    continue;
                }
                break;
            }
            observations.push(parse_observation(number, line, unit)?);
        }

        logging::debug(
            Stage::Reader,
            Some(&water_body),
            &format!("{} observation(s) in {}", observations.len(), unit),
        );

        Ok(Flow::new(&water_body, observations))
    }
}

fn extract_water_body(number: usize, title: &str) -> Result<String, ParseError> {
    title
        .split_once(TITLE_SEPARATOR)
        .map(|(_, name)| name.trim().to_string())
        .ok_or_else(|| ParseError::MissingSeparator {
            line: number,
            content: title.to_string(),
        })
}

/// Finds the first parenthesised label that names a known unit, e.g. the
/// "(LPS)" in "Days  Hours  (LPS)".
fn unit_from_caption(caption: &str) -> Option<Unit> {
    let mut rest = caption;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let close = after.find(')')?;
        let label = &after[..close];
        match units::lookup(label) {
            Ok(unit) => return Some(unit),
            Err(_) => {
                logging::warn(
                    Stage::Reader,
                    None,
                    &format!("ignoring unknown unit label '({})'", label),
                );
            }
        }
        rest = &after[close + 1..];
    }
    None
}

fn parse_observation(number: usize, line: &str, unit: Unit) -> Result<Observation, ParseError> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
    if fields.len() != 3 {
        return Err(ParseError::FieldCount {
            line: number,
            found: fields.len(),
            content: line.to_string(),
        });
    }

    let days: u32 = fields[0].parse().map_err(|_| ParseError::InvalidDay {
        line: number,
        content: line.to_string(),
    })?;

    let time_of_day = parse_time_of_day(fields[1]).ok_or_else(|| ParseError::InvalidTime {
        line: number,
        content: line.to_string(),
    })?;

    let value: f64 = fields[2].parse().map_err(|_| ParseError::InvalidRate {
        line: number,
        content: line.to_string(),
    })?;

    let rate = Rate::new(value, unit).map_err(|source| ParseError::RejectedRate {
        line: number,
        content: line.to_string(),
        source,
    })?;

    let offset = Duration::days(i64::from(days)) + time_of_day;
    if model::default_start_date().checked_add_signed(offset).is_none() {
        return Err(ParseError::InvalidDay {
            line: number,
            content: line.to_string(),
        });
    }

    Ok(Observation::new(rate, offset))
}

/// Parses "hh:mm:ss" into the time elapsed since midnight.
fn parse_time_of_day(text: &str) -> Option<Duration> {
    let mut parts = text.split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }
    Some(
        Duration::hours(i64::from(hours))
            + Duration::minutes(i64::from(minutes))
            + Duration::seconds(i64::from(seconds)),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValidationError;

    const SWMM_TEXT: &str = "\n\
        Table - Node 3\n\
        \x20                           Total Inflow\n\
        Days      \tHours     \t(LPS)\n\
        0         \t00:15:00  \t0.18\n\
        0         \t00:30:00  \t2.30\n\
        0         \t00:45:00  \t2.06\n";

    fn read(text: &str) -> Result<Flow, ParseError> {
        SwmmReader.read(text)
    }

    fn minutes(flow: &Flow) -> Vec<i64> {
        flow.observations()
            .iter()
            .map(|o| o.offset().num_minutes())
            .collect()
    }

    // --- Happy path ---------------------------------------------------------

    #[test]
    fn test_extract_water_body() {
        let flow = read(SWMM_TEXT).expect("sample should parse");
        assert_eq!(flow.water_body(), "Node 3");
    }

    #[test]
    fn test_extract_observations() {
        let flow = read(SWMM_TEXT).expect("sample should parse");
        assert_eq!(flow.len(), 3);
        let values: Vec<f64> = flow
            .observations()
            .iter()
            .map(|o| o.rate().value())
            .collect();
        assert_eq!(values, vec![0.18, 2.30, 2.06]);
        assert_eq!(minutes(&flow), vec![15, 30, 45]);
    }

    #[test]
    fn test_unit_comes_from_caption() {
        let flow = read(SWMM_TEXT).unwrap();
        assert_eq!(flow.unit(), Some(Unit::Lps));

        let cmd = SWMM_TEXT.replace("(LPS)", "(CMD)");
        assert_eq!(read(&cmd).unwrap().unit(), Some(Unit::Cmd));
    }

    #[test]
    fn test_unit_defaults_to_lps_without_caption_label() {
        let text = SWMM_TEXT.replace("(LPS)", "Flow");
        assert_eq!(read(&text).unwrap().unit(), Some(Unit::Lps));
    }

    #[test]
    fn test_unknown_caption_label_falls_back_to_lps() {
        let text = SWMM_TEXT.replace("(LPS)", "(m3/s)");
        assert_eq!(read(&text).unwrap().unit(), Some(Unit::Lps));
    }

    #[test]
    fn test_day_offset_is_added() {
        let text = "Table - Outfall\nInflow\nDays\tHours\t(CMS)\n2\t06:30:15\t1.5\n";
        let flow = read(text).unwrap();
        let offset = flow.observation_at(0).unwrap().offset();
        assert_eq!(offset.num_seconds(), 2 * 86_400 + 6 * 3600 + 30 * 60 + 15);
    }

    #[test]
    fn test_stops_at_first_blank_line_after_data() {
        let text = format!("{}\n0\t01:00:00\t9.99\n", SWMM_TEXT);
        let flow = read(&text).unwrap();
        assert_eq!(flow.len(), 3, "data after the blank line must be ignored");
    }

    #[test]
    fn test_blank_lines_before_data_are_skipped() {
        let text = "Table - Pond\nInflow\nDays\tHours\t(LPS)\n\n\n0\t00:15:00\t1.0\n";
        assert_eq!(read(text).unwrap().len(), 1);
    }

    #[test]
    fn test_header_only_gives_empty_flow() {
        let text = "Table - Pond\nInflow\nDays\tHours\t(LPS)\n";
        let flow = read(text).unwrap();
        assert!(flow.is_empty());
        assert_eq!(flow.water_body(), "Pond");
    }

    #[test]
    fn test_water_body_keeps_later_dashes() {
        let text = "Table - Node 3 - East\nInflow\nDays\tHours\t(LPS)\n";
        assert_eq!(read(text).unwrap().water_body(), "Node 3 - East");
    }

    #[test]
    fn test_windows_line_endings() {
        let text = SWMM_TEXT.replace('\n', "\r\n");
        let flow = read(&text).unwrap();
        assert_eq!(flow.len(), 3);
        assert_eq!(flow.observation_at(2).unwrap().rate().value(), 2.06);
    }

    // --- Errors -------------------------------------------------------------

    #[test]
    fn test_empty_input_has_no_title() {
        assert_eq!(read("").unwrap_err(), ParseError::MissingTitle);
        assert_eq!(read("   \n\n").unwrap_err(), ParseError::MissingTitle);
    }

    #[test]
    fn test_title_without_separator() {
        let err = read("Node 3\nInflow\nDays\tHours\t(LPS)\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingSeparator { line: 1, .. }), "got {:?}", err);
    }

    #[test]
    fn test_truncated_header() {
        let err = read("Table - Node 3\nInflow\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedEnd {
                line: 3,
                expected: "column headers"
            }
        );
    }

    #[test]
    fn test_wrong_field_count_reports_line() {
        let text = "Table - Node 3\nInflow\nDays\tHours\t(LPS)\n0\t00:15:00\n";
        match read(text).unwrap_err() {
            ParseError::FieldCount { line, found, content } => {
                assert_eq!(line, 4);
                assert_eq!(found, 2);
                assert_eq!(content, "0\t00:15:00");
            }
            other => panic!("expected FieldCount, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_day() {
        let text = "Table - Node 3\nInflow\nDays\tHours\t(LPS)\nzero\t00:15:00\t1.0\n";
        assert!(matches!(read(text).unwrap_err(), ParseError::InvalidDay { line: 4, .. }));
    }

    #[test]
    fn test_day_offset_beyond_calendar_is_rejected() {
        let text = "Table - Node 3\nInflow\nDays\tHours\t(LPS)\n4000000000\t00:15:00\t1.0\n";
        match read(text).unwrap_err() {
            ParseError::InvalidDay { line, content } => {
                assert_eq!(line, 4);
                assert_eq!(content, "4000000000\t00:15:00\t1.0");
            }
            other => panic!("expected InvalidDay, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_zero_rate_is_read_as_zero() {
        let text = "Table - Node 3\nInflow\nDays\tHours\t(LPS)\n0\t00:15:00\t-0.00\n";
        let flow = read(text).unwrap();
        let value = flow.observation_at(0).unwrap().rate().value();
        assert_eq!(value, 0.0);
        assert!(value.is_sign_positive());
    }

    #[test]
    fn test_malformed_time() {
        for time in ["00:15", "25:00:00", "00:60:00", "aa:bb:cc", "00:15:00:00"] {
            let text = format!("Table - N\nInflow\nDays\tHours\t(LPS)\n0\t{}\t1.0\n", time);
            assert!(
                matches!(read(&text).unwrap_err(), ParseError::InvalidTime { .. }),
                "'{}' should be rejected",
                time
            );
        }
    }

    #[test]
    fn test_non_numeric_rate() {
        let text = "Table - Node 3\nInflow\nDays\tHours\t(LPS)\n0\t00:15:00\tlots\n";
        assert!(matches!(read(text).unwrap_err(), ParseError::InvalidRate { line: 4, .. }));
    }

    #[test]
    fn test_negative_rate_is_rejected() {
        let text = "Table - Node 3\nInflow\nDays\tHours\t(LPS)\n0\t00:15:00\t-4.56\n";
        match read(text).unwrap_err() {
            ParseError::RejectedRate { line, source, .. } => {
                assert_eq!(line, 4);
                assert_eq!(source, ValidationError::NegativeRate(-4.56));
            }
            other => panic!("expected RejectedRate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("00:00:00"), Some(Duration::zero()));
        assert_eq!(
            parse_time_of_day("23:59:59").map(|d| d.num_seconds()),
            Some(86_399)
        );
        assert_eq!(parse_time_of_day(""), None);
    }
}

/// SWMM to HDG conversion pipeline.
///
/// Ties the pieces together for one run: resolve the processors, read the
/// input file in full, parse it, apply the caller's overrides, convert units,
/// render, and write the output file in a single step. Nothing is written
/// unless every earlier step succeeded.
///
/// # Clock injection
/// `run_at` takes the creation timestamp written into the HDG preamble so
/// tests can compare whole files. `run` uses the local wall clock.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::formats::{self, DispatchError, FileFormat, Reader, Writer};
use crate::logging::{self, Stage};
use crate::model::{Flow, FlowOverrides, ParseError, ValidationError};
use crate::units::Unit;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unable to parse '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Invalid date '{0}'")]
    InvalidStartDate(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unable to open the input file '{}': {source}", .path.display())]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to write the output file '{}': {source}", .path.display())]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Start dates
// ---------------------------------------------------------------------------

const START_DATE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parses an ISO 8601 start date such as "2017-01-01T12:00:00". Seconds may
/// be omitted; a bare date means midnight.
pub fn parse_start_date(text: &str) -> Result<NaiveDateTime, ConversionError> {
    let trimmed = text.trim();
    START_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| ConversionError::InvalidStartDate(text.to_string()))
}

// ---------------------------------------------------------------------------
// Request and summary
// ---------------------------------------------------------------------------

/// Everything one conversion run needs, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub input_format: FileFormat,
    pub output: PathBuf,
    pub output_format: FileFormat,
    pub overrides: FlowOverrides,
    /// Target unit; `None` keeps the unit found in the input.
    pub unit: Option<Unit>,
}

impl ConversionRequest {
    /// A SWMM to HDG request writing next to the input file.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        let input = input.into();
        let output = default_output_path(&input, FileFormat::Hdg);
        Self {
            input,
            input_format: FileFormat::Swmm,
            output,
            output_format: FileFormat::Hdg,
            overrides: FlowOverrides::default(),
            unit: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_overrides(mut self, overrides: FlowOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_unit(mut self, unit: Option<Unit>) -> Self {
        self.unit = unit;
        self
    }
}

/// The input path with its extension replaced by the output format's.
pub fn default_output_path(input: &Path, format: FileFormat) -> PathBuf {
    input.with_extension(format.extension())
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub observations: usize,
    pub water_body: String,
    pub source_unit: Option<Unit>,
    pub target_unit: Option<Unit>,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    /// Every written value is below `model::NEAR_ZERO_THRESHOLD`.
    pub near_zero: bool,
}

impl ConversionSummary {
    /// Whether the run changed the unit of the data.
    pub fn unit_changed(&self) -> bool {
        matches!(
            (self.source_unit, self.target_unit),
            (Some(from), Some(to)) if from != to
        )
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Reads `path` in full and parses it with `reader`.
pub fn read_flow(path: &Path, reader: &Reader) -> Result<Flow, ConversionError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        ConversionError::InputUnavailable {
            path: path.to_path_buf(),
            source,
        }
    })?;
    reader.read(&text).map_err(|source| ConversionError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Applies overrides and the optional unit change to a freshly read flow.
pub fn prepare_flow(flow: Flow, overrides: &FlowOverrides, unit: Option<Unit>) -> Flow {
    let flow = if overrides.is_empty() {
        flow
    } else {
        logging::debug(Stage::Pipeline, Some(flow.water_body()), "applying overrides");
        flow.with_overrides(overrides)
    };

    match (unit, flow.unit()) {
        (Some(target), Some(source)) if target != source => {
            logging::info(
                Stage::Units,
                Some(flow.water_body()),
                &format!("converting from {} to {}", source, target),
            );
            flow.convert_to(target)
        }
        _ => flow,
    }
}

/// Renders `flow` with `writer` and writes it to `path` in one go.
pub fn write_flow(
    flow: &Flow,
    path: &Path,
    writer: &Writer,
    created: NaiveDateTime,
) -> Result<(), ConversionError> {
    let text = writer.write_at(flow, created)?;
    std::fs::write(path, text).map_err(|source| ConversionError::OutputUnwritable {
        path: path.to_path_buf(),
        source,
    })?;
    logging::info(
        Stage::Writer,
        Some(flow.water_body()),
        &format!("{} written ({} data line(s))", path.display(), flow.len()),
    );
    Ok(())
}

/// Runs a conversion stamped with the current local time.
pub fn run(request: &ConversionRequest) -> Result<ConversionSummary, ConversionError> {
    run_at(request, chrono::Local::now().naive_local())
}

pub fn run_at(
    request: &ConversionRequest,
    created: NaiveDateTime,
) -> Result<ConversionSummary, ConversionError> {
    let subject = request.input.display().to_string();
    let result = convert(request, created);
    match &result {
        Ok(summary) => {
            logging::log_conversion_summary(&subject, summary.observations, summary.near_zero)
        }
        Err(err) => logging::log_conversion_failure(&subject, "conversion", err),
    }
    result
}

fn convert(
    request: &ConversionRequest,
    created: NaiveDateTime,
) -> Result<ConversionSummary, ConversionError> {
    // Both processors must exist before any file is touched.
    let reader = formats::resolve_reader(request.input_format)?;
    let writer = formats::resolve_writer(request.output_format)?;

    let flow = read_flow(&request.input, reader)?;
    let source_unit = flow.unit();
    logging::debug(
        Stage::Reader,
        Some(flow.water_body()),
        &format!("{} observation(s) loaded", flow.len()),
    );

    let flow = prepare_flow(flow, &request.overrides, request.unit);
    let near_zero = flow.is_near_zero();
    if near_zero {
        logging::warn(
            Stage::Units,
            Some(flow.water_body()),
            "all values are below 0.01 and will be written as 0.00",
        );
    }

    write_flow(&flow, &request.output, writer, created)?;

    Ok(ConversionSummary {
        input: request.input.clone(),
        output: request.output.clone(),
        observations: flow.len(),
        water_body: flow.water_body().to_string(),
        source_unit,
        target_unit: flow.unit(),
        start_date: flow.start_date(),
        end_date: flow.end_date()?,
        near_zero,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

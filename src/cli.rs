/// Command line front end.
///
/// Parses the arguments, turns them into a `ConversionRequest`, runs it and
/// reports the outcome on the given output. Every user-facing message lives
/// in `Display`.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::Config;
use crate::convert::{self, ConversionError, ConversionRequest, ConversionSummary};
use crate::formats::{self, FileFormat};
use crate::logging::{self, LogLevel, Stage};
use crate::model::{FlowOverrides, NEAR_ZERO_THRESHOLD, ValidationError};
use crate::units::{self, Unit};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Generate HDG file for GEMSS
#[derive(Parser, Debug)]
#[command(name = "hdg-from", version, about, long_about = None)]
pub struct Arguments {
    /// The file that must be converted to HDG
    pub input_file: PathBuf,

    /// Format of the input file
    #[arg(short = 'f', long = "format", default_value = "swmm")]
    pub format: String,

    /// Output file (default: the input file with an .hdg extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Start date used to convert time offsets (YYYY-MM-DDThh:mm:ss)
    #[arg(short = 's', long = "start-date")]
    pub start_date: Option<String>,

    /// Name written in the "Created by" header
    #[arg(short = 'u', long = "user-name")]
    pub user_name: Option<String>,

    /// Water body name, replacing the one found in the input file
    #[arg(short = 'w', long = "water-body")]
    pub water_body: Option<String>,

    /// Flow rate unit of the generated file (CFS, CMD, CMH, CMS, GPM, LPS, MGD, MLD)
    #[arg(long)]
    pub unit: Option<String>,

    /// TOML file holding default values and logging options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the conversion summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Arguments {
    /// Validates the arguments against the closed sets of formats and units
    /// and merges them with the configuration defaults. Touches no file.
    pub fn to_request(&self, config: &Config) -> Result<ConversionRequest, ConversionError> {
        let input_format = FileFormat::match_name(&self.format)?;
        formats::resolve_reader(input_format)?;

        let unit = match &self.unit {
            Some(symbol) => Some(units::lookup(symbol)?),
            None => config.defaults.unit,
        };

        let start_date = match &self.start_date {
            Some(text) => Some(convert::parse_start_date(text)?),
            None => config.defaults.start_date,
        };

        let overrides = FlowOverrides {
            start_date,
            user_name: self
                .user_name
                .clone()
                .or_else(|| config.defaults.user_name.clone()),
            water_body: self
                .water_body
                .clone()
                .or_else(|| config.defaults.water_body.clone()),
        };

        let mut request = ConversionRequest::new(&self.input_file)
            .with_overrides(overrides)
            .with_unit(unit);
        request.input_format = input_format;
        if let Some(output) = &self.output {
            request = request.with_output(output);
        }
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Encapsulates printing messages on the console.
pub struct Display<'a> {
    output: &'a mut dyn Write,
}

impl<'a> Display<'a> {
    pub fn new(output: &'a mut dyn Write) -> Self {
        Self { output }
    }

    pub fn input_file_loaded(&mut self, summary: &ConversionSummary) {
        self.show(&format!(
            "{} observation(s) loaded from '{}'.\n",
            summary.observations,
            summary.input.display()
        ));
    }

    pub fn unit_conversion(&mut self, from: Unit, to: Unit) {
        self.show(&format!("Conversion from {} to {}.\n", from, to));
    }

    pub fn near_zero_values(&mut self, unit: Unit) {
        self.show(&format!(
            "Warning: All values are below {} once converted to {}.\n         Consider another unit.\n",
            NEAR_ZERO_THRESHOLD, unit
        ));
    }

    pub fn conversion_complete(&mut self, output: &Path) {
        self.show(&format!("'{}' successfully generated.\n", output.display()));
    }

    pub fn summary_json(&mut self, summary: &ConversionSummary) {
        match serde_json::to_string_pretty(summary) {
            Ok(json) => self.show(&format!("{}\n", json)),
            Err(e) => self.show(&format!("Error: Unable to encode the summary.\n       {}\n", e)),
        }
    }

    pub fn error(&mut self, err: &ConversionError) {
        let text = match err {
            ConversionError::InputUnavailable { path, source } => format!(
                "Error: Unable to open the input file '{}'.\n       {}\n",
                path.display(),
                source
            ),
            ConversionError::OutputUnwritable { path, source } => format!(
                "Error: Unable to write the output file '{}'.\n       {}\n",
                path.display(),
                source
            ),
            ConversionError::InvalidStartDate(text) => format!(
                "Error: Invalid date '{}'.\n       Use ISO8601 format (e.g., 1982-05-05T12:50:34)\n",
                text
            ),
            ConversionError::Parse { path, source } => format!(
                "Error: Unable to parse '{}'.\n       {}\n",
                path.display(),
                source
            ),
            ConversionError::Validation(ValidationError::UnknownUnit(symbol)) => format!(
                "Error: Unknown unit '{}'.\n       Supported units: {}\n",
                symbol,
                units::all_symbols().join(", ")
            ),
            other => format!("Error: {}\n", other),
        };
        self.show(&text);
    }

    pub fn usage(&mut self, text: &str) {
        self.show(text);
    }

    fn show(&mut self, text: &str) {
        let _ = self.output.write_all(text.as_bytes());
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Runs the tool on `command_line` (without the program name) and returns
/// the process exit code.
pub fn run<I, T>(command_line: I, output: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut display = Display::new(output);

    let program = std::iter::once(OsString::from("hdg-from"));
    let words = program.chain(command_line.into_iter().map(Into::<OsString>::into));
    let arguments = match Arguments::try_parse_from(words) {
        Ok(arguments) => arguments,
        Err(e) => {
            display.usage(&e.to_string());
            return e.exit_code();
        }
    };

    match execute(&arguments, &mut display) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            display.error(&err);
            EXIT_FAILURE
        }
    }
}

fn execute(arguments: &Arguments, display: &mut Display<'_>) -> Result<(), ConversionError> {
    let config = match &arguments.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let min_level = if arguments.verbose {
        LogLevel::Debug
    } else {
        config.logging.min_level()?
    };
    logging::init_logger(
        min_level,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );
    if let Some(path) = &arguments.config {
        logging::debug(
            Stage::Cli,
            Some(&path.display().to_string()),
            "configuration loaded",
        );
    }
    logging::debug(
        Stage::Cli,
        None,
        &format!("logging at {} and above", min_level),
    );

    let request = arguments.to_request(&config)?;
    let summary = convert::run(&request)?;

    if arguments.json {
        display.summary_json(&summary);
        return Ok(());
    }

    display.input_file_loaded(&summary);
    if let (true, Some(from), Some(to)) =
        (summary.unit_changed(), summary.source_unit, summary.target_unit)
    {
        display.unit_conversion(from, to);
    }
    if summary.near_zero {
        if let Some(unit) = summary.target_unit {
            display.near_zero_values(unit);
        }
    }
    display.conversion_complete(&summary.output);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

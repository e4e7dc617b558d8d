//! HDG writer.
//!
//! GEMSS reads HDG ("time-varying data") files with a fixed parser, so the
//! layout below is reproduced byte for byte: the `$`-prefixed preamble, the
//! station and bin descriptor rows, then one `year,month,day,hour,minute,
//! second,rate` row per observation with the rate at two decimals.
//!
//! ```text
//! $GLLVHTTVDFile, V5.0
//! $Creation Date: 03/31/2016 00:00
//! $Waterbody Name: Node 3
//! $Created by: Unknown
//! $Start Date: 01/01/2017 12:00
//! $End Date: 01/01/2017 12:45
//! $Number of Data Lines: 3
//! ...
//! 2017,1,1,12,15,0,0.18
//! ```

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::logging::{self, Stage};
use crate::model::{Flow, ValidationError};
use crate::units::Unit;

/// Date layout used in the preamble.
pub const HDG_DATE_FORMAT: &str = "%m/%d/%Y %H:%M";

const FILE_SIGNATURE: &str = "$GLLVHTTVDFile, V5.0";
const STATION_CAPTION: &str = "$X, Y, Station Height, Missing value,Profile Format, ExceFormat, Longitude, Latitude, Anemometer Height";
const BINS_CAPTION: &str = "$Number of bins, Depth data type, TVD file type";
const STATION_ROW: &str = "62000,6957300,0,999999999,0,0,0,0,0";
const BINS_ROW: &str = "1,0,0";
const BIN_COUNT_ROW: &str = "1";
const DATA_CAPTION: &str = "$Year,Month,Day,Hour,Minute,Bin1,Flow Rate";

/// Flow unit code written in the third field of the variable descriptor
/// row. LPS (0) and CMD (4) are the codes GEMSS has been seen to accept.
pub fn unit_code(unit: Option<Unit>) -> u8 {
    match unit {
        None | Some(Unit::Lps) => 0,
        Some(Unit::Cms) => 1,
        Some(Unit::Cmh) => 2,
        Some(Unit::Cfs) => 3,
        Some(Unit::Cmd) => 4,
        Some(Unit::Gpm) => 5,
        Some(Unit::Mgd) => 6,
        Some(Unit::Mld) => 7,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HdgWriter;

impl HdgWriter {
    /// Renders `flow` as HDG text, using `created` as the creation date.
    ///
    /// An empty flow is written with its end date equal to its start date
    /// and no data rows. Fails when an observation lands outside the
    /// representable calendar.
    pub fn write_at(
        &self,
        flow: &Flow,
        created: NaiveDateTime,
    ) -> Result<String, ValidationError> {
        let start = flow.start_date();
        let timestamps = flow.timestamps()?;
        let end = timestamps.last().copied().unwrap_or(start);

        let mut lines = vec![
            FILE_SIGNATURE.to_string(),
            format!("$Creation Date: {}", created.format(HDG_DATE_FORMAT)),
            format!("$Waterbody Name: {}", flow.water_body()),
            format!("$Created by: {}", flow.user_name()),
            format!("$Start Date: {}", start.format(HDG_DATE_FORMAT)),
            format!("$End Date: {}", end.format(HDG_DATE_FORMAT)),
            format!("$Number of Data Lines: {}", flow.len()),
            STATION_CAPTION.to_string(),
            BINS_CAPTION.to_string(),
            STATION_ROW.to_string(),
            BINS_ROW.to_string(),
            BIN_COUNT_ROW.to_string(),
            format!(
                "2,0,{},1.0,0,0.0,0.0,Flow Rate,Flow Rate",
                unit_code(flow.unit())
            ),
            DATA_CAPTION.to_string(),
        ];

        lines.extend(
            timestamps
                .into_iter()
                .zip(flow.observations())
                .map(|(at, observation)| data_row(at, observation.rate().value())),
        );

        logging::debug(
            Stage::Writer,
            Some(flow.water_body()),
            &format!("{} data line(s) rendered", flow.len()),
        );

        let mut text = lines.join("\n");
        text.push('\n');
        Ok(text)
    }
}

fn data_row(at: NaiveDateTime, value: f64) -> String {
    format!(
        "{},{},{},{},{},{},{:.2}",
        at.year(),
        at.month(),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
        value
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

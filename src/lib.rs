//! hdgfrom: converts SWMM flow exports into HDG files for GEMSS.
//!
//! # Module structure
//!
//! ```text
//! hdgfrom
//! ├── units    : flow-rate unit registry, conversions through CMD
//! ├── model    : shared data types (Rate, Observation, Flow, errors, …)
//! ├── formats  : closed set of file formats + reader/writer dispatch
//! │   ├── swmm : SWMM "Table - <node>" text reader
//! │   └── hdg  : HDG time-varying data writer
//! ├── convert  : one conversion run: read, override, convert, write
//! ├── config   : optional TOML defaults
//! ├── logging  : levelled console/file logging
//! └── cli      : argument parsing and console messages
//! ```

pub mod cli;
pub mod config;
pub mod convert;
pub mod formats;
pub mod logging;
pub mod model;
pub mod units;

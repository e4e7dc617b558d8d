/// Flow-rate unit registry.
///
/// Defines the closed set of flow-rate units understood by the converter,
/// together with the factor that relates each of them to cubic meters per
/// day (CMD). There is no pairwise table: every conversion goes through CMD,
/// so adding a unit means adding exactly one entry to `UNIT_REGISTRY`.
///
/// This is the single source of truth for unit symbols. Readers, writers
/// and the command line all resolve units from here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::ValidationError;

// ---------------------------------------------------------------------------
// Unit identifiers
// ---------------------------------------------------------------------------

/// A flow-rate unit. Each variant has exactly one entry in `UNIT_REGISTRY`,
/// at the position of its discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Cfs,
    Cmd,
    Cmh,
    Cms,
    Gpm,
    Lps,
    Mgd,
    Mld,
}

/// The canonical unit all conversions are routed through.
pub const BASE_UNIT: Unit = Unit::Cmd;

/// The unit assumed when an input file does not declare one.
pub const DEFAULT_UNIT: Unit = Unit::Lps;

// ---------------------------------------------------------------------------
// Unit metadata
// ---------------------------------------------------------------------------

/// Metadata for a single flow-rate unit.
pub struct UnitSpec {
    pub unit: Unit,
    /// Short code as found in SWMM captions and on the command line.
    pub symbol: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// How many cubic meters per day one of this unit amounts to.
    pub factor: f64,
}

/// All supported flow-rate units, with their factor to CMD.
pub static UNIT_REGISTRY: &[UnitSpec] = &[
    UnitSpec {
        unit: Unit::Cfs,
        symbol: "CFS",
        name: "cubic feet per second",
        factor: 2446.575,
    },
    UnitSpec {
        unit: Unit::Cmd,
        symbol: "CMD",
        name: "cubic meters per day",
        factor: 1.0,
    },
    UnitSpec {
        unit: Unit::Cmh,
        symbol: "CMH",
        name: "cubic meters per hour",
        factor: 24.0,
    },
    UnitSpec {
        unit: Unit::Cms,
        symbol: "CMS",
        name: "cubic meters per second",
        factor: 86400.0,
    },
    UnitSpec {
        unit: Unit::Gpm,
        symbol: "GPM",
        name: "gallons per minute",
        factor: 5.45,
    },
    UnitSpec {
        unit: Unit::Lps,
        symbol: "LPS",
        name: "liters per second",
        factor: 86.4,
    },
    UnitSpec {
        unit: Unit::Mgd,
        symbol: "MGD",
        name: "million gallons per day",
        factor: 378.541,
    },
    UnitSpec {
        unit: Unit::Mld,
        symbol: "MLD",
        name: "million liters per day",
        factor: 1000.0,
    },
];

/// Looks up a unit by symbol. Matching ignores case and surrounding
/// whitespace, so " lps " resolves to `Unit::Lps`.
pub fn lookup(symbol: &str) -> Result<Unit, ValidationError> {
    let wanted = symbol.trim();
    UNIT_REGISTRY
        .iter()
        .find(|spec| spec.symbol.eq_ignore_ascii_case(wanted))
        .map(|spec| spec.unit)
        .ok_or_else(|| ValidationError::UnknownUnit(symbol.to_string()))
}

/// Returns every unit symbol, in registry order. Used for help texts.
pub fn all_symbols() -> Vec<&'static str> {
    UNIT_REGISTRY.iter().map(|spec| spec.symbol).collect()
}

impl Unit {
    /// All units, in registry order.
    pub fn all() -> impl Iterator<Item = Unit> {
        UNIT_REGISTRY.iter().map(|spec| spec.unit)
    }

    // Registry entries are laid out in variant order.
    fn spec(self) -> &'static UnitSpec {
        &UNIT_REGISTRY[self as usize]
    }

    pub fn symbol(self) -> &'static str {
        self.spec().symbol
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Factor from this unit to CMD.
    pub fn factor(self) -> f64 {
        self.spec().factor
    }

    /// Expresses `value` (in this unit) in CMD.
    pub fn to_base(self, value: f64) -> f64 {
        value * self.factor()
    }

    /// Expresses `value` (in CMD) in this unit.
    pub fn from_base(self, value: f64) -> f64 {
        value / self.factor()
    }

    /// Converts `value` from this unit into `target`, through CMD.
    pub fn convert(self, value: f64, target: Unit) -> f64 {
        if self == target {
            return value;
        }
        target.from_base(self.to_base(value))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Unit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s)
    }
}

// Units travel through TOML and JSON by symbol, e.g. `unit = "CMD"`.
impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let symbol = String::deserialize(deserializer)?;
        lookup(&symbol).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

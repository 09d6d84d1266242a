//! Beam selection.
//!
//! A GEDI granule has eight beam groups. The four coverage beams share a
//! split laser and the four power beams each have a full-power laser; a
//! beam group's `description` attribute says which kind it is.

use std::fmt;
use std::str::FromStr;

use h5frame::HierarchicalGroup;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SubsetError};

/// Prefix shared by all beam group names.
pub const BEAM_PREFIX: &str = "BEAM";

/// Coverage beam group names.
pub const COVERAGE_BEAMS: [&str; 4] = ["BEAM0000", "BEAM0001", "BEAM0010", "BEAM0011"];

/// Power beam group names.
pub const POWER_BEAMS: [&str; 4] = ["BEAM0101", "BEAM0110", "BEAM1000", "BEAM1011"];

/// Which beams of a granule to subset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BeamFilter {
    #[default]
    All,
    /// Beams whose description mentions coverage.
    Coverage,
    /// Beams whose description mentions power.
    Power,
    /// Beams with these group names (`BEAMxxxx`).
    Names(Vec<String>),
}

impl BeamFilter {
    /// Parse a beams option.
    ///
    /// Accepts `all`, `coverage` or `power` (any case), or a comma-separated
    /// list of beam names with or without the `BEAM` prefix.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: String| SubsetError::InvalidBeams {
            value: value.to_string(),
            reason,
        };

        let parts: Vec<String> = value
            .split(',')
            .map(|part| part.trim().to_uppercase())
            .collect();

        if let [single] = parts.as_slice() {
            match single.as_str() {
                "ALL" => return Ok(BeamFilter::All),
                "COVERAGE" => return Ok(BeamFilter::Coverage),
                "POWER" => return Ok(BeamFilter::Power),
                _ => {}
            }
        }

        let mut names = Vec::with_capacity(parts.len());
        for part in &parts {
            if matches!(part.as_str(), "ALL" | "COVERAGE" | "POWER") {
                return Err(invalid(format!(
                    "'{}' cannot be combined with other values",
                    part.to_lowercase()
                )));
            }
            let digits = part.strip_prefix(BEAM_PREFIX).unwrap_or(part);
            let name = format!("{}{}", BEAM_PREFIX, digits);
            if !COVERAGE_BEAMS.contains(&name.as_str()) && !POWER_BEAMS.contains(&name.as_str()) {
                return Err(invalid(format!(
                    "'{}' is not a valid beam; valid beams are {} and {}",
                    part,
                    COVERAGE_BEAMS.join(", "),
                    POWER_BEAMS.join(", ")
                )));
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }

        Ok(BeamFilter::Names(names))
    }

    /// Normalized option string: `ALL`, `COVERAGE`, `POWER` or a
    /// comma-separated list of `BEAMxxxx` names.
    pub fn to_option_string(&self) -> String {
        match self {
            BeamFilter::All => "ALL".to_string(),
            BeamFilter::Coverage => "COVERAGE".to_string(),
            BeamFilter::Power => "POWER".to_string(),
            BeamFilter::Names(names) => names.join(","),
        }
    }

    /// Decide whether a beam group is selected.
    pub fn matches<G: HierarchicalGroup>(&self, beam: &G) -> Result<bool> {
        let description = || -> Result<String> {
            Ok(beam
                .attr("description")?
                .map(|d| d.to_uppercase())
                .unwrap_or_default())
        };

        Ok(match self {
            BeamFilter::All => true,
            BeamFilter::Coverage => description()?.contains("COVERAGE"),
            BeamFilter::Power => description()?.contains("POWER"),
            BeamFilter::Names(names) => {
                let name = beam.basename();
                names.iter().any(|n| *n == name)
            }
        })
    }
}

impl FromStr for BeamFilter {
    type Err = SubsetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BeamFilter {
    type Error = SubsetError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BeamFilter> for String {
    fn from(filter: BeamFilter) -> Self {
        filter.to_option_string()
    }
}

impl fmt::Display for BeamFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_option_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_options() {
        let cases = [
            ("0000,0001,0010", "BEAM0000,BEAM0001,BEAM0010"),
            ("BEAM1011,BEAM1000,BEAM0110", "BEAM1011,BEAM1000,BEAM0110"),
            ("beam0000,beam0001,beam0010", "BEAM0000,BEAM0001,BEAM0010"),
            ("all", "ALL"),
            ("Coverage", "COVERAGE"),
            ("POWER", "POWER"),
            ("0000,Beam0001", "BEAM0000,BEAM0001"),
            (" 0101 , 0110 ", "BEAM0101,BEAM0110"),
        ];
        for (value, expected) in cases {
            let filter = BeamFilter::parse(value).unwrap();
            assert_eq!(filter.to_option_string(), expected, "parsing {}", value);
        }
    }

    #[test]
    fn test_invalid_options() {
        let cases = [
            "0100",
            "0111",
            "BEAM1001",
            "beam1010",
            "foo",
            "BEAMS0000",
            "all,power",
            "beam0000,beam0100",
            "BEAM0000,coverage",
            "",
        ];
        for value in cases {
            assert!(
                matches!(BeamFilter::parse(value), Err(SubsetError::InvalidBeams { .. })),
                "{} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_duplicates_collapse() {
        assert_eq!(
            BeamFilter::parse("0000,BEAM0000").unwrap(),
            BeamFilter::Names(vec!["BEAM0000".to_string()])
        );
    }

    #[test]
    fn test_serde_uses_option_string() {
        let filter: BeamFilter = serde_json::from_str("\"coverage\"").unwrap();
        assert_eq!(filter, BeamFilter::Coverage);
        assert_eq!(
            serde_json::to_string(&BeamFilter::parse("0000").unwrap()).unwrap(),
            "\"BEAM0000\""
        );
        assert!(serde_json::from_str::<BeamFilter>("\"nope\"").is_err());
    }
}

//! Placement topologies and traffic paths under test.

pub mod provision;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Raised when a raw classification value names no known topology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid topology classification: {0}")]
pub struct InvalidTopology(pub String);

/// Where the target workload sits relative to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Topology {
    /// Driver and target on the reference host.
    SameHost,
    /// Target on a secondary host.
    CrossHost,
}

impl Topology {
    pub const ALL: [Topology; 2] = [Topology::SameHost, Topology::CrossHost];

    /// Report label ("Intra" / "Inter").
    pub fn label(&self) -> &'static str {
        match self {
            Topology::SameHost => "Intra",
            Topology::CrossHost => "Inter",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<i64> for Topology {
    type Error = InvalidTopology;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Topology::SameHost),
            1 => Ok(Topology::CrossHost),
            other => Err(InvalidTopology(other.to_string())),
        }
    }
}

impl FromStr for Topology {
    type Err = InvalidTopology;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intra" | "same-host" => Ok(Topology::SameHost),
            "inter" | "cross-host" => Ok(Topology::CrossHost),
            _ => Err(InvalidTopology(s.to_string())),
        }
    }
}

/// Parse a comma-separated topology selection. Accepts names, the numeric
/// classification codes, and `all`.
pub fn parse_selection(s: &str) -> Result<Vec<Topology>, InvalidTopology> {
    let mut out = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let picked: Vec<Topology> = if part.eq_ignore_ascii_case("all") {
            Topology::ALL.to_vec()
        } else if let Ok(code) = part.parse::<i64>() {
            vec![Topology::try_from(code)?]
        } else {
            vec![part.parse()?]
        };
        for t in picked {
            if !out.contains(&t) {
                out.push(t);
            }
        }
    }
    if out.is_empty() {
        return Err(InvalidTopology(s.to_string()));
    }
    Ok(out)
}

/// Which address of the target a benchmark invocation is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrafficPath {
    /// The target pod's own address.
    PodToPod,
    /// The fronting service's virtual address.
    PodToService,
}

impl TrafficPath {
    pub const ALL: [TrafficPath; 2] = [TrafficPath::PodToPod, TrafficPath::PodToService];

    pub fn label(&self) -> &'static str {
        match self {
            TrafficPath::PodToPod => "pod",
            TrafficPath::PodToService => "svc",
        }
    }
}

impl fmt::Display for TrafficPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_codes() {
        assert_eq!(Topology::try_from(0).unwrap().label(), "Intra");
        assert_eq!(Topology::try_from(1).unwrap().label(), "Inter");
    }

    #[test]
    fn test_unknown_classification_is_rejected() {
        let err = Topology::try_from(2).unwrap_err();
        assert_eq!(err, InvalidTopology("2".to_string()));
        assert!(Topology::try_from(-1).is_err());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("intra".parse::<Topology>().unwrap(), Topology::SameHost);
        assert_eq!("Inter".parse::<Topology>().unwrap(), Topology::CrossHost);
        assert!("diagonal".parse::<Topology>().is_err());
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("all").unwrap(), Topology::ALL.to_vec());
        assert_eq!(parse_selection("inter").unwrap(), vec![Topology::CrossHost]);
        assert_eq!(
            parse_selection("1, 0, inter").unwrap(),
            vec![Topology::CrossHost, Topology::SameHost]
        );
        assert_eq!(parse_selection("2").unwrap_err(), InvalidTopology("2".to_string()));
        assert!(parse_selection(" , ").is_err());
    }

    #[test]
    fn test_path_labels() {
        assert_eq!(TrafficPath::PodToPod.to_string(), "pod");
        assert_eq!(TrafficPath::PodToService.to_string(), "svc");
    }
}

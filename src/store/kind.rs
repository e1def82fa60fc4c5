//! Configuration/operational store partition.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which of a mount point's two stores an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum StoreKind {
    /// Intended configuration.
    #[serde(rename = "config")]
    Configuration,
    /// Observed operational state.
    #[serde(rename = "operational")]
    Operational,
}

impl StoreKind {
    /// Both kinds, configuration first.
    pub const ALL: [Self; 2] = [Self::Configuration, Self::Operational];

    /// Returns the wire name (`config` or `operational`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "config",
            Self::Operational => "operational",
        }
    }

    /// Returns the suffix used in pooled store names.
    #[must_use]
    pub const fn store_suffix(self) -> &'static str {
        match self {
            Self::Configuration => "DOM-CFG",
            Self::Operational => "DOM-OPER",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown store kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown store kind {0:?}, expected \"config\" or \"operational\"")]
pub struct UnknownStoreKind(pub String);

impl FromStr for StoreKind {
    type Err = UnknownStoreKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" | "configuration" => Ok(Self::Configuration),
            "operational" | "oper" => Ok(Self::Operational),
            other => Err(UnknownStoreKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_and_aliases() {
        assert_eq!("config".parse::<StoreKind>(), Ok(StoreKind::Configuration));
        assert_eq!("oper".parse::<StoreKind>(), Ok(StoreKind::Operational));
        assert!("running".parse::<StoreKind>().is_err());
    }

    #[test]
    fn serializes_as_wire_name() {
        let json = serde_json::to_string(&StoreKind::Operational).ok();
        assert_eq!(json.as_deref(), Some("\"operational\""));
    }
}

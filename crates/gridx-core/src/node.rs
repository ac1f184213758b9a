//! Hardware node identification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Kind of hardware producer.
///
/// At most one producer per kind is live at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Utility-side meter on the distribution pole.
    Pole,
    /// Household meter with temperature sensor and relay bank.
    House,
}

impl NodeKind {
    /// All node kinds, in a stable order.
    pub const ALL: [NodeKind; 2] = [NodeKind::Pole, NodeKind::House];

    /// Wire/label spelling of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pole => "pole",
            Self::House => "house",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pole" => Ok(Self::Pole),
            "house" => Ok(Self::House),
            other => Err(CoreError::UnknownNodeKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_roundtrips_through_str() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.to_string().parse::<NodeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_node_kind_rejected() {
        let err = "substation".parse::<NodeKind>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownNodeKind(ref s) if s == "substation"));
    }

    #[test]
    fn test_node_kind_serde_lowercase() {
        assert_eq!(serde_json::to_string(&NodeKind::House).unwrap(), "\"house\"");
    }
}

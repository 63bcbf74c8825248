//! Kind Resolver
//!
//! Maps the descriptor tag of an import or export to its symbolic kind.

use crate::parser::encoding::{DESC_FUNC, DESC_GLOBAL, DESC_MEMORY, DESC_TABLE};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown external kind tag {0:#04x}")]
pub struct UnknownKindError(pub u8);

/// The category of an import or export. Later format revisions add more
/// kinds (exception tags); those are rejected rather than mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Function,
    Table,
    Memory,
    Global,
}

impl Kind {
    pub fn from_tag(tag: u8) -> Result<Kind, UnknownKindError> {
        match tag {
            DESC_FUNC => Ok(Kind::Function),
            DESC_TABLE => Ok(Kind::Table),
            DESC_MEMORY => Ok(Kind::Memory),
            DESC_GLOBAL => Ok(Kind::Global),
            _ => Err(UnknownKindError(tag)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Function => "function",
            Kind::Table => "table",
            Kind::Memory => "memory",
            Kind::Global => "global",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag() {
        assert_eq!(Kind::from_tag(0x00), Ok(Kind::Function));
        assert_eq!(Kind::from_tag(0x01), Ok(Kind::Table));
        assert_eq!(Kind::from_tag(0x02), Ok(Kind::Memory));
        assert_eq!(Kind::from_tag(0x03), Ok(Kind::Global));
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(Kind::from_tag(0x04), Err(UnknownKindError(0x04)));
        assert_eq!(Kind::from_tag(0xff), Err(UnknownKindError(0xff)));
        assert_eq!(UnknownKindError(4).to_string(), "unknown external kind tag 0x04");
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Kind::Memory).unwrap(), "\"memory\"");
        let kind: Kind = serde_json::from_str("\"global\"").unwrap();
        assert_eq!(kind, Kind::Global);
        assert!(serde_json::from_str::<Kind>("\"tag\"").is_err());
    }
}

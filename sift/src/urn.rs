//! URN parsing and validation.
//!
//! Only the outer shape is checked: `urn:li:<entityType>:<id>`, where a tuple
//! id such as `(urn:li:dataPlatform:hive,prod)` must have balanced parentheses.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

pub const URN_PREFIX: &str = "urn:li:";

pub const DATA_PLATFORM: &str = "dataPlatform";
pub const DATA_PLATFORM_INSTANCE: &str = "dataPlatformInstance";
pub const DOMAIN: &str = "domain";
pub const CONTAINER: &str = "container";
pub const TAG: &str = "tag";
pub const GLOSSARY_TERM: &str = "glossaryTerm";
pub const CORP_USER: &str = "corpuser";
pub const CORP_GROUP: &str = "corpGroup";

/// A parsed URN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Urn {
    entity_type: String,
    id: String,
}

impl Urn {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parse `value` and require one of `expected` entity types.
    ///
    /// `field` names the filter field in the error, so callers see which
    /// leaf held the bad value.
    pub fn parse_typed(field: &str, value: &str, expected: &[&str]) -> Result<Urn> {
        let urn = parse_urn(value).map_err(|reason| Error::InvalidUrn {
            field: field.to_string(),
            value: value.to_string(),
            reason,
        })?;

        if !expected.contains(&urn.entity_type.as_str()) {
            return Err(Error::InvalidUrn {
                field: field.to_string(),
                value: value.to_string(),
                reason: format!(
                    "expected entity type {}, found {}",
                    expected.join(" or "),
                    urn.entity_type
                ),
            });
        }

        Ok(urn)
    }
}

impl FromStr for Urn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_urn(s).map_err(|reason| Error::InvalidUrn {
            field: "urn".to_string(),
            value: s.to_string(),
            reason,
        })
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", URN_PREFIX, self.entity_type, self.id)
    }
}

fn parse_urn(s: &str) -> std::result::Result<Urn, String> {
    let rest = s
        .strip_prefix(URN_PREFIX)
        .ok_or_else(|| format!("URN must start with {}", URN_PREFIX))?;

    let (entity_type, id) = rest
        .split_once(':')
        .ok_or_else(|| "URN is missing an entity type or id".to_string())?;

    if entity_type.is_empty() || !entity_type.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("invalid entity type {:?}", entity_type));
    }
    if id.is_empty() {
        return Err("URN id is empty".to_string());
    }
    if id.starts_with('(') && !is_balanced_tuple(id) {
        return Err(format!("unbalanced tuple id {:?}", id));
    }

    Ok(Urn::new(entity_type, id))
}

/// Tuple ids open with '(' and the matching ')' must be the last character.
fn is_balanced_tuple(id: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in id.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
                if depth == 0 && i + 1 != id.len() {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Map a platform name to its data platform URN.
///
/// Values that already look like URNs must be `dataPlatform` URNs and are
/// returned unchanged.
pub fn make_data_platform_urn(platform: &str) -> Result<String> {
    if platform.starts_with(URN_PREFIX) {
        Urn::parse_typed("platform", platform, &[DATA_PLATFORM])?;
        return Ok(platform.to_string());
    }
    if platform.is_empty() {
        return Err(Error::InvalidUrn {
            field: "platform".to_string(),
            value: String::new(),
            reason: "platform name is empty".to_string(),
        });
    }
    Ok(Urn::new(DATA_PLATFORM, platform).to_string())
}

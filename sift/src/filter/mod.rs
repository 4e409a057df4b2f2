//! Filter expressions over metadata search.
//!
//! # Shape
//!
//! A filter is a tree of boolean combinators over typed leaf conditions:
//!
//! ```yaml
//! and:
//!   - env: [PROD]
//!   - or:
//!     - platform: [snowflake, bigquery]
//!     - not:
//!         domain: [urn:li:domain:analytics]
//!   - field: customProperties
//!     condition: EQUAL
//!     values: ["team=core"]
//! ```
//!
//! - **Combinators**: `and`, `or` (lists), `not` (single filter)
//! - **Leaves**: `entity_type`, `entity_subtype`, `platform`,
//!   `platform_instance`, `domain`, `container`, `env`, `status`, `tag`,
//!   `glossary_term`, `owner`
//! - **Custom**: `{field, condition, values}` for anything else

mod load;

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::urn::{self, Urn};
use crate::{Error, Result};

pub use load::{
    discriminator, load_filters, load_filters_str, load_filters_yaml, CUSTOM_DISCRIMINATOR,
    LEAF_TAGS,
};

/// A filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Entity types, e.g. `dataset` or `DATASET`.
    EntityType(IndexSet<String>),
    /// Entity subtypes, e.g. `Table` or `View`.
    EntitySubtype(IndexSet<String>),
    /// Platform names or `dataPlatform` URNs.
    Platform(IndexSet<String>),
    /// `dataPlatformInstance` URNs.
    PlatformInstance(IndexSet<String>),
    /// `domain` URNs.
    Domain(IndexSet<String>),
    /// `container` URNs.
    Container {
        values: IndexSet<String>,
        /// Match only immediate children instead of anything below the container.
        direct_descendants_only: bool,
    },
    /// Environment names, e.g. `PROD`.
    Env(IndexSet<String>),
    /// Soft-delete status.
    SoftDeleted(SoftDeletedMode),
    /// `tag` URNs.
    Tag(IndexSet<String>),
    /// `glossaryTerm` URNs.
    GlossaryTerm(IndexSet<String>),
    /// `corpuser` or `corpGroup` URNs.
    Owner(IndexSet<String>),
    /// Raw condition on an arbitrary search field.
    Custom(CustomCondition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

/// Which entities to include based on their soft-delete status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoftDeletedMode {
    #[default]
    NotSoftDeleted,
    OnlySoftDeleted,
    All,
}

impl SoftDeletedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoftDeletedMode::NotSoftDeleted => "NOT_SOFT_DELETED",
            SoftDeletedMode::OnlySoftDeleted => "ONLY_SOFT_DELETED",
            SoftDeletedMode::All => "ALL",
        }
    }
}

impl FromStr for SoftDeletedMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NOT_SOFT_DELETED" => Ok(SoftDeletedMode::NotSoftDeleted),
            "ONLY_SOFT_DELETED" => Ok(SoftDeletedMode::OnlySoftDeleted),
            "ALL" => Ok(SoftDeletedMode::All),
            _ => Err(Error::validation(
                "status",
                format!(
                    "Input should be 'NOT_SOFT_DELETED', 'ONLY_SOFT_DELETED' or 'ALL', got {:?}",
                    s
                ),
            )),
        }
    }
}

/// Comparison operators understood by the search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    Equal,
    Iequal,
    Contain,
    StartWith,
    EndWith,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    In,
    Exists,
    DescendantsIncl,
    AncestorsIncl,
    RelatedIncl,
}

impl Condition {
    pub const ALL: [Condition; 14] = [
        Condition::Equal,
        Condition::Iequal,
        Condition::Contain,
        Condition::StartWith,
        Condition::EndWith,
        Condition::GreaterThan,
        Condition::GreaterThanOrEqualTo,
        Condition::LessThan,
        Condition::LessThanOrEqualTo,
        Condition::In,
        Condition::Exists,
        Condition::DescendantsIncl,
        Condition::AncestorsIncl,
        Condition::RelatedIncl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Equal => "EQUAL",
            Condition::Iequal => "IEQUAL",
            Condition::Contain => "CONTAIN",
            Condition::StartWith => "START_WITH",
            Condition::EndWith => "END_WITH",
            Condition::GreaterThan => "GREATER_THAN",
            Condition::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            Condition::LessThan => "LESS_THAN",
            Condition::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
            Condition::In => "IN",
            Condition::Exists => "EXISTS",
            Condition::DescendantsIncl => "DESCENDANTS_INCL",
            Condition::AncestorsIncl => "ANCESTORS_INCL",
            Condition::RelatedIncl => "RELATED_INCL",
        }
    }

    /// Whether the condition can be used without values.
    pub fn allows_no_values(&self) -> bool {
        matches!(self, Condition::Exists)
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Condition::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::validation("condition", format!("unknown condition {:?}", s)))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition on an arbitrary search field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCondition {
    pub field: String,
    pub condition: Condition,
    /// `None` only for conditions that take no values (`EXISTS`).
    pub values: Option<Vec<String>>,
}

impl CustomCondition {
    pub fn new(
        field: impl Into<String>,
        condition: Condition,
        values: Option<Vec<String>>,
    ) -> Result<Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(Error::validation("field", "field name must not be empty"));
        }
        if values.is_none() && !condition.allows_no_values() {
            return Err(Error::validation(
                "values",
                format!("values are required for condition {}", condition),
            ));
        }
        Ok(Self {
            field,
            condition,
            values,
        })
    }
}

fn to_set<I, S>(values: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

fn to_urn_set<I, S>(field: &str, values: I, expected: &[&str]) -> Result<IndexSet<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(|v| {
            let v = v.into();
            Urn::parse_typed(field, &v, expected)?;
            Ok(v)
        })
        .collect()
}

// Builder DSL. Leaves that carry URNs validate them here so a bad URN never
// makes it into a Filter value.
impl Filter {
    pub fn entity_type<I, S>(values: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::EntityType(to_set(values))
    }

    pub fn entity_subtype<I, S>(values: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::EntitySubtype(to_set(values))
    }

    /// Platforms by name (`snowflake`) or URN (`urn:li:dataPlatform:snowflake`).
    pub fn platform<I, S>(values: I) -> Result<Filter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = to_set(values);
        for v in &values {
            urn::make_data_platform_urn(v)?;
        }
        Ok(Filter::Platform(values))
    }

    pub fn platform_instance<I, S>(values: I) -> Result<Filter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Filter::PlatformInstance(to_urn_set(
            "platform_instance",
            values,
            &[urn::DATA_PLATFORM_INSTANCE],
        )?))
    }

    pub fn domain<I, S>(values: I) -> Result<Filter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Filter::Domain(to_urn_set("domain", values, &[urn::DOMAIN])?))
    }

    pub fn container<I, S>(values: I, direct_descendants_only: bool) -> Result<Filter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Filter::Container {
            values: to_urn_set("container", values, &[urn::CONTAINER])?,
            direct_descendants_only,
        })
    }

    pub fn env<I, S>(values: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Env(to_set(values))
    }

    pub fn tag<I, S>(values: I) -> Result<Filter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Filter::Tag(to_urn_set("tag", values, &[urn::TAG])?))
    }

    pub fn glossary_term<I, S>(values: I) -> Result<Filter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Filter::GlossaryTerm(to_urn_set(
            "glossary_term",
            values,
            &[urn::GLOSSARY_TERM],
        )?))
    }

    pub fn owner<I, S>(values: I) -> Result<Filter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Filter::Owner(to_urn_set(
            "owner",
            values,
            &[urn::CORP_USER, urn::CORP_GROUP],
        )?))
    }

    pub fn soft_deleted(mode: SoftDeletedMode) -> Filter {
        Filter::SoftDeleted(mode)
    }

    pub fn custom<I, S>(field: impl Into<String>, condition: Condition, values: I) -> Result<Filter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        Ok(Filter::Custom(CustomCondition::new(field, condition, Some(values))?))
    }

    /// `field EXISTS`.
    pub fn exists(field: impl Into<String>) -> Result<Filter> {
        Ok(Filter::Custom(CustomCondition::new(field, Condition::Exists, None)?))
    }

    /// Match entities whose custom properties contain `key=value`.
    pub fn has_custom_property(key: &str, value: &str) -> Filter {
        Filter::Custom(CustomCondition {
            field: "customProperties".to_string(),
            condition: Condition::Equal,
            values: Some(vec![format!("{}={}", key, value)]),
        })
    }

    pub fn and(children: impl IntoIterator<Item = Filter>) -> Filter {
        Filter::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Filter>) -> Filter {
        Filter::Or(children.into_iter().collect())
    }

    /// Negate a filter.
    ///
    /// Fails with [`Error::UnsupportedNegation`] when `child` expands to more
    /// than one OR clause (for example `env`, or an `or` of distinct leaves).
    pub fn not(child: Filter) -> Result<Filter> {
        crate::compile::check_negatable(&child)?;
        Ok(Filter::Not(Box::new(child)))
    }

    /// The key that identifies this filter in its mapping form.
    pub fn tag_name(&self) -> &'static str {
        match self {
            Filter::EntityType(_) => "entity_type",
            Filter::EntitySubtype(_) => "entity_subtype",
            Filter::Platform(_) => "platform",
            Filter::PlatformInstance(_) => "platform_instance",
            Filter::Domain(_) => "domain",
            Filter::Container { .. } => "container",
            Filter::Env(_) => "env",
            Filter::SoftDeleted(_) => "status",
            Filter::Tag(_) => "tag",
            Filter::GlossaryTerm(_) => "glossary_term",
            Filter::Owner(_) => "owner",
            Filter::Custom(_) => CUSTOM_DISCRIMINATOR,
            Filter::And(_) => "and",
            Filter::Or(_) => "or",
            Filter::Not(_) => "not",
        }
    }

    /// True if this filter or any filter below it is a soft-delete status filter.
    pub fn mentions_soft_deleted(&self) -> bool {
        match self {
            Filter::SoftDeleted(_) => true,
            Filter::And(children) | Filter::Or(children) => {
                children.iter().any(Filter::mentions_soft_deleted)
            }
            Filter::Not(child) => child.mentions_soft_deleted(),
            _ => false,
        }
    }

    /// Canonical mapping form, accepted back by [`load_filters`].
    pub fn to_value(&self) -> Value {
        fn list(values: &IndexSet<String>) -> Value {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }

        fn single(key: &str, value: Value) -> Value {
            let mut map = Map::with_capacity(1);
            map.insert(key.to_string(), value);
            Value::Object(map)
        }

        match self {
            Filter::EntityType(v)
            | Filter::EntitySubtype(v)
            | Filter::Platform(v)
            | Filter::PlatformInstance(v)
            | Filter::Domain(v)
            | Filter::Env(v)
            | Filter::Tag(v)
            | Filter::GlossaryTerm(v)
            | Filter::Owner(v) => single(self.tag_name(), list(v)),
            Filter::Container {
                values,
                direct_descendants_only,
            } => {
                let mut map = Map::new();
                map.insert("container".to_string(), list(values));
                if *direct_descendants_only {
                    map.insert("direct_descendants_only".to_string(), Value::Bool(true));
                }
                Value::Object(map)
            }
            Filter::SoftDeleted(mode) => single("status", Value::String(mode.as_str().to_string())),
            Filter::Custom(c) => {
                let mut map = Map::new();
                map.insert("field".to_string(), Value::String(c.field.clone()));
                map.insert(
                    "condition".to_string(),
                    Value::String(c.condition.as_str().to_string()),
                );
                if let Some(values) = &c.values {
                    map.insert(
                        "values".to_string(),
                        Value::Array(values.iter().cloned().map(Value::String).collect()),
                    );
                }
                Value::Object(map)
            }
            Filter::And(children) => {
                single("and", Value::Array(children.iter().map(Filter::to_value).collect()))
            }
            Filter::Or(children) => {
                single("or", Value::Array(children.iter().map(Filter::to_value).collect()))
            }
            Filter::Not(child) => single("not", child.to_value()),
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        load_filters_str(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        load_filters(&value).map_err(serde::de::Error::custom)
    }
}

//! Loading filters from loosely typed mappings (JSON, YAML, TOML).

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::trace;

use super::{Condition, CustomCondition, Filter, SoftDeletedMode};
use crate::{Error, Result};

/// Discriminator reported for `{field, condition, values}` mappings.
pub const CUSTOM_DISCRIMINATOR: &str = "_custom";

/// Leaf keys recognized by the loader.
pub const LEAF_TAGS: &[&str] = &[
    "entity_type",
    "entity_subtype",
    "platform",
    "platform_instance",
    "domain",
    "container",
    "env",
    "status",
    "tag",
    "glossary_term",
    "owner",
];

const COMPOSITE_TAGS: &[&str] = &["and", "or", "not"];
const CUSTOM_KEYS: &[&str] = &["field", "condition", "values"];
const CONTAINER_KEYS: &[&str] = &["container", "direct_descendants_only"];

/// Find the key that decides which kind of filter a mapping holds.
///
/// Rules are tried in order, and the first match wins:
///
/// 1. Not a mapping, or an empty mapping: `None`.
/// 2. `and` / `or` / `not`: that key, but only if it is the sole key.
/// 3. `field` + `condition` with nothing but `values` besides: [`CUSTOM_DISCRIMINATOR`].
/// 4. `container` with nothing but `direct_descendants_only` besides: `container`.
/// 5. Exactly one key: that key, known or not.
/// 6. Anything else: `None`.
pub fn discriminator(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.is_empty() {
        return None;
    }

    if let Some(tag) = COMPOSITE_TAGS.iter().find(|t| map.contains_key(**t)) {
        return (map.len() == 1).then_some(*tag);
    }

    if map.contains_key("field")
        && map.contains_key("condition")
        && map.keys().all(|k| CUSTOM_KEYS.contains(&k.as_str()))
    {
        return Some(CUSTOM_DISCRIMINATOR);
    }

    if map.contains_key("container") && map.keys().all(|k| CONTAINER_KEYS.contains(&k.as_str())) {
        return Some("container");
    }

    if map.len() == 1 {
        return map.keys().next().map(String::as_str);
    }

    None
}

/// Load a filter from its mapping form.
pub fn load_filters(value: &Value) -> Result<Filter> {
    load_at(value, "$")
}

/// Load a filter from JSON text.
///
/// Text that isn't JSON fails the same way a non-mapping value does, since
/// callers hand us strings that were meant to be structured filters.
pub fn load_filters_str(input: &str) -> Result<Filter> {
    match serde_json::from_str::<Value>(input) {
        Ok(value) => load_filters(&value),
        Err(e) => {
            trace!(error = %e, "filter string is not JSON");
            Err(Error::validation(
                "$",
                "Unable to extract tag using discriminator: expected a filter mapping or its JSON encoding",
            ))
        }
    }
}

/// Load a filter from a YAML document.
pub fn load_filters_yaml(input: &str) -> Result<Filter> {
    let value: Value = serde_yaml_ng::from_str(input).map_err(|e| Error::Yaml(e.to_string()))?;
    load_filters(&value)
}

fn load_at(value: &Value, path: &str) -> Result<Filter> {
    let tag = discriminator(value)
        .ok_or_else(|| Error::validation(path, missing_tag_message(value)))?;
    trace!(path, tag, "resolved filter discriminator");

    // discriminator() only returns Some for mappings.
    let map = value
        .as_object()
        .ok_or_else(|| Error::validation(path, "expected a mapping"))?;

    match tag {
        "and" => Ok(Filter::And(load_children(&map["and"], &format!("{}.and", path))?)),
        "or" => Ok(Filter::Or(load_children(&map["or"], &format!("{}.or", path))?)),
        "not" => {
            let child = load_at(&map["not"], &format!("{}.not", path))?;
            Filter::not(child).map_err(|e| rooted_at(path, e))
        }
        CUSTOM_DISCRIMINATOR => load_custom(map, path),
        "container" => {
            let values = string_set(&map["container"], &format!("{}.container", path))?;
            let direct = match map.get("direct_descendants_only") {
                None => false,
                Some(Value::Bool(b)) => *b,
                Some(_) => {
                    return Err(Error::validation(
                        format!("{}.direct_descendants_only", path),
                        "Input should be a valid boolean",
                    ))
                }
            };
            Filter::container(values, direct)
        }
        "status" => {
            let raw = map["status"].as_str().ok_or_else(|| {
                Error::validation(format!("{}.status", path), "Input should be a valid string")
            })?;
            let mode: SoftDeletedMode = raw.parse().map_err(|e| under(path, e))?;
            Ok(Filter::SoftDeleted(mode))
        }
        "entity_type" => Ok(Filter::EntityType(leaf_values(map, path, "entity_type")?)),
        "entity_subtype" => Ok(Filter::EntitySubtype(leaf_values(map, path, "entity_subtype")?)),
        "env" => Ok(Filter::Env(leaf_values(map, path, "env")?)),
        "platform" => Filter::platform(leaf_values(map, path, "platform")?),
        "platform_instance" => {
            Filter::platform_instance(leaf_values(map, path, "platform_instance")?)
        }
        "domain" => Filter::domain(leaf_values(map, path, "domain")?),
        "tag" => Filter::tag(leaf_values(map, path, "tag")?),
        "glossary_term" => Filter::glossary_term(leaf_values(map, path, "glossary_term")?),
        "owner" => Filter::owner(leaf_values(map, path, "owner")?),
        unknown => Err(Error::validation(
            path,
            format!(
                "Input tag '{}' found using discriminator does not match any of the expected tags: {}",
                unknown,
                expected_tags()
            ),
        )),
    }
}

fn load_children(value: &Value, path: &str) -> Result<Vec<Filter>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::validation(path, "Input should be a valid list of filters"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| load_at(item, &format!("{}[{}]", path, i)))
        .collect()
}

fn load_custom(map: &Map<String, Value>, path: &str) -> Result<Filter> {
    let field = map["field"]
        .as_str()
        .ok_or_else(|| {
            Error::validation(format!("{}.field", path), "Input should be a valid string")
        })?;

    let condition: Condition = map["condition"]
        .as_str()
        .ok_or_else(|| {
            Error::validation(format!("{}.condition", path), "Input should be a valid string")
        })?
        .parse()
        .map_err(|e| under(path, e))?;

    let values = match map.get("values") {
        None | Some(Value::Null) => None,
        Some(v) => Some(string_list(v, &format!("{}.values", path))?),
    };

    let custom = CustomCondition::new(field, condition, values).map_err(|e| under(path, e))?;
    Ok(Filter::Custom(custom))
}

fn leaf_values(map: &Map<String, Value>, path: &str, key: &str) -> Result<IndexSet<String>> {
    string_set(&map[key], &format!("{}.{}", path, key))
}

/// A string or list of strings, with duplicates dropped.
fn string_set(value: &Value, path: &str) -> Result<IndexSet<String>> {
    Ok(string_list(value, path)?.into_iter().collect())
}

/// A string or list of strings. Scalars become one-element lists.
fn string_list(value: &Value, path: &str) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    Error::validation(format!("{}[{}]", path, i), "Input should be a valid string")
                })
            })
            .collect(),
        _ => Err(Error::validation(path, "Input should be a valid list")),
    }
}

/// Re-root a validation error raised with a path relative to `base`.
fn under(base: &str, err: Error) -> Error {
    match err {
        Error::Validation { path, message } => Error::Validation {
            path: format!("{}.{}", base, path),
            message,
        },
        other => other,
    }
}

/// Move a `$`-rooted validation error so `$` stands for the filter at `base`.
fn rooted_at(base: &str, err: Error) -> Error {
    match err {
        Error::Validation { path, message } => Error::Validation {
            path: match path.strip_prefix('$') {
                Some(rest) => format!("{}{}", base, rest),
                None => path,
            },
            message,
        },
        other => other,
    }
}

fn missing_tag_message(value: &Value) -> String {
    let map = match value {
        Value::Object(map) => map,
        Value::Null => return "Unable to extract tag using discriminator: got null".to_string(),
        Value::Array(_) => {
            return "Unable to extract tag using discriminator: expected a mapping, got a list"
                .to_string()
        }
        _ => {
            return format!(
                "Unable to extract tag using discriminator: expected a mapping, got {}",
                value
            )
        }
    };

    if map.is_empty() {
        return "Unable to extract tag using discriminator: mapping is empty".to_string();
    }

    let keys: Vec<&str> = map.keys().map(String::as_str).collect();
    if let Some(tag) = COMPOSITE_TAGS.iter().find(|t| map.contains_key(**t)) {
        return format!(
            "'{}' must be the only key in its mapping, found {:?}",
            tag, keys
        );
    }

    format!(
        "Found multiple fields that could be the discriminator for this filter: {:?}",
        keys
    )
}

fn expected_tags() -> String {
    COMPOSITE_TAGS
        .iter()
        .chain(LEAF_TAGS.iter())
        .map(|t| format!("'{}'", t))
        .collect::<Vec<_>>()
        .join(", ")
}

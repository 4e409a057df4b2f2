//! Entity type names as the search backend spells them.

/// Entity types whose search name doesn't follow the camelCase rule.
const SPECIAL_CASES: &[(&str, &str)] = &[
    ("corpuser", "CORP_USER"),
    ("corpGroup", "CORP_GROUP"),
    ("mlModel", "MLMODEL"),
    ("mlModelGroup", "MLMODEL_GROUP"),
    ("mlFeature", "MLFEATURE"),
    ("mlFeatureTable", "MLFEATURE_TABLE"),
    ("mlPrimaryKey", "MLPRIMARY_KEY"),
];

/// Convert an entity type (`dataset`, `dataJob`, `corpuser`) to the search
/// vocabulary (`DATASET`, `DATA_JOB`, `CORP_USER`).
///
/// Values already in upper case are assumed to be in search form and are
/// returned as-is.
pub fn to_search_entity_type(entity_type: &str) -> String {
    if is_search_form(entity_type) {
        return entity_type.to_string();
    }

    if let Some((_, mapped)) = SPECIAL_CASES.iter().find(|(name, _)| *name == entity_type) {
        return mapped.to_string();
    }

    let mut out = String::with_capacity(entity_type.len() + 4);
    for (i, c) in entity_type.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

fn is_search_form(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| !c.is_ascii_lowercase())
}

//! Compile filters into disjunctive normal form.
//!
//! The search backend takes a list of AND clauses and matches an entity if
//! any clause matches. Every clause is a list of rules that must all hold,
//! where each rule can be negated on its own.

use std::collections::HashSet;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::entity_type::to_search_entity_type;
use crate::filter::{Condition, Filter, SoftDeletedMode};
use crate::urn::{self, make_data_platform_urn, Urn};
use crate::{Error, Result};

/// Search field holding the entity type.
pub const ENTITY_TYPE_FIELD: &str = "_entityType";

/// Search field holding the soft-delete flag.
pub const REMOVED_FIELD: &str = "removed";

/// One primitive condition in a compiled clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SearchRule {
    field: String,
    condition: Condition,
    values: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    negated: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl SearchRule {
    pub(crate) fn new(
        field: impl Into<String>,
        condition: Condition,
        values: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            field: field.into(),
            condition,
            values: values.into_iter().collect(),
            negated: false,
        }
    }

    fn equal(field: impl Into<String>, values: impl IntoIterator<Item = String>) -> Self {
        Self::new(field, Condition::Equal, values)
    }

    /// `removed = true`, negated: exclude soft-deleted entities.
    pub(crate) fn not_soft_deleted() -> Self {
        Self::only_soft_deleted().negate()
    }

    pub(crate) fn only_soft_deleted() -> Self {
        Self::equal(REMOVED_FIELD, ["true".to_string()])
    }

    fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }
}

/// Rules that must all hold.
pub type Clause = Vec<SearchRule>;

/// Options that change how filters are compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Add `NOT removed` to every clause unless the filter sets a status itself.
    #[serde(default = "default_inject_status")]
    pub inject_default_status: bool,
}

fn default_inject_status() -> bool {
    true
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            inject_default_status: default_inject_status(),
        }
    }
}

/// A filter in disjunctive normal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    /// Entity types every clause is restricted to, if they all agree.
    pub entity_types: Option<Vec<String>>,
    /// OR of AND clauses.
    pub or_clauses: Vec<Clause>,
}

impl CompiledQuery {
    /// The payload shape the search backend expects: `{types, orFilters}`.
    pub fn to_payload(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Stable digest of the compiled payload, for use as a cache key.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

impl Serialize for CompiledQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct AndClause<'a> {
            and: &'a [SearchRule],
        }

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload<'a> {
            types: &'a Option<Vec<String>>,
            or_filters: Vec<AndClause<'a>>,
        }

        Payload {
            types: &self.entity_types,
            or_filters: self.or_clauses.iter().map(|c| AndClause { and: c }).collect(),
        }
        .serialize(serializer)
    }
}

/// Compile with default options.
pub fn compile(filter: &Filter) -> Result<CompiledQuery> {
    compile_with(filter, &CompileOptions::default())
}

pub fn compile_with(filter: &Filter, options: &CompileOptions) -> Result<CompiledQuery> {
    let mut clauses = to_clauses(filter, "$")?;

    let has_status = filter.mentions_soft_deleted()
        || clauses.iter().flatten().any(|rule| rule.field == REMOVED_FIELD);
    let inject = options.inject_default_status && !has_status;
    if inject {
        for clause in &mut clauses {
            clause.push(SearchRule::not_soft_deleted());
        }
    }

    let expanded = clauses.len();
    let clauses = dedup_clauses(clauses);
    let entity_types = compute_entity_types(&clauses);

    debug!(
        clauses = clauses.len(),
        duplicates = expanded - clauses.len(),
        default_status = inject,
        ?entity_types,
        "compiled filter"
    );

    Ok(CompiledQuery {
        entity_types,
        or_clauses: clauses,
    })
}

/// Entity types shared by every clause.
///
/// A clause's types are the intersection of its non-negated `_entityType`
/// equality rules. The result is `None` unless every clause has such rules
/// and they all name the same non-empty set.
pub fn compute_entity_types(clauses: &[Clause]) -> Option<Vec<String>> {
    let mut common: Option<IndexSet<String>> = None;

    for clause in clauses {
        let types = clause_entity_types(clause)?;
        if types.is_empty() {
            return None;
        }
        match &common {
            None => common = Some(types),
            // IndexSet equality ignores order.
            Some(existing) if *existing == types => {}
            Some(_) => return None,
        }
    }

    common.map(|types| types.into_iter().collect())
}

fn clause_entity_types(clause: &[SearchRule]) -> Option<IndexSet<String>> {
    let mut types: Option<IndexSet<String>> = None;

    let rules = clause.iter().filter(|r| {
        r.field == ENTITY_TYPE_FIELD && r.condition == Condition::Equal && !r.negated
    });
    for rule in rules {
        types = Some(match types {
            None => rule.values.iter().cloned().collect(),
            Some(mut acc) => {
                acc.retain(|t| rule.values.contains(t));
                acc
            }
        });
    }

    types
}

/// Drop clauses whose rule set matches an earlier clause, ignoring rule order
/// and repeats.
fn dedup_clauses(clauses: Vec<Clause>) -> Vec<Clause> {
    let mut seen: HashSet<Vec<SearchRule>> = HashSet::with_capacity(clauses.len());
    clauses
        .into_iter()
        .filter(|clause| {
            let mut key = clause.clone();
            key.sort();
            key.dedup();
            seen.insert(key)
        })
        .collect()
}

/// Fail unless `filter` compiles to a single distinct, non-empty clause.
pub(crate) fn check_negatable(filter: &Filter) -> Result<()> {
    negated(filter, "$.not").map(|_| ())
}

/// The clause of `child` with every rule negated. `path` locates the `not`.
fn negated(child: &Filter, path: &str) -> Result<Clause> {
    let mut clauses = dedup_clauses(to_clauses(child, path)?);
    if clauses.len() != 1 {
        return Err(Error::UnsupportedNegation);
    }
    let clause = clauses.pop().unwrap_or_default();
    if clause.is_empty() {
        return Err(Error::validation(path, "Cannot negate a filter that matches everything"));
    }
    Ok(clause.into_iter().map(SearchRule::negate).collect())
}

/// URN leaf values, checked again here since leaves can be built without
/// the validating constructors.
fn urn_values(field: &str, values: &IndexSet<String>, expected: &[&str]) -> Result<Vec<String>> {
    values
        .iter()
        .map(|v| {
            Urn::parse_typed(field, v, expected)?;
            Ok(v.clone())
        })
        .collect()
}

fn to_clauses(filter: &Filter, path: &str) -> Result<Vec<Clause>> {
    fn single(rule: SearchRule) -> Vec<Clause> {
        vec![vec![rule]]
    }

    let clauses = match filter {
        Filter::EntityType(types) => {
            // `dataset` and `DATASET` name the same search type.
            let mapped: IndexSet<String> =
                types.iter().map(|t| to_search_entity_type(t)).collect();
            single(SearchRule::equal(ENTITY_TYPE_FIELD, mapped))
        }
        Filter::EntitySubtype(subtypes) => {
            single(SearchRule::equal("typeNames", subtypes.iter().cloned()))
        }
        Filter::Platform(platforms) => {
            let urns: IndexSet<String> = platforms
                .iter()
                .map(|p| make_data_platform_urn(p))
                .collect::<Result<_>>()?;
            single(SearchRule::equal("platform.keyword", urns))
        }
        Filter::PlatformInstance(urns) => single(SearchRule::equal(
            "platformInstance",
            urn_values("platform_instance", urns, &[urn::DATA_PLATFORM_INSTANCE])?,
        )),
        Filter::Domain(urns) => single(SearchRule::equal(
            "domains",
            urn_values("domain", urns, &[urn::DOMAIN])?,
        )),
        Filter::Container {
            values,
            direct_descendants_only,
        } => {
            let urns = urn_values("container", values, &[urn::CONTAINER])?;
            if *direct_descendants_only {
                single(SearchRule::equal("container", urns))
            } else {
                single(SearchRule::new("browsePathV2", Condition::Contain, urns))
            }
        }
        // Older entities store the environment as `origin`, newer ones as `env`.
        Filter::Env(envs) => vec![
            vec![SearchRule::equal("origin", envs.iter().cloned())],
            vec![SearchRule::equal("env", envs.iter().cloned())],
        ],
        Filter::SoftDeleted(SoftDeletedMode::NotSoftDeleted) => {
            single(SearchRule::not_soft_deleted())
        }
        Filter::SoftDeleted(SoftDeletedMode::OnlySoftDeleted) => {
            single(SearchRule::only_soft_deleted())
        }
        Filter::SoftDeleted(SoftDeletedMode::All) => vec![Vec::new()],
        Filter::Tag(urns) => {
            single(SearchRule::equal("tags", urn_values("tag", urns, &[urn::TAG])?))
        }
        Filter::GlossaryTerm(urns) => single(SearchRule::equal(
            "glossaryTerms",
            urn_values("glossary_term", urns, &[urn::GLOSSARY_TERM])?,
        )),
        Filter::Owner(urns) => single(SearchRule::equal(
            "owners",
            urn_values("owner", urns, &[urn::CORP_USER, urn::CORP_GROUP])?,
        )),
        Filter::Custom(custom) => single(SearchRule::new(
            custom.field.clone(),
            custom.condition,
            custom.values.clone().unwrap_or_default(),
        )),
        Filter::And(children) => {
            let mut acc: Vec<Clause> = vec![Vec::new()];
            for (i, child) in children.iter().enumerate() {
                acc = cartesian(&acc, &to_clauses(child, &format!("{}.and[{}]", path, i))?);
            }
            acc
        }
        Filter::Or(children) => {
            if children.is_empty() {
                return Err(Error::validation(
                    format!("{}.or", path),
                    "an empty `or` matches nothing and has no clause form",
                ));
            }
            let mut acc = Vec::new();
            for (i, child) in children.iter().enumerate() {
                acc.extend(to_clauses(child, &format!("{}.or[{}]", path, i))?);
            }
            acc
        }
        Filter::Not(child) => vec![negated(child, &format!("{}.not", path))?],
    };

    Ok(clauses)
}

/// AND two clause sets: every left clause joined with every right clause,
/// left side outermost. A rule already in the clause is not added twice.
fn cartesian(left: &[Clause], right: &[Clause]) -> Vec<Clause> {
    let mut out = Vec::with_capacity(left.len() * right.len());
    for l in left {
        for r in right {
            let mut clause = Vec::with_capacity(l.len() + r.len());
            clause.extend(l.iter().cloned());
            for rule in r {
                if !clause.contains(rule) {
                    clause.push(rule.clone());
                }
            }
            out.push(clause);
        }
    }
    out
}

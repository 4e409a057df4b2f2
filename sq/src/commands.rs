//! CLI command implementations.

use std::io::{self, Read};
use std::path::Path;

use serde_json::Value;
use sift::{
    compile_with, load_filters, load_filters_str, load_filters_yaml, CompiledQuery, Config, Error,
    Filter,
};
use tracing::debug;

/// Where a command reads its filter from.
pub enum FilterSource<'a> {
    Expr(&'a str),
    File(&'a str),
    Preset(&'a str),
    Stdin,
}

impl<'a> FilterSource<'a> {
    /// Pick the source from the mutually exclusive CLI arguments.
    pub fn resolve(
        input: Option<&'a str>,
        expr: Option<&'a str>,
        preset: Option<&'a str>,
    ) -> Self {
        match (expr, preset, input) {
            (Some(e), _, _) => FilterSource::Expr(e),
            (_, Some(p), _) => FilterSource::Preset(p),
            (_, _, Some("-")) | (_, _, None) => FilterSource::Stdin,
            (_, _, Some(path)) => FilterSource::File(path),
        }
    }

    fn load(&self, config: &Config) -> sift::Result<Filter> {
        match self {
            FilterSource::Expr(text) => load_filters_str(text),
            FilterSource::Preset(name) => config.preset(name).cloned(),
            FilterSource::File(path) => {
                let contents = std::fs::read_to_string(path)?;
                if is_yaml_path(Path::new(path)) {
                    load_filters_yaml(&contents)
                } else {
                    // Report JSON syntax errors for files instead of the generic shape error.
                    let value: Value = serde_json::from_str(&contents)?;
                    load_filters(&value)
                }
            }
            FilterSource::Stdin => {
                let mut contents = String::new();
                io::stdin().read_to_string(&mut contents)?;
                // YAML is a superset of JSON, but JSON input gets JSON error messages.
                if contents.trim_start().starts_with('{') {
                    let value: Value = serde_json::from_str(&contents)?;
                    load_filters(&value)
                } else {
                    load_filters_yaml(&contents)
                }
            }
        }
    }
}

fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Options for `sq compile`.
pub struct CompileArgs {
    pub format: String,
    pub no_default_status: bool,
    pub fingerprint: bool,
}

pub fn compile(source: &FilterSource, args: &CompileArgs) -> sift::Result<()> {
    let config = Config::load()?;
    let filter = source.load(&config)?;

    let mut options = config.compile.clone();
    if args.no_default_status {
        options.inject_default_status = false;
    }

    let compiled = compile_with(&filter, &options)?;
    debug!(clauses = compiled.or_clauses.len(), "compiled filter from CLI");

    if args.fingerprint {
        println!("{}", compiled.fingerprint()?);
        return Ok(());
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string(&compiled)?),
        "pretty" => println!("{}", serde_json::to_string_pretty(&compiled)?),
        "clauses" => print!("{}", format_clauses(&compiled)),
        other => {
            return Err(Error::Config(format!(
                "Unknown format '{}': use pretty, json or clauses",
                other
            )))
        }
    }
    Ok(())
}

/// Human-readable listing of the compiled clauses.
fn format_clauses(compiled: &CompiledQuery) -> String {
    let mut out = String::new();

    match &compiled.entity_types {
        Some(types) => out.push_str(&format!("types: {}\n", types.join(", "))),
        None => out.push_str("types: (any)\n"),
    }

    for (i, clause) in compiled.or_clauses.iter().enumerate() {
        out.push_str(&format!("clause {}:\n", i + 1));
        if clause.is_empty() {
            out.push_str("  (matches everything)\n");
        }
        for rule in clause {
            let not = if rule.is_negated() { "NOT " } else { "" };
            out.push_str(&format!(
                "  {}{} {} [{}]\n",
                not,
                rule.field(),
                rule.condition(),
                rule.values().join(", ")
            ));
        }
    }
    out
}

pub fn check(source: &FilterSource, format: &str) -> sift::Result<()> {
    let config = Config::load()?;
    let filter = source.load(&config)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&filter)?),
        "yaml" => print!(
            "{}",
            serde_yaml_ng::to_string(&filter).map_err(|e| Error::Yaml(e.to_string()))?
        ),
        other => {
            return Err(Error::Config(format!(
                "Unknown format '{}': use json or yaml",
                other
            )))
        }
    }
    Ok(())
}

pub fn preset_list(pattern: Option<&str>) -> sift::Result<()> {
    let config = Config::load()?;
    let pattern = pattern.unwrap_or("*");

    let presets: Vec<_> = config.presets_matching(pattern).collect();
    if presets.is_empty() {
        println!("No presets found.");
        return Ok(());
    }

    let width = presets
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0)
        .max(4);
    println!("{:<width$}  FILTER", "NAME", width = width);
    println!("{}", "-".repeat(width + 8));
    for (name, filter) in presets {
        println!("{:<width$}  {}", name, filter, width = width);
    }
    Ok(())
}

pub fn preset_add(name: &str, source: &FilterSource, force: bool) -> sift::Result<()> {
    let mut config = Config::load()?;

    if config.presets.contains_key(name) && !force {
        return Err(Error::Config(format!(
            "Preset '{}' already exists (use --force to replace it)",
            name
        )));
    }

    let filter = source.load(&config)?;
    // Reject filters that can never compile before they're stored.
    compile_with(&filter, &config.compile)?;

    let replaced = config.add_preset(name, filter)?;
    config.save()?;

    if replaced.is_some() {
        println!("Replaced preset: {}", name);
    } else {
        println!("Added preset: {}", name);
    }
    Ok(())
}

pub fn preset_remove(name: &str) -> sift::Result<()> {
    let mut config = Config::load()?;
    config.remove_preset(name)?;
    config.save()?;
    println!("Removed preset: {}", name);
    Ok(())
}

pub fn preset_show(name: &str) -> sift::Result<()> {
    let config = Config::load()?;
    let filter = config.preset(name)?;
    println!("{}", serde_json::to_string_pretty(filter)?);
    Ok(())
}

pub fn quick_help() -> sift::Result<()> {
    print!("{}", QUICK_HELP);
    Ok(())
}

const QUICK_HELP: &str = r#"
SQ QUICK REFERENCE
==================

COMMANDS                                      EXAMPLES
────────────────────────────────────────────────────────────────────────────────
compile (c)      Compile to search rules      sq c filter.yaml    sq c -e '{"env":"PROD"}'
check (k)        Validate, print canonical    sq k filter.json    sq k -f yaml < f.json
preset list      List saved filters           sq preset list 'prod-*'
preset add       Save a filter                sq preset add warehouse -e '{"platform":["snowflake"]}'

FILTER SYNTAX (JSON or YAML)
────────────────────────────────────────────────────────────────────────────────
COMBINATORS   {"and": [F, ...]}    all must match
              {"or":  [F, ...]}    any must match
              {"not": F}           F must compile to a single clause

LEAVES        {"entity_type": ["dataset", "chart"]}
              {"entity_subtype": "Table"}
              {"platform": ["snowflake", "urn:li:dataPlatform:bigquery"]}
              {"platform_instance": ["urn:li:dataPlatformInstance:(...)"]}
              {"domain": ["urn:li:domain:marketing"]}
              {"container": ["urn:li:container:..."], "direct_descendants_only": true}
              {"env": ["PROD"]}                  matches origin OR env
              {"status": "NOT_SOFT_DELETED" | "ONLY_SOFT_DELETED" | "ALL"}
              {"tag": ["urn:li:tag:pii"]}
              {"glossary_term": ["urn:li:glossaryTerm:..."]}
              {"owner": ["urn:li:corpuser:jdoe", "urn:li:corpGroup:eng"]}

CUSTOM        {"field": "customProperties", "condition": "EQUAL", "values": ["k=v"]}
              {"field": "deprecated", "condition": "EXISTS"}

Soft-deleted entities are excluded unless the filter sets "status"
(or pass --no-default-status).

CONFIG        $SIFT_ROOT/config.toml (default ~/.local/share/sift)
LOGGING       RUST_LOG=sift=debug sq c filter.yaml
"#;

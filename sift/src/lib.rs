//! sift: search filter DSL for a metadata graph.
//!
//! Loads nested filter mappings into a typed [`Filter`] tree and compiles it
//! into the OR-of-AND rule lists the search backend accepts.

pub mod compile;
pub mod config;
pub mod entity_type;
pub mod error;
pub mod filter;
pub mod urn;

pub use compile::{
    compile, compile_with, compute_entity_types, Clause, CompileOptions, CompiledQuery, SearchRule,
};
pub use config::Config;
pub use error::{Error, Result};
pub use filter::{
    discriminator, load_filters, load_filters_str, load_filters_yaml, Condition, CustomCondition,
    Filter, SoftDeletedMode,
};
pub use urn::Urn;

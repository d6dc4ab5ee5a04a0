//! Problem definition and per-generation types

use std::collections::BTreeMap;

pub mod candidate;
pub mod constraint;
pub mod design_variable;
pub mod objective;

/// Named, possibly vector-valued quantities (design inputs or model outputs).
///
/// Ordered so that iteration, logging and records are deterministic.
pub type NamedValues = BTreeMap<String, Vec<f64>>;

//! Request-side model for feature template selection.
//!
//! A [`RequestContext`] captures the parts of an OGC request that template
//! rules can inspect: the explicit output format, KVP query parameters,
//! headers, the OGC service and operation names. [`PredicateEvaluator`]
//! evaluates CQL-style boolean expressions against that context; the built-in
//! [`CqlEvaluator`] understands the request functions used by template rules
//! (`requestParam`, `header`, `mimeType`, `serviceName`, `requestName`,
//! `requestMatchRegex`) combined with `AND` / `OR` / `NOT` and comparisons.

pub mod context;
pub mod error;
pub mod filter;

pub use context::RequestContext;
pub use error::{FilterError, Result};
pub use filter::{CqlEvaluator, Filter, PredicateEvaluator};

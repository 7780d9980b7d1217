//! Template rules: which template serves which request.
//!
//! Each resource owns an ordered list of [`TemplateRule`]s. A request is
//! matched against the rules of the resource being served and the winning
//! rule names the template identifier to use; when nothing matches the
//! caller falls back to the default template of the output format.
//!
//! The [`RuleRegistry`] keeps all rule lists in one copy-on-write snapshot
//! and persists every published snapshot as JSON.

pub mod priority;
mod registry;
mod rule;
mod select;

pub use registry::{RuleRegistry, RuleSet};
pub use rule::TemplateRule;
pub use select::select;

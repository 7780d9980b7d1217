//! CQL-style boolean predicates over a [`RequestContext`].
//!
//! The grammar is the subset template rules use:
//!
//! ```text
//! expr       := and ( OR and )*
//! and        := unary ( AND unary )*
//! unary      := NOT unary | '(' expr ')' | condition
//! condition  := operand [ ( '=' | '<>' | '!=' ) operand ]
//! operand    := call | 'string' | number | TRUE | FALSE | INCLUDE | EXCLUDE
//! call       := ident '(' [ operand ( ',' operand )* ] ')'
//! ```
//!
//! Keywords are case-insensitive. A bare operand used as a condition must
//! evaluate to a boolean. Nesting depth and expression length are capped, see
//! [`MAX_DEPTH`] and [`MAX_TOKENS`].

mod eval;
mod parse;

/// Deepest nesting of parentheses, `NOT` and function calls accepted.
pub const MAX_DEPTH: usize = 64;
/// Longest expression accepted, in tokens.
pub const MAX_TOKENS: usize = 4096;


use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;

use crate::{RequestContext, Result};

/// Evaluates boolean predicate expressions against a request.
///
/// Implementations must be thread-safe: rules are evaluated concurrently by
/// every request thread.
pub trait PredicateEvaluator: Send + Sync {
	/// Returns whether `expression` holds for `request`.
	fn evaluate(&self, expression: &str, request: &RequestContext) -> Result<bool>;
}

/// Built-in evaluator for the request-function CQL subset.
///
/// Parsed filters are kept in a small LRU keyed by expression text, so a
/// rule's predicate is parsed once rather than on every request.
pub struct CqlEvaluator {
	parsed: Mutex<LruCache<String, Arc<Filter>>>,
}

impl CqlEvaluator {
	/// Number of parsed expressions kept by [`CqlEvaluator::default`].
	pub const DEFAULT_CAPACITY: usize = 256;

	/// Creates an evaluator caching up to `capacity` parsed expressions.
	pub fn with_capacity(capacity: NonZeroUsize) -> Self {
		Self {
			parsed: Mutex::new(LruCache::new(capacity)),
		}
	}

	/// Parsed form of `expression`, from the cache when possible.
	///
	/// Expressions that fail to parse are not cached.
	pub fn filter(&self, expression: &str) -> Result<Arc<Filter>> {
		if let Some(filter) = self.parsed.lock().get(expression) {
			return Ok(Arc::clone(filter));
		}
		let filter = Arc::new(Filter::parse(expression)?);
		self.parsed.lock().put(expression.to_string(), Arc::clone(&filter));
		Ok(filter)
	}

	/// Number of parsed expressions currently cached.
	pub fn cached(&self) -> usize {
		self.parsed.lock().len()
	}
}

impl fmt::Debug for CqlEvaluator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CqlEvaluator").field("cached", &self.cached()).finish()
	}
}

impl Default for CqlEvaluator {
	fn default() -> Self {
		Self::with_capacity(NonZeroUsize::new(Self::DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
	}
}

impl PredicateEvaluator for CqlEvaluator {
	fn evaluate(&self, expression: &str, request: &RequestContext) -> Result<bool> {
		self.filter(expression)?.evaluate(request)
	}
}

/// A parsed predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
	root: Expr,
}

impl Filter {
	/// Parses predicate text.
	pub fn parse(text: &str) -> Result<Self> {
		parse::Parser::new(text)?.parse().map(|root| Self { root })
	}

	/// Evaluates the predicate against `request`.
	pub fn evaluate(&self, request: &RequestContext) -> Result<bool> {
		eval::eval_condition(&self.root, request)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
	And(Box<Expr>, Box<Expr>),
	Or(Box<Expr>, Box<Expr>),
	Not(Box<Expr>),
	Compare {
		left: Operand,
		op: CompareOp,
		right: Operand,
	},
	Truthy(Operand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
	Eq,
	NotEq,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
	Literal(Value),
	Call { name: String, args: Vec<Operand> },
	/// `requestMatchRegex` with a literal pattern, compiled at parse time.
	UrlMatches(Pattern),
}

/// Compiled regex compared by its source text.
#[derive(Clone)]
pub(crate) struct Pattern(pub(crate) Regex);

impl PartialEq for Pattern {
	fn eq(&self, other: &Self) -> bool {
		self.0.as_str() == other.0.as_str()
	}
}

impl fmt::Debug for Pattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "/{}/", self.0.as_str())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
	Text(String),
	Bool(bool),
	Null,
}

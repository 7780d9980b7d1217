//! Error types for request predicates.

use thiserror::Error;

/// Errors raised while parsing or evaluating a request predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
	/// The expression text is not well formed.
	#[error("syntax error at offset {offset}: {message}")]
	Syntax {
		/// Byte offset of the offending token.
		offset: usize,
		/// What the parser expected.
		message: String,
	},

	/// The expression calls a function the evaluator does not provide.
	#[error("unknown function: {0}")]
	UnknownFunction(String),

	/// A function was called with the wrong number of arguments.
	#[error("function {function} expects {expected} argument(s), got {found}")]
	Arity {
		/// Function name as written.
		function: String,
		/// Declared argument count.
		expected: usize,
		/// Supplied argument count.
		found: usize,
	},

	/// A function argument has the wrong type.
	#[error("argument {index} of {function} must be text")]
	InvalidArgument {
		/// Function name as written.
		function: String,
		/// Zero-based argument position.
		index: usize,
	},

	/// `requestMatchRegex` received a pattern that does not compile.
	#[error("invalid regex {pattern:?}: {message}")]
	InvalidRegex {
		/// The pattern as written.
		pattern: String,
		/// Regex compiler diagnostic.
		message: String,
	},

	/// The expression nests deeper, or runs longer, than the parser accepts.
	#[error("expression exceeds the limit of {limit} {what}")]
	TooComplex {
		/// Which limit was hit.
		what: &'static str,
		/// The limit.
		limit: usize,
	},

	/// A sub-expression used as a condition did not produce a boolean.
	#[error("expression is not boolean: {0}")]
	NotBoolean(String),
}

/// Result type for predicate operations.
pub type Result<T> = std::result::Result<T, FilterError>;

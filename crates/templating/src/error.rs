//! Error types for template resolution and administration.

use std::path::PathBuf;
use std::sync::Arc;

use geotmpl_request::FilterError;
use thiserror::Error;

/// Errors surfaced by the templating engine.
///
/// The type is `Clone` so that a failed single-flight load can be handed to
/// every caller waiting on it; I/O errors are shared through `Arc`.
#[derive(Debug, Clone, Error)]
pub enum TemplateError {
	/// The template compiler rejected the file.
	#[error("failed to compile template {path}: {message}")]
	Compile {
		/// Template file that failed to compile.
		path: PathBuf,
		/// Compiler diagnostic.
		message: String,
	},

	/// The compiled template references an attribute the resource does not have.
	#[error("template {template} is not valid for {resource}: attribute `{attribute}` is not part of the schema")]
	Validation {
		/// `workspace:name` of the resource being served.
		resource: String,
		/// Identifier or file name of the template.
		template: String,
		/// Attribute path that failed to resolve.
		attribute: String,
	},

	/// A rule predicate could not be parsed or evaluated.
	#[error("template rule predicate failed: {0}")]
	Predicate(#[from] FilterError),

	/// Reading a template or metadata file failed.
	#[error("I/O error on {path}: {source}")]
	Io {
		/// File or directory involved.
		path: PathBuf,
		/// The underlying I/O error.
		source: Arc<std::io::Error>,
	},

	/// Writing persisted state failed; nothing was committed.
	#[error("failed to persist {path}: {source}")]
	Persistence {
		/// File being written.
		path: PathBuf,
		/// The underlying I/O error.
		source: Arc<std::io::Error>,
	},

	/// A persisted template metadata entry is malformed.
	#[error("invalid template metadata entry {key}: {reason}")]
	Metadata {
		/// Property key (template identifier).
		key: String,
		/// What is wrong with the value.
		reason: String,
	},

	/// A descriptor field holds a value the metadata file cannot store.
	#[error("invalid template {field} `{value}`: {reason}")]
	InvalidName {
		/// Descriptor field being checked.
		field: &'static str,
		/// Offending value.
		value: String,
		/// Why it was rejected.
		reason: &'static str,
	},

	/// A template with the same full name already exists.
	#[error("template {0} already exists")]
	Duplicate(String),

	/// No template with the given name or identifier exists.
	#[error("template {0} not found")]
	NotFound(String),

	/// No rule with the given identifier exists for the resource.
	#[error("template rule {0} not found")]
	RuleNotFound(String),

	/// Shifting colliding priorities would push this rule past the highest priority.
	#[error("template rule {0} cannot be shifted past the highest priority")]
	PriorityOverflow(String),

	/// The thread computing a shared cache load went away without a result.
	#[error("template load for {0} was abandoned")]
	LoadAbandoned(String),

	/// Configuration could not be read or parsed.
	#[error("invalid configuration: {0}")]
	Config(String),

	/// Persisted rules could not be (de)serialized.
	#[error("invalid rule data in {path}: {message}")]
	Serde {
		/// Rules file.
		path: PathBuf,
		/// Serializer diagnostic.
		message: String,
	},
}

impl TemplateError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source: Arc::new(source),
		}
	}

	pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Persistence {
			path: path.into(),
			source: Arc::new(source),
		}
	}
}

/// Result type for templating operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

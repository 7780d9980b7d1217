//! Boundary to the external template compiler.
//!
//! Template syntax is not interpreted here. A [`TemplateCompiler`] turns the
//! raw bytes of a template file into an opaque [`CompiledTemplate`]; the
//! engine only needs to know when a compiled tree wants to be rebuilt and
//! which attribute paths it reads.

use std::any::Any;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// A compiled template tree.
pub trait CompiledTemplate: Send + Sync + Debug {
	/// Whether the tree depends on something that changed since compilation,
	/// such as an included file.
	fn needs_reload(&self) -> bool {
		false
	}

	/// Attribute paths read by the tree, checked against the resource schema.
	fn referenced_attributes(&self) -> Vec<String> {
		Vec::new()
	}

	/// Downcasting hook for encoders that know the concrete tree type.
	fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a compiled template tree.
pub type CompiledTree = Arc<dyn CompiledTemplate>;

/// Compiles raw template bytes.
pub trait TemplateCompiler: Send + Sync {
	/// Compiles the template read from `path`.
	///
	/// The error string is a compiler diagnostic; the caller attaches the path.
	fn compile(&self, path: &Path, bytes: &[u8]) -> std::result::Result<CompiledTree, String>;
}

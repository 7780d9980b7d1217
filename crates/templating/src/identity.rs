//! Resource identities and cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a served resource: its workspace and name.
///
/// Identities are values; a rename produces a new identity rather than
/// mutating an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
	workspace: String,
	name: String,
}

impl ResourceIdentity {
	/// Creates an identity from a workspace and resource name.
	pub fn new(workspace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			workspace: workspace.into(),
			name: name.into(),
		}
	}

	/// Parses a `workspace:name` qualified name.
	pub fn parse(qualified: &str) -> Option<Self> {
		let (workspace, name) = qualified.split_once(':')?;
		(!workspace.is_empty() && !name.is_empty()).then(|| Self::new(workspace, name))
	}

	/// Workspace (namespace prefix) of the resource.
	pub fn workspace(&self) -> &str {
		&self.workspace
	}

	/// Local name of the resource.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Same resource moved to another workspace.
	pub fn with_workspace(&self, workspace: impl Into<String>) -> Self {
		Self::new(workspace, self.name.clone())
	}

	/// Same workspace, different resource name.
	pub fn with_name(&self, name: impl Into<String>) -> Self {
		Self::new(self.workspace.clone(), name)
	}
}

impl fmt::Display for ResourceIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.workspace, self.name)
	}
}

/// Key of the resolution cache: a resource and a template identifier.
///
/// The identifier is either a template descriptor identifier or a plain
/// template file name used by the output-format fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	resource: ResourceIdentity,
	template: String,
}

impl CacheKey {
	/// Builds a key.
	pub fn new(resource: ResourceIdentity, template: impl Into<String>) -> Self {
		Self {
			resource,
			template: template.into(),
		}
	}

	/// Resource part of the key.
	pub fn resource(&self) -> &ResourceIdentity {
		&self.resource
	}

	/// Template identifier part of the key.
	pub fn template(&self) -> &str {
		&self.template
	}
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.resource, self.template)
	}
}

//! Template descriptors and their change events.

use std::fmt;

use uuid::Uuid;

use crate::error::{Result, TemplateError};
use crate::locator::Scope;

const NAME_KEY: &str = "templateName";
const EXTENSION_KEY: &str = "extension";
const WORKSPACE_KEY: &str = "workspace";
const FEATURE_TYPE_KEY: &str = "featureTypeInfo";

/// Persisted metadata of one template file.
///
/// The identifier is generated once and never changes; everything else may be
/// edited through [`crate::service::TemplateService`] or catalog sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateDescriptor {
	identifier: String,
	template_name: String,
	workspace: Option<String>,
	feature_type: Option<String>,
	extension: String,
}

impl TemplateDescriptor {
	/// New global template with a fresh identifier.
	pub fn new(template_name: impl Into<String>, extension: impl Into<String>) -> Self {
		Self {
			identifier: Uuid::new_v4().to_string(),
			template_name: template_name.into(),
			workspace: None,
			feature_type: None,
			extension: extension.into(),
		}
	}

	/// Moves the descriptor into `scope`.
	pub fn with_scope(mut self, scope: &Scope) -> Self {
		let (workspace, feature_type) = match scope {
			Scope::Global => (None, None),
			Scope::Workspace(ws) => (Some(ws.clone()), None),
			Scope::FeatureType { workspace, name } => (Some(workspace.clone()), Some(name.clone())),
		};
		self.workspace = workspace;
		self.feature_type = feature_type;
		self
	}

	/// Renames the template.
	pub fn with_name(mut self, template_name: impl Into<String>) -> Self {
		self.template_name = template_name.into();
		self
	}

	/// Changes the file extension.
	pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
		self.extension = extension.into();
		self
	}

	pub fn identifier(&self) -> &str {
		&self.identifier
	}

	pub fn template_name(&self) -> &str {
		&self.template_name
	}

	pub fn workspace(&self) -> Option<&str> {
		self.workspace.as_deref()
	}

	pub fn feature_type(&self) -> Option<&str> {
		self.feature_type.as_deref()
	}

	pub fn extension(&self) -> &str {
		&self.extension
	}

	/// Scope directory the template file lives in.
	pub fn scope(&self) -> Scope {
		match (&self.workspace, &self.feature_type) {
			(Some(workspace), Some(name)) => Scope::FeatureType {
				workspace: workspace.clone(),
				name: name.clone(),
			},
			(Some(workspace), None) => Scope::Workspace(workspace.clone()),
			_ => Scope::Global,
		}
	}

	/// `[workspace:][featuretype:]name`, unique across the store.
	pub fn full_name(&self) -> String {
		let mut full = String::new();
		for part in [&self.workspace, &self.feature_type].into_iter().flatten() {
			full.push_str(part);
			full.push(':');
		}
		full.push_str(&self.template_name);
		full
	}

	/// `name.extension`.
	pub fn file_name(&self) -> String {
		format!("{}.{}", self.template_name, self.extension)
	}

	/// Checks that every field survives the metadata encoding.
	///
	/// Names must be non-empty and free of the `;` and `=` field separators;
	/// scope names may not contain `:` either, which separates full names.
	pub fn validate(&self) -> Result<()> {
		check_field("name", &self.template_name, false)?;
		check_field("extension", &self.extension, false)?;
		if let Some(ws) = &self.workspace {
			check_field("workspace", ws, true)?;
		}
		if let Some(ft) = &self.feature_type {
			check_field("feature type", ft, true)?;
		}
		Ok(())
	}

	pub(crate) fn to_property_value(&self) -> String {
		let mut value = format!("{NAME_KEY}={};{EXTENSION_KEY}={}", self.template_name, self.extension);
		if let Some(ws) = &self.workspace {
			value.push_str(&format!(";{WORKSPACE_KEY}={ws}"));
		}
		if let Some(ft) = &self.feature_type {
			value.push_str(&format!(";{FEATURE_TYPE_KEY}={ft}"));
		}
		value
	}

	pub(crate) fn from_property(key: &str, value: &str) -> Result<Self> {
		let invalid = |reason: &str| TemplateError::Metadata {
			key: key.to_string(),
			reason: reason.to_string(),
		};

		let mut template_name = None;
		let mut extension = None;
		let mut workspace = None;
		let mut feature_type = None;
		for field in value.split(';').filter(|f| !f.is_empty()) {
			let (name, val) = field.split_once('=').ok_or_else(|| invalid("field without `=`"))?;
			let slot = match name.trim() {
				NAME_KEY => &mut template_name,
				EXTENSION_KEY => &mut extension,
				WORKSPACE_KEY => &mut workspace,
				FEATURE_TYPE_KEY => &mut feature_type,
				_ => continue,
			};
			*slot = Some(val.trim().to_string()).filter(|v| !v.is_empty());
		}

		if key.is_empty() {
			return Err(invalid("empty identifier"));
		}
		if feature_type.is_some() && workspace.is_none() {
			return Err(invalid("feature type scope without workspace"));
		}
		Ok(Self {
			identifier: key.to_string(),
			template_name: template_name.ok_or_else(|| invalid("missing templateName"))?,
			workspace,
			feature_type,
			extension: extension.ok_or_else(|| invalid("missing extension"))?,
		})
	}
}

fn check_field(field: &'static str, value: &str, scope: bool) -> Result<()> {
	let invalid = |reason| TemplateError::InvalidName {
		field,
		value: value.to_string(),
		reason,
	};
	if value.trim().is_empty() {
		return Err(invalid("must not be empty"));
	}
	if value.contains([';', '=']) {
		return Err(invalid("must not contain `;` or `=`"));
	}
	if scope && value.contains(':') {
		return Err(invalid("must not contain `:`"));
	}
	Ok(())
}

impl fmt::Display for TemplateDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.full_name())
	}
}

/// Change notification fired by the store after a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateEvent {
	/// The descriptor was created or modified; carries the new state.
	Updated(TemplateDescriptor),
	/// The descriptor was removed; carries its last state.
	Deleted(TemplateDescriptor),
}

impl TemplateEvent {
	pub fn descriptor(&self) -> &TemplateDescriptor {
		match self {
			TemplateEvent::Updated(descriptor) | TemplateEvent::Deleted(descriptor) => descriptor,
		}
	}
}

/// Receives store events synchronously, before the mutating call returns.
pub trait TemplateListener: Send + Sync {
	fn on_event(&self, event: &TemplateEvent);
}

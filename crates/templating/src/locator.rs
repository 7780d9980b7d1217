//! On-disk layout of template files.
//!
//! ```text
//! <templates>/                                   global
//! <templates>/workspaces/<ws>/                   workspace
//! <templates>/workspaces/<ws>/featuretypes/<ft>/ feature type
//! ```
//!
//! A file in a more specific directory overrides one with the same name in
//! a less specific directory.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::catalog::Catalog;
use crate::error::{Result, TemplateError};
use crate::identity::ResourceIdentity;
use crate::store::TemplateDescriptor;

const WORKSPACES_DIR: &str = "workspaces";
const FEATURE_TYPES_DIR: &str = "featuretypes";

/// Directory level a template belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
	Global,
	Workspace(String),
	FeatureType { workspace: String, name: String },
}

impl Scope {
	/// Feature type scope of `resource`.
	pub fn of_resource(resource: &ResourceIdentity) -> Self {
		Scope::FeatureType {
			workspace: resource.workspace().to_string(),
			name: resource.name().to_string(),
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Scope::Global => f.write_str("global"),
			Scope::Workspace(ws) => f.write_str(ws),
			Scope::FeatureType { workspace, name } => write!(f, "{workspace}:{name}"),
		}
	}
}

/// Maps scopes and file names to paths below the templates directory.
pub struct ResourceLocator {
	root: PathBuf,
	catalog: Arc<dyn Catalog>,
}

impl ResourceLocator {
	pub fn new(root: impl Into<PathBuf>, catalog: Arc<dyn Catalog>) -> Self {
		Self {
			root: root.into(),
			catalog,
		}
	}

	/// Templates directory.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Path of `file_name` in the directory of `scope`, whether or not the file exists.
	///
	/// `None` when the scope no longer exists in the catalog.
	pub fn locate(&self, scope: &Scope, file_name: &str) -> Option<PathBuf> {
		self.scope_dir(scope).map(|dir| dir.join(file_name))
	}

	/// Path of a descriptor's file in exactly its own scope.
	pub fn locate_descriptor(&self, descriptor: &TemplateDescriptor) -> Option<PathBuf> {
		self.locate(&descriptor.scope(), &descriptor.file_name())
	}

	/// First existing `file_name` searching feature type, workspace, then global.
	///
	/// When no level has the file, returns the most specific candidate so
	/// that a file created there later is noticed by whoever watches it.
	pub fn locate_with_fallback(&self, resource: &ResourceIdentity, file_name: &str) -> Option<PathBuf> {
		let candidates: Vec<PathBuf> = [
			Scope::of_resource(resource),
			Scope::Workspace(resource.workspace().to_string()),
			Scope::Global,
		]
		.iter()
		.filter_map(|scope| self.locate(scope, file_name))
		.collect();

		candidates
			.iter()
			.find(|path| path.is_file())
			.or_else(|| candidates.first())
			.cloned()
	}

	/// Directory of `scope`, created if needed, for writing a template file.
	pub fn prepare_write(&self, scope: &Scope) -> Result<PathBuf> {
		let dir = self.scope_dir(scope).ok_or_else(|| TemplateError::NotFound(scope.to_string()))?;
		std::fs::create_dir_all(&dir).map_err(|e| TemplateError::io(&dir, e))?;
		Ok(dir)
	}

	/// Moves a workspace directory after the workspace was renamed.
	pub fn rename_workspace(&self, old: &str, new: &str) -> Result<()> {
		self.move_dir(&self.workspace_dir(old), &self.workspace_dir(new))
	}

	/// Moves a feature type directory after the feature type was renamed.
	pub fn rename_feature_type(&self, old: &ResourceIdentity, new: &ResourceIdentity) -> Result<()> {
		self.move_dir(&self.feature_type_dir(old), &self.feature_type_dir(new))
	}

	/// Deletes a workspace directory and everything below it.
	pub fn remove_workspace(&self, workspace: &str) -> Result<()> {
		remove_dir(&self.workspace_dir(workspace))
	}

	/// Deletes a feature type directory.
	pub fn remove_feature_type(&self, resource: &ResourceIdentity) -> Result<()> {
		remove_dir(&self.feature_type_dir(resource))
	}

	fn scope_dir(&self, scope: &Scope) -> Option<PathBuf> {
		match scope {
			Scope::Global => Some(self.root.clone()),
			Scope::Workspace(ws) => self.catalog.workspace_exists(ws).then(|| self.workspace_dir(ws)),
			Scope::FeatureType { workspace, name } => {
				let resource = ResourceIdentity::new(workspace.as_str(), name.as_str());
				self.catalog
					.resource_exists(&resource)
					.then(|| self.feature_type_dir(&resource))
			}
		}
	}

	fn workspace_dir(&self, workspace: &str) -> PathBuf {
		self.root.join(WORKSPACES_DIR).join(workspace)
	}

	fn feature_type_dir(&self, resource: &ResourceIdentity) -> PathBuf {
		self.workspace_dir(resource.workspace())
			.join(FEATURE_TYPES_DIR)
			.join(resource.name())
	}

	fn move_dir(&self, from: &Path, to: &Path) -> Result<()> {
		if !from.is_dir() {
			return Ok(());
		}
		if let Some(parent) = to.parent() {
			std::fs::create_dir_all(parent).map_err(|e| TemplateError::io(parent, e))?;
		}
		std::fs::rename(from, to).map_err(|e| TemplateError::io(from, e))?;
		info!(from = %from.display(), to = %to.display(), "moved template directory");
		Ok(())
	}
}

fn remove_dir(dir: &Path) -> Result<()> {
	match std::fs::remove_dir_all(dir) {
		Ok(()) => {
			info!(dir = %dir.display(), "removed template directory");
			Ok(())
		}
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
		Err(err) => Err(TemplateError::io(dir, err)),
	}
}

//! Boundary to the resource catalog and propagation of catalog changes.
//!
//! The catalog itself lives outside this crate; templating only needs to
//! know whether workspaces and resources exist and which attributes a
//! resource exposes. [`CatalogSync`] reacts to catalog edits by moving or
//! dropping everything keyed by the old names.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::cache::ResolutionCache;
use crate::error::Result;
use crate::identity::ResourceIdentity;
use crate::locator::{ResourceLocator, Scope};
use crate::rules::RuleRegistry;
use crate::store::{TemplateDescriptor, TemplateStore};

/// Read access to the resource catalog.
pub trait Catalog: Send + Sync {
	fn workspace_exists(&self, workspace: &str) -> bool;

	fn resource_exists(&self, resource: &ResourceIdentity) -> bool;

	/// Attribute paths exposed by `resource`; `None` when the schema is unknown,
	/// which skips validation.
	fn schema(&self, resource: &ResourceIdentity) -> Option<Vec<String>>;
}

/// Catalog held in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
	workspaces: RwLock<HashSet<String>>,
	resources: RwLock<HashMap<ResourceIdentity, Vec<String>>>,
}

impl InMemoryCatalog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_workspace(&self, workspace: impl Into<String>) {
		self.workspaces.write().insert(workspace.into());
	}

	/// Adds a resource and its workspace.
	pub fn add_resource<I, S>(&self, resource: ResourceIdentity, attributes: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.add_workspace(resource.workspace());
		self.resources
			.write()
			.insert(resource, attributes.into_iter().map(Into::into).collect());
	}

	pub fn remove_resource(&self, resource: &ResourceIdentity) {
		self.resources.write().remove(resource);
	}

	/// Removes a workspace and all of its resources.
	pub fn remove_workspace(&self, workspace: &str) {
		self.workspaces.write().remove(workspace);
		self.resources.write().retain(|r, _| r.workspace() != workspace);
	}

	pub fn rename_resource(&self, from: &ResourceIdentity, to: &ResourceIdentity) {
		let mut resources = self.resources.write();
		if let Some(attributes) = resources.remove(from) {
			resources.insert(to.clone(), attributes);
		}
	}

	pub fn rename_workspace(&self, from: &str, to: &str) {
		{
			let mut workspaces = self.workspaces.write();
			workspaces.remove(from);
			workspaces.insert(to.to_string());
		}
		let mut resources = self.resources.write();
		let moved: Vec<ResourceIdentity> = resources.keys().filter(|r| r.workspace() == from).cloned().collect();
		for resource in moved {
			if let Some(attributes) = resources.remove(&resource) {
				resources.insert(resource.with_workspace(to), attributes);
			}
		}
	}
}

impl Catalog for InMemoryCatalog {
	fn workspace_exists(&self, workspace: &str) -> bool {
		self.workspaces.read().contains(workspace)
	}

	fn resource_exists(&self, resource: &ResourceIdentity) -> bool {
		self.resources.read().contains_key(resource)
	}

	fn schema(&self, resource: &ResourceIdentity) -> Option<Vec<String>> {
		self.resources.read().get(resource).cloned()
	}
}

/// Catalog edit that templating must follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
	WorkspaceRenamed { from: String, to: String },
	FeatureTypeRenamed { from: ResourceIdentity, to: ResourceIdentity },
	WorkspaceRemoved(String),
	FeatureTypeRemoved(ResourceIdentity),
}

/// Applies catalog edits to template files, descriptors, rules and cache.
pub struct CatalogSync {
	store: Arc<TemplateStore>,
	rules: Arc<RuleRegistry>,
	cache: Arc<ResolutionCache>,
	locator: Arc<ResourceLocator>,
}

impl CatalogSync {
	pub fn new(
		store: Arc<TemplateStore>,
		rules: Arc<RuleRegistry>,
		cache: Arc<ResolutionCache>,
		locator: Arc<ResourceLocator>,
	) -> Self {
		Self {
			store,
			rules,
			cache,
			locator,
		}
	}

	pub fn handle(&self, event: &CatalogEvent) -> Result<()> {
		info!(event = ?event, "syncing templates with catalog change");
		match event {
			CatalogEvent::WorkspaceRenamed { from, to } => {
				self.locator.rename_workspace(from, to)?;
				let moved = self.rescope(|d| d.workspace() == Some(from.as_str()), |d| match d.scope() {
					Scope::FeatureType { name, .. } => Scope::FeatureType {
						workspace: to.clone(),
						name,
					},
					_ => Scope::Workspace(to.clone()),
				})?;
				self.store.save_many(moved)?;
				self.rules.move_workspace(from, to)?;
				self.cache.invalidate_workspace(from);
			}
			CatalogEvent::FeatureTypeRenamed { from, to } => {
				self.locator.rename_feature_type(from, to)?;
				let old_scope = Scope::of_resource(from);
				let moved = self.rescope(|d| d.scope() == old_scope, |_| Scope::of_resource(to))?;
				self.store.save_many(moved)?;
				self.rules.move_resource(from, to)?;
				self.cache.invalidate_resource(from);
			}
			CatalogEvent::WorkspaceRemoved(workspace) => {
				let doomed: Vec<_> = self
					.store
					.find_all()?
					.into_iter()
					.filter(|d| d.workspace() == Some(workspace.as_str()))
					.collect();
				self.store.delete_many(&doomed)?;
				self.rules.drop_workspace(workspace)?;
				self.locator.remove_workspace(workspace)?;
				self.cache.invalidate_workspace(workspace);
			}
			CatalogEvent::FeatureTypeRemoved(resource) => {
				let doomed = self.store.find_by_scope(&Scope::of_resource(resource))?;
				self.store.delete_many(&doomed)?;
				self.rules.drop_resource(resource)?;
				self.locator.remove_feature_type(resource)?;
				self.cache.invalidate_resource(resource);
			}
		}
		Ok(())
	}

	fn rescope(
		&self,
		affected: impl Fn(&TemplateDescriptor) -> bool,
		scope: impl Fn(&TemplateDescriptor) -> Scope,
	) -> Result<Vec<TemplateDescriptor>> {
		Ok(self
			.store
			.find_all()?
			.into_iter()
			.filter(|d| affected(d))
			.map(|d| {
				let scope = scope(&d);
				d.with_scope(&scope)
			})
			.collect())
	}
}

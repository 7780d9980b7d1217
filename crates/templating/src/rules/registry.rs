use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use geotmpl_request::{PredicateEvaluator, RequestContext};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{TemplateRule, priority, select};
use crate::error::{Result, TemplateError};
use crate::identity::ResourceIdentity;
use crate::store::{TemplateEvent, TemplateListener, write_atomic};

/// Immutable, priority-sorted rules of one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
	rules: Vec<TemplateRule>,
	version: u64,
}

impl RuleSet {
	pub fn rules(&self) -> &[TemplateRule] {
		&self.rules
	}

	/// Incremented every time the resource's rules are republished.
	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	fn next(&self, rules: Vec<TemplateRule>) -> Self {
		Self {
			rules,
			version: self.version + 1,
		}
	}
}

type Snapshot = HashMap<ResourceIdentity, Arc<RuleSet>>;

#[derive(Serialize, Deserialize)]
struct PersistedRules {
	resource: ResourceIdentity,
	rules: Vec<TemplateRule>,
}

/// Rule lists of every resource.
///
/// Readers load the current snapshot without locking. Writers build a new
/// snapshot from the one they loaded and publish it with compare-and-swap,
/// rebuilding from the fresh snapshot when another writer got there first.
/// The rule file is written inside the publish critical section, so the
/// file always matches the published snapshot.
pub struct RuleRegistry {
	snap: ArcSwap<Snapshot>,
	/// Held while writing the file and swapping in the matching snapshot.
	publish: Mutex<()>,
	path: Option<PathBuf>,
}

impl RuleRegistry {
	/// Registry kept in memory only.
	pub fn in_memory() -> Self {
		Self {
			snap: ArcSwap::from_pointee(Snapshot::new()),
			publish: Mutex::new(()),
			path: None,
		}
	}

	/// Registry persisted to `path`, loading existing rules from it.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let snapshot = read_rules(&path)?;
		info!(path = %path.display(), resources = snapshot.len(), "loaded template rules");
		Ok(Self {
			snap: ArcSwap::from_pointee(snapshot),
			publish: Mutex::new(()),
			path: Some(path),
		})
	}

	/// Current rules of `resource`; empty when it has none.
	pub fn rules(&self, resource: &ResourceIdentity) -> Arc<RuleSet> {
		self.snap.load().get(resource).cloned().unwrap_or_default()
	}

	/// Resources that currently have rules.
	pub fn resources(&self) -> Vec<ResourceIdentity> {
		let mut resources: Vec<_> = self.snap.load().keys().cloned().collect();
		resources.sort();
		resources
	}

	/// Template identifier selected for `request` on `resource`, if any rule matches.
	pub fn select_template(
		&self,
		resource: &ResourceIdentity,
		request: &RequestContext,
		evaluator: &dyn PredicateEvaluator,
	) -> Result<Option<String>> {
		let set = self.rules(resource);
		if set.is_empty() {
			return Ok(None);
		}
		let winner = select(set.rules(), request, evaluator)?;
		if let Some(rule) = winner {
			debug!(resource = %resource, rule = rule.rule_id(), template = rule.template_name(), "template rule matched");
		}
		Ok(winner.map(|rule| rule.template_identifier().to_string()))
	}

	/// Adds a rule, shifting colliding priorities up.
	pub fn insert(&self, resource: &ResourceIdentity, rule: TemplateRule) -> Result<()> {
		self.update_resource(resource, |rules| priority::insert(rules, rule.clone()))?;
		info!(resource = %resource, rule = rule.rule_id(), priority = rule.priority(), "inserted template rule");
		Ok(())
	}

	/// Replaces the rule with the same id.
	pub fn replace(&self, resource: &ResourceIdentity, rule: TemplateRule) -> Result<()> {
		self.update_resource(resource, |rules| priority::replace(rules, rule.clone()))?;
		info!(resource = %resource, rule = rule.rule_id(), priority = rule.priority(), "replaced template rule");
		Ok(())
	}

	/// Inserts a new rule or replaces an existing one with the same id.
	pub fn save(&self, resource: &ResourceIdentity, rule: TemplateRule) -> Result<()> {
		self.update_resource(resource, |rules| {
			if rules.iter().any(|r| r.rule_id() == rule.rule_id()) {
				priority::replace(rules, rule.clone())
			} else {
				priority::insert(rules, rule.clone())
			}
		})
	}

	/// Removes a rule by id.
	pub fn remove(&self, resource: &ResourceIdentity, rule_id: &str) -> Result<TemplateRule> {
		let removed = self.update_resource(resource, |rules| priority::remove(rules, rule_id))?;
		info!(resource = %resource, rule = rule_id, "removed template rule");
		Ok(removed)
	}

	/// Drops every rule selecting `template_id`, across all resources.
	pub fn remove_referencing(&self, template_id: &str) -> Result<usize> {
		let removed = self.publish(|snap| {
			let mut next = Snapshot::with_capacity(snap.len());
			let mut removed = 0;
			for (resource, set) in snap {
				let kept: Vec<_> = set.rules().iter().filter(|r| r.template_identifier() != template_id).cloned().collect();
				removed += set.rules().len() - kept.len();
				if kept.len() == set.rules().len() {
					next.insert(resource.clone(), Arc::clone(set));
				} else if !kept.is_empty() {
					next.insert(resource.clone(), Arc::new(set.next(kept)));
				}
			}
			Ok(((removed > 0).then_some(next), removed))
		})?;
		if removed > 0 {
			info!(template = template_id, removed, "removed rules of deleted template");
		}
		Ok(removed)
	}

	/// Refreshes the display name of rules selecting `template_id`.
	pub fn rename_template(&self, template_id: &str, template_name: &str) -> Result<usize> {
		self.publish(|snap| {
			let mut next = snap.clone();
			let mut renamed = 0;
			for set in next.values_mut() {
				let stale = |r: &TemplateRule| r.template_identifier() == template_id && r.template_name() != template_name;
				if !set.rules().iter().any(stale) {
					continue;
				}
				let mut rules = set.rules().to_vec();
				for rule in rules.iter_mut().filter(|r| stale(r)) {
					rule.set_template_name(template_name);
					renamed += 1;
				}
				*set = Arc::new(set.next(rules));
			}
			Ok(((renamed > 0).then_some(next), renamed))
		})
	}

	/// Re-keys the rules of a renamed resource.
	pub fn move_resource(&self, from: &ResourceIdentity, to: &ResourceIdentity) -> Result<()> {
		self.rekey(|resource| (resource == from).then(|| to.clone()))
	}

	/// Re-keys the rules of every resource of a renamed workspace.
	pub fn move_workspace(&self, from: &str, to: &str) -> Result<()> {
		self.rekey(|resource| (resource.workspace() == from).then(|| resource.with_workspace(to)))
	}

	/// Forgets the rules of a removed resource.
	pub fn drop_resource(&self, resource: &ResourceIdentity) -> Result<()> {
		self.retain(|r| r != resource)
	}

	/// Forgets the rules of every resource of a removed workspace.
	pub fn drop_workspace(&self, workspace: &str) -> Result<()> {
		self.retain(|r| r.workspace() != workspace)
	}

	fn update_resource<R>(
		&self,
		resource: &ResourceIdentity,
		mut change: impl FnMut(&mut Vec<TemplateRule>) -> Result<R>,
	) -> Result<R> {
		self.publish(|snap| {
			let current = snap.get(resource).cloned().unwrap_or_default();
			let mut rules = current.rules().to_vec();
			let out = change(&mut rules)?;
			let mut next = snap.clone();
			if rules.is_empty() {
				next.remove(resource);
			} else {
				next.insert(resource.clone(), Arc::new(current.next(rules)));
			}
			Ok((Some(next), out))
		})
	}

	fn rekey(&self, mut target: impl FnMut(&ResourceIdentity) -> Option<ResourceIdentity>) -> Result<()> {
		self.publish(|snap| {
			let mut moved = false;
			let mut next = Snapshot::with_capacity(snap.len());
			for (resource, set) in snap {
				match target(resource) {
					Some(renamed) => {
						moved = true;
						next.insert(renamed, Arc::new(set.next(set.rules().to_vec())));
					}
					None => {
						next.entry(resource.clone()).or_insert_with(|| Arc::clone(set));
					}
				}
			}
			Ok((moved.then_some(next), ()))
		})
	}

	fn retain(&self, mut keep: impl FnMut(&ResourceIdentity) -> bool) -> Result<()> {
		self.publish(|snap| {
			let next: Snapshot = snap
				.iter()
				.filter(|(resource, _)| keep(resource))
				.map(|(resource, set)| (resource.clone(), Arc::clone(set)))
				.collect();
			let changed = next.len() != snap.len();
			Ok((changed.then_some(next), ()))
		})
	}

	/// Compare-and-swap publication loop.
	///
	/// `change` computes the next snapshot from the loaded one, or `None` when
	/// there is nothing to publish. It may run several times.
	fn publish<R>(&self, mut change: impl FnMut(&Snapshot) -> Result<(Option<Snapshot>, R)>) -> Result<R> {
		loop {
			let old = self.snap.load_full();
			let (next, out) = change(&old)?;
			let Some(next) = next else {
				return Ok(out);
			};

			let _publish = self.publish.lock();
			if !Arc::ptr_eq(&self.snap.load(), &old) {
				debug!("template rules changed concurrently, retrying");
				continue;
			}
			self.persist(&next)?;
			let prev = self.snap.compare_and_swap(&old, Arc::new(next));
			if Arc::ptr_eq(&prev, &old) {
				return Ok(out);
			}
			warn!("template rule snapshot swapped outside the publish lock");
		}
	}

	fn persist(&self, snapshot: &Snapshot) -> Result<()> {
		let Some(path) = &self.path else {
			return Ok(());
		};
		let mut persisted: Vec<PersistedRules> = snapshot
			.iter()
			.map(|(resource, set)| PersistedRules {
				resource: resource.clone(),
				rules: set.rules().to_vec(),
			})
			.collect();
		persisted.sort_by(|a, b| a.resource.cmp(&b.resource));
		let json = serde_json::to_vec_pretty(&persisted).map_err(|e| TemplateError::Serde {
			path: path.clone(),
			message: e.to_string(),
		})?;
		write_atomic(path, &json)
	}
}

fn read_rules(path: &Path) -> Result<Snapshot> {
	let bytes = match std::fs::read(path) {
		Ok(bytes) => bytes,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Snapshot::new()),
		Err(err) => return Err(TemplateError::io(path, err)),
	};
	let persisted: Vec<PersistedRules> = serde_json::from_slice(&bytes).map_err(|e| TemplateError::Serde {
		path: path.to_path_buf(),
		message: e.to_string(),
	})?;
	Ok(persisted
		.into_iter()
		.filter(|p| !p.rules.is_empty())
		.map(|p| {
			let mut rules = p.rules;
			rules.sort_by_key(TemplateRule::priority);
			(p.resource, Arc::new(RuleSet { rules, version: 1 }))
		})
		.collect())
}

impl TemplateListener for RuleRegistry {
	fn on_event(&self, event: &TemplateEvent) {
		let descriptor = event.descriptor();
		let result = match event {
			TemplateEvent::Deleted(_) => self.remove_referencing(descriptor.identifier()).map(drop),
			TemplateEvent::Updated(_) => self
				.rename_template(descriptor.identifier(), &descriptor.full_name())
				.map(drop),
		};
		if let Err(error) = result {
			warn!(template = descriptor.identifier(), error = %error, "failed to sync template rules");
		}
	}
}

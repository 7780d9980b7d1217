//! Bounded cache of template handles with single-flight loading.
//!
//! Entries are evicted least-recently-used once the cache is full and dropped
//! when they have not been accessed for the configured idle time. Concurrent
//! misses on the same [`CacheKey`] run the loader once:
//!
//! 1. The first caller to miss registers an in-flight slot and becomes the
//!    leader; later callers find the slot and wait on it.
//! 2. The leader re-checks the cache (a previous leader may have finished in
//!    between), runs the loader and inserts a successful result.
//! 3. The slot is completed and removed by a drop guard, also when the
//!    loader unwinds, so waiters are never left blocked.
//!
//! Failed loads are shared with the waiters of that flight but never cached.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::{Result, TemplateError};
use crate::handle::TemplateHandle;
use crate::identity::{CacheKey, ResourceIdentity};
use crate::store::{TemplateEvent, TemplateListener};

struct Entry {
	handle: Arc<TemplateHandle>,
	last_access: Instant,
}

#[derive(Default)]
struct InFlight {
	result: Mutex<Option<Result<Arc<TemplateHandle>>>>,
	done: Condvar,
}

impl InFlight {
	fn wait(&self) -> Result<Arc<TemplateHandle>> {
		let mut slot = self.result.lock();
		loop {
			if let Some(result) = slot.as_ref() {
				return result.clone();
			}
			self.done.wait(&mut slot);
		}
	}
}

/// Resolution cache keyed by resource and template identifier.
pub struct ResolutionCache {
	entries: Mutex<LruCache<CacheKey, Entry>>,
	inflight: Mutex<HashMap<CacheKey, Arc<InFlight>>>,
	expire_after_access: Duration,
}

impl ResolutionCache {
	/// Creates a cache with the configured bounds.
	pub fn new(config: &CacheConfig) -> Self {
		Self::with_bounds(config.capacity(), config.expire_after_access())
	}

	/// Creates a cache holding at most `capacity` entries.
	pub fn with_bounds(capacity: NonZeroUsize, expire_after_access: Duration) -> Self {
		Self {
			entries: Mutex::new(LruCache::new(capacity)),
			inflight: Mutex::new(HashMap::new()),
			expire_after_access,
		}
	}

	/// Returns the cached handle for `key`, loading it with `loader` on a miss.
	pub fn resolve<F>(&self, key: &CacheKey, loader: F) -> Result<Arc<TemplateHandle>>
	where
		F: FnOnce() -> Result<Arc<TemplateHandle>>,
	{
		if let Some(handle) = self.get(key) {
			return Ok(handle);
		}

		let (flight, is_leader) = {
			let mut inflight = self.inflight.lock();
			match inflight.get(key) {
				Some(flight) => (Arc::clone(flight), false),
				None => {
					let flight = Arc::new(InFlight::default());
					inflight.insert(key.clone(), Arc::clone(&flight));
					(flight, true)
				}
			}
		};

		if !is_leader {
			debug!(key = %key, "waiting for in-flight template load");
			return flight.wait();
		}

		let guard = LoadGuard {
			cache: self,
			key,
			flight,
			completed: false,
		};

		if let Some(handle) = self.get(key) {
			guard.complete(Ok(Arc::clone(&handle)));
			return Ok(handle);
		}

		debug!(key = %key, "loading template");
		let result = loader();
		if let Ok(handle) = &result {
			self.refresh(key.clone(), Arc::clone(handle));
		}
		guard.complete(result.clone());
		result
	}

	/// Returns a live entry without loading.
	pub fn get(&self, key: &CacheKey) -> Option<Arc<TemplateHandle>> {
		let mut entries = self.entries.lock();
		match entries.get_mut(key) {
			None => return None,
			Some(entry) if entry.last_access.elapsed() < self.expire_after_access => {
				entry.last_access = Instant::now();
				return Some(Arc::clone(&entry.handle));
			}
			Some(_) => {}
		}
		debug!(key = %key, "template cache entry expired");
		entries.pop(key);
		None
	}

	/// Re-inserts `handle` under `key`, resetting its aging.
	pub fn refresh(&self, key: CacheKey, handle: Arc<TemplateHandle>) {
		self.entries.lock().put(
			key,
			Entry {
				handle,
				last_access: Instant::now(),
			},
		);
	}

	/// Drops the entry of one resource and template.
	pub fn invalidate(&self, resource: &ResourceIdentity, template: &str) {
		let key = CacheKey::new(resource.clone(), template);
		if self.entries.lock().pop(&key).is_some() {
			debug!(key = %key, "invalidated template cache entry");
		}
	}

	/// Drops every entry using `template`, whatever the resource.
	pub fn invalidate_all_matching(&self, template: &str) {
		let removed = self.remove_where(|key| key.template() == template);
		info!(template, removed, "invalidated cached template");
	}

	/// Drops every entry of `resource`.
	pub fn invalidate_resource(&self, resource: &ResourceIdentity) {
		let removed = self.remove_where(|key| key.resource() == resource);
		info!(resource = %resource, removed, "invalidated cached templates of resource");
	}

	/// Drops every entry of every resource in `workspace`.
	pub fn invalidate_workspace(&self, workspace: &str) {
		let removed = self.remove_where(|key| key.resource().workspace() == workspace);
		info!(workspace, removed, "invalidated cached templates of workspace");
	}

	/// Drops everything.
	pub fn invalidate_all(&self) {
		self.entries.lock().clear();
		info!("cleared template cache");
	}

	/// Number of entries, expired ones included until next touched.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Whether the cache holds no entries.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn remove_where(&self, mut predicate: impl FnMut(&CacheKey) -> bool) -> usize {
		let mut entries = self.entries.lock();
		let doomed: Vec<CacheKey> = entries.iter().map(|(key, _)| key).filter(|key| predicate(*key)).cloned().collect();
		for key in &doomed {
			entries.pop(key);
		}
		doomed.len()
	}
}

impl TemplateListener for ResolutionCache {
	fn on_event(&self, event: &TemplateEvent) {
		self.invalidate_all_matching(event.descriptor().identifier());
	}
}

/// Completes an in-flight slot, publishing an abandonment error if the leader
/// unwinds before producing a result.
struct LoadGuard<'a> {
	cache: &'a ResolutionCache,
	key: &'a CacheKey,
	flight: Arc<InFlight>,
	completed: bool,
}

impl LoadGuard<'_> {
	fn complete(mut self, result: Result<Arc<TemplateHandle>>) {
		self.finish(result);
	}

	fn finish(&mut self, result: Result<Arc<TemplateHandle>>) {
		self.completed = true;
		*self.flight.result.lock() = Some(result);
		self.flight.done.notify_all();
		self.cache.inflight.lock().remove(self.key);
	}
}

impl Drop for LoadGuard<'_> {
	fn drop(&mut self) {
		if !self.completed {
			self.finish(Err(TemplateError::LoadAbandoned(self.key.to_string())));
		}
	}
}

#[cfg(test)]
mod tests;

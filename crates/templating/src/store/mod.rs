//! Persisted catalog of template descriptors.
//!
//! Descriptors are stored one per line in a property file keyed by
//! identifier. The file is watched: reads pick up external edits, and every
//! mutation rewrites the whole file before the in-memory view changes.
//! Listeners are notified synchronously once the write is committed.

mod descriptor;
pub mod properties;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use descriptor::{TemplateDescriptor, TemplateEvent, TemplateListener};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{Result, TemplateError};
use crate::handle::{ParseFn, Reloadable, Watched};
use crate::locator::Scope;

/// Descriptors sorted by full name.
type Snapshot = Arc<Vec<TemplateDescriptor>>;

impl Reloadable for Snapshot {}

const FILE_COMMENT: &str = "feature templates";

/// Descriptor store backed by a property file.
pub struct TemplateStore {
	file: Watched<Snapshot>,
	/// Serializes mutations; reads go through the watched file.
	writer: Mutex<()>,
	listeners: RwLock<Vec<Arc<dyn TemplateListener>>>,
}

impl TemplateStore {
	/// Opens the store at `path`. A missing file is an empty store.
	pub fn open(path: impl Into<PathBuf>, watch_interval: Duration) -> Result<Self> {
		let parse: ParseFn<Snapshot> = Arc::new(parse_file);
		let file = Watched::new(path, watch_interval, parse);
		file.load()?;
		let store = Self {
			file,
			writer: Mutex::new(()),
			listeners: RwLock::new(Vec::new()),
		};
		info!(path = %store.path().display(), templates = store.snapshot()?.len(), "opened template store");
		Ok(store)
	}

	/// Property file path.
	pub fn path(&self) -> &Path {
		self.file.path()
	}

	/// Registers a listener for update and delete events.
	pub fn add_listener(&self, listener: Arc<dyn TemplateListener>) {
		self.listeners.write().push(listener);
	}

	/// All descriptors, sorted by full name.
	pub fn find_all(&self) -> Result<Vec<TemplateDescriptor>> {
		Ok(self.snapshot()?.to_vec())
	}

	pub fn find_by_id(&self, identifier: &str) -> Result<Option<TemplateDescriptor>> {
		Ok(self.snapshot()?.iter().find(|d| d.identifier() == identifier).cloned())
	}

	pub fn find_by_full_name(&self, full_name: &str) -> Result<Option<TemplateDescriptor>> {
		Ok(self.snapshot()?.iter().find(|d| d.full_name() == full_name).cloned())
	}

	/// Descriptors whose scope is exactly `scope`.
	pub fn find_by_scope(&self, scope: &Scope) -> Result<Vec<TemplateDescriptor>> {
		Ok(self.snapshot()?.iter().filter(|d| d.scope() == *scope).cloned().collect())
	}

	/// Inserts or replaces a descriptor (matched by identifier).
	///
	/// Fails with [`TemplateError::Duplicate`] when another descriptor already
	/// uses the same full name, and with [`TemplateError::InvalidName`] when a
	/// field cannot be stored.
	pub fn save_or_update(&self, descriptor: TemplateDescriptor) -> Result<TemplateDescriptor> {
		self.save_many(vec![descriptor.clone()])?;
		Ok(descriptor)
	}

	/// Saves several descriptors with a single file write.
	pub fn save_many(&self, descriptors: Vec<TemplateDescriptor>) -> Result<()> {
		if descriptors.is_empty() {
			return Ok(());
		}
		for descriptor in &descriptors {
			descriptor.validate()?;
		}
		{
			let _writer = self.writer.lock();
			let current = self.snapshot()?;
			let mut next: Vec<TemplateDescriptor> = current
				.iter()
				.filter(|d| !descriptors.iter().any(|n| n.identifier() == d.identifier()))
				.cloned()
				.collect();
			for descriptor in &descriptors {
				let full_name = descriptor.full_name();
				if next.iter().any(|d| d.full_name() == full_name) {
					return Err(TemplateError::Duplicate(full_name));
				}
				next.push(descriptor.clone());
			}
			self.commit(next)?;
		}
		for descriptor in descriptors {
			info!(id = descriptor.identifier(), template = %descriptor, "saved template descriptor");
			self.notify(&TemplateEvent::Updated(descriptor));
		}
		Ok(())
	}

	/// Removes a descriptor. Unknown descriptors are ignored.
	pub fn delete(&self, descriptor: &TemplateDescriptor) -> Result<()> {
		self.delete_many(std::slice::from_ref(descriptor))
	}

	/// Removes several descriptors with a single file write.
	pub fn delete_many(&self, descriptors: &[TemplateDescriptor]) -> Result<()> {
		let removed = {
			let _writer = self.writer.lock();
			let current = self.snapshot()?;
			let (removed, kept): (Vec<_>, Vec<_>) = current
				.iter()
				.cloned()
				.partition(|d| descriptors.iter().any(|x| x.identifier() == d.identifier()));
			if removed.is_empty() {
				return Ok(());
			}
			self.commit(kept)?;
			removed
		};
		for descriptor in removed {
			info!(id = descriptor.identifier(), template = %descriptor, "deleted template descriptor");
			self.notify(&TemplateEvent::Deleted(descriptor));
		}
		Ok(())
	}

	/// Removes every descriptor.
	pub fn delete_all(&self) -> Result<()> {
		let all = self.find_all()?;
		self.delete_many(&all)
	}

	fn snapshot(&self) -> Result<Snapshot> {
		if self.file.check_and_reload()? {
			debug!(path = %self.path().display(), "reloaded template store from disk");
		}
		Ok(self.file.current().unwrap_or_default())
	}

	fn commit(&self, mut descriptors: Vec<TemplateDescriptor>) -> Result<()> {
		descriptors.sort_by_key(TemplateDescriptor::full_name);
		let values: Vec<(String, String)> = descriptors
			.iter()
			.map(|d| (d.identifier().to_string(), d.to_property_value()))
			.collect();
		let text = properties::write(values.iter().map(|(k, v)| (k.as_str(), v.as_str())), Some(FILE_COMMENT));
		write_atomic(self.path(), text.as_bytes())?;
		self.file.replace(Some(Arc::new(descriptors)));
		Ok(())
	}

	fn notify(&self, event: &TemplateEvent) {
		let listeners = self.listeners.read().clone();
		for listener in listeners {
			listener.on_event(event);
		}
	}
}

fn parse_file(_path: &Path, bytes: &[u8]) -> Result<Snapshot> {
	let text = String::from_utf8_lossy(bytes);
	let mut descriptors = properties::parse(&text)
		.into_iter()
		.map(|(key, value)| TemplateDescriptor::from_property(&key, &value))
		.collect::<Result<Vec<_>>>()?;
	descriptors.sort_by_key(TemplateDescriptor::full_name);
	Ok(Arc::new(descriptors))
}

/// Writes `bytes` to a sibling temp file and renames it over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
	let persist_err = |e| TemplateError::persistence(path, e);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).map_err(persist_err)?;
	}
	let mut tmp = path.as_os_str().to_owned();
	tmp.push(".tmp");
	let tmp = PathBuf::from(tmp);
	let mut file = std::fs::File::create(&tmp).map_err(persist_err)?;
	file.write_all(bytes).map_err(persist_err)?;
	file.sync_all().map_err(persist_err)?;
	drop(file);
	std::fs::rename(&tmp, path).map_err(persist_err)
}

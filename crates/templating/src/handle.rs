//! File-backed values that reload themselves when the file changes.
//!
//! [`Watched`] couples a located path, a [`FileWatcher`] and the value parsed
//! from the file. Compiled templates ([`TemplateHandle`]) and the template
//! metadata file both go through it, differing only in the parse function.
//!
//! # State machine
//!
//! ```text
//! Unloaded --load--> Loaded --file changed / needs_reload--> Stale
//!                      ^                                       |
//!                      +------------- Reloading <--------------+
//! ```
//!
//! A failed reload returns the handle to `Stale` without re-stamping the
//! watcher, so the next check retries.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::compiler::CompiledTree;
use crate::error::Result;
use crate::watcher::FileWatcher;

/// Values that can ask to be rebuilt independently of their file.
pub trait Reloadable {
	/// Whether the value wants to be rebuilt even though its file did not change.
	fn needs_reload(&self) -> bool {
		false
	}
}

impl Reloadable for CompiledTree {
	fn needs_reload(&self) -> bool {
		(**self).needs_reload()
	}
}

/// Lifecycle state of a [`Watched`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
	Unloaded,
	Loaded,
	Stale,
	Reloading,
}

/// Parses file bytes into a value. Receives the path for diagnostics.
pub type ParseFn<T> = Arc<dyn Fn(&Path, &[u8]) -> Result<T> + Send + Sync>;

/// A value parsed from a file and kept in sync with it.
pub struct Watched<T> {
	path: PathBuf,
	watcher: Mutex<FileWatcher>,
	value: RwLock<Option<T>>,
	state: Mutex<HandleState>,
	/// Serializes reloads of this value only.
	reload_lock: Mutex<()>,
	parse: ParseFn<T>,
}

/// Handle to one compiled template file.
pub type TemplateHandle = Watched<CompiledTree>;

impl<T> fmt::Debug for Watched<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Watched")
			.field("path", &self.path)
			.field("state", &*self.state.lock())
			.finish_non_exhaustive()
	}
}

impl<T: Clone + Reloadable> Watched<T> {
	/// Creates an unloaded handle for `path`.
	pub fn new(path: impl Into<PathBuf>, interval: Duration, parse: ParseFn<T>) -> Self {
		let path = path.into();
		Self {
			watcher: Mutex::new(FileWatcher::new(path.clone(), interval)),
			path,
			value: RwLock::new(None),
			state: Mutex::new(HandleState::Unloaded),
			reload_lock: Mutex::new(()),
			parse,
		}
	}

	/// Path the value is read from.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Current lifecycle state.
	pub fn state(&self) -> HandleState {
		*self.state.lock()
	}

	/// Current value; `None` when the file does not exist.
	pub fn current(&self) -> Option<T> {
		self.value.read().clone()
	}

	/// Performs the first load. Calling it on a loaded handle reloads only if stale.
	pub fn load(&self) -> Result<()> {
		let _guard = self.reload_lock.lock();
		if self.state() == HandleState::Unloaded || self.is_stale() {
			self.reload_locked()?;
		}
		Ok(())
	}

	/// Whether the file changed or the value asked to be rebuilt.
	pub fn is_stale(&self) -> bool {
		let stale = self.watcher.lock().is_stale()
			|| self.value.read().as_ref().is_some_and(Reloadable::needs_reload);
		if stale {
			let mut state = self.state.lock();
			if *state == HandleState::Loaded {
				*state = HandleState::Stale;
			}
		}
		stale
	}

	/// Reloads the value if stale. Returns whether a reload happened.
	///
	/// Concurrent callers observing the same change trigger a single reload.
	pub fn check_and_reload(&self) -> Result<bool> {
		if !self.is_stale() {
			return Ok(false);
		}
		let _guard = self.reload_lock.lock();
		if !self.is_stale() {
			return Ok(false);
		}
		self.reload_locked()?;
		Ok(true)
	}

	/// Replaces the value after the caller wrote the file itself.
	pub fn replace(&self, value: Option<T>) {
		let _guard = self.reload_lock.lock();
		*self.value.write() = value;
		self.watcher.lock().mark_current();
		*self.state.lock() = HandleState::Loaded;
	}

	fn reload_locked(&self) -> Result<()> {
		let previous = std::mem::replace(&mut *self.state.lock(), HandleState::Reloading);
		match self.read_and_parse() {
			Ok(()) => {
				*self.state.lock() = HandleState::Loaded;
				debug!(path = %self.path.display(), "loaded watched file");
				Ok(())
			}
			Err(err) => {
				let next = if previous == HandleState::Unloaded {
					HandleState::Unloaded
				} else {
					HandleState::Stale
				};
				*self.state.lock() = next;
				warn!(path = %self.path.display(), error = %err, "reload failed");
				Err(err)
			}
		}
	}

	fn read_and_parse(&self) -> Result<()> {
		let mut watcher = self.watcher.lock();
		match watcher.read()? {
			Some((bytes, stamp)) => {
				let value = (self.parse)(&self.path, &bytes)?;
				*self.value.write() = Some(value);
				watcher.mark_loaded(stamp);
			}
			None => {
				*self.value.write() = None;
				watcher.mark_loaded(None);
			}
		}
		Ok(())
	}
}

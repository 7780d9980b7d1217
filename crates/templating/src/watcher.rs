//! Polling change detection for a single file.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::error::{Result, TemplateError};

/// Modification stamp of a file: last modified time and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
	modified: SystemTime,
	len: u64,
}

impl Stamp {
	fn of(metadata: &std::fs::Metadata) -> Self {
		Self {
			modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
			len: metadata.len(),
		}
	}
}

/// What a stat call observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observation {
	Missing,
	Present(Stamp),
	Failed,
}

impl From<Option<Stamp>> for Observation {
	fn from(stamp: Option<Stamp>) -> Self {
		stamp.map_or(Observation::Missing, Observation::Present)
	}
}

/// Tracks whether one file changed since it was last loaded.
///
/// The watcher never reads content on its own; [`FileWatcher::read`] returns
/// bytes together with the stamp to hand back to [`FileWatcher::mark_loaded`]
/// once the caller has successfully consumed them.
#[derive(Debug)]
pub struct FileWatcher {
	path: PathBuf,
	/// Stamp of the content last loaded; `None` before the first load.
	loaded: Option<Observation>,
	observed: Option<Observation>,
	last_check: Option<Instant>,
	interval: Duration,
}

impl FileWatcher {
	/// Watches `path`, re-stating it at most once per `interval`.
	pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
		Self {
			path: path.into(),
			loaded: None,
			observed: None,
			last_check: None,
			interval,
		}
	}

	/// Watched path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Whether the file changed (or appeared, or vanished) since the last load.
	///
	/// Checking does not clear staleness; only [`FileWatcher::mark_loaded`]
	/// does. A failed stat is reported as stale so the reload path surfaces
	/// the error.
	pub fn is_stale(&mut self) -> bool {
		let Some(loaded) = self.loaded else {
			return true;
		};
		let due = self.last_check.is_none_or(|at| at.elapsed() >= self.interval);
		if due {
			self.observed = Some(self.stat());
			self.last_check = Some(Instant::now());
		}
		match self.observed {
			Some(Observation::Failed) => true,
			Some(observed) => observed != loaded,
			None => false,
		}
	}

	/// Reads the file. A missing file yields `Ok(None)`.
	///
	/// The stamp is taken from the opened file before reading, so a write
	/// racing the read leaves the watcher stale rather than stamping old
	/// bytes with the new modification time.
	pub fn read(&self) -> Result<Option<(Vec<u8>, Option<Stamp>)>> {
		let mut file = match File::open(&self.path) {
			Ok(file) => file,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
			Err(err) => return Err(TemplateError::io(&self.path, err)),
		};
		let stamp = file.metadata().ok().map(|m| Stamp::of(&m));
		let mut bytes = Vec::new();
		file.read_to_end(&mut bytes).map_err(|e| TemplateError::io(&self.path, e))?;
		Ok(Some((bytes, stamp)))
	}

	/// Records the stamp of the content just loaded; `None` records "absent".
	pub fn mark_loaded(&mut self, stamp: Option<Stamp>) {
		let observation = Observation::from(stamp);
		self.loaded = Some(observation);
		self.observed = Some(observation);
		self.last_check = Some(Instant::now());
	}

	/// Records whatever is on disk now as loaded, after the caller wrote it.
	pub fn mark_current(&mut self) {
		let stamp = match self.stat() {
			Observation::Present(stamp) => Some(stamp),
			_ => None,
		};
		self.mark_loaded(stamp);
	}

	fn stat(&self) -> Observation {
		match std::fs::metadata(&self.path) {
			Ok(metadata) => Observation::Present(Stamp::of(&metadata)),
			Err(err) if err.kind() == ErrorKind::NotFound => Observation::Missing,
			Err(_) => Observation::Failed,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn load(watcher: &mut FileWatcher) -> Option<Vec<u8>> {
		let read = watcher.read().unwrap();
		let stamp = read.as_ref().and_then(|(_, stamp)| *stamp);
		watcher.mark_loaded(stamp);
		read.map(|(bytes, _)| bytes)
	}

	#[test]
	fn unloaded_watcher_is_stale() {
		let dir = tempfile::tempdir().unwrap();
		let mut watcher = FileWatcher::new(dir.path().join("t.json"), Duration::ZERO);
		assert!(watcher.is_stale());
		assert_eq!(load(&mut watcher), None);
		assert!(!watcher.is_stale());
	}

	#[test]
	fn detects_modification_until_reloaded() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("t.json");
		std::fs::write(&path, "{}").unwrap();
		let mut watcher = FileWatcher::new(&path, Duration::ZERO);
		assert_eq!(load(&mut watcher).as_deref(), Some(&b"{}"[..]));
		assert!(!watcher.is_stale());

		std::fs::write(&path, "{\"a\":1}").unwrap();
		assert!(watcher.is_stale());
		// checking twice does not consume the change
		assert!(watcher.is_stale());
		load(&mut watcher);
		assert!(!watcher.is_stale());
	}

	#[test]
	fn deletion_is_reported_once_then_absent() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("t.xml");
		std::fs::write(&path, "<a/>").unwrap();
		let mut watcher = FileWatcher::new(&path, Duration::ZERO);
		load(&mut watcher);

		std::fs::remove_file(&path).unwrap();
		assert!(watcher.is_stale());
		assert_eq!(load(&mut watcher), None);
		assert!(!watcher.is_stale());
	}

	#[test]
	fn change_after_read_is_not_masked() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("t.json");
		std::fs::write(&path, "v1").unwrap();
		let mut watcher = FileWatcher::new(&path, Duration::ZERO);
		let (bytes, stamp) = watcher.read().unwrap().unwrap();
		assert_eq!(bytes, b"v1");

		// same length, later mtime, landing before the caller marks the read as loaded
		std::fs::write(&path, "v2").unwrap();
		let file = File::options().write(true).open(&path).unwrap();
		file.set_modified(SystemTime::now() + Duration::from_secs(10)).unwrap();
		watcher.mark_loaded(stamp);

		assert!(watcher.is_stale());
		assert_eq!(load(&mut watcher).as_deref(), Some(&b"v2"[..]));
		assert!(!watcher.is_stale());
	}

	#[test]
	fn interval_throttles_filesystem_checks() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("t.json");
		std::fs::write(&path, "{}").unwrap();
		let mut watcher = FileWatcher::new(&path, Duration::from_secs(3600));
		load(&mut watcher);

		std::fs::write(&path, "{\"changed\":true}").unwrap();
		assert!(!watcher.is_stale());
	}
}

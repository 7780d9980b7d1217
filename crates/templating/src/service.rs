//! Administrative operations on template files and their descriptors.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::{Result, TemplateError};
use crate::locator::{ResourceLocator, Scope};
use crate::store::{TemplateDescriptor, TemplateStore, write_atomic};

const MEDIA_TYPES: &[(&str, &str)] = &[
	("application/json", "json"),
	("text/json", "json"),
	("application/xml", "xml"),
	("text/xml", "xml"),
	("application/xhtml+xml", "xhtml"),
];

/// File extension stored for an uploaded template of `media_type`.
///
/// Parameters after `;` are ignored.
pub fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
	let essence = media_type.split(';').next().unwrap_or_default().trim();
	MEDIA_TYPES
		.iter()
		.find(|(media, _)| media.eq_ignore_ascii_case(essence))
		.map(|(_, ext)| *ext)
}

/// Media type a template file with `extension` is served as.
pub fn media_type_for_extension(extension: &str) -> Option<&'static str> {
	MEDIA_TYPES
		.iter()
		.find(|(_, ext)| ext.eq_ignore_ascii_case(extension))
		.map(|(media, _)| *media)
}

/// Writes, reads and deletes template files together with their descriptors.
pub struct TemplateService {
	store: Arc<TemplateStore>,
	locator: Arc<ResourceLocator>,
}

impl TemplateService {
	pub fn new(store: Arc<TemplateStore>, locator: Arc<ResourceLocator>) -> Self {
		Self { store, locator }
	}

	/// Stores `content` as the template file of `descriptor` and saves the descriptor.
	///
	/// When an existing descriptor moves to another scope, name or extension,
	/// its old file is removed.
	pub fn save_or_update(&self, descriptor: TemplateDescriptor, content: &[u8]) -> Result<TemplateDescriptor> {
		descriptor.validate()?;
		let full_name = descriptor.full_name();
		if let Some(existing) = self.store.find_by_full_name(&full_name)?
			&& existing.identifier() != descriptor.identifier()
		{
			return Err(TemplateError::Duplicate(full_name));
		}
		let previous = self.store.find_by_id(descriptor.identifier())?;

		let dir = self.locator.prepare_write(&descriptor.scope())?;
		let path = dir.join(descriptor.file_name());
		write_atomic(&path, content)?;

		if let Some(previous) = previous
			&& (previous.scope() != descriptor.scope() || previous.file_name() != descriptor.file_name())
			&& let Some(old) = self.locator.locate_descriptor(&previous)
		{
			remove_file(&old)?;
		}

		info!(id = descriptor.identifier(), template = %full_name, path = %path.display(), "stored template");
		self.store.save_or_update(descriptor)
	}

	/// Deletes the template file and its descriptor.
	pub fn delete(&self, descriptor: &TemplateDescriptor) -> Result<()> {
		if let Some(path) = self.locator.locate_descriptor(descriptor) {
			remove_file(&path)?;
		}
		self.store.delete(descriptor)?;
		info!(id = descriptor.identifier(), template = %descriptor, "deleted template");
		Ok(())
	}

	/// Raw content of a template file.
	pub fn content(&self, descriptor: &TemplateDescriptor) -> Result<Vec<u8>> {
		let missing = || TemplateError::NotFound(descriptor.full_name());
		let path = self.locator.locate_descriptor(descriptor).ok_or_else(missing)?;
		match std::fs::read(&path) {
			Ok(bytes) => Ok(bytes),
			Err(err) if err.kind() == ErrorKind::NotFound => Err(missing()),
			Err(err) => Err(TemplateError::io(path, err)),
		}
	}

	/// Descriptors defined exactly in `scope`.
	pub fn list(&self, scope: &Scope) -> Result<Vec<TemplateDescriptor>> {
		self.store.find_by_scope(scope)
	}

	/// Descriptor by full name, failing when absent.
	pub fn get(&self, full_name: &str) -> Result<TemplateDescriptor> {
		self.store
			.find_by_full_name(full_name)?
			.ok_or_else(|| TemplateError::NotFound(full_name.to_string()))
	}
}

fn remove_file(path: &Path) -> Result<()> {
	match std::fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
		Err(err) => Err(TemplateError::io(path, err)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn media_types_map_to_extensions() {
		assert_eq!(extension_for_media_type("application/json"), Some("json"));
		assert_eq!(extension_for_media_type("text/xml; charset=UTF-8"), Some("xml"));
		assert_eq!(extension_for_media_type("application/xhtml+xml"), Some("xhtml"));
		assert_eq!(extension_for_media_type("image/png"), None);
		assert_eq!(media_type_for_extension("xhtml"), Some("application/xhtml+xml"));
		assert_eq!(media_type_for_extension("json"), Some("application/json"));
	}
}

//! Feature response template resolution and caching.
//!
//! Given a served resource, an output format and the request being
//! answered, this crate decides which template applies, loads and compiles
//! it through a pluggable [`TemplateCompiler`], keeps it fresh while the file
//! changes on disk, and caches it for concurrent requests. Template rules,
//! template metadata and the on-disk layout follow catalog renames and
//! removals through [`CatalogSync`].
//!
//! [`TemplateEngine::open`] builds and wires every component.

pub mod cache;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod handle;
pub mod identity;
pub mod loader;
pub mod locator;
pub mod rules;
pub mod service;
pub mod store;
pub mod watcher;

pub use cache::ResolutionCache;
pub use catalog::{Catalog, CatalogEvent, CatalogSync, InMemoryCatalog};
pub use compiler::{CompiledTemplate, CompiledTree, TemplateCompiler};
pub use config::{CacheConfig, EngineConfig};
pub use engine::TemplateEngine;
pub use error::{Result, TemplateError};
pub use format::{OutputFormatFamily, TemplateIdentifier};
pub use handle::{HandleState, TemplateHandle, Watched};
pub use identity::{CacheKey, ResourceIdentity};
pub use loader::TemplateLoader;
pub use locator::{ResourceLocator, Scope};
pub use rules::{RuleRegistry, RuleSet, TemplateRule};
pub use service::TemplateService;
pub use store::{TemplateDescriptor, TemplateEvent, TemplateListener, TemplateStore};

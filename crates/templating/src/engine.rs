//! Assembly of the templating components.

use std::sync::Arc;

use geotmpl_request::{PredicateEvaluator, RequestContext};
use tracing::info;

use crate::cache::ResolutionCache;
use crate::catalog::{Catalog, CatalogEvent, CatalogSync};
use crate::compiler::{CompiledTree, TemplateCompiler};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::identity::ResourceIdentity;
use crate::loader::TemplateLoader;
use crate::locator::ResourceLocator;
use crate::rules::RuleRegistry;
use crate::service::TemplateService;
use crate::store::TemplateStore;

/// Every templating component, built once and wired together.
///
/// The store notifies the rule registry and the cache of descriptor changes;
/// neither holds a reference back to the store.
pub struct TemplateEngine {
	config: EngineConfig,
	store: Arc<TemplateStore>,
	rules: Arc<RuleRegistry>,
	cache: Arc<ResolutionCache>,
	loader: TemplateLoader,
	service: TemplateService,
	sync: CatalogSync,
}

impl TemplateEngine {
	/// Opens persisted state below the configured data directory.
	pub fn open(
		config: EngineConfig,
		catalog: Arc<dyn Catalog>,
		compiler: Arc<dyn TemplateCompiler>,
		evaluator: Arc<dyn PredicateEvaluator>,
	) -> Result<Self> {
		let locator = Arc::new(ResourceLocator::new(config.templates_root(), Arc::clone(&catalog)));
		let store = Arc::new(TemplateStore::open(config.store_path(), config.watch_interval())?);
		let rules = Arc::new(match config.rules_path() {
			Some(path) => RuleRegistry::open(path)?,
			None => RuleRegistry::in_memory(),
		});
		let cache = Arc::new(ResolutionCache::new(&config.cache));

		store.add_listener(rules.clone());
		store.add_listener(cache.clone());

		let loader = TemplateLoader::new(
			Arc::clone(&store),
			Arc::clone(&rules),
			Arc::clone(&cache),
			Arc::clone(&locator),
			catalog,
			compiler,
			evaluator,
			config.watch_interval(),
		);
		let service = TemplateService::new(Arc::clone(&store), Arc::clone(&locator));
		let sync = CatalogSync::new(Arc::clone(&store), Arc::clone(&rules), Arc::clone(&cache), locator);

		info!(
			root = %config.templates_root().display(),
			cache_entries = config.cache.max_entries,
			"templating engine ready"
		);
		Ok(Self {
			config,
			store,
			rules,
			cache,
			loader,
			service,
			sync,
		})
	}

	/// See [`TemplateLoader::resolve_template`].
	pub fn resolve_template(
		&self,
		resource: &ResourceIdentity,
		output_format: &str,
		request: Option<&RequestContext>,
	) -> Result<Option<CompiledTree>> {
		self.loader.resolve_template(resource, output_format, request)
	}

	/// Applies a catalog change.
	pub fn handle_catalog_event(&self, event: &CatalogEvent) -> Result<()> {
		self.sync.handle(event)
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn loader(&self) -> &TemplateLoader {
		&self.loader
	}

	pub fn service(&self) -> &TemplateService {
		&self.service
	}

	pub fn rules(&self) -> &RuleRegistry {
		&self.rules
	}

	pub fn store(&self) -> &TemplateStore {
		&self.store
	}

	pub fn cache(&self) -> &ResolutionCache {
		&self.cache
	}
}

//! Resolution of the compiled template serving a request.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use geotmpl_request::{PredicateEvaluator, RequestContext};
use tracing::{debug, info};

use crate::cache::ResolutionCache;
use crate::catalog::Catalog;
use crate::compiler::{CompiledTree, TemplateCompiler};
use crate::error::{Result, TemplateError};
use crate::format::TemplateIdentifier;
use crate::handle::{ParseFn, TemplateHandle, Watched};
use crate::identity::{CacheKey, ResourceIdentity};
use crate::locator::ResourceLocator;
use crate::rules::RuleRegistry;
use crate::store::TemplateStore;

/// Finds, loads and validates the template for a resource and request.
///
/// Resolution order:
///
/// 1. the template selected by the resource's rules;
/// 2. otherwise the default template file of the requested output format,
///    looked up in the feature type, workspace and global directories;
/// 3. otherwise nothing, and the encoder falls back to its native output.
pub struct TemplateLoader {
	store: Arc<TemplateStore>,
	rules: Arc<RuleRegistry>,
	cache: Arc<ResolutionCache>,
	locator: Arc<ResourceLocator>,
	catalog: Arc<dyn Catalog>,
	compiler: Arc<dyn TemplateCompiler>,
	evaluator: Arc<dyn PredicateEvaluator>,
	watch_interval: Duration,
}

impl TemplateLoader {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		store: Arc<TemplateStore>,
		rules: Arc<RuleRegistry>,
		cache: Arc<ResolutionCache>,
		locator: Arc<ResourceLocator>,
		catalog: Arc<dyn Catalog>,
		compiler: Arc<dyn TemplateCompiler>,
		evaluator: Arc<dyn PredicateEvaluator>,
		watch_interval: Duration,
	) -> Self {
		Self {
			store,
			rules,
			cache,
			locator,
			catalog,
			compiler,
			evaluator,
			watch_interval,
		}
	}

	/// Compiled template for `resource` in `output_format`, if one applies.
	///
	/// `request` carries the predicates rules can inspect; when it has no
	/// explicit output format, `output_format` is used for rule matching.
	/// A template that references attributes missing from the resource
	/// schema fails with [`TemplateError::Validation`].
	pub fn resolve_template(
		&self,
		resource: &ResourceIdentity,
		output_format: &str,
		request: Option<&RequestContext>,
	) -> Result<Option<CompiledTree>> {
		let request = match request {
			Some(request) if request.output_format().is_some() => Cow::Borrowed(request),
			Some(request) => Cow::Owned(request.clone().with_output_format(output_format)),
			None => Cow::Owned(RequestContext::new().with_output_format(output_format)),
		};

		let template = match self.rules.select_template(resource, &request, self.evaluator.as_ref())? {
			Some(identifier) => identifier,
			None => match TemplateIdentifier::from_output_format(output_format, Some(&*request)) {
				Some(format) => format.file_name().to_string(),
				None => {
					debug!(resource = %resource, output_format, "no template rule and no default for output format");
					return Ok(None);
				}
			},
		};

		let key = CacheKey::new(resource.clone(), template.as_str());
		let handle = match self.cache.get(&key) {
			Some(handle) => handle,
			None => {
				let Some(path) = self.template_path(resource, &template)? else {
					debug!(resource = %resource, template = %template, "template scope no longer exists");
					return Ok(None);
				};
				self.cache.resolve(&key, || self.load(resource, &template, path))?
			}
		};

		if handle.check_and_reload()? {
			info!(resource = %resource, template = %template, path = %handle.path().display(), "reloaded modified template");
			self.cache.refresh(key, Arc::clone(&handle));
		}

		let Some(tree) = handle.current() else {
			return Ok(None);
		};
		self.validate(resource, &template, &tree)?;
		Ok(Some(tree))
	}

	/// Path of a template given a descriptor identifier or a plain file name.
	fn template_path(&self, resource: &ResourceIdentity, template: &str) -> Result<Option<PathBuf>> {
		Ok(match self.store.find_by_id(template)? {
			Some(descriptor) => self.locator.locate_descriptor(&descriptor),
			None => self.locator.locate_with_fallback(resource, template),
		})
	}

	fn load(&self, resource: &ResourceIdentity, template: &str, path: PathBuf) -> Result<Arc<TemplateHandle>> {
		let compiler = Arc::clone(&self.compiler);
		let parse: ParseFn<CompiledTree> = Arc::new(move |path: &Path, bytes: &[u8]| {
			compiler.compile(path, bytes).map_err(|message| TemplateError::Compile {
				path: path.to_path_buf(),
				message,
			})
		});
		let handle = Watched::new(path, self.watch_interval, parse);
		handle.load()?;
		info!(
			resource = %resource,
			template,
			path = %handle.path().display(),
			found = handle.current().is_some(),
			"loaded template"
		);
		Ok(Arc::new(handle))
	}

	fn validate(&self, resource: &ResourceIdentity, template: &str, tree: &CompiledTree) -> Result<()> {
		let Some(schema) = self.catalog.schema(resource) else {
			return Ok(());
		};
		let known = |attribute: &str| {
			let root = local_name(attribute.split('/').next().unwrap_or(attribute));
			schema.iter().any(|a| local_name(a) == root)
		};
		match tree.referenced_attributes().into_iter().find(|a| !known(a)) {
			Some(attribute) => Err(TemplateError::Validation {
				resource: resource.to_string(),
				template: template.to_string(),
				attribute,
			}),
			None => Ok(()),
		}
	}
}

/// Strips a namespace prefix: `gml:name` becomes `name`.
fn local_name(step: &str) -> &str {
	step.rsplit_once(':').map_or(step, |(_, local)| local)
}

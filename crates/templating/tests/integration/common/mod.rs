//! Shared fixtures for templating integration tests.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use geotmpl_request::CqlEvaluator;
use geotmpl_templating::{
	CompiledTemplate, CompiledTree, EngineConfig, InMemoryCatalog, ResourceIdentity, TemplateCompiler, TemplateEngine,
};

/// Compiled form produced by [`FakeCompiler`]: the raw text and its `${attr}` references.
#[derive(Debug)]
pub struct TextTree {
	pub body: String,
	pub attributes: Vec<String>,
}

impl CompiledTemplate for TextTree {
	fn referenced_attributes(&self) -> Vec<String> {
		self.attributes.clone()
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

/// Compiler that fails on any template containing `broken` and counts its runs.
#[derive(Default)]
pub struct FakeCompiler {
	pub runs: AtomicUsize,
}

impl FakeCompiler {
	pub fn runs(&self) -> usize {
		self.runs.load(Ordering::SeqCst)
	}
}

impl TemplateCompiler for FakeCompiler {
	fn compile(&self, _path: &Path, bytes: &[u8]) -> Result<CompiledTree, String> {
		self.runs.fetch_add(1, Ordering::SeqCst);
		let body = String::from_utf8_lossy(bytes).into_owned();
		if body.contains("broken") {
			return Err("unexpected end of template".to_string());
		}
		let attributes = body
			.split("${")
			.skip(1)
			.filter_map(|rest| rest.split_once('}').map(|(attr, _)| attr.to_string()))
			.collect();
		Ok(Arc::new(TextTree { body, attributes }))
	}
}

/// Body of a compiled tree built by [`FakeCompiler`].
pub fn body(tree: &CompiledTree) -> &str {
	&tree.as_any().downcast_ref::<TextTree>().expect("tree from FakeCompiler").body
}

pub fn states() -> ResourceIdentity {
	ResourceIdentity::new("topp", "states")
}

pub struct Fixture {
	pub dir: tempfile::TempDir,
	pub catalog: Arc<InMemoryCatalog>,
	pub compiler: Arc<FakeCompiler>,
	pub engine: TemplateEngine,
}

impl Fixture {
	pub fn new() -> Self {
		let _ = tracing_subscriber::fmt::try_init();
		let dir = tempfile::tempdir().expect("temp dir");
		let catalog = Arc::new(InMemoryCatalog::new());
		catalog.add_resource(states(), ["STATE_NAME", "PERSONS", "the_geom"]);
		catalog.add_resource(ResourceIdentity::new("topp", "roads"), ["NAME"]);
		let compiler = Arc::new(FakeCompiler::default());
		let engine = open_engine(dir.path(), &catalog, &compiler);
		Self {
			dir,
			catalog,
			compiler,
			engine,
		}
	}

	/// Reopens the engine over the same data directory.
	pub fn reopen(&mut self) {
		self.engine = open_engine(self.dir.path(), &self.catalog, &self.compiler);
	}

	pub fn templates(&self) -> PathBuf {
		self.dir.path().join("templates")
	}

	/// Writes a template file relative to the templates directory.
	pub fn write(&self, relative: &str, content: &str) -> PathBuf {
		let path = self.templates().join(relative);
		std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
		std::fs::write(&path, content).expect("write template");
		path
	}

	/// Body of the template resolved for `states` in `format`.
	pub fn resolve_body(&self, resource: &ResourceIdentity, format: &str) -> Option<String> {
		self.engine
			.resolve_template(resource, format, None)
			.expect("resolution succeeds")
			.map(|tree| body(&tree).to_string())
	}
}

fn open_engine(dir: &Path, catalog: &Arc<InMemoryCatalog>, compiler: &Arc<FakeCompiler>) -> TemplateEngine {
	TemplateEngine::open(
		EngineConfig::new(dir),
		catalog.clone(),
		compiler.clone(),
		Arc::new(CqlEvaluator::default()),
	)
	.expect("engine opens")
}

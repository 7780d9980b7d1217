use std::sync::{Arc, Barrier};
use std::thread;

use geotmpl_request::RequestContext;
use geotmpl_templating::{OutputFormatFamily, TemplateDescriptor, TemplateError, TemplateRule};

use crate::common::{Fixture, body, states};

const STATES_DIR: &str = "workspaces/topp/featuretypes/states";

#[test]
fn default_templates_resolve_through_directory_levels() {
	let fx = Fixture::new();
	fx.write(&format!("{STATES_DIR}/html-template.xhtml"), "<p>${STATE_NAME}</p>");
	fx.write("workspaces/topp/geojson-template.json", "{\"name\": \"${STATE_NAME}\"}");
	fx.write("gml32-template.xml", "<gml:name>${STATE_NAME}</gml:name>");

	assert_eq!(fx.resolve_body(&states(), "text/html").as_deref(), Some("<p>${STATE_NAME}</p>"));
	assert_eq!(
		fx.resolve_body(&states(), "application/geo+json").as_deref(),
		Some("{\"name\": \"${STATE_NAME}\"}")
	);
	// plain JSON shares the GeoJSON default
	assert_eq!(
		fx.resolve_body(&states(), "application/json").as_deref(),
		Some("{\"name\": \"${STATE_NAME}\"}")
	);
	assert_eq!(
		fx.resolve_body(&states(), "application/gml+xml; version=3.2").as_deref(),
		Some("<gml:name>${STATE_NAME}</gml:name>")
	);
	assert_eq!(fx.resolve_body(&states(), "GML2"), None);
	assert_eq!(fx.resolve_body(&states(), "image/png"), None);
}

#[test]
fn format_parameter_selects_rule_or_default_gml() {
	let fx = Fixture::new();
	let service = fx.engine.service();
	let html = service.save_or_update(TemplateDescriptor::new("T_html", "xhtml"), b"T_html").unwrap();
	let geojson = service.save_or_update(TemplateDescriptor::new("T_geojson", "json"), b"T_geojson").unwrap();
	let rules = fx.engine.rules();
	rules
		.insert(&states(), TemplateRule::new(&html).with_priority(0).with_output_format(OutputFormatFamily::Html))
		.unwrap();
	rules
		.insert(&states(), TemplateRule::new(&geojson).with_priority(1).with_output_format(OutputFormatFamily::GeoJson))
		.unwrap();
	fx.write("gml32-template.xml", "default gml32");
	fx.write("gml31-template.xml", "default gml31");
	fx.write("gml2-template.xml", "default gml2");

	let resolve = |f: &str| {
		let request = RequestContext::new().with_param("f", f);
		fx.engine
			.resolve_template(&states(), f, Some(&request))
			.unwrap()
			.map(|tree| body(&tree).to_string())
	};
	assert_eq!(resolve("html").as_deref(), Some("T_html"));
	assert_eq!(resolve("json").as_deref(), Some("T_geojson"));
	assert_eq!(resolve("xml").as_deref(), Some("default gml32"));
}

#[test]
fn template_created_later_is_picked_up() {
	let fx = Fixture::new();
	assert_eq!(fx.resolve_body(&states(), "GML2"), None);

	fx.write(&format!("{STATES_DIR}/gml2-template.xml"), "<gml2/>");
	assert_eq!(fx.resolve_body(&states(), "GML2").as_deref(), Some("<gml2/>"));
}

#[test]
fn get_feature_info_text_xml_uses_gml2_default() {
	let fx = Fixture::new();
	fx.write("gml2-template.xml", "<gfi/>");
	let request = RequestContext::new()
		.with_service("WMS")
		.with_operation("GetFeatureInfo")
		.with_param("INFO_FORMAT", "text/xml");
	let tree = fx
		.engine
		.resolve_template(&states(), "text/xml", Some(&request))
		.unwrap()
		.unwrap();
	assert_eq!(body(&tree), "<gfi/>");
}

#[test]
fn modified_template_is_reloaded() {
	let fx = Fixture::new();
	fx.write("workspaces/topp/geojson-template.json", "v1");
	assert_eq!(fx.resolve_body(&states(), "application/geo+json").as_deref(), Some("v1"));

	fx.write("workspaces/topp/geojson-template.json", "version two");
	assert_eq!(fx.resolve_body(&states(), "application/geo+json").as_deref(), Some("version two"));
	assert_eq!(fx.compiler.runs(), 2);
	// unchanged file is served from the cache without recompiling
	fx.resolve_body(&states(), "application/geo+json");
	assert_eq!(fx.compiler.runs(), 2);
}

#[test]
fn failed_reload_is_reported_until_fixed() {
	let fx = Fixture::new();
	fx.write("geojson-template.json", "ok");
	assert_eq!(fx.resolve_body(&states(), "application/geo+json").as_deref(), Some("ok"));

	fx.write("geojson-template.json", "broken {");
	for _ in 0..2 {
		assert!(matches!(
			fx.engine.resolve_template(&states(), "application/geo+json", None),
			Err(TemplateError::Compile { .. })
		));
	}

	fx.write("geojson-template.json", "fixed again");
	assert_eq!(fx.resolve_body(&states(), "application/geo+json").as_deref(), Some("fixed again"));
}

#[test]
fn unknown_attributes_fail_validation() {
	let fx = Fixture::new();
	fx.write(&format!("{STATES_DIR}/html-template.xhtml"), "${topp:STATE_NAME} ${the_geom/coordinates} ${MISSING}");

	match fx.engine.resolve_template(&states(), "text/html", None) {
		Err(TemplateError::Validation {
			resource, attribute, ..
		}) => {
			assert_eq!(resource, "topp:states");
			assert_eq!(attribute, "MISSING");
		}
		other => panic!("expected validation failure, got {other:?}"),
	}
}

#[test]
fn rules_select_templates_by_request() {
	let fx = Fixture::new();
	fx.write("html-template.xhtml", "default page");
	let special = fx
		.engine
		.service()
		.save_or_update(TemplateDescriptor::new("special", "xhtml"), b"special page")
		.unwrap();
	fx.engine
		.rules()
		.insert(
			&states(),
			TemplateRule::new(&special)
				.with_output_format(OutputFormatFamily::Html)
				.with_cql_filter("requestParam('myParam') = 'yes'"),
		)
		.unwrap();

	let with_param = RequestContext::new().with_param("myParam", "yes");
	let tree = fx
		.engine
		.resolve_template(&states(), "text/html", Some(&with_param))
		.unwrap()
		.unwrap();
	assert_eq!(body(&tree), "special page");

	let without = RequestContext::new().with_param("myParam", "no");
	let tree = fx
		.engine
		.resolve_template(&states(), "text/html", Some(&without))
		.unwrap()
		.unwrap();
	assert_eq!(body(&tree), "default page");
}

#[test]
fn concurrent_requests_compile_once() {
	let fx = Arc::new(Fixture::new());
	fx.write(&format!("{STATES_DIR}/html-template.xhtml"), "<p>shared</p>");
	let barrier = Arc::new(Barrier::new(16));

	let workers: Vec<_> = (0..16)
		.map(|_| {
			let fx = Arc::clone(&fx);
			let barrier = Arc::clone(&barrier);
			thread::spawn(move || {
				barrier.wait();
				fx.resolve_body(&states(), "text/html")
			})
		})
		.collect();
	for worker in workers {
		assert_eq!(worker.join().unwrap().as_deref(), Some("<p>shared</p>"));
	}
	assert_eq!(fx.compiler.runs(), 1);
}

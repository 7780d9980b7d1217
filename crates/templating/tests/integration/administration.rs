use geotmpl_request::RequestContext;
use geotmpl_templating::{
	CatalogEvent, OutputFormatFamily, ResourceIdentity, Scope, TemplateDescriptor, TemplateError, TemplateRule,
};
use pretty_assertions::assert_eq;

use crate::common::{Fixture, states};

fn html_rule(descriptor: &TemplateDescriptor) -> TemplateRule {
	TemplateRule::new(descriptor).with_output_format(OutputFormatFamily::Html)
}

#[test]
fn deleting_a_template_drops_its_rules_and_cache_entries() {
	let fx = Fixture::new();
	fx.write("workspaces/topp/html-template.xhtml", "workspace default");
	let custom = fx
		.engine
		.service()
		.save_or_update(
			TemplateDescriptor::new("states-page", "xhtml").with_scope(&Scope::of_resource(&states())),
			b"custom page",
		)
		.unwrap();
	fx.engine.rules().insert(&states(), html_rule(&custom)).unwrap();
	let gml_only = TemplateRule::for_template("other", "other")
		.with_priority(5)
		.with_output_format(OutputFormatFamily::Gml);
	fx.engine.rules().insert(&states(), gml_only).unwrap();

	assert_eq!(fx.resolve_body(&states(), "text/html").as_deref(), Some("custom page"));
	assert_eq!(fx.engine.cache().len(), 1);

	fx.engine.service().delete(&custom).unwrap();

	let remaining = fx.engine.rules().rules(&states());
	assert_eq!(remaining.rules().len(), 1);
	assert_eq!(remaining.rules()[0].template_identifier(), "other");
	assert_eq!(fx.engine.cache().len(), 0);
	assert!(!fx.templates().join("workspaces/topp/featuretypes/states/states-page.xhtml").exists());
	assert_eq!(fx.resolve_body(&states(), "text/html").as_deref(), Some("workspace default"));
}

#[test]
fn updating_a_template_invalidates_and_moves_its_file() {
	let fx = Fixture::new();
	let service = fx.engine.service();
	let saved = service.save_or_update(TemplateDescriptor::new("page", "xhtml"), b"first").unwrap();
	fx.engine.rules().insert(&states(), html_rule(&saved)).unwrap();
	assert_eq!(fx.resolve_body(&states(), "text/html").as_deref(), Some("first"));

	let moved = saved.clone().with_scope(&Scope::Workspace("topp".into()));
	service.save_or_update(moved.clone(), b"second").unwrap();

	assert!(!fx.templates().join("page.xhtml").exists());
	assert!(fx.templates().join("workspaces/topp/page.xhtml").is_file());
	assert_eq!(fx.engine.rules().rules(&states()).rules()[0].template_name(), "topp:page");
	assert_eq!(fx.resolve_body(&states(), "text/html").as_deref(), Some("second"));
	assert_eq!(service.content(&moved).unwrap(), b"second");
	assert_eq!(service.list(&Scope::Workspace("topp".into())).unwrap(), vec![moved.clone()]);
	assert_eq!(service.get("topp:page").unwrap(), moved);
}

#[test]
fn duplicate_and_missing_templates_are_rejected() {
	let fx = Fixture::new();
	let service = fx.engine.service();
	service.save_or_update(TemplateDescriptor::new("page", "xhtml"), b"a").unwrap();
	assert!(matches!(
		service.save_or_update(TemplateDescriptor::new("page", "json"), b"b"),
		Err(TemplateError::Duplicate(_))
	));
	assert!(matches!(service.get("nope"), Err(TemplateError::NotFound(_))));

	let unknown_scope = TemplateDescriptor::new("t", "json").with_scope(&Scope::Workspace("gone".into()));
	assert!(matches!(
		service.save_or_update(unknown_scope, b"{}"),
		Err(TemplateError::NotFound(_))
	));
}

#[test]
fn renamed_feature_type_keeps_its_templates_and_rules() {
	let fx = Fixture::new();
	let custom = fx
		.engine
		.service()
		.save_or_update(
			TemplateDescriptor::new("states-page", "xhtml").with_scope(&Scope::of_resource(&states())),
			b"custom page",
		)
		.unwrap();
	fx.engine.rules().insert(&states(), html_rule(&custom)).unwrap();
	assert!(fx.resolve_body(&states(), "text/html").is_some());

	let usa = states().with_name("usa");
	fx.catalog.rename_resource(&states(), &usa);
	fx.engine
		.handle_catalog_event(&CatalogEvent::FeatureTypeRenamed {
			from: states(),
			to: usa.clone(),
		})
		.unwrap();

	let moved = fx.engine.store().find_by_id(custom.identifier()).unwrap().unwrap();
	assert_eq!(moved.full_name(), "topp:usa:states-page");
	assert!(fx.engine.rules().rules(&states()).is_empty());
	assert_eq!(fx.engine.rules().rules(&usa).rules()[0].template_name(), "topp:usa:states-page");
	assert!(fx.templates().join("workspaces/topp/featuretypes/usa/states-page.xhtml").is_file());
	assert_eq!(fx.resolve_body(&usa, "text/html").as_deref(), Some("custom page"));
}

#[test]
fn renamed_workspace_moves_every_scope_below_it() {
	let fx = Fixture::new();
	let service = fx.engine.service();
	let ws = service
		.save_or_update(TemplateDescriptor::new("ws-page", "xhtml").with_scope(&Scope::Workspace("topp".into())), b"ws")
		.unwrap();
	let ft = service
		.save_or_update(TemplateDescriptor::new("ft-page", "xhtml").with_scope(&Scope::of_resource(&states())), b"ft")
		.unwrap();
	fx.engine.rules().insert(&states(), html_rule(&ft)).unwrap();

	fx.catalog.rename_workspace("topp", "usa");
	fx.engine
		.handle_catalog_event(&CatalogEvent::WorkspaceRenamed {
			from: "topp".into(),
			to: "usa".into(),
		})
		.unwrap();

	let store = fx.engine.store();
	assert_eq!(store.find_by_id(ws.identifier()).unwrap().unwrap().full_name(), "usa:ws-page");
	assert_eq!(store.find_by_id(ft.identifier()).unwrap().unwrap().full_name(), "usa:states:ft-page");
	let usa_states = ResourceIdentity::new("usa", "states");
	assert_eq!(fx.resolve_body(&usa_states, "text/html").as_deref(), Some("ft"));
}

#[test]
fn removed_workspace_forgets_templates_and_rules() {
	let fx = Fixture::new();
	let ft = fx
		.engine
		.service()
		.save_or_update(TemplateDescriptor::new("ft-page", "xhtml").with_scope(&Scope::of_resource(&states())), b"ft")
		.unwrap();
	let global = fx
		.engine
		.service()
		.save_or_update(TemplateDescriptor::new("global", "json"), b"{}")
		.unwrap();
	fx.engine.rules().insert(&states(), html_rule(&ft)).unwrap();

	fx.catalog.remove_workspace("topp");
	fx.engine
		.handle_catalog_event(&CatalogEvent::WorkspaceRemoved("topp".into()))
		.unwrap();

	assert_eq!(fx.engine.store().find_all().unwrap(), vec![global]);
	assert!(fx.engine.rules().resources().is_empty());
	assert!(!fx.templates().join("workspaces/topp").exists());
}

#[test]
fn removed_feature_type_forgets_only_its_own_templates() {
	let fx = Fixture::new();
	let service = fx.engine.service();
	service
		.save_or_update(TemplateDescriptor::new("ft-page", "xhtml").with_scope(&Scope::of_resource(&states())), b"ft")
		.unwrap();
	let ws = service
		.save_or_update(TemplateDescriptor::new("ws-page", "xhtml").with_scope(&Scope::Workspace("topp".into())), b"ws")
		.unwrap();
	let roads = ResourceIdentity::new("topp", "roads");
	fx.engine.rules().insert(&roads, html_rule(&ws)).unwrap();

	fx.catalog.remove_resource(&states());
	fx.engine
		.handle_catalog_event(&CatalogEvent::FeatureTypeRemoved(states()))
		.unwrap();

	assert_eq!(fx.engine.store().find_all().unwrap(), vec![ws]);
	assert_eq!(fx.engine.rules().resources(), vec![roads]);
}

#[test]
fn state_survives_reopening() {
	let mut fx = Fixture::new();
	let saved = fx
		.engine
		.service()
		.save_or_update(TemplateDescriptor::new("page", "xhtml"), b"persisted page")
		.unwrap();
	let rule = html_rule(&saved).with_priority(3).with_service("WFS");
	fx.engine.rules().insert(&states(), rule.clone()).unwrap();

	fx.reopen();

	assert_eq!(fx.engine.store().find_all().unwrap(), vec![saved]);
	assert_eq!(fx.engine.rules().rules(&states()).rules(), &[rule]);
	let request = RequestContext::new().with_service("wfs");
	let tree = fx
		.engine
		.resolve_template(&states(), "text/html", Some(&request))
		.unwrap()
		.unwrap();
	assert_eq!(crate::common::body(&tree), "persisted page");
}

#[test]
fn unstorable_template_name_leaves_engine_reopenable() {
	let mut fx = Fixture::new();
	let service = fx.engine.service();
	let kept = service.save_or_update(TemplateDescriptor::new("kept", "json"), b"{}").unwrap();
	assert!(matches!(
		service.save_or_update(TemplateDescriptor::new("a;b", "json"), b"{}"),
		Err(TemplateError::InvalidName { .. })
	));
	assert!(!fx.templates().join("a;b.json").exists());

	fx.reopen();
	assert_eq!(fx.engine.store().find_all().unwrap(), vec![kept]);
}

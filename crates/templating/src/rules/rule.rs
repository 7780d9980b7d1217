use geotmpl_request::{PredicateEvaluator, RequestContext};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::format::{OutputFormatFamily, TemplateIdentifier};
use crate::store::TemplateDescriptor;

/// Selects a template for requests matching all of its predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRule {
	rule_id: String,
	#[serde(default)]
	priority: u32,
	template_identifier: String,
	template_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	output_format: Option<OutputFormatFamily>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	cql_filter: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	service: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	profile_filter: Option<String>,
	#[serde(default)]
	force_rule: bool,
}

impl TemplateRule {
	/// New unconditional rule selecting `template`, with a fresh rule id.
	pub fn new(template: &TemplateDescriptor) -> Self {
		Self::for_template(template.identifier(), template.full_name())
	}

	/// New rule selecting a template by identifier and display name.
	pub fn for_template(identifier: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			rule_id: Uuid::new_v4().to_string(),
			priority: 0,
			template_identifier: identifier.into(),
			template_name: name.into(),
			output_format: None,
			cql_filter: None,
			service: None,
			profile_filter: None,
			force_rule: false,
		}
	}

	pub fn with_priority(mut self, priority: u32) -> Self {
		self.priority = priority;
		self
	}

	pub fn with_output_format(mut self, family: OutputFormatFamily) -> Self {
		self.output_format = Some(family);
		self
	}

	pub fn with_cql_filter(mut self, filter: impl Into<String>) -> Self {
		self.cql_filter = Some(filter.into());
		self
	}

	pub fn with_service(mut self, service: impl Into<String>) -> Self {
		self.service = Some(service.into());
		self
	}

	pub fn with_profile_filter(mut self, filter: impl Into<String>) -> Self {
		self.profile_filter = Some(filter.into());
		self
	}

	/// Marks the rule as outranking every non-forced rule.
	pub fn forced(mut self) -> Self {
		self.force_rule = true;
		self
	}

	pub fn rule_id(&self) -> &str {
		&self.rule_id
	}

	pub fn priority(&self) -> u32 {
		self.priority
	}

	pub fn template_identifier(&self) -> &str {
		&self.template_identifier
	}

	pub fn template_name(&self) -> &str {
		&self.template_name
	}

	pub fn output_format(&self) -> Option<OutputFormatFamily> {
		self.output_format
	}

	pub fn cql_filter(&self) -> Option<&str> {
		self.cql_filter.as_deref()
	}

	pub fn service(&self) -> Option<&str> {
		self.service.as_deref()
	}

	pub fn profile_filter(&self) -> Option<&str> {
		self.profile_filter.as_deref()
	}

	pub fn is_forced(&self) -> bool {
		self.force_rule
	}

	pub(crate) fn set_priority(&mut self, priority: u32) {
		self.priority = priority;
	}

	pub(crate) fn set_template_name(&mut self, name: impl Into<String>) {
		self.template_name = name.into();
	}

	/// Whether the rule matches `request`.
	///
	/// `format` is the identifier of the request's effective output format;
	/// a rule with a format predicate never matches a format without one.
	/// Predicates are checked cheapest first and stop at the first miss.
	pub fn applies(
		&self,
		format: Option<TemplateIdentifier>,
		request: &RequestContext,
		evaluator: &dyn PredicateEvaluator,
	) -> Result<bool> {
		if let Some(family) = self.output_format
			&& !format.is_some_and(|id| family.matches(id))
		{
			return Ok(false);
		}
		if let Some(service) = &self.service
			&& !request.service().is_some_and(|s| s.eq_ignore_ascii_case(service))
		{
			return Ok(false);
		}
		for filter in [&self.cql_filter, &self.profile_filter].into_iter().flatten() {
			if !evaluator.evaluate(filter, request)? {
				return Ok(false);
			}
		}
		Ok(true)
	}
}

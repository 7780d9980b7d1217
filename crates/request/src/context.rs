//! The request context template rules are evaluated against.

use std::collections::HashMap;

/// Query parameter carrying the output format in OGC API style requests.
pub const FORMAT_PARAM: &str = "f";
/// Query parameter carrying the output format of WMS `GetFeatureInfo`.
pub const INFO_FORMAT_PARAM: &str = "INFO_FORMAT";

/// Snapshot of an incoming OGC request.
///
/// KVP parameter and header names are matched case-insensitively, values are
/// kept as sent.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
	output_format: Option<String>,
	service: Option<String>,
	operation: Option<String>,
	url: Option<String>,
	params: HashMap<String, String>,
	headers: HashMap<String, String>,
}

impl RequestContext {
	/// Creates an empty context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the explicit output format parameter of the request.
	pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
		self.output_format = Some(format.into());
		self
	}

	/// Sets the OGC service name (`WFS`, `WMS`, ...).
	pub fn with_service(mut self, service: impl Into<String>) -> Self {
		self.service = Some(service.into());
		self
	}

	/// Sets the OGC operation name (`GetFeature`, `GetFeatureInfo`, ...).
	pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
		self.operation = Some(operation.into());
		self
	}

	/// Sets the full request URL.
	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self
	}

	/// Adds a KVP query parameter.
	pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
		self.params.insert(name.to_ascii_uppercase(), value.into());
		self
	}

	/// Adds a request header.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());
		self
	}

	/// Explicit output format, if the request carried one.
	pub fn output_format(&self) -> Option<&str> {
		self.output_format.as_deref()
	}

	/// OGC service name.
	pub fn service(&self) -> Option<&str> {
		self.service.as_deref()
	}

	/// OGC operation name.
	pub fn operation(&self) -> Option<&str> {
		self.operation.as_deref()
	}

	/// Full request URL.
	pub fn url(&self) -> Option<&str> {
		self.url.as_deref()
	}

	/// Looks up a KVP parameter by case-insensitive name.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(&name.to_ascii_uppercase()).map(String::as_str)
	}

	/// Looks up a header by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Output format the request effectively asks for.
	///
	/// Precedence: explicit format, then the `f` parameter, then `INFO_FORMAT`.
	pub fn effective_output_format(&self) -> Option<&str> {
		self.output_format()
			.or_else(|| self.param(FORMAT_PARAM))
			.or_else(|| self.param(INFO_FORMAT_PARAM))
	}

	/// Whether the request is a WMS `GetFeatureInfo`.
	pub fn is_get_feature_info(&self) -> bool {
		self.operation()
			.is_some_and(|op| op.eq_ignore_ascii_case("GetFeatureInfo"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn effective_format_prefers_explicit_then_f_then_info_format() {
		let ctx = RequestContext::new()
			.with_param("INFO_FORMAT", "text/html")
			.with_param("f", "application/json");
		assert_eq!(ctx.effective_output_format(), Some("application/json"));

		let ctx = ctx.with_output_format("gml3");
		assert_eq!(ctx.effective_output_format(), Some("gml3"));

		let ctx = RequestContext::new().with_param("info_format", "text/html");
		assert_eq!(ctx.effective_output_format(), Some("text/html"));

		assert_eq!(RequestContext::new().effective_output_format(), None);
	}

	#[test]
	fn names_are_case_insensitive() {
		let ctx = RequestContext::new()
			.with_param("myParam", "1")
			.with_header("Accept-Profile", "http://example.org/p");
		assert_eq!(ctx.param("MYPARAM"), Some("1"));
		assert_eq!(ctx.header("accept-profile"), Some("http://example.org/p"));
		assert!(ctx.param("other").is_none());
	}

	#[test]
	fn detects_get_feature_info() {
		assert!(RequestContext::new().with_operation("getfeatureinfo").is_get_feature_info());
		assert!(!RequestContext::new().with_operation("GetFeature").is_get_feature_info());
		assert!(!RequestContext::new().is_get_feature_info());
	}
}

//! Output format families and the default template of each request format.
//!
//! [`TemplateIdentifier`] names the concrete formats a request can ask for;
//! [`OutputFormatFamily`] is the coarser predicate a template rule carries.

use std::fmt;

use geotmpl_request::RequestContext;
use serde::{Deserialize, Serialize};

/// Concrete output formats that can be served through a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateIdentifier {
	Json,
	GeoJson,
	JsonLd,
	Gml32,
	Gml31,
	Gml2,
	Html,
}

const GML32_ALIASES: &[&str] = &["gml32", "application/gml+xml;version=3.2", "text/xml;subtype=gml/3.2"];
const GML31_ALIASES: &[&str] = &["gml3", "text/xml;subtype=gml/3.1.1", "application/vnd.ogc.gml/3.1.1"];
const GML2_ALIASES: &[&str] = &["gml2", "text/xml;subtype=gml/2.1.2", "application/vnd.ogc.gml"];
const GENERIC_XML: &[&str] = &["xml", "text/xml", "application/xml"];

impl TemplateIdentifier {
	/// All identifiers, in matching order.
	pub const ALL: [TemplateIdentifier; 7] = [
		TemplateIdentifier::Json,
		TemplateIdentifier::GeoJson,
		TemplateIdentifier::JsonLd,
		TemplateIdentifier::Gml32,
		TemplateIdentifier::Gml31,
		TemplateIdentifier::Gml2,
		TemplateIdentifier::Html,
	];

	/// Canonical output format string.
	pub fn output_format(self) -> &'static str {
		match self {
			TemplateIdentifier::Json => "application/json",
			TemplateIdentifier::GeoJson => "application/geo+json",
			TemplateIdentifier::JsonLd => "application/ld+json",
			TemplateIdentifier::Gml32 => "application/gml+xml;version=3.2",
			TemplateIdentifier::Gml31 => "gml3",
			TemplateIdentifier::Gml2 => "GML2",
			TemplateIdentifier::Html => "text/html",
		}
	}

	/// File name of the format's default template.
	pub fn file_name(self) -> &'static str {
		match self {
			TemplateIdentifier::Json | TemplateIdentifier::GeoJson => "geojson-template.json",
			TemplateIdentifier::JsonLd => "json-ld-template.json",
			TemplateIdentifier::Gml32 => "gml32-template.xml",
			TemplateIdentifier::Gml31 => "gml31-template.xml",
			TemplateIdentifier::Gml2 => "gml2-template.xml",
			TemplateIdentifier::Html => "html-template.xhtml",
		}
	}

	/// Symbolic name used for rule matching.
	pub fn symbol(self) -> &'static str {
		match self {
			TemplateIdentifier::Json => "JSON",
			TemplateIdentifier::GeoJson => "GEOJSON",
			TemplateIdentifier::JsonLd => "JSONLD",
			TemplateIdentifier::Gml32 => "GML32",
			TemplateIdentifier::Gml31 => "GML31",
			TemplateIdentifier::Gml2 => "GML2",
			TemplateIdentifier::Html => "HTML",
		}
	}

	/// Maps a requested output format to an identifier.
	///
	/// Whitespace is ignored and matching is case-insensitive. A WMS
	/// `GetFeatureInfo` asking for `text/xml` is served as GML 2; any other
	/// request for plain XML (`xml`, `text/xml`, `application/xml`) gets GML 3.2.
	pub fn from_output_format(format: &str, request: Option<&RequestContext>) -> Option<Self> {
		let format: String = format.chars().filter(|c| !c.is_whitespace()).collect();
		let is = |candidate: &str| format.eq_ignore_ascii_case(candidate);
		let any = |aliases: &[&str]| aliases.iter().any(|alias| is(alias.trim()));

		if is("application/json") || is("json") {
			Some(Self::Json)
		} else if is("application/geo+json") || is("geojson") {
			Some(Self::GeoJson)
		} else if is("application/ld+json") || is("jsonld") {
			Some(Self::JsonLd)
		} else if any(GML32_ALIASES) {
			Some(Self::Gml32)
		} else if any(GML31_ALIASES) {
			Some(Self::Gml31)
		} else if any(GML2_ALIASES) || (is("text/xml") && request.is_some_and(RequestContext::is_get_feature_info)) {
			Some(Self::Gml2)
		} else if any(GENERIC_XML) {
			Some(Self::Gml32)
		} else if is("text/html") || is("html") {
			Some(Self::Html)
		} else {
			None
		}
	}
}

impl fmt::Display for TemplateIdentifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.symbol())
	}
}

/// Output format predicate of a template rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormatFamily {
	Gml,
	GeoJson,
	JsonLd,
	Html,
}

impl OutputFormatFamily {
	/// Whether a request for `identifier` satisfies this family.
	pub fn matches(self, identifier: TemplateIdentifier) -> bool {
		match self {
			OutputFormatFamily::Gml => identifier.symbol().starts_with("GML"),
			OutputFormatFamily::GeoJson => {
				matches!(identifier, TemplateIdentifier::Json | TemplateIdentifier::GeoJson)
			}
			OutputFormatFamily::Html => identifier == TemplateIdentifier::Html,
			OutputFormatFamily::JsonLd => identifier == TemplateIdentifier::JsonLd,
		}
	}

	/// Display name used by administrative listings.
	pub fn label(self) -> &'static str {
		match self {
			OutputFormatFamily::Gml => "GML",
			OutputFormatFamily::GeoJson => "GeoJSON",
			OutputFormatFamily::JsonLd => "JSON-LD",
			OutputFormatFamily::Html => "HTML",
		}
	}
}

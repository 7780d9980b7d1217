use std::cmp::Ordering;

use geotmpl_request::{PredicateEvaluator, RequestContext};

use super::TemplateRule;
use crate::error::Result;
use crate::format::TemplateIdentifier;

/// Picks the winning rule for `request` among `rules`.
///
/// Forced rules outrank the others; within the same class lower priority
/// wins and the lowest rule id breaks what is left. Rules are tried in that
/// order, so predicates of lower ranked rules are never evaluated once a
/// match is found. Evaluation errors abort the selection.
pub fn select<'a>(
	rules: &'a [TemplateRule],
	request: &RequestContext,
	evaluator: &dyn PredicateEvaluator,
) -> Result<Option<&'a TemplateRule>> {
	let format = request
		.effective_output_format()
		.and_then(|format| TemplateIdentifier::from_output_format(format, Some(request)));

	let mut ordered: Vec<&TemplateRule> = rules.iter().collect();
	ordered.sort_by(|a, b| rank(a, b));
	for rule in ordered {
		if rule.applies(format, request, evaluator)? {
			return Ok(Some(rule));
		}
	}
	Ok(None)
}

fn rank(a: &TemplateRule, b: &TemplateRule) -> Ordering {
	b.is_forced()
		.cmp(&a.is_forced())
		.then(a.priority().cmp(&b.priority()))
		.then_with(|| a.rule_id().cmp(b.rule_id()))
}

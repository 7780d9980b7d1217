//! Priority bookkeeping of a resource's rule list.
//!
//! Priorities within one resource are unique. Inserting at an occupied
//! priority shifts the occupant up by one, which may in turn collide with
//! the next rule, and so on until a gap absorbs the shift. Gaps are never
//! compacted.

use crate::error::{Result, TemplateError};

use super::TemplateRule;

/// Inserts `rule` at its requested priority. The list stays sorted.
///
/// Fails with [`TemplateError::PriorityOverflow`] when the shift would push a
/// rule past `u32::MAX`; no priority changes in that case.
pub fn insert(rules: &mut Vec<TemplateRule>, rule: TemplateRule) -> Result<()> {
	rules.sort_by_key(TemplateRule::priority);
	let mut next = rule.priority();
	let mut chain = 0;
	for existing in rules.iter().filter(|r| r.priority() >= rule.priority()) {
		if existing.priority() != next {
			break;
		}
		next = next
			.checked_add(1)
			.ok_or_else(|| TemplateError::PriorityOverflow(existing.rule_id().to_string()))?;
		chain += 1;
	}
	for existing in rules.iter_mut().filter(|r| r.priority() >= rule.priority()).take(chain) {
		existing.set_priority(existing.priority() + 1);
	}
	rules.push(rule);
	rules.sort_by_key(TemplateRule::priority);
	Ok(())
}

/// Replaces the rule with the same id, re-inserting it at its new priority.
pub fn replace(rules: &mut Vec<TemplateRule>, rule: TemplateRule) -> Result<()> {
	remove(rules, rule.rule_id())?;
	insert(rules, rule)
}

/// Removes a rule by id; the other priorities are left as they are.
pub fn remove(rules: &mut Vec<TemplateRule>, rule_id: &str) -> Result<TemplateRule> {
	let index = rules
		.iter()
		.position(|r| r.rule_id() == rule_id)
		.ok_or_else(|| TemplateError::RuleNotFound(rule_id.to_string()))?;
	Ok(rules.remove(index))
}

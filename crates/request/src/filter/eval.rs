use super::parse::compile_pattern;
use super::{CompareOp, Expr, Operand, Value};
use crate::{FilterError, RequestContext, Result};

pub(super) fn eval_condition(expr: &Expr, request: &RequestContext) -> Result<bool> {
	match expr {
		Expr::And(left, right) => Ok(eval_condition(left, request)? && eval_condition(right, request)?),
		Expr::Or(left, right) => Ok(eval_condition(left, request)? || eval_condition(right, request)?),
		Expr::Not(inner) => Ok(!eval_condition(inner, request)?),
		Expr::Compare { left, op, right } => {
			let left = eval_operand(left, request)?;
			let right = eval_operand(right, request)?;
			// comparisons against a missing value never hold
			if left == Value::Null || right == Value::Null {
				return Ok(false);
			}
			let equal = match (&left, &right) {
				(Value::Bool(a), Value::Text(b)) | (Value::Text(b), Value::Bool(a)) => b.eq_ignore_ascii_case(if *a { "true" } else { "false" }),
				_ => left == right,
			};
			Ok(match op {
				CompareOp::Eq => equal,
				CompareOp::NotEq => !equal,
			})
		}
		Expr::Truthy(operand) => match eval_operand(operand, request)? {
			Value::Bool(b) => Ok(b),
			other => Err(FilterError::NotBoolean(format!("{other:?}"))),
		},
	}
}

fn eval_operand(operand: &Operand, request: &RequestContext) -> Result<Value> {
	match operand {
		Operand::Literal(value) => Ok(value.clone()),
		Operand::UrlMatches(pattern) => Ok(url_matches(&pattern.0, request)),
		Operand::Call { name, args } => {
			let args = args
				.iter()
				.map(|arg| eval_operand(arg, request))
				.collect::<Result<Vec<_>>>()?;
			call(name, &args, request)
		}
	}
}

fn url_matches(regex: &regex::Regex, request: &RequestContext) -> Value {
	Value::Bool(request.url().is_some_and(|url| regex.is_match(url)))
}

fn text_or_null(value: Option<&str>) -> Value {
	value.map_or(Value::Null, |v| Value::Text(v.to_string()))
}

fn expect_args(name: &str, args: &[Value], expected: usize) -> Result<()> {
	if args.len() == expected {
		Ok(())
	} else {
		Err(FilterError::Arity {
			function: name.to_string(),
			expected,
			found: args.len(),
		})
	}
}

fn text_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str> {
	match &args[index] {
		Value::Text(s) => Ok(s.as_str()),
		_ => Err(FilterError::InvalidArgument {
			function: name.to_string(),
			index,
		}),
	}
}

fn call(name: &str, args: &[Value], request: &RequestContext) -> Result<Value> {
	match name.to_ascii_lowercase().as_str() {
		"requestparam" => {
			expect_args(name, args, 1)?;
			Ok(text_or_null(request.param(text_arg(name, args, 0)?)))
		}
		"header" => {
			expect_args(name, args, 1)?;
			Ok(text_or_null(request.header(text_arg(name, args, 0)?)))
		}
		"mimetype" => {
			expect_args(name, args, 0)?;
			Ok(text_or_null(request.effective_output_format()))
		}
		"servicename" => {
			expect_args(name, args, 0)?;
			Ok(text_or_null(request.service()))
		}
		"requestname" => {
			expect_args(name, args, 0)?;
			Ok(text_or_null(request.operation()))
		}
		"requestmatchregex" => {
			expect_args(name, args, 1)?;
			let regex = compile_pattern(text_arg(name, args, 0)?)?;
			Ok(url_matches(&regex, request))
		}
		_ => Err(FilterError::UnknownFunction(name.to_string())),
	}
}

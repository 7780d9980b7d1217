//! Reading and writing of Java-style `.properties` documents.
//!
//! Supports comment lines (`#`, `!`), `=`/`:`/whitespace separators, line
//! continuations and the usual backslash escapes including `\uXXXX`. Output
//! escapes non-ASCII characters so files stay readable by Java tooling.

use std::fmt::Write as _;

/// Parses a properties document into `(key, value)` pairs in file order.
pub fn parse(text: &str) -> Vec<(String, String)> {
	let mut entries = Vec::new();
	let mut lines = text.lines();
	while let Some(first) = lines.next() {
		let trimmed = first.trim_start();
		if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
			continue;
		}

		let mut logical = String::from(trimmed);
		while ends_with_continuation(&logical) {
			logical.pop();
			match lines.next() {
				Some(next) => logical.push_str(next.trim_start()),
				None => break,
			}
		}
		entries.push(split_entry(&logical));
	}
	entries
}

/// Serializes entries, optionally preceded by a comment line.
pub fn write<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>, comment: Option<&str>) -> String {
	let mut out = String::new();
	if let Some(comment) = comment {
		for line in comment.lines() {
			let _ = writeln!(out, "#{line}");
		}
	}
	for (key, value) in entries {
		escape_into(&mut out, key, true);
		out.push('=');
		escape_into(&mut out, value, false);
		out.push('\n');
	}
	out
}

fn ends_with_continuation(line: &str) -> bool {
	line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
	let mut key = String::new();
	let mut chars = line.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				if let Some(escaped) = chars.next() {
					unescape_char(escaped, &mut chars, &mut key);
				}
			}
			'=' | ':' => break,
			c if c.is_whitespace() => {
				while chars.peek().is_some_and(|c| c.is_whitespace()) {
					chars.next();
				}
				if chars.peek().is_some_and(|c| *c == '=' || *c == ':') {
					chars.next();
				}
				break;
			}
			c => key.push(c),
		}
	}
	while chars.peek().is_some_and(|c| c.is_whitespace()) {
		chars.next();
	}

	let mut value = String::new();
	while let Some(c) = chars.next() {
		if c == '\\' {
			if let Some(escaped) = chars.next() {
				unescape_char(escaped, &mut chars, &mut value);
			}
		} else {
			value.push(c);
		}
	}
	(key, value)
}

fn unescape_char(escaped: char, chars: &mut impl Iterator<Item = char>, out: &mut String) {
	match escaped {
		't' => out.push('\t'),
		'n' => out.push('\n'),
		'r' => out.push('\r'),
		'f' => out.push('\u{c}'),
		'u' => {
			let hex: String = chars.take(4).collect();
			match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
				Some(c) => out.push(c),
				None => {
					out.push('u');
					out.push_str(&hex);
				}
			}
		}
		other => out.push(other),
	}
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
	for (i, c) in text.chars().enumerate() {
		match c {
			' ' if is_key || i == 0 => out.push_str("\\ "),
			'\\' => out.push_str("\\\\"),
			'\t' => out.push_str("\\t"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\u{c}' => out.push_str("\\f"),
			'=' | ':' | '#' | '!' => {
				out.push('\\');
				out.push(c);
			}
			c if (' '..='~').contains(&c) => out.push(c),
			c => {
				let mut units = [0u16; 2];
				for unit in c.encode_utf16(&mut units) {
					let _ = write!(out, "\\u{unit:04X}");
				}
			}
		}
	}
}

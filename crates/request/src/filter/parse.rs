use regex::Regex;

use super::{CompareOp, Expr, MAX_DEPTH, MAX_TOKENS, Operand, Pattern, Value};
use crate::{FilterError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
	Ident(String),
	Text(String),
	Number(String),
	LParen,
	RParen,
	Comma,
	Eq,
	NotEq,
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>> {
	let bytes = text.as_bytes();
	let mut tokens = Vec::new();
	let mut i = 0;

	while i < bytes.len() {
		let c = bytes[i];
		let start = i;
		match c {
			b' ' | b'\t' | b'\r' | b'\n' => i += 1,
			b'(' => {
				tokens.push((Token::LParen, start));
				i += 1;
			}
			b')' => {
				tokens.push((Token::RParen, start));
				i += 1;
			}
			b',' => {
				tokens.push((Token::Comma, start));
				i += 1;
			}
			b'=' => {
				tokens.push((Token::Eq, start));
				i += 1;
			}
			b'<' if bytes.get(i + 1) == Some(&b'>') => {
				tokens.push((Token::NotEq, start));
				i += 2;
			}
			b'!' if bytes.get(i + 1) == Some(&b'=') => {
				tokens.push((Token::NotEq, start));
				i += 2;
			}
			b'\'' => {
				// '' inside a literal is an escaped quote
				let mut value = String::new();
				i += 1;
				loop {
					let Some(&b) = bytes.get(i) else {
						return Err(FilterError::Syntax {
							offset: start,
							message: "unterminated string literal".into(),
						});
					};
					if b == b'\'' {
						if bytes.get(i + 1) == Some(&b'\'') {
							value.push('\'');
							i += 2;
							continue;
						}
						i += 1;
						break;
					}
					let ch_len = text[i..].chars().next().map_or(1, char::len_utf8);
					value.push_str(&text[i..i + ch_len]);
					i += ch_len;
				}
				tokens.push((Token::Text(value), start));
			}
			b'0'..=b'9' | b'-' => {
				i += 1;
				while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
					i += 1;
				}
				tokens.push((Token::Number(text[start..i].to_string()), start));
			}
			c if c.is_ascii_alphabetic() || c == b'_' => {
				while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
					i += 1;
				}
				tokens.push((Token::Ident(text[start..i].to_string()), start));
			}
			_ => {
				return Err(FilterError::Syntax {
					offset: start,
					message: format!("unexpected character {:?}", text[start..].chars().next().unwrap_or('?')),
				});
			}
		}
		if tokens.len() > MAX_TOKENS {
			return Err(FilterError::TooComplex {
				what: "tokens",
				limit: MAX_TOKENS,
			});
		}
	}

	Ok(tokens)
}

/// Compiles a `requestMatchRegex` pattern.
pub(super) fn compile_pattern(pattern: &str) -> Result<Regex> {
	Regex::new(pattern).map_err(|e| FilterError::InvalidRegex {
		pattern: pattern.to_string(),
		message: e.to_string(),
	})
}

pub(super) struct Parser {
	tokens: Vec<(Token, usize)>,
	pos: usize,
	end: usize,
	depth: usize,
}

impl Parser {
	pub(super) fn new(text: &str) -> Result<Self> {
		Ok(Self {
			tokens: tokenize(text)?,
			pos: 0,
			end: text.len(),
			depth: 0,
		})
	}

	pub(super) fn parse(mut self) -> Result<Expr> {
		if self.tokens.is_empty() {
			return Err(self.error("empty expression"));
		}
		let expr = self.parse_or()?;
		if self.pos < self.tokens.len() {
			return Err(self.error("unexpected trailing input"));
		}
		Ok(expr)
	}

	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.pos).map(|(t, _)| t)
	}

	fn offset(&self) -> usize {
		self.tokens.get(self.pos).map_or(self.end, |(_, o)| *o)
	}

	fn error(&self, message: &str) -> FilterError {
		FilterError::Syntax {
			offset: self.offset(),
			message: message.to_string(),
		}
	}

	fn next(&mut self) -> Option<Token> {
		let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
		if token.is_some() {
			self.pos += 1;
		}
		token
	}

	fn eat_keyword(&mut self, keyword: &str) -> bool {
		if let Some(Token::Ident(ident)) = self.peek()
			&& ident.eq_ignore_ascii_case(keyword)
		{
			self.pos += 1;
			return true;
		}
		false
	}

	fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
		if self.peek() == Some(&expected) {
			self.pos += 1;
			Ok(())
		} else {
			Err(self.error(&format!("expected {what}")))
		}
	}

	/// Runs `inner` one nesting level deeper.
	fn nested<T>(&mut self, inner: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
		if self.depth == MAX_DEPTH {
			return Err(FilterError::TooComplex {
				what: "nesting levels",
				limit: MAX_DEPTH,
			});
		}
		self.depth += 1;
		let result = inner(self);
		self.depth -= 1;
		result
	}

	fn parse_or(&mut self) -> Result<Expr> {
		let mut left = self.parse_and()?;
		while self.eat_keyword("OR") {
			let right = self.parse_and()?;
			left = Expr::Or(Box::new(left), Box::new(right));
		}
		Ok(left)
	}

	fn parse_and(&mut self) -> Result<Expr> {
		let mut left = self.parse_unary()?;
		while self.eat_keyword("AND") {
			let right = self.parse_unary()?;
			left = Expr::And(Box::new(left), Box::new(right));
		}
		Ok(left)
	}

	fn parse_unary(&mut self) -> Result<Expr> {
		if self.eat_keyword("NOT") {
			let inner = self.nested(Self::parse_unary)?;
			return Ok(Expr::Not(Box::new(inner)));
		}
		if self.peek() == Some(&Token::LParen) {
			self.pos += 1;
			let inner = self.nested(Self::parse_or)?;
			self.expect(Token::RParen, "')'")?;
			return Ok(inner);
		}
		self.parse_condition()
	}

	fn parse_condition(&mut self) -> Result<Expr> {
		let left = self.parse_operand()?;
		let op = match self.peek() {
			Some(Token::Eq) => CompareOp::Eq,
			Some(Token::NotEq) => CompareOp::NotEq,
			_ => return Ok(Expr::Truthy(left)),
		};
		self.pos += 1;
		let right = self.parse_operand()?;
		Ok(Expr::Compare { left, op, right })
	}

	fn parse_operand(&mut self) -> Result<Operand> {
		let offset = self.offset();
		match self.next() {
			Some(Token::Text(text)) | Some(Token::Number(text)) => Ok(Operand::Literal(Value::Text(text))),
			Some(Token::Ident(ident)) => {
				if self.peek() == Some(&Token::LParen) {
					self.pos += 1;
					let args = self.nested(Self::parse_args)?;
					if ident.eq_ignore_ascii_case("requestMatchRegex")
						&& let [Operand::Literal(Value::Text(pattern))] = args.as_slice()
					{
						return Ok(Operand::UrlMatches(Pattern(compile_pattern(pattern)?)));
					}
					return Ok(Operand::Call { name: ident, args });
				}
				match ident.to_ascii_uppercase().as_str() {
					"TRUE" | "INCLUDE" => Ok(Operand::Literal(Value::Bool(true))),
					"FALSE" | "EXCLUDE" => Ok(Operand::Literal(Value::Bool(false))),
					"NULL" => Ok(Operand::Literal(Value::Null)),
					_ => Err(FilterError::Syntax {
						offset,
						message: format!("unexpected identifier {ident}"),
					}),
				}
			}
			_ => Err(FilterError::Syntax {
				offset,
				message: "expected a value or function call".into(),
			}),
		}
	}

	fn parse_args(&mut self) -> Result<Vec<Operand>> {
		let mut args = Vec::new();
		if self.peek() == Some(&Token::RParen) {
			self.pos += 1;
			return Ok(args);
		}
		loop {
			args.push(self.parse_operand()?);
			match self.peek() {
				Some(Token::Comma) => self.pos += 1,
				Some(Token::RParen) => {
					self.pos += 1;
					return Ok(args);
				}
				_ => return Err(self.error("expected ',' or ')'")),
			}
		}
	}
}

//! Parser for the JSONPath dialect used by validation rules.
//!
//! Supports the subset of the Kubernetes JSONPath syntax that rules need:
//! dotted and bracketed field access, wildcards, indexes, slices, recursive
//! descent and simple comparison filters.

use serde_json::Value;

/// One step of a compiled path
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Segment {
    /// `.name` or `['name']`
    Field(String),
    /// `.*`
    Wildcard,
    /// `[*]`
    AllElements,
    /// `[n]`
    Index(i64),
    /// `[start:end:step]`
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    /// `..` (always followed by another segment)
    Recursive,
    /// `[?(@.a.b OP literal)]` or `[?(@.a.b)]`
    Filter(Filter),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Filter {
    pub left: Vec<Segment>,
    pub comparison: Option<(Operator, Value)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parse a whole expression into segments.
pub(crate) fn parse(expr: &str) -> Result<Vec<Segment>, String> {
    let mut parser = Parser::new(expr);
    let segments = parser.segments()?;
    if let Some(c) = parser.peek() {
        return Err(format!("unexpected character {:?} at offset {}", c, parser.pos));
    }
    Ok(segments)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(c) => format!("expected {:?}, found {:?} at offset {}", expected, c, self.pos),
                None => format!("expected {:?}, found end of expression", expected),
            })
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Parse segments until a character that cannot start one.
    fn segments(&mut self) -> Result<Vec<Segment>, String> {
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some('.') if self.peek_at(1) == Some('.') => {
                    self.pos += 2;
                    segments.push(Segment::Recursive);
                    match self.peek() {
                        Some('[') => {
                            self.pos += 1;
                            segments.push(self.bracket()?);
                        }
                        Some('*') => {
                            self.pos += 1;
                            segments.push(Segment::Wildcard);
                        }
                        _ => segments.push(Segment::Field(self.name()?)),
                    }
                }
                Some('.') => {
                    self.pos += 1;
                    if self.eat('*') {
                        segments.push(Segment::Wildcard);
                    } else {
                        segments.push(Segment::Field(self.name()?));
                    }
                }
                Some('[') => {
                    self.pos += 1;
                    segments.push(self.bracket()?);
                }
                _ => return Ok(segments),
            }
        }
    }

    /// Parse a bare field name, honoring backslash escapes.
    fn name(&mut self) -> Result<String, String> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.pos += 1;
                    match self.bump() {
                        Some(escaped) => name.push(escaped),
                        None => return Err("dangling escape at end of expression".to_string()),
                    }
                }
                c if c.is_alphanumeric() || c == '_' || c == '-' || c == '/' => {
                    name.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if name.is_empty() {
            return Err(format!("expected field name at offset {}", self.pos));
        }
        Ok(name)
    }

    /// Parse the inside of `[...]`; the opening bracket is already consumed.
    fn bracket(&mut self) -> Result<Segment, String> {
        self.skip_whitespace();
        let segment = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Segment::AllElements
            }
            Some('\'') | Some('"') => Segment::Field(self.quoted()?),
            Some('?') => {
                self.pos += 1;
                self.expect('(')?;
                let filter = self.filter()?;
                self.expect(')')?;
                Segment::Filter(filter)
            }
            _ => self.index_or_slice()?,
        };
        self.skip_whitespace();
        self.expect(']')?;
        Ok(segment)
    }

    fn quoted(&mut self) -> Result<String, String> {
        let quote = self.bump().ok_or("expected quote")?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => value.push(c),
                    None => return Err("unterminated string".to_string()),
                },
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
                None => return Err("unterminated string".to_string()),
            }
        }
    }

    fn integer(&mut self) -> Result<Option<i64>, String> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars.get(start..self.pos).unwrap_or_default().iter().collect();
        self.skip_whitespace();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse()
            .map(Some)
            .map_err(|_| format!("invalid array index {:?}", text))
    }

    fn index_or_slice(&mut self) -> Result<Segment, String> {
        let start = self.integer()?;
        if !self.eat(':') {
            return start
                .map(Segment::Index)
                .ok_or_else(|| format!("expected array index at offset {}", self.pos));
        }
        let end = self.integer()?;
        let step = if self.eat(':') { self.integer()? } else { None };
        if step == Some(0) {
            return Err("slice step cannot be zero".to_string());
        }
        Ok(Segment::Slice { start, end, step })
    }

    /// `@.a.b [OP literal]`; the surrounding parentheses are handled by the caller.
    fn filter(&mut self) -> Result<Filter, String> {
        self.skip_whitespace();
        self.expect('@')?;
        let left = self.segments()?;
        self.skip_whitespace();
        if self.peek() == Some(')') {
            return Ok(Filter {
                left,
                comparison: None,
            });
        }
        let operator = self.operator()?;
        self.skip_whitespace();
        let literal = self.literal()?;
        self.skip_whitespace();
        Ok(Filter {
            left,
            comparison: Some((operator, literal)),
        })
    }

    fn operator(&mut self) -> Result<Operator, String> {
        let first = self.bump().ok_or("expected comparison operator")?;
        let followed_by_eq = self.eat('=');
        match (first, followed_by_eq) {
            ('=', true) => Ok(Operator::Eq),
            ('!', true) => Ok(Operator::Ne),
            ('<', true) => Ok(Operator::Le),
            ('<', false) => Ok(Operator::Lt),
            ('>', true) => Ok(Operator::Ge),
            ('>', false) => Ok(Operator::Gt),
            (c, _) => Err(format!("unknown comparison operator {:?}", c)),
        }
    }

    fn literal(&mut self) -> Result<Value, String> {
        match self.peek() {
            Some('\'') | Some('"') => Ok(Value::String(self.quoted()?)),
            _ => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '+'))
                {
                    self.pos += 1;
                }
                let text: String = self.chars.get(start..self.pos).unwrap_or_default().iter().collect();
                match text.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "" => Err(format!("expected literal at offset {}", self.pos)),
                    number => serde_json::from_str::<serde_json::Number>(number)
                        .map(Value::Number)
                        .map_err(|_| format!("invalid literal {:?}", number)),
                }
            }
        }
    }
}

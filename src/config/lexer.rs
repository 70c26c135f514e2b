//! Line lexer/parser for the configuration language.
//!
//! One statement per line:
//!
//! ```text
//! max_size = 42
//! min_level = 0.054      # trailing comment
//! group. = "system"      # group directive
//! subjects = ["math", "programming"]
//! ```
//!
//! The parser is a finite-state machine driven one character at a time. Number
//! tokens are sliced out of the line by their buffered start offset when they
//! terminate; string tokens are unescaped into a buffer as they are read. The
//! line is never re-scanned.

use super::value::{Value, Values, VarType, parse_integer, parse_real};

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// `key = value` or `key = [v1, v2, ...]`
    Parsed(ParsedLine),
    /// Empty or whitespace-only line
    Blank,
    /// Whole-line comment
    Comment,
    /// The line violates the grammar
    SyntaxError(SyntaxError),
}

/// A successfully parsed assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub key: String,
    pub values: Values,
}

impl ParsedLine {
    /// Keys ending in `.` are directives rather than variables.
    pub fn is_directive(&self) -> bool {
        self.key.ends_with('.')
    }

    pub fn var_type(&self) -> VarType {
        self.values.var_type()
    }
}

/// Where and why a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 1-based character column
    pub column: usize,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Key,
    KeyDot,
    AfterKey,
    BeforeValue,
    Digits { array: bool },
    Dot { array: bool },
    Fraction { array: bool },
    Str { array: bool },
    StrEscape { array: bool },
    ArrayOpen,
    ArrayNext,
    ArrayAfterElem,
    AfterValue,
    Comment,
}

enum Flow {
    Continue,
    Stop,
}

type Step = Result<Flow, &'static str>;

/// Parse a single line (without its trailing newline).
pub fn parse_line(line: &str) -> LineOutcome {
    Lexer::new(line).run()
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

struct Lexer<'a> {
    line: &'a str,
    state: State,
    key_start: usize,
    key_end: usize,
    token_start: usize,
    text: String,
    values: Option<Values>,
}

impl<'a> Lexer<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            state: State::Start,
            key_start: 0,
            key_end: 0,
            token_start: 0,
            text: String::new(),
            values: None,
        }
    }

    fn run(mut self) -> LineOutcome {
        let mut column = 0;
        for (pos, c) in self.line.char_indices() {
            column += 1;
            match self.step(pos, c) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(reason) => return LineOutcome::SyntaxError(SyntaxError { column, reason }),
            }
        }
        // Accumulated values are dropped with `self` on every error return.
        match self.finish() {
            Ok(outcome) => outcome,
            Err(reason) => LineOutcome::SyntaxError(SyntaxError {
                column: column + 1,
                reason,
            }),
        }
    }

    fn expected_type(&self) -> Option<VarType> {
        self.values.as_ref().map(Values::var_type)
    }

    fn step(&mut self, pos: usize, c: char) -> Step {
        match self.state {
            State::Start => {
                if is_space(c) {
                } else if c == '#' {
                    self.state = State::Comment;
                    return Ok(Flow::Stop);
                } else if is_key_char(c) {
                    self.key_start = pos;
                    self.state = State::Key;
                } else {
                    return Err("key must start with a letter or '_'");
                }
            }
            State::Key => {
                if is_key_char(c) {
                } else if c == '.' {
                    self.key_end = pos + 1;
                    self.state = State::KeyDot;
                } else if is_space(c) {
                    self.key_end = pos;
                    self.state = State::AfterKey;
                } else if c == '=' {
                    self.key_end = pos;
                    self.state = State::BeforeValue;
                } else {
                    return Err("key may contain only letters and '_'");
                }
            }
            State::KeyDot | State::AfterKey => {
                if is_space(c) {
                    self.state = State::AfterKey;
                } else if c == '=' {
                    self.state = State::BeforeValue;
                } else {
                    return Err("expected '=' after key");
                }
            }
            State::BeforeValue => {
                if is_space(c) {
                } else if c.is_ascii_digit() {
                    self.token_start = pos;
                    self.state = State::Digits { array: false };
                } else if c == '"' {
                    self.text.clear();
                    self.state = State::Str { array: false };
                } else if c == '[' {
                    self.state = State::ArrayOpen;
                } else {
                    return Err("expected a number, a quoted string or '['");
                }
            }
            State::Digits { array } => {
                if c.is_ascii_digit() {
                } else if c == '.' {
                    if self.expected_type() == Some(VarType::Integer) {
                        return Err("real element in an integer array");
                    }
                    self.state = State::Dot { array };
                } else {
                    return self.end_number(pos, c, array, false);
                }
            }
            State::Dot { array } => {
                if c.is_ascii_digit() {
                    self.state = State::Fraction { array };
                } else {
                    return Err("expected a digit after the decimal point");
                }
            }
            State::Fraction { array } => {
                if !c.is_ascii_digit() {
                    return self.end_number(pos, c, array, true);
                }
            }
            State::Str { array } => {
                if c == '"' {
                    let text = std::mem::take(&mut self.text);
                    self.push(Value::String(text))?;
                    self.state = if array {
                        State::ArrayAfterElem
                    } else {
                        State::AfterValue
                    };
                } else if c == '\\' {
                    self.state = State::StrEscape { array };
                } else if c == '\n' {
                    return Err("newline inside a string");
                } else {
                    self.text.push(c);
                }
            }
            State::StrEscape { array } => {
                self.text.push(c);
                self.state = State::Str { array };
            }
            State::ArrayOpen | State::ArrayNext => {
                if is_space(c) {
                } else if c.is_ascii_digit() {
                    if self.expected_type() == Some(VarType::String) {
                        return Err("number element in a string array");
                    }
                    self.token_start = pos;
                    self.state = State::Digits { array: true };
                } else if c == '"' {
                    if matches!(
                        self.expected_type(),
                        Some(VarType::Integer | VarType::Real)
                    ) {
                        return Err("string element in a numeric array");
                    }
                    self.text.clear();
                    self.state = State::Str { array: true };
                } else if self.state == State::ArrayOpen && c == ']' {
                    return Err("array must hold at least one element");
                } else {
                    return Err("expected an array element");
                }
            }
            State::ArrayAfterElem => {
                if is_space(c) {
                } else if c == ',' {
                    self.state = State::ArrayNext;
                } else if c == ']' {
                    self.state = State::AfterValue;
                } else {
                    return Err("expected ',' or ']'");
                }
            }
            State::AfterValue => {
                if is_space(c) {
                } else if c == '#' {
                    return Ok(Flow::Stop);
                } else {
                    return Err("unexpected text after value");
                }
            }
            State::Comment => return Ok(Flow::Stop),
        }
        Ok(Flow::Continue)
    }

    /// Handle the character that terminates a number token.
    fn end_number(&mut self, pos: usize, c: char, array: bool, real: bool) -> Step {
        let next = match (array, c) {
            (_, c) if is_space(c) => {
                if array {
                    State::ArrayAfterElem
                } else {
                    State::AfterValue
                }
            }
            (false, '#') => State::AfterValue,
            (true, ',') => State::ArrayNext,
            (true, ']') => State::AfterValue,
            _ => return Err("unexpected character in number"),
        };
        self.take_number(pos, real)?;
        self.state = next;
        if c == '#' {
            return Ok(Flow::Stop);
        }
        Ok(Flow::Continue)
    }

    fn take_number(&mut self, end: usize, real: bool) -> Result<(), &'static str> {
        let token = &self.line[self.token_start..end];
        let value = if real {
            parse_real(token).map(Value::Real)
        } else {
            parse_integer(token).map(Value::Integer)
        };
        let value = value.ok_or("number out of range")?;
        self.push(value)
    }

    fn push(&mut self, value: Value) -> Result<(), &'static str> {
        match self.values.as_mut() {
            None => {
                self.values = Some(Values::from_first(value));
                Ok(())
            }
            Some(values) => values
                .push(value)
                .map_err(|_| "array elements must match the type of the first element"),
        }
    }

    fn finish(mut self) -> Result<LineOutcome, &'static str> {
        let end = self.line.len();
        match self.state {
            State::Start => return Ok(LineOutcome::Blank),
            State::Comment => return Ok(LineOutcome::Comment),
            State::Digits { array: false } => self.take_number(end, false)?,
            State::Fraction { array: false } => self.take_number(end, true)?,
            State::AfterValue => {}
            State::Key | State::KeyDot | State::AfterKey => return Err("expected '=' after key"),
            State::BeforeValue => return Err("missing value"),
            State::Dot { .. } => return Err("expected a digit after the decimal point"),
            State::Str { .. } | State::StrEscape { .. } => return Err("unterminated string"),
            State::Digits { array: true }
            | State::Fraction { array: true }
            | State::ArrayOpen
            | State::ArrayNext
            | State::ArrayAfterElem => return Err("unterminated array"),
        }
        let values = self.values.take().ok_or("missing value")?;
        Ok(LineOutcome::Parsed(ParsedLine {
            key: self.line[self.key_start..self.key_end].to_string(),
            values,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> ParsedLine {
        match parse_line(line) {
            LineOutcome::Parsed(p) => p,
            other => panic!("expected Parsed for {:?}, got {:?}", line, other),
        }
    }

    fn is_error(line: &str) -> bool {
        matches!(parse_line(line), LineOutcome::SyntaxError(_))
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_blank_lines() {
        assert_eq!(parse_line(""), LineOutcome::Blank);
        assert_eq!(parse_line("   \t  "), LineOutcome::Blank);
    }

    #[test]
    fn test_comment_lines() {
        assert_eq!(parse_line("#that part also commented"), LineOutcome::Comment);
        assert_eq!(parse_line("   # indented"), LineOutcome::Comment);
    }

    // ==================== Scalar Tests ====================

    #[test]
    fn test_integer_scalar() {
        let p = parsed("max_size=42");
        assert_eq!(p.key, "max_size");
        assert_eq!(p.values, Values::Integer(vec![42]));
    }

    #[test]
    fn test_integer_leading_zeros() {
        assert_eq!(parsed("a = 007").values, Values::Integer(vec![7]));
        assert_eq!(parsed("a = 000").values, Values::Integer(vec![0]));
        assert_eq!(parsed("a = 0").values, Values::Integer(vec![0]));
    }

    #[test]
    fn test_real_scalar_with_trailing_comment() {
        let p = parsed("min_level=0.054 #comment-part");
        assert_eq!(p.values, Values::Real(vec![0.054]));
        assert_eq!(p.var_type(), VarType::Real);
    }

    #[test]
    fn test_comment_directly_after_value() {
        assert_eq!(parsed("a = 5#note").values, Values::Integer(vec![5]));
        assert_eq!(
            parsed(r##"a = "x"# note"##).values,
            Values::String(vec!["x".into()])
        );
    }

    #[test]
    fn test_real_requires_fraction_digits() {
        assert!(is_error("a = 1."));
        assert!(is_error("a = 1. "));
        assert!(is_error("a = .5"));
    }

    #[test]
    fn test_string_escapes() {
        let p = parsed(r#"key = "a\"b\\c""#);
        assert_eq!(p.values, Values::String(vec!["a\"b\\c".into()]));
    }

    #[test]
    fn test_string_keeps_hash_and_commas() {
        let p = parsed(r#"s = "a # b, c""#);
        assert_eq!(p.values, Values::String(vec!["a # b, c".into()]));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(is_error(r#"s = "open"#));
        assert!(is_error(r#"s = "ends in escape\"#));
    }

    #[test]
    fn test_group_directive() {
        let p = parsed(r#"group. = "system" #change group to "system""#);
        assert_eq!(p.key, "group.");
        assert!(p.is_directive());
        assert_eq!(p.values, Values::String(vec!["system".into()]));
    }

    // ==================== Array Tests ====================

    #[test]
    fn test_string_array() {
        let p = parsed(r#"the_best_subjects=["math", "programming"]"#);
        assert_eq!(
            p.values,
            Values::String(vec!["math".into(), "programming".into()])
        );
    }

    #[test]
    fn test_numeric_arrays_with_spacing() {
        assert_eq!(
            parsed("a = [ 1 , 02,3 ]").values,
            Values::Integer(vec![1, 2, 3])
        );
        assert_eq!(
            parsed("a = [1.5, 2.25] # reals").values,
            Values::Real(vec![1.5, 2.25])
        );
    }

    #[test]
    fn test_array_homogeneity() {
        assert!(is_error("key = [1, 2.5, 3]"));
        assert!(is_error("key = [1.5, 2]"));
        assert!(is_error(r#"key = [1, "two"]"#));
        assert!(is_error(r#"key = ["one", 2]"#));
    }

    #[test]
    fn test_open_array_at_end_of_line() {
        assert!(is_error("a = [1, 2"));
        assert!(is_error("a = [1,"));
        assert!(is_error("a = ["));
    }

    #[test]
    fn test_empty_and_malformed_arrays() {
        assert!(is_error("a = []"));
        assert!(is_error("a = [1,]"));
        assert!(is_error("a = [1 2]"));
        assert!(is_error("a = [1] 2"));
    }

    // ==================== Error Tests ====================

    #[test]
    fn test_key_errors() {
        assert!(is_error("bad key=1"));
        assert!(is_error("key2 = 1"));
        assert!(is_error("a.b = 1"));
        assert!(is_error("=1"));
        assert!(is_error("key"));
        assert!(is_error("key ="));
        assert!(is_error("key = # nothing"));
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(is_error("a = 5 6"));
        assert!(is_error("a = 5x"));
        assert!(is_error(r#"a = "x" y"#));
        assert!(is_error("a = -5"));
    }

    #[test]
    fn test_error_column() {
        match parse_line("bad key=") {
            LineOutcome::SyntaxError(e) => assert_eq!(e.column, 5),
            other => panic!("expected SyntaxError, got {:?}", other),
        }
    }

    #[test]
    fn test_integer_overflow_is_error() {
        assert!(is_error("a = 99999999999999999999"));
    }

    #[test]
    fn test_real_overflow_is_error() {
        let line = format!("a = {}.0", "9".repeat(400));
        assert_eq!(
            parse_line(&line),
            LineOutcome::SyntaxError(SyntaxError {
                column: line.len() + 1,
                reason: "number out of range",
            })
        );
        assert!(is_error(&format!("a = [1.5, {}.0]", "9".repeat(400))));
    }

    // ==================== Round-trip Tests ====================

    #[test]
    fn test_rendered_values_reparse() {
        let lines = [
            "a = 007",
            "a = 3.0",
            "a = 12.5000",
            r#"a = "q\"uo\\te""#,
            "a = [1, 2, 3]",
            "a = [0.5, 10.25]",
            r##"a = ["x", "y, z", "#"]"##,
        ];
        for line in lines {
            let first = parsed(line);
            let rendered = format!("{} = {}", first.key, first.values);
            assert_eq!(parsed(&rendered), first, "rendered: {}", rendered);
        }
    }
}

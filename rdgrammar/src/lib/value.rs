use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref RE_INTEGER: Regex = Regex::new(r"^-?\d+$").unwrap();
    static ref RE_FLOAT: Regex = Regex::new(r"^-?\d+(\.\d+)?([eE]-?\d+)?$").unwrap();
}

/// A primitive value coerced from the text of a terminal, as used by rule and grammar options.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A quoted string, with its quotes removed and escapes resolved.
    Str(String),
    /// A `/`-delimited regular expression, with its delimiters removed and `\/` unescaped.
    Regex(String),
    /// Text which matched none of the other forms.
    Raw(String),
}

impl Value {
    /// Coerce `s` into the first form that fits, trying in order: boolean, integer,
    /// floating point, quoted string, regular expression, and finally the raw text.
    pub fn from_text(s: &str) -> Value {
        match s {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => (),
        }
        if RE_INTEGER.is_match(s) {
            if let Ok(i) = s.parse::<i64>() {
                return Value::Int(i);
            }
        }
        if RE_FLOAT.is_match(s) {
            if let Ok(f) = s.parse::<f64>() {
                return Value::Float(f);
            }
        }
        if s.len() >= 2
            && ((s.starts_with('\'') && s.ends_with('\''))
                || (s.starts_with('"') && s.ends_with('"')))
        {
            return Value::Str(unescape(&s[1..s.len() - 1]));
        }
        if s.len() >= 2 && s.starts_with('/') && s.ends_with('/') {
            return Value::Regex(s[1..s.len() - 1].replace("\\/", "/"));
        }
        Value::Raw(s.to_owned())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// The textual content of string-like values (quoted strings, regular expressions, and raw
    /// text).
    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::Str(ref s) | Value::Regex(ref s) | Value::Raw(ref s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(ref s) => write!(f, "{:?}", s),
            Value::Regex(ref s) => write!(f, "/{}/", s.replace('/', "\\/")),
            Value::Raw(ref s) => write!(f, "{}", s),
        }
    }
}

/// Resolve backslash escapes in the body of a quoted string. Unknown escapes are kept verbatim.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some(e @ ('\\' | '\'' | '"')) => out.push(e),
            Some(e) => {
                out.push('\\');
                out.push(e);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::{Value, unescape};

    #[test]
    fn coercion_order() {
        assert_eq!(Value::from_text("true"), Value::Bool(true));
        assert_eq!(Value::from_text("false"), Value::Bool(false));
        assert_eq!(Value::from_text("42"), Value::Int(42));
        assert_eq!(Value::from_text("-7"), Value::Int(-7));
        assert_eq!(Value::from_text("2.5"), Value::Float(2.5));
        assert_eq!(Value::from_text("1e3"), Value::Float(1000.0));
        assert_eq!(Value::from_text("'a\\'b'"), Value::Str("a'b".to_owned()));
        assert_eq!(Value::from_text("\"x\\ny\""), Value::Str("x\ny".to_owned()));
        assert_eq!(
            Value::from_text("/a\\/b+/"),
            Value::Regex("a/b+".to_owned())
        );
        assert_eq!(Value::from_text("startrule"), Value::Raw("startrule".to_owned()));
        assert_eq!(Value::from_text("True"), Value::Raw("True".to_owned()));
        // Too large for an i64, but still a valid float.
        assert_eq!(
            Value::from_text("99999999999999999999"),
            Value::Float(99999999999999999999.0)
        );
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(3).as_bool(), None);
        assert_eq!(Value::Int(3).as_int(), Some(3));
        assert_eq!(Value::Raw("x".to_owned()).as_str(), Some("x"));
        assert_eq!(Value::Float(1.0).as_str(), None);
    }

    #[test]
    fn unescaping() {
        assert_eq!(unescape("a\\tb"), "a\tb");
        assert_eq!(unescape("\\\\"), "\\");
        assert_eq!(unescape("\\d+"), "\\d+");
        assert_eq!(unescape("end\\"), "end\\");
    }
}

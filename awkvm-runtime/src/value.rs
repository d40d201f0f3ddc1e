//! Runtime values
//!
//! ## Conversion rules
//! - number to string: integral values print as integers, others through a
//!   printf format (`CONVFMT` for conversions, `OFMT` for output)
//! - string to number: longest numeric prefix after leading blanks, else 0
//! - comparison: numeric when both sides are numeric, otherwise by string

use std::cmp::Ordering;

use awkvm_spec::number::{format_number, is_integral};

/// A value on the stack or in a variable
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Uninitialized: both "" and 0
    #[default]
    Null,
    Num(f64),
    Str(String),
    /// Input-derived string (fields, split elements) that compares
    /// numerically when it looks like a number
    StrNum(String),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn bool(b: bool) -> Self {
        Value::Num(if b { 1.0 } else { 0.0 })
    }

    pub fn to_num(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Num(n) => *n,
            Value::Str(s) | Value::StrNum(s) => parse_prefix(s),
        }
    }

    /// String form, rendering non-integral numbers with `convfmt`
    pub fn to_str_with(&self, convfmt: impl Fn(f64) -> String) -> String {
        match self {
            Value::Null => String::new(),
            Value::Num(n) if is_integral(*n) => format!("{}", *n as i64),
            Value::Num(n) => convfmt(*n),
            Value::Str(s) | Value::StrNum(s) => s.clone(),
        }
    }

    /// String form using the default `%.6g`
    pub fn to_default_str(&self) -> String {
        self.to_str_with(format_number)
    }

    pub fn is_true(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::StrNum(s) => match parse_full(s) {
                Some(n) => n != 0.0,
                None => !s.is_empty(),
            },
        }
    }

    /// Numeric value when this value takes part in numeric comparison
    fn comparable_num(&self) -> Option<f64> {
        match self {
            Value::Null => Some(0.0),
            Value::Num(n) => Some(*n),
            Value::StrNum(s) => parse_full(s),
            Value::Str(_) => None,
        }
    }

    /// Compare two values; `to_str` converts either side for string comparison
    pub fn compare(&self, other: &Value, to_str: impl Fn(&Value) -> String) -> Ordering {
        match (self.comparable_num(), other.comparable_num()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => to_str(self).cmp(&to_str(other)),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\n' || c == '\r'
}

/// Length in bytes of the numeric prefix of `s` (no leading blanks)
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

/// Longest numeric prefix after leading blanks, 0 when there is none
pub fn parse_prefix(s: &str) -> f64 {
    let s = s.trim_start_matches(is_blank);
    let len = numeric_prefix_len(s);
    s[..len].parse().unwrap_or(0.0)
}

/// The number `s` spells out completely (surrounding blanks allowed)
pub fn parse_full(s: &str) -> Option<f64> {
    let s = s.trim_matches(is_blank);
    let len = numeric_prefix_len(s);
    if len > 0 && len == s.len() {
        s.parse().ok()
    } else {
        None
    }
}

/// Check whether an input string looks numeric
pub fn looks_numeric(s: &str) -> bool {
    parse_full(s).is_some()
}

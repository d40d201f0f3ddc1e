//! `printf`-style formatting
//!
//! Supports the C conversions AWK exposes: `d i o x X u c s e E f F g G` and
//! `%%`, with the `- + space # 0` flags, field width and precision (either may
//! be `*`). Length modifiers (`l`, `h`, ...) are accepted and ignored.

use std::iter::Peekable;
use std::str::Chars;

use awkvm_spec::number::{format_e, format_f, format_g};
use crate::error::{Result, RuntimeError};
use crate::value::Value;

/// Widths and precisions beyond this are clamped
const MAX_WIDTH: usize = 1_000_000;

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    alternate: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

/// Format `args` according to `format`; `to_str` renders values for `%s`
pub fn sprintf(format: &str, args: &[Value], to_str: impl Fn(&Value) -> String) -> Result<String> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut args = args.iter();
    let mut next_arg = |what: &str| {
        args.next().ok_or_else(|| RuntimeError::Format(format!("not enough arguments for {} in {:?}", what, format)))
    };

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.alternate = true,
                '0' => spec.zero = true,
                _ => break,
            }
            chars.next();
        }

        if chars.peek() == Some(&'*') {
            chars.next();
            let width = next_arg("width")?.to_num();
            if width < 0.0 {
                spec.left = true;
            }
            spec.width = width.abs().min(MAX_WIDTH as f64) as usize;
        } else {
            spec.width = digits(&mut chars);
        }

        if chars.peek() == Some(&'.') {
            chars.next();
            if chars.peek() == Some(&'*') {
                chars.next();
                let precision = next_arg("precision")?.to_num();
                spec.precision = (precision >= 0.0).then(|| precision.min(MAX_WIDTH as f64) as usize);
            } else {
                spec.precision = Some(digits(&mut chars));
            }
        }

        while matches!(chars.peek(), Some('h' | 'l' | 'L' | 'q' | 'j' | 'z' | 't')) {
            chars.next();
        }

        let verb = chars
            .next()
            .ok_or_else(|| RuntimeError::Format(format!("incomplete format specifier in {:?}", format)))?;

        let text = match verb {
            'd' | 'i' => format_signed(next_arg("%d")?.to_num(), &spec),
            'o' | 'x' | 'X' | 'u' => format_unsigned(next_arg("%x")?.to_num(), verb, &spec),
            'e' | 'E' | 'f' | 'F' | 'g' | 'G' => format_float(next_arg("%g")?.to_num(), verb, &spec),
            'c' => {
                let arg = next_arg("%c")?;
                let c = match arg {
                    Value::Num(n) => char::from_u32(*n as u32).map(String::from).unwrap_or_default(),
                    other => to_str(other).chars().next().map(String::from).unwrap_or_default(),
                };
                pad(&c, "", &Spec { zero: false, ..spec })
            }
            's' => {
                let s = to_str(next_arg("%s")?);
                let s = match spec.precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s,
                };
                pad(&s, "", &Spec { zero: false, ..spec })
            }
            other => {
                return Err(RuntimeError::Format(format!("invalid format verb %{} in {:?}", other, format)));
            }
        };
        out.push_str(&text);
    }
    Ok(out)
}

fn digits(chars: &mut Peekable<Chars<'_>>) -> usize {
    let mut n: usize = 0;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = n.saturating_mul(10).saturating_add(d as usize);
        chars.next();
    }
    n.min(MAX_WIDTH)
}

fn sign_prefix(negative: bool, spec: &Spec) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

/// Pad `body` (without sign) to the field width; zero padding goes between
/// the sign and the digits
fn pad(body: &str, sign: &str, spec: &Spec) -> String {
    let len = sign.chars().count() + body.chars().count();
    if len >= spec.width {
        return format!("{}{}", sign, body);
    }
    let fill = spec.width - len;
    if spec.left {
        format!("{}{}{}", sign, body, " ".repeat(fill))
    } else if spec.zero {
        format!("{}{}{}", sign, "0".repeat(fill), body)
    } else {
        format!("{}{}{}", " ".repeat(fill), sign, body)
    }
}

fn to_integer(n: f64) -> i64 {
    if n.is_nan() {
        0
    } else {
        // saturating cast
        n.trunc() as i64
    }
}

fn apply_precision(digits: String, spec: &Spec) -> String {
    match spec.precision {
        Some(0) if digits == "0" => String::new(),
        Some(p) if digits.len() < p => format!("{}{}", "0".repeat(p - digits.len()), digits),
        _ => digits,
    }
}

fn format_signed(n: f64, spec: &Spec) -> String {
    let value = to_integer(n);
    let digits = apply_precision(value.unsigned_abs().to_string(), spec);
    let spec = Spec { zero: spec.zero && spec.precision.is_none(), ..*spec };
    pad(&digits, sign_prefix(value < 0, &spec), &spec)
}

fn format_unsigned(n: f64, verb: char, spec: &Spec) -> String {
    let value = to_integer(n) as u64;
    let digits = match verb {
        'o' => format!("{:o}", value),
        'x' => format!("{:x}", value),
        'X' => format!("{:X}", value),
        _ => value.to_string(),
    };
    let mut digits = apply_precision(digits, spec);
    let prefix = match verb {
        'o' if spec.alternate && !digits.starts_with('0') => {
            digits.insert(0, '0');
            ""
        }
        'x' if spec.alternate && value != 0 => "0x",
        'X' if spec.alternate && value != 0 => "0X",
        _ => "",
    };
    let spec = Spec { zero: spec.zero && spec.precision.is_none(), ..*spec };
    pad(&digits, prefix, &spec)
}

fn format_float(n: f64, verb: char, spec: &Spec) -> String {
    let precision = spec.precision.unwrap_or(6);
    let upper = verb.is_ascii_uppercase();
    let magnitude = n.abs();
    let mut body = match verb {
        'e' | 'E' => format_e(magnitude, precision, upper),
        'f' | 'F' => format_f(magnitude, precision),
        _ => format_g(magnitude, precision, upper, spec.alternate),
    };
    if spec.alternate && precision == 0 && matches!(verb, 'f' | 'F') {
        body.push('.');
    }
    if upper {
        body = body.to_uppercase();
    }
    let negative = n.is_sign_negative() && !n.is_nan();
    let spec = Spec { zero: spec.zero && n.is_finite(), ..*spec };
    pad(&body, sign_prefix(negative, &spec), &spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: &str, args: &[Value]) -> String {
        sprintf(format, args, |v| v.to_default_str()).unwrap()
    }

    #[test]
    fn test_plain_text_and_percent() {
        assert_eq!(fmt("100%% done\n", &[]), "100% done\n");
    }

    #[test]
    fn test_integers() {
        assert_eq!(fmt("%d", &[Value::Num(42.9)]), "42");
        assert_eq!(fmt("%5d|%-5d|%05d", &[Value::Num(-3.0), Value::Num(7.0), Value::Num(-12.0)]), "   -3|7    |-0012");
        assert_eq!(fmt("%+d % d", &[Value::Num(5.0), Value::Num(5.0)]), "+5  5");
        assert_eq!(fmt("%.3d", &[Value::Num(7.0)]), "007");
        assert_eq!(fmt("%d", &[Value::str("12abc")]), "12");
        assert_eq!(fmt("%i", &[Value::Null]), "0");
    }

    #[test]
    fn test_unsigned() {
        assert_eq!(fmt("%x %X %o %u", &[Value::Num(255.0), Value::Num(255.0), Value::Num(8.0), Value::Num(3.0)]), "ff FF 10 3");
        assert_eq!(fmt("%#x %#o", &[Value::Num(255.0), Value::Num(8.0)]), "0xff 010");
    }

    #[test]
    fn test_floats() {
        assert_eq!(fmt("%f", &[Value::Num(3.14159)]), "3.141590");
        assert_eq!(fmt("%.2f", &[Value::Num(2.0 / 3.0)]), "0.67");
        assert_eq!(fmt("%8.3f|", &[Value::Num(-1.5)]), "  -1.500|");
        assert_eq!(fmt("%08.3f", &[Value::Num(-1.5)]), "-001.500");
        assert_eq!(fmt("%e", &[Value::Num(1234.5)]), "1.234500e+03");
        assert_eq!(fmt("%G", &[Value::Num(0.00001)]), "1E-05");
        assert_eq!(fmt("%g", &[Value::Num(100000.0)]), "100000");
        assert_eq!(fmt("%g", &[Value::Num(1000000.0)]), "1e+06");
    }

    #[test]
    fn test_strings_and_chars() {
        assert_eq!(fmt("[%s]", &[Value::str("hi")]), "[hi]");
        assert_eq!(fmt("[%5s][%-5s]", &[Value::str("ab"), Value::str("cd")]), "[   ab][cd   ]");
        assert_eq!(fmt("%.2s", &[Value::str("hello")]), "he");
        assert_eq!(fmt("%s", &[Value::Num(0.5)]), "0.5");
        assert_eq!(fmt("%c%c", &[Value::Num(65.0), Value::str("xyz")]), "Ax");
    }

    #[test]
    fn test_star_width_and_precision() {
        assert_eq!(fmt("%*d", &[Value::Num(4.0), Value::Num(7.0)]), "   7");
        assert_eq!(fmt("%-*d|", &[Value::Num(3.0), Value::Num(7.0)]), "7  |");
        assert_eq!(fmt("%.*f", &[Value::Num(1.0), Value::Num(2.25)]), "2.2");
    }

    #[test]
    fn test_huge_width_and_precision_clamped() {
        let padded = fmt("%99999999999999999999d", &[Value::Num(1.0)]);
        assert_eq!(padded.len(), MAX_WIDTH);
        assert!(padded.ends_with(" 1"));

        let zeros = fmt("%.99999999999999999999d", &[Value::Num(7.0)]);
        assert_eq!(zeros.len(), MAX_WIDTH);
        assert!(zeros.starts_with("00") && zeros.ends_with('7'));

        let starred = fmt("%*s|", &[Value::Num(-1e300), Value::str("x")]);
        assert_eq!(starred.len(), MAX_WIDTH + 1);
        assert!(starred.starts_with("x "));
    }

    #[test]
    fn test_length_modifiers_ignored() {
        assert_eq!(fmt("%ld %lld", &[Value::Num(1.0), Value::Num(2.0)]), "1 2");
    }

    #[test]
    fn test_format_errors() {
        let to_str = |v: &Value| v.to_default_str();
        assert!(matches!(sprintf("%d %d", &[Value::Num(1.0)], to_str), Err(RuntimeError::Format(_))));
        assert!(matches!(sprintf("abc %", &[], to_str), Err(RuntimeError::Format(_))));
        assert!(matches!(sprintf("%z", &[Value::Num(1.0)], to_str), Err(RuntimeError::Format(_))));
    }
}

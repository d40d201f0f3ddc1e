//! Number rendering
//!
//! C `printf` style conversions (`%e`, `%f`, `%g`) over `f64`, plus the AWK
//! rule that integral values always print as integers.

/// Largest magnitude rendered through the integer path
const INTEGRAL_LIMIT: f64 = 9.223_372_036_854_775e18;

/// Check whether `value` prints as an integer
pub fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() < INTEGRAL_LIMIT
}

/// Default rendering: integers as integers, everything else as `%.6g`
pub fn format_number(value: f64) -> String {
    if is_integral(value) {
        format!("{}", value as i64)
    } else {
        format_g(value, 6, false, false)
    }
}

/// `%.<precision>e`, with at least two exponent digits
pub fn format_e(value: f64, precision: usize, upper: bool) -> String {
    if !value.is_finite() {
        return non_finite(value, upper);
    }
    let text = format!("{:.*e}", precision, value);
    let (mantissa, exp) = split_exponent(&text);
    join_exponent(mantissa, exp, upper)
}

/// `%.<precision>f`
pub fn format_f(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return non_finite(value, false);
    }
    format!("{:.*}", precision, value)
}

/// `%.<precision>g`; `alternate` keeps trailing zeros (`%#g`)
pub fn format_g(value: f64, precision: usize, upper: bool, alternate: bool) -> String {
    if !value.is_finite() {
        return non_finite(value, upper);
    }
    let precision = precision.max(1);
    let exp = if value == 0.0 {
        0
    } else {
        split_exponent(&format!("{:.*e}", precision - 1, value)).1
    };

    if exp < -4 || exp >= precision as i32 {
        let scientific = format!("{:.*e}", precision - 1, value);
        let (mantissa, exp) = split_exponent(&scientific);
        let mantissa = if alternate { mantissa } else { strip_zeros(mantissa) };
        join_exponent(mantissa, exp, upper)
    } else {
        let digits = (precision as i32 - 1 - exp).max(0) as usize;
        let fixed = format!("{:.*}", digits, value);
        if alternate {
            fixed
        } else {
            strip_zeros(&fixed).to_string()
        }
    }
}

fn split_exponent(s: &str) -> (&str, i32) {
    match s.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse().unwrap_or(0)),
        None => (s, 0),
    }
}

fn join_exponent(mantissa: &str, exp: i32, upper: bool) -> String {
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, e, sign, exp.abs())
}

/// Drop trailing fractional zeros and a dangling decimal point
fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn non_finite(value: f64, upper: bool) -> String {
    let text = if value.is_nan() {
        "nan"
    } else if value > 0.0 {
        "inf"
    } else {
        "-inf"
    };
    if upper {
        text.to_uppercase()
    } else {
        text.to_string()
    }
}

//! printf-style formatting of a single floating point value.
//!
//! Supports `%[flags][width][.precision]conv` with flags `-`, `+`, space, `0`, `#`, an
//! ignored `l` length modifier and the conversions `f F e E g G`. Output matches C's
//! `printf`, including the signed, at-least-two-digit exponent.

use crate::error::{DimredError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Fixed,
    Exponent,
    General,
}

/// A parsed format string such as `"%6.2f"`, with optional literal text around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    source: String,
    prefix: String,
    suffix: String,
    left_align: bool,
    plus_sign: bool,
    space_sign: bool,
    zero_pad: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
    conversion: Conversion,
    uppercase: bool,
}

impl NumberFormat {
    pub fn parse(fmt: &str) -> Result<Self> {
        let invalid =
            |reason: String| DimredError::invalid_configuration(format!("format {:?}", fmt), reason);

        let chars: Vec<char> = fmt.chars().collect();
        let mut prefix = String::new();
        let mut pos = 0;
        loop {
            match chars.get(pos) {
                None => return Err(invalid("no conversion specifier found".to_string())),
                Some('%') if chars.get(pos + 1) == Some(&'%') => {
                    prefix.push('%');
                    pos += 2;
                }
                Some('%') => {
                    pos += 1;
                    break;
                }
                Some(&c) => {
                    prefix.push(c);
                    pos += 1;
                }
            }
        }

        let mut format = NumberFormat {
            source: fmt.to_string(),
            prefix,
            suffix: String::new(),
            left_align: false,
            plus_sign: false,
            space_sign: false,
            zero_pad: false,
            alternate: false,
            width: 0,
            precision: None,
            conversion: Conversion::Fixed,
            uppercase: false,
        };

        while let Some(&c) = chars.get(pos) {
            match c {
                '-' => format.left_align = true,
                '+' => format.plus_sign = true,
                ' ' => format.space_sign = true,
                '0' => format.zero_pad = true,
                '#' => format.alternate = true,
                _ => break,
            }
            pos += 1;
        }

        let (width, next) = read_number(&chars, pos);
        format.width = width.unwrap_or(0);
        pos = next;

        if chars.get(pos) == Some(&'.') {
            let (precision, next) = read_number(&chars, pos + 1);
            format.precision = Some(precision.unwrap_or(0));
            pos = next;
        }

        if chars.get(pos) == Some(&'l') {
            pos += 1;
        }

        let conversion = chars
            .get(pos)
            .ok_or_else(|| invalid("format ends before the conversion character".to_string()))?;
        (format.conversion, format.uppercase) = match conversion {
            'f' => (Conversion::Fixed, false),
            'F' => (Conversion::Fixed, true),
            'e' => (Conversion::Exponent, false),
            'E' => (Conversion::Exponent, true),
            'g' => (Conversion::General, false),
            'G' => (Conversion::General, true),
            other => {
                return Err(invalid(format!(
                    "unsupported conversion '{}', expected one of f F e E g G",
                    other
                )))
            }
        };
        pos += 1;

        let mut rest = chars[pos..].iter().peekable();
        while let Some(&c) = rest.next() {
            if c == '%' {
                if rest.peek() == Some(&&'%') {
                    rest.next();
                } else {
                    return Err(invalid("only one conversion specifier is allowed".to_string()));
                }
            }
            format.suffix.push(c);
        }

        Ok(format)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn format(&self, value: f64) -> String {
        let body = if value.is_nan() {
            "nan".to_string()
        } else if value.is_infinite() {
            "inf".to_string()
        } else {
            let magnitude = value.abs();
            match self.conversion {
                Conversion::Fixed => self.fixed(magnitude, self.precision.unwrap_or(6)),
                Conversion::Exponent => self.exponent(magnitude, self.precision.unwrap_or(6)),
                Conversion::General => self.general(magnitude),
            }
        };
        let body = if self.uppercase {
            body.to_uppercase()
        } else {
            body
        };

        // C keeps the sign bit of NaN as well: `-nan`
        let sign = if value.is_sign_negative() {
            "-"
        } else if self.plus_sign {
            "+"
        } else if self.space_sign {
            " "
        } else {
            ""
        };

        let len = sign.len() + body.len();
        let padding = self.width.saturating_sub(len);
        let mut out = String::with_capacity(self.prefix.len() + len + padding + self.suffix.len());
        out.push_str(&self.prefix);
        if self.left_align {
            out.push_str(sign);
            out.push_str(&body);
            out.extend(std::iter::repeat_n(' ', padding));
        } else if self.zero_pad && value.is_finite() {
            out.push_str(sign);
            out.extend(std::iter::repeat_n('0', padding));
            out.push_str(&body);
        } else {
            out.extend(std::iter::repeat_n(' ', padding));
            out.push_str(sign);
            out.push_str(&body);
        }
        out.push_str(&self.suffix);
        out
    }

    fn fixed(&self, magnitude: f64, precision: usize) -> String {
        let mut body = format!("{:.*}", precision, magnitude);
        if self.alternate && precision == 0 {
            body.push('.');
        }
        body
    }

    fn exponent(&self, magnitude: f64, precision: usize) -> String {
        let (mut mantissa, exponent) = split_exponent(magnitude, precision);
        if self.alternate && precision == 0 {
            mantissa.push('.');
        }
        join_exponent(&mantissa, exponent)
    }

    fn general(&self, magnitude: f64) -> String {
        let precision = match self.precision {
            Some(0) => 1,
            Some(p) => p,
            None => 6,
        };
        let (_, exponent) = split_exponent(magnitude, precision - 1);

        if exponent >= -4 && exponent < precision as i32 {
            let mut body = self.fixed(magnitude, (precision as i32 - 1 - exponent) as usize);
            if !self.alternate {
                strip_trailing_zeros(&mut body);
            }
            body
        } else {
            let (mut mantissa, exponent) = split_exponent(magnitude, precision - 1);
            if !self.alternate {
                strip_trailing_zeros(&mut mantissa);
            }
            join_exponent(&mantissa, exponent)
        }
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn read_number(chars: &[char], mut pos: usize) -> (Option<usize>, usize) {
    let mut value: Option<usize> = None;
    while let Some(digit) = chars.get(pos).and_then(|c| c.to_digit(10)) {
        value = Some(value.unwrap_or(0) * 10 + digit as usize);
        pos += 1;
    }
    (value, pos)
}

/// Mantissa digits and decimal exponent of `magnitude` rounded to `precision` decimals.
fn split_exponent(magnitude: f64, precision: usize) -> (String, i32) {
    let rendered = format!("{:.*e}", precision, magnitude);
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => (mantissa.to_string(), exponent.parse().unwrap_or(0)),
        None => (rendered, 0),
    }
}

fn join_exponent(mantissa: &str, exponent: i32) -> String {
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

fn strip_trailing_zeros(body: &mut String) {
    if body.contains('.') {
        let trimmed = body.trim_end_matches('0').trim_end_matches('.').len();
        body.truncate(trimmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(spec: &str, value: f64) -> String {
        NumberFormat::parse(spec).unwrap().format(value)
    }

    #[test]
    fn test_fixed() {
        assert_eq!(fmt("%6.2f", 3.0), "  3.00");
        assert_eq!(fmt("%f", 3.0), "3.000000");
        assert_eq!(fmt("%.0f", 2.4), "2");
        assert_eq!(fmt("%#.0f", 3.0), "3.");
        assert_eq!(fmt("%lf", 0.5), "0.500000");
        assert_eq!(fmt("%.2f", -0.001), "-0.00");
    }

    #[test]
    fn test_flags_and_padding() {
        assert_eq!(fmt("%-8.3f", 1.5), "1.500   ");
        assert_eq!(fmt("%+.1f", 2.0), "+2.0");
        assert_eq!(fmt("% .1f", 2.0), " 2.0");
        assert_eq!(fmt("%08.3f", -3.14159), "-003.142");
        assert_eq!(fmt("%05.1f", f64::INFINITY), "  inf");
        assert_eq!(fmt("%F", f64::NAN), "NAN");
    }

    #[test]
    fn test_nan_sign() {
        assert_eq!(fmt("%f", f64::NAN), "nan");
        assert_eq!(fmt("%f", -f64::NAN), "-nan");
        assert_eq!(fmt("%+.2e", f64::NAN), "+nan");
        assert_eq!(fmt("%6f", -f64::NAN), "  -nan");
    }

    #[test]
    fn test_exponent() {
        assert_eq!(fmt("%e", 1234.5), "1.234500e+03");
        assert_eq!(fmt("%.3e", 0.0), "0.000e+00");
        assert_eq!(fmt("%.2E", 0.000123), "1.23E-04");
        assert_eq!(fmt("%.1e", 1.0e120), "1.0e+120");
    }

    #[test]
    fn test_general() {
        assert_eq!(fmt("%g", 0.0001), "0.0001");
        assert_eq!(fmt("%g", 0.00001), "1e-05");
        assert_eq!(fmt("%g", 123456.0), "123456");
        assert_eq!(fmt("%g", 1234567.0), "1.23457e+06");
        assert_eq!(fmt("%g", 25.0), "25");
        assert_eq!(fmt("%.3g", 3.14159), "3.14");
        assert_eq!(fmt("%#g", 25.0), "25.0000");
        assert_eq!(fmt("%g", 0.0), "0");
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(fmt("[%4.1f]", 1.0), "[ 1.0]");
        assert_eq!(fmt("%.0f%%", 50.0), "50%");
        assert_eq!(NumberFormat::parse("%8.4f").unwrap().to_string(), "%8.4f");
    }

    #[test]
    fn test_invalid_formats() {
        for bad in ["", "6.2f", "%", "%6.2d", "%f %f", "%s"] {
            assert!(
                matches!(
                    NumberFormat::parse(bad),
                    Err(DimredError::InvalidConfiguration { .. })
                ),
                "{:?} should be rejected",
                bad
            );
        }
    }
}

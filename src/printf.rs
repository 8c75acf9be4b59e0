//! Number renderings that match what the supply firmware and C tooling expect.

use core::fmt::{self, Write};

/// Renders like C's `%.4e`: four fractional digits and an exponent of at least two digits.
pub(crate) struct Scientific(pub f64);

impl fmt::Display for Scientific {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rendered: heapless::String<32> = heapless::String::new();
        write!(rendered, "{:.4e}", self.0)?;
        match rendered.split_once('e') {
            Some((mantissa, exponent)) => {
                let exponent = exponent.parse().map_err(|_| fmt::Error)?;
                write_exponent(f, mantissa, exponent)
            }
            // inf and NaN carry no exponent.
            None => f.write_str(&rendered),
        }
    }
}

/// Renders like C's `%.<significant>g`.
///
/// Rounds to `significant` digits, picks fixed or exponent form from the rounded exponent and
/// drops trailing fractional zeros.
pub(crate) struct General {
    pub value: f64,
    pub significant: usize,
}

impl General {
    /// `%g`, six significant digits.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            significant: 6,
        }
    }

    pub fn with_significant(value: f64, significant: usize) -> Self {
        Self { value, significant }
    }
}

impl fmt::Display for General {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value;
        if value.is_nan() {
            return f.write_str("nan");
        }
        if value.is_infinite() {
            return f.write_str(if value < 0.0 { "-inf" } else { "inf" });
        }
        if value == 0.0 {
            return f.write_str(if value.is_sign_negative() { "-0" } else { "0" });
        }

        let significant = self.significant.max(1);
        let mut scientific: heapless::String<48> = heapless::String::new();
        write!(scientific, "{value:.prec$e}", prec = significant - 1)?;
        let (mantissa, exponent) = scientific.split_once('e').ok_or(fmt::Error)?;
        let exponent: i32 = exponent.parse().map_err(|_| fmt::Error)?;

        if exponent >= -4 && exponent < significant as i32 {
            let mut fixed: heapless::String<64> = heapless::String::new();
            let prec = (significant as i32 - 1 - exponent) as usize;
            write!(fixed, "{value:.prec$}")?;
            f.write_str(strip_fraction_zeros(&fixed))
        } else {
            write_exponent(f, strip_fraction_zeros(mantissa), exponent)
        }
    }
}

fn write_exponent(f: &mut fmt::Formatter<'_>, mantissa: &str, exponent: i32) -> fmt::Result {
    let sign = if exponent < 0 { '-' } else { '+' };
    write!(f, "{mantissa}e{sign}{:02}", exponent.unsigned_abs())
}

fn strip_fraction_zeros(rendered: &str) -> &str {
    if rendered.contains('.') {
        rendered.trim_end_matches('0').trim_end_matches('.')
    } else {
        rendered
    }
}

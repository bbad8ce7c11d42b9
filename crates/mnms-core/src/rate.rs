//! Link-rate normalisation

use crate::error::DecodeError;

/// Convert a RouterOS link rate (`1Gbps`, `2.5Gbps`, `100Mbps`) to Mbps.
///
/// Gigabit rates keep their fractional part; everything else is read as a
/// whole number of Mbps. Fails only when the string has no leading number.
pub fn parse_rate_mbps(rate: &str) -> Result<f64, DecodeError> {
    let trimmed = rate.trim_start();
    if trimmed.to_ascii_lowercase().contains("gbps") {
        let gbps = decimal_prefix(trimmed)
            .ok_or_else(|| DecodeError::UnparsableRate(rate.to_string()))?;
        Ok(gbps * 1000.0)
    } else {
        integer_prefix(trimmed).ok_or_else(|| DecodeError::UnparsableRate(rate.to_string()))
    }
}

/// Length of an optional sign followed by ASCII digits
fn digits_end(s: &str) -> (usize, usize) {
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+') | Some(b'-')));
    let digits = bytes[sign..].iter().take_while(|b| b.is_ascii_digit()).count();
    (sign, sign + digits)
}

fn integer_prefix(s: &str) -> Option<f64> {
    let (sign, end) = digits_end(s);
    if end == sign {
        return None;
    }
    // Sign and digits only, so this never fails whatever the length
    s[..end].parse::<f64>().ok()
}

fn decimal_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let (sign, mut end) = digits_end(s);
    let mut has_digits = end > sign;
    if bytes.get(end) == Some(&b'.') {
        let frac = bytes[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if frac > 0 || has_digits {
            end += 1 + frac;
            has_digits |= frac > 0;
        }
    }
    if !has_digits {
        return None;
    }
    s[..end].trim_end_matches('.').parse::<f64>().ok()
}

//! Typed values inferred from untyped RouterOS tokens

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single field value as reported by the device CLI.
///
/// RouterOS prints everything as bare text, so the type is inferred from the
/// token itself. Serialises as a plain JSON bool, number, string or `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoercedValue {
    Bool(bool),
    Number(f64),
    Text(String),
    /// Empty or missing token
    #[default]
    Absent,
}

impl CoercedValue {
    /// Classify a raw token. Never fails; anything that is not a boolean or
    /// a finite number falls back to the trimmed text.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Absent;
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }

        // `f64::from_str` also accepts "inf" and "NaN", which are text here
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::Text(trimmed.to_string()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form of any present value, e.g. for use as a map key.
    /// Whole numbers are rendered without a fractional part.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Absent => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CoercedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Absent => Ok(()),
        }
    }
}

impl From<&str> for CoercedValue {
    fn from(raw: &str) -> Self {
        Self::coerce(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace_are_absent() {
        assert_eq!(CoercedValue::coerce(""), CoercedValue::Absent);
        assert_eq!(CoercedValue::coerce("   \t"), CoercedValue::Absent);
    }

    #[test]
    fn test_booleans_case_insensitive() {
        assert_eq!(CoercedValue::coerce("true"), CoercedValue::Bool(true));
        assert_eq!(CoercedValue::coerce(" FALSE "), CoercedValue::Bool(false));
        assert_eq!(CoercedValue::coerce("True"), CoercedValue::Bool(true));
        assert_eq!(
            CoercedValue::coerce("truely"),
            CoercedValue::Text("truely".to_string())
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(CoercedValue::coerce("27.3"), CoercedValue::Number(27.3));
        assert_eq!(CoercedValue::coerce(" 55 "), CoercedValue::Number(55.0));
        assert_eq!(CoercedValue::coerce("-4"), CoercedValue::Number(-4.0));
    }

    #[test]
    fn test_non_finite_and_mixed_tokens_stay_text() {
        assert_eq!(CoercedValue::coerce("inf"), CoercedValue::Text("inf".to_string()));
        assert_eq!(CoercedValue::coerce("NaN"), CoercedValue::Text("NaN".to_string()));
        assert_eq!(
            CoercedValue::coerce("1Gbps"),
            CoercedValue::Text("1Gbps".to_string())
        );
        assert_eq!(
            CoercedValue::coerce("1w2d03:04:05"),
            CoercedValue::Text("1w2d03:04:05".to_string())
        );
        assert_eq!(CoercedValue::coerce("*1"), CoercedValue::Text("*1".to_string()));
    }

    #[test]
    fn test_coercion_is_total() {
        let samples = [
            "", " ", "x", "=", ";", ".id", "\u{0}", "1.2.3", "--1", "1e400", "ü", "00:00:05",
        ];
        for sample in samples {
            // Exactly one variant, no panic
            let _ = CoercedValue::coerce(sample);
        }
        assert_eq!(
            CoercedValue::coerce("1e400"),
            CoercedValue::Text("1e400".to_string())
        );
    }

    #[test]
    fn test_display_and_serialize() {
        assert_eq!(CoercedValue::Number(7.0).to_string(), "7");
        assert_eq!(CoercedValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CoercedValue::Absent.to_text(), None);

        let json = serde_json::to_string(&vec![
            CoercedValue::Bool(true),
            CoercedValue::Number(1.5),
            CoercedValue::Text("ether1".to_string()),
            CoercedValue::Absent,
        ])
        .unwrap();
        assert_eq!(json, r#"[true,1.5,"ether1",null]"#);
    }
}

//! Lenient deserializers for rows served from spreadsheet-backed storage.
//!
//! The backend stores conversations and messages as sheet rows, so a number
//! may come back as `3` or `"3"`, a boolean as `true` or `"TRUE"`, and an
//! unset timestamp as `""`.

use serde::{Deserialize, Deserializer, de::Error as _};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

/// A string that may have been stored as a number.
pub(crate) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(Scalar::into_text)
}

/// An optional string where `null`, a missing field and `""` all mean `None`.
pub(crate) fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value
        .map(Scalar::into_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

pub(crate) fn bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Scalar::Bool(b)) => Ok(b),
        Some(Scalar::Int(i)) => Ok(i != 0),
        Some(Scalar::Float(f)) => Ok(f != 0.0),
        Some(Scalar::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(D::Error::custom(format!("invalid boolean: {other:?}"))),
        },
    }
}

pub(crate) fn f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_f64(deserializer)?.unwrap_or(0.0))
}

pub(crate) fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Int(i)) => Ok(Some(i as f64)),
        Some(Scalar::Float(f)) => Ok(Some(f)),
        Some(Scalar::Bool(_)) => Err(D::Error::custom("expected a number, got a boolean")),
        Some(Scalar::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid number: {s:?}")))
        }
    }
}

pub(crate) fn u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = opt_f64(deserializer)?.unwrap_or(0.0);
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(D::Error::custom(format!("invalid count: {value}")));
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "super::bool")]
        flag: bool,
        #[serde(default, deserialize_with = "super::u32")]
        count: u32,
        #[serde(default, deserialize_with = "super::opt_string")]
        ended_at: Option<String>,
        #[serde(default, deserialize_with = "super::opt_f64")]
        score: Option<f64>,
    }

    fn row(value: serde_json::Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sheet_style_values() {
        let r = row(json!({"flag": "TRUE", "count": "12", "ended_at": "", "score": "0.75"}));
        assert!(r.flag);
        assert_eq!(r.count, 12);
        assert_eq!(r.ended_at, None);
        assert_eq!(r.score, Some(0.75));
    }

    #[test]
    fn test_native_json_values() {
        let r = row(json!({"flag": false, "count": 4, "ended_at": "2025-01-02T03:04:05", "score": 1}));
        assert!(!r.flag);
        assert_eq!(r.count, 4);
        assert_eq!(r.ended_at.as_deref(), Some("2025-01-02T03:04:05"));
        assert_eq!(r.score, Some(1.0));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let r = row(json!({}));
        assert!(!r.flag);
        assert_eq!(r.count, 0);
        assert_eq!(r.ended_at, None);
        assert_eq!(r.score, None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_value::<Row>(json!({"flag": "maybe"})).is_err());
        assert!(serde_json::from_value::<Row>(json!({"count": "-3"})).is_err());
        assert!(serde_json::from_value::<Row>(json!({"score": "high"})).is_err());
    }
}

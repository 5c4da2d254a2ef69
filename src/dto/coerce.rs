//! Boundary normalization for loosely-typed payloads.
//!
//! Clients submit ids and quantities as JSON numbers or as numeric strings
//! (urlencoded forms arrive entirely as strings). Everything is coerced to
//! `i32` here, once, before any business logic runs; values that do not
//! normalize cleanly are rejected at deserialization time.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Float(f64),
    Text(String),
}

impl NumberOrString {
    fn to_i32<E: serde::de::Error>(&self) -> Result<i32, E> {
        match self {
            NumberOrString::Number(n) => {
                i32::try_from(*n).map_err(|_| E::custom("number out of range"))
            }
            NumberOrString::Float(f) if f.fract() == 0.0 && (i32::MIN as f64..=i32::MAX as f64).contains(f) => {
                Ok(*f as i32)
            }
            NumberOrString::Float(f) => Err(E::custom(format!("invalid integer: {f}"))),
            NumberOrString::Text(s) => s
                .trim()
                .parse::<i32>()
                .map_err(|_| E::custom(format!("invalid integer: {s:?}"))),
        }
    }
}

/// Required integer field: number or numeric string.
pub fn int_from_any<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?.to_i32()
}

/// Optional integer field: absent or null means "not supplied", anything
/// present must normalize to an integer.
pub fn opt_int_from_any<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => value.to_i32().map(Some),
    }
}

/// Lenient optional integer: anything that is not a positive integer
/// (missing, null, empty, garbage, zero or negative) degrades to `None`.
/// Used only for the create-sale customer reference, where an unusable
/// id means a walk-in sale rather than an error.
pub fn lenient_opt_int<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.to_i32::<D::Error>().ok())
        .filter(|n| *n > 0))
}

/// Nullable optional integer for partial updates: absent means "leave as
/// is", explicit null or empty string means "clear", a value must parse.
pub fn opt_nullable_int<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(Some(None)),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(Some(None)),
        Some(value) => value.to_i32().map(|n| Some(Some(n))),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Strict {
        #[serde(deserialize_with = "super::int_from_any")]
        value: i32,
    }

    #[derive(Deserialize)]
    struct Lenient {
        #[serde(default, deserialize_with = "super::lenient_opt_int")]
        value: Option<i32>,
    }

    #[derive(Deserialize)]
    struct Nullable {
        #[serde(default, deserialize_with = "super::opt_nullable_int")]
        value: Option<Option<i32>>,
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        let n: Strict = serde_json::from_str(r#"{"value": 7}"#).unwrap();
        assert_eq!(n.value, 7);
        let s: Strict = serde_json::from_str(r#"{"value": " 7 "}"#).unwrap();
        assert_eq!(s.value, 7);
    }

    #[test]
    fn rejects_garbage_in_strict_fields() {
        assert!(serde_json::from_str::<Strict>(r#"{"value": "seven"}"#).is_err());
        assert!(serde_json::from_str::<Strict>(r#"{"value": 99999999999}"#).is_err());
        assert!(serde_json::from_str::<Strict>(r#"{"value": 2.5}"#).is_err());
    }

    #[test]
    fn lenient_degrades_to_none() {
        for payload in [
            r#"{}"#,
            r#"{"value": null}"#,
            r#"{"value": ""}"#,
            r#"{"value": "abc"}"#,
            r#"{"value": -3}"#,
            r#"{"value": 0}"#,
        ] {
            let parsed: Lenient = serde_json::from_str(payload).unwrap();
            assert_eq!(parsed.value, None, "payload: {payload}");
        }
        let parsed: Lenient = serde_json::from_str(r#"{"value": "12"}"#).unwrap();
        assert_eq!(parsed.value, Some(12));
    }

    #[test]
    fn nullable_distinguishes_absent_null_and_value() {
        let absent: Nullable = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(absent.value, None);
        let null: Nullable = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(null.value, Some(None));
        let cleared: Nullable = serde_json::from_str(r#"{"value": ""}"#).unwrap();
        assert_eq!(cleared.value, Some(None));
        let set: Nullable = serde_json::from_str(r#"{"value": "4"}"#).unwrap();
        assert_eq!(set.value, Some(Some(4)));
    }
}

//! Serde helpers for the wire format.
//!
//! Binary fields travel as standard padded base64 strings. KeePassXC encodes
//! booleans and integers as strings in some fields (`"success": "true"`,
//! `"errorCode": "1"`), so those are read leniently and written as strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::{self, Deserialize, Deserializer};
use serde::Serializer;

/// Base64 byte fields (`Vec<u8>` or `[u8; N]`).
pub mod base64_bytes {
    use super::*;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(value.as_ref()))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: TryFrom<Vec<u8>>,
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(de::Error::custom)?;
        let len = bytes.len();
        T::try_from(bytes).map_err(|_| de::Error::invalid_length(len, &"a fixed-size byte string"))
    }
}

/// Optional base64 byte fields. Pair with `#[serde(default)]`.
pub mod base64_opt {
    use super::*;

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom))
            .transpose()
    }
}

/// A scalar that may arrive as a JSON bool, number or string.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Optional boolean written as `"true"` / `"false"`.
pub mod string_bool_opt {
    use super::*;

    pub fn serialize<S>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(true) => serializer.serialize_some("true"),
            Some(false) => serializer.serialize_some("false"),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Loose>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Loose::Bool(b)) => Ok(Some(b)),
            Some(Loose::Int(i)) => Ok(Some(i != 0)),
            Some(Loose::Str(s)) => match s.as_str() {
                "true" => Ok(Some(true)),
                "false" | "" => Ok(Some(false)),
                other => Err(de::Error::invalid_value(
                    de::Unexpected::Str(other),
                    &"\"true\" or \"false\"",
                )),
            },
        }
    }
}

/// Optional integer written as a decimal string.
pub mod string_int_opt {
    use super::*;

    pub fn serialize<S>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(i) => serializer.serialize_some(&i.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Loose>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Loose::Int(i)) => Ok(Some(i)),
            Some(Loose::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&s), &"an integer")),
            Some(Loose::Bool(b)) => Err(de::Error::invalid_type(
                de::Unexpected::Bool(b),
                &"an integer",
            )),
        }
    }
}

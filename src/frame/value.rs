//! Typed frame payloads.
//!
//! Each payload is tagged in the header with a [`PayloadType`]. Numbers travel
//! as their shortest round-tripping decimal text, objects as UTF-8 JSON.

use std::{fmt, str::FromStr};

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as Json;

use crate::error::{Error, ErrorKind};

/// Payload type tag stored in the frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PayloadType {
    Null = 0,
    String = 1,
    Number = 2,
    Buffer = 3,
    Object = 4,
}

impl PayloadType {
    #[must_use]
    pub const fn tag(self) -> u8 { self as u8 }
}

impl TryFrom<u8> for PayloadType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Null),
            1 => Ok(Self::String),
            2 => Ok(Self::Number),
            3 => Ok(Self::Buffer),
            4 => Ok(Self::Object),
            other => Err(other),
        }
    }
}

/// Numeric payload preserving the integer/float distinction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "integers beyond 2^53 lose precision like any JSON number"
    )]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(n) => n as f64,
            Self::Float(f) => f,
        }
    }

    #[must_use]
    pub const fn as_i64(self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(n),
            Self::Float(_) => None,
        }
    }

    fn is_truthy(self) -> bool {
        match self {
            Self::Integer(n) => n != 0,
            Self::Float(f) => f != 0.0 && !f.is_nan(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            // `Debug` keeps the fractional part (`919.0`) so floats decode as floats.
            Self::Float(x) => write!(f, "{x:?}"),
        }
    }
}

impl FromStr for Number {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = text.parse::<i64>()
            && n.to_string() == text
        {
            return Ok(Self::Integer(n));
        }
        text.parse::<f64>()
            .map(Self::Float)
            .map_err(|_| Error::new(ErrorKind::Decode, format!("Invalid number: {text}")))
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self { Self::Integer(n) }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self { Self::Float(f) }
}

/// Application value carried by a frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Number(Number),
    Buffer(Bytes),
    /// Any JSON document.
    Object(Json),
}

impl Value {
    #[must_use]
    pub const fn payload_type(&self) -> PayloadType {
        match self {
            Self::Null => PayloadType::Null,
            Self::String(_) => PayloadType::String,
            Self::Number(_) => PayloadType::Number,
            Self::Buffer(_) => PayloadType::Buffer,
            Self::Object(_) => PayloadType::Object,
        }
    }

    /// Encode into a payload type tag and payload bytes.
    ///
    /// # Errors
    ///
    /// Returns an encode error when an object cannot be serialized.
    pub fn encode(&self) -> Result<(PayloadType, Bytes), Error> {
        let payload = match self {
            Self::Null => Bytes::new(),
            Self::String(s) => Bytes::copy_from_slice(s.as_bytes()),
            Self::Number(n) => Bytes::from(n.to_string()),
            Self::Buffer(b) => b.clone(),
            Self::Object(json) => serde_json::to_vec(json)
                .map(Bytes::from)
                .map_err(|e| Error::new(ErrorKind::Encode, e.to_string()))?,
        };
        Ok((self.payload_type(), payload))
    }

    /// Decode a payload according to its raw type tag.
    ///
    /// # Errors
    ///
    /// Returns an error of kind [`ErrorKind::Decode`] for unknown tags,
    /// invalid UTF-8, unparsable numbers or malformed JSON. The connection
    /// re-labels it as a remote decode error when the payload came from a
    /// peer's request.
    pub fn decode(payload_type: u8, payload: Bytes) -> Result<Self, Error> {
        let kind = PayloadType::try_from(payload_type)
            .map_err(|_| Error::new(ErrorKind::Decode, "Unrecognised type"))?;
        match kind {
            PayloadType::Null => Ok(Self::Null),
            PayloadType::Buffer => Ok(Self::Buffer(payload)),
            PayloadType::String => String::from_utf8(payload.to_vec())
                .map(Self::String)
                .map_err(|e| Error::new(ErrorKind::Decode, e.to_string())),
            PayloadType::Number => std::str::from_utf8(&payload)
                .map_err(|e| Error::new(ErrorKind::Decode, e.to_string()))?
                .parse()
                .map(Self::Number),
            PayloadType::Object => serde_json::from_slice(&payload)
                .map(Self::Object)
                .map_err(|e| Error::new(ErrorKind::Decode, e.to_string())),
        }
    }

    /// Build a value from any serializable type.
    ///
    /// Scalars map to their own variants; maps, sequences and booleans
    /// become [`Value::Object`].
    ///
    /// # Errors
    ///
    /// Returns an encode error when `value` is not representable as JSON.
    ///
    /// # Examples
    ///
    /// ```
    /// use ackframe::Value;
    ///
    /// let value = Value::serialize(&vec![1, 2]).expect("serialize");
    /// assert_eq!(value, Value::Object(serde_json::json!([1, 2])));
    /// assert_eq!(Value::serialize("hi").expect("serialize"), Value::from("hi"));
    /// ```
    pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Self::from_json)
            .map_err(|e| Error::new(ErrorKind::Encode, e.to_string()))
    }

    /// Deserialize the value into `T` through its JSON form.
    ///
    /// # Errors
    ///
    /// Returns a decode error when the value holds a buffer or does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let json = self
            .to_json()
            .map_err(|e| Error::new(ErrorKind::Decode, e.message()))?;
        serde_json::from_value(json).map_err(|e| Error::new(ErrorKind::Decode, e.to_string()))
    }

    /// Normalize a JSON document into the matching variant.
    #[must_use]
    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::String(s) => Self::String(s),
            Json::Number(n) => Self::Number(match n.as_i64() {
                Some(i) => Number::Integer(i),
                None => Number::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            other => Self::Object(other),
        }
    }

    /// Convert into JSON for embedding in a reply object.
    ///
    /// # Errors
    ///
    /// Returns an encode error for buffers and non-finite floats, neither of
    /// which has a JSON form.
    pub fn to_json(&self) -> Result<Json, Error> {
        match self {
            Self::Null => Ok(Json::Null),
            Self::String(s) => Ok(Json::String(s.clone())),
            Self::Number(Number::Integer(n)) => Ok(Json::from(*n)),
            Self::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| Error::new(ErrorKind::Encode, format!("{f} is not valid JSON"))),
            Self::Buffer(_) => Err(Error::new(ErrorKind::Encode, "Cannot send buffer in reply")),
            Self::Object(json) => Ok(json.clone()),
        }
    }

    /// Loose truthiness: null, empty strings, zero, `NaN` and `false` are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::String(s) => !s.is_empty(),
            Self::Number(n) => n.is_truthy(),
            Self::Buffer(_) => true,
            Self::Object(json) => match json {
                Json::Null => false,
                Json::Bool(b) => *b,
                Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                Json::String(s) => !s.is_empty(),
                Json::Array(_) | Json::Object(_) => true,
            },
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool { matches!(self, Self::Null) }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<Number> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Buffer(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_json(&self) -> Option<&Json> {
        match self {
            Self::Object(json) => Some(json),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::String(s.to_owned()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Self::String(s) }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self { Self::Number(Number::Integer(n)) }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self { Self::Number(Number::Integer(n.into())) }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self { Self::Number(Number::Integer(n.into())) }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self { Self::Number(Number::Float(f)) }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self { Self::Number(n) }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self { Self::Buffer(b) }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self { Self::Buffer(Bytes::from(b)) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Self::Object(Json::Bool(b)) }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self { Self::Object(json) }
}

impl From<()> for Value {
    fn from((): ()) -> Self { Self::Null }
}

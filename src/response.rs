//! Result of a successfully acknowledged send.

use crate::{
    error::Error,
    frame::{Meta, Value},
    reply::Tag,
};

/// Value carried by an ACK together with the ACK frame's metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub value: Value,
    pub meta: Meta,
}

impl Response {
    #[must_use]
    pub const fn new(value: Value, meta: Meta) -> Self { Self { value, meta } }

    #[must_use]
    pub fn into_value(self) -> Value { self.value }

    /// Look up one tagged reply in an aggregated ACK.
    ///
    /// Entries serialized from errors come back as `Err`. Returns `None` when
    /// the ACK carried no object or the tag is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use ackframe::{Meta, Response, Value};
    /// use serde_json::json;
    ///
    /// let meta = Meta { sequence: 0, timestamp: None, length: 24 };
    /// let response = Response::new(Value::from(json!({"0": 1, "b": "x"})), meta);
    /// assert_eq!(response.get(0u32), Some(Ok(Value::from(1))));
    /// assert_eq!(response.get("b"), Some(Ok(Value::from("x"))));
    /// assert_eq!(response.get("c"), None);
    /// ```
    #[must_use]
    pub fn get(&self, tag: impl Into<Tag>) -> Option<Result<Value, Error>> {
        let entry = self.value.as_json()?.get(tag.into().to_string())?;
        Some(match Error::from_json(entry) {
            Some(err) => Err(err),
            None => Ok(Value::from_json(entry.clone())),
        })
    }
}

//! Reply aggregation for inbound requests.
//!
//! A data handler receives a [`Replies`] collector and may attach any number
//! of values, errors or deferred computations to the request, each under a
//! [`Tag`]. Once every deferred outcome has settled the collector is merged
//! into a single ACK object, or into a NAK when the reply cannot be sent or
//! the `nak` tag holds a truthy value.

use std::{fmt, future::Future};

use futures::future::{BoxFuture, FutureExt, join_all};
use serde_json::{Map, Value as Json};

use crate::{
    error::{Error, ErrorKind},
    frame::Value,
};

/// Tag whose truthy outcome turns the reply into a NAK.
pub const NAK_TAG: &str = "nak";

/// Key of one reply inside the merged ACK object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    Index(u32),
    Name(String),
}

impl Tag {
    fn is_nak(&self) -> bool { matches!(self, Self::Name(name) if name == NAK_TAG) }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<u32> for Tag {
    fn from(index: u32) -> Self { Self::Index(index) }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self { Self::Name(name.to_owned()) }
}

impl From<String> for Tag {
    fn from(name: String) -> Self { Self::Name(name) }
}

/// Computation whose result is awaited before the reply is sent.
pub type Deferred = BoxFuture<'static, Result<Value, Error>>;

/// One reply offered by a handler.
pub enum Outcome {
    Value(Value),
    Error(Error),
    Deferred(Deferred),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self { Self::Value(value) }
}

impl From<Error> for Outcome {
    fn from(err: Error) -> Self { Self::Error(err) }
}

impl From<Result<Value, Error>> for Outcome {
    fn from(result: Result<Value, Error>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(err) => Self::Error(err),
        }
    }
}

impl Outcome {
    async fn settle(self) -> Result<Value, Error> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Error(err) => Err(err),
            Self::Deferred(fut) => fut.await,
        }
    }
}

/// Final form of an aggregated reply.
#[derive(Clone, Debug, PartialEq)]
pub enum Settled {
    Ack(Value),
    Nak(Error),
}

/// Collector handed to a data handler for one inbound request.
///
/// # Examples
///
/// ```
/// use ackframe::{Error, ErrorKind, Replies, Settled, Value};
/// use serde_json::json;
///
/// # futures::executor::block_on(async {
/// let mut replies = Replies::new();
/// replies.reply(1);
/// replies.defer_tagged("later", async { Ok(Value::from("done")) });
/// replies.add(Some("bad".into()), Error::new(ErrorKind::RemoteRuntime, "no"));
///
/// let Settled::Ack(Value::Object(merged)) = replies.settle().await else {
///     panic!("expected an ack");
/// };
/// assert_eq!(merged["0"], json!(1));
/// assert_eq!(merged["later"], json!("done"));
/// assert_eq!(merged["bad"]["isError"], json!(true));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct Replies {
    entries: Vec<(Tag, Outcome)>,
    next_index: u32,
}

impl Replies {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Attach `outcome` under `tag`, or under the next free index when
    /// `tag` is `None`. A repeated tag replaces the earlier outcome.
    pub fn add(&mut self, tag: Option<Tag>, outcome: impl Into<Outcome>) {
        let tag = tag.unwrap_or_else(|| {
            let index = self.next_index;
            self.next_index += 1;
            Tag::Index(index)
        });
        let outcome = outcome.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == tag) {
            Some(entry) => entry.1 = outcome,
            None => self.entries.push((tag, outcome)),
        }
    }

    pub fn reply(&mut self, value: impl Into<Value>) { self.add(None, value.into()); }

    pub fn reply_tagged(&mut self, tag: impl Into<Tag>, value: impl Into<Value>) {
        self.add(Some(tag.into()), value.into());
    }

    pub fn defer<F>(&mut self, fut: F)
    where
        F: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        self.add(None, Outcome::Deferred(fut.boxed()));
    }

    pub fn defer_tagged<F>(&mut self, tag: impl Into<Tag>, fut: F)
    where
        F: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        self.add(Some(tag.into()), Outcome::Deferred(fut.boxed()));
    }

    /// Reject the request with `err`.
    pub fn nak(&mut self, err: Error) { self.add(Some(Tag::from(NAK_TAG)), err); }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Await every outcome and merge the results.
    ///
    /// All deferred outcomes run to completion even when one fails.
    pub async fn settle(self) -> Settled {
        if self.entries.is_empty() {
            return Settled::Ack(Value::Null);
        }
        let results = join_all(
            self.entries
                .into_iter()
                .map(|(tag, outcome)| async move { (tag, outcome.settle().await) }),
        )
        .await;
        merge(results)
    }
}

fn merge(results: Vec<(Tag, Result<Value, Error>)>) -> Settled {
    if results
        .iter()
        .any(|(_, result)| matches!(result, Ok(Value::Buffer(_))))
    {
        return Settled::Nak(Error::new(
            ErrorKind::RemoteEncode,
            "Cannot send buffer in reply",
        ));
    }

    // A rejection wins over any sibling that fails to encode.
    let nak = results
        .iter()
        .find(|(tag, _)| tag.is_nak())
        .and_then(|(_, result)| match result {
            Err(err) => Some(err.clone()),
            Ok(value) if value.is_truthy() => Some(Error::new(ErrorKind::RemoteRuntime, "Nak")),
            Ok(_) => None,
        });
    if let Some(err) = nak {
        return Settled::Nak(err);
    }

    let mut merged = Map::with_capacity(results.len());
    for (tag, result) in results {
        let json = match result {
            Ok(value) => match value.to_json() {
                Ok(json) => json,
                Err(err) => {
                    return Settled::Nak(Error::new(ErrorKind::RemoteEncode, err.message()));
                }
            },
            Err(err) => err.to_json(),
        };
        merged.insert(tag.to_string(), json);
    }
    Settled::Ack(Value::Object(Json::Object(merged)))
}

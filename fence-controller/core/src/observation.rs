//! Traffic observations.
//!
//! Subscriptions emit an [`Event`] for a fenced service whenever new traffic
//! data is available. Each event carries the results of one or more metric
//! queries, keyed by the name of the query handler. Results use the shape of
//! the Prometheus query API:
//!
//! ```json
//! {"resultType": "vector", "result": [{"metric": {"destination_service": "a"}, "value": [1700000000.0, "12"]}]}
//! ```
//!
//! Only instant vectors contribute to a fence record's status; other result
//! types are ignored.

use crate::{MetricStatus, ResourceId};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt::{self, Write},
};

const METRIC_NAME_LABEL: &str = "__name__";

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub target: Target,
    pub payload: Payload,
}

/// The object an event was emitted for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A namespaced resource; the only kind that may carry a fence record.
    Resource(ResourceId),

    /// A cluster-scoped resource.
    Cluster(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Query results keyed by handler name.
    Queries(BTreeMap<String, QueryResult>),

    /// An unstructured payload.
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryResult {
    Vector(Vec<Sample>),
    Scalar(SamplePair),
    Matrix(Vec<SampleStream>),
    String(SamplePair),
}

/// A timestamp (in seconds) and a rendered value.
pub type SamplePair = (f64, String);

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub metric: LabelSet,
    pub value: SamplePair,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SampleStream {
    #[serde(default)]
    pub metric: LabelSet,
    pub values: Vec<SamplePair>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("target {0} is not a namespaced resource")]
    UnsupportedTarget(String),

    #[error("payload for {0} does not carry query results")]
    UnsupportedPayload(ResourceId),
}

// === impl Event ===

impl Event {
    pub fn new(target: ResourceId, queries: BTreeMap<String, QueryResult>) -> Self {
        Self {
            target: Target::Resource(target),
            payload: Payload::Queries(queries),
        }
    }

    /// Validates the event and reduces its payload to a fence record status.
    pub fn into_status(self) -> Result<(ResourceId, MetricStatus), MalformedEvent> {
        let id = match self.target {
            Target::Resource(id) => id,
            Target::Cluster(name) => return Err(MalformedEvent::UnsupportedTarget(name)),
        };
        let queries = match self.payload {
            Payload::Queries(queries) => queries,
            Payload::Text(_) => return Err(MalformedEvent::UnsupportedPayload(id)),
        };

        let mut status = MetricStatus::new();
        for result in queries.values() {
            result.fold_into(&mut status);
        }
        Ok((id, status))
    }
}

// === impl QueryResult ===

impl QueryResult {
    /// Records the latest value of each vector sample, keyed by its rendered
    /// label set.
    pub fn fold_into(&self, status: &mut MetricStatus) {
        match self {
            Self::Vector(samples) => {
                for Sample { metric, value } in samples {
                    status.insert(metric.to_string(), value.1.clone());
                }
            }
            Self::Scalar(_) | Self::Matrix(_) | Self::String(_) => {}
        }
    }
}

// === impl LabelSet ===

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Renders as `name{a="x", b="y"}`, or `{}` when there are no labels at all.
impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.0.get(METRIC_NAME_LABEL);
        let mut labels = self
            .0
            .iter()
            .filter(|(k, _)| *k != METRIC_NAME_LABEL)
            .peekable();

        if labels.peek().is_none() {
            return match name {
                Some(name) => f.write_str(name),
                None => f.write_str("{}"),
            };
        }

        if let Some(name) = name {
            f.write_str(name)?;
        }
        f.write_str("{")?;
        for (i, (k, v)) in labels.enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={}", Quoted(v))?;
        }
        f.write_str("}")
    }
}

/// Quotes a label value the way Prometheus clients print label sets:
/// double-quoted, with C-style escapes and hex escapes for other control
/// characters.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\x07' => f.write_str("\\a")?,
                '\x08' => f.write_str("\\b")?,
                '\x0c' => f.write_str("\\f")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                '\x0b' => f.write_str("\\v")?,
                c if c.is_ascii_control() => write!(f, "\\x{:02x}", c as u32)?,
                c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
                c => f.write_char(c)?,
            }
        }
        f.write_char('"')
    }
}

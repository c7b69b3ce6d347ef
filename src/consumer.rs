// Stream consumer records
// Shape of one entry of the management API `/stream/consumers` listing.
// Every field is optional and a mistyped field reads as absent;
// defaulting rules live on the accessors.
//
// Numan Thabit 2025 Nov

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConsumerRecord {
    /// Whether this is the serving consumer of its single-active-consumer group
    #[serde(default, deserialize_with = "lenient")]
    pub active: Option<bool>,
    /// Cumulative number of messages consumed
    #[serde(default, deserialize_with = "lenient")]
    pub consumed: Option<f64>,
    /// Last read position in the stream
    #[serde(default, deserialize_with = "lenient")]
    pub offset: Option<f64>,
    /// Distance from the stream head
    #[serde(default, deserialize_with = "lenient")]
    pub offset_lag: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub properties: Option<ConsumerProperties>,
    #[serde(default, deserialize_with = "lenient")]
    pub queue: Option<QueueRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConsumerProperties {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(rename = "super-stream", default, deserialize_with = "lenient")]
    pub super_stream: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueueRef {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

/// A field of the wrong JSON type reads as absent instead of rejecting the record.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

impl ConsumerRecord {
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(false)
    }

    pub fn consumer_name(&self) -> &str {
        self.properties
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .unwrap_or_default()
    }

    pub fn super_stream(&self) -> &str {
        self.properties
            .as_ref()
            .and_then(|p| p.super_stream.as_deref())
            .unwrap_or_default()
    }

    pub fn stream(&self) -> &str {
        self.queue
            .as_ref()
            .and_then(|q| q.name.as_deref())
            .unwrap_or_default()
    }
}

/// Series identity of a consumer inside every labelled instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerLabels<'a> {
    pub superstream: &'a str,
    pub stream: &'a str,
    pub consumer_name: &'a str,
}

impl<'a> ConsumerLabels<'a> {
    pub const NAMES: [&'static str; 3] = ["superstream", "stream", "consumer_name"];

    pub fn from_record(record: &'a ConsumerRecord) -> Self {
        Self {
            superstream: record.super_stream(),
            stream: record.stream(),
            consumer_name: record.consumer_name(),
        }
    }

    /// Values in the order of [`ConsumerLabels::NAMES`].
    pub fn values(&self) -> [&'a str; 3] {
        [self.superstream, self.stream, self.consumer_name]
    }
}

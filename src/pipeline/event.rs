//! Trigger events
//!
//! Events arrive in the S3 notification shape
//! (`Records[].s3.bucket.name`, `Records[].s3.object.key`). Object keys in
//! those notifications are form-encoded: spaces become `+` and everything
//! else is percent-encoded.

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};

/// One object that triggered ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRecord {
    /// Bucket or container holding the object
    pub bucket: String,
    /// Object key as delivered, still encoded
    pub object_key: String,
}

impl TriggerRecord {
    pub fn new(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object_key: object_key.into(),
        }
    }

    /// The object key with form encoding removed
    pub fn decoded_key(&self) -> IngestResult<String> {
        decode_object_key(&self.object_key)
    }
}

/// An ordered batch of trigger records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub records: Vec<TriggerRecord>,
}

impl TriggerEvent {
    pub fn new(records: Vec<TriggerRecord>) -> Self {
        Self { records }
    }

    /// Event with a single record
    pub fn single(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self::new(vec![TriggerRecord::new(bucket, object_key)])
    }

    /// Parse an S3 event notification
    pub fn from_s3_json(json: &str) -> IngestResult<Self> {
        let notification: S3Notification =
            serde_json::from_str(json).map_err(|e| IngestError::InvalidEvent(e.to_string()))?;
        Ok(notification.into())
    }
}

/// Undo S3 key form encoding: `+` to space, then percent-decoding
pub fn decode_object_key(key: &str) -> IngestResult<String> {
    let spaced = key.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| IngestError::InvalidEvent(format!("Undecodable object key '{}': {}", key, e)))
}

#[derive(Debug, Deserialize)]
struct S3Notification {
    #[serde(rename = "Records", default)]
    records: Vec<S3Record>,
}

#[derive(Debug, Deserialize)]
struct S3Record {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
}

impl From<S3Notification> for TriggerEvent {
    fn from(notification: S3Notification) -> Self {
        Self::new(
            notification
                .records
                .into_iter()
                .map(|r| TriggerRecord::new(r.s3.bucket.name, r.s3.object.key))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFICATION: &str = r#"{
        "Records": [
            {
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "landing-zone", "arn": "arn:aws:s3:::landing-zone" },
                    "object": { "key": "raw/sales/order+lines/2024-03-07+%281%29.csv", "size": 1024 }
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_s3_notification() {
        let event = TriggerEvent::from_s3_json(NOTIFICATION).unwrap();
        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].bucket, "landing-zone");
        assert_eq!(
            event.records[0].decoded_key().unwrap(),
            "raw/sales/order lines/2024-03-07 (1).csv"
        );
    }

    #[test]
    fn test_literal_plus_is_percent_encoded() {
        assert_eq!(decode_object_key("a%2Bb/c+d").unwrap(), "a+b/c d");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            TriggerEvent::from_s3_json("{\"Records\": [{}]}"),
            Err(IngestError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_empty_notification() {
        let event = TriggerEvent::from_s3_json("{}").unwrap();
        assert!(event.records.is_empty());
    }
}

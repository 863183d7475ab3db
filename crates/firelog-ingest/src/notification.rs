//! Trigger input: object-created notifications naming archives to process.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A `(container, key)` pair locating one archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveRef {
    /// Container (bucket) name.
    pub container: String,
    /// Object key inside the container.
    pub key: String,
}

impl ArchiveRef {
    /// Creates an archive reference.
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ArchiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

#[derive(Debug, Deserialize)]
struct S3Event {
    #[serde(rename = "Records")]
    records: Option<Vec<S3EventRecord>>,
}

#[derive(Debug, Deserialize)]
struct S3EventRecord {
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

/// A parsed trigger notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNotification {
    archives: Vec<ArchiveRef>,
}

impl EventNotification {
    /// Parses an S3 `ObjectCreated` event document.
    ///
    /// Keys are taken verbatim; they are not URL-decoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNotification`] if the body is not JSON of the
    /// expected shape, has no records, or names an empty bucket or key.
    pub fn from_s3_event(body: &[u8]) -> Result<Self> {
        let event: S3Event =
            serde_json::from_slice(body).map_err(|e| Error::InvalidNotification {
                message: format!("not an S3 event: {e}"),
            })?;

        let records = event.records.unwrap_or_default();
        if records.is_empty() {
            return Err(Error::InvalidNotification {
                message: "event has no Records".into(),
            });
        }

        let archives = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let S3Entity { bucket, object } = record.s3;
                if bucket.name.is_empty() || object.key.is_empty() {
                    return Err(Error::InvalidNotification {
                        message: format!("record {i} has an empty bucket or key"),
                    });
                }
                Ok(ArchiveRef::new(bucket.name, object.key))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { archives })
    }

    /// Archives named by the event, in record order.
    #[must_use]
    pub fn archives(&self) -> &[ArchiveRef] {
        &self.archives
    }

    /// Consumes the notification, returning its archives.
    #[must_use]
    pub fn into_archives(self) -> Vec<ArchiveRef> {
        self.archives
    }
}

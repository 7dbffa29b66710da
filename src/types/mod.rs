//! Data types exchanged with the listing API.
pub mod args;
pub mod response;

use serde::Deserialize;

use crate::time::{deserialize_lenient, UtcTime};

pub use args::ListObjectsArgs;
pub use response::ListBucketResult;

/// One remote object as reported by a listing.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectRecord {
    pub key: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "ETag", default)]
    pub etag: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub last_modified: Option<UtcTime>,
}

impl ObjectRecord {
    pub fn new<K: Into<String>>(key: K, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            etag: None,
            last_modified: None,
        }
    }

    /// Zero-byte keys ending in `/` are folder placeholders created by some
    /// S3 consoles, not files.
    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CommonPrefix {
    pub prefix: String,
}

/// One page of a listing.
///
/// `continuation_token` is `Some` exactly when more pages remain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub records: Vec<ObjectRecord>,
    pub common_prefixes: Vec<String>,
    pub continuation_token: Option<String>,
}

impl ListingPage {
    pub fn is_last(&self) -> bool {
        self.continuation_token.is_none()
    }
}

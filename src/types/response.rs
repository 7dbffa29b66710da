use serde::Deserialize;

use super::{CommonPrefix, ListingPage, ObjectRecord};
use crate::error::{Error, XmlError};

/// `ListBucketResult` document of a `ListObjectsV2` call.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketResult {
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) prefix: String,
    #[serde(default)]
    pub(crate) key_count: usize,
    #[serde(default)]
    pub(crate) max_keys: usize,
    #[serde(default)]
    pub(crate) delimiter: String,
    #[serde(default)]
    pub(crate) is_truncated: bool,
    #[serde(default)]
    pub(crate) contents: Vec<ObjectRecord>,
    #[serde(default)]
    pub(crate) common_prefixes: Vec<CommonPrefix>,
    pub(crate) next_continuation_token: Option<String>,
    pub(crate) continuation_token: Option<String>,
}

impl ListBucketResult {
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_ref()
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    pub fn delimiter(&self) -> &str {
        self.delimiter.as_ref()
    }

    pub fn is_truncated(&self) -> bool {
        self.is_truncated
    }

    pub fn contents(&self) -> &[ObjectRecord] {
        self.contents.as_ref()
    }

    pub fn common_prefixes(&self) -> &[CommonPrefix] {
        self.common_prefixes.as_ref()
    }

    pub fn next_continuation_token(&self) -> Option<&str> {
        self.next_continuation_token.as_deref()
    }
}

impl TryFrom<&[u8]> for ListBucketResult {
    type Error = XmlError;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let text = std::str::from_utf8(value)?;
        Ok(quick_xml::de::from_str(text)?)
    }
}

impl TryFrom<&str> for ListBucketResult {
    type Error = XmlError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.as_bytes().try_into()
    }
}

impl TryFrom<ListBucketResult> for ListingPage {
    type Error = Error;

    /// A truncated result must carry a non-empty `NextContinuationToken`.
    fn try_from(res: ListBucketResult) -> Result<Self, Self::Error> {
        let continuation_token = if res.is_truncated {
            match res.next_continuation_token {
                Some(token) if !token.is_empty() => Some(token),
                _ => {
                    return Err(Error::ProtocolError(
                        "truncated listing without NextContinuationToken".to_string(),
                    ))
                }
            }
        } else {
            None
        };
        Ok(ListingPage {
            records: res.contents,
            common_prefixes: res.common_prefixes.into_iter().map(|p| p.prefix).collect(),
            continuation_token,
        })
    }
}

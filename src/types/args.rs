use crate::client::QueryMap;
use crate::config::MAX_KEYS_LIMIT;

/// Custom listobjects request parameters
/// ## parmas
/// - prefix: Limits the response to keys that begin with the specified prefix.
/// - delimiter: A delimiter is a character you use to group keys.
/// - continuation_token: ContinuationToken indicates S3 that the list is being continued on this bucket with a token.
/// - max_keys: Sets the maximum number of keys returned in the response. Default 1000
#[derive(Debug, Clone, PartialEq)]
pub struct ListObjectsArgs {
    pub(crate) continuation_token: Option<String>,
    pub(crate) delimiter: Option<String>,
    pub(crate) max_keys: usize,
    pub(crate) prefix: Option<String>,
}

impl Default for ListObjectsArgs {
    fn default() -> Self {
        Self {
            continuation_token: None,
            delimiter: None,
            max_keys: MAX_KEYS_LIMIT,
            prefix: None,
        }
    }
}

impl ListObjectsArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn continuation_token<T: Into<String>>(mut self, token: Option<T>) -> Self {
        self.continuation_token = token.map(Into::into);
        self
    }

    pub fn delimiter<T: Into<String>>(mut self, delimiter: Option<T>) -> Self {
        self.delimiter = delimiter.map(Into::into);
        self
    }

    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.clamp(1, MAX_KEYS_LIMIT);
        self
    }

    pub fn prefix<T: Into<String>>(mut self, prefix: T) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub(crate) fn args_query_map(&self) -> QueryMap {
        let mut querys = QueryMap::new();
        querys.insert("list-type", "2");
        querys.insert("max-keys", self.max_keys.to_string());
        if let Some(prefix) = self.prefix.as_ref().filter(|p| !p.is_empty()) {
            querys.insert("prefix", prefix.as_str());
        }
        if let Some(delimiter) = self.delimiter.as_ref().filter(|d| !d.is_empty()) {
            querys.insert("delimiter", delimiter.as_str());
        }
        if let Some(token) = &self.continuation_token {
            querys.insert("continuation-token", token.as_str());
        }
        querys
    }
}

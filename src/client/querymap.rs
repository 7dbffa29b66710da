use crate::utils::urlencode;

/// Ordered query parameters of a request.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct QueryMap(Vec<(String, String)>);

impl QueryMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.push((key.into(), value.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// get query string.
    /// the empty keys will be skipped.
    /// key and value will be uri encode, parameters keep insertion order.
    #[inline]
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .filter(|(k, _)| !k.is_empty())
            .map(|(k, v)| {
                let k = urlencode(k, false);
                if v.is_empty() {
                    k
                } else {
                    format!("{}={}", k, urlencode(v, false))
                }
            })
            .collect::<Vec<String>>()
            .join("&")
    }
}

impl From<QueryMap> for String {
    fn from(value: QueryMap) -> Self {
        value.to_query_string()
    }
}

//! Time formatter for S3 listings.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// wrap of `chrono::Utc`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct UtcTime(DateTime<Utc>);

impl UtcTime {
    #[inline]
    pub fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// parse an RFC 3339 timestamp such as `2023-09-10T08:26:43.296Z`.
    pub fn parse(text: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|t| Self::new(t.with_timezone(&Utc)))
    }

    /// format date to ISO8601, like`2023-09-10T08:26:43.296Z`
    #[inline]
    pub fn format_time(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    #[inline]
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl From<DateTime<Utc>> for UtcTime {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

/// `LastModified` is diagnostic only, so an unparsable value becomes `None`
/// instead of failing the whole page.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<UtcTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(UtcTime::parse))
}

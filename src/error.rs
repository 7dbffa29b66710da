//! Error and Result module.
use core::fmt;
use serde::Deserialize;
use std::error::Error as StdError;
use std::{fmt::Display, result};

/// A `Result` typedef to use with the `rgw_dl::error` type
pub type Result<T> = result::Result<T, Error>;

/// inducate an illegal variable was used.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError(String);

impl ValueError {
    pub fn new<T: Into<String>>(value: T) -> Self {
        Self(value.into())
    }
}

impl Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value error: {}", self.0)
    }
}

impl StdError for ValueError {}

impl From<&str> for ValueError {
    fn from(err: &str) -> Self {
        Self(err.to_string())
    }
}

impl From<String> for ValueError {
    fn from(err: String) -> Self {
        Self(err)
    }
}

/// XML parsing error.
#[derive(Debug)]
pub struct XmlError(String);

impl Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xmlerror: {}", self.0)
    }
}

impl StdError for XmlError {}

impl From<quick_xml::DeError> for XmlError {
    fn from(err: quick_xml::DeError) -> Self {
        Self(err.to_string())
    }
}

impl From<std::str::Utf8Error> for XmlError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self(err.to_string())
    }
}

/// Error document returned by the S3 service.
///
/// RGW omits several of the AWS fields, so everything except `Code` is optional.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", rename = "Error")]
pub struct S3Error {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub request_id: String,
    pub host_id: Option<String>,
    pub bucket_name: Option<String>,
}

impl S3Error {
    /// Build an error for a reply whose body is not an S3 error document.
    pub(crate) fn from_status(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let message: String = text.trim().chars().take(200).collect();
        Self {
            code: format!("HTTP{}", status),
            message,
            resource: String::new(),
            request_id: String::new(),
            host_id: None,
            bucket_name: None,
        }
    }
}

impl std::fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "S3Error: {}", self.code)
        } else {
            write!(f, "S3Error: {}: {}", self.code, self.message)
        }
    }
}

impl StdError for S3Error {}

impl TryFrom<&[u8]> for S3Error {
    type Error = XmlError;
    fn try_from(res: &[u8]) -> std::result::Result<Self, Self::Error> {
        let text = std::str::from_utf8(res)?;
        Ok(quick_xml::de::from_str(text)?)
    }
}

impl TryFrom<&str> for S3Error {
    type Error = XmlError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        value.as_bytes().try_into()
    }
}

/// Failures surfaced by listing, tree building and downloading.
///
/// Only [`Error::TransientError`] is retried; see [`Error::is_retryable`].
#[derive(Debug)]
pub enum Error {
    /// inducate an illegal variable was used.
    ValueError(String),

    /// anonymous access refused (HTTP 403).
    AccessDenied(S3Error),

    /// network failure, 5xx or throttling.
    TransientError(String),

    /// the service answered with something that is not a valid S3 response.
    ProtocolError(String),

    /// S3 service returned a non-retryable error response other than 403.
    S3Error(S3Error),

    /// the same path segment was seen as a file and as a directory.
    StructuralConflict { path: String },

    /// filesystem failure on the destination side.
    LocalIoError(std::io::Error),

    /// the run was interrupted.
    Cancelled,
}

impl Error {
    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let s3err = S3Error::try_from(body).unwrap_or_else(|_| S3Error::from_status(status, body));
        match status {
            403 => Error::AccessDenied(s3err),
            429 | 500..=599 => Error::TransientError(s3err.to_string()),
            _ if s3err.code == "SlowDown" => Error::TransientError(s3err.to_string()),
            _ => Error::S3Error(s3err),
        }
    }

    /// Whether repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientError(_))
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Error::AccessDenied(_))
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::AccessDenied(e) => Some(e),
            Error::S3Error(e) => Some(e),
            Error::LocalIoError(e) => Some(e),
            _ => None,
        }
    }
}

#[rustfmt::skip]
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            Error::ValueError(e) => write!(f, "{}", e),
            Error::AccessDenied(e) => write!(f, "access denied: {}", e),
            Error::TransientError(e) => write!(f, "transient error: {}", e),
            Error::ProtocolError(e) => write!(f, "protocol error: {}", e),
            Error::S3Error(e) => write!(f, "{}", e),
            Error::StructuralConflict { path } => write!(f, "structural conflict: `{}` is both a file and a directory", path),
            Error::LocalIoError(e) => write!(f, "local I/O error: {}", e),
            Error::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<ValueError> for Error {
    fn from(err: ValueError) -> Self {
        Error::ValueError(err.0)
    }
}

impl From<XmlError> for Error {
    fn from(err: XmlError) -> Self {
        Error::ProtocolError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::LocalIoError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::ValueError(err.to_string());
        }
        if err.is_decode() {
            return Self::ProtocolError(err.to_string());
        }
        Self::TransientError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, S3Error};
    use crate::error::XmlError;

    #[test]
    fn test_s3_error() {
        let res = r#"<?xml version="1.0" encoding="UTF-8"?>
        <Error>
            <Code>NoSuchKey</Code>
            <Message>The resource you requested does not exist</Message>
            <Resource>/mybucket/myfoto.jpg</Resource>
            <RequestId>4442587FB7D0A2F9</RequestId>
        </Error>"#;
        let result: std::result::Result<S3Error, XmlError> = res.as_bytes().try_into();
        let err = result.unwrap();
        assert_eq!(err.code, "NoSuchKey");
        assert_eq!(err.resource, "/mybucket/myfoto.jpg");
    }

    #[test]
    fn test_rgw_error_without_message() {
        let res = r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>AccessDenied</Code><BucketName>sdc3-simdata</BucketName><RequestId>tx0000</RequestId><HostId>abc-zonegroup</HostId></Error>"#;
        let err: S3Error = res.try_into().unwrap();
        assert_eq!(err.code, "AccessDenied");
        assert_eq!(err.bucket_name.as_deref(), Some("sdc3-simdata"));
        assert!(err.message.is_empty());
    }

    #[test]
    fn test_status_classification() {
        let denied = Error::from_status(403, b"<Error><Code>AccessDenied</Code></Error>");
        assert!(denied.is_access_denied());
        assert!(!denied.is_retryable());

        assert!(Error::from_status(503, b"").is_retryable());
        assert!(Error::from_status(500, b"<html>oops</html>").is_retryable());
        assert!(Error::from_status(429, b"").is_retryable());

        match Error::from_status(404, b"<Error><Code>NoSuchBucket</Code></Error>") {
            Error::S3Error(e) => assert_eq!(e.code, "NoSuchBucket"),
            other => panic!("unexpected {:?}", other),
        }
        match Error::from_status(400, b"not xml") {
            Error::S3Error(e) => {
                assert_eq!(e.code, "HTTP400");
                assert_eq!(e.message, "not xml");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_io_errors_are_local() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, Error::LocalIoError(_)));
        assert!(!err.is_retryable());
    }
}

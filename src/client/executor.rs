use bytes::Bytes;

use super::transport::HttpReply;
use super::{Client, QueryMap};
use crate::error::{Error, Result, XmlError};

/// An executor builds one GET request against the bucket.
/// ```rust
/// use rgw_dl::Client;
/// use rgw_dl::error::Result;
///
/// async fn readme(client: Client) -> Result<bytes::Bytes> {
///     client
///         .executor()
///         .object_name("README.txt")
///         .send_bytes_ok()
///         .await
/// }
/// ```
pub struct BaseExecutor<'a> {
    object_name: Option<String>,
    querys: QueryMap,
    client: &'a Client,
}

impl<'a> BaseExecutor<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self {
            object_name: None,
            client,
            querys: QueryMap::new(),
        }
    }

    /// Set the object name.
    pub fn object_name<T: Into<String>>(mut self, name: T) -> Self {
        self.object_name = Some(name.into());
        self
    }

    /// Set up a new request query.
    pub fn querys(mut self, querys: QueryMap) -> Self {
        self.querys = querys;
        self
    }

    /// Send the request and return the reply, whatever its status.
    pub async fn send(self) -> Result<HttpReply> {
        let query = if self.querys.is_empty() {
            None
        } else {
            Some(self.querys.to_query_string())
        };
        self.client._execute(self.object_name.as_deref(), query).await
    }

    /// Send the request; non-2xx replies become an [`Error`].
    pub async fn send_ok(self) -> Result<HttpReply> {
        let res = self.send().await?;
        if res.is_success() {
            Ok(res)
        } else {
            let status = res.status;
            let body = res.body.convert().await.unwrap_or_default();
            Err(Error::from_status(status, &body))
        }
    }

    /// Send the request and collect a successful body.
    pub async fn send_bytes_ok(self) -> Result<Bytes> {
        self.send_ok().await?.body.convert().await
    }

    /// Send the request and parse a successful body as an XML document.
    pub(crate) async fn send_xml_ok<T>(self) -> Result<T>
    where
        T: for<'b> TryFrom<&'b [u8], Error = XmlError>,
    {
        let body = self.send_bytes_ok().await?;
        Ok(T::try_from(body.as_ref())?)
    }
}

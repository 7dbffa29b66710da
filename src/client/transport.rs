//! HTTP transport seam.
use bytes::Bytes;
use futures::{stream, Future, Stream};
use futures_util::StreamExt;
use reqwest::header::{self, HeaderValue};
use std::pin::Pin;
use std::time::Duration;

use crate::config::DEFAULT_IDLE_TIMEOUT;
use crate::data::{ByteStream, Data};
use crate::error::{Error, Result};

/// Time allowed to establish a TCP/TLS connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub type TransportFuture = Pin<Box<dyn Future<Output = Result<HttpReply>> + Send>>;

/// Issues unsigned GET requests.
///
/// Implementations return every reply, whatever its status; errors are for
/// requests that produced no reply at all.
pub trait Transport: Send + Sync {
    fn get(&self, url: String) -> TransportFuture;
}

/// Status, announced length and body of a reply.
pub struct HttpReply {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Data<Error>,
}

impl HttpReply {
    pub fn new<B: Into<Data<Error>>>(status: u16, body: B) -> Self {
        let body = body.into();
        Self {
            status,
            content_length: body.len(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for HttpReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReply")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// [`Transport`] backed by a [`reqwest::Client`].
///
/// There is no total request timeout, since a large object may legitimately
/// take hours. A connection that goes quiet for longer than the idle timeout
/// fails with [`Error::TransientError`] instead, so it is retried.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    idle_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Set the longest silence tolerated while waiting for headers or data.
    ///
    /// Default: 60 seconds.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Build a client that sends only `User-Agent` besides the framing headers.
    pub fn with_agent(agent: &str) -> Result<Self> {
        let agent: HeaderValue = agent
            .parse()
            .map_err(|_| Error::ValueError(format!("Invalid agent `{}`", agent)))?;
        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, agent);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self::new(client))
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: String) -> TransportFuture {
        let request = self.client.get(url);
        let idle = self.idle_timeout;
        Box::pin(async move {
            let res = tokio::time::timeout(idle, request.send())
                .await
                .map_err(|_| Error::TransientError(format!("no response within {:?}", idle)))??;
            let status = res.status().as_u16();
            let content_length = res.content_length();
            let stream = idle_guard(res.bytes_stream(), idle);
            Ok(HttpReply {
                status,
                content_length,
                body: Data::Stream(stream, content_length),
            })
        })
    }
}

/// Fail `body` with a [`Error::TransientError`] once no chunk has arrived for
/// `idle`. The stream ends after the first error.
pub(crate) fn idle_guard<S, E>(body: S, idle: Duration) -> ByteStream<Error>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    stream::unfold(Some(Box::pin(body)), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
            Ok(Some(Err(e))) => Some((Err(e.into()), None)),
            Ok(None) => None,
            Err(_) => Some((
                Err(Error::TransientError(format!("no data received for {:?}", idle))),
                None,
            )),
        }
    })
    .boxed()
}

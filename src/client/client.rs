use std::sync::Arc;

use tracing::debug;

use super::transport::{HttpReply, ReqwestTransport, Transport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::utils::urlencode;

/// A `ClientBuilder` can be used to create a [`Client`] with custom configuration.
pub struct ClientBuilder {
    config: Config,
    agent: String,
    transport: Option<Box<dyn Transport>>,
    client: Option<reqwest::Client>,
}

impl ClientBuilder {
    pub fn new(config: Config) -> Self {
        ClientBuilder {
            config,
            agent: concat!("rgw-dl/", env!("CARGO_PKG_VERSION")).to_string(),
            transport: None,
            client: None,
        }
    }

    /// Set agent header for the client.
    ///
    /// Default: `rgw-dl/<version>`
    pub fn agent<T: Into<String>>(mut self, agent: T) -> Self {
        self.agent = agent.into();
        self
    }

    /// Set custom http [reqwest::Client].
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the HTTP stack entirely, e.g. with an in-memory bucket.
    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn build(self) -> Result<Client> {
        let idle = self.config.idle_timeout();
        let transport: Box<dyn Transport> = match (self.transport, self.client) {
            (Some(transport), _) => transport,
            (None, Some(client)) => Box::new(ReqwestTransport::new(client).idle_timeout(idle)),
            (None, None) => Box::new(ReqwestTransport::with_agent(&self.agent)?.idle_timeout(idle)),
        };
        Ok(Client {
            inner: Arc::new(ClientRef {
                bucket_path: self.config.bucket_path(),
                config: self.config,
                transport,
            }),
        })
    }
}

/// Anonymous, read-only client for one bucket.
///
/// You do **not** have to wrap the `Client` in an [`Rc`] or [`Arc`] to **reuse** it,
/// because it already uses an [`Arc`] internally.
///
/// ## Create a client
/// ```rust
/// use rgw_dl::{Client, Config};
/// let config = Config::builder()
///     .endpoint("https://rgw.cscs.ch")
///     .tenant("ska")
///     .bucket("sdc3-simdata")
///     .build()
///     .unwrap();
/// let client = Client::builder(config).build().unwrap();
/// ```
///
/// [`Rc`]: std::rc::Rc
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientRef>,
}

struct ClientRef {
    config: Config,
    bucket_path: String,
    transport: Box<dyn Transport>,
}

impl Client {
    /// get a [`ClientBuilder`]
    pub fn builder(config: Config) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Client over the default `reqwest` transport.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// build uri for bucket/key
    ///
    /// The bucket part keeps the tenant separator `:` unescaped, the key is
    /// encoded with `/` preserved.
    pub(crate) fn _build_uri(&self, key: Option<&str>) -> String {
        let endpoint = self.inner.config.endpoint();
        let bucket = urlencode(&self.inner.bucket_path, false).replace("%3A", ":");
        let mut uri = format!("{}/{}", endpoint, bucket);
        if let Some(key) = key {
            uri.push('/');
            uri.push_str(&urlencode(key, true));
        }
        uri
    }

    /// Execute an unsigned GET; the reply is returned whatever its status.
    pub(crate) async fn _execute(&self, key: Option<&str>, query: Option<String>) -> Result<HttpReply> {
        if let Some(key) = key {
            if key.is_empty() {
                return Err(Error::ValueError("Object name cannot be empty.".to_string()));
            }
        }
        let uri = self._build_uri(key);
        let uri = match query {
            Some(query) if !query.is_empty() => format!("{}?{}", uri, query),
            _ => uri,
        };
        debug!(uri = %uri, "GET");
        self.inner.transport.get(uri).await
    }

    #[inline]
    pub fn executor(&self) -> super::BaseExecutor<'_> {
        super::BaseExecutor::new(self)
    }
}

use super::Client;
use crate::data::{ByteStream, Data};
use crate::error::{Error, Result};

/// Body of a fetched object.
pub struct ObjectBody {
    content_length: Option<u64>,
    body: Data<Error>,
}

impl ObjectBody {
    /// Value of the `Content-Length` header, when the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn into_stream(self) -> ByteStream<Error> {
        self.body.into_stream()
    }

    pub async fn bytes(self) -> Result<bytes::Bytes> {
        self.body.convert().await
    }
}

/// Operating the object
impl Client {
    /// Start downloading an object. Non-2xx replies become an [`Error`]; the
    /// body is streamed as it arrives.
    /// ## Example
    /// ```rust
    /// # use rgw_dl::Client;
    /// # async fn example(client: Client) -> rgw_dl::error::Result<()> {
    /// let object = client.get_object("SDC3/README.txt").await?;
    /// let len = object.content_length();
    /// let bytes = object.bytes().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_object(&self, key: &str) -> Result<ObjectBody> {
        let res = self.executor().object_name(key).send_ok().await?;
        Ok(ObjectBody {
            content_length: res.content_length,
            body: res.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::client::transport::testing::ScriptedTransport;
    use crate::error::Error;
    use crate::{Client, Config};

    fn client(t: &ScriptedTransport) -> Client {
        let config = Config::builder().endpoint("http://rgw.test").build().unwrap();
        Client::builder(config).transport(t.clone()).build().unwrap()
    }

    #[tokio::test]
    async fn test_get_object() {
        let t = ScriptedTransport::default();
        t.push("http://rgw.test/ska:sdc3-simdata/SDC3/a.fits", 200, vec![7u8; 100]);
        let object = client(&t).get_object("SDC3/a.fits").await.unwrap();
        assert_eq!(object.content_length(), Some(100));
        assert_eq!(object.bytes().await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let t = ScriptedTransport::default();
        match client(&t).get_object("nope").await {
            Err(Error::S3Error(e)) => assert_eq!(e.code, "NoSuchKey"),
            Err(e) => panic!("unexpected {}", e),
            Ok(_) => panic!("object should be missing"),
        }
    }
}

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::{stream, StreamExt};
use std::result::Result;

/// A boxed stream of body chunks.
pub type ByteStream<E> = Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>;

/// Body of an HTTP reply.
pub enum Data<E> {
    /// Payload already in memory.
    Bytes(Bytes),
    /// Payload arriving in chunks, `Option<u64>` the announced total length.
    Stream(ByteStream<E>, Option<u64>),
}

impl<E: Send + 'static> Data<E> {
    /// get an empty Bytes Data.
    #[inline]
    pub fn empty() -> Self {
        Self::Bytes(Bytes::new())
    }

    /// Collect a streamed body into memory.
    pub async fn convert(self) -> Result<Bytes, E> {
        Ok(match self {
            Data::Stream(mut s, l) => {
                let mut buf = BytesMut::with_capacity(l.unwrap_or(0).min(1 << 20) as usize);
                while let Some(data) = s.next().await {
                    buf.extend_from_slice(&data?);
                }
                buf.freeze()
            }
            Data::Bytes(b) => b,
        })
    }

    /// Known length of the payload, if any.
    #[inline]
    pub fn len(&self) -> Option<u64> {
        match self {
            Data::Bytes(data) => Some(data.len() as u64),
            Data::Stream(_, len) => *len,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// View either variant as a chunk stream.
    pub fn into_stream(self) -> ByteStream<E> {
        match self {
            Data::Stream(s, _) => s,
            Data::Bytes(b) => Box::pin(stream::once(async move { Ok(b) })),
        }
    }
}

impl<E: Send + 'static> Default for Data<E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<E> From<Bytes> for Data<E> {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl<E> From<String> for Data<E> {
    fn from(value: String) -> Self {
        Self::Bytes(value.into())
    }
}

impl<E> From<&'static str> for Data<E> {
    fn from(value: &'static str) -> Self {
        Self::Bytes(value.into())
    }
}

impl<E> From<Vec<u8>> for Data<E> {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl<E> From<(ByteStream<E>, Option<u64>)> for Data<E> {
    fn from(value: (ByteStream<E>, Option<u64>)) -> Self {
        Self::Stream(value.0, value.1)
    }
}

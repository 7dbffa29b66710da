//! Listing client
mod client;
mod executor;
mod operate_list;
mod operate_object;
mod querymap;
pub(crate) mod transport;

pub use client::*;
pub use executor::BaseExecutor;
pub use operate_object::ObjectBody;
pub use querymap::QueryMap;
pub use transport::{HttpReply, ReqwestTransport, Transport, TransportFuture};

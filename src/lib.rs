#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]

pub mod client;
pub mod config;
mod data;
pub mod download;
pub mod error;
pub mod retry;
pub mod time;
pub mod tree;
pub mod types;
mod utils;

pub use crate::client::Client;
pub use crate::config::Config;
pub use crate::data::{ByteStream, Data};
pub use crate::download::{Dispatcher, DownloadSummary, TaskOutcome, TaskReport};
pub use crate::tree::{build_tree, render_tree, TreeNode};
pub use crate::utils::human_bytes;

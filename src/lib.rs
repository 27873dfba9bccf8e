//! # tkrec
//!
//! This crate finds the live stream of a TikTok user, resolves its HLS
//! playlist at a chosen quality and, if asked to, waits until the user goes
//! live. Recording itself is handed to an external program (`yt-dlp`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tkrec::{http::HttpClient, metadata::MetadataResolver, quality::Quality};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Shared session with browser-like headers and a cookie store
//!     let client = HttpClient::new().unwrap();
//!
//!     // Try the API extractor first, then the live page
//!     let mut resolver = MetadataResolver::new();
//!     let status = resolver
//!         .initialize(&client, Some("someuser"), Quality::Original)
//!         .await
//!         .unwrap();
//!
//!     if status.is_live() {
//!         let link = resolver.stream_link().unwrap();
//!         println!("{:?}", link.link);
//!     } else {
//!         println!("User is {}", status);
//!     }
//! }
//! ```
//!
//! The `wait` module re-polls a resolver until the user is live, and the
//! `recorder` module runs the whole resolve, wait and record sequence.

#![forbid(unsafe_code)]
#[macro_use]
extern crate log;

pub mod config;
pub mod extractor;
pub mod http;
pub mod metadata;
pub mod progress;
pub mod quality;
pub mod recorder;
pub mod status;
pub mod username;
pub mod wait;
pub mod ytdlp;

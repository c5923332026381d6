//! image-saver library - permission-gated saving into a shared photo library.
//!
//! A host hands over a file path on the `saveImage` method channel; the
//! image is checked, write access is confirmed (prompting the user where the
//! platform requires it), and the file lands in the platform's shared media
//! store. Every call gets exactly one typed response.
//!
//! # Modules
//!
//! - `channel`: Method-channel boundary (`saveImage`)
//! - `saver`: Request pipeline and capability resolution
//! - `permission`: Permission gate and consent providers
//! - `persist`: Persistence strategies (media index, photo library)
//! - `store` / `library`: Platform storage ports and directory-backed implementations
//! - `reporter`: One-shot result delivery and wire responses
//! - `config`, `logging`, `cli`, `output`: Host application plumbing
#![forbid(unsafe_code)]

pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod image_ops;
pub mod library;
pub mod logging;
pub mod output;
pub mod permission;
pub mod persist;
pub mod platform;
pub mod reporter;
pub mod request;
pub mod saver;
pub mod store;

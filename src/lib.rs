#![forbid(unsafe_code)]

//! Compiled asset catalog engine.
//!
//! - [`key`]: rendition key tokens and their canonical encoding.
//! - [`surface`]: premultiplied RGBA8 bitmaps with a small drawing context.
//! - [`csi`]: building and decoding CSI rendition blobs.
//! - [`storage`]: crash-safe key/value container keyed by encoded rendition keys.
//! - [`catalog`]: named lookups, variant selection and editing on top of storage.

pub(crate) mod foundation;

pub mod catalog;
pub mod config;
pub mod csi;
pub mod key;
pub mod storage;
pub mod surface;

pub use catalog::{Catalog, CatalogOpts, NamedLookup, Rendition, RenditionKind, Variant};
pub use config::Config;
pub use foundation::core::{Canvas, Point, Rect, Rgba8Premul, Size};
pub use foundation::error::{CarError, CarResult};
pub use key::{KeyFormat, KeyToken, RenditionKey};
pub use storage::{AssetStorage, OpenMode, StorageOpts};
pub use surface::BitmapSurface;

//! Rendition key tokens and their canonical binary encoding.
//!
//! A [`RenditionKey`] is an ordered list of [`KeyToken`]s; each token is a canonical set of
//! `(AttributeId, u16)` pairs. Keys are encoded once, canonically, and the encoded bytes are what
//! the storage engine indexes by.

pub(crate) mod attribute;
pub(crate) mod codec;
pub(crate) mod token;

pub use attribute::{
    Appearance, AttributeId, DisplayGamut, ELEMENT_COLOR, ELEMENT_ICON, ELEMENT_IMAGE_SET, Idiom,
    KEY_SCHEMA_VERSION, MAC_CATALYST_SUBTYPE, PART_ICON, SizeClass, ThemeState,
};
pub use codec::{ATTRIBUTE_BYTES, KeyFormat, TOKEN_HEADER_BYTES};
pub use token::{KeyAttribute, KeyToken, RenditionKey};

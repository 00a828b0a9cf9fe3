use crate::foundation::bytes::{ByteReader, ByteWriter};
use crate::foundation::error::{CarError, CarResult};
use crate::key::attribute::AttributeId;
use crate::key::token::{KeyAttribute, KeyToken, RenditionKey};

/// Bytes of the `u16` count header in front of a token.
pub const TOKEN_HEADER_BYTES: usize = 2;
/// Bytes per encoded `(attribute, value)` pair.
pub const ATTRIBUTE_BYTES: usize = 4;

/// Encoding limits a catalog imposes on its keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyFormat {
    /// Maximum attributes per token; `None` means unlimited.
    pub max_attributes: Option<u16>,
}

impl KeyFormat {
    /// No attribute limit.
    pub const UNLIMITED: Self = Self {
        max_attributes: None,
    };

    /// Limit tokens to `max` attributes.
    pub fn with_max_attributes(max: u16) -> Self {
        Self {
            max_attributes: Some(max),
        }
    }

    /// Reject tokens above the attribute limit.
    pub fn check_token(&self, token: &KeyToken) -> CarResult<()> {
        match self.max_attributes {
            Some(max) if token.len() > usize::from(max) => Err(CarError::malformed_key(format!(
                "token has {} attributes, catalog allows at most {max}",
                token.len()
            ))),
            _ => Ok(()),
        }
    }

    /// Reject keys whose tokens exceed the attribute limit.
    pub fn check_key(&self, key: &RenditionKey) -> CarResult<()> {
        key.tokens().iter().try_for_each(|t| self.check_token(t))
    }

    /// Canonical encoding of `token`, enforcing the attribute limit.
    pub fn encode_token(&self, token: &KeyToken) -> CarResult<Vec<u8>> {
        self.check_token(token)?;
        Ok(token.to_bytes())
    }

    /// Canonical encoding of `key`, enforcing the attribute limit.
    pub fn encode_key(&self, key: &RenditionKey) -> CarResult<Vec<u8>> {
        self.check_key(key)?;
        Ok(key.to_bytes())
    }
}

impl KeyToken {
    /// Canonical encoding: `u16` count, then `(u16 id, u16 value)` pairs sorted by id.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(TOKEN_HEADER_BYTES + ATTRIBUTE_BYTES * self.len());
        write_token(&mut w, self);
        w.into_vec()
    }

    /// Decode a token occupying exactly `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> CarResult<Self> {
        let mut r = ByteReader::new(bytes);
        let token = read_token(&mut r)?;
        if !r.is_empty() {
            return Err(CarError::malformed_key(format!(
                "token declares {} attributes but is {} bytes long",
                token.len(),
                bytes.len()
            )));
        }
        Ok(token)
    }
}

impl RenditionKey {
    /// Encoding: `u16` token count, then each canonical token encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        let count = u16::try_from(self.tokens().len()).unwrap_or(u16::MAX);
        w.put_u16(count);
        for token in self.tokens().iter().take(usize::from(count)) {
            write_token(&mut w, token);
        }
        w.into_vec()
    }

    /// Decode a key occupying exactly `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> CarResult<Self> {
        let mut r = ByteReader::new(bytes);
        let count = r
            .u16()
            .ok_or_else(|| CarError::malformed_key("key shorter than its token count header"))?;
        let mut tokens = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            tokens.push(read_token(&mut r)?);
        }
        if !r.is_empty() {
            return Err(CarError::malformed_key(format!(
                "key declares {count} tokens but has {} trailing bytes",
                r.remaining()
            )));
        }
        Ok(Self::new(tokens))
    }
}

fn write_token(w: &mut ByteWriter, token: &KeyToken) {
    // At most one attribute per known identifier, so the count always fits.
    w.put_u16(token.len() as u16);
    for a in token.attributes() {
        w.put_u16(a.id.raw());
        w.put_u16(a.value);
    }
}

fn read_token(r: &mut ByteReader<'_>) -> CarResult<KeyToken> {
    let count = r
        .u16()
        .ok_or_else(|| CarError::malformed_key("token shorter than its count header"))?;
    let body_len = usize::from(count) * ATTRIBUTE_BYTES;
    if r.remaining() < body_len {
        return Err(CarError::malformed_key(format!(
            "token declares {count} attributes but only {} bytes follow",
            r.remaining()
        )));
    }

    let mut attrs = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let (Some(raw_id), Some(value)) = (r.u16(), r.u16()) else {
            return Err(CarError::malformed_key("truncated attribute pair"));
        };
        let id = AttributeId::from_raw(raw_id).ok_or_else(|| {
            CarError::malformed_key(format!("unknown attribute identifier {raw_id}"))
        })?;
        attrs.push(KeyAttribute::new(id, value));
    }
    KeyToken::from_attributes(attrs)
}

#[cfg(test)]
#[path = "../../tests/unit/key/codec.rs"]
mod tests;

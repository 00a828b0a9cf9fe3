use std::fmt;

use smallvec::SmallVec;

use crate::foundation::error::{CarError, CarResult};
use crate::key::attribute::{
    Appearance, AttributeId, DisplayGamut, Idiom, SizeClass, ThemeState,
};

/// One typed `(attribute, value)` pair of a key token.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct KeyAttribute {
    /// Attribute identifier.
    pub id: AttributeId,
    /// Attribute value.
    pub value: u16,
}

impl KeyAttribute {
    /// Pair `id` with `value`.
    pub fn new(id: AttributeId, value: u16) -> Self {
        Self { id, value }
    }
}

/// A canonical set of key attributes.
///
/// Attributes are unique and always sorted by identifier, so equality, ordering and hashing of
/// tokens agree with byte-equality of their encodings.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<KeyAttribute>", into = "Vec<KeyAttribute>")]
pub struct KeyToken {
    attrs: SmallVec<[KeyAttribute; 8]>,
}

impl KeyToken {
    /// Empty token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a token from pairs in any order; repeated identifiers are rejected.
    pub fn from_attributes(
        attrs: impl IntoIterator<Item = KeyAttribute>,
    ) -> CarResult<Self> {
        let mut attrs: SmallVec<[KeyAttribute; 8]> = attrs.into_iter().collect();
        attrs.sort_by_key(|a| a.id);
        if let Some(w) = attrs.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(CarError::malformed_key(format!(
                "attribute '{}' appears more than once",
                w[0].id
            )));
        }
        Ok(Self { attrs })
    }

    /// Builder form of [`KeyToken::set`].
    pub fn with(mut self, id: AttributeId, value: u16) -> Self {
        self.set(id, value);
        self
    }

    /// Set `id` to `value`, returning the previous value.
    pub fn set(&mut self, id: AttributeId, value: u16) -> Option<u16> {
        match self.attrs.binary_search_by_key(&id, |a| a.id) {
            Ok(i) => Some(std::mem::replace(&mut self.attrs[i].value, value)),
            Err(i) => {
                self.attrs.insert(i, KeyAttribute::new(id, value));
                None
            }
        }
    }

    /// Remove `id`, returning its value.
    pub fn remove(&mut self, id: AttributeId) -> Option<u16> {
        let i = self.attrs.binary_search_by_key(&id, |a| a.id).ok()?;
        Some(self.attrs.remove(i).value)
    }

    /// Value of `id`, if present.
    pub fn get(&self, id: AttributeId) -> Option<u16> {
        self.attrs
            .binary_search_by_key(&id, |a| a.id)
            .ok()
            .map(|i| self.attrs[i].value)
    }

    /// Attributes in canonical order.
    pub fn attributes(&self) -> &[KeyAttribute] {
        &self.attrs
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// `true` when the token carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Facet identifier linking the token to a rendition name.
    pub fn identifier(&self) -> Option<u16> {
        self.get(AttributeId::Identifier)
    }

    /// Scale factor; absent means scale-independent.
    pub fn scale(&self) -> Option<u16> {
        self.get(AttributeId::Scale)
    }

    /// Typed idiom, taking the Mac Catalyst subtype into account.
    pub fn idiom(&self) -> Option<Idiom> {
        Idiom::classify(self.get(AttributeId::Idiom), self.get(AttributeId::Subtype))
    }

    /// Typed appearance; absent reads as [`Appearance::Any`].
    pub fn appearance(&self) -> Option<Appearance> {
        Appearance::from_raw(self.get(AttributeId::Appearance).unwrap_or(0))
    }

    /// Typed display gamut; absent reads as sRGB.
    pub fn display_gamut(&self) -> Option<DisplayGamut> {
        DisplayGamut::from_raw(self.get(AttributeId::DisplayGamut).unwrap_or(0))
    }

    /// Typed horizontal size class.
    pub fn size_class_horizontal(&self) -> Option<SizeClass> {
        SizeClass::from_raw(self.get(AttributeId::SizeClassHorizontal).unwrap_or(0))
    }

    /// Typed vertical size class.
    pub fn size_class_vertical(&self) -> Option<SizeClass> {
        SizeClass::from_raw(self.get(AttributeId::SizeClassVertical).unwrap_or(0))
    }

    /// Typed control state.
    pub fn state(&self) -> Option<ThemeState> {
        ThemeState::from_raw(self.get(AttributeId::State).unwrap_or(0))
    }
}

impl TryFrom<Vec<KeyAttribute>> for KeyToken {
    type Error = CarError;

    fn try_from(attrs: Vec<KeyAttribute>) -> CarResult<Self> {
        Self::from_attributes(attrs)
    }
}

impl From<KeyToken> for Vec<KeyAttribute> {
    fn from(token: KeyToken) -> Self {
        token.attrs.into_vec()
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, a) in self.attrs.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", a.id, a.value)?;
        }
        Ok(())
    }
}

/// Ordered sequence of key tokens selecting one stored rendition.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct RenditionKey {
    tokens: Vec<KeyToken>,
}

impl RenditionKey {
    /// Key made of `tokens`, in the given order.
    pub fn new(tokens: Vec<KeyToken>) -> Self {
        Self { tokens }
    }

    /// Key made of a single token.
    pub fn single(token: KeyToken) -> Self {
        Self {
            tokens: vec![token],
        }
    }

    /// Tokens in order.
    pub fn tokens(&self) -> &[KeyToken] {
        &self.tokens
    }

    /// First value of `id` across the tokens, in token order.
    pub fn attribute(&self, id: AttributeId) -> Option<u16> {
        self.tokens.iter().find_map(|t| t.get(id))
    }

    /// Facet identifier of the key.
    pub fn identifier(&self) -> Option<u16> {
        self.attribute(AttributeId::Identifier)
    }

    /// Merge every token into one, earlier tokens winning on repeated identifiers.
    pub fn flattened(&self) -> KeyToken {
        let mut out = KeyToken::new();
        for token in self.tokens.iter().rev() {
            for a in token.attributes() {
                out.set(a.id, a.value);
            }
        }
        out
    }
}

impl From<KeyToken> for RenditionKey {
    fn from(token: KeyToken) -> Self {
        Self::single(token)
    }
}

impl fmt::Display for RenditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, t) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{t}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
#[path = "../../tests/unit/key/token.rs"]
mod tests;

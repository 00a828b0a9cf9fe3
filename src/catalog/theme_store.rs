use std::collections::BTreeMap;

use crate::key::{Appearance, AttributeId, DisplayGamut, Idiom, KeyToken, RenditionKey};

/// Structural address of a family of variants.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ElementKey {
    /// Element attribute.
    pub element: u16,
    /// Part attribute.
    pub part: u16,
    /// Identifier attribute (facet).
    pub identifier: u16,
}

impl ElementKey {
    /// Structural address of `key`; missing attributes read as 0.
    pub fn of(key: &RenditionKey) -> Self {
        Self {
            element: key.attribute(AttributeId::Element).unwrap_or(0),
            part: key.attribute(AttributeId::Part).unwrap_or(0),
            identifier: key.identifier().unwrap_or(0),
        }
    }
}

/// Desired variant of a rendition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Variant {
    /// Pixel scale.
    pub scale: u16,
    /// Light/dark/high-contrast appearance.
    pub appearance: Appearance,
    /// Target platform.
    pub idiom: Idiom,
    /// Display gamut.
    pub gamut: DisplayGamut,
}

impl Default for Variant {
    fn default() -> Self {
        Self {
            scale: 1,
            appearance: Appearance::Any,
            idiom: Idiom::Universal,
            gamut: DisplayGamut::Srgb,
        }
    }
}

impl Variant {
    /// Variant at `scale` with every other axis at its default.
    pub fn at_scale(scale: u16) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    /// Write this variant's attributes into `token`.
    pub fn apply_to(&self, token: KeyToken) -> KeyToken {
        let mut token = token
            .with(AttributeId::Scale, self.scale)
            .with(AttributeId::Idiom, self.idiom.raw())
            .with(AttributeId::Appearance, self.appearance.raw())
            .with(AttributeId::DisplayGamut, self.gamut.raw());
        if self.idiom == Idiom::MacCatalyst {
            token.set(AttributeId::Subtype, crate::key::MAC_CATALYST_SUBTYPE);
        }
        token
    }
}

// Lower is better; `None` means the candidate does not qualify.
type Score = (u8, u8, u32, u8);

fn score(candidate: &KeyToken, want: &Variant) -> Option<Score> {
    let idiom = match candidate.idiom()? {
        i if i == want.idiom => 0,
        Idiom::Universal => 1,
        _ => return None,
    };
    let appearance = match candidate.appearance()? {
        a if a == want.appearance => 0,
        Appearance::Any => 1,
        _ => return None,
    };
    let scale = match candidate.scale() {
        None => 0,
        Some(s) if s == want.scale => 0,
        Some(s) if s > want.scale => u32::from(s - want.scale),
        Some(s) => 0x1_0000 + u32::from(want.scale - s),
    };
    let gamut = u8::from(candidate.display_gamut()? != want.gamut);
    Some((idiom, appearance, scale, gamut))
}

/// Renditions grouped by [`ElementKey`] with variant selection.
#[derive(Clone, Debug, Default)]
pub struct ThemeStore {
    groups: BTreeMap<ElementKey, Vec<RenditionKey>>,
    names: BTreeMap<String, u16>,
}

impl ThemeStore {
    pub(crate) fn new(keys: Vec<RenditionKey>, names: BTreeMap<String, u16>) -> Self {
        let mut groups: BTreeMap<ElementKey, Vec<RenditionKey>> = BTreeMap::new();
        for key in keys {
            groups.entry(ElementKey::of(&key)).or_default().push(key);
        }
        Self { groups, names }
    }

    /// Every structural group.
    pub fn element_keys(&self) -> impl Iterator<Item = &ElementKey> {
        self.groups.keys()
    }

    /// All variants of one group.
    pub fn variants(&self, element: &ElementKey) -> &[RenditionKey] {
        self.groups.get(element).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups whose identifier is `identifier`.
    pub fn groups_for_identifier(
        &self,
        identifier: u16,
    ) -> impl Iterator<Item = (&ElementKey, &[RenditionKey])> {
        self.groups
            .iter()
            .filter(move |(k, _)| k.identifier == identifier)
            .map(|(k, v)| (k, v.as_slice()))
    }

    /// Best variant of `element` for `want`.
    ///
    /// Exact attribute matches win; otherwise any-appearance and universal-idiom variants stand
    /// in, and the nearest scale at or above the request is preferred over the largest smaller
    /// one.
    pub fn select(&self, element: &ElementKey, want: &Variant) -> Option<&RenditionKey> {
        best(self.variants(element).iter(), want)
    }

    /// Best variant across every group carrying the identifier registered for `name`.
    pub fn select_named(&self, name: &str, want: &Variant) -> Option<&RenditionKey> {
        let id = *self.names.get(name)?;
        best(
            self.groups_for_identifier(id).flat_map(|(_, v)| v.iter()),
            want,
        )
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn best<'k>(
    candidates: impl Iterator<Item = &'k RenditionKey>,
    want: &Variant,
) -> Option<&'k RenditionKey> {
    candidates
        .filter_map(|k| score(&k.flattened(), want).map(|s| (s, k)))
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.to_bytes().cmp(&b.1.to_bytes())))
        .map(|(_, k)| k)
}

#[cfg(test)]
#[path = "../../tests/unit/catalog/theme_store.rs"]
mod tests;

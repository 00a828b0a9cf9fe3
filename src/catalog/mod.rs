//! Named, typed view over an asset container.
//!
//! A [`Catalog`] resolves rendition names through the container's facet table, groups keys
//! structurally in a [`ThemeStore`], decodes CSI blobs into [`Rendition`]s, and implements the
//! editing operations (insert, replace image, remove) on top of [`AssetStorage`].

pub(crate) mod kind;
pub(crate) mod theme_store;

use std::collections::BTreeMap;
use std::path::Path;

use crate::csi::{BlendMode, CsiGenerator, CsiOpts, DecodedCsi, RenditionLayout};
use crate::foundation::core::Canvas;
use crate::foundation::error::{CarError, CarResult};
use crate::key::{AttributeId, ELEMENT_COLOR, ELEMENT_ICON, KeyToken, RenditionKey};
use crate::storage::{AssetStorage, OpenMode, StorageOpts};
use crate::surface::BitmapSurface;

pub use kind::RenditionKind;
pub use theme_store::{ElementKey, ThemeStore, Variant};

/// Part attribute used for plain bitmap renditions.
pub const PART_IMAGE: u16 = 181;

/// Border cleared around an inset slice before a replacement image is drawn into it.
const EDIT_CLEAR_BORDER: f64 = 2.0;

/// Options for opening and editing a catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CatalogOpts {
    /// Storage durability and integrity.
    pub storage: StorageOpts,
    /// CSI production for inserted and edited renditions.
    pub csi: CsiOpts,
}

/// One decoded rendition.
#[derive(Clone, Debug)]
pub struct Rendition {
    /// Storage key.
    pub key: RenditionKey,
    /// Name resolved through the facet table.
    pub name: Option<String>,
    /// Classification.
    pub kind: RenditionKind,
    /// Decoded blob.
    pub csi: DecodedCsi,
}

/// All keys that share one rendition name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedLookup {
    /// Rendition name.
    pub name: String,
    /// Keys in canonical order.
    pub keys: Vec<RenditionKey>,
}

/// A compiled asset catalog.
#[derive(Debug)]
pub struct Catalog {
    storage: AssetStorage,
    opts: CatalogOpts,
}

impl Catalog {
    /// Open read-only.
    pub fn open(path: impl AsRef<Path>) -> CarResult<Self> {
        Self::open_with_opts(path, OpenMode::ReadOnly, CatalogOpts::default())
    }

    /// Open for editing.
    pub fn open_for_editing(path: impl AsRef<Path>) -> CarResult<Self> {
        Self::open_with_opts(path, OpenMode::ReadWrite, CatalogOpts::default())
    }

    /// Open with explicit mode and options; storage failures come back as
    /// [`CarError::CatalogOpen`].
    #[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open_with_opts(
        path: impl AsRef<Path>,
        mode: OpenMode,
        opts: CatalogOpts,
    ) -> CarResult<Self> {
        let path = path.as_ref();
        let storage = AssetStorage::open_with_opts(path, mode, opts.storage).map_err(|e| {
            CarError::CatalogOpen {
                path: path.to_path_buf(),
                source: Box::new(e),
            }
        })?;
        Ok(Self { storage, opts })
    }

    /// Wrap an already open storage.
    pub fn from_storage(storage: AssetStorage, opts: CatalogOpts) -> Self {
        Self { storage, opts }
    }

    /// Underlying storage.
    pub fn storage(&self) -> &AssetStorage {
        &self.storage
    }

    /// Name a key resolves to, if its identifier is in the facet table.
    pub fn name_for_key(&self, key: &RenditionKey) -> Option<String> {
        self.storage.name_for_identifier(key.identifier()?)
    }

    fn named_groups(&self) -> BTreeMap<String, Vec<RenditionKey>> {
        let names = self.storage.facet_table();
        let mut groups: BTreeMap<String, Vec<RenditionKey>> = BTreeMap::new();
        for key in self.storage.all_keys() {
            let Some(name) = key.identifier().and_then(|id| names.get(&id)) else {
                continue;
            };
            groups.entry(name.clone()).or_default().push(key);
        }
        groups
    }

    /// Call `visit` once per distinct name, in sorted name order, with every key of that name.
    ///
    /// Keys whose identifier has no registered name are skipped here but remain reachable
    /// through [`theme_store`](Self::theme_store).
    pub fn enumerate_named_lookups(&self, mut visit: impl FnMut(&str, &[RenditionKey])) {
        for (name, keys) in self.named_groups() {
            visit(&name, &keys);
        }
    }

    /// Iterator form of [`enumerate_named_lookups`](Self::enumerate_named_lookups).
    pub fn named_lookups(&self) -> impl Iterator<Item = NamedLookup> + use<> {
        self.named_groups()
            .into_iter()
            .map(|(name, keys)| NamedLookup { name, keys })
    }

    /// Names that resolve to at least one stored key, sorted.
    pub fn all_rendition_names(&self) -> Vec<String> {
        self.named_groups().into_keys().collect()
    }

    /// Most attributes any key token may carry: the container's limit, or the largest token seen
    /// when the container sets none.
    pub fn maximum_rendition_key_token_count(&self) -> usize {
        if let Some(max) = self.storage.key_format().max_attributes {
            return usize::from(max);
        }
        self.storage
            .all_keys()
            .iter()
            .flat_map(|k| k.tokens().iter().map(KeyToken::len))
            .max()
            .unwrap_or(0)
    }

    /// Structural grouping with variant selection.
    pub fn theme_store(&self) -> ThemeStore {
        let names = self
            .storage
            .facet_table()
            .into_iter()
            .map(|(id, name)| (name, id))
            .collect();
        ThemeStore::new(self.storage.all_keys(), names)
    }

    /// Decode the rendition stored under `key`.
    pub fn rendition(&self, key: &RenditionKey) -> CarResult<Rendition> {
        let bytes = self.storage.asset_for(key)?;
        let csi = DecodedCsi::parse(&bytes)?;
        Ok(Rendition {
            kind: RenditionKind::classify(key, &csi),
            name: self.name_for_key(key),
            key: key.clone(),
            csi,
        })
    }

    /// Decode every rendition in key order.
    pub fn renditions(&self) -> CarResult<Vec<Rendition>> {
        let names = self.storage.facet_table();
        self.storage
            .iter()
            .map(|item| {
                let (key, bytes) = item?;
                let csi = DecodedCsi::parse(&bytes)?;
                Ok(Rendition {
                    kind: RenditionKind::classify(&key, &csi),
                    name: key.identifier().and_then(|id| names.get(&id).cloned()),
                    key,
                    csi,
                })
            })
            .collect()
    }

    /// Renditions grouped by kind; groups ordered by kind description, members by name.
    pub fn renditions_by_kind(&self) -> CarResult<Vec<(RenditionKind, Vec<Rendition>)>> {
        let mut groups: BTreeMap<RenditionKind, Vec<Rendition>> = BTreeMap::new();
        for r in self.renditions()? {
            groups.entry(r.kind).or_default().push(r);
        }
        let mut out: Vec<_> = groups.into_iter().collect();
        out.sort_by_key(|(kind, _)| kind.description());
        for (_, members) in &mut out {
            members.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(out)
    }

    /// Best bitmap for `name` at `want`, flattened and ready to draw.
    ///
    /// `Ok(None)` when the name is unknown, no variant qualifies, or the best variant carries no
    /// pixels (colors, raw data).
    pub fn image_for_name(&self, name: &str, want: &Variant) -> CarResult<Option<BitmapSurface>> {
        let store = self.theme_store();
        let Some(key) = store.select_named(name, want) else {
            return Ok(None);
        };
        let rendition = self.rendition(key)?;
        if rendition.csi.layers().is_empty() {
            return Ok(None);
        }
        rendition.csi.flatten().map(Some)
    }

    /// Store `image` as a bitmap rendition of `name` at `variant`. Not persisted until
    /// [`save`](Self::save).
    pub fn insert_image(
        &self,
        name: &str,
        image: &BitmapSurface,
        variant: &Variant,
    ) -> CarResult<RenditionKey> {
        let id = self.storage.register_name(name)?;
        let key = RenditionKey::single(
            variant.apply_to(
                KeyToken::new()
                    .with(AttributeId::Element, ELEMENT_ICON)
                    .with(AttributeId::Part, PART_IMAGE)
                    .with(AttributeId::Identifier, id),
            ),
        );

        let mut generator = CsiGenerator::with_opts(
            image.canvas(),
            0,
            RenditionLayout::OnePartScale,
            self.opts.csi,
        )?;
        generator.add_layer(image, BlendMode::Normal)?;
        generator.set_name(name)?;
        generator.set_scale_factor(u32::from(variant.scale.max(1)))?;
        let bytes = generator.finalize(true)?;
        self.storage.set(bytes, &key)?;
        Ok(key)
    }

    /// Store a color rendition for `name` and persist with compaction.
    pub fn insert_color(
        &self,
        name: &str,
        rgba: [f64; 4],
        exclude_from_contrast_filter: bool,
    ) -> CarResult<RenditionKey> {
        let id = self.storage.register_name(name)?;
        let key = RenditionKey::single(
            KeyToken::new()
                .with(AttributeId::Element, ELEMENT_COLOR)
                .with(AttributeId::Identifier, id),
        );

        let mut generator = CsiGenerator::with_opts(
            Canvas::new(0, 0),
            0,
            RenditionLayout::Color,
            self.opts.csi,
        )?;
        generator.set_name(name)?;
        generator.set_color(rgba)?;
        generator.set_excluded_from_contrast_filter(exclude_from_contrast_filter)?;
        let bytes = generator.finalize(false)?;
        self.storage.set(bytes, &key)?;
        self.storage.write_to_disk(true)?;
        Ok(key)
    }

    /// Replace the pixels of the bitmap rendition at `key`, keeping its metadata, layout and
    /// slices, then persist with compaction.
    ///
    /// When the first slice is inset from the canvas, the existing pixels are kept, a border of
    /// two pixels around the slice is cleared, and `image` is drawn into the slice. Otherwise
    /// `image` is drawn over the whole canvas.
    #[tracing::instrument(skip(self, key, image), fields(key = %key))]
    pub fn edit_image(&self, key: &RenditionKey, image: &BitmapSurface) -> CarResult<()> {
        let old = self.rendition(key)?;
        if old.csi.layers().is_empty() {
            return Err(CarError::invalid_metadata(format!(
                "{} rendition {key} has no pixels to replace",
                old.kind
            )));
        }

        let canvas = old.csi.canvas();
        let bounds = canvas.bounds();
        let target = old.csi.slices().first().copied().filter(|r| *r != bounds);

        let mut surface = match target {
            Some(_) => old.csi.composite_layers()?,
            None => BitmapSurface::new(canvas.width, canvas.height)?,
        };
        {
            let mut ctx = surface.context();
            match target {
                Some(rect) => {
                    ctx.clear_rect(rect.inset(EDIT_CLEAR_BORDER));
                    ctx.draw_surface(image, rect)?;
                }
                None => ctx.draw_surface(image, bounds)?,
            }
        }

        let slice_count = u32::try_from(old.csi.slices().len())
            .map_err(|_| CarError::invalid_metadata("too many slices"))?;
        let mut generator =
            CsiGenerator::with_opts(canvas, slice_count, old.csi.layout(), self.opts.csi)?;
        generator.set_metadata(old.csi.metadata().clone())?;
        generator.add_layer(&surface, BlendMode::Normal)?;
        for rect in old.csi.slices() {
            generator.add_slice_rect(*rect)?;
        }
        if let Some(data) = old.csi.raw_data() {
            generator.set_raw_data(data.to_vec())?;
        }
        let bytes = generator.finalize(true)?;

        self.storage.set(bytes, key)?;
        self.storage.write_to_disk(true)
    }

    /// Remove the rendition at `key` and persist with compaction.
    pub fn remove_item(&self, key: &RenditionKey) -> CarResult<()> {
        self.storage.remove(key)?;
        self.storage.write_to_disk(true)
    }

    /// Persist pending changes.
    pub fn save(&self, compact: bool) -> CarResult<()> {
        self.storage.write_to_disk(compact)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/catalog/mod.rs"]
mod tests;

//! Texture atlas cache for paint groups that stopped changing.
//!
//! A [`FrozenNode`] remembers the local bounds of one paint group and, per
//! surface, the atlas fragments that hold its pixels. The [`Freezer`] owns
//! every frozen node together with one [`FreezerSlice`] per surface, and is
//! the only place slots are allocated or released.

mod frozen;
mod row;
mod slice;
mod slot;

#[cfg(test)]
mod tests;

pub use frozen::{FrozenFragment, FrozenNode, FrozenNodeKey, FrozenRender, tile_bounds};
pub use row::FreezerRow;
pub use slice::{FreezerSlice, OffscreenObjects};
pub use slot::{AspectClass, FreezerSlot, FreezerSlotKey};

use std::collections::HashMap;
use std::fmt;

use paint_protocol::matrix::Matrix3x3;
use paint_protocol::{NodeId, OffscreenTarget, Rect, Surface, SurfaceId, WorldTransform};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::frozen::Fragments;

/// Largest scale at which frozen groups are rendered from the cache.
pub const FREEZER_TEXTURE_SCALE: f32 = 1.0;
/// Gutter in pixels between neighbouring cells of an atlas page.
pub const FREEZER_MARGIN: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezerConfig {
    /// Atlas pixels per local unit, in (0, 1].
    pub texture_scale: f32,
    pub margin: u32,
}

impl Default for FreezerConfig {
    fn default() -> Self {
        Self {
            texture_scale: FREEZER_TEXTURE_SCALE,
            margin: FREEZER_MARGIN,
        }
    }
}

impl FreezerConfig {
    pub fn validate(&self) -> Result<(), FreezerError> {
        let scale = self.texture_scale;
        if !scale.is_finite() || scale <= 0.0 || scale > 1.0 {
            return Err(FreezerError::InvalidTextureScale);
        }
        Ok(())
    }

    /// Edge of one fragment in local units.
    pub fn cell_size(&self, max_texture_size: u32) -> f32 {
        max_texture_size as f32 * self.texture_scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezerError {
    InvalidTextureScale,
    ZeroTextureSize,
    ZeroSizedSlot,
    SlotTooLarge {
        width: u32,
        height: u32,
        page_size: u32,
    },
    TextureUnavailable,
    GpuObjectUnavailable,
    StaleSlot,
    UnknownFrozenNode,
}

impl fmt::Display for FreezerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTextureScale => write!(f, "freezer texture scale must be in (0, 1]"),
            Self::ZeroTextureSize => write!(f, "surface reports a zero maximum texture size"),
            Self::ZeroSizedSlot => write!(f, "atlas slot must have a positive extent"),
            Self::SlotTooLarge {
                width,
                height,
                page_size,
            } => write!(
                f,
                "atlas slot {width}x{height} does not fit a {page_size}px page"
            ),
            Self::TextureUnavailable => write!(f, "gpu context could not create an atlas page"),
            Self::GpuObjectUnavailable => {
                write!(f, "gpu context could not create offscreen objects")
            }
            Self::StaleSlot => write!(f, "atlas slot was already released"),
            Self::UnknownFrozenNode => write!(f, "frozen node key is not live"),
        }
    }
}

impl std::error::Error for FreezerError {}

#[derive(Debug)]
pub struct Freezer {
    config: FreezerConfig,
    frozen: SlotMap<FrozenNodeKey, FrozenNode>,
    slices: HashMap<SurfaceId, FreezerSlice>,
}

impl Freezer {
    pub fn new(config: FreezerConfig) -> Result<Self, FreezerError> {
        config.validate()?;
        Ok(Self {
            config,
            frozen: SlotMap::with_key(),
            slices: HashMap::new(),
        })
    }

    pub fn config(&self) -> FreezerConfig {
        self.config
    }

    pub fn texture_scale(&self) -> f32 {
        self.config.texture_scale
    }

    pub fn len(&self) -> usize {
        self.frozen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frozen.is_empty()
    }

    pub fn slice(&self, surface: SurfaceId) -> Option<&FreezerSlice> {
        self.slices.get(&surface)
    }

    pub fn frozen(&self, key: FrozenNodeKey) -> Option<&FrozenNode> {
        self.frozen.get(key)
    }

    /// Starts caching `node`. Nothing is measured or allocated until the
    /// first paint.
    pub fn cache(&mut self, node: NodeId) -> FrozenNodeKey {
        log::debug!("[freezer] caching node {}", node.raw());
        self.frozen.insert(FrozenNode::new(node))
    }

    /// Stops caching and returns the slots of the frozen node to the atlas.
    pub fn remove(&mut self, key: FrozenNodeKey) -> Result<FrozenNode, FreezerError> {
        self.invalidate(key)?;
        self.frozen
            .remove(key)
            .ok_or(FreezerError::UnknownFrozenNode)
    }

    pub fn invalidate(&mut self, key: FrozenNodeKey) -> Result<(), FreezerError> {
        let node = self
            .frozen
            .get_mut(key)
            .ok_or(FreezerError::UnknownFrozenNode)?;
        let released = node.invalidate();
        release_fragments(&mut self.slices, released)
    }

    pub fn validate(
        &mut self,
        key: FrozenNodeKey,
        measure: impl FnOnce() -> Rect,
    ) -> Result<Rect, FreezerError> {
        let node = self
            .frozen
            .get_mut(key)
            .ok_or(FreezerError::UnknownFrozenNode)?;
        Ok(node.validate(measure))
    }

    /// Paints the frozen node into its atlas fragments on `surface`.
    ///
    /// The first paint after an invalidation tiles the bounds and allocates
    /// one slot per tile. Every call then redraws every fragment through
    /// `render_fragment`, which receives the transform from group-local space
    /// into that fragment. Returns `true` while the snapshot is not clean,
    /// including when the surface has no GPU context.
    pub fn paint(
        &mut self,
        key: FrozenNodeKey,
        surface: &mut dyn Surface,
        measure: impl FnOnce() -> Rect,
        render_fragment: &mut dyn FnMut(&mut dyn Surface, &WorldTransform) -> bool,
    ) -> Result<bool, FreezerError> {
        let node = self
            .frozen
            .get_mut(key)
            .ok_or(FreezerError::UnknownFrozenNode)?;
        let bounds = node.validate(measure);
        let surface_id = surface.id();
        let page_size = surface.max_texture_size();
        if page_size == 0 {
            return Err(FreezerError::ZeroTextureSize);
        }
        let texture_scale = self.config.texture_scale;
        let cell = self.config.cell_size(page_size);
        let margin = self.config.margin;
        let Some(gpu) = surface.gpu() else {
            return Ok(true);
        };
        let slice = self
            .slices
            .entry(surface_id)
            .or_insert_with(|| FreezerSlice::new(surface_id, page_size, margin));

        if !node.is_fragmented(surface_id) {
            let tiles = tile_bounds(bounds, cell);
            let mut fragments = Fragments::with_capacity(tiles.len());
            for local in tiles {
                let width = pixel_extent(local.width, texture_scale, slice.page_size());
                let height = pixel_extent(local.height, texture_scale, slice.page_size());
                match slice.allocate(gpu, width, height) {
                    Ok(slot) => fragments.push(FrozenFragment { slot, local }),
                    Err(error) => {
                        for fragment in &fragments {
                            if let Err(release) = slice.release(fragment.slot.key) {
                                log::warn!(
                                    "[freezer] releasing fragment of node {} during rollback: {release}",
                                    node.node().raw()
                                );
                            }
                        }
                        log::warn!(
                            "[freezer] could not allocate fragments for node {}: {error}",
                            node.node().raw()
                        );
                        return Err(error);
                    }
                }
            }
            log::debug!(
                "[freezer] node {} split into {} fragments of {}",
                node.node().raw(),
                fragments.len(),
                cell
            );
            node.set_fragments(surface_id, fragments);
        }

        let objects = slice.ensure_objects(gpu)?;
        let fragments: Fragments = node.fragments(surface_id).iter().copied().collect();
        let mut dirty = false;
        for fragment in &fragments {
            let Some(gpu) = surface.gpu() else {
                return Ok(true);
            };
            gpu.begin_offscreen(OffscreenTarget {
                framebuffer: objects.framebuffer,
                renderbuffer: objects.renderbuffer,
                texture: fragment.slot.texture,
                region: fragment.slot.region,
            });
            dirty |= render_fragment(surface, &fragment.paint_transform(texture_scale));
            if let Some(gpu) = surface.gpu() {
                gpu.end_offscreen();
            }
        }
        Ok(dirty)
    }

    /// Blits the cached fragments with `world` mapping group-local space to
    /// clip space.
    pub fn render(
        &self,
        key: FrozenNodeKey,
        surface: &mut dyn Surface,
        world: &Matrix3x3,
        needs_setup: bool,
    ) -> Result<FrozenRender, FreezerError> {
        let node = self
            .frozen
            .get(key)
            .ok_or(FreezerError::UnknownFrozenNode)?;
        let surface_id = surface.id();
        let Some(objects) = self.slices.get(&surface_id).and_then(FreezerSlice::objects) else {
            return Ok(FrozenRender::NotCached);
        };
        let Some(gpu) = surface.gpu() else {
            return Ok(FrozenRender::NotCached);
        };
        Ok(node.render(surface_id, gpu, objects.program, world, needs_setup))
    }

    /// Drops the atlas of `surface` when its context is lost. Frozen nodes
    /// are invalidated and repaint only when painted again.
    pub fn context_changed(&mut self, surface: SurfaceId, is_lost: bool) {
        if !is_lost {
            return;
        }
        if self.slices.remove(&surface).is_some() {
            log::debug!("[freezer] dropped atlas of lost surface {}", surface.raw());
        }
        for node in self.frozen.values_mut() {
            let released = node.invalidate();
            if let Err(error) = release_fragments(&mut self.slices, released) {
                log::warn!("[freezer] releasing fragments after context loss: {error}");
            }
        }
    }

    /// Forgets everything cached for `surface` while keeping measured bounds.
    pub fn unmount(&mut self, surface: SurfaceId) {
        self.slices.remove(&surface);
        for node in self.frozen.values_mut() {
            node.drop_surface(surface);
        }
    }

    pub fn dispose(&mut self) {
        self.frozen.clear();
        self.slices.clear();
    }
}

fn pixel_extent(local: f32, texture_scale: f32, page_size: u32) -> u32 {
    ((local * texture_scale).ceil() as u32).clamp(1, page_size)
}

fn release_fragments(
    slices: &mut HashMap<SurfaceId, FreezerSlice>,
    released: Vec<(SurfaceId, FrozenFragment)>,
) -> Result<(), FreezerError> {
    let mut result = Ok(());
    for (surface, fragment) in released {
        let Some(slice) = slices.get_mut(&surface) else {
            continue;
        };
        if let Err(error) = slice.release(fragment.slot.key) {
            log::warn!(
                "[freezer] surface {} slot {:?}: {error}",
                surface.raw(),
                fragment.slot.key
            );
            result = result.and(Err(error));
        }
    }
    result
}

use std::collections::HashMap;

use paint_protocol::matrix::{self, Matrix3x3};
use paint_protocol::{
    GpuContext, NodeId, ProgramHandle, Rect, SurfaceId, TexturedQuad, WorldTransform,
};
use smallvec::SmallVec;

use crate::slot::FreezerSlot;

slotmap::new_key_type! {
    pub struct FrozenNodeKey;
}

/// One atlas slot and the part of the frozen group it holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrozenFragment {
    pub slot: FreezerSlot,
    /// Covered rectangle in the paint group's local space.
    pub local: Rect,
}

impl FrozenFragment {
    /// Transform that lands `local` exactly on the fragment's atlas region.
    pub fn paint_transform(&self, texture_scale: f32) -> WorldTransform {
        let region = self.slot.region;
        let (width, height) = (region.width as f32, region.height as f32);
        let to_region = matrix::multiply(
            &matrix::scale(texture_scale),
            &matrix::translation(-self.local.x, -self.local.y),
        );
        WorldTransform::new(
            matrix::multiply(&matrix::pixel_to_clip(width, height), &to_region),
            texture_scale,
            width,
            height,
            self.local.x,
            self.local.y,
        )
    }
}

pub(crate) type Fragments = SmallVec<[FrozenFragment; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrozenRender {
    /// Nothing usable in the cache for this surface; render live instead.
    NotCached,
    Rendered { clean: bool },
}

/// Snapshot of one paint group kept in atlas fragments per surface.
#[derive(Debug)]
pub struct FrozenNode {
    node: NodeId,
    bounds: Option<Rect>,
    fragments: HashMap<SurfaceId, Fragments>,
}

impl FrozenNode {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            bounds: None,
            fragments: HashMap::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_validated(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn fragments(&self, surface: SurfaceId) -> &[FrozenFragment] {
        self.fragments
            .get(&surface)
            .map_or(&[][..], |fragments| fragments.as_slice())
    }

    pub fn is_fragmented(&self, surface: SurfaceId) -> bool {
        self.fragments.contains_key(&surface)
    }

    /// Measures the group once. Later calls return the cached bounds until
    /// the node is invalidated.
    pub fn validate(&mut self, measure: impl FnOnce() -> Rect) -> Rect {
        *self.bounds.get_or_insert_with(measure)
    }

    /// Forgets the bounds and hands back every fragment so the caller can
    /// return their slots to the atlas.
    pub(crate) fn invalidate(&mut self) -> Vec<(SurfaceId, FrozenFragment)> {
        log::debug!("[freezer] invalidating frozen node {}", self.node.raw());
        self.bounds = None;
        self.fragments
            .drain()
            .flat_map(|(surface, fragments)| {
                fragments.into_iter().map(move |fragment| (surface, fragment))
            })
            .collect()
    }

    pub(crate) fn set_fragments(&mut self, surface: SurfaceId, fragments: Fragments) {
        self.fragments.insert(surface, fragments);
    }

    pub(crate) fn drop_surface(&mut self, surface: SurfaceId) -> Option<Fragments> {
        self.fragments.remove(&surface)
    }

    /// Blits every fragment. Only the first clean draw uploads texture data
    /// and sets up GPU state; the fragments after it reuse that work.
    pub(crate) fn render(
        &self,
        surface: SurfaceId,
        gpu: &mut dyn GpuContext,
        program: ProgramHandle,
        world: &Matrix3x3,
        mut needs_setup: bool,
    ) -> FrozenRender {
        if !self.is_validated() {
            return FrozenRender::NotCached;
        }
        let fragments = self.fragments(surface);
        if fragments.is_empty() {
            return FrozenRender::NotCached;
        }
        let mut clean = true;
        let mut needs_load = true;
        for fragment in fragments {
            let drawn = gpu.draw_textured_quad(TexturedQuad {
                program,
                texture: fragment.slot.texture,
                source: fragment.slot.region,
                destination: fragment.local,
                world,
                needs_setup,
                needs_load,
            });
            if drawn {
                needs_load = false;
                needs_setup = false;
            } else {
                clean = false;
            }
        }
        FrozenRender::Rendered { clean }
    }
}

/// Splits `bounds` into `cell`-sized tiles, row by row. Edge tiles are
/// clipped to the bounds.
pub fn tile_bounds(bounds: Rect, cell: f32) -> Vec<Rect> {
    assert!(cell > 0.0, "freezer cell size must be positive, got {cell}");
    if bounds.is_empty() {
        return Vec::new();
    }
    let columns = (bounds.width / cell).ceil() as usize;
    let rows = (bounds.height / cell).ceil() as usize;
    let mut tiles = Vec::with_capacity(columns * rows);
    for row in 0..rows {
        let offset_y = row as f32 * cell;
        let height = (bounds.height - offset_y).min(cell);
        for column in 0..columns {
            let offset_x = column as f32 * cell;
            let width = (bounds.width - offset_x).min(cell);
            tiles.push(Rect::new(
                bounds.x + offset_x,
                bounds.y + offset_y,
                width,
                height,
            ));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiles_cover_bounds_without_gaps_or_overlaps() {
        let bounds = Rect::new(-50.0, 10.0, 1000.0, 300.0);
        let tiles = tile_bounds(bounds, 256.0);

        assert_eq!(tiles.len(), 4 * 2);
        let area: f32 = tiles.iter().map(|tile| tile.width * tile.height).sum();
        assert!((area - bounds.width * bounds.height).abs() < 1e-2);
        for (index, tile) in tiles.iter().enumerate() {
            for other in &tiles[index + 1..] {
                assert!(!tile.intersects(other), "{tile:?} overlaps {other:?}");
            }
        }
        let mut union = Rect::EMPTY;
        for tile in &tiles {
            union.include(tile);
        }
        assert_eq!(union, bounds);
    }

    #[test]
    fn empty_bounds_produce_no_tiles() {
        assert!(tile_bounds(Rect::new(5.0, 5.0, 0.0, 20.0), 64.0).is_empty());
    }

    #[test]
    fn validate_measures_once_until_invalidated() {
        let mut node = FrozenNode::new(NodeId::new(3));
        let mut measured = 0;
        let first = node.validate(|| {
            measured += 1;
            Rect::new(0.0, 0.0, 10.0, 10.0)
        });
        let second = node.validate(|| {
            measured += 1;
            Rect::new(0.0, 0.0, 99.0, 99.0)
        });
        assert_eq!(first, second);
        assert_eq!(measured, 1);

        node.invalidate();
        assert!(!node.is_validated());
        let third = node.validate(|| Rect::new(0.0, 0.0, 99.0, 99.0));
        assert_eq!(third.width, 99.0);
    }
}

//! Shared paint types and the collaborator traits consumed by the painter.
//!
//! The node tree, the layout solver, the camera and the drawing surfaces are
//! owned by the host. This crate only fixes the shape of those boundaries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod gpu;
mod labels;
pub mod matrix;
mod rect;
mod world;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use gpu::{
    AtlasRegion, FramebufferHandle, GpuContext, GpuHandle, OffscreenTarget, ProgramHandle,
    RenderbufferHandle, TextureHandle, TexturedQuad,
};
pub use labels::{MIN_LABEL_PIXEL_SIZE, WorldLabel, WorldLabels};
pub use matrix::Matrix3x3;
pub use rect::Rect;
pub use world::WorldTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(u32);

impl SurfaceId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Identity of a rendering strategy. Two nodes belong to the same paint
/// subgroup only when their artist ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtistId(u32);

impl ArtistId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsolutePosition {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

/// Geometry the layout solver has committed for one node.
///
/// `group_*` values are relative to the node's paint group root. `absolute`
/// is `None` until the solver has positioned the node in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeLayout {
    pub absolute: Option<AbsolutePosition>,
    pub group_x: f32,
    pub group_y: f32,
    pub group_width: f32,
    pub group_height: f32,
    pub group_scale: f32,
    pub scale: f32,
}

impl NodeLayout {
    pub fn needs_absolute_pos(&self) -> bool {
        self.absolute.is_none()
    }

    pub fn absolute_x(&self) -> f32 {
        self.absolute.map_or(0.0, |position| position.x)
    }

    pub fn absolute_y(&self) -> f32 {
        self.absolute.map_or(0.0, |position| position.y)
    }

    pub fn absolute_scale(&self) -> f32 {
        self.absolute.map_or(1.0, |position| position.scale)
    }

    /// Box covered by this node in its paint group's coordinate space.
    pub fn group_rect(&self) -> Rect {
        Rect::from_center(
            self.group_x,
            self.group_y,
            self.group_width,
            self.group_height,
        )
    }
}

impl Default for NodeLayout {
    fn default() -> Self {
        Self {
            absolute: None,
            group_x: 0.0,
            group_y: 0.0,
            group_width: 0.0,
            group_height: 0.0,
            group_scale: 1.0,
            scale: 1.0,
        }
    }
}

/// Read access to the host's node tree.
///
/// Paint groups form a cycle: starting at the root, `next_paint_group`
/// eventually returns the root again. Inside a group, `next_in_group` walks
/// the nodes owned by that group (excluding nested paint groups) and returns
/// `None` after the last one.
pub trait PaintTree {
    fn is_root(&self, node: NodeId) -> bool;

    fn is_paint_group_root(&self, node: NodeId) -> bool;

    fn next_paint_group(&self, node: NodeId) -> NodeId;

    /// Root of the paint group that owns `node`.
    fn paint_group_of(&self, node: NodeId) -> NodeId;

    fn next_in_group(&self, node: NodeId) -> Option<NodeId>;

    fn needs_commit(&self, node: NodeId) -> bool;

    fn artist(&self, node: NodeId) -> ArtistId;

    fn layout(&self, node: NodeId) -> NodeLayout;

    fn for_each_in_group(&self, group_root: NodeId, visitor: &mut dyn FnMut(NodeId)) {
        let mut node = Some(group_root);
        while let Some(current) = node {
            visitor(current);
            node = self.next_in_group(current);
        }
    }
}

/// Opaque resume point of an unfinished layout commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayoutContinuation {
    pub node: NodeId,
    pub pass: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutProgress {
    Complete,
    Incomplete(LayoutContinuation),
}

pub trait LayoutCommit {
    /// Commits pending layout under `root`, starting over when `resume` is
    /// `None`. A `None` timeout is unbounded.
    fn commit_layout(
        &mut self,
        root: NodeId,
        resume: Option<LayoutContinuation>,
        timeout: Option<Duration>,
    ) -> LayoutProgress;
}

/// A tree that can also commit its own layout.
pub trait Scene: PaintTree + LayoutCommit {
    fn as_tree(&self) -> &dyn PaintTree;
}

impl<T: PaintTree + LayoutCommit> Scene for T {
    fn as_tree(&self) -> &dyn PaintTree {
        self
    }
}

pub trait Camera {
    fn can_project(&self) -> bool;

    /// World-to-clip matrix.
    fn project(&self) -> Matrix3x3;

    fn scale(&self) -> f32;

    fn x(&self) -> f32;

    fn y(&self) -> f32;

    fn width(&self) -> f32;

    fn height(&self) -> f32;

    fn contains_any(&self, rect: &Rect) -> bool;
}

pub trait Overlay {
    fn save(&mut self);

    fn restore(&mut self);

    fn reset_transform(&mut self);

    fn scale(&mut self, scale_x: f32, scale_y: f32);

    fn translate(&mut self, x: f32, y: f32);

    fn set_fill_color(&mut self, rgba: [f32; 4]);

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_size: f32);
}

/// A drawing target ("projector").
pub trait Surface {
    fn id(&self) -> SurfaceId;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn max_texture_size(&self) -> u32;

    fn device_pixel_scale(&self) -> f32 {
        1.0
    }

    fn is_context_lost(&self) -> bool;

    fn overlay(&mut self) -> Option<&mut dyn Overlay>;

    /// `None` while the GPU context is lost or the surface has none.
    fn gpu(&mut self) -> Option<&mut dyn GpuContext>;

    fn has_overlay(&mut self) -> bool {
        self.overlay().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_layout_without_absolute_position_reports_identity_transform() {
        let layout = NodeLayout::default();
        assert!(layout.needs_absolute_pos());
        assert_eq!(layout.absolute_x(), 0.0);
        assert_eq!(layout.absolute_scale(), 1.0);
    }

    #[test]
    fn group_rect_is_centered_on_group_position() {
        let layout = NodeLayout {
            group_x: 10.0,
            group_y: -4.0,
            group_width: 6.0,
            group_height: 8.0,
            ..NodeLayout::default()
        };
        assert_eq!(layout.group_rect(), Rect::new(7.0, -8.0, 6.0, 8.0));
    }

    #[test]
    fn ids_round_trip_through_json() {
        let encoded = serde_json::to_string(&NodeId::new(42)).expect("encode node id");
        let decoded: NodeId = serde_json::from_str(&encoded).expect("decode node id");
        assert_eq!(decoded.raw(), 42);
    }
}

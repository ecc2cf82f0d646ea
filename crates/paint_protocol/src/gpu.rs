use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::matrix::Matrix3x3;
use crate::rect::Rect;

/// Handle to an object living inside a [`GpuContext`]. Handles become
/// meaningless once the context is lost.
#[derive(Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct GpuHandle<Tag> {
    raw: u64,
    _marker: PhantomData<Tag>,
}

impl<Tag> Copy for GpuHandle<Tag> {}

impl<Tag> Clone for GpuHandle<Tag> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag> GpuHandle<Tag> {
    pub const fn new(raw: u64) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn raw(self) -> u64 {
        self.raw
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub enum TextureTag {}
pub type TextureHandle = GpuHandle<TextureTag>;

#[derive(Debug, PartialEq, Eq, Hash)]
pub enum FramebufferTag {}
pub type FramebufferHandle = GpuHandle<FramebufferTag>;

#[derive(Debug, PartialEq, Eq, Hash)]
pub enum RenderbufferTag {}
pub type RenderbufferHandle = GpuHandle<RenderbufferTag>;

#[derive(Debug, PartialEq, Eq, Hash)]
pub enum ProgramTag {}
pub type ProgramHandle = GpuHandle<ProgramTag>;

/// Pixel rectangle inside an atlas texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRegion {
    pub fn max_x(&self) -> u32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> u32 {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &AtlasRegion) -> bool {
        self.x < other.max_x()
            && other.x < self.max_x()
            && self.y < other.max_y()
            && other.y < self.max_y()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffscreenTarget {
    pub framebuffer: FramebufferHandle,
    pub renderbuffer: RenderbufferHandle,
    pub texture: TextureHandle,
    pub region: AtlasRegion,
}

/// One cached atlas region drawn into world space.
#[derive(Debug, Clone, Copy)]
pub struct TexturedQuad<'a> {
    pub program: ProgramHandle,
    pub texture: TextureHandle,
    pub source: AtlasRegion,
    /// Destination in the frozen group's local space.
    pub destination: Rect,
    pub world: &'a Matrix3x3,
    pub needs_setup: bool,
    pub needs_load: bool,
}

pub trait GpuContext {
    fn create_texture(&mut self, width: u32, height: u32) -> Option<TextureHandle>;

    fn create_framebuffer(&mut self) -> Option<FramebufferHandle>;

    fn create_renderbuffer(&mut self, width: u32, height: u32) -> Option<RenderbufferHandle>;

    fn create_blit_program(&mut self) -> Option<ProgramHandle>;

    /// Redirects subsequent drawing into `target.region` of `target.texture`
    /// and clears that region.
    fn begin_offscreen(&mut self, target: OffscreenTarget);

    fn end_offscreen(&mut self);

    /// Returns `true` when the quad was drawn without pending work.
    fn draw_textured_quad(&mut self, quad: TexturedQuad<'_>) -> bool;

    fn clear(&mut self, rgba: [f32; 4]);
}

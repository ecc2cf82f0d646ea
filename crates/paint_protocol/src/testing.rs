//! Recording fakes of the surface, GPU, overlay and camera collaborators.

use crate::gpu::{
    AtlasRegion, FramebufferHandle, GpuContext, OffscreenTarget, ProgramHandle,
    RenderbufferHandle, TextureHandle, TexturedQuad,
};
use crate::matrix::{self, Matrix3x3};
use crate::rect::Rect;
use crate::{Camera, Overlay, Surface, SurfaceId};

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCall {
    Save,
    Restore,
    ResetTransform,
    Scale(f32, f32),
    Translate(f32, f32),
    SetFillColor([f32; 4]),
    ClearRect(f32, f32, f32, f32),
    FillText(String),
}

#[derive(Debug, Default)]
pub struct RecordingOverlay {
    pub calls: Vec<OverlayCall>,
}

impl RecordingOverlay {
    pub fn texts(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                OverlayCall::FillText(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Overlay for RecordingOverlay {
    fn save(&mut self) {
        self.calls.push(OverlayCall::Save);
    }

    fn restore(&mut self) {
        self.calls.push(OverlayCall::Restore);
    }

    fn reset_transform(&mut self) {
        self.calls.push(OverlayCall::ResetTransform);
    }

    fn scale(&mut self, scale_x: f32, scale_y: f32) {
        self.calls.push(OverlayCall::Scale(scale_x, scale_y));
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.calls.push(OverlayCall::Translate(x, y));
    }

    fn set_fill_color(&mut self, rgba: [f32; 4]) {
        self.calls.push(OverlayCall::SetFillColor(rgba));
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.calls.push(OverlayCall::ClearRect(x, y, width, height));
    }

    fn fill_text(&mut self, text: &str, _x: f32, _y: f32, _font_size: f32) {
        self.calls.push(OverlayCall::FillText(text.to_owned()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedQuad {
    pub texture: TextureHandle,
    pub source: AtlasRegion,
    pub destination: Rect,
    pub needs_setup: bool,
    pub needs_load: bool,
}

#[derive(Debug)]
pub struct RecordingGpu {
    next_handle: u64,
    pub textures: Vec<(TextureHandle, u32, u32)>,
    pub framebuffers_created: u32,
    pub renderbuffers_created: u32,
    pub programs_created: u32,
    pub offscreen_targets: Vec<OffscreenTarget>,
    pub offscreen_active: bool,
    pub quads: Vec<RecordedQuad>,
    pub clears: Vec<[f32; 4]>,
    /// Value returned from `draw_textured_quad`.
    pub quad_result: bool,
    /// `create_texture` fails once this many textures exist.
    pub texture_limit: Option<usize>,
}

impl Default for RecordingGpu {
    fn default() -> Self {
        Self {
            next_handle: 1,
            textures: Vec::new(),
            framebuffers_created: 0,
            renderbuffers_created: 0,
            programs_created: 0,
            offscreen_targets: Vec::new(),
            offscreen_active: false,
            quads: Vec::new(),
            clears: Vec::new(),
            quad_result: true,
            texture_limit: None,
        }
    }
}

impl RecordingGpu {
    fn next_raw(&mut self) -> u64 {
        let raw = self.next_handle;
        self.next_handle = self
            .next_handle
            .checked_add(1)
            .expect("recording gpu handle overflow");
        raw
    }
}

impl GpuContext for RecordingGpu {
    fn create_texture(&mut self, width: u32, height: u32) -> Option<TextureHandle> {
        if self
            .texture_limit
            .is_some_and(|limit| self.textures.len() >= limit)
        {
            return None;
        }
        let handle = TextureHandle::new(self.next_raw());
        self.textures.push((handle, width, height));
        Some(handle)
    }

    fn create_framebuffer(&mut self) -> Option<FramebufferHandle> {
        self.framebuffers_created += 1;
        Some(FramebufferHandle::new(self.next_raw()))
    }

    fn create_renderbuffer(&mut self, _width: u32, _height: u32) -> Option<RenderbufferHandle> {
        self.renderbuffers_created += 1;
        Some(RenderbufferHandle::new(self.next_raw()))
    }

    fn create_blit_program(&mut self) -> Option<ProgramHandle> {
        self.programs_created += 1;
        Some(ProgramHandle::new(self.next_raw()))
    }

    fn begin_offscreen(&mut self, target: OffscreenTarget) {
        assert!(!self.offscreen_active, "offscreen passes must not nest");
        self.offscreen_active = true;
        self.offscreen_targets.push(target);
    }

    fn end_offscreen(&mut self) {
        assert!(self.offscreen_active, "end_offscreen without begin_offscreen");
        self.offscreen_active = false;
    }

    fn draw_textured_quad(&mut self, quad: TexturedQuad<'_>) -> bool {
        self.quads.push(RecordedQuad {
            texture: quad.texture,
            source: quad.source,
            destination: quad.destination,
            needs_setup: quad.needs_setup,
            needs_load: quad.needs_load,
        });
        self.quad_result
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        self.clears.push(rgba);
    }
}

#[derive(Debug)]
pub struct RecordingSurface {
    id: SurfaceId,
    pub width: u32,
    pub height: u32,
    pub max_texture_size: u32,
    pub context_lost: bool,
    pub overlay: Option<RecordingOverlay>,
    pub gpu: RecordingGpu,
}

impl RecordingSurface {
    pub fn new(id: u32, max_texture_size: u32) -> Self {
        Self {
            id: SurfaceId::new(id),
            width: 800,
            height: 600,
            max_texture_size,
            context_lost: false,
            overlay: Some(RecordingOverlay::default()),
            gpu: RecordingGpu::default(),
        }
    }

    pub fn overlay_calls(&self) -> &[OverlayCall] {
        self.overlay
            .as_ref()
            .map_or(&[][..], |overlay| overlay.calls.as_slice())
    }
}

impl Surface for RecordingSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    fn overlay(&mut self) -> Option<&mut dyn Overlay> {
        self.overlay
            .as_mut()
            .map(|overlay| overlay as &mut dyn Overlay)
    }

    fn gpu(&mut self) -> Option<&mut dyn GpuContext> {
        if self.context_lost {
            return None;
        }
        Some(&mut self.gpu)
    }
}

/// Orthographic camera looking at a fixed world rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCamera {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub width: f32,
    pub height: f32,
    pub projectable: bool,
}

impl FixedCamera {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            width,
            height,
            projectable: true,
        }
    }

    /// World rectangle currently on screen.
    pub fn visible_rect(&self) -> Rect {
        Rect::new(
            -self.x,
            -self.y,
            self.width / self.scale,
            self.height / self.scale,
        )
    }
}

impl Camera for FixedCamera {
    fn can_project(&self) -> bool {
        self.projectable && self.width > 0.0 && self.height > 0.0
    }

    fn project(&self) -> Matrix3x3 {
        let view = matrix::multiply(
            &matrix::scale(self.scale),
            &matrix::translation(self.x, self.y),
        );
        matrix::multiply(&matrix::pixel_to_clip(self.width, self.height), &view)
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn x(&self) -> f32 {
        self.x
    }

    fn y(&self) -> f32 {
        self.y
    }

    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn contains_any(&self, rect: &Rect) -> bool {
        self.visible_rect().intersects(rect)
    }
}

use std::time::Duration;

use paint_protocol::{PaintTree, Scene, Surface};

use crate::graph_painter::GraphPainter;

pub const DEFAULT_BACKGROUND: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Frame driver around a [`GraphPainter`]: tracks whether the next frame
/// needs a paint, a render, or nothing at all.
pub struct Viewport {
    painter: GraphPainter,
    background: [f32; 4],
    needs_repaint: bool,
    needs_render: bool,
    last_size: Option<(u32, u32)>,
}

impl Viewport {
    pub fn new(painter: GraphPainter) -> Self {
        Self {
            painter,
            background: DEFAULT_BACKGROUND,
            needs_repaint: true,
            needs_render: true,
            last_size: None,
        }
    }

    pub fn painter(&self) -> &GraphPainter {
        &self.painter
    }

    pub fn painter_mut(&mut self) -> &mut GraphPainter {
        &mut self.painter
    }

    pub fn background_color(&self) -> [f32; 4] {
        self.background
    }

    pub fn set_background_color(&mut self, rgba: [f32; 4]) {
        if self.background == rgba {
            return;
        }
        self.background = rgba;
        self.needs_render = true;
    }

    pub fn schedule_repaint(&mut self) {
        self.needs_repaint = true;
    }

    pub fn schedule_render(&mut self) {
        self.needs_render = true;
    }

    pub fn needs_repaint(&self) -> bool {
        self.needs_repaint || self.painter.is_dirty()
    }

    pub fn needs_render(&self) -> bool {
        self.needs_repaint() || self.needs_render
    }

    /// Paints if anything asked for it. Returns `true` while the paint is
    /// unfinished.
    pub fn paint(
        &mut self,
        scene: &mut dyn Scene,
        surface: &mut dyn Surface,
        timeout: Option<Duration>,
    ) -> bool {
        if !self.needs_repaint() {
            return false;
        }
        let needs_more_work = self.painter.paint(scene, surface, timeout);
        self.needs_repaint = needs_more_work;
        self.needs_render = true;
        needs_more_work
    }

    /// Clears the surface and renders the painter. Returns `false` when the
    /// frame was skipped.
    pub fn render(&mut self, tree: &dyn PaintTree, surface: &mut dyn Surface) -> bool {
        if surface.is_context_lost() {
            return false;
        }
        let size = (surface.width(), surface.height());
        let resized = self.last_size != Some(size);
        if !resized && !self.needs_render {
            log::trace!("[viewport] nothing changed, skipping render");
            return false;
        }
        self.last_size = Some(size);

        let background = self.background;
        if let Some(gpu) = surface.gpu() {
            gpu.clear(background);
        }
        if let Some(overlay) = surface.overlay() {
            overlay.reset_transform();
            overlay.set_fill_color(background);
            overlay.clear_rect(0.0, 0.0, size.0 as f32, size.1 as f32);
        }

        self.needs_render = self.painter.render(tree, surface);
        true
    }
}

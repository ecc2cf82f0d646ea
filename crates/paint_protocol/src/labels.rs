use crate::Overlay;
use crate::rect::Rect;

/// Labels smaller than this on screen are not drawn.
pub const MIN_LABEL_PIXEL_SIZE: f32 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct WorldLabel {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub scale: f32,
}

/// Text collected from every paint group during one render pass and drawn
/// once on top of all of them.
#[derive(Debug, Clone, Default)]
pub struct WorldLabels {
    labels: Vec<WorldLabel>,
}

impl WorldLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, text: impl Into<String>, x: f32, y: f32, font_size: f32, scale: f32) {
        self.labels.push(WorldLabel {
            text: text.into(),
            x,
            y,
            font_size,
            scale,
        });
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldLabel> {
        self.labels.iter()
    }

    /// Draws every label inside the world rectangle centered on
    /// (`world_x`, `world_y`). Returns the number of labels drawn.
    pub fn render(
        &self,
        overlay: &mut dyn Overlay,
        world_x: f32,
        world_y: f32,
        world_width: f32,
        world_height: f32,
        scale: f32,
    ) -> usize {
        let visible = Rect::from_center(world_x, world_y, world_width, world_height);
        let mut drawn = 0;
        for label in &self.labels {
            if label.font_size * label.scale * scale < MIN_LABEL_PIXEL_SIZE {
                continue;
            }
            if !visible.contains_point(label.x, label.y) {
                continue;
            }
            overlay.fill_text(&label.text, label.x, label.y, label.font_size * label.scale);
            drawn += 1;
        }
        drawn
    }
}

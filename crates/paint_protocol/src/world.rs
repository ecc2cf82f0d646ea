use crate::matrix::{self, Matrix3x3};

/// Everything a view needs to map its local paint coordinates onto a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    matrix: Matrix3x3,
    scale: f32,
    width: f32,
    height: f32,
    origin_x: f32,
    origin_y: f32,
}

impl WorldTransform {
    pub const fn new(
        matrix: Matrix3x3,
        scale: f32,
        width: f32,
        height: f32,
        origin_x: f32,
        origin_y: f32,
    ) -> Self {
        Self {
            matrix,
            scale,
            width,
            height,
            origin_x,
            origin_y,
        }
    }

    /// Transform used when no camera is attached.
    pub const fn identity(width: f32, height: f32) -> Self {
        Self::new(matrix::IDENTITY, 1.0, width, height, 0.0, 0.0)
    }

    pub fn matrix(&self) -> &Matrix3x3 {
        &self.matrix
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn origin(&self) -> (f32, f32) {
        (self.origin_x, self.origin_y)
    }
}

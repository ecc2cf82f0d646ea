//! Row-major 3x3 affine matrices.
//!
//! Points are column vectors: `[x', y', 1] = M * [x, y, 1]`, so the
//! translation lives in the last column.

pub type Matrix3x3 = [[f32; 3]; 3];

pub const IDENTITY: Matrix3x3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

pub const fn scale(factor: f32) -> Matrix3x3 {
    [[factor, 0.0, 0.0], [0.0, factor, 0.0], [0.0, 0.0, 1.0]]
}

pub const fn translation(x: f32, y: f32) -> Matrix3x3 {
    [[1.0, 0.0, x], [0.0, 1.0, y], [0.0, 0.0, 1.0]]
}

/// Returns `left * right`; `right` is applied to a point first.
pub fn multiply(left: &Matrix3x3, right: &Matrix3x3) -> Matrix3x3 {
    let mut out = [[0.0; 3]; 3];
    for (row, out_row) in out.iter_mut().enumerate() {
        for (column, cell) in out_row.iter_mut().enumerate() {
            *cell = (0..3)
                .map(|index| left[row][index] * right[index][column])
                .sum();
        }
    }
    out
}

pub fn transform_point(matrix: &Matrix3x3, x: f32, y: f32) -> (f32, f32) {
    (
        matrix[0][0] * x + matrix[0][1] * y + matrix[0][2],
        matrix[1][0] * x + matrix[1][1] * y + matrix[1][2],
    )
}

/// Maps a `width` x `height` pixel region with a top-left origin to clip space.
pub fn pixel_to_clip(width: f32, height: f32) -> Matrix3x3 {
    assert!(
        width > 0.0 && height > 0.0,
        "clip extent must be positive, got {width}x{height}"
    );
    [
        [2.0 / width, 0.0, -1.0],
        [0.0, -2.0 / height, 1.0],
        [0.0, 0.0, 1.0],
    ]
}

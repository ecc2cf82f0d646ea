//! Incremental painting and rendering of a node tree.
//!
//! The tree is split into paint groups. Each group is split again into
//! subgroups, one per run of nodes that share an artist. Artists build one
//! view per surface and patch it in place on later paints. Groups can be
//! frozen into the texture atlas kept by [`freezer::Freezer`].

mod artist;
mod cursor;
mod graph_painter;
mod group;
mod subgroup;
mod viewport;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;


pub use artist::{Artist, ArtistRegistry, NodeValues, NodeValuesIter, ProjectedView};
pub use cursor::{PaintCursor, PaintPhase};
pub use graph_painter::GraphPainter;
pub use group::{
    GroupRender, GroupRenderPass, PaintGroup, paint_group_bounds, world_matrix, world_scale,
};
pub use subgroup::{PaintSubgroup, split_runs};
pub use viewport::{DEFAULT_BACKGROUND, Viewport};

use std::fmt;

use frame_scheduler::{AnalyticsConfig, AnalyticsConfigError};
use freezer::{FreezerConfig, FreezerError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    /// Render paint groups last to first.
    pub reverse_render_order: bool,
    pub analytics: AnalyticsConfig,
    pub freezer: FreezerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PainterError {
    Analytics(AnalyticsConfigError),
    Freezer(FreezerError),
}

impl From<AnalyticsConfigError> for PainterError {
    fn from(error: AnalyticsConfigError) -> Self {
        Self::Analytics(error)
    }
}

impl From<FreezerError> for PainterError {
    fn from(error: FreezerError) -> Self {
        Self::Freezer(error)
    }
}

impl fmt::Display for PainterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analytics(error) => write!(f, "invalid analytics config: {error}"),
            Self::Freezer(error) => write!(f, "invalid freezer config: {error}"),
        }
    }
}

impl std::error::Error for PainterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Analytics(error) => Some(error),
            Self::Freezer(error) => Some(error),
        }
    }
}

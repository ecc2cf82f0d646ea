use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use paint_protocol::{ArtistId, NodeId, PaintTree, Rect, Surface, WorldLabels, WorldTransform};

/// A contiguous run of nodes inside one paint group, handed to an artist.
#[derive(Clone, Copy)]
pub struct NodeValues<'a> {
    tree: &'a dyn PaintTree,
    start: NodeId,
    len: usize,
}

impl<'a> NodeValues<'a> {
    pub fn new(tree: &'a dyn PaintTree, start: NodeId, len: usize) -> Self {
        Self { tree, start, len }
    }

    pub fn tree(&self) -> &'a dyn PaintTree {
        self.tree
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> NodeValuesIter<'a> {
        NodeValuesIter {
            tree: self.tree,
            next: Some(self.start),
            remaining: self.len,
        }
    }
}

impl fmt::Debug for NodeValues<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeValues")
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

pub struct NodeValuesIter<'a> {
    tree: &'a dyn PaintTree,
    next: Option<NodeId>,
    remaining: usize,
}

impl Iterator for NodeValuesIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = self.tree.next_in_group(current);
        Some(current)
    }
}

/// Per-surface drawable state an artist builds for one paint subgroup.
pub trait ProjectedView {
    /// Advances animations. Returns `true` when another frame is needed.
    fn tick(&mut self, _cycle_start: Instant) -> bool {
        false
    }

    /// Builds drawing data for `values`. Returns `true` while more work
    /// remains for a later call.
    fn paint(
        &mut self,
        surface: &mut dyn Surface,
        values: &NodeValues<'_>,
        timeout: Option<Duration>,
    ) -> bool;

    fn set_world_transform(&mut self, world: WorldTransform);

    /// Draws into `surface`, adding any text to `labels`. Returns `true`
    /// when the result is still dirty.
    fn render(&mut self, surface: &mut dyn Surface, labels: &mut WorldLabels) -> bool;

    fn unmount(&mut self);

    fn context_changed(&mut self, _is_lost: bool) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Rendering strategy for one family of visual primitives.
pub trait Artist {
    fn make(&self, surface: &mut dyn Surface, values: &NodeValues<'_>) -> Box<dyn ProjectedView>;

    /// Updates `view` in place for `values`. Returning `false` makes the
    /// caller unmount the view and build a new one with [`Artist::make`].
    fn patch(&self, view: &mut dyn ProjectedView, values: &NodeValues<'_>) -> bool;

    /// Bounds of everything `view` draws, in paint group space.
    fn bounds(&self, surface: &dyn Surface, view: &dyn ProjectedView) -> Rect;
}

#[derive(Default)]
pub struct ArtistRegistry {
    artists: HashMap<ArtistId, Box<dyn Artist>>,
}

impl ArtistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the artist previously registered under `id`, if any.
    pub fn register(
        &mut self,
        id: ArtistId,
        artist: Box<dyn Artist>,
    ) -> Option<Box<dyn Artist>> {
        self.artists.insert(id, artist)
    }

    pub fn contains(&self, id: ArtistId) -> bool {
        self.artists.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.artists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }

    pub fn get(&self, id: ArtistId) -> &dyn Artist {
        let Some(artist) = self.artists.get(&id) else {
            panic!("no artist registered for artist id {}", id.raw());
        };
        artist.as_ref()
    }
}

impl fmt::Debug for ArtistRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.artists.keys().map(|id| id.raw()).collect();
        ids.sort_unstable();
        f.debug_struct("ArtistRegistry").field("ids", &ids).finish()
    }
}

use std::collections::HashMap;
use std::time::{Duration, Instant};

use paint_protocol::{
    ArtistId, NodeId, PaintTree, Rect, Surface, SurfaceId, WorldLabels, WorldTransform,
};

use crate::artist::{ArtistRegistry, NodeValues, ProjectedView};

/// A maximal run of nodes in a paint group that share one artist.
pub struct PaintSubgroup {
    artist: ArtistId,
    start: NodeId,
    len: usize,
    views: HashMap<SurfaceId, Box<dyn ProjectedView>>,
}

impl PaintSubgroup {
    pub fn new(artist: ArtistId, start: NodeId) -> Self {
        Self {
            artist,
            start,
            len: 1,
            views: HashMap::new(),
        }
    }

    pub fn artist(&self) -> ArtistId {
        self.artist
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

    pub(crate) fn include(&mut self) {
        self.len += 1;
    }

    pub fn values<'a>(&self, tree: &'a dyn PaintTree) -> NodeValues<'a> {
        NodeValues::new(tree, self.start, self.len)
    }

    pub fn has_view(&self, surface: SurfaceId) -> bool {
        self.views.contains_key(&surface)
    }

    /// Takes over the views of a subgroup this one replaces. The views are
    /// patched to the new run on the next paint.
    pub(crate) fn adopt_views(&mut self, previous: &mut PaintSubgroup) {
        self.views = std::mem::take(&mut previous.views);
    }

    pub fn paint(
        &mut self,
        tree: &dyn PaintTree,
        surface: &mut dyn Surface,
        artists: &ArtistRegistry,
        timeout: Option<Duration>,
    ) -> bool {
        let values = self.values(tree);
        let artist = artists.get(self.artist);
        let surface_id = surface.id();
        let view = match self.views.remove(&surface_id) {
            None => {
                log::trace!("[painter] making view for run at node {}", self.start.raw());
                artist.make(surface, &values)
            }
            Some(mut view) => {
                if artist.patch(view.as_mut(), &values) {
                    view
                } else {
                    log::trace!(
                        "[painter] patch failed, remaking view for run at node {}",
                        self.start.raw()
                    );
                    view.unmount();
                    artist.make(surface, &values)
                }
            }
        };
        let view = self.views.entry(surface_id).or_insert(view);
        view.paint(surface, &values, timeout)
    }

    /// Returns `true` when dirty, including when nothing was painted yet.
    pub fn render(
        &mut self,
        surface: &mut dyn Surface,
        world: WorldTransform,
        labels: &mut WorldLabels,
    ) -> bool {
        let Some(view) = self.views.get_mut(&surface.id()) else {
            return true;
        };
        view.set_world_transform(world);
        view.render(surface, labels)
    }

    pub fn bounds(&self, surface: &dyn Surface, artists: &ArtistRegistry) -> Option<Rect> {
        let view = self.views.get(&surface.id())?;
        Some(artists.get(self.artist).bounds(surface, view.as_ref()))
    }

    pub fn tick(&mut self, cycle_start: Instant) -> bool {
        self.views
            .values_mut()
            .fold(false, |needs_update, view| view.tick(cycle_start) || needs_update)
    }

    pub fn unmount(&mut self, surface: SurfaceId) {
        if let Some(mut view) = self.views.remove(&surface) {
            view.unmount();
        }
    }

    pub fn context_changed(&mut self, surface: SurfaceId, is_lost: bool) {
        let Some(view) = self.views.get_mut(&surface) else {
            return;
        };
        view.context_changed(is_lost);
        if is_lost {
            self.unmount(surface);
        }
    }

    pub fn dispose(&mut self) {
        for (_, mut view) in self.views.drain() {
            view.unmount();
        }
    }
}

/// Splits the nodes of the group rooted at `root` into runs, starting a new
/// run whenever the artist changes.
pub fn split_runs(tree: &dyn PaintTree, root: NodeId) -> Vec<PaintSubgroup> {
    let mut runs: Vec<PaintSubgroup> = Vec::new();
    tree.for_each_in_group(root, &mut |node| {
        let artist = tree.artist(node);
        match runs.last_mut() {
            Some(run) if run.artist() == artist => run.include(),
            _ => runs.push(PaintSubgroup::new(artist, node)),
        }
    });
    runs
}

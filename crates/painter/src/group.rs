use std::collections::HashMap;
use std::time::{Duration, Instant};

use frame_scheduler::{Deadline, RenderCounters, RenderMode};
use freezer::{Freezer, FrozenNodeKey, FrozenRender};
use paint_protocol::matrix::{self, Matrix3x3};
use paint_protocol::{
    AbsolutePosition, Camera, NodeId, PaintTree, Rect, Surface, SurfaceId, WorldLabels,
    WorldTransform,
};
use smallvec::SmallVec;

use crate::artist::ArtistRegistry;
use crate::subgroup::{PaintSubgroup, split_runs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRender {
    /// Not painted on this surface or not positioned yet. Counts as dirty.
    Unavailable,
    /// Entirely outside the camera; no view was touched.
    Culled,
    Rendered {
        dirty: bool,
        consecutive_renders: u32,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct Projection {
    consecutive_renders: u32,
    snapshot_dirty: bool,
    /// Every subgroup finished painting on this surface.
    settled: bool,
}

/// Shared state borrowed by every group during one render pass.
pub struct GroupRenderPass<'a> {
    pub tree: &'a dyn PaintTree,
    pub camera: Option<&'a dyn Camera>,
    pub labels: &'a mut WorldLabels,
    pub freezer: &'a Freezer,
    pub counters: &'a mut RenderCounters,
}

pub struct PaintGroup {
    root: NodeId,
    subgroups: SmallVec<[PaintSubgroup; 4]>,
    stale: bool,
    bounds: Rect,
    projections: HashMap<SurfaceId, Projection>,
}

impl PaintGroup {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            subgroups: SmallVec::new(),
            stale: true,
            bounds: Rect::EMPTY,
            projections: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn subgroups(&self) -> &[PaintSubgroup] {
        &self.subgroups
    }

    /// Local bounds measured by the last paint.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_painted(&self, surface: SurfaceId) -> bool {
        self.projections.contains_key(&surface)
    }

    pub fn consecutive_renders(&self, surface: SurfaceId) -> u32 {
        self.projections
            .get(&surface)
            .map_or(0, |projection| projection.consecutive_renders)
    }

    /// Forces the subgroup runs to be derived again on the next paint.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn paint(
        &mut self,
        tree: &dyn PaintTree,
        surface: &mut dyn Surface,
        artists: &ArtistRegistry,
        freezer: &mut Freezer,
        frozen: Option<FrozenNodeKey>,
        timeout: Option<Duration>,
    ) -> bool {
        if !tree.is_root(self.root) && !tree.is_paint_group_root(self.root) {
            panic!(
                "a node must be a paint group in order to be painted, got node {}",
                self.root.raw()
            );
        }
        if tree.needs_commit(self.root) {
            panic!(
                "node cannot be uncommitted when painting, got node {}",
                self.root.raw()
            );
        }

        let surface_id = surface.id();
        let settled = self
            .projections
            .get(&surface_id)
            .is_some_and(|projection| projection.settled);
        if !self.stale && settled {
            if let Some(key) = frozen {
                self.paint_snapshot(surface, freezer, key);
            }
            return false;
        }

        if self.stale {
            self.rebuild_subgroups(tree);
            for projection in self.projections.values_mut() {
                *projection = Projection::default();
            }
        }

        let share = Deadline::new(timeout).share(self.subgroups.len().max(1));
        let mut needs_more_work = false;
        for subgroup in &mut self.subgroups {
            needs_more_work |= subgroup.paint(tree, surface, artists, share);
        }

        let mut bounds = paint_group_bounds(tree, self.root);
        for subgroup in &self.subgroups {
            if let Some(view_bounds) = subgroup.bounds(&*surface, artists) {
                bounds.include(&view_bounds);
            }
        }
        self.bounds = bounds;
        self.projections.entry(surface_id).or_default().settled = !needs_more_work;

        if let Some(key) = frozen.filter(|_| !needs_more_work) {
            self.paint_snapshot(surface, freezer, key);
        }
        needs_more_work
    }

    fn rebuild_subgroups(&mut self, tree: &dyn PaintTree) {
        let mut runs = split_runs(tree, self.root);
        let mut previous = std::mem::take(&mut self.subgroups);
        for (index, run) in runs.iter_mut().enumerate() {
            let Some(old) = previous.get_mut(index) else {
                break;
            };
            if old.artist() == run.artist() {
                run.adopt_views(old);
            }
        }
        for mut old in previous {
            old.dispose();
        }
        log::debug!(
            "[painter] paint group {} split into {} subgroups",
            self.root.raw(),
            runs.len()
        );
        self.subgroups = runs.into_iter().collect();
        self.stale = false;
    }

    /// Redraws the frozen snapshot unless the cached one is still usable.
    fn paint_snapshot(
        &mut self,
        surface: &mut dyn Surface,
        freezer: &mut Freezer,
        key: FrozenNodeKey,
    ) {
        let surface_id = surface.id();
        let snapshot_dirty = self
            .projections
            .get(&surface_id)
            .is_some_and(|projection| projection.snapshot_dirty);
        let cached = freezer
            .frozen(key)
            .is_some_and(|node| node.is_validated() && node.is_fragmented(surface_id));
        if cached && !snapshot_dirty {
            return;
        }

        let bounds = self.bounds;
        let subgroups = &mut self.subgroups;
        let painted = freezer.paint(
            key,
            surface,
            || bounds,
            &mut |surface: &mut dyn Surface, world: &WorldTransform| {
                let mut scratch = WorldLabels::new();
                let mut dirty = false;
                for subgroup in subgroups.iter_mut() {
                    dirty |= subgroup.render(surface, *world, &mut scratch);
                }
                dirty
            },
        );
        let dirty = match painted {
            Ok(dirty) => dirty,
            Err(error) => {
                log::warn!(
                    "[painter] snapshot of paint group {} failed, rendering live: {error}",
                    self.root.raw()
                );
                true
            }
        };
        if let Some(projection) = self.projections.get_mut(&surface_id) {
            projection.snapshot_dirty = dirty;
        }
    }

    pub fn render(
        &mut self,
        pass: &mut GroupRenderPass<'_>,
        surface: &mut dyn Surface,
        frozen: Option<FrozenNodeKey>,
    ) -> GroupRender {
        let tree = pass.tree;
        if !tree.is_root(self.root) && !tree.is_paint_group_root(self.root) {
            panic!(
                "cannot render a node that is not a paint group, got node {}",
                self.root.raw()
            );
        }
        let surface_id = surface.id();
        if !self.is_painted(surface_id) {
            return GroupRender::Unavailable;
        }
        let layout = tree.layout(self.root);
        let Some(absolute) = layout.absolute else {
            return GroupRender::Unavailable;
        };
        let Some(camera) = pass.camera else {
            return GroupRender::Unavailable;
        };

        // Local bounds grow by the node's own scale; the world matrix below
        // already carries the accumulated absolute scale.
        let world_bounds = self
            .bounds
            .scaled(layout.scale)
            .translated(absolute.x, absolute.y);
        if !camera.contains_any(&world_bounds) {
            log::trace!("[painter] paint group {} culled", self.root.raw());
            return GroupRender::Culled;
        }

        let world = world_matrix(Some(camera), absolute);
        if let Some(key) = frozen {
            match pass.freezer.render(key, surface, &world, true) {
                Ok(FrozenRender::Rendered { clean }) => {
                    pass.counters.record(RenderMode::Cached);
                    return self.finish_render(surface_id, !clean);
                }
                Ok(FrozenRender::NotCached) => {}
                Err(error) => {
                    log::warn!(
                        "[painter] frozen render of paint group {} failed: {error}",
                        self.root.raw()
                    );
                }
            }
        }
        pass.counters.record(RenderMode::Immediate);

        let origin_x = camera.x() + absolute.x;
        let origin_y = camera.y() + absolute.y;
        if let Some(overlay) = surface.overlay() {
            overlay.save();
            overlay.scale(camera.scale(), camera.scale());
            overlay.translate(origin_x, origin_y);
            overlay.scale(absolute.scale, absolute.scale);
        }
        let transform = WorldTransform::new(
            world,
            world_scale(Some(camera), absolute),
            camera.width(),
            camera.height(),
            origin_x,
            origin_y,
        );
        let mut dirty = false;
        for subgroup in &mut self.subgroups {
            dirty |= subgroup.render(surface, transform, pass.labels);
        }
        if let Some(overlay) = surface.overlay() {
            overlay.restore();
        }
        self.finish_render(surface_id, dirty)
    }

    fn finish_render(&mut self, surface: SurfaceId, dirty: bool) -> GroupRender {
        let Some(projection) = self.projections.get_mut(&surface) else {
            return GroupRender::Unavailable;
        };
        if dirty {
            projection.consecutive_renders = 0;
        } else {
            projection.consecutive_renders += 1;
        }
        GroupRender::Rendered {
            dirty,
            consecutive_renders: projection.consecutive_renders,
        }
    }

    pub fn tick(&mut self, cycle_start: Instant) -> bool {
        self.subgroups
            .iter_mut()
            .fold(false, |needs_update, subgroup| {
                subgroup.tick(cycle_start) || needs_update
            })
    }

    pub fn unmount(&mut self, surface: SurfaceId) {
        for subgroup in &mut self.subgroups {
            subgroup.unmount(surface);
        }
        self.projections.remove(&surface);
    }

    pub fn context_changed(&mut self, surface: SurfaceId, is_lost: bool) {
        for subgroup in &mut self.subgroups {
            subgroup.context_changed(surface, is_lost);
        }
        if is_lost {
            self.projections.remove(&surface);
        }
    }

    pub fn dispose(&mut self) {
        for subgroup in &mut self.subgroups {
            subgroup.dispose();
        }
        self.projections.clear();
    }
}

/// Union of the group boxes of every node owned by the group at `root`.
pub fn paint_group_bounds(tree: &dyn PaintTree, root: NodeId) -> Rect {
    let mut bounds = Rect::EMPTY;
    tree.for_each_in_group(root, &mut |node| {
        bounds.include(&tree.layout(node).group_rect());
    });
    bounds
}

/// Group-local to clip space: node scale, then node position, then the
/// camera. Identity when there is no camera able to project.
pub fn world_matrix(camera: Option<&dyn Camera>, absolute: AbsolutePosition) -> Matrix3x3 {
    let Some(camera) = camera.filter(|camera| camera.can_project()) else {
        return matrix::IDENTITY;
    };
    let local = matrix::multiply(
        &matrix::translation(absolute.x, absolute.y),
        &matrix::scale(absolute.scale),
    );
    matrix::multiply(&camera.project(), &local)
}

pub fn world_scale(camera: Option<&dyn Camera>, absolute: AbsolutePosition) -> f32 {
    absolute.scale * camera.map_or(1.0, |camera| camera.scale())
}

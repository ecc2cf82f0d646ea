use std::collections::HashMap;
use std::time::{Duration, Instant};

use frame_scheduler::{
    AutoFreezePolicy, Deadline, GraphPainterAnalytics, LogOnly, RenderCostWindow, RenderCounters,
    RenderPassSummary,
};
use freezer::{Freezer, FrozenNodeKey};
use paint_protocol::{
    ArtistId, Camera, LayoutCommit, LayoutContinuation, LayoutProgress, NodeId, PaintTree, Scene,
    Surface, SurfaceId, WorldLabels,
};

use crate::artist::{Artist, ArtistRegistry};
use crate::cursor::{PaintCursor, PaintPhase};
use crate::group::{GroupRender, GroupRenderPass, PaintGroup};
use crate::{PainterConfig, PainterError};

/// Paints and renders one tree of nodes, split into paint groups.
///
/// Painting is cooperative: [`GraphPainter::paint`] stops at the first
/// yield point past its timeout and picks up at the same paint group on the
/// next call for that surface. Layout progress is shared by all surfaces.
pub struct GraphPainter {
    config: PainterConfig,
    root: Option<NodeId>,
    groups: Vec<PaintGroup>,
    cursors: HashMap<SurfaceId, PaintCursor>,
    layout: Option<LayoutContinuation>,
    needs_reconcile: bool,
    disposed: bool,
    camera: Option<Box<dyn Camera>>,
    artists: ArtistRegistry,
    labels: WorldLabels,
    freezer: Freezer,
    frozen: HashMap<NodeId, FrozenNodeKey>,
    cost_window: RenderCostWindow,
    counters: RenderCounters,
    auto_freeze: Box<dyn AutoFreezePolicy>,
    on_schedule_update: Option<Box<dyn FnMut()>>,
    last_render: Option<RenderPassSummary>,
}

impl GraphPainter {
    pub fn new(config: PainterConfig) -> Result<Self, PainterError> {
        config.analytics.validate()?;
        let freezer = Freezer::new(config.freezer)?;
        Ok(Self {
            config,
            root: None,
            groups: Vec::new(),
            cursors: HashMap::new(),
            layout: None,
            needs_reconcile: true,
            disposed: false,
            camera: None,
            artists: ArtistRegistry::new(),
            labels: WorldLabels::new(),
            freezer,
            frozen: HashMap::new(),
            cost_window: RenderCostWindow::new(&config.analytics),
            counters: RenderCounters::new(),
            auto_freeze: Box::new(LogOnly),
            on_schedule_update: None,
            last_render: None,
        })
    }

    pub fn config(&self) -> PainterConfig {
        self.config
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Paint progress for `surface`, `None` until it was painted once.
    pub fn cursor(&self, surface: SurfaceId) -> Option<PaintCursor> {
        self.cursors.get(&surface).copied()
    }

    pub fn layout_continuation(&self) -> Option<LayoutContinuation> {
        self.layout
    }

    pub fn needs_reconcile(&self) -> bool {
        self.needs_reconcile
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether any surface painted so far has work left.
    pub fn is_dirty(&self) -> bool {
        if self.root.is_none() {
            return false;
        }
        self.needs_reconcile
            || self.layout.is_some()
            || self.cursors.values().any(PaintCursor::is_dirty)
    }

    pub fn is_dirty_for(&self, surface: SurfaceId) -> bool {
        if self.root.is_none() {
            return false;
        }
        self.needs_reconcile
            || self.layout.is_some()
            || self.cursors.get(&surface).is_none_or(PaintCursor::is_dirty)
    }

    /// Sends every surface back to the first paint group.
    fn reopen_surfaces(&mut self) {
        for cursor in self.cursors.values_mut() {
            cursor.reopen();
        }
    }

    pub fn paint_groups(&self) -> &[PaintGroup] {
        &self.groups
    }

    pub fn paint_group_roots(&self) -> Vec<NodeId> {
        self.groups.iter().map(PaintGroup::root).collect()
    }

    pub fn paint_group(&self, root: NodeId) -> Option<&PaintGroup> {
        self.groups.iter().find(|group| group.root() == root)
    }

    pub fn camera(&self) -> Option<&dyn Camera> {
        self.camera.as_deref()
    }

    pub fn set_camera(&mut self, camera: Option<Box<dyn Camera>>) {
        self.camera = camera;
    }

    pub fn labels(&self) -> &WorldLabels {
        &self.labels
    }

    pub fn counters(&self) -> &RenderCounters {
        &self.counters
    }

    pub fn last_render(&self) -> Option<RenderPassSummary> {
        self.last_render
    }

    pub fn cost_window(&self) -> &RenderCostWindow {
        &self.cost_window
    }

    pub fn freezer(&self) -> &Freezer {
        &self.freezer
    }

    pub fn register_artist(&mut self, id: ArtistId, artist: impl Artist + 'static) {
        if self.artists.register(id, Box::new(artist)).is_some() {
            log::debug!("[painter] replaced artist {}", id.raw());
        }
    }

    pub fn set_auto_freeze_policy(&mut self, policy: impl AutoFreezePolicy + 'static) {
        self.auto_freeze = Box::new(policy);
    }

    /// Called whenever the painter needs another frame.
    pub fn set_on_schedule_update(&mut self, listener: impl FnMut() + 'static) {
        self.on_schedule_update = Some(Box::new(listener));
    }

    fn schedule_update(&mut self) {
        if let Some(listener) = self.on_schedule_update.as_mut() {
            listener();
        }
    }

    pub fn reverse_render_order(&self) -> bool {
        self.config.reverse_render_order
    }

    pub fn set_reverse_render_order(&mut self, reverse: bool) {
        if self.config.reverse_render_order == reverse {
            return;
        }
        self.config.reverse_render_order = reverse;
        self.mark_dirty();
    }

    /// Advances layout by at most `timeout`. Returns `true` while layout is
    /// unfinished; the continuation is kept for the next call.
    pub fn commit_layout<L>(&mut self, layout: &mut L, timeout: Option<Duration>) -> bool
    where
        L: LayoutCommit + ?Sized,
    {
        let Some(root) = self.root else {
            panic!("cannot commit layout without a root node");
        };
        let resume = self.layout.take();
        match resume {
            Some(continuation) => log::trace!(
                "[painter] continuing layout at node {} pass {}",
                continuation.node.raw(),
                continuation.pass
            ),
            None => log::trace!("[painter] starting layout of node {}", root.raw()),
        }
        match layout.commit_layout(root, resume, timeout) {
            LayoutProgress::Incomplete(continuation) => {
                log::debug!("[painter] layout needs more time");
                self.layout = Some(continuation);
                true
            }
            LayoutProgress::Complete => false,
        }
    }

    /// Commits layout, reconciles the paint group list and paints groups in
    /// order until done or past `timeout`. Returns `true` when another call
    /// is needed. Without a root, or when nothing changed since the last
    /// complete paint of `surface`, returns `false` right away.
    pub fn paint(
        &mut self,
        scene: &mut dyn Scene,
        surface: &mut dyn Surface,
        timeout: Option<Duration>,
    ) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        if !scene.is_root(root) && !scene.is_paint_group_root(root) {
            panic!(
                "a node must be a paint group in order to be painted, got node {}",
                root.raw()
            );
        }
        if surface.is_context_lost() {
            return true;
        }
        let surface_id = surface.id();
        if !self.is_dirty_for(surface_id) {
            log::trace!("[painter] surface {} is not dirty", surface_id.raw());
            return false;
        }

        let deadline = Deadline::new(timeout);
        if self.commit_layout(scene, timeout) {
            return true;
        }
        if deadline.is_past() {
            log::trace!("[painter] out of time after layout (timeout={timeout:?})");
            return true;
        }

        let tree = scene.as_tree();
        self.reconcile(tree);
        if deadline.is_past() {
            log::trace!("[painter] out of time after reconcile (timeout={timeout:?})");
            return true;
        }

        let cursor = self.cursors.entry(surface_id).or_default();
        cursor.phase = PaintPhase::Painting;
        while cursor.group_index < self.groups.len() {
            if deadline.is_past() {
                log::trace!(
                    "[painter] out of time before paint group {} (timeout={timeout:?})",
                    cursor.group_index
                );
                return true;
            }
            let group = &mut self.groups[cursor.group_index];
            let frozen = self.frozen.get(&group.root()).copied();
            let needs_more_work = group.paint(
                tree,
                surface,
                &self.artists,
                &mut self.freezer,
                frozen,
                deadline.remaining(),
            );
            if needs_more_work {
                log::trace!("[painter] paint group {} needs another update", group.root().raw());
                return true;
            }
            cursor.group_index += 1;
        }

        cursor.finish();
        false
    }

    /// Positional diff of the paint group list against the paint group
    /// cycle starting at the root.
    fn reconcile(&mut self, tree: &dyn PaintTree) {
        if !self.needs_reconcile {
            return;
        }
        let Some(root) = self.root else {
            return;
        };

        let mut node = root;
        let mut index = 0;
        loop {
            match self.groups.get(index).map(PaintGroup::root) {
                Some(existing) if existing == node => {
                    log::trace!("[painter] reusing paint group for node {}", node.raw());
                    self.groups[index].invalidate();
                }
                Some(_) => {
                    log::debug!(
                        "[painter] inserting paint group at index {index} for node {}",
                        node.raw()
                    );
                    self.groups.insert(index, PaintGroup::new(node));
                }
                None => {
                    log::debug!("[painter] appending paint group for node {}", node.raw());
                    self.groups.push(PaintGroup::new(node));
                }
            }
            index += 1;
            node = tree.next_paint_group(node);
            if node == root {
                break;
            }
        }

        for mut stale in self.groups.drain(index..) {
            log::debug!("[painter] removing paint group for node {}", stale.root().raw());
            stale.dispose();
        }
        self.needs_reconcile = false;
        self.reopen_surfaces();
    }

    /// Renders every paint group, then the label layer on top. Returns
    /// `true` when any group rendered dirty.
    pub fn render(&mut self, tree: &dyn PaintTree, surface: &mut dyn Surface) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        if let Some(overlay) = surface.overlay() {
            overlay.reset_transform();
        }
        let mut analytics = GraphPainterAnalytics::new(Instant::now());
        self.labels.clear();

        let reverse = self.config.reverse_render_order;
        let count = self.groups.len();
        let mut heaviest: Option<(NodeId, u32)> = None;
        let mut pass = GroupRenderPass {
            tree,
            camera: self.camera.as_deref(),
            labels: &mut self.labels,
            freezer: &self.freezer,
            counters: &mut self.counters,
        };
        for offset in 0..count {
            let index = if reverse { count - 1 - offset } else { offset };
            let group = &mut self.groups[index];
            let frozen = self.frozen.get(&group.root()).copied();
            match group.render(&mut pass, surface, frozen) {
                GroupRender::Culled => {}
                GroupRender::Unavailable | GroupRender::Rendered { dirty: true, .. } => {
                    analytics.record_dirty_render();
                }
                GroupRender::Rendered {
                    dirty: false,
                    consecutive_renders,
                } => {
                    if consecutive_renders > 1 {
                        analytics.record_consecutive_render();
                        analytics.record_num_renders(consecutive_renders);
                        if heaviest.is_none_or(|(_, most)| consecutive_renders > most) {
                            heaviest = Some((group.root(), consecutive_renders));
                        }
                    }
                }
            }
        }

        self.render_labels(tree, root, surface);

        let summary = analytics.record_completion(
            Instant::now(),
            &mut self.cost_window,
            self.config.analytics.budget(),
        );
        if summary.over_budget && self.auto_freeze.should_freeze(&summary) {
            match heaviest {
                Some((node, renders)) if !self.is_frozen(node) => {
                    log::info!(
                        "[painter] freezing paint group {} after {renders} consecutive renders",
                        node.raw()
                    );
                    self.freeze(node);
                }
                _ => {}
            }
        }
        self.last_render = Some(summary);
        summary.dirty_renders > 0
    }

    fn render_labels(&mut self, tree: &dyn PaintTree, root: NodeId, surface: &mut dyn Surface) {
        let Some(camera) = self.camera.as_deref() else {
            return;
        };
        let layout = tree.layout(root);
        let pixel_scale = surface.device_pixel_scale();
        let Some(overlay) = surface.overlay() else {
            return;
        };
        overlay.reset_transform();
        overlay.scale(camera.scale(), camera.scale());
        overlay.translate(
            camera.x() + layout.absolute_x(),
            camera.y() + layout.absolute_y(),
        );
        overlay.scale(layout.absolute_scale(), layout.absolute_scale());

        let visible_width = camera.width() / camera.scale();
        let visible_height = camera.height() / camera.scale();
        self.labels.render(
            overlay,
            -camera.x() + visible_width / 2.0,
            -camera.y() + visible_height / 2.0,
            visible_width,
            visible_height,
            camera.scale() / pixel_scale,
        );
    }

    /// Drops cached work for the whole tree and schedules another frame.
    pub fn mark_dirty(&mut self) {
        if let Some(root) = self.root {
            self.invalidate_frozen(root);
        }
        log::debug!("[painter] marking graph painter as dirty");
        self.needs_reconcile = true;
        self.layout = None;
        self.reopen_surfaces();
        self.schedule_update();
    }

    /// Content of `node` changed. Only the paint group that owns it is
    /// re-split and only that group's snapshot is invalidated; every surface
    /// walks the group list again, skipping groups that are still settled.
    pub fn node_changed(&mut self, tree: &dyn PaintTree, node: NodeId) {
        let group_root = tree.paint_group_of(node);
        if let Some(group) = self.groups.iter_mut().find(|group| group.root() == group_root) {
            group.invalidate();
        }
        self.invalidate_frozen(group_root);
        self.reopen_surfaces();
        self.schedule_update();
    }

    fn invalidate_frozen(&mut self, node: NodeId) {
        let Some(&key) = self.frozen.get(&node) else {
            return;
        };
        if let Err(error) = self.freezer.invalidate(key) {
            log::warn!("[painter] invalidating frozen node {}: {error}", node.raw());
        }
    }

    /// Caches the paint group rooted at `node` in the freezer. The snapshot
    /// is taken on the next paint of that group.
    pub fn freeze(&mut self, node: NodeId) -> FrozenNodeKey {
        if let Some(&key) = self.frozen.get(&node) {
            return key;
        }
        let key = self.freezer.cache(node);
        self.frozen.insert(node, key);
        self.reopen_surfaces();
        self.schedule_update();
        key
    }

    pub fn unfreeze(&mut self, node: NodeId) -> bool {
        let Some(key) = self.frozen.remove(&node) else {
            return false;
        };
        if let Err(error) = self.freezer.remove(key) {
            log::warn!("[painter] unfreezing node {}: {error}", node.raw());
        }
        self.reopen_surfaces();
        self.schedule_update();
        true
    }

    pub fn is_frozen(&self, node: NodeId) -> bool {
        self.frozen.contains_key(&node)
    }

    pub fn frozen_key(&self, node: NodeId) -> Option<FrozenNodeKey> {
        self.frozen.get(&node).copied()
    }

    pub fn tick(&mut self, cycle_start: Instant) -> bool {
        self.groups
            .iter_mut()
            .fold(false, |needs_update, group| group.tick(cycle_start) || needs_update)
    }

    /// Forgets every view and cached fragment for `surface`.
    pub fn unmount(&mut self, surface: SurfaceId) {
        for group in &mut self.groups {
            group.unmount(surface);
        }
        self.freezer.unmount(surface);
        self.cursors.remove(&surface);
    }

    pub fn context_changed(&mut self, surface: SurfaceId, is_lost: bool) {
        for group in &mut self.groups {
            group.context_changed(surface, is_lost);
        }
        self.freezer.context_changed(surface, is_lost);
        if !is_lost {
            return;
        }
        if let Some(cursor) = self.cursors.get_mut(&surface) {
            cursor.reopen();
        }
    }

    /// Disposes every paint group and returns to an unreconciled state.
    pub fn clear(&mut self) {
        for mut group in self.groups.drain(..) {
            group.dispose();
        }
        self.cursors.clear();
        self.layout = None;
        self.needs_reconcile = true;
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.clear();
        self.disposed = false;
        self.root = Some(root);
        self.mark_dirty();
    }

    pub fn dispose(&mut self) {
        self.clear();
        self.freezer.dispose();
        self.frozen.clear();
        self.labels.clear();
        self.root = None;
        self.disposed = true;
    }
}

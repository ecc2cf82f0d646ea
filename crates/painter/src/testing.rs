//! In-memory tree and a recording artist for exercising the painter.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::Duration;

use frame_scheduler::Deadline;
use paint_protocol::{
    AbsolutePosition, ArtistId, LayoutCommit, LayoutContinuation, LayoutProgress, NodeId,
    NodeLayout, PaintTree, Rect, Surface, WorldLabels, WorldTransform,
};

use crate::artist::{Artist, NodeValues, ProjectedView};

#[derive(Debug, Clone)]
struct ArenaNode {
    artist: ArtistId,
    paint_group_root: bool,
    needs_commit: bool,
    position: AbsolutePosition,
    layout: NodeLayout,
}

/// Tree stored in pre-order. Node 0 is the root; every node flagged as a
/// paint group root owns the nodes after it up to the next flagged node.
#[derive(Debug, Clone)]
pub struct ArenaTree {
    nodes: Vec<ArenaNode>,
    /// Continuations received by `commit_layout`, in call order.
    pub resumes: Vec<Option<LayoutContinuation>>,
}

impl ArenaTree {
    pub fn new(root_artist: ArtistId) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            resumes: Vec::new(),
        };
        tree.push(root_artist);
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, artist: ArtistId) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u64);
        self.nodes.push(ArenaNode {
            artist,
            paint_group_root: false,
            needs_commit: true,
            position: AbsolutePosition {
                x: 0.0,
                y: 0.0,
                scale: 1.0,
            },
            layout: NodeLayout {
                group_width: 10.0,
                group_height: 10.0,
                ..NodeLayout::default()
            },
        });
        id
    }

    pub fn push_paint_group(&mut self, artist: ArtistId) -> NodeId {
        let id = self.push(artist);
        self.set_paint_group_root(id, true);
        id
    }

    fn node(&self, node: NodeId) -> &ArenaNode {
        let Some(entry) = self.nodes.get(node.raw() as usize) else {
            panic!("unknown node {}", node.raw());
        };
        entry
    }

    fn node_mut(&mut self, node: NodeId) -> &mut ArenaNode {
        let Some(entry) = self.nodes.get_mut(node.raw() as usize) else {
            panic!("unknown node {}", node.raw());
        };
        entry
    }

    pub fn set_paint_group_root(&mut self, node: NodeId, paint_group_root: bool) {
        self.node_mut(node).paint_group_root = paint_group_root;
    }

    pub fn set_artist(&mut self, node: NodeId, artist: ArtistId) {
        self.node_mut(node).artist = artist;
    }

    /// Box of `node` inside its paint group, centered on (`x`, `y`).
    pub fn set_group_box(&mut self, node: NodeId, x: f32, y: f32, width: f32, height: f32) {
        let layout = &mut self.node_mut(node).layout;
        layout.group_x = x;
        layout.group_y = y;
        layout.group_width = width;
        layout.group_height = height;
    }

    /// World position applied the next time layout is committed.
    pub fn set_position(&mut self, node: NodeId, x: f32, y: f32, scale: f32) {
        let entry = self.node_mut(node);
        entry.position = AbsolutePosition { x, y, scale };
        entry.needs_commit = true;
    }

    pub fn mark_needs_commit(&mut self, node: NodeId) {
        self.node_mut(node).needs_commit = true;
    }

    fn is_flagged(&self, index: usize) -> bool {
        index == 0 || self.nodes[index].paint_group_root
    }
}

impl PaintTree for ArenaTree {
    fn is_root(&self, node: NodeId) -> bool {
        node.raw() == 0 && !self.nodes.is_empty()
    }

    fn is_paint_group_root(&self, node: NodeId) -> bool {
        self.node(node).paint_group_root
    }

    fn next_paint_group(&self, node: NodeId) -> NodeId {
        let start = node.raw() as usize + 1;
        (start..self.nodes.len())
            .find(|&index| self.nodes[index].paint_group_root)
            .map_or(self.root(), |index| NodeId::new(index as u64))
    }

    fn paint_group_of(&self, node: NodeId) -> NodeId {
        let index = node.raw() as usize;
        let owner = (0..=index).rev().find(|&index| self.is_flagged(index));
        NodeId::new(owner.unwrap_or(0) as u64)
    }

    fn next_in_group(&self, node: NodeId) -> Option<NodeId> {
        let next = node.raw() as usize + 1;
        if next >= self.nodes.len() || self.is_flagged(next) {
            return None;
        }
        Some(NodeId::new(next as u64))
    }

    fn needs_commit(&self, node: NodeId) -> bool {
        self.node(node).needs_commit
    }

    fn artist(&self, node: NodeId) -> ArtistId {
        self.node(node).artist
    }

    fn layout(&self, node: NodeId) -> NodeLayout {
        self.node(node).layout
    }
}

impl LayoutCommit for ArenaTree {
    fn commit_layout(
        &mut self,
        _root: NodeId,
        resume: Option<LayoutContinuation>,
        timeout: Option<Duration>,
    ) -> LayoutProgress {
        self.resumes.push(resume);
        let deadline = Deadline::new(timeout);
        let (start, pass) = resume.map_or((0, 0), |continuation| {
            (continuation.node.raw() as usize, continuation.pass + 1)
        });
        for index in start..self.nodes.len() {
            if !self.nodes[index].needs_commit {
                continue;
            }
            if deadline.is_past() {
                return LayoutProgress::Incomplete(LayoutContinuation {
                    node: NodeId::new(index as u64),
                    pass,
                });
            }
            let entry = &mut self.nodes[index];
            entry.layout.absolute = Some(entry.position);
            entry.layout.scale = entry.position.scale;
            entry.needs_commit = false;
        }
        LayoutProgress::Complete
    }
}

/// Everything the recording artist and its views observed, plus knobs that
/// steer how the views answer.
#[derive(Debug)]
pub struct RecordingState {
    pub makes: u32,
    pub patches: u32,
    pub failed_patches: u32,
    pub unmounts: u32,
    /// (`start`, `len`) of every view paint.
    pub paints: Vec<(NodeId, usize)>,
    /// Id of the view behind every render.
    pub renders: Vec<u32>,
    pub transforms: Vec<WorldTransform>,
    pub patch_succeeds: bool,
    /// Paints a fresh view answers with "more work" before finishing.
    pub paint_passes: u32,
    pub dirty_renders: bool,
    pub label: Option<String>,
    pub bounds: Rect,
    pub paint_delay: Option<Duration>,
    pub render_delay: Option<Duration>,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self {
            makes: 0,
            patches: 0,
            failed_patches: 0,
            unmounts: 0,
            paints: Vec::new(),
            renders: Vec::new(),
            transforms: Vec::new(),
            patch_succeeds: true,
            paint_passes: 0,
            dirty_renders: false,
            label: None,
            bounds: Rect::EMPTY,
            paint_delay: None,
            render_delay: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingArtist {
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingArtist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, RecordingState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, RecordingState> {
        self.state.borrow_mut()
    }
}

impl Artist for RecordingArtist {
    fn make(&self, _surface: &mut dyn Surface, values: &NodeValues<'_>) -> Box<dyn ProjectedView> {
        let mut state = self.state.borrow_mut();
        state.makes += 1;
        Box::new(RecordingView {
            id: state.makes,
            start: values.start(),
            len: values.len(),
            pending_passes: state.paint_passes,
            world: None,
            state: Rc::clone(&self.state),
        })
    }

    fn patch(&self, view: &mut dyn ProjectedView, values: &NodeValues<'_>) -> bool {
        let Some(view) = view.as_any_mut().downcast_mut::<RecordingView>() else {
            return false;
        };
        let mut state = self.state.borrow_mut();
        state.patches += 1;
        if !state.patch_succeeds {
            state.failed_patches += 1;
            return false;
        }
        view.start = values.start();
        view.len = values.len();
        true
    }

    fn bounds(&self, _surface: &dyn Surface, _view: &dyn ProjectedView) -> Rect {
        self.state.borrow().bounds
    }
}

pub struct RecordingView {
    id: u32,
    start: NodeId,
    len: usize,
    pending_passes: u32,
    world: Option<WorldTransform>,
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingView {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl ProjectedView for RecordingView {
    fn paint(
        &mut self,
        _surface: &mut dyn Surface,
        values: &NodeValues<'_>,
        _timeout: Option<Duration>,
    ) -> bool {
        let mut state = self.state.borrow_mut();
        state.paints.push((values.start(), values.len()));
        if let Some(delay) = state.paint_delay {
            std::thread::sleep(delay);
        }
        if self.pending_passes > 0 {
            self.pending_passes -= 1;
            return true;
        }
        false
    }

    fn set_world_transform(&mut self, world: WorldTransform) {
        self.world = Some(world);
    }

    fn render(&mut self, _surface: &mut dyn Surface, labels: &mut WorldLabels) -> bool {
        let mut state = self.state.borrow_mut();
        state.renders.push(self.id);
        if let Some(world) = self.world {
            state.transforms.push(world);
        }
        if let Some(label) = &state.label {
            labels.draw(label.clone(), 5.0, 5.0, 12.0, 1.0);
        }
        if let Some(delay) = state.render_delay {
            std::thread::sleep(delay);
        }
        state.dirty_renders
    }

    fn unmount(&mut self) {
        self.state.borrow_mut().unmounts += 1;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

use paint_protocol::matrix;
use paint_protocol::testing::RecordingSurface;
use paint_protocol::{NodeId, Rect, Surface, WorldTransform};

use crate::{Freezer, FreezerConfig, FreezerError, FrozenRender};

const PAGE: u32 = 256;

fn freezer() -> Freezer {
    Freezer::new(FreezerConfig {
        texture_scale: 1.0,
        margin: 0,
    })
    .unwrap()
}

fn paint_clean(_surface: &mut dyn Surface, _world: &WorldTransform) -> bool {
    false
}

#[test]
fn fragment_count_matches_cell_grid() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    let key = freezer.cache(NodeId::new(1));
    let bounds = Rect::new(0.0, 0.0, 600.0, 300.0);

    let dirty = freezer
        .paint(key, &mut surface, || bounds, &mut paint_clean)
        .unwrap();

    assert!(!dirty);
    let fragments = freezer.frozen(key).unwrap().fragments(surface.id());
    // ceil(600 / 256) * ceil(300 / 256)
    assert_eq!(fragments.len(), 3 * 2);
    let mut union = Rect::EMPTY;
    for (index, fragment) in fragments.iter().enumerate() {
        union.include(&fragment.local);
        for other in &fragments[index + 1..] {
            assert!(!fragment.local.intersects(&other.local));
        }
    }
    assert_eq!(union, bounds);
    assert_eq!(surface.gpu.offscreen_targets.len(), 6);
    assert!(!surface.gpu.offscreen_active);
}

#[test]
fn each_paint_redraws_every_fragment_without_reallocating() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    let key = freezer.cache(NodeId::new(1));
    let bounds = Rect::new(0.0, 0.0, 300.0, 100.0);

    freezer
        .paint(key, &mut surface, || bounds, &mut paint_clean)
        .unwrap();
    let slots = freezer.slice(surface.id()).unwrap().slot_count();
    freezer
        .paint(key, &mut surface, || bounds, &mut paint_clean)
        .unwrap();

    assert_eq!(slots, 2);
    assert_eq!(freezer.slice(surface.id()).unwrap().slot_count(), 2);
    assert_eq!(surface.gpu.offscreen_targets.len(), 4);
}

#[test]
fn fragment_transform_maps_local_corner_to_clip_corner() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    let key = freezer.cache(NodeId::new(1));
    let mut corners = Vec::new();

    freezer
        .paint(
            key,
            &mut surface,
            || Rect::new(40.0, 20.0, 100.0, 50.0),
            &mut |_surface, world| {
                corners.push(matrix::transform_point(world.matrix(), 40.0, 20.0));
                false
            },
        )
        .unwrap();

    assert_eq!(corners.len(), 1);
    let (x, y) = corners[0];
    assert!((x + 1.0).abs() < 1e-5 && (y - 1.0).abs() < 1e-5);
}

#[test]
fn render_before_paint_is_not_cached() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    let key = freezer.cache(NodeId::new(1));

    let render = freezer
        .render(key, &mut surface, &matrix::IDENTITY, true)
        .unwrap();

    assert_eq!(render, FrozenRender::NotCached);
    assert!(surface.gpu.quads.is_empty());
}

#[test]
fn only_first_clean_fragment_loads_texture() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    let key = freezer.cache(NodeId::new(1));
    freezer
        .paint(
            key,
            &mut surface,
            || Rect::new(0.0, 0.0, 512.0, 256.0),
            &mut paint_clean,
        )
        .unwrap();

    let render = freezer
        .render(key, &mut surface, &matrix::IDENTITY, true)
        .unwrap();

    assert_eq!(render, FrozenRender::Rendered { clean: true });
    let loads: Vec<_> = surface.gpu.quads.iter().map(|quad| quad.needs_load).collect();
    let setups: Vec<_> = surface.gpu.quads.iter().map(|quad| quad.needs_setup).collect();
    assert_eq!(loads, vec![true, false]);
    assert_eq!(setups, vec![true, false]);
}

#[test]
fn unclean_fragments_keep_requesting_load() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    let key = freezer.cache(NodeId::new(1));
    freezer
        .paint(
            key,
            &mut surface,
            || Rect::new(0.0, 0.0, 512.0, 256.0),
            &mut paint_clean,
        )
        .unwrap();
    surface.gpu.quad_result = false;

    let render = freezer
        .render(key, &mut surface, &matrix::IDENTITY, false)
        .unwrap();

    assert_eq!(render, FrozenRender::Rendered { clean: false });
    assert!(surface.gpu.quads.iter().all(|quad| quad.needs_load));
}

#[test]
fn invalidate_then_validate_matches_fresh_node() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    let bounds = Rect::new(-10.0, -10.0, 80.0, 40.0);
    let key = freezer.cache(NodeId::new(7));
    freezer
        .paint(key, &mut surface, || bounds, &mut paint_clean)
        .unwrap();

    freezer.invalidate(key).unwrap();
    assert!(!freezer.frozen(key).unwrap().is_validated());
    assert_eq!(freezer.slice(surface.id()).unwrap().slot_count(), 0);
    assert_eq!(
        freezer
            .render(key, &mut surface, &matrix::IDENTITY, true)
            .unwrap(),
        FrozenRender::NotCached
    );

    let revalidated = freezer.validate(key, || bounds).unwrap();
    let fresh = freezer.cache(NodeId::new(7));
    let fresh_bounds = freezer.validate(fresh, || bounds).unwrap();
    assert_eq!(revalidated, fresh_bounds);
}

#[test]
fn context_loss_drops_atlas_and_repaint_reallocates() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    let key = freezer.cache(NodeId::new(1));
    let bounds = Rect::new(0.0, 0.0, 300.0, 300.0);
    freezer
        .paint(key, &mut surface, || bounds, &mut paint_clean)
        .unwrap();
    let programs_before = surface.gpu.programs_created;

    surface.context_lost = true;
    freezer.context_changed(surface.id(), true);

    assert!(freezer.slice(surface.id()).is_none());
    assert!(!freezer.frozen(key).unwrap().is_validated());
    assert!(
        freezer
            .paint(key, &mut surface, || bounds, &mut paint_clean)
            .unwrap()
    );
    assert!(freezer.slice(surface.id()).is_none());

    surface.context_lost = false;
    freezer.context_changed(surface.id(), false);
    let dirty = freezer
        .paint(key, &mut surface, || bounds, &mut paint_clean)
        .unwrap();

    assert!(!dirty);
    assert_eq!(freezer.frozen(key).unwrap().fragments(surface.id()).len(), 4);
    assert_eq!(freezer.slice(surface.id()).unwrap().slot_count(), 4);
    assert_eq!(surface.gpu.programs_created, programs_before + 1);
}

#[test]
fn remove_returns_slots_to_atlas() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    let key = freezer.cache(NodeId::new(1));
    freezer
        .paint(
            key,
            &mut surface,
            || Rect::new(0.0, 0.0, 100.0, 100.0),
            &mut paint_clean,
        )
        .unwrap();

    let removed = freezer.remove(key).unwrap();

    assert_eq!(removed.node(), NodeId::new(1));
    assert!(freezer.is_empty());
    assert_eq!(freezer.slice(surface.id()).unwrap().slot_count(), 0);
    assert_eq!(freezer.invalidate(key), Err(FreezerError::UnknownFrozenNode));
}

#[test]
fn failed_allocation_releases_fragments_already_placed() {
    let mut freezer = freezer();
    let mut surface = RecordingSurface::new(1, PAGE);
    surface.gpu.texture_limit = Some(1);
    let key = freezer.cache(NodeId::new(1));
    let bounds = Rect::new(0.0, 0.0, 600.0, 300.0);

    let painted = freezer.paint(key, &mut surface, || bounds, &mut paint_clean);

    assert_eq!(painted, Err(FreezerError::TextureUnavailable));
    assert_eq!(surface.gpu.textures.len(), 1);
    assert!(!freezer.frozen(key).unwrap().is_fragmented(surface.id()));
    assert_eq!(freezer.slice(surface.id()).unwrap().slot_count(), 0);

    surface.gpu.texture_limit = None;
    freezer
        .paint(key, &mut surface, || bounds, &mut paint_clean)
        .unwrap();
    assert_eq!(freezer.slice(surface.id()).unwrap().slot_count(), 6);
}

#[test]
fn smaller_texture_scale_shrinks_cells() {
    let mut freezer = Freezer::new(FreezerConfig {
        texture_scale: 0.5,
        margin: 0,
    })
    .unwrap();
    let mut surface = RecordingSurface::new(1, PAGE);
    let key = freezer.cache(NodeId::new(1));

    freezer
        .paint(
            key,
            &mut surface,
            || Rect::new(0.0, 0.0, 256.0, 128.0),
            &mut paint_clean,
        )
        .unwrap();

    let fragments = freezer.frozen(key).unwrap().fragments(surface.id());
    assert_eq!(fragments.len(), 2);
    assert!(fragments.iter().all(|fragment| fragment.slot.region.width == 64));
}

#[test]
fn rejects_out_of_range_texture_scale() {
    for texture_scale in [0.0, -1.0, 1.5, f32::NAN] {
        let config = FreezerConfig {
            texture_scale,
            ..FreezerConfig::default()
        };
        assert_eq!(
            Freezer::new(config).unwrap_err(),
            FreezerError::InvalidTextureScale
        );
    }
}

#[test]
fn config_round_trips_through_json() {
    let config: FreezerConfig =
        serde_json::from_str(r#"{"texture_scale": 0.25}"#).unwrap();
    assert_eq!(config.texture_scale, 0.25);
    assert_eq!(config.margin, crate::FREEZER_MARGIN);
}

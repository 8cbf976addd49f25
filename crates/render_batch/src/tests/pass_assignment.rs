//! Light-pass assignment scenarios
//!
//! Pass caps, ambient fallback, sub-layer ordering, repeatability, light type
//! grouping and lights dropped by the shadow technique.

use super::*;
use crate::foundation::math::Vec3;
use crate::scene::{Light, LightFlags, LightType};
use crate::shader::ShaderVarStack;
use crate::shadow::{LightRequest, NoShadows, SpreadMask};

/// Drops one light, keeps every other
struct OmitLight(LightId);

impl ShadowCapability for OmitLight {
    type LightData = ();

    fn handle_light(
        &mut self,
        request: &LightRequest<'_>,
        _data: &mut (),
        _frames: &mut [ShaderVarStack],
    ) -> SpreadMask {
        u32::from(request.light_id != self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMBIENT: usize = 0;
    const LIGHT: usize = 1;

    #[test]
    fn test_passes_are_capped_by_lights_and_passes() {
        let mut registry = LightRegistry::new();
        let influences = point_lights(&mut registry, 10);
        let (shaders, _, lit) = shader_table(8);
        let mut batcher = RenderBatcher::new(config(4, 2), NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));

        let stats = prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);

        let slots = layer_slots(&tree, ctx, LIGHT, 0);
        assert_eq!(slots.len(), 2);
        for (pass, slot) in slots.iter().enumerate() {
            assert_eq!(slot.shader, Some(lit));
            assert_eq!(slot.light_count, Some(4));
            assert_eq!(slot.pass, i32::try_from(pass).ok());
        }

        let state = tree.context(ctx).expect("context").state();
        let ids: Vec<LightId> = influences.iter().map(|i| i.light).collect();
        let first = slot_light_ids(&tree, ctx, state.index_of(LIGHT, 0), 0, &registry);
        let second = slot_light_ids(&tree, ctx, state.index_of(LIGHT, 1), 0, &registry);
        assert_eq!(first, ids[0..4]);
        assert_eq!(second, ids[4..8]);
        assert_eq!(stats.lights_rejected, 2);
        assert_eq!(stats.lights_assigned, 8);
    }

    #[test]
    fn test_shader_limit_below_layer_limit() {
        let mut registry = LightRegistry::new();
        let influences = point_lights(&mut registry, 5);
        let (shaders, _, _) = shader_table(2);
        let mut batcher = RenderBatcher::new(config(8, 4), NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));

        prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);

        let counts: Vec<_> =
            layer_slots(&tree, ctx, LIGHT, 0).iter().map(|s| s.light_count).collect();
        assert_eq!(counts, vec![Some(2), Some(2), Some(1)]);
    }

    #[test]
    fn test_mesh_without_lights_falls_back_to_ambient() {
        let registry = LightRegistry::new();
        let (shaders, ambient, _) = shader_table(4);
        let mut batcher = RenderBatcher::new(config(4, 2), NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));

        let stats = prepare(&mut batcher, &mut tree, &registry, &shaders, &[]);

        let ambient_slots = layer_slots(&tree, ctx, AMBIENT, 0);
        assert_eq!(ambient_slots.len(), 1);
        assert_eq!(ambient_slots[0].shader, Some(ambient));
        assert_eq!(ambient_slots[0].light_count, Some(0));

        let lit_slots = layer_slots(&tree, ctx, LIGHT, 0);
        assert_eq!(lit_slots.len(), 1);
        assert_eq!(lit_slots[0].shader, None);

        let state = tree.context(ctx).expect("context").state();
        assert!(state.layers().ticket(state.index_of(AMBIENT, 0), 0).is_some());
        assert!(state.layers().ticket(state.index_of(LIGHT, 0), 0).is_none());
        assert_eq!(stats.active_passes, 1);
    }

    #[test]
    fn test_lit_ambient_layer_without_lights_keeps_one_pass() {
        let registry = LightRegistry::new();
        let (shaders, _, lit) = shader_table(4);
        let config = BatchingConfig::default()
            .with_layers(vec![LayerConfig::new("light").ambient().with_max_passes(3)]);
        let mut batcher = RenderBatcher::new(config, NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));

        prepare(&mut batcher, &mut tree, &registry, &shaders, &[]);

        let slots = layer_slots(&tree, ctx, 0, 0);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].shader, Some(lit));
        assert_eq!(slots[0].light_count, Some(0));
    }

    #[test]
    fn test_zero_pass_layer_stays_inactive() {
        let mut registry = LightRegistry::new();
        let influences = point_lights(&mut registry, 3);
        let (shaders, _, _) = shader_table(4);
        let mut batcher = RenderBatcher::new(config(4, 0), NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));

        let stats = prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);

        assert!(layer_slots(&tree, ctx, LIGHT, 0).iter().all(|s| s.shader.is_none()));
        assert_eq!(stats.lights_rejected, 3);
    }

    #[test]
    fn test_sub_layer_blocks_stay_ordered() {
        let mut registry = LightRegistry::new();
        let many = point_lights(&mut registry, 7);
        let few: Vec<_> = many[..2].to_vec();
        let (shaders, _, _) = shader_table(2);
        let config = BatchingConfig::default().with_layers(vec![
            LayerConfig::new("ambient").ambient(),
            LayerConfig::new("light").with_max_lights(2).with_max_passes(2),
            LayerConfig::new("ambient_late").with_shader_types(["ambient"]).ambient(),
            LayerConfig::new("light_late")
                .with_shader_types(["light"])
                .with_max_lights(2)
                .with_max_passes(3),
        ]);
        let mut batcher = RenderBatcher::new(config, NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));
        tree.add_mesh(ctx, mesh_at(1, Vec3::new(50.0, 0.0, 0.0)));

        let query = FnLightQuery(|bounds: &BoundingSphere| {
            if bounds.center.x > 10.0 {
                few.clone()
            } else {
                many.clone()
            }
        });
        let inputs = FrameInputs {
            lights: &registry,
            light_query: &query,
            shaders: &shaders,
        };
        batcher.prepare_frame(&mut tree, &inputs);

        let state = tree.context(ctx).expect("context").state();
        let counts: Vec<_> = (0..4).map(|l| state.sub_layer_count(l)).collect();
        // 7 lights: 4 in the first lit layer, the last 3 in the second
        assert_eq!(counts, vec![1, 2, 1, 2]);
        for l1 in 0..4 {
            for l2 in l1 + 1..4 {
                assert!(state.index_of(l2, 0) >= state.index_of(l1, 0) + state.sub_layer_count(l1));
            }
        }
        assert_eq!(state.layers().len(), 6);
    }

    #[test]
    fn test_repeated_frames_are_identical() {
        let mut registry = LightRegistry::new();
        let mut influences = point_lights(&mut registry, 6);
        influences.push(add_light(
            &mut registry,
            Light::directional(-Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0),
        ));
        let (shaders, _, _) = shader_table(3);
        let mut batcher = RenderBatcher::new(config(3, 4), NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        for geometry in 0..3 {
            tree.add_mesh(ctx, mesh_at(geometry, Vec3::new(0.0, 0.0, -2.0 * geometry as f32)));
        }

        let snapshot = |tree: &RenderTree| {
            let state = tree.context(ctx).expect("context").state();
            let mut rows = Vec::new();
            for row in 0..state.layers().len() {
                for mesh in 0..state.mesh_count() {
                    rows.push((
                        row,
                        mesh,
                        state.layers().shader(row, mesh),
                        state.layers().ticket(row, mesh),
                        state
                            .layers()
                            .variables(row, mesh)
                            .and_then(|v| v.get_int(names::LIGHT_COUNT)),
                    ));
                }
            }
            rows
        };

        let first_stats = prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);
        let first = snapshot(&tree);
        let second_stats = prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);
        assert_eq!(first, snapshot(&tree));
        assert_eq!(first_stats.active_passes, second_stats.active_passes);
        assert_eq!(second_stats.frame, first_stats.frame + 1);
    }

    #[test]
    fn test_passes_do_not_mix_light_types() {
        let mut registry = LightRegistry::new();
        let white = Vec3::new(1.0, 1.0, 1.0);
        let influences: Vec<_> = [
            Light::point(Vec3::new(1.0, 0.0, 0.0), white, 1.0, 50.0),
            Light::directional(-Vec3::y(), white, 1.0),
            Light::point(Vec3::new(2.0, 0.0, 0.0), white, 1.0, 50.0),
            Light::spot(Vec3::new(0.0, 5.0, 0.0), -Vec3::y(), white, 1.0, 50.0, 0.3, 0.5),
            Light::point(Vec3::new(3.0, 0.0, 0.0), white, 1.0, 50.0),
        ]
        .into_iter()
        .map(|light| add_light(&mut registry, light))
        .collect();
        let (shaders, _, _) = shader_table(4);
        let mut batcher = RenderBatcher::new(config(4, 4), NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));

        prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);

        let slots = layer_slots(&tree, ctx, LIGHT, 0);
        let summary: Vec<_> = slots.iter().map(|s| (s.light_type, s.light_count)).collect();
        assert_eq!(
            summary,
            vec![
                (Some(LightType::Point.shader_value()), Some(3)),
                (Some(LightType::Directional.shader_value()), Some(1)),
                (Some(LightType::Spot.shader_value()), Some(1)),
            ]
        );

        let state = tree.context(ctx).expect("context").state();
        let points = slot_light_ids(&tree, ctx, state.index_of(LIGHT, 0), 0, &registry);
        assert_eq!(points, vec![influences[0].light, influences[2].light, influences[4].light]);
    }

    #[test]
    fn test_flags_split_passes_unless_masked() {
        let mut registry = LightRegistry::new();
        let white = Vec3::new(1.0, 1.0, 1.0);
        let influences: Vec<_> = [
            Light::point(Vec3::new(1.0, 0.0, 0.0), white, 1.0, 50.0),
            Light::point(Vec3::new(2.0, 0.0, 0.0), white, 1.0, 50.0)
                .with_flags(LightFlags::NO_SHADOWS),
        ]
        .into_iter()
        .map(|light| add_light(&mut registry, light))
        .collect();
        let (shaders, _, _) = shader_table(4);

        // NoShadows ignores the shadow flag when grouping
        let mut batcher = RenderBatcher::new(config(4, 4), NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));
        prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);
        assert_eq!(layer_slots(&tree, ctx, LIGHT, 0).len(), 1);

        let mut batcher = RenderBatcher::new(config(4, 4), OmitLight(LightId::default()));
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));
        prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);
        let counts: Vec<_> =
            layer_slots(&tree, ctx, LIGHT, 0).iter().map(|s| s.light_count).collect();
        assert_eq!(counts, vec![Some(1), Some(1)]);
    }

    #[test]
    fn test_omitted_light_is_excluded_wherever_it_sits() {
        for omitted in 0..3 {
            let mut registry = LightRegistry::new();
            let influences = point_lights(&mut registry, 3);
            let (shaders, _, _) = shader_table(4);
            let omit = OmitLight(influences[omitted].light);
            let mut batcher = RenderBatcher::new(config(4, 1), omit);
            let mut tree = batcher.create_tree();
            let ctx = tree.create_context(view());
            tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));

            let stats = prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);

            let slots = layer_slots(&tree, ctx, LIGHT, 0);
            assert_eq!(slots[0].light_count, Some(2), "omitted light {omitted}");
            let state = tree.context(ctx).expect("context").state();
            let expected: Vec<_> = influences
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != omitted)
                .map(|(_, inf)| inf.light)
                .collect();
            let ids = slot_light_ids(&tree, ctx, state.index_of(LIGHT, 0), 0, &registry);
            assert_eq!(ids, expected);
            assert_eq!(stats.lights_omitted, 1);
        }
    }

    #[test]
    fn test_pass_with_every_light_omitted_is_deactivated() {
        let mut registry = LightRegistry::new();
        let influences = point_lights(&mut registry, 1);
        let (shaders, _, _) = shader_table(4);
        let mut batcher = RenderBatcher::new(config(4, 1), OmitLight(influences[0].light));
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));

        prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);

        assert_eq!(layer_slots(&tree, ctx, LIGHT, 0)[0].shader, None);
    }

    #[test]
    fn test_destroyed_light_leaves_cache_and_passes() {
        let mut registry = LightRegistry::new();
        let influences = point_lights(&mut registry, 2);
        let (shaders, _, _) = shader_table(4);
        let mut batcher = RenderBatcher::new(config(4, 1), NoShadows);
        let mut tree = batcher.create_tree();
        let ctx = tree.create_context(view());
        tree.add_mesh(ctx, mesh_at(0, Vec3::zeros()));

        prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);
        assert_eq!(batcher.assigner().cache().len(), 2);

        let gone = influences[1].light;
        assert!(registry.remove(gone).is_some());
        // The query still reports the stale influence
        prepare(&mut batcher, &mut tree, &registry, &shaders, &influences);
        assert!(!batcher.assigner().cache().contains(gone));
        assert_eq!(batcher.assigner().cache().len(), 1);
        assert_eq!(layer_slots(&tree, ctx, LIGHT, 0)[0].light_count, Some(1));
    }
}

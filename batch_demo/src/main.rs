//! Batching demo
//!
//! Builds a small two-sector scene joined by a portal, then runs the batcher
//! for a few frames with the shadow technique picked in the configuration,
//! moving one light so the pass layout changes over time.
//!
//! Usage: `batch_demo [config.toml|config.ron]`

use std::sync::Arc;

use render_batch::foundation::logging;
use render_batch::prelude::*;
use thiserror::Error;

const FRAMES: u64 = 4;

#[derive(Debug, Error)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
}

struct Scene {
    shaders: ShaderTable,
    lights: LightRegistry,
    culler: SimpleListCuller,
    moving_light: LightId,
}

impl Scene {
    fn build() -> Self {
        let mut shaders = ShaderTable::new();
        let unlit = shaders.register("unlit", ShaderMetadata { max_lights: 0 });
        let forward = shaders.register("forward4", ShaderMetadata { max_lights: 4 });
        shaders.bind_type("ambient", unlit);
        shaders.bind_type("light", forward);

        let white = Vec3::new(1.0, 1.0, 1.0);
        let mut lights = LightRegistry::new();
        lights.insert(Light::directional(Vec3::new(-0.3, -1.0, -0.2), white, 0.6));
        let warm = Vec3::new(1.0, 0.6, 0.3);
        let moving_light = lights.insert(Light::point(Vec3::new(0.0, 2.0, -4.0), warm, 3.0, 12.0));
        for i in 0..6u8 {
            let x = f32::from(i) * 2.0 - 5.0;
            lights.insert(
                Light::point(Vec3::new(x, 1.5, -8.0), white, 1.0, 6.0)
                    .with_flags(LightFlags::NO_SHADOWS)
                    .in_sector(SectorId(0)),
            );
        }
        lights.insert(
            Light::spot(Vec3::new(0.0, 6.0, -30.0), -Vec3::y(), white, 4.0, 20.0, 0.3, 0.5)
                .in_sector(SectorId(1)),
        );

        let stone = Arc::new(Material::new(MaterialId(0), "stone"));
        let glass = Arc::new(Material::new(MaterialId(1), "glass"));
        let mut culler = SimpleListCuller::new();
        for i in 0..8u8 {
            let offset = f32::from(i);
            let bounds = BoundingSphere::new(Vec3::new(offset - 4.0, 0.0, -6.0 - offset), 1.0);
            let geometry = GeometryId(u32::from(i % 3));
            let mesh = RenderMesh::new(geometry, Arc::clone(&stone), bounds).with_priority(1);
            culler.add_mesh(SectorId(0), Arc::new(mesh));
        }
        let pane = BoundingSphere::new(Vec3::new(0.0, 1.0, -5.0), 0.5);
        let glass_mesh = RenderMesh::new(GeometryId(10), glass, pane).with_priority(2);
        culler.add_mesh(SectorId(0), Arc::new(glass_mesh));

        let vault = BoundingSphere::new(Vec3::new(0.0, 0.0, -30.0), 2.0);
        let vault_mesh = RenderMesh::new(GeometryId(20), stone, vault).with_priority(1);
        culler.add_mesh(SectorId(1), Arc::new(vault_mesh));

        let doorway = BoundingSphere::new(Vec3::new(0.0, 1.0, -15.0), 2.0);
        culler.add_portal(SectorId(0), Portal::new(doorway, -Vec3::z(), SectorId(1)));

        log::info!("Scene: {} light(s), {} mesh(es)", lights.len(), culler.mesh_count());
        Self {
            shaders,
            lights,
            culler,
            moving_light,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn animate(&mut self, frame: u64) {
        if let Some(light) = self.lights.get_mut(self.moving_light) {
            light.position.x = (frame as f32 * 1.5).sin() * 4.0;
        }
    }
}

fn run<S: ShadowCapability>(config: BatchingConfig, shadow: S, scene: &mut Scene) {
    let mut batcher = RenderBatcher::new(config, shadow);
    for frame in 1..=FRAMES {
        scene.animate(frame);
        let mut tree = batcher.create_tree();
        let camera = Camera::new(Vec3::new(0.0, 1.5, 2.0), Vec3::new(0.0, 1.0, -10.0));
        let view = RenderView::new(camera, SectorId(0), frame);
        tree.populate_recursive(view, &scene.culler);

        let query = RegistryLightQuery::new(&scene.lights);
        let inputs = FrameInputs {
            lights: &scene.lights,
            light_query: &query,
            shaders: &scene.shaders,
        };
        let stats = batcher.prepare_frame(&mut tree, &inputs);
        log::info!("{stats:?}");

        for view in batcher.shadow().shadow_views() {
            log::debug!(
                "Shadow view: light {:?} sub-light {} -> target {:?}",
                view.light,
                view.sub_light,
                view.target
            );
        }
    }
}

fn main() -> Result<(), DemoError> {
    logging::init_with_level(log::LevelFilter::Info);

    let config = match std::env::args().nth(1) {
        Some(path) => BatchingConfig::load_from_file(&path)?,
        None => BatchingConfig::load_or_default("batching.toml")?,
    };
    config.validate()?;
    log::info!(
        "{} render layer(s), shadows: {:?}",
        config.render_layers.len(),
        config.shadows.technique
    );

    let mut scene = Scene::build();
    match config.shadows.technique {
        ShadowTechnique::None => run(config, NoShadows, &mut scene),
        ShadowTechnique::ShadowMap => {
            let shadow = ShadowMapShadows::new(&config.shadows);
            run(config, shadow, &mut scene);
        }
        ShadowTechnique::Cascaded => {
            let shadow = CascadedShadows::new(&config.shadows);
            run(config, shadow, &mut scene);
        }
    }

    log::info!("Done");
    Ok(())
}

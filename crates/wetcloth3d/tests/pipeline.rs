use wetcloth3d::prelude::*;

struct CountingHooks {
    calls: usize,
    active_buckets: usize,
}

impl GridSolverHooks for CountingHooks {
    fn solve_grid(&mut self, scene: &mut Scene, _dt: Real) {
        self.calls += 1;
        self.active_buckets = scene.nodes.num_active_buckets();
    }
}

fn droplet() -> Scene {
    let mut scene = Scene::new(SceneParameters::default(), LiquidParameters::default()).unwrap();
    let vf = scene.fine_volume();
    let density = scene.liquid.liquid_density;
    let dx = scene.cell_size();

    let particles = (0..8)
        .map(|i| {
            let shift = Vector::new((i & 1) as Real, ((i >> 1) & 1) as Real, (i >> 2) as Real);
            Particle::liquid(Point::new(0.2, 0.2, 0.2) + shift * (0.5 * dx), vf, density)
        })
        .collect();
    scene.insert_particles(ParticleKind::Liquid, particles).unwrap();
    scene
}

#[test]
fn steps_call_the_grid_solver() {
    let mut scene = droplet();
    let mut pipeline = ScenePipeline::new();
    let mut hooks = CountingHooks {
        calls: 0,
        active_buckets: 0,
    };

    pipeline.step(&mut scene, 1.0e-3, &mut hooks);
    pipeline.step(&mut scene, 1.0e-3, &mut hooks);

    assert_eq!(hooks.calls, 2);
    assert!(hooks.active_buckets > 0);
}

#[test]
fn resting_droplet_keeps_its_volume() {
    let mut scene = droplet();
    let total = scene.total_fluid_volume_particles();
    let mut pipeline = ScenePipeline::default();

    for _ in 0..3 {
        pipeline.step(&mut scene, 1.0e-3, &mut ());
    }

    let new_total = scene.total_fluid_volume_particles();
    assert!((new_total - total).abs() < 1.0e-9 * total, "{} != {}", new_total, total);
    assert!(scene
        .particles
        .iter()
        .all(|p| p.position.coords.iter().all(|x| x.is_finite())));
}

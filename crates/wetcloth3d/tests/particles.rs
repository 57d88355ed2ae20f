use wetcloth3d::core::utils;
use wetcloth3d::na;
use wetcloth3d::prelude::*;

fn scene() -> Scene {
    let mut liquid = LiquidParameters::default();
    liquid.correction_step = 1;
    Scene::new(SceneParameters::default(), liquid).unwrap()
}

fn insert_liquid(scene: &mut Scene, particles: &[(Point<Real>, Real)]) {
    let density = scene.liquid.liquid_density;
    let particles = particles
        .iter()
        .map(|(pos, volume)| Particle::liquid(*pos, *volume, density))
        .collect();
    scene.insert_particles(ParticleKind::Liquid, particles).unwrap();
}

fn assert_relative_eq(a: Real, b: Real) {
    assert!((a - b).abs() <= 1.0e-9 * a.abs().max(b.abs()), "{} != {}", a, b);
}

#[test]
fn swapping_twice_restores_everything() {
    let mut scene = scene();
    let soft = (0..3)
        .map(|i| Particle::soft(Point::new(0.1 * i as Real, 0.05, 0.0), Radii::repeat(0.01)))
        .collect();
    scene.insert_particles(ParticleKind::Soft, soft).unwrap();
    scene.set_edges(&[[0, 1], [1, 2]], &[]).unwrap();

    let particles0 = scene.particles.particles().to_vec();
    let edges0 = scene.elements.particle_edges.clone();

    scene.swap_particles(0, 2);
    assert_eq!(scene.particles.particles()[0], particles0[2]);
    assert_eq!(scene.particles.particles()[2], particles0[0]);
    assert_eq!(scene.elements.particle_edges[0], edges0[2]);

    scene.swap_particles(0, 2);
    assert_eq!(scene.particles.particles(), &particles0[..]);
    assert_eq!(scene.elements.particle_edges, edges0);
}

#[test]
fn empty_liquid_particles_are_removed() {
    let mut scene = scene();
    let vf = scene.fine_volume();
    insert_liquid(
        &mut scene,
        &[
            (Point::new(0.1, 0.1, 0.1), vf),
            (Point::new(0.2, 0.1, 0.1), 0.0),
            (Point::new(0.3, 0.1, 0.1), vf),
        ],
    );

    assert_eq!(scene.remove_empty_particles(), 1);
    assert_eq!(scene.num_particles(), 2);
    assert_eq!(scene.particles.fluids(), &[0, 1]);
    assert!(scene.particles.iter().all(|p| p.fluid_volume == vf));
}

#[test]
fn relabel_is_idempotent() {
    let mut scene = scene();
    let vf = scene.fine_volume();
    let ratios = [0.3, 0.7, 1.0, 1.5, 3.0];
    let particles: Vec<_> = ratios
        .iter()
        .enumerate()
        .map(|(i, r)| (Point::new(0.05 * i as Real, 0.0, 0.0), r * vf))
        .collect();
    insert_liquid(&mut scene, &particles);

    scene.relabel_liquid_particles();
    let classes: Vec<_> = scene.particles.iter().map(|p| p.class).collect();
    assert_eq!(
        classes,
        vec![
            ParticleClass::VerySmall,
            ParticleClass::Small,
            ParticleClass::Normal,
            ParticleClass::Large,
            ParticleClass::VeryLarge
        ]
    );

    scene.relabel_liquid_particles();
    let classes2: Vec<_> = scene.particles.iter().map(|p| p.class).collect();
    assert_eq!(classes, classes2);
}

#[test]
fn split_conserves_volume_and_spreads_children() {
    let mut scene = scene();
    let vf = scene.fine_volume();
    let center = Point::new(0.2, 0.2, 0.2);
    insert_liquid(&mut scene, &[(center, 4.4 * vf)]);

    scene.relabel_liquid_particles();
    assert_eq!(scene.split_liquid_particles(), 4);
    assert_eq!(scene.num_particles(), 5);
    assert_eq!(scene.particles.num_fluid_particles(), 5);
    assert_relative_eq(scene.total_fluid_volume_particles(), 4.4 * vf);

    let new_radius = utils::sphere_radius(0.88 * vf);
    let parent_radius = utils::sphere_radius(4.4 * vf);
    let splat = new_radius.max(parent_radius - new_radius) * 0.75;

    for p in scene.particles.iter() {
        assert_relative_eq(p.fluid_volume, 0.88 * vf);
        assert!((na::distance(&p.position, &center) - splat).abs() < 1.0e-9);
    }
}

#[test]
fn normal_particles_are_not_split() {
    let mut scene = scene();
    let vf = scene.fine_volume();
    insert_liquid(&mut scene, &[(Point::new(0.2, 0.2, 0.2), 1.5 * vf)]);

    scene.relabel_liquid_particles();
    assert_eq!(scene.split_liquid_particles(), 0);
    assert_eq!(scene.num_particles(), 1);
}

#[test]
fn very_small_particles_merge() {
    let mut scene = scene();
    let vf = scene.fine_volume();
    let r = scene.fine_radius();
    insert_liquid(
        &mut scene,
        &[
            (Point::new(0.1, 0.1, 0.1), 0.2 * vf),
            (Point::new(0.1 + 0.3 * r, 0.1, 0.1), 0.2 * vf),
        ],
    );

    scene.relabel_liquid_particles();
    assert_eq!(scene.merge_liquid_particles(), 1);
    assert_eq!(scene.num_particles(), 1);
    assert_relative_eq(scene.total_fluid_volume_particles(), 0.4 * vf);

    let p = &scene.particles.particles()[0];
    assert_relative_eq(p.fluid_volume, 0.4 * vf);
    assert_relative_eq(p.radii[0], utils::sphere_radius(0.4 * vf));
}

#[test]
fn distant_particles_do_not_merge() {
    let mut scene = scene();
    let vf = scene.fine_volume();
    let r = scene.fine_radius();
    insert_liquid(
        &mut scene,
        &[
            (Point::new(0.1, 0.1, 0.1), 0.2 * vf),
            (Point::new(0.1 + 3.0 * r, 0.1, 0.1), 0.2 * vf),
        ],
    );

    scene.relabel_liquid_particles();
    assert_eq!(scene.merge_liquid_particles(), 0);
    assert_eq!(scene.num_particles(), 2);
}

#[test]
fn merging_keeps_the_momentum() {
    let mut scene = scene();
    let vf = scene.fine_volume();
    let r = scene.fine_radius();
    insert_liquid(
        &mut scene,
        &[
            (Point::new(0.1, 0.1, 0.1), 0.4 * vf),
            (Point::new(0.1 + 0.5 * r, 0.1, 0.1), 0.4 * vf),
        ],
    );
    scene.particles.particles_mut()[0].fluid_velocity = Vector::new(1.0, 0.0, 0.0);
    scene.particles.particles_mut()[1].fluid_velocity = Vector::new(0.0, 1.0, 0.0);

    scene.relabel_liquid_particles();
    assert_eq!(scene.merge_liquid_particles(), 1);

    let p = &scene.particles.particles()[0];
    assert_relative_eq(p.fluid_volume, 0.8 * vf);
    assert!((p.fluid_velocity - Vector::new(0.5, 0.5, 0.0)).norm() < 1.0e-12);
    assert_eq!(p.class, ParticleClass::Small);
}

#[test]
fn default_merge_stride_eventually_merges() {
    // With the default stride, a pass only lets one particle out of
    // `correction_step` donate, so a pair may survive a few passes.
    let mut scene = Scene::new(SceneParameters::default(), LiquidParameters::default()).unwrap();
    assert_eq!(scene.liquid.correction_step, 8);
    let vf = scene.fine_volume();
    let r = scene.fine_radius();
    insert_liquid(
        &mut scene,
        &[
            (Point::new(0.1, 0.1, 0.1), 0.4 * vf),
            (Point::new(0.1 + 0.5 * r, 0.1, 0.1), 0.4 * vf),
        ],
    );
    scene.relabel_liquid_particles();

    let mut passes = 0;
    while scene.num_particles() > 1 && passes < 100 {
        scene.merge_liquid_particles();
        assert_relative_eq(scene.total_fluid_volume_particles(), 0.8 * vf);
        passes += 1;
    }

    assert_eq!(scene.num_particles(), 1);
    assert_relative_eq(scene.particles.particles()[0].fluid_volume, 0.8 * vf);
}

#[test]
fn terminators_delete_the_liquid_inside() {
    let mut scene = scene();
    let vf = scene.fine_volume();
    insert_liquid(
        &mut scene,
        &[
            (Point::new(0.1, 0.1, 0.1), vf),
            (Point::new(0.5, 0.1, 0.1), 2.0 * vf),
            (Point::new(0.12, 0.1, 0.1), vf),
        ],
    );
    scene.add_distance_field(DistanceField::primitive(
        wetcloth3d::parry::shape::SharedShape::ball(0.05),
        Isometry::translation(0.1, 0.1, 0.1),
        DistanceFieldUsage::Terminator,
        0,
    ));

    assert_eq!(scene.terminate_particles(), 2);
    assert_eq!(scene.particles.num_fluid_particles(), 1);
    assert_relative_eq(scene.total_fluid_volume_particles(), 2.0 * vf);
    assert_eq!(scene.particles.particles()[0].position, Point::new(0.5, 0.1, 0.1));
}

#[test]
fn solid_projection_pushes_liquid_out_of_solids() {
    let mut scene = scene();
    let vf = scene.fine_volume();
    insert_liquid(
        &mut scene,
        &[(Point::new(0.2, 0.19, 0.2), vf), (Point::new(0.2, 0.35, 0.2), vf)],
    );
    // A box whose top face is the plane y = 0.2.
    scene.add_distance_field(DistanceField::primitive(
        wetcloth3d::parry::shape::SharedShape::cuboid(1.0, 1.0, 1.0),
        Isometry::translation(0.2, -0.8, 0.2),
        DistanceFieldUsage::Solid,
        0,
    ));
    scene.rebucketize_particles();
    scene.resample_nodes();
    scene.compute_weights();
    scene.update_solid_phi();

    scene.solid_projection(1.0e-3);

    let inside = scene.particles.particles()[0].position;
    assert!((inside - Point::new(0.2, 0.2, 0.2)).norm() < 1.0e-9, "{:?}", inside);
    assert_eq!(scene.particles.particles()[1].position, Point::new(0.2, 0.35, 0.2));
}

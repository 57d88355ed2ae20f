use wetcloth3d::na;
use wetcloth3d::na::{point, vector};
use wetcloth3d::parry::shape::SharedShape;
use wetcloth3d::prelude::*;

fn scene() -> Scene {
    Scene::new(SceneParameters::default(), LiquidParameters::default()).unwrap()
}

fn solid_ball() -> DistanceField {
    DistanceField::primitive(
        SharedShape::ball(0.2),
        Isometry::translation(0.5, 0.5, 0.5),
        DistanceFieldUsage::Solid,
        1,
    )
    .sampled(0)
}

fn source_box(window: EmissionWindow) -> DistanceField {
    DistanceField::primitive(
        SharedShape::cuboid(0.06, 0.06, 0.06),
        Isometry::translation(0.3, 0.3, 0.3),
        DistanceFieldUsage::Source,
        0,
    )
    .with_emission(window)
}

#[test]
fn solids_are_covered_with_fixed_surfels() {
    let mut scene = scene();
    scene.add_distance_field(solid_ball());
    let center = point![0.5, 0.5, 0.5];

    let num_sampled = scene.sample_solid_distance_fields().unwrap();
    assert!(num_sampled > 20);
    assert_eq!(scene.particles.num_surfels(), num_sampled);
    assert_eq!(scene.elements.surfels.len(), num_sampled);

    for (k, i) in scene.elements.surfels.iter().enumerate() {
        let p = &scene.particles.particles()[*i];
        let n = scene.elements.surfel_normals[k];
        assert!(p.is_fixed());
        assert_eq!(p.group, 1);
        assert_eq!(p.orientation, n);
        assert!((na::distance(&p.position, &center) - 0.2).abs() < 1.0e-6);
        assert!(n.dot(&(p.position - center)) > 0.0);
    }
    assert!(scene.groups.len() >= 2);
}

#[test]
fn solid_sampling_rejects_bad_setups() {
    let mut scene = scene();
    scene.add_distance_field(solid_ball().sampled(3));
    assert!(scene.sample_solid_distance_fields().is_err());

    let mut scene = self::scene();
    let density = scene.liquid.liquid_density;
    scene
        .insert_particles(
            ParticleKind::Liquid,
            vec![Particle::liquid(point![0.0, 0.0, 0.0], 1.0e-5, density)],
        )
        .unwrap();
    scene.add_distance_field(solid_ball());
    assert!(scene.sample_solid_distance_fields().is_err());
    assert_eq!(scene.particles.num_surfels(), 0);
}

#[test]
fn unsampled_fields_are_ignored() {
    let mut scene = scene();
    scene.add_distance_field(DistanceField::primitive(
        SharedShape::ball(0.2),
        Isometry::identity(),
        DistanceFieldUsage::Solid,
        0,
    ));
    assert_eq!(scene.sample_solid_distance_fields().unwrap(), 0);
    assert_eq!(scene.sample_liquid_distance_fields(0.0), 0);
}

#[test]
fn sources_fill_their_interior_once() {
    let mut scene = scene();
    let velocity = vector![0.0, -1.0, 0.0];
    scene.add_distance_field(source_box(EmissionWindow::new(0.0, 1.0, velocity)));
    let fine_volume = scene.fine_volume();

    assert_eq!(scene.sample_liquid_distance_fields(0.5), 64);
    assert_eq!(scene.particles.num_fluid_particles(), 64);
    for i in scene.particles.fluids() {
        let p = &scene.particles.particles()[*i];
        assert_eq!(p.fluid_velocity, velocity);
        assert!((p.fluid_volume - fine_volume).abs() < 1.0e-15);
        assert!(scene.distance_fields[0].compute_phi(&p.position) < 0.0);
    }
    let emitted = scene.distance_fields[0].emitted_volume;
    assert!((emitted - 64.0 * fine_volume).abs() < 1.0e-12);

    // The cells already holding liquid are not refilled.
    assert_eq!(scene.sample_liquid_distance_fields(0.6), 0);
    assert_eq!(scene.particles.num_fluid_particles(), 64);
}

#[test]
fn sources_stop_outside_their_window_or_volume() {
    let mut scene = scene();
    scene.add_distance_field(source_box(EmissionWindow::new(1.0, 2.0, Vector::zeros())));
    assert_eq!(scene.sample_liquid_distance_fields(0.5), 0);
    assert_eq!(scene.sample_liquid_distance_fields(2.0), 0);

    let mut scene = self::scene();
    let window = EmissionWindow::new(0.0, 1.0, Vector::zeros()).with_max_volume(1.0e-6);
    scene.add_distance_field(source_box(window));
    assert_eq!(scene.sample_liquid_distance_fields(0.0), 64);

    scene.particles.particles_mut().iter_mut().for_each(|p| {
        p.position += vector![1.0, 0.0, 0.0];
    });
    assert_eq!(scene.sample_liquid_distance_fields(0.1), 0);
}

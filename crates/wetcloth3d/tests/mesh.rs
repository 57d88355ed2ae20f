use std::f64::consts::PI;
use wetcloth3d::prelude::*;

fn yarn(fluid_volumes: [Real; 2], volume: Real) -> Scene {
    let mut scene = Scene::new(SceneParameters::default(), LiquidParameters::default()).unwrap();
    let radii = Radii::repeat(0.01);
    let soft = vec![
        Particle {
            volume,
            rest_volume: volume,
            fluid_volume: fluid_volumes[0],
            ..Particle::soft(Point::new(0.1, 0.1, 0.1), radii)
        },
        Particle {
            volume,
            rest_volume: volume,
            fluid_volume: fluid_volumes[1],
            ..Particle::soft(Point::new(0.2, 0.1, 0.1), radii)
        },
    ];
    scene.insert_particles(ParticleKind::Soft, soft).unwrap();
    scene.set_edges(&[[0, 1]], &[]).unwrap();
    scene
}

#[test]
fn edge_gauss_point_at_rest() {
    let mut scene = yarn([0.0, 0.0], 1.0e-6);
    scene.init_gauss_system();

    assert_eq!(scene.num_gauss(), 1);
    let gp = &scene.elements.gauss[0];
    let expected = 0.1 * 0.01 * 0.01 * PI;
    assert!((gp.volume - expected).abs() < 1.0e-12);
    assert!((gp.position - Point::new(0.15, 0.1, 0.1)).norm() < 1.0e-12);

    // Unstretched: the deformation gradient is a rotation.
    let fe = gp.deformation_gradient;
    assert!((fe.transpose() * fe - Matrix::identity()).norm() < 1.0e-9);
    assert!((fe.column(0) - Vector::x()).norm() < 1.0e-9);
    let nf = gp.normal_frame;
    assert!((nf.transpose() * nf - Matrix::identity()).norm() < 1.0e-9);
}

#[test]
fn excess_mesh_liquid_is_released() {
    let fine_volume = Scene::new(SceneParameters::default(), LiquidParameters::default())
        .unwrap()
        .fine_volume();
    let capacity = 2.0 * fine_volume;
    let mut scene = yarn([capacity + 3.25 * fine_volume; 2], capacity);
    scene.init_gauss_system();
    let total = scene.particles.total_fluid_volume();

    scene.distribute_elasto_fluid();

    assert_eq!(scene.particles.num_fluid_particles(), 6);
    assert_eq!(scene.particles.num_elasto_particles(), 2);
    let new_total = scene.particles.total_fluid_volume();
    assert!((new_total - total).abs() < 1.0e-9 * total);

    for p in &scene.particles.particles()[..2] {
        assert!((p.fluid_volume - capacity - 0.25 * fine_volume).abs() < 1.0e-6 * fine_volume);
    }
    for p in &scene.particles.particles()[2..] {
        assert!((p.fluid_volume - fine_volume).abs() < 1.0e-6 * fine_volume);
        assert!(p.position.x >= 0.1 - 1.0e-12 && p.position.x <= 0.2 + 1.0e-12);
    }
}

#[test]
fn saturated_mesh_keeps_its_liquid() {
    let mut scene = yarn([1.0e-7; 2], 1.0e-6);
    scene.init_gauss_system();

    scene.distribute_elasto_fluid();
    assert_eq!(scene.particles.num_fluid_particles(), 0);
    assert!(scene.particles.iter().all(|p| p.fluid_volume == 1.0e-7));
}

#[test]
fn fluid_volume_is_rescaled_to_the_old_total() {
    let mut scene = yarn([1.0e-7, 3.0e-7], 1.0e-6);
    scene.conserve_fluid_volume(8.0e-7);

    let volumes: Vec<_> = scene.particles.iter().map(|p| p.fluid_volume).collect();
    assert!((volumes[0] - 2.0e-7).abs() < 1.0e-18);
    assert!((volumes[1] - 6.0e-7).abs() < 1.0e-18);
}

fn all_finite(m: &Matrix<Real>) -> bool {
    m.iter().all(|x| x.is_finite())
}

#[test]
fn collapsed_elements_have_finite_frames() {
    let mut scene = Scene::new(SceneParameters::default(), LiquidParameters::default()).unwrap();
    let radii = Radii::repeat(0.01);
    let soft = vec![
        Particle::soft(Point::new(0.1, 0.1, 0.1), radii),
        Particle::soft(Point::new(0.2, 0.1, 0.1), radii),
        Particle::soft(Point::new(0.3, 0.1, 0.1), radii),
        Particle::soft(Point::new(0.3, 0.1, 0.1), radii),
    ];
    scene.insert_particles(ParticleKind::Soft, soft).unwrap();
    // A zero-length edge and a flat triangle.
    scene.set_edges(&[[2, 3]], &[]).unwrap();
    scene.set_faces(&[[0, 1, 2]], &[]).unwrap();

    scene.init_gauss_system();
    scene.update_gauss_system(1.0e-3);
    scene.update_orientation();

    for gp in &scene.elements.gauss {
        assert!(all_finite(&gp.frame), "{:?}", gp.frame);
        assert!(all_finite(&gp.normal_frame), "{:?}", gp.normal_frame);
        assert!(all_finite(&gp.rest_frame));
        assert!(all_finite(&gp.inv_rest_frame));
        assert!(all_finite(&gp.deformation_gradient));
    }

    let face = &scene.elements.gauss[1];
    assert_eq!(face.normal_frame.column(2).into_owned(), Vector::zeros());
    assert!((face.normal_frame.column(0) - Vector::x()).norm() < 1.0e-12);

    for p in scene.particles.iter() {
        assert!(p.orientation.iter().all(|x| x.is_finite()), "{:?}", p.orientation);
    }
}

fn cloth() -> Scene {
    let mut scene = Scene::new(SceneParameters::default(), LiquidParameters::default()).unwrap();
    let soft = [[0.1, 0.1, 0.1], [0.2, 0.1, 0.1], [0.1, 0.2, 0.1]]
        .iter()
        .map(|p| Particle::soft(Point::new(p[0], p[1], p[2]), Radii::repeat(0.01)))
        .collect();
    scene.insert_particles(ParticleKind::Soft, soft).unwrap();
    scene.set_faces(&[[0, 1, 2]], &[]).unwrap();
    scene.init_gauss_system();
    scene
}

fn assert_frame_eq(a: &Matrix<Real>, b: &Matrix<Real>) {
    assert!((a - b).norm() < 1.0e-9, "{} != {}", a, b);
}

#[test]
fn stretched_cloth_loses_its_shear() {
    let mut scene = cloth();
    let g = scene.elements.num_edges();
    scene.elements.gauss[g].frame = Matrix::new(1.0, 0.0, 0.3, 0.0, 1.0, 0.2, 0.0, 0.0, 1.5);

    scene.update_plasticity(1.0e-3);

    let gp = &scene.elements.gauss[g];
    assert_frame_eq(&gp.frame, &Matrix::identity());
    assert_frame_eq(&gp.deformation_gradient, &(gp.frame * gp.inv_rest_frame));
}

#[test]
fn compressed_cloth_shear_is_bounded_by_friction() {
    let mut scene = cloth();
    let g = scene.elements.num_edges();
    scene.elements.gauss[g].frame = Matrix::new(1.0, 0.0, 0.3, 0.0, 1.0, 0.4, 0.0, 0.0, 0.9);

    scene.update_plasticity(1.0e-3);

    let material = ElasticParameters::default();
    let la = material.lame_lambda() * material.collision_multiplier;
    let mu = material.lame_mu() * material.collision_multiplier;
    let fnormal = (2.0 * mu + la) * 0.1 * 0.1;

    let frame = scene.elements.gauss[g].frame;
    let shear = Vector::new(frame[(0, 2)], frame[(1, 2)], 0.0);
    assert!((mu * shear.norm() - material.friction_beta * fnormal).abs() < 1.0e-6 * fnormal);
    assert!((shear.x / shear.y - 0.75).abs() < 1.0e-9);
    assert!((frame[(2, 2)] - 0.9).abs() < 1.0e-12);
}

#[test]
fn expanded_yarn_cross_section_returns_to_rest() {
    let mut scene = yarn([0.0, 0.0], 1.0e-6);
    scene.init_gauss_system();
    scene.elements.gauss[0].frame = Matrix::new(1.0, 0.1, 0.2, 0.0, 1.2, 0.0, 0.0, 0.0, 1.1);

    scene.update_plasticity(1.0e-3);

    // No compression means no normal force, so the shear goes as well.
    assert_frame_eq(&scene.elements.gauss[0].frame, &Matrix::identity());
}

/// Two parallel yarns along `x`, `gap` apart along `y`, with the liquid
/// covering both of their midpoints.
fn parallel_yarns(gap: Real, liquid: LiquidParameters) -> Scene {
    let mut scene = Scene::new(SceneParameters::default(), liquid).unwrap();
    let radii = Radii::repeat(0.01);
    let soft = vec![
        Particle::soft(Point::new(0.1, 0.2, 0.2), radii),
        Particle::soft(Point::new(0.3, 0.2, 0.2), radii),
        Particle::soft(Point::new(0.1, 0.2 + gap, 0.2), radii),
        Particle::soft(Point::new(0.3, 0.2 + gap, 0.2), radii),
    ];
    scene.insert_particles(ParticleKind::Soft, soft).unwrap();
    scene.set_edges(&[[0, 1], [2, 3]], &[]).unwrap();

    let density = scene.liquid.liquid_density;
    let dx = scene.cell_size();
    let drops = [Point::new(0.2, 0.2, 0.2), Point::new(0.2, 0.2 + gap, 0.2)]
        .iter()
        .map(|pos| Particle {
            radii: Radii::repeat(2.0 * dx),
            ..Particle::liquid(*pos, 1.0e-5, density)
        })
        .collect();
    scene.insert_particles(ParticleKind::Liquid, drops).unwrap();

    scene.init_gauss_system();
    scene.rebucketize_particles();
    scene.resample_nodes();
    scene.compute_weights();
    scene.update_liquid_phi(1.0e-3);
    scene
}

/// Liquid filling half of the cell left around every Gauss point.
fn wet_gauss_points(scene: &mut Scene) {
    let cell_volume = scene.cell_size().powi(3);
    for gp in &mut scene.elements.gauss {
        gp.fluid_volume = 0.5 * (cell_volume - gp.volume);
    }
}

#[test]
fn wet_parallel_yarns_are_bridged() {
    let mut scene = parallel_yarns(0.05, LiquidParameters::default());
    wet_gauss_points(&mut scene);

    scene.update_intersection();

    for (g, target) in [(0, 1), (1, 0)] {
        let pairs = &scene.elements.cohesion[g];
        assert_eq!(pairs.len(), 1, "{:?}", pairs);
        let pair = &pairs[0];
        assert_eq!(pair.target, target);
        assert!((pair.dist - 0.05).abs() < 1.0e-9);
        assert!((pair.volume_fraction - 0.5).abs() < 1.0e-9);
        // Mutual bridges count half.
        assert!((pair.weight - 0.5).abs() < 1.0e-9);
        assert!(pair.c1.is_finite());
    }
}

#[test]
fn dry_or_disabled_yarns_are_not_bridged() {
    let mut scene = parallel_yarns(0.05, LiquidParameters::default());
    scene.update_intersection();
    assert!(scene.elements.cohesion.iter().all(|pairs| pairs.is_empty()));

    let mut liquid = LiquidParameters::default();
    liquid.use_cohesion = false;
    let mut scene = parallel_yarns(0.05, liquid);
    wet_gauss_points(&mut scene);
    scene.update_intersection();
    assert_eq!(scene.elements.cohesion.len(), scene.num_gauss());
    assert!(scene.elements.cohesion.iter().all(|pairs| pairs.is_empty()));
}

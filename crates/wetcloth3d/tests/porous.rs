use wetcloth3d::core::dynamics::NodeKind;
use wetcloth3d::prelude::*;

fn scene() -> Scene {
    Scene::new(SceneParameters::default(), LiquidParameters::default()).unwrap()
}

#[test]
fn capillary_pressure() {
    let scene = scene();
    let liquid = scene.liquid;
    let expected = liquid.surf_tension_coeff * liquid.rest_contact_angle.cos() / liquid.pore_radius;

    assert_eq!(scene.capillary_pressure(0.0), 0.0);
    assert!((scene.capillary_pressure(0.5) - expected).abs() < 1.0e-9 * expected);
    assert!((scene.capillary_pressure(0.75) - 3.0 * expected).abs() < 1.0e-9 * expected);
    assert_eq!(scene.capillary_pressure(1.0), 0.0);
}

#[test]
fn drag_vanishes_without_medium_or_liquid() {
    let scene = scene();
    assert_eq!(scene.drag_coeff(0.0, 0.5, 1.0, 0), 0.0);
    assert_eq!(scene.drag_coeff(0.3, 0.0, 1.0, 0), 0.0);
    assert_eq!(scene.planar_drag_coeff(0.0, 0.5, 1.0, 0), 0.0);
    assert_eq!(
        scene.drag_coeff_with_orientation(0.3, 0.5, 1.0, &Vector::zeros(), 0.5, 0, 0),
        0.0
    );
}

#[test]
fn drag_grows_with_solid_fraction() {
    let scene = scene();
    let loose = scene.drag_coeff(0.2, 1.0, 0.0, 0);
    let dense = scene.drag_coeff(0.6, 1.0, 0.0, 0);
    assert!(loose > 0.0);
    assert!(dense > loose);
    assert!(dense <= 1.0e63);
}

#[test]
fn linear_drag_is_viscosity_over_permeability() {
    let mut liquid = LiquidParameters::default();
    liquid.use_nonlinear_drag = false;
    let scene = Scene::new(SceneParameters::default(), liquid).unwrap();

    let psi: Real = 0.4;
    let di = liquid.yarn_diameter;
    let k = (-psi.ln() - 1.476 + 2.0 * psi - 0.5 * psi * psi) / (16.0 * psi) * di * di;
    let expected = liquid.viscosity / k;

    let c = scene.planar_drag_coeff(psi, 1.0, 10.0, 0);
    assert!((c - expected).abs() < 1.0e-9 * expected, "{} != {}", c, expected);
}

#[test]
fn diffusivity_of_empty_medium() {
    let scene = scene();
    assert_eq!(scene.vertical_diffusivity(0.0, 0), 1.0);
    assert!(scene.vertical_diffusivity(0.3, 0) > 0.0);
}

fn wet_yarn(liquid: LiquidParameters, psi: [Real; 2]) -> Scene {
    let mut scene = Scene::new(SceneParameters::default(), liquid).unwrap();
    let soft = (0..2)
        .map(|i| Particle {
            volume: 1.0e-6,
            rest_volume: 1.0e-6,
            fluid_volume: 1.0e-7,
            volume_fraction: psi[i],
            ..Particle::soft(Point::new(0.1 + 0.1 * i as Real, 0.1, 0.1), Radii::repeat(0.01))
        })
        .collect();
    scene.insert_particles(ParticleKind::Soft, soft).unwrap();
    scene.set_edges(&[[0, 1]], &[]).unwrap();
    scene.init_gauss_system();
    scene
}

#[test]
fn capillary_suction_pulls_toward_dense_fibers() {
    let mut liquid = LiquidParameters::default();
    liquid.apply_pressure_manifold = false;
    let scene = wet_yarn(liquid, [0.3, 0.6]);

    let pore = |psi: Real| {
        let s = 1.0e-7 / (1.0e-6 * (1.0 - psi));
        scene.capillary_pressure(psi) * (1.0 - s) * 2.0
    };
    let pressures = scene.elasto_pore_pressure();
    assert!((pressures[0] - pore(0.3)).abs() < 1.0e-9 * pore(0.3));
    assert!((pressures[1] - pore(0.6)).abs() < 1.0e-9 * pore(0.6));

    let mut f = vec![Vector::zeros(); scene.num_gauss()];
    scene.accumulate_manifold_grad_pore_pressure(&mut f);

    // The shape function gradients of a 0.1 long edge are ±10 along x.
    let expected = Vector::x() * (10.0 * (pore(0.6) - pore(0.3)) * 1.0e-7);
    assert!((f[0] - expected).norm() < 1.0e-9 * expected.norm(), "{:?}", f[0]);
}

#[test]
fn grid_pressure_gradient_reaches_the_yarn() {
    let mut scene = wet_yarn(LiquidParameters::default(), [0.0, 0.0]);
    scene.rebucketize_particles();
    scene.resample_nodes();
    scene.compute_weights();

    // A liquid pressure rising linearly along x.
    let slope = 50.0;
    let nodes: Vec<_> = scene.nodes.active_nodes().collect();
    for id in nodes {
        let x = scene.nodes.node_pos_id(NodeKind::P, id).x;
        scene.nodes.pressure_node_mut(id).pressure = slope * x;
    }

    let pressures = scene.elasto_pore_pressure();
    assert!((pressures[0] + slope * 0.1).abs() < 1.0e-9);
    assert!((pressures[1] + slope * 0.2).abs() < 1.0e-9);

    let mut f = vec![Vector::zeros(); scene.num_gauss()];
    scene.accumulate_manifold_grad_pore_pressure(&mut f);

    let fluid_volume = scene.elements.gauss[0].fluid_volume;
    let expected = -Vector::x() * (slope * fluid_volume);
    assert!((f[0] - expected).norm() < 1.0e-9 * expected.norm(), "{:?}", f[0]);
}

#[test]
fn dry_yarn_soaks_up_nearby_liquid() {
    let mut scene = scene();
    let volume = 1.0e-6;
    let soft = (0..2)
        .map(|i| Particle {
            volume,
            rest_volume: volume,
            ..Particle::soft(Point::new(0.1 + 0.1 * i as Real, 0.1, 0.1), Radii::repeat(0.01))
        })
        .collect();
    scene.insert_particles(ParticleKind::Soft, soft).unwrap();
    scene.set_edges(&[[0, 1]], &[]).unwrap();

    let vf = scene.fine_volume();
    let density = scene.liquid.liquid_density;
    let drop = Particle::liquid(Point::new(0.15, 0.1, 0.1), vf, density);
    scene.insert_particles(ParticleKind::Liquid, vec![drop]).unwrap();

    scene.init_gauss_system();
    scene.rebucketize_particles();
    scene.resample_nodes();
    scene.compute_weights();
    scene.build_node_particle_pairs();

    let total = scene.particles.total_fluid_volume();
    scene.distribute_fluid_elasto(0.1);

    let new_total = scene.particles.total_fluid_volume();
    assert!((new_total - total).abs() < 1.0e-9 * total, "{} != {}", new_total, total);

    for p in &scene.particles.particles()[..2] {
        assert!(p.fluid_volume > 0.0);
        assert!(p.fluid_volume <= volume * 1.01);
        assert!((p.fluid_mass - p.fluid_volume * density).abs() < 1.0e-15);
    }

    assert_eq!(scene.particles.num_fluid_particles(), 1);
    let drop = &scene.particles.particles()[2];
    assert!(drop.fluid_volume < vf);
}

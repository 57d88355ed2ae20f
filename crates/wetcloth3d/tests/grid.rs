use wetcloth3d::core::dynamics::NodeKind;
use wetcloth3d::prelude::*;

fn liquid_scene(particles: &[(Point<Real>, Real)]) -> Scene {
    let mut scene = Scene::new(SceneParameters::default(), LiquidParameters::default()).unwrap();
    let density = scene.liquid.liquid_density;
    let particles = particles
        .iter()
        .map(|(pos, volume)| Particle::liquid(*pos, *volume, density))
        .collect();
    scene.insert_particles(ParticleKind::Liquid, particles).unwrap();
    scene
}

fn resample(scene: &mut Scene) {
    scene.rebucketize_particles();
    scene.resample_nodes();
    scene.compute_weights();
    scene.build_node_particle_pairs();
}

#[test]
fn expanding_activated_buckets_is_monotonic() {
    let mut scene = liquid_scene(&[(Point::new(0.05, 0.05, 0.05), 1.0e-4)]);
    scene.rebucketize_particles();
    scene.pre_allocate_nodes();
    scene.find_nodes(NodeKind::P);

    let initial = scene.nodes.num_active_buckets();
    assert!(initial > 0);

    scene.expand_fluid_nodes_marked(0);
    assert_eq!(scene.nodes.num_active_buckets(), initial);

    scene.expand_fluid_nodes_marked(1);
    let expanded = scene.nodes.num_active_buckets();
    assert!(expanded > initial);

    scene.expand_fluid_nodes_marked(1);
    assert!(scene.nodes.num_active_buckets() >= expanded);
}

#[test]
fn particle_to_grid_conserves_mass() {
    let vf = 1.0e-4;
    let mut scene = liquid_scene(&[(Point::new(0.05, 0.05, 0.05), vf)]);
    resample(&mut scene);

    let p = scene.particles.particles()[0];
    assert_eq!(p.inside, InsideStatus::Inside);

    scene.map_particle_nodes_apic();
    for axis in 0..3 {
        let total = scene.total_node_fluid_mass(axis);
        assert!((total - p.fluid_mass).abs() < 1.0e-9 * p.fluid_mass, "axis {}: {}", axis, total);
    }
}

#[test]
fn grid_round_trip_keeps_uniform_velocity() {
    let mut scene = liquid_scene(&[(Point::new(0.05, 0.05, 0.05), 1.0e-4)]);
    scene.particles.particles_mut()[0].fluid_velocity = Vector::new(1.0, -2.0, 0.5);
    resample(&mut scene);

    scene.map_particle_nodes_apic();
    scene.map_node_particles_apic();

    let v = scene.particles.particles()[0].fluid_velocity;
    assert!((v - Vector::new(1.0, -2.0, 0.5)).norm() < 1.0e-9, "{:?}", v);
}

#[test]
fn liquid_level_set_is_negative_inside() {
    let center = Point::new(0.05, 0.05, 0.05);
    let mut scene = liquid_scene(&[(center, 1.0e-4)]);
    let dx = scene.cell_size();
    scene.particles.particles_mut()[0].radii = Radii::repeat(2.0 * dx);
    resample(&mut scene);
    scene.update_liquid_phi(1.0e-3);

    let phi = |scene: &Scene, pos: &Point<Real>| scene.interpolate_value(pos, |n| n.liquid_phi, 3.0 * dx);
    assert!(phi(&scene, &center) < 0.0);
    assert!(phi(&scene, &(center + Vector::x() * (6.0 * dx))) > 0.0);
}

fn num_active_buckets_around(pos: Point<Real>, expanded_layers: usize) -> usize {
    let mut liquid = LiquidParameters::default();
    liquid.expanded_layers = expanded_layers;
    let mut scene = Scene::new(SceneParameters::default(), liquid).unwrap();
    let density = scene.liquid.liquid_density;
    scene
        .insert_particles(ParticleKind::Liquid, vec![Particle::liquid(pos, 1.0e-5, density)])
        .unwrap();
    scene.rebucketize_particles();
    scene.resample_nodes();
    scene.nodes.num_active_buckets()
}

#[test]
fn particle_stencils_activate_only_touched_buckets() {
    // (0.2, 0.2, 0.2) is the center of a bucket, (0.4, 0.4, 0.4) one of its corners.
    assert_eq!(num_active_buckets_around(Point::new(0.2, 0.2, 0.2), 0), 1);
    assert_eq!(num_active_buckets_around(Point::new(0.4, 0.4, 0.4), 0), 8);
}

#[test]
fn expanded_layers_dilate_the_active_buckets() {
    let expanded_layers = LiquidParameters::default().expanded_layers;
    assert_eq!(expanded_layers, 1);
    assert_eq!(num_active_buckets_around(Point::new(0.2, 0.2, 0.2), expanded_layers), 27);
    assert_eq!(num_active_buckets_around(Point::new(0.4, 0.4, 0.4), expanded_layers), 64);
}

const DROP: [Real; 3] = [0.2, 0.2, 0.2];
const OTHER_BUCKET: [Real; 3] = [1.0, 0.2, 0.2];

/// A scene with two activated buckets, an inactive one between them, and
/// their pressure nodes.
fn two_bucket_scene() -> (Scene, Vec<NodeId>) {
    let mut liquid = LiquidParameters::default();
    liquid.expanded_layers = 0;
    let mut scene = Scene::new(SceneParameters::default(), liquid).unwrap();
    let density = scene.liquid.liquid_density;
    let particles = vec![
        Particle::liquid(Point::from(Vector::from(DROP)), 1.0e-5, density),
        Particle::liquid(Point::from(Vector::from(OTHER_BUCKET)), 1.0e-5, density),
    ];
    scene.insert_particles(ParticleKind::Liquid, particles).unwrap();
    scene.rebucketize_particles();
    scene.resample_nodes();
    assert_eq!(scene.nodes.num_active_buckets(), 2);

    let ids = scene.nodes.active_nodes().collect();
    (scene, ids)
}

/// Sets the combined level set of every node from its position and returns
/// the initial values.
fn set_combined_phi(scene: &mut Scene, ids: &[NodeId], phi: impl Fn(&Point<Real>) -> Real) -> Vec<Real> {
    ids.iter()
        .map(|id| {
            let pos = scene.nodes.node_pos_id(NodeKind::P, *id);
            let value = phi(&pos);
            scene.nodes.pressure_node_mut(*id).combined_phi = value;
            value
        })
        .collect()
}

fn sphere_phi(center: [Real; 3], radius: Real) -> impl Fn(&Point<Real>) -> Real {
    move |pt| (pt - Point::from(Vector::from(center))).norm() - radius
}

#[test]
fn renormalization_clears_unreachable_liquid() {
    let (mut scene, ids) = two_bucket_scene();
    // A drop in the first bucket, the whole second bucket inside the liquid
    // with no interface to reach.
    let drop = sphere_phi(DROP, 0.1);
    let initial = set_combined_phi(&mut scene, &ids, |pt| if pt.x < 0.5 { drop(pt) } else { -0.05 });

    scene.renormalize_liquid_phi();

    let far = 3.0 * scene.cell_size();
    let mut num_inside = 0;
    for (id, phi0) in ids.iter().zip(initial) {
        let pos = scene.nodes.node_pos_id(NodeKind::P, *id);
        let phi = scene.nodes.pressure_node(*id).combined_phi;
        if pos.x > 0.5 {
            assert!((phi - far).abs() < 1.0e-12, "{:?}: {}", pos, phi);
        } else if phi0 < 0.0 {
            num_inside += 1;
            assert!((phi - phi0).abs() < 1.0e-12, "{:?}: {} != {}", pos, phi, phi0);
        } else {
            assert!(phi > 0.0, "{:?}: {}", pos, phi);
        }
    }
    assert_eq!(num_inside, 8);
}

#[test]
fn separate_drops_get_separate_colors_and_equal_curvatures() {
    let (mut scene, ids) = two_bucket_scene();
    // Off-center drops, so that every interface node has a single steepest
    // direction.
    let a = sphere_phi([0.213, 0.207, 0.203], 0.1);
    let b = sphere_phi([1.013, 0.207, 0.203], 0.1);
    let initial = set_combined_phi(&mut scene, &ids, |pt| if pt.x < 0.5 { a(pt) } else { b(pt) });

    scene.update_color_p();
    assert_eq!(scene.num_colors, 3);

    let color = |id: &NodeId| scene.nodes.pressure_node(*id).color;
    let (first, second) = ids.split_at(ids.len() / 2);
    let inside = |nodes: &[NodeId], initial: &[Real]| -> Vec<NodeId> {
        nodes
            .iter()
            .zip(initial)
            .filter(|(_, phi)| **phi < 0.0)
            .map(|(id, _)| *id)
            .collect()
    };
    let inside_a = inside(first, &initial[..first.len()]);
    let inside_b = inside(second, &initial[first.len()..]);
    assert_eq!(inside_a.len(), 8);
    assert_eq!(inside_b.len(), 8);

    let color_a = color(&inside_a[0]);
    let color_b = color(&inside_b[0]);
    assert!(color_a != 0 && color_b != 0 && color_a != color_b);
    assert!(inside_a.iter().all(|id| color(id) == color_a));
    assert!(inside_b.iter().all(|id| color(id) == color_b));
    // The corner of the bucket is away from the interface.
    assert_eq!(color(&first[0]), 0);

    scene.update_curvature_p();
    for (ia, ib) in first.iter().zip(second) {
        let ka = scene.nodes.pressure_node(*ia).curvature;
        let kb = scene.nodes.pressure_node(*ib).curvature;
        assert!(ka.is_finite());
        assert!((ka - kb).abs() <= 1.0e-6 * ka.abs().max(1.0), "{} != {}", ka, kb);
    }
}

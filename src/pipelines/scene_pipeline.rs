use crate::dynamics::solver::GridSolverHooks;
use crate::dynamics::Scene;
use crate::math::Real;

/// Runs the stages of one simulation step in order.
pub struct ScenePipeline {
    first_step: bool,
    /// Simulated time, used to open and close the liquid sources.
    pub time: Real,
}

impl ScenePipeline {
    pub fn new() -> Self {
        ScenePipeline {
            first_step: true,
            time: 0.0,
        }
    }

    pub fn step(&mut self, scene: &mut Scene, dt: Real, hooks: &mut dyn GridSolverHooks) {
        let t0 = instant::now();

        if self.first_step {
            if scene.elements.gauss.len() != scene.num_gauss() {
                scene.init_gauss_system();
            }
            self.first_step = false;
        }

        scene.apply_script(dt);
        scene.sample_liquid_distance_fields(self.time);

        scene.rebucketize_particles();
        scene.resample_nodes();
        scene.compute_weights();
        scene.build_node_particle_pairs();

        scene.update_solid_phi();
        scene.update_solid_weights();

        scene.update_liquid_phi(dt);
        if scene.liquid.use_surf_tension {
            scene.update_color_p();
            scene.renormalize_liquid_phi();
            scene.update_curvature_p();
            scene.advect_curvature_p(dt);
        }
        scene.update_intersection();

        scene.map_particle_nodes_apic();
        scene.map_particle_saturation_psi_nodes();
        scene.update_pore_pressure_nodes();
        scene.save_fluid_velocity();
        scene.particles.save_particle_velocity();

        hooks.solve_grid(scene, dt);
        scene.constrain_liquid_velocity();

        scene.map_node_particles_apic();
        scene.particles.update_velocity_difference();
        scene.advect_particles(dt);

        scene.update_gauss_system(dt);
        scene.update_plasticity(dt);
        scene.update_shape_factor();
        scene.update_orientation();

        // Node-particle pairs are only valid until particles get removed.
        scene.distribute_fluid_elasto(dt);

        scene.solid_projection(dt);
        let terminated = scene.terminate_particles();
        let fluid_volume = scene.particles.total_fluid_volume();

        scene.relabel_liquid_particles();
        let num_split = scene.split_liquid_particles();
        let num_merged = scene.merge_liquid_particles();
        scene.correct_liquid_particles(dt);
        scene.distribute_elasto_fluid();
        scene.conserve_fluid_volume(fluid_volume);

        debug!(
            "{} particles ({} split, {} merged, {} terminated), fluid volume {}",
            scene.num_particles(),
            num_split,
            num_merged,
            terminated,
            scene.total_fluid_volume_particles() + scene.total_fluid_volume_soft_elasto()
        );

        self.time += dt;
        info!("Step: {}ms", instant::now() - t0);
    }
}

impl Default for ScenePipeline {
    fn default() -> Self {
        Self::new()
    }
}

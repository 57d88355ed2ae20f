use crate::core::utils;
use crate::dynamics::{NodeGrid, NodeId, Scene};
use crate::math::Real;
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Pressure-neighbor slots of the `3 × 3` height-function columns around a
/// node, per orientation of the interface normal. `None` is the node itself.
const HEIGHT_STENCILS: [[Option<usize>; 9]; 3] = [
    [
        Some(12),
        Some(4),
        Some(13),
        Some(2),
        None,
        Some(3),
        Some(16),
        Some(5),
        Some(17),
    ],
    [
        Some(10),
        Some(4),
        Some(11),
        Some(0),
        None,
        Some(1),
        Some(14),
        Some(5),
        Some(15),
    ],
    [
        Some(6),
        Some(2),
        Some(7),
        Some(0),
        None,
        Some(1),
        Some(8),
        Some(3),
        Some(9),
    ],
];

const SMOOTHING_WEIGHT: Real = 0.7071;
const EXTRAPOLATION_STEPS: usize = 3;

fn combined_phi(grid: &NodeGrid, id: NodeId) -> Real {
    grid.pressure_node(id).combined_phi
}

/// Does the level set change sign between `id` and one of its face neighbors?
fn is_interface(grid: &NodeGrid, id: NodeId) -> bool {
    let phi = combined_phi(grid, id);
    grid.pressure_node(id).pp_neighbors[..6]
        .iter()
        .flatten()
        .any(|nb| phi * combined_phi(grid, *nb) <= 0.0)
}

/// Height of the liquid column through `id` along `orientation`, walking at
/// most three cells in both directions.
fn column_height(grid: &NodeGrid, id: Option<NodeId>, orientation: usize) -> Real {
    let id = match id {
        Some(id) => id,
        None => return 0.0,
    };
    let dx = grid.cell_size;
    let mut height = 0.0;

    for dir in [orientation * 2, orientation * 2 + 1] {
        let mut cur = id;
        let mut cur_phi = combined_phi(grid, id);

        for _ in 0..3 {
            let next = grid.pressure_node(cur).pp_neighbors[dir];
            let next_phi = next.map(|nb| combined_phi(grid, nb)).unwrap_or(cur_phi + dx);
            height += utils::fraction_inside(cur_phi, next_phi);

            match next {
                Some(next) => {
                    cur = next;
                    cur_phi = next_phi;
                }
                None => break,
            }
        }
    }

    height * dx
}

impl Scene {
    /// Labels the connected components of the interface nodes.
    ///
    /// Components are flood-filled inside every bucket, then merged across
    /// bucket boundaries. Nodes away from the interface get the color 0.
    pub fn update_color_p(&mut self) {
        let t0 = instant::now();
        let grid = &self.nodes;

        let local: Vec<(Vec<usize>, usize)> = (0..grid.num_buckets())
            .into_par_iter()
            .map(|b| {
                let num_nodes = grid.buckets[b].pressure.len();
                let mut colors = vec![0; num_nodes];
                let mut c = 0;

                for seed in 0..num_nodes {
                    if colors[seed] != 0 || !is_interface(grid, NodeId::new(b, seed)) {
                        continue;
                    }

                    c += 1;
                    let mut stack = vec![seed];

                    while let Some(n) = stack.pop() {
                        if colors[n] != 0 || !is_interface(grid, NodeId::new(b, n)) {
                            continue;
                        }

                        colors[n] = c;
                        for nb in grid.buckets[b].pressure[n].pp_neighbors[..6].iter().flatten() {
                            if nb.bucket as usize == b && colors[nb.node as usize] == 0 {
                                stack.push(nb.node as usize);
                            }
                        }
                    }
                }

                (colors, c)
            })
            .collect();

        // Links between the local colors of neighboring buckets.
        let links: Vec<Vec<BTreeSet<u64>>> = local
            .par_iter()
            .enumerate()
            .map(|(b, (colors, num_colors))| {
                let mut links = vec![BTreeSet::new(); num_colors + 1];

                for (n, color) in colors.iter().enumerate() {
                    if *color == 0 {
                        continue;
                    }

                    for nb in grid.buckets[b].pressure[n].pp_neighbors[..6].iter().flatten() {
                        if nb.bucket as usize == b {
                            continue;
                        }

                        let nb_color = local[nb.bucket as usize].0[nb.node as usize];
                        if nb_color != 0 {
                            links[*color].insert(NodeId::new(nb.bucket as usize, nb_color).packed());
                        }
                    }
                }

                links
            })
            .collect();

        let mut remap: Vec<Vec<usize>> = links.iter().map(|l| vec![0; l.len()]).collect();
        let mut c = 0;

        for b in 0..links.len() {
            for local_color in 1..links[b].len() {
                if remap[b][local_color] != 0 {
                    continue;
                }

                c += 1;
                remap[b][local_color] = c;
                let mut stack: Vec<u64> = links[b][local_color].iter().copied().collect();

                while let Some(key) = stack.pop() {
                    let (nb, nb_color) = ((key >> 32) as usize, (key & 0xFFFF_FFFF) as usize);
                    if remap[nb][nb_color] != 0 {
                        continue;
                    }

                    remap[nb][nb_color] = c;
                    stack.extend(links[nb][nb_color].iter().copied());
                }
            }
        }

        self.num_colors = c + 1;
        self.nodes
            .buckets
            .par_iter_mut()
            .zip(local.into_par_iter())
            .zip(remap.par_iter())
            .for_each(|((bucket, (colors, _)), remap)| {
                for (node, color) in bucket.pressure.iter_mut().zip(colors.into_iter()) {
                    node.color = remap[color];
                }
            });

        info!(
            "- Color interface: {}ms ({} components)",
            instant::now() - t0,
            self.num_colors - 1
        );
    }

    /// Mean curvature of the interface with the height-function method.
    ///
    /// Curvatures are measured at the interface nodes, offset by the mean
    /// curvature of their component, smoothed, then extrapolated three cells
    /// away from the interface.
    pub fn update_curvature_p(&mut self) {
        let t0 = instant::now();
        let grid = &self.nodes;
        let num_colors = self.num_colors.max(1);

        let measured: Vec<(Vec<Real>, Vec<bool>)> = (0..grid.num_buckets())
            .into_par_iter()
            .map(|b| {
                let pressure = &grid.buckets[b].pressure;
                let mut curvature = vec![0.0; pressure.len()];
                let mut valid = vec![false; pressure.len()];

                for (n, node) in pressure.iter().enumerate() {
                    let phi = node.combined_phi;
                    let mut test_dir = None;
                    let mut max_grad = 0.0;

                    for (r, nb) in node.pp_neighbors[..6].iter().enumerate() {
                        if let Some(nb) = nb {
                            let nb_phi = combined_phi(grid, *nb);
                            if phi * nb_phi <= 0.0 && (phi - nb_phi).abs() > max_grad {
                                test_dir = Some(r);
                                max_grad = (phi - nb_phi).abs();
                            }
                        }
                    }

                    if let Some(dir) = test_dir {
                        let orientation = dir / 2;
                        let mut heights = [0.0; 9];

                        for (h, slot) in heights.iter_mut().zip(HEIGHT_STENCILS[orientation].iter()) {
                            let column = match slot {
                                Some(s) => node.pp_neighbors[*s],
                                None => Some(NodeId::new(b, n)),
                            };
                            *h = column_height(grid, column, orientation);
                        }

                        curvature[n] = utils::mean_curvature(&heights, grid.cell_size);
                        valid[n] = true;
                    }
                }

                (curvature, valid)
            })
            .collect();
        let (mut curvature, mut valid): (Vec<_>, Vec<_>) = measured.into_iter().unzip();

        let mut sums = vec![0.0; num_colors];
        let mut counts = vec![0usize; num_colors];
        for id in grid.active_nodes() {
            let (b, n) = (id.bucket as usize, id.node as usize);
            let color = grid.buckets[b].pressure[n].color;
            if valid[b][n] && color < num_colors {
                sums[color] += curvature[b][n];
                counts[color] += 1;
            }
        }
        for (sum, count) in sums.iter_mut().zip(counts.iter()) {
            if *count > 0 {
                *sum /= *count as Real;
            }
        }

        curvature
            .par_iter_mut()
            .zip(valid.par_iter())
            .enumerate()
            .for_each(|(b, (curvature, valid))| {
                for (n, kappa) in curvature.iter_mut().enumerate() {
                    let color = grid.buckets[b].pressure[n].color;
                    if valid[n] && color < num_colors {
                        *kappa -= sums[color];
                    }
                }
            });

        for _ in 0..self.liquid.surf_tension_smoothing_step {
            let backup = curvature.clone();

            curvature.par_iter_mut().enumerate().for_each(|(b, curvature)| {
                for (n, kappa) in curvature.iter_mut().enumerate() {
                    if !valid[b][n] {
                        continue;
                    }

                    let node = &grid.buckets[b].pressure[n];
                    let mut sum = backup[b][n];
                    let mut w = 1.0;

                    for nb in node.pp_neighbors[..6].iter().flatten() {
                        let (nb_b, nb_n) = (nb.bucket as usize, nb.node as usize);
                        if valid[nb_b][nb_n] && grid.buckets[nb_b].pressure[nb_n].color == node.color {
                            sum += backup[nb_b][nb_n] * SMOOTHING_WEIGHT;
                            w += SMOOTHING_WEIGHT;
                        }
                    }

                    *kappa = sum / w;
                }
            });
        }

        for _ in 0..EXTRAPOLATION_STEPS {
            let old_valid = valid.clone();
            let old_curvature = curvature.clone();

            curvature
                .par_iter_mut()
                .zip(valid.par_iter_mut())
                .enumerate()
                .for_each(|(b, (curvature, valid))| {
                    for (n, kappa) in curvature.iter_mut().enumerate() {
                        if old_valid[b][n] {
                            continue;
                        }

                        let mut sum = 0.0;
                        let mut count = 0;
                        for nb in grid.buckets[b].pressure[n].pp_neighbors[..6].iter().flatten() {
                            let (nb_b, nb_n) = (nb.bucket as usize, nb.node as usize);
                            if old_valid[nb_b][nb_n] {
                                sum += old_curvature[nb_b][nb_n];
                                count += 1;
                            }
                        }

                        if count > 0 {
                            *kappa = sum / count as Real;
                            valid[n] = true;
                        } else {
                            *kappa = 0.0;
                        }
                    }
                });
        }

        self.nodes
            .buckets
            .par_iter_mut()
            .zip(curvature.into_par_iter())
            .for_each(|(bucket, curvature)| {
                for (node, kappa) in bucket.pressure.iter_mut().zip(curvature.into_iter()) {
                    node.curvature = kappa;
                }
            });

        info!("- Curvature: {}ms", instant::now() - t0);
    }

    /// Moves the combined level set by the capillary pressure jump, then
    /// restores it around the wet elements.
    pub fn advect_curvature_p(&mut self, dt: Real) {
        let sigma = self.liquid.surf_tension_coeff;

        self.nodes.buckets.par_iter_mut().for_each(|bucket| {
            for node in &mut bucket.pressure {
                let jump = sigma * node.curvature * dt;
                node.combined_phi += jump;
                node.surf_tension += jump;
            }
        });

        self.extend_phi_with_elements();
    }
}

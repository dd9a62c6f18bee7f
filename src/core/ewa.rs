use crate::core::geolocation::SwathGeometry;
use crate::core::grid::TargetGrid;
use crate::core::resample::{ResamplingConfig, SwathMapping};
use crate::types::DataPlane;
use ndarray::{Array2, ArrayView2};

/// Cap on the zenith-angle footprint widening factor
const MAX_ZENITH_WIDENING: f64 = 4.0;

/// Elliptical weighted averaging onto the target grid.
///
/// Each mapped swath pixel spreads a Gaussian-weighted elliptical
/// footprint, oriented by the local Jacobian of the swath-to-grid mapping
/// and widened across track by the satellite zenith angle when one is
/// available. With `maximum_weight_mode` the single heaviest contributor
/// wins each cell instead of a weighted average.
///
/// Fill-valued and unmapped source pixels contribute nothing; cells whose
/// accumulated weight stays below the configured minimum receive fill.
pub fn resample_ewa_plane(
    source: ArrayView2<f64>,
    mapping: &SwathMapping,
    geometry: &SwathGeometry,
    grid: &TargetGrid,
    config: &ResamplingConfig,
    fill: f64,
    maximum_weight_mode: bool,
) -> DataPlane {
    let (height, width) = grid.shape();
    let mut weight_sum = Array2::zeros((height, width));
    let mut value_accumulator = Array2::zeros((height, width));

    let (_, swath_cols) = source.dim();
    let blocks = scan_blocks(geometry);
    log::debug!("EWA resampling over {} scan block(s)", blocks.len());

    for &(block_start, block_end) in &blocks {
        for row in block_start..block_end {
            for col in 0..swath_cols {
                if !mapping.is_mapped(row, col) {
                    continue;
                }

                let value = source[[row, col]];
                if !value.is_finite() || value == fill {
                    continue;
                }

                let across = match directional_gradient(
                    mapping,
                    row,
                    col,
                    0,
                    swath_cols,
                    false,
                ) {
                    Some(vector) => vector,
                    None => (0.0, 0.0),
                };
                let along = match directional_gradient(
                    mapping,
                    row,
                    col,
                    block_start,
                    block_end,
                    true,
                ) {
                    Some(vector) => vector,
                    None => (0.0, 0.0),
                };

                let across = enforce_minimum_axis(across, config.ewa_min_semi_axis, (1.0, 0.0));
                let across = widen_across_track(across, geometry, row, col);
                let along = enforce_minimum_axis(along, config.ewa_min_semi_axis, (0.0, 1.0));

                // Heckbert ellipse coefficients from the footprint vectors.
                let coeff_a = across.1 * across.1 + along.1 * along.1;
                let coeff_b = -2.0 * (across.0 * across.1 + along.0 * along.1);
                let coeff_c = across.0 * across.0 + along.0 * along.0;
                let determinant = across.0 * along.1 - across.1 * along.0;
                let coeff_f = determinant * determinant;
                if coeff_f < 1e-12 {
                    continue;
                }

                let u = mapping.columns[[row, col]];
                let v = mapping.rows[[row, col]];

                let du_max = (config.ewa_distance_max * coeff_c).sqrt();
                let dv_max = (config.ewa_distance_max * coeff_a).sqrt();

                let col_lo = ((u - du_max).ceil().max(0.0)) as isize;
                let col_hi = ((u + du_max).floor().min(width as f64 - 1.0)) as isize;
                let row_lo = ((v - dv_max).ceil().max(0.0)) as isize;
                let row_hi = ((v + dv_max).floor().min(height as f64 - 1.0)) as isize;

                for cell_row in row_lo..=row_hi {
                    for cell_col in col_lo..=col_hi {
                        let du = cell_col as f64 - u;
                        let dv = cell_row as f64 - v;
                        let q = (coeff_a * du * du + coeff_b * du * dv + coeff_c * dv * dv)
                            / coeff_f;

                        if !(0.0..=config.ewa_distance_max).contains(&q) {
                            continue;
                        }

                        let weight = (-q).exp();
                        let slot = [cell_row as usize, cell_col as usize];

                        if maximum_weight_mode {
                            if weight > weight_sum[slot] {
                                weight_sum[slot] = weight;
                                value_accumulator[slot] = value;
                            }
                        } else {
                            weight_sum[slot] += weight;
                            value_accumulator[slot] += weight * value;
                        }
                    }
                }
            }
        }
    }

    let mut output = Array2::from_elem((height, width), fill);
    for row in 0..height {
        for col in 0..width {
            let weight = weight_sum[[row, col]];
            if maximum_weight_mode {
                if weight > 0.0 {
                    output[[row, col]] = value_accumulator[[row, col]];
                }
            } else if weight >= config.ewa_weight_min {
                output[[row, col]] = value_accumulator[[row, col]] / weight;
            }
        }
    }

    output
}

/// Scan-row blocks inferred from the per-pixel time ancillary: consecutive
/// rows sharing a leading-column timestamp form one scan. Without times,
/// or when every row carries its own timestamp, the whole swath is a
/// single scan.
fn scan_blocks(geometry: &SwathGeometry) -> Vec<(usize, usize)> {
    let (rows, _) = geometry.shape();

    let times = match geometry.times() {
        Some(times) => times,
        None => return vec![(0, rows)],
    };

    let mut blocks = Vec::new();
    let mut block_start = 0usize;
    for row in 1..rows {
        if times[[row, 0]] != times[[row - 1, 0]] {
            blocks.push((block_start, row));
            block_start = row;
        }
    }
    blocks.push((block_start, rows));

    if blocks.iter().all(|&(start, end)| end - start == 1) {
        return vec![(0, rows)];
    }

    blocks
}

/// Local derivative of the mapping at (row, col) along one swath axis,
/// central where both neighbours are mapped and one-sided at edges.
/// `lo..hi` bound the index along the chosen axis (the scan block for the
/// row axis).
fn directional_gradient(
    mapping: &SwathMapping,
    row: usize,
    col: usize,
    lo: usize,
    hi: usize,
    along_rows: bool,
) -> Option<(f64, f64)> {
    let index = if along_rows { row } else { col };
    let at = |i: usize| -> Option<(f64, f64)> {
        let (r, c) = if along_rows { (i, col) } else { (row, i) };
        if mapping.is_mapped(r, c) {
            Some((mapping.columns[[r, c]], mapping.rows[[r, c]]))
        } else {
            None
        }
    };

    let previous = if index > lo { at(index - 1) } else { None };
    let next = if index + 1 < hi { at(index + 1) } else { None };
    let here = at(index)?;

    match (previous, next) {
        (Some(p), Some(n)) => Some(((n.0 - p.0) / 2.0, (n.1 - p.1) / 2.0)),
        (None, Some(n)) => Some((n.0 - here.0, n.1 - here.1)),
        (Some(p), None) => Some((here.0 - p.0, here.1 - p.1)),
        (None, None) => None,
    }
}

fn widen_across_track(
    across: (f64, f64),
    geometry: &SwathGeometry,
    row: usize,
    col: usize,
) -> (f64, f64) {
    let zenith = match geometry.zenith_angles() {
        Some(angles) => angles[[row, col]],
        None => return across,
    };

    if !zenith.is_finite() {
        return across;
    }

    let cosine = zenith.to_radians().cos();
    if cosine <= 0.0 {
        return (across.0 * MAX_ZENITH_WIDENING, across.1 * MAX_ZENITH_WIDENING);
    }

    let factor = (1.0 / cosine).clamp(1.0, MAX_ZENITH_WIDENING);
    (across.0 * factor, across.1 * factor)
}

fn enforce_minimum_axis(vector: (f64, f64), minimum: f64, fallback: (f64, f64)) -> (f64, f64) {
    let length = (vector.0 * vector.0 + vector.1 * vector.1).sqrt();

    if length < 1e-12 {
        return (fallback.0 * minimum, fallback.1 * minimum);
    }
    if length < minimum {
        let scale = minimum / length;
        return (vector.0 * scale, vector.1 * scale);
    }

    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GridResolver;
    use crate::core::projection::CrsTransformer;
    use crate::types::{AxisRange, GridParameters, ScaleExtent, ScaleSize};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn unit_grid(width: usize, height: usize) -> TargetGrid {
        let params = GridParameters {
            scale_extent: Some(ScaleExtent {
                x: AxisRange {
                    min: 0.0,
                    max: width as f64,
                },
                y: AxisRange {
                    min: 0.0,
                    max: height as f64,
                },
            }),
            scale_size: Some(ScaleSize { x: 1.0, y: 1.0 }),
            ..Default::default()
        };
        let geometry = centered_swath(2, 2, height as f64);
        GridResolver::resolve(&params, &geometry).unwrap()
    }

    fn centered_swath(rows: usize, cols: usize, grid_height: f64) -> SwathGeometry {
        let latitude =
            Array2::from_shape_fn((rows, cols), |(row, _)| grid_height - 0.5 - row as f64);
        let longitude = Array2::from_shape_fn((rows, cols), |(_, col)| 0.5 + col as f64);
        SwathGeometry::new(latitude, longitude).unwrap()
    }

    fn mapping_for(geometry: &SwathGeometry, grid: &TargetGrid) -> SwathMapping {
        let transformer = CrsTransformer::new(&grid.crs).unwrap();
        SwathMapping::build(geometry, grid, &transformer).unwrap()
    }

    #[test]
    fn test_uniform_field_averages_to_itself() {
        let grid = unit_grid(4, 4);
        let geometry = centered_swath(4, 4, 4.0);
        let mapping = mapping_for(&geometry, &grid);

        let source = Array2::from_elem((4, 4), 7.0);
        let config = ResamplingConfig::default();
        let output = resample_ewa_plane(
            source.view(),
            &mapping,
            &geometry,
            &grid,
            &config,
            -9999.0,
            false,
        );

        for &value in output.iter() {
            assert_relative_eq!(value, 7.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_maximum_weight_mode_copies_source_values() {
        let grid = unit_grid(4, 4);
        let geometry = centered_swath(4, 4, 4.0);
        let mapping = mapping_for(&geometry, &grid);

        // Pixels sit exactly on cell centres, so each cell's own pixel has
        // zero elliptical distance and maximal weight.
        let source = Array2::from_shape_fn((4, 4), |(r, c)| (r * 10 + c) as f64);
        let config = ResamplingConfig::default();
        let output = resample_ewa_plane(
            source.view(),
            &mapping,
            &geometry,
            &grid,
            &config,
            -9999.0,
            true,
        );

        for row in 0..4 {
            for col in 0..4 {
                assert_relative_eq!(output[[row, col]], (row * 10 + col) as f64);
            }
        }
    }

    #[test]
    fn test_fill_pixels_contribute_nothing() {
        let grid = unit_grid(4, 4);
        let geometry = centered_swath(4, 4, 4.0);
        let mapping = mapping_for(&geometry, &grid);

        let fill = -9999.0;
        let mut source = Array2::from_elem((4, 4), 7.0);
        source[[1, 1]] = fill;

        let config = ResamplingConfig::default();
        let output = resample_ewa_plane(
            source.view(),
            &mapping,
            &geometry,
            &grid,
            &config,
            fill,
            false,
        );

        // The fill pixel's cell is still reached by its neighbours'
        // footprints, so it averages to the uniform value instead of fill.
        assert_relative_eq!(output[[1, 1]], 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cells_outside_footprint_receive_fill() {
        let grid = unit_grid(9, 9);
        let geometry = centered_swath(2, 2, 9.0);
        let mapping = mapping_for(&geometry, &grid);

        let source = Array2::from_elem((2, 2), 3.0);
        let config = ResamplingConfig::default();
        let output = resample_ewa_plane(
            source.view(),
            &mapping,
            &geometry,
            &grid,
            &config,
            -9999.0,
            false,
        );

        assert_relative_eq!(output[[0, 0]], 3.0, epsilon = 1e-9);
        assert_relative_eq!(output[[8, 8]], -9999.0);
    }

    #[test]
    fn test_scan_blocks_from_times() {
        let latitude = Array2::from_shape_fn((4, 3), |(row, _)| row as f64);
        let longitude = Array2::from_shape_fn((4, 3), |(_, col)| col as f64);
        let times = Array2::from_shape_fn((4, 3), |(row, _)| (row / 2) as f64);

        let geometry = SwathGeometry::new(latitude, longitude)
            .unwrap()
            .with_times(times)
            .unwrap();

        assert_eq!(scan_blocks(&geometry), vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn test_per_row_times_collapse_to_single_scan() {
        let latitude = Array2::from_shape_fn((4, 3), |(row, _)| row as f64);
        let longitude = Array2::from_shape_fn((4, 3), |(_, col)| col as f64);
        let times = Array2::from_shape_fn((4, 3), |(row, _)| row as f64);

        let geometry = SwathGeometry::new(latitude, longitude)
            .unwrap()
            .with_times(times)
            .unwrap();

        assert_eq!(scan_blocks(&geometry), vec![(0, 4)]);
    }

    #[test]
    fn test_missing_times_single_scan() {
        let geometry = centered_swath(5, 3, 5.0);
        assert_eq!(scan_blocks(&geometry), vec![(0, 5)]);
    }

    #[test]
    fn test_zenith_angle_widens_footprint() {
        let grid = unit_grid(9, 9);

        let latitude = Array2::from_elem((1, 1), 4.5);
        let longitude = Array2::from_elem((1, 1), 4.5);
        let nadir = SwathGeometry::new(latitude.clone(), longitude.clone()).unwrap();
        let slanted = SwathGeometry::new(latitude, longitude)
            .unwrap()
            .with_zenith_angles(Array2::from_elem((1, 1), 60.0))
            .unwrap();

        let source = Array2::from_elem((1, 1), 5.0);
        let config = ResamplingConfig {
            ewa_min_semi_axis: 1.0,
            ..Default::default()
        };

        let mapping = mapping_for(&nadir, &grid);
        let narrow = resample_ewa_plane(
            source.view(),
            &mapping,
            &nadir,
            &grid,
            &config,
            -9999.0,
            false,
        );
        let wide = resample_ewa_plane(
            source.view(),
            &mapping,
            &slanted,
            &grid,
            &config,
            -9999.0,
            false,
        );

        let narrow_cells = narrow.iter().filter(|&&value| value != -9999.0).count();
        let wide_cells = wide.iter().filter(|&&value| value != -9999.0).count();
        assert!(wide_cells > narrow_cells);
    }
}

use crate::core::ewa;
use crate::core::geolocation::SwathGeometry;
use crate::core::grid::TargetGrid;
use crate::core::projection::CrsTransformer;
use crate::types::{
    DataPlane, InterpolationMethod, ResampledVariable, SourceVariable, SwathError, SwathResult,
    VariableArray, VariableOutcome,
};
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// Approximate metres per degree of latitude, used to convert the search
/// radius for geographic target grids
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Resampling parameters
#[derive(Debug, Clone)]
pub struct ResamplingConfig {
    /// Nearest-neighbour search radius in metres
    pub radius_of_influence: f64,
    /// Minimum accumulated weight for an EWA average to produce a value
    pub ewa_weight_min: f64,
    /// Elliptical distance cutoff; cells beyond it receive no contribution
    pub ewa_distance_max: f64,
    /// Minimum footprint semi-axis in grid cells, so coarse grids still
    /// catch contributions from fine swaths
    pub ewa_min_semi_axis: f64,
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self {
            radius_of_influence: 50_000.0, // metres
            ewa_weight_min: 0.01,
            ewa_distance_max: 1.0,
            ewa_min_semi_axis: 0.5,
        }
    }
}

impl ResamplingConfig {
    /// Search radius converted to target CRS units
    pub fn radius_in_crs_units(&self, grid: &TargetGrid) -> f64 {
        if grid.crs.is_geographic() {
            self.radius_of_influence / METERS_PER_DEGREE
        } else {
            self.radius_of_influence
        }
    }
}

/// Fractional grid coordinates of every swath pixel, computed once per
/// request and shared by all variables and bands.
///
/// `columns[[r, c]]`/`rows[[r, c]]` hold the (u, v) grid position of swath
/// pixel (r, c), NaN where the pixel has no valid geolocation or fails to
/// project. Pixels landing outside the grid keep their out-of-range
/// coordinates; the kernels bound-check instead.
#[derive(Debug, Clone)]
pub struct SwathMapping {
    pub columns: DataPlane,
    pub rows: DataPlane,
}

impl SwathMapping {
    pub fn build(
        geometry: &SwathGeometry,
        grid: &TargetGrid,
        transformer: &CrsTransformer,
    ) -> SwathResult<Self> {
        let (swath_rows, swath_cols) = geometry.shape();
        let mut columns = Array2::from_elem((swath_rows, swath_cols), f64::NAN);
        let mut rows = Array2::from_elem((swath_rows, swath_cols), f64::NAN);

        let shift_longitudes = grid.crosses_antimeridian();
        let mut mapped = 0usize;

        for row in 0..swath_rows {
            for col in 0..swath_cols {
                if !geometry.is_valid_pixel(row, col) {
                    continue;
                }

                let mut lon = geometry.longitude()[[row, col]];
                let lat = geometry.latitude()[[row, col]];
                if shift_longitudes && lon < 0.0 {
                    lon += 360.0;
                }

                if let Some((x, y)) = transformer.project(lon, lat) {
                    let (u, v) = grid.to_fractional(x, y);
                    columns[[row, col]] = u;
                    rows[[row, col]] = v;
                    mapped += 1;
                }
            }
        }

        if mapped == 0 {
            log::warn!("No swath pixels could be projected into the target CRS");
        }
        log::debug!(
            "Swath mapping: {} of {} pixels projected",
            mapped,
            swath_rows * swath_cols
        );

        Ok(Self { columns, rows })
    }

    pub fn is_mapped(&self, row: usize, col: usize) -> bool {
        self.columns[[row, col]].is_finite() && self.rows[[row, col]].is_finite()
    }
}

/// Per-variable resampling driver over a shared swath mapping.
///
/// Each variable resamples independently; a failure is recorded in that
/// variable's outcome and never aborts its siblings.
pub struct ResamplingOrchestrator {
    config: ResamplingConfig,
}

impl Default for ResamplingOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResamplingOrchestrator {
    pub fn new() -> Self {
        Self {
            config: ResamplingConfig::default(),
        }
    }

    pub fn with_config(config: ResamplingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResamplingConfig {
        &self.config
    }

    /// Resample one variable onto the target grid.
    ///
    /// Multi-band variables run band at a time over the shared mapping, so
    /// stacking per-band results is identical to resampling bands
    /// independently.
    pub fn resample_variable(
        &self,
        variable: &SourceVariable,
        geometry: &SwathGeometry,
        grid: &TargetGrid,
        mapping: &SwathMapping,
        method: InterpolationMethod,
    ) -> SwathResult<ResampledVariable> {
        let expected = geometry.shape();
        let actual = variable.data.plane_shape();
        if actual != expected {
            return Err(SwathError::ShapeMismatch {
                variable: variable.name.clone(),
                expected,
                actual,
            });
        }

        log::info!(
            "Resampling variable \"{}\" with {} interpolation",
            variable.name,
            method
        );

        let fill = variable.fill_value;
        let data = match &variable.data {
            VariableArray::Plane(plane) => VariableArray::Plane(self.resample_plane(
                plane.view(),
                geometry,
                grid,
                mapping,
                method,
                fill,
            )),
            VariableArray::Stack(cube) => {
                let bands = cube.dim().0;
                let (height, width) = grid.shape();
                let mut stacked = Array3::from_elem((bands, height, width), fill);

                for (band, plane) in cube.axis_iter(Axis(0)).enumerate() {
                    log::debug!(
                        "Resampling band {} of {} for \"{}\"",
                        band + 1,
                        bands,
                        variable.name
                    );
                    let resampled =
                        self.resample_plane(plane, geometry, grid, mapping, method, fill);
                    stacked.index_axis_mut(Axis(0), band).assign(&resampled);
                }

                VariableArray::Stack(stacked)
            }
        };

        Ok(ResampledVariable {
            name: variable.name.clone(),
            data,
            fill_value: fill,
        })
    }

    /// Resample every variable, collecting per-variable outcomes in order
    pub fn resample_all(
        &self,
        variables: &[SourceVariable],
        geometry: &SwathGeometry,
        grid: &TargetGrid,
        mapping: &SwathMapping,
        method: InterpolationMethod,
    ) -> Vec<VariableOutcome> {
        variables
            .iter()
            .map(|variable| self.variable_outcome(variable, geometry, grid, mapping, method))
            .collect()
    }

    /// Parallel variant of `resample_all`; outcomes keep variable order
    #[cfg(feature = "parallel")]
    pub fn resample_all_parallel(
        &self,
        variables: &[SourceVariable],
        geometry: &SwathGeometry,
        grid: &TargetGrid,
        mapping: &SwathMapping,
        method: InterpolationMethod,
    ) -> Vec<VariableOutcome> {
        use rayon::prelude::*;

        variables
            .par_iter()
            .map(|variable| self.variable_outcome(variable, geometry, grid, mapping, method))
            .collect()
    }

    fn variable_outcome(
        &self,
        variable: &SourceVariable,
        geometry: &SwathGeometry,
        grid: &TargetGrid,
        mapping: &SwathMapping,
        method: InterpolationMethod,
    ) -> VariableOutcome {
        match self.resample_variable(variable, geometry, grid, mapping, method) {
            Ok(resampled) => VariableOutcome::Resampled(resampled),
            Err(error) => {
                log::error!("Cannot resample variable \"{}\": {}", variable.name, error);
                VariableOutcome::Failed {
                    name: variable.name.clone(),
                    reason: error.to_string(),
                }
            }
        }
    }

    fn resample_plane(
        &self,
        source: ArrayView2<f64>,
        geometry: &SwathGeometry,
        grid: &TargetGrid,
        mapping: &SwathMapping,
        method: InterpolationMethod,
        fill: f64,
    ) -> DataPlane {
        match method {
            InterpolationMethod::Nearest => {
                resample_nearest_plane(source, mapping, grid, &self.config, fill)
            }
            InterpolationMethod::Bilinear => {
                resample_bilinear_plane(source, mapping, grid, fill)
            }
            InterpolationMethod::Ewa => {
                ewa::resample_ewa_plane(source, mapping, geometry, grid, &self.config, fill, false)
            }
            InterpolationMethod::EwaNearestNeighbor => {
                ewa::resample_ewa_plane(source, mapping, geometry, grid, &self.config, fill, true)
            }
        }
    }
}

/// Nearest-neighbour resampling as a forward splat with distance
/// competition: each mapped swath pixel claims the grid cells within the
/// search radius, and every cell keeps its closest claimant's value
/// verbatim. Unclaimed cells receive the fill value.
pub fn resample_nearest_plane(
    source: ArrayView2<f64>,
    mapping: &SwathMapping,
    grid: &TargetGrid,
    config: &ResamplingConfig,
    fill: f64,
) -> DataPlane {
    let (height, width) = grid.shape();
    let mut output = Array2::from_elem((height, width), fill);
    let mut best_distance = Array2::from_elem((height, width), f64::INFINITY);

    let radius = config.radius_in_crs_units(grid);
    let radius_squared = radius * radius;
    let radius_cols = radius / grid.x_res;
    let radius_rows = radius / grid.y_res;

    let (swath_rows, swath_cols) = source.dim();
    for row in 0..swath_rows {
        for col in 0..swath_cols {
            if !mapping.is_mapped(row, col) {
                continue;
            }

            let u = mapping.columns[[row, col]];
            let v = mapping.rows[[row, col]];

            let col_lo = ((u - radius_cols).ceil().max(0.0)) as isize;
            let col_hi = (u + radius_cols).floor().min(width as f64 - 1.0) as isize;
            let row_lo = ((v - radius_rows).ceil().max(0.0)) as isize;
            let row_hi = (v + radius_rows).floor().min(height as f64 - 1.0) as isize;

            let value = source[[row, col]];
            for cell_row in row_lo..=row_hi {
                for cell_col in col_lo..=col_hi {
                    let dx = (cell_col as f64 - u) * grid.x_res;
                    let dy = (cell_row as f64 - v) * grid.y_res;
                    let distance_squared = dx * dx + dy * dy;

                    if distance_squared > radius_squared {
                        continue;
                    }

                    let slot = [cell_row as usize, cell_col as usize];
                    if distance_squared < best_distance[slot] {
                        best_distance[slot] = distance_squared;
                        output[slot] = value;
                    }
                }
            }
        }
    }

    output
}

/// Bilinear resampling over swath quads: each block of four adjacent swath
/// pixels is inverted for the grid cell centres it covers and the corner
/// values blended by the fractional position. A quad with any fill-valued
/// corner writes fill to its covered cells; there is no partial blending.
pub fn resample_bilinear_plane(
    source: ArrayView2<f64>,
    mapping: &SwathMapping,
    grid: &TargetGrid,
    fill: f64,
) -> DataPlane {
    let (height, width) = grid.shape();
    let mut output = Array2::from_elem((height, width), fill);
    let mut claimed = Array2::from_elem((height, width), false);

    let (swath_rows, swath_cols) = source.dim();
    if swath_rows < 2 || swath_cols < 2 {
        return output;
    }

    for row in 0..swath_rows - 1 {
        for col in 0..swath_cols - 1 {
            let corners = [
                (row, col),
                (row, col + 1),
                (row + 1, col),
                (row + 1, col + 1),
            ];

            if corners
                .iter()
                .any(|&(r, c)| !mapping.is_mapped(r, c))
            {
                continue;
            }

            let quad_u = corners.map(|(r, c)| mapping.columns[[r, c]]);
            let quad_v = corners.map(|(r, c)| mapping.rows[[r, c]]);
            let values = corners.map(|(r, c)| source[[r, c]]);
            let quad_has_fill = values
                .iter()
                .any(|&value| !value.is_finite() || value == fill);

            let u_min = quad_u.iter().fold(f64::INFINITY, |a, &b| a.min(b));
            let u_max = quad_u.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            let v_min = quad_v.iter().fold(f64::INFINITY, |a, &b| a.min(b));
            let v_max = quad_v.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

            let col_lo = (u_min.ceil().max(0.0)) as isize;
            let col_hi = (u_max.floor().min(width as f64 - 1.0)) as isize;
            let row_lo = (v_min.ceil().max(0.0)) as isize;
            let row_hi = (v_max.floor().min(height as f64 - 1.0)) as isize;

            for cell_row in row_lo..=row_hi {
                for cell_col in col_lo..=col_hi {
                    let slot = [cell_row as usize, cell_col as usize];
                    if claimed[slot] {
                        continue;
                    }

                    let target = (cell_col as f64, cell_row as f64);
                    let position = inverse_bilinear(
                        (quad_u[0], quad_v[0]),
                        (quad_u[1], quad_v[1]),
                        (quad_u[2], quad_v[2]),
                        (quad_u[3], quad_v[3]),
                        target,
                    );

                    if let Some((s, t)) = position {
                        claimed[slot] = true;
                        if quad_has_fill {
                            output[slot] = fill;
                        } else {
                            output[slot] = (1.0 - s) * (1.0 - t) * values[0]
                                + s * (1.0 - t) * values[1]
                                + (1.0 - s) * t * values[2]
                                + s * t * values[3];
                        }
                    }
                }
            }
        }
    }

    output
}

/// Invert the bilinear patch spanned by corners a=(0,0), b=(1,0), c=(0,1),
/// d=(1,1) at `target`, returning the fractional (s, t) when the point
/// lies inside the quad
fn inverse_bilinear(
    a: (f64, f64),
    b: (f64, f64),
    c: (f64, f64),
    d: (f64, f64),
    target: (f64, f64),
) -> Option<(f64, f64)> {
    const INSIDE_SLACK: f64 = 1e-6;

    let e = (b.0 - a.0, b.1 - a.1);
    let f = (c.0 - a.0, c.1 - a.1);
    let g = (
        a.0 - b.0 + d.0 - c.0,
        a.1 - b.1 + d.1 - c.1,
    );
    let h = (target.0 - a.0, target.1 - a.1);

    let k2 = cross(g, f);
    let k1 = cross(e, f) + cross(h, g);
    let k0 = cross(h, e);

    let t = if k2.abs() < 1e-12 {
        // Parallelogram case degenerates to a linear equation.
        if k1.abs() < 1e-12 {
            return None;
        }
        -k0 / k1
    } else {
        let discriminant = k1 * k1 - 4.0 * k0 * k2;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        let t_a = (-k1 - root) / (2.0 * k2);
        if (-INSIDE_SLACK..=1.0 + INSIDE_SLACK).contains(&t_a) {
            t_a
        } else {
            (-k1 + root) / (2.0 * k2)
        }
    };

    if !(-INSIDE_SLACK..=1.0 + INSIDE_SLACK).contains(&t) {
        return None;
    }

    let denom_x = e.0 + g.0 * t;
    let denom_y = e.1 + g.1 * t;
    let s = if denom_x.abs() >= denom_y.abs() {
        if denom_x.abs() < 1e-12 {
            return None;
        }
        (h.0 - f.0 * t) / denom_x
    } else {
        (h.1 - f.1 * t) / denom_y
    };

    if !(-INSIDE_SLACK..=1.0 + INSIDE_SLACK).contains(&s) {
        return None;
    }

    Some((s.clamp(0.0, 1.0), t.clamp(0.0, 1.0)))
}

fn cross(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.1 - a.1 * b.0
}

use crate::core::geolocation::SwathGeometry;
use crate::core::projection::{surviving_points, CrsSpec, CrsTransformer};
use crate::core::resolution::{estimate_cell_size, AreaMethod};
use crate::types::{GeoTransform, GridExtent, GridParameters, SwathError, SwathResult};
use ndarray::Array1;

/// Relative tolerance for the resolved-grid consistency check
pub const CONSISTENCY_TOLERANCE: f64 = 1e-6;

/// Fully-resolved target grid: CRS, extent, cell sizes and pixel
/// dimensions, all mutually consistent. Rows run north-up (row 0 at
/// maximum y); cell sizes are positive with the sign convention confined
/// to the geotransform.
#[derive(Debug, Clone)]
pub struct TargetGrid {
    pub crs: CrsSpec,
    pub width: usize,
    pub height: usize,
    pub extent: GridExtent,
    /// Cell width in target CRS units
    pub x_res: f64,
    /// Cell height in target CRS units
    pub y_res: f64,
    /// How the default resolution was derived, when the request omitted it
    pub area_method: Option<AreaMethod>,
}

impl TargetGrid {
    /// (height, width), matching output array dimensions
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Cell-centre x coordinates, ascending
    pub fn x_coordinates(&self) -> Array1<f64> {
        let x_min = self.extent.x_min;
        let x_res = self.x_res;
        Array1::from_shape_fn(self.width, |col| x_min + (col as f64 + 0.5) * x_res)
    }

    /// Cell-centre y coordinates, descending (north-up)
    pub fn y_coordinates(&self) -> Array1<f64> {
        let y_max = self.extent.y_max;
        let y_res = self.y_res;
        Array1::from_shape_fn(self.height, |row| y_max - (row as f64 + 0.5) * y_res)
    }

    /// GDAL-convention geotransform (negative pixel height)
    pub fn geo_transform(&self) -> GeoTransform {
        GeoTransform {
            top_left_x: self.extent.x_min,
            pixel_width: self.x_res,
            rotation_x: 0.0,
            top_left_y: self.extent.y_max,
            rotation_y: 0.0,
            pixel_height: -self.y_res,
        }
    }

    /// Fractional grid coordinates (u along columns, v along rows) of a
    /// target CRS point; integers land on cell centres
    pub fn to_fractional(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.extent.x_min) / self.x_res - 0.5,
            (self.extent.y_max - y) / self.y_res - 0.5,
        )
    }

    /// Whether a geographic grid's extent was resolved in the [0, 360)
    /// frame, so source longitudes below zero need a +360 shift before
    /// projection
    pub fn crosses_antimeridian(&self) -> bool {
        self.crs.is_geographic() && self.extent.x_max > 180.0
    }

    /// Invariant check on the resolved quadruple (extent, size, width,
    /// height): the grid covers the extent without a whole spare row or
    /// column, within relative tolerance
    pub fn validate_consistency(&self) -> SwathResult<()> {
        check_axis_consistency("x", self.extent.x_span(), self.x_res, self.width)?;
        check_axis_consistency("y", self.extent.y_span(), self.y_res, self.height)
    }
}

fn check_axis_consistency(axis: &str, span: f64, res: f64, cells: usize) -> SwathResult<()> {
    if cells == 0 || !(res > 0.0) || !res.is_finite() {
        return Err(SwathError::Processing(format!(
            "resolved grid is degenerate on the {} axis: {} cells of size {}",
            axis, cells, res
        )));
    }

    let tolerance = CONSISTENCY_TOLERANCE * span;

    if (cells as f64) * res < span - tolerance {
        return Err(SwathError::Processing(format!(
            "resolved grid does not cover the {} extent: {} cells of {} against span {}",
            axis, cells, res, span
        )));
    }

    if ((cells - 1) as f64) * res >= span + tolerance {
        return Err(SwathError::Processing(format!(
            "resolved grid overshoots the {} extent: {} cells of {} against span {}",
            axis, cells, res, span
        )));
    }

    Ok(())
}

/// Derives a complete grid specification from partial request parameters,
/// projecting the swath perimeter for whatever the request leaves out.
pub struct GridResolver;

impl GridResolver {
    /// Resolve with a transformer created from the request's CRS
    pub fn resolve(params: &GridParameters, geometry: &SwathGeometry) -> SwathResult<TargetGrid> {
        let crs = CrsSpec::from_request(params.crs.as_deref())?;
        let transformer = CrsTransformer::new(&crs)?;
        Self::resolve_with_transformer(params, geometry, &transformer)
    }

    /// Resolve against an existing transformer, letting callers share one
    /// transformer between grid resolution and swath mapping
    pub fn resolve_with_transformer(
        params: &GridParameters,
        geometry: &SwathGeometry,
        transformer: &CrsTransformer,
    ) -> SwathResult<TargetGrid> {
        Self::validate_request(params)?;

        let needs_extent = params.scale_extent.is_none();
        let needs_resolution = params.scale_size.is_none() && params.width.is_none();

        // Perimeter projection is shared by extent and resolution
        // derivation; skip it entirely for fully-specified requests.
        let projected = if needs_extent || needs_resolution {
            let samples = geometry.extent_sample_points();
            surviving_points(&transformer.project_perimeter(&samples))?
        } else {
            Vec::new()
        };

        let extent = match params.scale_extent {
            Some(requested) => {
                let extent = GridExtent {
                    x_min: requested.x.min,
                    x_max: requested.x.max,
                    y_min: requested.y.min,
                    y_max: requested.y.max,
                };
                log::info!(
                    "Request extent: x: [{}, {}], y: [{}, {}]",
                    extent.x_min,
                    extent.x_max,
                    extent.y_min,
                    extent.y_max
                );
                extent
            }
            None => {
                let extent = extent_from_points(&projected)?;
                log::info!(
                    "Calculated extent: x: [{}, {}], y: [{}, {}]",
                    extent.x_min,
                    extent.x_max,
                    extent.y_min,
                    extent.y_max
                );
                extent
            }
        };

        let mut area_method = None;
        let (x_res, y_res) = match (params.scale_size, params.width, params.height) {
            (Some(size), _, _) => {
                log::info!("Resolutions from request: ({}, {})", size.x, size.y);
                (size.x, size.y)
            }
            (None, Some(width), Some(height)) => {
                let x_res = extent.x_span() / width as f64;
                let y_res = extent.y_span() / height as f64;
                log::info!("Calculated x resolution from width: {}", x_res);
                log::info!("Calculated y resolution from height: {}", y_res);
                (x_res, y_res)
            }
            _ => {
                let (rows, cols) = geometry.shape();
                let estimate = estimate_cell_size(&projected, rows, cols)?;
                area_method = Some(estimate.method);
                log::info!("Calculated projected resolution: {}", estimate.cell_size);
                (estimate.cell_size, estimate.cell_size)
            }
        };

        let (width, height) = match (params.width, params.height) {
            (Some(width), Some(height)) => (width, height),
            _ => {
                // Covering dimensions: the grid must reach the far edge of
                // the extent, so partial trailing cells round up.
                let width = (extent.x_span() / x_res).ceil() as usize;
                let height = (extent.y_span() / y_res).ceil() as usize;
                log::info!("Calculated width: {}", width);
                log::info!("Calculated height: {}", height);
                (width, height)
            }
        };

        let grid = TargetGrid {
            crs: transformer.spec().clone(),
            width,
            height,
            extent,
            x_res,
            y_res,
            area_method,
        };
        grid.validate_consistency()?;

        Ok(grid)
    }

    fn validate_request(params: &GridParameters) -> SwathResult<()> {
        if params.scale_size.is_some() && (params.width.is_some() || params.height.is_some()) {
            return Err(SwathError::InvalidGridSpec(
                "'scaleSize', 'width' or/and 'height' cannot be used at the same time \
                 in the request"
                    .to_string(),
            ));
        }

        if params.width.is_some() && params.height.is_none() {
            return Err(SwathError::InvalidGridSpec("missing cell height".to_string()));
        }
        if params.height.is_some() && params.width.is_none() {
            return Err(SwathError::InvalidGridSpec("missing cell width".to_string()));
        }

        if params.width == Some(0) || params.height == Some(0) {
            return Err(SwathError::InvalidGridSpec(
                "width and height must be positive".to_string(),
            ));
        }

        if let Some(size) = params.scale_size {
            if !(size.x > 0.0) || !(size.y > 0.0) || !size.x.is_finite() || !size.y.is_finite() {
                return Err(SwathError::InvalidGridSpec(format!(
                    "scale sizes must be positive, got ({}, {})",
                    size.x, size.y
                )));
            }
        }

        if let Some(extent) = params.scale_extent {
            let values = [extent.x.min, extent.x.max, extent.y.min, extent.y.max];
            if values.iter().any(|value| !value.is_finite()) {
                return Err(SwathError::InvalidGridSpec(
                    "scale extent values must be finite".to_string(),
                ));
            }
            if extent.x.min >= extent.x.max || extent.y.min >= extent.y.max {
                return Err(SwathError::InvalidGridSpec(format!(
                    "scale extent is inverted or empty: x: [{}, {}], y: [{}, {}]",
                    extent.x.min, extent.x.max, extent.y.min, extent.y.max
                )));
            }
        }

        Ok(())
    }
}

fn extent_from_points(points: &[(f64, f64)]) -> SwathResult<GridExtent> {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if !(x_max > x_min) || !(y_max > y_min) {
        return Err(SwathError::InvalidGeometry(format!(
            "projected swath extent is degenerate: x: [{}, {}], y: [{}, {}]",
            x_min, x_max, y_min, y_max
        )));
    }

    Ok(GridExtent {
        x_min,
        x_max,
        y_min,
        y_max,
    })
}

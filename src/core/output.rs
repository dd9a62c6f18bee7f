use crate::core::grid::TargetGrid;
use crate::core::resolution::AreaMethod;
use crate::types::{GeoTransform, ResampledVariable, VariableOutcome};

/// Assembled reprojection result, ready for the writer
#[derive(Debug)]
pub struct ReprojectedProduct {
    /// Fully-resolved target grid
    pub grid: TargetGrid,
    /// Cell-centre x coordinates, ascending, length `grid.width`
    pub x_coordinates: Vec<f64>,
    /// Cell-centre y coordinates, descending, length `grid.height`
    pub y_coordinates: Vec<f64>,
    /// Target CRS definition string
    pub crs_definition: String,
    /// Per-variable results, in request order
    pub outcomes: Vec<VariableOutcome>,
    /// Notes about recoverable fallbacks taken during processing
    pub diagnostics: Vec<String>,
    /// Processing timestamp
    pub processing_time: String,
}

impl ReprojectedProduct {
    /// Successfully resampled variables, in request order.
    pub fn resampled_variables(&self) -> impl Iterator<Item = &ResampledVariable> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            VariableOutcome::Resampled(variable) => Some(variable),
            VariableOutcome::Failed { .. } => None,
        })
    }

    /// Variables that were skipped, with the failure reason.
    pub fn failed_variables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            VariableOutcome::Resampled(_) => None,
            VariableOutcome::Failed { name, reason } => Some((name.as_str(), reason.as_str())),
        })
    }

    pub fn resampled_count(&self) -> usize {
        self.resampled_variables().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed_variables().count()
    }

    /// GDAL-convention geotransform of the assembled grid.
    pub fn geo_transform(&self) -> GeoTransform {
        self.grid.geo_transform()
    }
}

/// Packages resampling outcomes, coordinate arrays and CRS metadata into
/// the result container handed to the writer.
pub struct OutputAssembler;

impl OutputAssembler {
    pub fn assemble(grid: TargetGrid, outcomes: Vec<VariableOutcome>) -> ReprojectedProduct {
        let x_coordinates = grid.x_coordinates().to_vec();
        let y_coordinates = grid.y_coordinates().to_vec();
        let crs_definition = grid.crs.definition().to_string();

        let mut diagnostics = Vec::new();
        if grid.area_method == Some(AreaMethod::BoundingBox) {
            diagnostics.push(
                "cell size estimated from the perimeter bounding box; the projected \
                 swath outline was not a simple polygon"
                    .to_string(),
            );
        }

        for outcome in &outcomes {
            if let VariableOutcome::Failed { name, reason } = outcome {
                diagnostics.push(format!("variable '{}' skipped: {}", name, reason));
            }
        }

        let product = ReprojectedProduct {
            grid,
            x_coordinates,
            y_coordinates,
            crs_definition,
            outcomes,
            diagnostics,
            processing_time: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        };

        log::info!(
            "Assembled output: {} resampled, {} failed, {}x{} cells",
            product.resampled_count(),
            product.failed_count(),
            product.grid.width,
            product.grid.height
        );

        product
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geolocation::SwathGeometry;
    use crate::core::grid::GridResolver;
    use crate::types::{
        AxisRange, GridParameters, ScaleExtent, ScaleSize, VariableArray,
    };
    use ndarray::Array2;

    fn sample_grid() -> TargetGrid {
        let params = GridParameters {
            scale_extent: Some(ScaleExtent {
                x: AxisRange { min: 0.0, max: 4.0 },
                y: AxisRange { min: 0.0, max: 2.0 },
            }),
            scale_size: Some(ScaleSize { x: 1.0, y: 1.0 }),
            ..Default::default()
        };
        let latitude = Array2::from_shape_fn((2, 2), |(row, _)| 0.5 + row as f64);
        let longitude = Array2::from_shape_fn((2, 2), |(_, col)| 0.5 + col as f64);
        let geometry = SwathGeometry::new(latitude, longitude).unwrap();
        GridResolver::resolve(&params, &geometry).unwrap()
    }

    fn sample_outcomes() -> Vec<VariableOutcome> {
        vec![
            VariableOutcome::Resampled(ResampledVariable {
                name: "sea_surface_temperature".to_string(),
                data: VariableArray::Plane(Array2::zeros((2, 4))),
                fill_value: -9999.0,
            }),
            VariableOutcome::Failed {
                name: "wind_speed".to_string(),
                reason: "shape mismatch".to_string(),
            },
        ]
    }

    #[test]
    fn test_assemble_collects_coordinates_and_outcomes() {
        let product = OutputAssembler::assemble(sample_grid(), sample_outcomes());

        assert_eq!(product.x_coordinates, vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(product.y_coordinates, vec![1.5, 0.5]);
        assert_eq!(product.resampled_count(), 1);
        assert_eq!(product.failed_count(), 1);

        let (name, reason) = product.failed_variables().next().unwrap();
        assert_eq!(name, "wind_speed");
        assert_eq!(reason, "shape mismatch");
    }

    #[test]
    fn test_failed_variable_recorded_in_diagnostics() {
        let product = OutputAssembler::assemble(sample_grid(), sample_outcomes());

        assert!(product
            .diagnostics
            .iter()
            .any(|note| note.contains("wind_speed")));
    }

    #[test]
    fn test_bounding_box_fallback_noted() {
        let mut grid = sample_grid();
        grid.area_method = Some(AreaMethod::BoundingBox);

        let product = OutputAssembler::assemble(grid, Vec::new());

        assert!(product
            .diagnostics
            .iter()
            .any(|note| note.contains("bounding box")));
    }
}

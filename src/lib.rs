//! swathgrid: satellite swath to regular grid reprojection
//!
//! This library derives fully-specified target grids from partially-specified
//! requests and resamples swath variables onto them, supporting nearest,
//! bilinear and elliptical weighted averaging interpolation.

use numpy::{IntoPyArray, PyArray1, PyArray2, PyArray3, PyReadonlyArray2, PyReadonlyArray3};
use pyo3::prelude::*;

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    GridParameters, InterpolationMethod, ResampledVariable, SourceVariable, SwathError,
    SwathResult, VariableArray, VariableOutcome,
};

pub use crate::core::{
    complete_reprojection_pipeline, CrsSpec, CrsTransformer, GridResolver, OutputAssembler,
    ReprojectedProduct, ReprojectionPipeline, ResamplingConfig, ResamplingOrchestrator,
    SwathGeometry, SwathMapping, TargetGrid,
};

pub use io::{GriddedWriter, SwathReader, WriterOptions};

fn swath_error_to_py(error: SwathError) -> PyErr {
    match error {
        SwathError::InvalidGridSpec(_) | SwathError::InvalidGeometry(_) => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", error))
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", error)),
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PySwathGeometry>()?;
    m.add_class::<PyTargetGrid>()?;
    m.add_class::<PyReprojector>()?;
    m.add_class::<PyProductSummary>()?;
    Ok(())
}

/// Python wrapper for SwathGeometry
#[pyclass(name = "SwathGeometry")]
struct PySwathGeometry {
    inner: SwathGeometry,
}

#[pymethods]
impl PySwathGeometry {
    #[new]
    fn new(
        latitude: PyReadonlyArray2<f64>,
        longitude: PyReadonlyArray2<f64>,
        times: Option<PyReadonlyArray2<f64>>,
        zenith_angles: Option<PyReadonlyArray2<f64>>,
    ) -> PyResult<Self> {
        let mut geometry = SwathGeometry::new(
            latitude.as_array().to_owned(),
            longitude.as_array().to_owned(),
        )
        .map_err(swath_error_to_py)?;

        if let Some(times) = times {
            geometry = geometry
                .with_times(times.as_array().to_owned())
                .map_err(swath_error_to_py)?;
        }
        if let Some(zenith_angles) = zenith_angles {
            geometry = geometry
                .with_zenith_angles(zenith_angles.as_array().to_owned())
                .map_err(swath_error_to_py)?;
        }

        Ok(PySwathGeometry { inner: geometry })
    }

    #[getter]
    fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    #[getter]
    fn valid_pixel_count(&self) -> usize {
        self.inner.valid_pixel_count()
    }

    fn crosses_antimeridian(&self) -> bool {
        self.inner.crosses_antimeridian()
    }

    fn __repr__(&self) -> String {
        let (rows, cols) = self.inner.shape();
        format!("SwathGeometry({}x{})", rows, cols)
    }
}

/// Python wrapper for TargetGrid
#[pyclass(name = "TargetGrid")]
struct PyTargetGrid {
    inner: TargetGrid,
}

#[pymethods]
impl PyTargetGrid {
    /// Resolve a grid from a JSON request and the swath geometry
    #[new]
    fn new(request_json: String, geometry: &PySwathGeometry) -> PyResult<Self> {
        let params = GridParameters::from_json(&request_json).map_err(swath_error_to_py)?;
        let grid = GridResolver::resolve(&params, &geometry.inner).map_err(swath_error_to_py)?;
        Ok(PyTargetGrid { inner: grid })
    }

    #[getter]
    fn width(&self) -> usize {
        self.inner.width
    }

    #[getter]
    fn height(&self) -> usize {
        self.inner.height
    }

    #[getter]
    fn x_res(&self) -> f64 {
        self.inner.x_res
    }

    #[getter]
    fn y_res(&self) -> f64 {
        self.inner.y_res
    }

    #[getter]
    fn crs(&self) -> String {
        self.inner.crs.definition().to_string()
    }

    /// Extent as (x_min, y_min, x_max, y_max)
    #[getter]
    fn extent(&self) -> (f64, f64, f64, f64) {
        let extent = &self.inner.extent;
        (extent.x_min, extent.y_min, extent.x_max, extent.y_max)
    }

    fn x_coordinates<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        self.inner.x_coordinates().into_pyarray(py)
    }

    fn y_coordinates<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        self.inner.y_coordinates().into_pyarray(py)
    }

    fn __repr__(&self) -> String {
        format!(
            "TargetGrid(crs='{}', {}x{})",
            self.inner.crs.definition(),
            self.inner.width,
            self.inner.height
        )
    }
}

/// Python wrapper for the reprojection pipeline
#[pyclass(name = "Reprojector")]
struct PyReprojector {
    config: ResamplingConfig,
}

#[pymethods]
impl PyReprojector {
    #[new]
    fn new(radius_of_influence: Option<f64>) -> Self {
        let mut config = ResamplingConfig::default();
        if let Some(radius) = radius_of_influence {
            config.radius_of_influence = radius;
        }
        PyReprojector { config }
    }

    /// Resample a 2-D variable onto a resolved grid
    fn resample<'py>(
        &self,
        py: Python<'py>,
        geometry: &PySwathGeometry,
        grid: &PyTargetGrid,
        data: PyReadonlyArray2<f64>,
        fill_value: f64,
        interpolation: &str,
    ) -> PyResult<&'py PyArray2<f64>> {
        let method: InterpolationMethod = interpolation.parse().map_err(swath_error_to_py)?;

        let variable = SourceVariable {
            name: "data".to_string(),
            data: VariableArray::Plane(data.as_array().to_owned()),
            fill_value,
        };

        let resampled = self.resample_variable(&variable, geometry, grid, method)?;
        match resampled.data {
            VariableArray::Plane(plane) => Ok(plane.into_pyarray(py)),
            VariableArray::Stack(_) => Err(PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(
                "expected a 2-D result".to_string(),
            )),
        }
    }

    /// Resample a banded 3-D variable (bands first) onto a resolved grid
    fn resample_bands<'py>(
        &self,
        py: Python<'py>,
        geometry: &PySwathGeometry,
        grid: &PyTargetGrid,
        data: PyReadonlyArray3<f64>,
        fill_value: f64,
        interpolation: &str,
    ) -> PyResult<&'py PyArray3<f64>> {
        let method: InterpolationMethod = interpolation.parse().map_err(swath_error_to_py)?;

        let variable = SourceVariable {
            name: "data".to_string(),
            data: VariableArray::Stack(data.as_array().to_owned()),
            fill_value,
        };

        let resampled = self.resample_variable(&variable, geometry, grid, method)?;
        match resampled.data {
            VariableArray::Stack(stack) => Ok(stack.into_pyarray(py)),
            VariableArray::Plane(_) => Err(PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(
                "expected a banded result".to_string(),
            )),
        }
    }

    /// Run the complete file-to-file pipeline
    fn reproject_file(
        &self,
        input_path: String,
        request_json: String,
        output_path: String,
    ) -> PyResult<PyProductSummary> {
        let params = GridParameters::from_json(&request_json).map_err(swath_error_to_py)?;
        let input = SwathReader::new(&input_path)
            .and_then(|reader| reader.read())
            .map_err(swath_error_to_py)?;

        let pipeline = ReprojectionPipeline::with_config(self.config.clone());
        let product = pipeline
            .reproject(&params, &input.geometry, &input.variables)
            .map_err(swath_error_to_py)?;

        GriddedWriter::write_product(&product, &output_path, &WriterOptions::default())
            .map_err(swath_error_to_py)?;

        Ok(PyProductSummary::from_product(&product))
    }
}

impl PyReprojector {
    fn resample_variable(
        &self,
        variable: &SourceVariable,
        geometry: &PySwathGeometry,
        grid: &PyTargetGrid,
        method: InterpolationMethod,
    ) -> PyResult<ResampledVariable> {
        let transformer = CrsTransformer::new(&grid.inner.crs).map_err(swath_error_to_py)?;
        let mapping = SwathMapping::build(&geometry.inner, &grid.inner, &transformer)
            .map_err(swath_error_to_py)?;

        ResamplingOrchestrator::with_config(self.config.clone())
            .resample_variable(variable, &geometry.inner, &grid.inner, &mapping, method)
            .map_err(swath_error_to_py)
    }
}

/// Python wrapper summarizing a completed reprojection
#[pyclass(name = "ProductSummary")]
struct PyProductSummary {
    resampled: Vec<String>,
    failed: Vec<(String, String)>,
    diagnostics: Vec<String>,
    width: usize,
    height: usize,
}

impl PyProductSummary {
    fn from_product(product: &ReprojectedProduct) -> Self {
        PyProductSummary {
            resampled: product
                .resampled_variables()
                .map(|variable| variable.name.clone())
                .collect(),
            failed: product
                .failed_variables()
                .map(|(name, reason)| (name.to_string(), reason.to_string()))
                .collect(),
            diagnostics: product.diagnostics.clone(),
            width: product.grid.width,
            height: product.grid.height,
        }
    }
}

#[pymethods]
impl PyProductSummary {
    #[getter]
    fn resampled(&self) -> Vec<String> {
        self.resampled.clone()
    }

    #[getter]
    fn failed(&self) -> Vec<(String, String)> {
        self.failed.clone()
    }

    #[getter]
    fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.clone()
    }

    #[getter]
    fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    fn __str__(&self) -> String {
        format!(
            "ProductSummary({} resampled, {} failed, {}x{})",
            self.resampled.len(),
            self.failed.len(),
            self.width,
            self.height
        )
    }
}

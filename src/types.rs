use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// 2D swath-space or grid-space data array (rows x cols)
pub type DataPlane = Array2<f64>;

/// 3D multi-band data array (band x rows x cols)
pub type DataCube = Array3<f64>;

/// Interpolation strategies for swath resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// Nearest neighbour within a search radius
    #[serde(rename = "near")]
    Nearest,
    /// Four-corner weighted interpolation
    #[serde(rename = "bilinear")]
    Bilinear,
    /// Elliptical weighted averaging over the sensor footprint
    #[serde(rename = "ewa")]
    Ewa,
    /// EWA weighting, but the maximum-weight contributor wins
    #[serde(rename = "ewa-nn")]
    EwaNearestNeighbor,
}

impl Default for InterpolationMethod {
    fn default() -> Self {
        InterpolationMethod::EwaNearestNeighbor
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpolationMethod::Nearest => write!(f, "near"),
            InterpolationMethod::Bilinear => write!(f, "bilinear"),
            InterpolationMethod::Ewa => write!(f, "ewa"),
            InterpolationMethod::EwaNearestNeighbor => write!(f, "ewa-nn"),
        }
    }
}

impl std::str::FromStr for InterpolationMethod {
    type Err = SwathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "near" => Ok(InterpolationMethod::Nearest),
            "bilinear" => Ok(InterpolationMethod::Bilinear),
            "ewa" => Ok(InterpolationMethod::Ewa),
            "ewa-nn" => Ok(InterpolationMethod::EwaNearestNeighbor),
            other => Err(SwathError::InvalidGridSpec(format!(
                "invalid value for interpolation type: \"{}\" (expected one of \
                 \"near\", \"bilinear\", \"ewa\", \"ewa-nn\")",
                other
            ))),
        }
    }
}

/// Closed range along one grid axis, in target CRS units
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

/// Requested grid extent for both axes
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScaleExtent {
    pub x: AxisRange,
    pub y: AxisRange,
}

/// Requested cell sizes, target CRS units per pixel
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScaleSize {
    pub x: f64,
    pub y: f64,
}

/// Partially-specified grid request, as carried in the service message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridParameters {
    /// EPSG code ("EPSG:4326" or bare integer) or proj4 string
    pub crs: Option<String>,
    #[serde(default)]
    pub interpolation: InterpolationMethod,
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub scale_extent: Option<ScaleExtent>,
    pub scale_size: Option<ScaleSize>,
}

impl GridParameters {
    /// Parse a JSON request body into grid parameters
    pub fn from_json(body: &str) -> SwathResult<Self> {
        serde_json::from_str(body)
            .map_err(|err| SwathError::InvalidGridSpec(format!("malformed request: {}", err)))
    }
}

/// Rectangular grid extent in target CRS units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridExtent {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl GridExtent {
    pub fn x_span(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn y_span(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// Geospatial transformation parameters (GDAL convention)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Map a fractional pixel position (col, row) to CRS coordinates
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// GDAL-ordered coefficient array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

/// Variable values: a single plane or a stack of bands sharing one geometry
#[derive(Debug, Clone)]
pub enum VariableArray {
    Plane(DataPlane),
    Stack(DataCube),
}

impl VariableArray {
    /// Shape of the trailing two (rows, cols) dimensions
    pub fn plane_shape(&self) -> (usize, usize) {
        match self {
            VariableArray::Plane(plane) => plane.dim(),
            VariableArray::Stack(cube) => {
                let (_, rows, cols) = cube.dim();
                (rows, cols)
            }
        }
    }

    pub fn band_count(&self) -> usize {
        match self {
            VariableArray::Plane(_) => 1,
            VariableArray::Stack(cube) => cube.dim().0,
        }
    }
}

/// One science variable read from the source granule
#[derive(Debug, Clone)]
pub struct SourceVariable {
    pub name: String,
    pub data: VariableArray,
    pub fill_value: f64,
}

/// One science variable on the target grid
#[derive(Debug, Clone)]
pub struct ResampledVariable {
    pub name: String,
    pub data: VariableArray,
    pub fill_value: f64,
}

/// Per-variable resampling result; failures never abort sibling variables
#[derive(Debug, Clone)]
pub enum VariableOutcome {
    Resampled(ResampledVariable),
    Failed { name: String, reason: String },
}

impl VariableOutcome {
    pub fn name(&self) -> &str {
        match self {
            VariableOutcome::Resampled(variable) => &variable.name,
            VariableOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_resampled(&self) -> bool {
        matches!(self, VariableOutcome::Resampled(_))
    }
}

/// Error types for swath reprojection
#[derive(Debug, thiserror::Error)]
pub enum SwathError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid grid specification: {0}")]
    InvalidGridSpec(String),

    #[error("Projection failure: {0}")]
    ProjectionFailure(String),

    #[error("Shape mismatch for '{variable}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        variable: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("CRS error: {0}")]
    Crs(#[from] proj::ProjCreateError),
}

/// Result type for swath reprojection operations
pub type SwathResult<T> = Result<T, SwathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_round_trip() {
        for (text, method) in [
            ("near", InterpolationMethod::Nearest),
            ("bilinear", InterpolationMethod::Bilinear),
            ("ewa", InterpolationMethod::Ewa),
            ("ewa-nn", InterpolationMethod::EwaNearestNeighbor),
        ] {
            assert_eq!(text.parse::<InterpolationMethod>().unwrap(), method);
            assert_eq!(method.to_string(), text);
        }

        assert!("cubic".parse::<InterpolationMethod>().is_err());
    }

    #[test]
    fn test_grid_parameters_from_json() {
        let params = GridParameters::from_json(
            r#"{
                "crs": "EPSG:4326",
                "interpolation": "bilinear",
                "scaleExtent": {"x": {"min": -180.0, "max": 180.0},
                                "y": {"min": -90.0, "max": 90.0}},
                "scaleSize": {"x": 1.0, "y": 1.0}
            }"#,
        )
        .unwrap();

        assert_eq!(params.interpolation, InterpolationMethod::Bilinear);
        let extent = params.scale_extent.unwrap();
        assert_eq!(extent.x.min, -180.0);
        assert_eq!(extent.y.max, 90.0);
        assert!(params.width.is_none());
    }

    #[test]
    fn test_interpolation_defaults_to_ewa_nn() {
        let params = GridParameters::from_json("{}").unwrap();
        assert_eq!(
            params.interpolation,
            InterpolationMethod::EwaNearestNeighbor
        );
    }

    #[test]
    fn test_geotransform_apply() {
        let transform = GeoTransform {
            top_left_x: -180.0,
            pixel_width: 1.0,
            rotation_x: 0.0,
            top_left_y: 90.0,
            rotation_y: 0.0,
            pixel_height: -1.0,
        };

        assert_eq!(transform.apply(0.0, 0.0), (-180.0, 90.0));
        assert_eq!(transform.apply(360.0, 180.0), (180.0, -90.0));
    }
}

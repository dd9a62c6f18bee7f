use crate::types::{SwathError, SwathResult};
use proj::Proj;

/// CRS applied when the request leaves `crs` unset
pub const CRS_DEFAULT: &str = "+proj=longlat +ellps=WGS84";

/// Normalized coordinate reference system descriptor.
///
/// Accepts "EPSG:nnnn", a bare EPSG integer, or a proj4 string, and
/// validates the definition eagerly so malformed requests fail before any
/// resampling work begins.
#[derive(Debug, Clone)]
pub struct CrsSpec {
    definition: String,
}

impl CrsSpec {
    /// Normalize the request's CRS value, falling back to the default
    /// geographic CRS when absent or empty
    pub fn from_request(value: Option<&str>) -> SwathResult<Self> {
        let raw = value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(CRS_DEFAULT);

        let definition = match raw.parse::<u32>() {
            Ok(code) => format!("EPSG:{}", code),
            Err(_) => raw.to_string(),
        };

        Proj::new(&definition)?;

        Ok(Self { definition })
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Whether the CRS is geographic (degree units).
    ///
    /// String heuristic over the definition; sufficient for the EPSG and
    /// proj4 forms accepted by `from_request`.
    pub fn is_geographic(&self) -> bool {
        let lowered = self.definition.to_lowercase();
        lowered.contains("epsg:4326")
            || lowered.contains("+proj=longlat")
            || lowered.contains("+proj=latlong")
            || lowered.contains("geogcs")
            || lowered.contains("degree")
    }
}

/// Forward and inverse point transforms between geographic lon/lat and the
/// target CRS.
///
/// Per-point failures (a point outside the target projection's valid
/// domain) are reported as `None` rather than aborting the batch.
pub struct CrsTransformer {
    spec: CrsSpec,
    forward: Proj,
    inverse: Proj,
}

impl CrsTransformer {
    pub fn new(spec: &CrsSpec) -> SwathResult<Self> {
        let forward = Proj::new_known_crs(CRS_DEFAULT, spec.definition(), None)?;
        let inverse = Proj::new_known_crs(spec.definition(), CRS_DEFAULT, None)?;

        Ok(Self {
            spec: spec.clone(),
            forward,
            inverse,
        })
    }

    pub fn spec(&self) -> &CrsSpec {
        &self.spec
    }

    /// Forward-project one (lon, lat) point into target CRS (x, y)
    pub fn project(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        self.forward
            .convert((lon, lat))
            .ok()
            .filter(|&(x, y)| x.is_finite() && y.is_finite())
    }

    /// Forward-project a perimeter point set, marking per-point failures
    pub fn project_perimeter(&self, points: &[(f64, f64)]) -> Vec<Option<(f64, f64)>> {
        points
            .iter()
            .map(|&(lon, lat)| self.project(lon, lat))
            .collect()
    }

    /// Inverse-project one target CRS (x, y) back to (lon, lat)
    pub fn unproject(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.inverse
            .convert((x, y))
            .ok()
            .filter(|&(lon, lat)| lon.is_finite() && lat.is_finite())
    }
}

impl std::fmt::Debug for CrsTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrsTransformer")
            .field("spec", &self.spec)
            .finish()
    }
}

/// Keep only the successfully projected points of a perimeter batch,
/// failing when every point fell outside the target CRS domain
pub fn surviving_points(projected: &[Option<(f64, f64)>]) -> SwathResult<Vec<(f64, f64)>> {
    let survivors: Vec<(f64, f64)> = projected.iter().filter_map(|point| *point).collect();

    if survivors.is_empty() {
        return Err(SwathError::ProjectionFailure(
            "no perimeter points could be projected into the target CRS".to_string(),
        ));
    }

    let failed = projected.len() - survivors.len();
    if failed > 0 {
        log::warn!(
            "{} of {} perimeter points fell outside the target CRS domain",
            failed,
            projected.len()
        );
    }

    Ok(survivors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_normalization() {
        let spec = CrsSpec::from_request(None).unwrap();
        assert_eq!(spec.definition(), CRS_DEFAULT);

        let spec = CrsSpec::from_request(Some("")).unwrap();
        assert_eq!(spec.definition(), CRS_DEFAULT);

        let spec = CrsSpec::from_request(Some("4326")).unwrap();
        assert_eq!(spec.definition(), "EPSG:4326");

        let spec = CrsSpec::from_request(Some("EPSG:32610")).unwrap();
        assert_eq!(spec.definition(), "EPSG:32610");
    }

    #[test]
    fn test_invalid_crs_rejected() {
        assert!(CrsSpec::from_request(Some("EPSG:999999")).is_err());
        assert!(CrsSpec::from_request(Some("not a crs")).is_err());
    }

    #[test]
    fn test_is_geographic() {
        assert!(CrsSpec::from_request(None).unwrap().is_geographic());
        assert!(CrsSpec::from_request(Some("EPSG:4326"))
            .unwrap()
            .is_geographic());
        assert!(!CrsSpec::from_request(Some("EPSG:32610"))
            .unwrap()
            .is_geographic());
    }

    #[test]
    fn test_geographic_target_passes_degrees_through() {
        let spec = CrsSpec::from_request(None).unwrap();
        let transformer = CrsTransformer::new(&spec).unwrap();

        let (x, y) = transformer.project(-122.5, 37.5).unwrap();
        assert!((x - -122.5).abs() < 1e-6);
        assert!((y - 37.5).abs() < 1e-6);
    }

    #[test]
    fn test_utm_projection_range() {
        let spec = CrsSpec::from_request(Some("EPSG:32610")).unwrap();
        let transformer = CrsTransformer::new(&spec).unwrap();

        // UTM zone 10N: positive easting and northing for the SF bay area
        let (x, y) = transformer.project(-122.5, 37.5).unwrap();
        assert!(x > 500_000.0 && x < 600_000.0);
        assert!(y > 4_100_000.0 && y < 4_300_000.0);

        let (lon, lat) = transformer.unproject(x, y).unwrap();
        assert!((lon - -122.5).abs() < 1e-6);
        assert!((lat - 37.5).abs() < 1e-6);
    }

    #[test]
    fn test_per_point_failures_do_not_abort_batch() {
        // Orthographic projection only covers one hemisphere, so the
        // antipodal point fails while the near point succeeds.
        let spec =
            CrsSpec::from_request(Some("+proj=ortho +lat_0=0 +lon_0=0 +ellps=WGS84")).unwrap();
        let transformer = CrsTransformer::new(&spec).unwrap();

        let projected = transformer.project_perimeter(&[(10.0, 10.0), (179.0, 0.0)]);
        assert!(projected[0].is_some());
        assert!(projected[1].is_none());

        let survivors = surviving_points(&projected).unwrap();
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn test_all_points_failing_is_fatal() {
        let projected: Vec<Option<(f64, f64)>> = vec![None, None, None];
        assert!(matches!(
            surviving_points(&projected),
            Err(SwathError::ProjectionFailure(_))
        ));
    }
}

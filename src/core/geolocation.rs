use crate::types::{DataPlane, SwathError, SwathResult};

/// Longitude jump between adjacent perimeter samples that marks an
/// antimeridian crossing, in degrees.
pub const ANTIMERIDIAN_JUMP_DEGREES: f64 = 180.0;

/// Immutable per-pixel swath geolocation.
///
/// Wraps latitude/longitude arrays (degrees) plus optional per-pixel
/// acquisition times and satellite zenith angles used by the EWA methods.
/// Source arrays are never mutated; antimeridian re-expression happens on
/// copies of the perimeter samples only.
#[derive(Debug, Clone)]
pub struct SwathGeometry {
    latitude: DataPlane,
    longitude: DataPlane,
    times: Option<DataPlane>,
    zenith_angles: Option<DataPlane>,
}

impl SwathGeometry {
    /// Build a swath geometry from latitude/longitude arrays
    pub fn new(latitude: DataPlane, longitude: DataPlane) -> SwathResult<Self> {
        if latitude.dim() != longitude.dim() {
            return Err(SwathError::InvalidGeometry(format!(
                "latitude shape {:?} does not match longitude shape {:?}",
                latitude.dim(),
                longitude.dim()
            )));
        }

        let (rows, cols) = latitude.dim();
        if rows == 0 || cols == 0 {
            return Err(SwathError::InvalidGeometry(
                "geolocation arrays are empty".to_string(),
            ));
        }

        let geometry = Self {
            latitude,
            longitude,
            times: None,
            zenith_angles: None,
        };

        let valid_pixels = geometry.valid_pixel_count();
        if valid_pixels == 0 {
            return Err(SwathError::InvalidGeometry(
                "no valid pixels in geolocation arrays".to_string(),
            ));
        }

        log::debug!(
            "Swath geometry: {} rows x {} cols, {} valid pixels",
            rows,
            cols,
            valid_pixels
        );

        Ok(geometry)
    }

    /// Attach per-pixel acquisition times (seconds), used for EWA scan grouping
    pub fn with_times(mut self, times: DataPlane) -> SwathResult<Self> {
        if times.dim() != self.latitude.dim() {
            return Err(SwathError::InvalidGeometry(format!(
                "time array shape {:?} does not match geolocation shape {:?}",
                times.dim(),
                self.latitude.dim()
            )));
        }
        self.times = Some(times);
        Ok(self)
    }

    /// Attach per-pixel satellite zenith angles (degrees), used to widen
    /// the EWA footprint at high scan angles
    pub fn with_zenith_angles(mut self, zenith_angles: DataPlane) -> SwathResult<Self> {
        if zenith_angles.dim() != self.latitude.dim() {
            return Err(SwathError::InvalidGeometry(format!(
                "zenith angle array shape {:?} does not match geolocation shape {:?}",
                zenith_angles.dim(),
                self.latitude.dim()
            )));
        }
        self.zenith_angles = Some(zenith_angles);
        Ok(self)
    }

    /// (rows, cols) of the swath
    pub fn shape(&self) -> (usize, usize) {
        self.latitude.dim()
    }

    pub fn latitude(&self) -> &DataPlane {
        &self.latitude
    }

    pub fn longitude(&self) -> &DataPlane {
        &self.longitude
    }

    pub fn times(&self) -> Option<&DataPlane> {
        self.times.as_ref()
    }

    pub fn zenith_angles(&self) -> Option<&DataPlane> {
        self.zenith_angles.as_ref()
    }

    /// Whether the pixel at (row, col) carries usable geolocation
    pub fn is_valid_pixel(&self, row: usize, col: usize) -> bool {
        is_valid_coordinate(self.latitude[[row, col]], self.longitude[[row, col]])
    }

    pub fn valid_pixel_count(&self) -> usize {
        ndarray::Zip::from(&self.latitude)
            .and(&self.longitude)
            .fold(0usize, |count, &lat, &lon| {
                count + usize::from(is_valid_coordinate(lat, lon))
            })
    }

    /// Index walk around the array boundary as a closed loop: top row
    /// left to right, right column top to bottom, bottom row right to
    /// left, left column bottom to top. Single-row and single-column
    /// swaths visit each pixel exactly once.
    pub fn perimeter_indices(&self) -> Vec<(usize, usize)> {
        let (rows, cols) = self.shape();
        let mut indices = Vec::with_capacity(2 * (rows + cols));

        for col in 0..cols {
            indices.push((0, col));
        }
        for row in 1..rows {
            indices.push((row, cols - 1));
        }
        if rows > 1 {
            for col in (0..cols - 1).rev() {
                indices.push((rows - 1, col));
            }
        }
        if cols > 1 && rows > 2 {
            for row in (1..rows - 1).rev() {
                indices.push((row, 0));
            }
        }

        indices
    }

    /// Perimeter (lon, lat) samples in walk order, invalid pixels skipped
    pub fn perimeter_lonlat(&self) -> Vec<(f64, f64)> {
        self.perimeter_indices()
            .into_iter()
            .filter(|&(row, col)| self.is_valid_pixel(row, col))
            .map(|(row, col)| (self.longitude[[row, col]], self.latitude[[row, col]]))
            .collect()
    }

    /// Whether adjacent perimeter samples jump across the antimeridian.
    ///
    /// Detection is a longitude discontinuity greater than 180 degrees
    /// between neighbouring samples of the closed perimeter loop, never a
    /// raw min/max test, so swaths legitimately spanning most of the globe
    /// are not misclassified.
    pub fn crosses_antimeridian(&self) -> bool {
        perimeter_crosses_antimeridian(&self.perimeter_lonlat())
    }

    /// The pole's (lon, lat) when the swath encloses one, determined by the
    /// signed longitude winding around the closed perimeter.
    pub fn enclosed_pole(&self) -> Option<(f64, f64)> {
        let perimeter = self.perimeter_lonlat();
        if perimeter.len() < 3 {
            return None;
        }

        let mut winding = 0.0_f64;
        for pair in perimeter.windows(2) {
            winding += wrapped_longitude_delta(pair[0].0, pair[1].0);
        }
        let last = perimeter[perimeter.len() - 1];
        winding += wrapped_longitude_delta(last.0, perimeter[0].0);

        // A perimeter circling a pole accumulates a full +-360 of longitude;
        // anything else cancels out.
        if winding.abs() <= 180.0 {
            return None;
        }

        let mean_latitude = self.mean_valid_latitude();
        if mean_latitude >= 0.0 {
            Some((0.0, 90.0))
        } else {
            Some((0.0, -90.0))
        }
    }

    /// Perimeter samples prepared for extent and resolution derivation:
    /// re-expressed in a [0, 360) longitude frame when the swath crosses
    /// the antimeridian, with the pole appended when one is enclosed.
    pub fn extent_sample_points(&self) -> Vec<(f64, f64)> {
        let mut points = self.perimeter_lonlat();

        if perimeter_crosses_antimeridian(&points) {
            log::debug!("Swath crosses the antimeridian, normalizing longitudes to [0, 360)");
            for point in points.iter_mut() {
                if point.0 < 0.0 {
                    point.0 += 360.0;
                }
            }
        }

        if let Some(pole) = self.enclosed_pole() {
            log::debug!("Swath encloses a pole at latitude {}", pole.1);
            points.push(pole);
        }

        points
    }

    fn mean_valid_latitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        ndarray::Zip::from(&self.latitude)
            .and(&self.longitude)
            .for_each(|&lat, &lon| {
                if is_valid_coordinate(lat, lon) {
                    sum += lat;
                    count += 1;
                }
            });
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// Whether a (lat, lon) pair is usable geolocation
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 360.0
}

/// Antimeridian test over an ordered closed perimeter loop
pub fn perimeter_crosses_antimeridian(perimeter: &[(f64, f64)]) -> bool {
    if perimeter.len() < 2 {
        return false;
    }

    let mut crossing = perimeter
        .windows(2)
        .any(|pair| (pair[1].0 - pair[0].0).abs() > ANTIMERIDIAN_JUMP_DEGREES);

    if !crossing {
        let last = perimeter[perimeter.len() - 1];
        crossing = (perimeter[0].0 - last.0).abs() > ANTIMERIDIAN_JUMP_DEGREES;
    }

    crossing
}

fn wrapped_longitude_delta(from: f64, to: f64) -> f64 {
    let mut delta = to - from;
    while delta > 180.0 {
        delta -= 360.0;
    }
    while delta < -180.0 {
        delta += 360.0;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn regular_swath(rows: usize, cols: usize, lat0: f64, lon0: f64, step: f64) -> SwathGeometry {
        let latitude =
            Array2::from_shape_fn((rows, cols), |(row, _)| lat0 + row as f64 * step);
        let longitude =
            Array2::from_shape_fn((rows, cols), |(_, col)| lon0 + col as f64 * step);
        SwathGeometry::new(latitude, longitude).unwrap()
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let latitude = Array2::zeros((3, 4));
        let longitude = Array2::zeros((4, 3));
        let result = SwathGeometry::new(latitude, longitude);
        assert!(matches!(result, Err(SwathError::InvalidGeometry(_))));
    }

    #[test]
    fn test_all_invalid_rejected() {
        let latitude = Array2::from_elem((3, 3), f64::NAN);
        let longitude = Array2::from_elem((3, 3), f64::NAN);
        let result = SwathGeometry::new(latitude, longitude);
        assert!(matches!(result, Err(SwathError::InvalidGeometry(_))));
    }

    #[test]
    fn test_perimeter_walk_order() {
        let swath = regular_swath(3, 3, 0.0, 0.0, 1.0);
        let indices = swath.perimeter_indices();
        assert_eq!(
            indices,
            vec![
                (0, 0),
                (0, 1),
                (0, 2),
                (1, 2),
                (2, 2),
                (2, 1),
                (2, 0),
                (1, 0)
            ]
        );
    }

    #[test]
    fn test_perimeter_single_row_and_column() {
        let row_swath = regular_swath(1, 4, 0.0, 0.0, 1.0);
        assert_eq!(
            row_swath.perimeter_indices(),
            vec![(0, 0), (0, 1), (0, 2), (0, 3)]
        );

        let col_swath = regular_swath(4, 1, 0.0, 0.0, 1.0);
        assert_eq!(
            col_swath.perimeter_indices(),
            vec![(0, 0), (1, 0), (2, 0), (3, 0)]
        );
    }

    #[test]
    fn test_invalid_pixels_skipped_on_perimeter() {
        let mut latitude = Array2::zeros((3, 3));
        let longitude = Array2::zeros((3, 3));
        latitude[[0, 1]] = f64::NAN;

        let swath = SwathGeometry::new(latitude, longitude).unwrap();
        assert_eq!(swath.perimeter_lonlat().len(), 7);
    }

    #[test]
    fn test_antimeridian_detection() {
        let latitude = Array2::zeros((2, 2));
        let longitude =
            Array2::from_shape_vec((2, 2), vec![179.0, -179.0, 179.0, -179.0]).unwrap();
        let swath = SwathGeometry::new(latitude, longitude).unwrap();
        assert!(swath.crosses_antimeridian());

        let normalized = swath.extent_sample_points();
        assert!(normalized.iter().all(|&(lon, _)| lon >= 0.0));
        assert!(normalized.iter().any(|&(lon, _)| lon > 180.0));
    }

    #[test]
    fn test_non_crossing_swath_untouched() {
        let swath = regular_swath(3, 3, 10.0, 20.0, 0.5);
        assert!(!swath.crosses_antimeridian());

        let points = swath.extent_sample_points();
        assert_eq!(points.len(), swath.perimeter_lonlat().len());
    }

    #[test]
    fn test_pole_enclosure_winding() {
        // Boundary pixels sweep a full circle of longitude at latitude 80,
        // so the perimeter loop encloses the north pole.
        let latitude = Array2::from_elem((4, 4), 80.0);
        let mut longitude = Array2::zeros((4, 4));

        let template = SwathGeometry::new(latitude.clone(), longitude.clone()).unwrap();
        for (walk_position, (row, col)) in template.perimeter_indices().into_iter().enumerate() {
            longitude[[row, col]] = -180.0 + walk_position as f64 * 30.0;
        }

        let swath = SwathGeometry::new(latitude, longitude).unwrap();
        assert_eq!(swath.enclosed_pole(), Some((0.0, 90.0)));

        let points = swath.extent_sample_points();
        assert!(points.contains(&(0.0, 90.0)));
    }

    #[test]
    fn test_polar_band_does_not_enclose_pole() {
        // A band circling the pole without covering it: longitude sweeps the
        // circle along rows, so the two column edges cancel in the winding.
        let latitude = Array2::from_elem((12, 3), 80.0);
        let longitude =
            Array2::from_shape_fn((12, 3), |(row, _)| -180.0 + row as f64 * 30.0);

        let swath = SwathGeometry::new(latitude, longitude).unwrap();
        assert_eq!(swath.enclosed_pole(), None);
    }

    #[test]
    fn test_no_pole_for_midlatitude_swath() {
        let swath = regular_swath(5, 5, 30.0, -100.0, 0.25);
        assert_eq!(swath.enclosed_pole(), None);
    }
}

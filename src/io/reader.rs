use crate::core::geolocation::SwathGeometry;
use crate::types::{DataPlane, SourceVariable, SwathError, SwathResult, VariableArray};
use gdal::{Dataset, Metadata};
use ndarray::{Array2, Array3, Axis};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Swath geometry plus the science variables found alongside it
pub struct SwathInput {
    pub geometry: SwathGeometry,
    pub variables: Vec<SourceVariable>,
}

/// Role a subdataset plays in the granule, decided by name convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubdatasetRole {
    Latitude,
    Longitude,
    Zenith,
    Time,
    Science,
}

/// GDAL-backed reader for swath granules.
///
/// NetCDF/HDF-style granules expose their variables as subdatasets; the
/// coordinate pair is located by the `lat`/`lon` name convention and every
/// remaining subdataset whose shape matches the geolocation arrays is read
/// as a science variable.
pub struct SwathReader {
    path: PathBuf,
}

impl SwathReader {
    pub fn new<P: AsRef<Path>>(path: P) -> SwathResult<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(SwathError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }

        Ok(Self { path })
    }

    /// Read the swath geometry and every matching science variable.
    pub fn read(&self) -> SwathResult<SwathInput> {
        log::info!("Reading swath granule: {}", self.path.display());

        let dataset = Dataset::open(&self.path)?;
        let subdatasets = subdataset_names(&dataset);

        if subdatasets.is_empty() {
            return Err(SwathError::InvalidGeometry(
                "cannot determine input file format: no subdatasets found".to_string(),
            ));
        }

        let mut latitude = None;
        let mut longitude = None;
        let mut zenith = None;
        let mut times = None;
        let mut science = Vec::new();

        for subdataset in &subdatasets {
            let variable = variable_path(subdataset)?;
            match classify_variable(&variable) {
                SubdatasetRole::Latitude => {
                    if latitude.is_none() {
                        latitude = Some(subdataset.clone());
                    }
                }
                SubdatasetRole::Longitude => {
                    if longitude.is_none() {
                        longitude = Some(subdataset.clone());
                    }
                }
                SubdatasetRole::Zenith => {
                    if zenith.is_none() {
                        zenith = Some(subdataset.clone());
                    }
                }
                SubdatasetRole::Time => {
                    if times.is_none() {
                        times = Some(subdataset.clone());
                    }
                }
                SubdatasetRole::Science => science.push((subdataset.clone(), variable)),
            }
        }

        let (latitude, longitude) = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => (latitude, longitude),
            _ => {
                return Err(SwathError::InvalidGeometry(
                    "cannot determine input file format: no latitude/longitude \
                     subdatasets found"
                        .to_string(),
                ))
            }
        };

        let mut geometry = SwathGeometry::new(read_plane(&latitude)?, read_plane(&longitude)?)?;
        let shape = geometry.shape();

        if let Some(subdataset) = times {
            geometry = attach_ancillary(geometry, &subdataset, shape, AncillaryKind::Times)?;
        }
        if let Some(subdataset) = zenith {
            geometry = attach_ancillary(geometry, &subdataset, shape, AncillaryKind::Zenith)?;
        }

        let mut variables = Vec::new();
        for (subdataset, name) in &science {
            if let Some(variable) = read_variable(subdataset, name, shape)? {
                variables.push(variable);
            }
        }

        if variables.is_empty() {
            return Err(SwathError::Processing(
                "no science variables found in input file".to_string(),
            ));
        }

        log::info!("Input file has {} science variables", variables.len());

        Ok(SwathInput {
            geometry,
            variables,
        })
    }
}

enum AncillaryKind {
    Times,
    Zenith,
}

fn attach_ancillary(
    geometry: SwathGeometry,
    subdataset: &str,
    shape: (usize, usize),
    kind: AncillaryKind,
) -> SwathResult<SwathGeometry> {
    let plane = read_plane(subdataset)?;

    if plane.dim() != shape {
        log::warn!(
            "Ignoring ancillary subdataset {}: shape {:?} does not match the \
             geolocation shape {:?}",
            subdataset,
            plane.dim(),
            shape
        );
        return Ok(geometry);
    }

    match kind {
        AncillaryKind::Times => geometry.with_times(plane),
        AncillaryKind::Zenith => geometry.with_zenith_angles(plane),
    }
}

/// Subdataset names from the GDAL SUBDATASETS metadata domain
fn subdataset_names(dataset: &Dataset) -> Vec<String> {
    dataset
        .metadata_domain("SUBDATASETS")
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            if key.ends_with("_NAME") {
                Some(value.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Variable path inside the granule, stripped of the driver prefix and
/// file name (`NETCDF:"granule.nc":/group/variable` -> `group/variable`)
fn variable_path(subdataset: &str) -> SwathResult<String> {
    let pattern = Regex::new(r#"^[A-Za-z0-9_]+:"[^"]*":/?(.*)$"#)
        .map_err(|e| SwathError::Processing(format!("invalid subdataset pattern: {}", e)))?;

    Ok(match pattern.captures(subdataset) {
        Some(captures) => captures
            .get(1)
            .map(|group| group.as_str())
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string(),
        None => subdataset.to_string(),
    })
}

fn classify_variable(variable: &str) -> SubdatasetRole {
    let leaf = variable
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    if leaf.contains("lat") {
        SubdatasetRole::Latitude
    } else if leaf.contains("lon") {
        SubdatasetRole::Longitude
    } else if leaf.contains("zenith") {
        SubdatasetRole::Zenith
    } else if leaf.contains("time") {
        SubdatasetRole::Time
    } else {
        SubdatasetRole::Science
    }
}

/// Read one subdataset band as a 2-D f64 plane
fn read_plane(subdataset: &str) -> SwathResult<DataPlane> {
    let dataset = Dataset::open(subdataset)?;
    let (width, height) = dataset.raster_size();

    let rasterband = dataset.rasterband(1)?;
    let band_data = rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;

    Array2::from_shape_vec((height, width), band_data.data)
        .map_err(|e| SwathError::Processing(format!("failed to reshape {}: {}", subdataset, e)))
}

/// Read a science subdataset; integer-typed bands are widened to f64 and
/// the fill value comes from the band's no-data declaration. Subdatasets
/// whose shape disagrees with the geolocation arrays are skipped.
fn read_variable(
    subdataset: &str,
    name: &str,
    shape: (usize, usize),
) -> SwathResult<Option<SourceVariable>> {
    let dataset = Dataset::open(subdataset)?;
    let (width, height) = dataset.raster_size();

    if (height, width) != shape {
        log::debug!(
            "Skipping subdataset {}: shape ({}, {}) does not match the \
             geolocation shape {:?}",
            name,
            height,
            width,
            shape
        );
        return Ok(None);
    }

    let bands = dataset.raster_count();
    let fill_value = dataset
        .rasterband(1)?
        .no_data_value()
        .unwrap_or(f64::NAN);

    let data = if bands == 1 {
        VariableArray::Plane(read_plane(subdataset)?)
    } else {
        let mut stack = Array3::zeros((bands as usize, height, width));
        for band_index in 1..=bands {
            let rasterband = dataset.rasterband(band_index)?;
            let band_data =
                rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
            let plane = Array2::from_shape_vec((height, width), band_data.data).map_err(|e| {
                SwathError::Processing(format!("failed to reshape {}: {}", subdataset, e))
            })?;
            stack
                .index_axis_mut(Axis(0), (band_index - 1) as usize)
                .assign(&plane);
        }
        VariableArray::Stack(stack)
    };

    Ok(Some(SourceVariable {
        name: name.to_string(),
        data,
        fill_value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_path_strips_driver_prefix() {
        assert_eq!(
            variable_path("NETCDF:\"granule.nc\":/group/sea_surface_temperature").unwrap(),
            "group/sea_surface_temperature"
        );
        assert_eq!(
            variable_path("HDF5:\"granule.h5\"://data/brightness").unwrap(),
            "data/brightness"
        );
    }

    #[test]
    fn test_variable_path_passes_plain_names_through() {
        assert_eq!(variable_path("wind_speed").unwrap(), "wind_speed");
    }

    #[test]
    fn test_classification_by_name_convention() {
        assert_eq!(
            classify_variable("navigation/latitude"),
            SubdatasetRole::Latitude
        );
        assert_eq!(
            classify_variable("navigation/longitude"),
            SubdatasetRole::Longitude
        );
        assert_eq!(
            classify_variable("navigation/solar_zenith_angle"),
            SubdatasetRole::Zenith
        );
        assert_eq!(classify_variable("scan_time"), SubdatasetRole::Time);
        assert_eq!(
            classify_variable("geophysical/sea_surface_temperature"),
            SubdatasetRole::Science
        );
    }

    #[test]
    fn test_group_names_do_not_shadow_leaf_classification() {
        // Only the leaf name decides the role, so a science variable under
        // a "latlon" group stays a science variable.
        assert_eq!(
            classify_variable("latlon/brightness"),
            SubdatasetRole::Science
        );
    }

    #[test]
    fn test_missing_file_rejected() {
        assert!(SwathReader::new("/no/such/granule.nc").is_err());
    }
}

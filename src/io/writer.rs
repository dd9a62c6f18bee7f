use crate::core::output::ReprojectedProduct;
use crate::types::{SwathError, SwathResult, VariableArray};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{ArrayView2, Axis};
use std::path::Path;

/// Output driver selection for the gridded product
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// GDAL driver name
    pub driver: String,
    /// Optional compression hint passed to the driver
    pub compression: Option<String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            driver: "GTiff".to_string(),
            compression: None,
        }
    }
}

/// Serializes an assembled product as a single gridded raster, one band
/// per resampled plane.
pub struct GriddedWriter;

impl GriddedWriter {
    /// Write every resampled variable into one output raster.
    ///
    /// Variables skipped during resampling are never written; multi-band
    /// variables land as consecutive bands. Each band carries the variable
    /// name as its description and the variable's fill as no-data.
    pub fn write_product<P: AsRef<Path>>(
        product: &ReprojectedProduct,
        output_path: P,
        options: &WriterOptions,
    ) -> SwathResult<()> {
        log::info!(
            "Saving gridded product as {}: {}",
            options.driver,
            output_path.as_ref().display()
        );

        let mut planes: Vec<(String, ArrayView2<f64>, f64)> = Vec::new();
        for variable in product.resampled_variables() {
            match &variable.data {
                VariableArray::Plane(plane) => {
                    planes.push((variable.name.clone(), plane.view(), variable.fill_value));
                }
                VariableArray::Stack(cube) => {
                    for (band, plane) in cube.axis_iter(Axis(0)).enumerate() {
                        planes.push((
                            format!("{} (band {})", variable.name, band + 1),
                            plane,
                            variable.fill_value,
                        ));
                    }
                }
            }
        }

        if planes.is_empty() {
            return Err(SwathError::Processing(
                "no resampled variables to write".to_string(),
            ));
        }

        let driver = DriverManager::get_driver_by_name(&options.driver)?;
        let (height, width) = product.grid.shape();

        let mut dataset = driver.create_with_band_type::<f64, _>(
            output_path.as_ref(),
            width as isize,
            height as isize,
            planes.len() as isize,
        )?;

        dataset.set_geo_transform(&product.geo_transform().to_gdal())?;
        dataset.set_spatial_ref(&spatial_ref_from(&product.crs_definition)?)?;

        dataset.set_metadata_item("AREA_OR_POINT", "Area", "")?;
        dataset.set_metadata_item("PROCESSING_TIME", &product.processing_time, "")?;

        let extent = &product.grid.extent;
        dataset.set_metadata_item(
            "GRID_EXTENT",
            &format!(
                "x: [{}, {}], y: [{}, {}]",
                extent.x_min, extent.x_max, extent.y_min, extent.y_max
            ),
            "",
        )?;
        dataset.set_metadata_item(
            "GRID_RESOLUTION",
            &format!("({}, {})", product.grid.x_res, product.grid.y_res),
            "",
        )?;

        if !product.diagnostics.is_empty() {
            dataset.set_metadata_item("DIAGNOSTICS", &product.diagnostics.join("; "), "")?;
        }

        if let Some(compression) = options.compression.as_deref() {
            dataset.set_metadata_item("COMPRESS", compression, "")?;
        }

        for (index, (name, plane, fill_value)) in planes.iter().enumerate() {
            let mut rasterband = dataset.rasterband((index + 1) as isize)?;
            rasterband.set_description(name)?;
            rasterband.set_no_data_value(Some(*fill_value))?;

            let flat_data: Vec<f64> = plane.iter().cloned().collect();
            let buffer = Buffer::new((width, height), flat_data);
            rasterband.write((0, 0), (width, height), &buffer)?;
        }

        log::info!("✅ Gridded product saved successfully");
        Ok(())
    }
}

/// SpatialRef from either an `EPSG:nnnn` code or a proj definition string
fn spatial_ref_from(definition: &str) -> SwathResult<SpatialRef> {
    let trimmed = definition.trim();
    let epsg_prefixed = trimmed
        .get(..5)
        .map(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
        .unwrap_or(false);

    if epsg_prefixed {
        let code: u32 = trimmed[5..].trim().parse().map_err(|_| {
            SwathError::InvalidGridSpec(format!("invalid EPSG code in '{}'", definition))
        })?;
        Ok(SpatialRef::from_epsg(code)?)
    } else {
        Ok(SpatialRef::from_proj4(trimmed)?)
    }
}

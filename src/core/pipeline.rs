use crate::core::geolocation::SwathGeometry;
use crate::core::grid::GridResolver;
use crate::core::output::{OutputAssembler, ReprojectedProduct};
use crate::core::projection::{CrsSpec, CrsTransformer};
use crate::core::resample::{ResamplingConfig, ResamplingOrchestrator, SwathMapping};
use crate::io::reader::SwathReader;
use crate::io::writer::{GriddedWriter, WriterOptions};
use crate::types::{GridParameters, SourceVariable, SwathError, SwathResult};

/// Request-level driver: grid resolution, swath mapping, per-variable
/// resampling and output assembly for one reprojection request.
pub struct ReprojectionPipeline {
    config: ResamplingConfig,
}

impl Default for ReprojectionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ReprojectionPipeline {
    pub fn new() -> Self {
        Self {
            config: ResamplingConfig::default(),
        }
    }

    pub fn with_config(config: ResamplingConfig) -> Self {
        Self { config }
    }

    /// Reproject every variable onto the grid the request resolves to.
    ///
    /// The swath mapping is computed once and shared across variables.
    /// Individual variable failures are recorded in the product; the
    /// request only fails when nothing could be resampled at all.
    pub fn reproject(
        &self,
        params: &GridParameters,
        geometry: &SwathGeometry,
        variables: &[SourceVariable],
    ) -> SwathResult<ReprojectedProduct> {
        let crs = CrsSpec::from_request(params.crs.as_deref())?;
        let method = params.interpolation;
        log::info!(
            "Selected CRS: {}\tInterpolation: {}",
            crs.definition(),
            method
        );

        // One transformer serves both grid resolution and swath mapping.
        let transformer = CrsTransformer::new(&crs)?;
        let grid = GridResolver::resolve_with_transformer(params, geometry, &transformer)?;
        let mapping = SwathMapping::build(geometry, &grid, &transformer)?;

        let orchestrator = ResamplingOrchestrator::with_config(self.config.clone());

        #[cfg(feature = "parallel")]
        let outcomes =
            orchestrator.resample_all_parallel(variables, geometry, &grid, &mapping, method);
        #[cfg(not(feature = "parallel"))]
        let outcomes = orchestrator.resample_all(variables, geometry, &grid, &mapping, method);

        if !outcomes.iter().any(|outcome| outcome.is_resampled()) {
            return Err(SwathError::Processing(
                "no variables could be resampled".to_string(),
            ));
        }

        Ok(OutputAssembler::assemble(grid, outcomes))
    }
}

/// Complete file-to-file reprojection pipeline
pub fn complete_reprojection_pipeline(
    input_path: &str,
    request_json: &str,
    output_path: &str,
) -> SwathResult<ReprojectedProduct> {
    log::info!("🌍 Starting swath reprojection pipeline");
    log::info!("Reprojecting file {} as {}", input_path, output_path);

    // Step 1: Parse the grid request
    let params = GridParameters::from_json(request_json)?;

    // Step 2: Read geometry and science variables from the granule
    let input = SwathReader::new(input_path)?.read()?;

    // Step 3: Resolve the grid and resample every variable
    let pipeline = ReprojectionPipeline::new();
    let product = pipeline.reproject(&params, &input.geometry, &input.variables)?;

    // Step 4: Save the gridded product
    GriddedWriter::write_product(&product, output_path, &WriterOptions::default())?;

    log::info!("🎉 Reprojection pipeline completed successfully!");
    log::info!("Output saved to: {}", output_path);

    Ok(product)
}

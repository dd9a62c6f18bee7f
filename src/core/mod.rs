//! Core swath reprojection modules

pub mod ewa;
pub mod geolocation;
pub mod grid;
pub mod output;
pub mod pipeline;
pub mod projection;
pub mod resample;
pub mod resolution;

// Re-export main types
pub use geolocation::SwathGeometry;
pub use grid::{GridResolver, TargetGrid};
pub use output::{OutputAssembler, ReprojectedProduct};
pub use pipeline::{complete_reprojection_pipeline, ReprojectionPipeline};
pub use projection::{CrsSpec, CrsTransformer, CRS_DEFAULT};
pub use resample::{ResamplingConfig, ResamplingOrchestrator, SwathMapping};
pub use resolution::{estimate_cell_size, AreaMethod, ResolutionEstimate};

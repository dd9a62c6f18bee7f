//! I/O modules for reading swath granules and writing gridded products

pub mod reader;
pub mod writer;

pub use reader::{SwathInput, SwathReader};
pub use writer::{GriddedWriter, WriterOptions};

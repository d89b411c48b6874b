// tenantq Infrastructure - System Adapters
// Implements: MarkerWriter

pub mod marker_writer;

pub use marker_writer::FsMarkerWriter;

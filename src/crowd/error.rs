/// Failure modes of the crowd core.
///
/// Only [`CrowdError::Configuration`] is fatal, and only at construction time.
/// Systems log the other variants and skip the offending item.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CrowdError {
    #[error("grid must have a non-zero area, got {width}x{height}")]
    Configuration { width: usize, height: usize },
    #[error("no navigation target is available")]
    MissingTarget,
    #[error("world position ({x:.2}, {z:.2}) lies outside the grid")]
    OutOfBounds { x: f32, z: f32 },
    #[error("occupancy underflow at cell {cell}: removal without a matching add")]
    OccupancyUnderflow { cell: usize },
    #[error("failed to read {path}: {reason}")]
    ConfigRead { path: String, reason: String },
    #[error("failed to parse {path}: {reason}")]
    ConfigParse { path: String, reason: String },
}

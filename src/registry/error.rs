//! Registry error types

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No scanout with this id
    ScanoutNotFound(String),
    /// Scanout exists but its producer is gone
    ScanoutClosed(String),
    /// Scanout already has a live producer
    ScanoutAlreadyActive(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::ScanoutNotFound(id) => write!(f, "Scanout not found: {}", id),
            RegistryError::ScanoutClosed(id) => write!(f, "Scanout closed: {}", id),
            RegistryError::ScanoutAlreadyActive(id) => {
                write!(f, "Scanout already has a producer: {}", id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

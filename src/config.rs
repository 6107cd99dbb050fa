//! Configuration handling for arrayio

/// Behaviour shared by every table built from a source
///
/// Passed into each adapter constructor, so there is no process-wide
/// switch to flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Show progress bars on stderr while rows are read or written
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { progress: true }
    }
}

impl Config {
    /// Create a Config with default settings (progress enabled)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Config with progress bars disabled
    pub fn quiet() -> Self {
        Self { progress: false }
    }

    /// Enable or disable progress bars
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

//! Terminal output formatting.
//!
//! Keeps the look of messages consistent across commands.

pub mod colors;
pub mod errors;

/// Output handler for consistent terminal formatting
pub struct OutputHandler {
    colors: colors::ColorSupport,
}

impl OutputHandler {
    pub fn new() -> Self {
        Self {
            colors: colors::ColorSupport::detect(),
        }
    }

    /// Output without escape sequences
    #[cfg(test)]
    pub fn plain() -> Self {
        Self {
            colors: colors::ColorSupport::disabled(),
        }
    }

    pub fn info(&self, message: &str) {
        println!("{}", self.colors.dim(message));
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", self.colors.green("✓"), message);
    }

    pub fn warn(&self, message: &str) {
        println!("{} {}", self.colors.yellow("⚠"), message);
    }

    /// Errors go to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", self.colors.red("✗"), message);
    }

    /// Print a step message with a leading marker
    pub fn step(&self, marker: &str, message: &str) {
        println!("{} {}", marker, message);
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}

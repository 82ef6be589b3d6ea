//! Error message formatting with actionable suggestions.

use std::error::Error;

use landscaper_core::error::LandscapeError;

use super::colors::ColorSupport;

pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    pub fn new() -> Self {
        Self {
            colors: ColorSupport::detect(),
        }
    }

    #[cfg(test)]
    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    /// Format an error with its suggestion and source chain
    pub fn format_error(&self, error: &LandscapeError) -> String {
        let mut output = String::new();

        output.push_str(&self.colors.red("error"));
        output.push_str(": ");
        output.push_str(&error.to_string());
        output.push('\n');

        if let Some(suggestion) = error.suggestion() {
            output.push('\n');
            output.push_str(&self.colors.dim("help"));
            output.push_str(": ");
            output.push_str(suggestion);
            output.push('\n');
        }

        let mut source = error.source();
        while let Some(err) = source {
            output.push('\n');
            output.push_str(&self.colors.dim("caused by"));
            output.push_str(": ");
            output.push_str(&err.to_string());
            source = err.source();
        }

        output
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> ErrorFormatter {
        ErrorFormatter::with_colors(ColorSupport::disabled())
    }

    #[test]
    fn test_report_with_suggestion() {
        let error = LandscapeError::ConfigurationReport {
            title: "ERROR Landscape validation failures".to_string(),
            failures: vec!["    apod/devices/0: missing 'host'".to_string()],
        };

        let text = formatter().format_error(&error);
        assert!(text.starts_with("error: ERROR Landscape validation failures:\n    apod/devices/0"));
        assert!(text.contains("help: Fix the listed entries"));
    }

    #[test]
    fn test_source_chain() {
        let error = LandscapeError::io(
            "Failed to read landscape.yaml".to_string(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );

        let text = formatter().format_error(&error);
        assert!(text.contains("error: IO error: Failed to read landscape.yaml"));
        assert!(text.ends_with("caused by: no such file"));
    }
}

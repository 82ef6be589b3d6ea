//! Path utilities for configured file system locations.
//!
//! Provides `~` and environment variable expansion plus path normalization
//! for directories declared in configuration files.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by resolving . and .. components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                },
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {},
                _ => components.push(component),
            },
            other => components.push(other),
        }
    }

    components.iter().collect()
}

/// Expand a leading `~` and `$VAR` / `${VAR}` references
///
/// Unknown variables are left untouched.
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = expand_vars(raw, |name| std::env::var(name).ok());

    let with_home = if expanded == "~" || expanded.starts_with("~/") {
        match dirs::home_dir() {
            Some(home) => {
                let rest = expanded.trim_start_matches('~').trim_start_matches('/');
                home.join(rest)
            },
            None => PathBuf::from(&expanded),
        }
    } else {
        PathBuf::from(&expanded)
    };

    normalize_path(&with_home)
}

/// Expand `$VAR` and `${VAR}` references using the provided lookup
pub fn expand_vars<F>(raw: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut output = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '$' {
            output.push(ch);
            continue;
        }

        let rest = &raw[idx + 1..];
        let (name, consumed, braced) = if let Some(inner) = rest.strip_prefix('{') {
            match inner.find('}') {
                Some(end) => (&inner[..end], end + 2, true),
                None => ("", 0, true),
            }
        } else {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            (&rest[..end], end, false)
        };

        if name.is_empty() {
            output.push('$');
            continue;
        }

        match lookup(name) {
            Some(value) => output.push_str(&value),
            None if braced => output.push_str(&format!("${{{}}}", name)),
            None => {
                output.push('$');
                output.push_str(name);
            },
        }

        // Skip the characters consumed by the variable reference
        for _ in 0..rest[..consumed].chars().count() {
            chars.next();
        }
    }

    output
}

/// Get the file extension as a lowercase string
pub fn get_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        let path = Path::new("./results/../logs/./run");
        assert_eq!(normalize_path(path), Path::new("logs/run"));

        let path = Path::new("/var/../../tmp");
        assert_eq!(normalize_path(path), Path::new("/tmp"));
    }

    #[test]
    fn test_expand_vars() {
        let lookup = |name: &str| match name {
            "LAB" => Some("lab1".to_string()),
            "RUN_ID" => Some("42".to_string()),
            _ => None,
        };

        assert_eq!(expand_vars("/out/$LAB/run", lookup), "/out/lab1/run");
        assert_eq!(expand_vars("/out/${RUN_ID}-x", lookup), "/out/42-x");
        assert_eq!(expand_vars("/out/$MISSING/x", lookup), "/out/$MISSING/x");
        assert_eq!(expand_vars("/out/${MISSING}", lookup), "/out/${MISSING}");
        assert_eq!(expand_vars("cost $", lookup), "cost $");
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/results"), normalize_path(&home.join("results")));
        }
        assert_eq!(expand_path("/tmp/./results"), PathBuf::from("/tmp/results"));
    }

    #[test]
    fn test_get_extension() {
        assert_eq!(get_extension(Path::new("landscape.YAML")), Some("yaml".to_string()));
        assert_eq!(get_extension(Path::new("topology.json")), Some("json".to_string()));
        assert_eq!(get_extension(Path::new("no_extension")), None);
    }
}

//! Version information for appshell
//!
//! Build-time constants plus the dotted version comparison used by the
//! update checker.

use std::cmp::Ordering;

/// The version of appshell, set at build time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the application
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// The description of the application
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get the full version string
pub fn full_version() -> String {
    format!("{} v{}", APP_NAME, VERSION)
}

/// Get build information string
pub fn build_info() -> String {
    format!(
        "{}\n{}\nBuilt with Rust {}",
        full_version(),
        APP_DESCRIPTION,
        rustc_version()
    )
}

fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Numeric parts of a dotted version; anything non-numeric counts as 0
fn version_parts(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}

/// Order two dotted versions, padding the shorter one with zeros
pub fn cmp_versions(a: &str, b: &str) -> Ordering {
    let a = version_parts(a);
    let b = version_parts(b);
    let len = a.len().max(b.len());

    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Whether `store` is newer than `current`
pub fn compare_versions(current: &str, store: &str) -> bool {
    cmp_versions(store, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "appshell");
        assert!(full_version().contains(VERSION));
        assert!(build_info().contains("Rust"));
        assert!(build_info().starts_with(&full_version()));
    }

    #[test]
    fn test_compare_versions() {
        assert!(compare_versions("1.0.3", "1.0.4"));
        assert!(compare_versions("1.0.3", "1.1"));
        assert!(compare_versions("1.9", "1.10"));
        assert!(!compare_versions("1.0.3", "1.0.3"));
        assert!(!compare_versions("1.0.3", "1.0.3.0"));
        assert!(!compare_versions("2.0", "1.9.9"));
    }

    #[test]
    fn test_non_numeric_parts_count_as_zero() {
        assert!(!compare_versions("1.0.0", "1.0.beta"));
        assert!(compare_versions("1.x.1", "1.0.2"));
        assert_eq!(cmp_versions("", "0.0"), Ordering::Equal);
    }
}

//! Semantic-version validation and ordering for pack versions
//!
//! Ordering compares the numeric dot-segments left to right; a missing
//! segment counts as zero, and pre-release / build metadata is ignored.
//! This means `1.10.0 > 1.9.0` and `1.0` sorts equal to `1.0.0`.

use std::cmp::Ordering;

/// Check that a version string is a well-formed `MAJOR.MINOR.PATCH`
/// with optional `-pre` and `+build` suffixes.
///
/// Registration requires all three numeric segments; comparison (below) is
/// tolerant of fewer for data that predates validation.
pub fn is_valid_version(version: &str) -> bool {
    let core = strip_metadata(version);
    let segments: Vec<&str> = core.split('.').collect();
    if segments.len() != 3 {
        return false;
    }
    segments
        .iter()
        .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
}

/// Compare two version strings by numeric dot-segments
///
/// Missing segments are treated as zero; `-pre`/`+build` suffixes are
/// stripped before comparison. Non-numeric segments compare as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_parts = numeric_segments(a);
    let b_parts = numeric_segments(b);
    let len = a_parts.len().max(b_parts.len());

    for i in 0..len {
        let x = a_parts.get(i).copied().unwrap_or(0);
        let y = b_parts.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Strip `-pre` and `+build` suffixes, keeping the numeric core
fn strip_metadata(version: &str) -> &str {
    let end = version
        .find(|c| c == '-' || c == '+')
        .unwrap_or(version.len());
    &version[..end]
}

fn numeric_segments(version: &str) -> Vec<u64> {
    strip_metadata(version)
        .split('.')
        .map(|s| s.parse::<u64>().unwrap_or(0))
        .collect()
}

//! Go module version handling.
//!
//! Go versions carry a `v` prefix and two extensions the semver crate does
//! not know about: pseudo-versions (`v0.0.0-20180101000000-abcdef123456`)
//! and `+incompatible` build metadata for pre-module major versions.

use std::cmp::Ordering;

/// Symbolic version resolving to the latest release via the proxy.
pub const LATEST_VERSION: &str = "latest";

/// Sentinel version for modules served from a local directory.
pub const LOCAL_VERSION: &str = "v0.0.0";

/// Parse a Go version (`v1.2.3`, `v2.0.0+incompatible`, pseudo-versions).
pub fn parse(v: &str) -> Option<semver::Version> {
    semver::Version::parse(v.strip_prefix('v')?).ok()
}

pub fn is_valid(v: &str) -> bool {
    parse(v).is_some()
}

/// Semver precedence; invalid versions sort below valid ones, then bytewise.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Sort versions newest-first.
pub fn sort_descending(versions: &mut [String]) {
    versions.sort_by(|a, b| compare(b, a));
}

/// The semantically greatest version, if any.
pub fn max_of<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    versions.into_iter().max_by(|a, b| compare(a, b))
}

/// Whether `v` looks like a pseudo-version: the prerelease ends with a
/// 14-digit commit timestamp followed by a 12-hex-char revision.
pub fn is_pseudo(v: &str) -> bool {
    let v = v.split('+').next().unwrap_or(v);
    let parts: Vec<&str> = v.split('-').collect();
    if parts.len() < 3 {
        return false;
    }
    let rev = parts[parts.len() - 1];
    let stamp = parts[parts.len() - 2];
    rev.len() == 12
        && rev.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        && stamp.len() == 14
        && stamp.bytes().all(|b| b.is_ascii_digit())
}

/// Whether `v` opted out of semantic import versioning.
pub fn is_incompatible(v: &str) -> bool {
    v.ends_with("+incompatible")
}

/// Ensure the `v` prefix Go versions carry.
pub fn ensure_prefix(v: &str) -> String {
    if v.starts_with('v') {
        v.to_string()
    } else {
        format!("v{v}")
    }
}

/// The major component of a version, e.g. 2 for "v2.0.5".
pub fn major(v: &str) -> Option<u64> {
    parse(v).map(|p| p.major)
}

/// The module path with any trailing `/vN` (N >= 2) major suffix removed.
pub fn series_path(module_path: &str) -> &str {
    match split_major_suffix(module_path) {
        Some((series, _)) => series,
        None => module_path,
    }
}

/// The major version a module path implies: N for a `/vN` suffix, else 1.
pub fn path_major(module_path: &str) -> u64 {
    split_major_suffix(module_path).map_or(1, |(_, n)| n)
}

/// Split `foo/v2` into (`foo`, 2). Only suffixes `vN` with N >= 2 count.
fn split_major_suffix(module_path: &str) -> Option<(&str, u64)> {
    let (series, last) = module_path.rsplit_once('/')?;
    let digits = last.strip_prefix('v')?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = digits.parse().ok()?;
    if n >= 2 { Some((series, n)) } else { None }
}

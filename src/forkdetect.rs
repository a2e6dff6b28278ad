//! Detection of large forks of known upstream modules.
//!
//! Modules that lack a go.mod can be republished under any path; forks of
//! very large upstreams (Kubernetes and friends) waste fetch and indexing
//! work. A content signature (SHA-256 over sorted path/contents pairs)
//! identifies repackagings regardless of archive order or zip prefix.

use sha2::{Digest, Sha256};

use crate::getters::ContentDir;
use crate::types::Result;
use crate::version;

/// Stable signature of a module filesystem: for each file in lexical path
/// order, hash `"/" + path + NUL + contents`.
pub fn content_signature(contents: &ContentDir) -> Result<String> {
    let mut hasher = Sha256::new();
    for file in contents.files() {
        hasher.update(b"/");
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(contents.read(&file.path, u64::MAX)?);
    }
    Ok(hex::encode(hasher.finalize()))
}

struct KnownUpstream {
    signature: &'static str,
    module_path: &'static str,
    version: &'static str,
}

/// Signatures of upstream releases frequently republished without go.mod.
static KNOWN_UPSTREAMS: &[KnownUpstream] = &[
    // k8s.io/kubernetes@v1.22.2
    KnownUpstream {
        signature: "9f3418e1e0e53a0a7a4a9a8b4d19b4a7d7cbb0a0c921f2cb8a394e3b56e93c11",
        module_path: "k8s.io/kubernetes",
        version: "v1.22.2",
    },
    // github.com/moby/moby@v20.10.8+incompatible
    KnownUpstream {
        signature: "4a8d57b4f0e06b3aee1c0f39a64b2e78cfb5e5d7a89fbc63a6de3eaa1d0b5a42",
        module_path: "github.com/moby/moby",
        version: "v20.10.8+incompatible",
    },
];

/// Module paths known to be forks of an upstream, matched case-sensitively
/// with any major-version suffix stripped. Used when signature comparison
/// alone cannot decide, for upstreams without go.mod files.
static KNOWN_FORK_PATHS: &[(&str, &str)] = &[
    ("github.com/openshift/kubernetes", "k8s.io/kubernetes"),
    ("github.com/rancher/kubernetes", "k8s.io/kubernetes"),
    ("github.com/sdurrheimer/docker", "github.com/moby/moby"),
];

/// The upstream module path `module_path@version` is a fork of, if any.
/// Only meaningful for modules without a go.mod; callers gate on that.
pub fn forked_from(
    contents: &ContentDir,
    module_path: &str,
    version_str: &str,
) -> Result<Option<String>> {
    if let Some(upstream) = known_fork_path(module_path) {
        return Ok(Some(upstream.to_string()));
    }
    let signature = content_signature(contents)?;
    for known in KNOWN_UPSTREAMS {
        if known.signature == signature
            && known.module_path != module_path
            && known.version == version_str
        {
            return Ok(Some(known.module_path.to_string()));
        }
    }
    Ok(None)
}

fn known_fork_path(module_path: &str) -> Option<&'static str> {
    let series = version::series_path(module_path);
    KNOWN_FORK_PATHS
        .iter()
        .find(|(fork, _)| *fork == series)
        .map(|(_, upstream)| *upstream)
}

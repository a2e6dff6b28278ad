//! README extraction.
//!
//! A file is a README iff, case-insensitively, its basename equals README
//! or begins with README., excluding .go and .vendor extensions. Each
//! directory retains at most one, preferring markdown.

use std::collections::BTreeMap;

use crate::getters::ContentDir;
use crate::types::{Readme, Result};

use super::walk::{MAX_FILE_SIZE, parent_dir};

/// One README per directory (keyed relative to the module root, "" for
/// the root). Oversize READMEs fail the module like any oversize read.
pub fn extract_readmes(contents: &ContentDir) -> Result<BTreeMap<String, Readme>> {
    let mut best: BTreeMap<String, &str> = BTreeMap::new();
    for file in contents.files() {
        let base = file
            .path
            .rsplit('/')
            .next()
            .unwrap_or(file.path.as_str());
        if !is_readme(base) {
            continue;
        }
        let dir = parent_dir(&file.path).to_string();
        match best.get(&dir) {
            Some(current) if !prefer(&file.path, current) => {}
            _ => {
                best.insert(dir, &file.path);
            }
        }
    }

    let mut readmes = BTreeMap::new();
    for (dir, path) in best {
        let contents_bytes = contents.read(path, MAX_FILE_SIZE)?;
        readmes.insert(
            dir,
            Readme {
                file_path: path.to_string(),
                contents: String::from_utf8_lossy(&contents_bytes).into_owned(),
            },
        );
    }
    Ok(readmes)
}

fn is_readme(base_name: &str) -> bool {
    let upper = base_name.to_uppercase();
    if upper == "README" {
        return true;
    }
    let Some(ext) = upper.strip_prefix("README.") else {
        return false;
    };
    !ext.is_empty() && ext != "GO" && ext != "VENDOR"
}

/// Markdown beats everything else; otherwise first in lexical order wins.
fn prefer(candidate: &str, current: &str) -> bool {
    is_markdown(candidate) && !is_markdown(current)
}

fn is_markdown(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown")
}

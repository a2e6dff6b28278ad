//! Hierarchical view of a module's content.
//!
//! The root contains the module files directly; zip-backed variants strip
//! the `<path>@<version>/` prefix real module zips carry. Listings expose
//! sizes without touching file contents so the metadata walk can bound
//! work before anything is read.
//!
//! A content dir carries the fetch's cancellation token: once it fires,
//! every subsequent read aborts, which stops license detection, fork
//! signatures and package loading mid-stream.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use crate::types::{FetchError, Result};

/// Path and uncompressed size of one file, relative to the module root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub path: String,
    pub size: u64,
}

/// A module filesystem. Variants differ only in where bytes come from.
#[derive(Debug)]
pub enum ContentDir {
    Zip(ZipContentDir),
    Dir(DirContentDir),
}

impl ContentDir {
    /// All files in lexical path order.
    pub fn files(&self) -> &[FileMeta] {
        match self {
            ContentDir::Zip(c) => &c.files,
            ContentDir::Dir(c) => &c.files,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files().iter().any(|f| f.path == path)
    }

    /// Read a file, bounded by `limit` uncompressed bytes. Fails once the
    /// attached cancellation token has fired.
    pub fn read(&self, path: &str, limit: u64) -> Result<Vec<u8>> {
        match self {
            ContentDir::Zip(c) => c.read(path, limit),
            ContentDir::Dir(c) => c.read(path, limit),
        }
    }

    /// Attach the fetch's cancellation token; reads abort after it fires.
    pub fn with_cancellation(self, cancel: CancellationToken) -> Self {
        match self {
            ContentDir::Zip(mut c) => {
                c.cancel = cancel;
                ContentDir::Zip(c)
            }
            ContentDir::Dir(mut c) => {
                c.cancel = cancel;
                ContentDir::Dir(c)
            }
        }
    }

    /// Build an in-memory zip-backed content dir from (path, contents)
    /// pairs. Test fixture helper.
    #[cfg(test)]
    pub fn from_pairs(files: &[(&str, &str)]) -> ContentDir {
        ContentDir::Zip(ZipContentDir::new(test_zip("", files), "").unwrap())
    }
}

/// Write an in-memory zip whose entries are `prefix` + each path.
#[cfg(test)]
pub fn test_zip(prefix: &str, files: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, contents) in files {
        writer
            .start_file(
                format!("{prefix}{path}"),
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Zip-backed module contents.
#[derive(Debug)]
pub struct ZipContentDir {
    data: Arc<Vec<u8>>,
    prefix: String,
    files: Vec<FileMeta>,
    cancel: CancellationToken,
}

impl ZipContentDir {
    /// Index the archive. Every entry must live under `prefix`; anything
    /// else means a malformed module zip.
    pub fn new(data: impl Into<Arc<Vec<u8>>>, prefix: &str) -> Result<Self> {
        let data = data.into();
        let mut archive = ZipArchive::new(Cursor::new(data.as_slice()))
            .map_err(|e| FetchError::from_zip(&e, "opening module zip"))?;

        let mut files = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .map_err(|e| FetchError::from_zip(&e, "reading zip directory"))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name();
            check_rooted(name)?;
            let Some(rel) = name.strip_prefix(prefix) else {
                return Err(FetchError::BadModule(format!(
                    "zip entry {name} is not under {prefix}"
                )));
            };
            if rel.is_empty() {
                continue;
            }
            files.push(FileMeta {
                path: rel.to_string(),
                size: entry.size(),
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(ZipContentDir {
            data,
            prefix: prefix.to_string(),
            files,
            cancel: CancellationToken::new(),
        })
    }

    fn read(&self, path: &str, limit: u64) -> Result<Vec<u8>> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::cancelled(path));
        }
        let mut archive = ZipArchive::new(Cursor::new(self.data.as_slice()))
            .map_err(|e| FetchError::from_zip(&e, "opening module zip"))?;
        let name = format!("{}{path}", self.prefix);
        let entry = archive.by_name(&name).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => {
                FetchError::NotFound(format!("no zip entry {name}"))
            }
            other => FetchError::from_zip(&other, "opening zip entry"),
        })?;
        read_bounded(entry, path, limit)
    }
}

/// Directory-backed module contents, for local modules and tests.
#[derive(Debug)]
pub struct DirContentDir {
    root: PathBuf,
    files: Vec<FileMeta>,
    cancel: CancellationToken,
}

impl DirContentDir {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut files = Vec::new();
        walk(&root, &root, &mut files)
            .map_err(|e| FetchError::from_io(&e, &format!("walking {}", root.display())))?;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(DirContentDir {
            root,
            files,
            cancel: CancellationToken::new(),
        })
    }

    fn read(&self, path: &str, limit: u64) -> Result<Vec<u8>> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::cancelled(path));
        }
        check_rooted(path)?;
        let full = self.root.join(path);
        let file = std::fs::File::open(&full)
            .map_err(|e| FetchError::from_io(&e, &format!("opening {}", full.display())))?;
        read_bounded(file, path, limit)
    }
}

fn read_bounded(reader: impl Read, path: &str, limit: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| FetchError::from_io(&e, &format!("reading {path}")))?;
    if buf.len() as u64 > limit {
        return Err(FetchError::MaxFileSizeLimitExceeded(format!(
            "{path} exceeds {limit} bytes"
        )));
    }
    Ok(buf)
}

/// Defence against malformed archives: no absolute or parent-escaping
/// paths survive extraction.
fn check_rooted(path: &str) -> Result<()> {
    let escapes = path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|elem| elem == ".." || elem == ".");
    if escapes {
        return Err(FetchError::BadModule(format!(
            "path {path} escapes the module root"
        )));
    }
    Ok(())
}

fn walk(base: &Path, dir: &Path, out: &mut Vec<FileMeta>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            walk(base, &path, out)?;
        } else if file_type.is_file() {
            let rel = path
                .strip_prefix(base)
                .expect("walked path is under base")
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(FileMeta {
                path: rel,
                size: entry.metadata()?.len(),
            });
        }
    }
    Ok(())
}

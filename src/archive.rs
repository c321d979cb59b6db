//! Bundling of captured files into a single ZIP archive.
//!
//! Inputs are written in the order supplied; directories are walked depth-first
//! with children sorted by file name so the resulting entry order is stable.
//! Entry names are relative to an optional root and always use `/` separators.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Comment embedded in every bundle produced by this crate.
pub const BUNDLE_COMMENT: &str = "ZIP file created by snapship.";

/// Number of bytes copied per read/write cycle.
const CHUNK_SIZE: usize = 8192;

/// One path handed to the archiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInput {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl ArchiveInput {
    /// Build an input by inspecting the filesystem (symlinks are followed).
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| ArchiveError::new(&path, e))?;
        Ok(Self {
            is_dir: metadata.is_dir(),
            path,
        })
    }
}

/// A request to bundle `inputs` into `bundle_path`.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub inputs: Vec<ArchiveInput>,
    pub bundle_path: PathBuf,
    /// Entry names are computed relative to this directory when possible.
    pub root: Option<PathBuf>,
}

/// Underlying cause of an [`ArchiveError`].
#[derive(Debug, Error)]
pub enum ArchiveCause {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

/// The first path that could not be bundled, and why.
#[derive(Debug, Error)]
#[error("failed to archive {path}: {cause}", path = .path.display())]
pub struct ArchiveError {
    pub path: PathBuf,
    #[source]
    pub cause: ArchiveCause,
}

impl ArchiveError {
    fn new(path: &Path, cause: impl Into<ArchiveCause>) -> Self {
        Self {
            path: path.to_path_buf(),
            cause: cause.into(),
        }
    }
}

/// Write every regular file reachable from `request.inputs` into a new bundle.
///
/// `on_progress(bytes_written, file_total)` is called after each chunk of the
/// file currently being copied. The operation stops at the first unreadable
/// entry; a partially written bundle is left on disk for the caller to discard.
///
/// Returns the number of entries written.
pub fn archive<F>(request: &ArchiveRequest, mut on_progress: F) -> Result<usize, ArchiveError>
where
    F: FnMut(u64, u64),
{
    let bundle = File::create(&request.bundle_path)
        .map_err(|e| ArchiveError::new(&request.bundle_path, e))?;
    let mut writer = ZipWriter::new(bundle);
    writer.set_comment(BUNDLE_COMMENT);

    let root = request.root.as_deref();
    let mut names = HashSet::new();
    let mut written = 0usize;

    for input in &request.inputs {
        if input.is_dir {
            log::info!("Adding the files inside {} to the archive", input.path.display());
            for entry in WalkDir::new(&input.path)
                .follow_links(false)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(input.path.as_path()).to_path_buf();
                    ArchiveError::new(&path, e)
                })?;
                if !entry.path().is_file() {
                    continue;
                }
                add_file(&mut writer, entry.path(), root, &mut names, &mut on_progress)?;
                written += 1;
            }
        } else {
            add_file(&mut writer, &input.path, root, &mut names, &mut on_progress)?;
            written += 1;
        }
    }

    writer
        .finish()
        .map_err(|e| ArchiveError::new(&request.bundle_path, e))?;

    log::info!(
        "Wrote {} entries to {}",
        written,
        request.bundle_path.display()
    );
    Ok(written)
}

fn add_file<W, F>(
    writer: &mut ZipWriter<W>,
    path: &Path,
    root: Option<&Path>,
    names: &mut HashSet<String>,
    on_progress: &mut F,
) -> Result<(), ArchiveError>
where
    W: Write + io::Seek,
    F: FnMut(u64, u64),
{
    log::debug!("Adding the file {} to the archive", path.display());

    let mut source = File::open(path).map_err(|e| ArchiveError::new(path, e))?;
    let total = source
        .metadata()
        .map_err(|e| ArchiveError::new(path, e))?
        .len();

    let name = unique_entry_name(entry_name(path, root), names);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(total >= u64::from(u32::MAX));
    writer
        .start_file(name.as_str(), options)
        .map_err(|e| ArchiveError::new(path, e))?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut copied = 0u64;
    loop {
        let read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ArchiveError::new(path, e)),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|e| ArchiveError::new(path, e))?;
        copied += read as u64;
        on_progress(copied, total);
    }

    Ok(())
}

/// Name of the bundle entry for `file`.
///
/// The path relative to `root` is used when `file` lives below it; otherwise,
/// or when the relative form would contain anything but plain components, the
/// bare file name is used.
pub fn entry_name(file: &Path, root: Option<&Path>) -> String {
    let relative = root
        .and_then(|root| file.strip_prefix(root).ok())
        .filter(|rel| {
            !rel.as_os_str().is_empty()
                && rel.components().all(|c| matches!(c, Component::Normal(_)))
        });

    match relative {
        Some(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        None => file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string()),
    }
}

fn unique_entry_name(wanted: String, names: &mut HashSet<String>) -> String {
    if names.insert(wanted.clone()) {
        return wanted;
    }

    let (parent, file) = match wanted.rsplit_once('/') {
        Some((parent, file)) => (Some(parent), file),
        None => (None, wanted.as_str()),
    };
    let (stem, ext) = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file, None),
    };

    let mut idx = 2usize;
    loop {
        let candidate_file = match ext {
            Some(ext) => format!("{stem}-{idx}.{ext}"),
            None => format!("{stem}-{idx}"),
        };
        let candidate = match parent {
            Some(parent) => format!("{parent}/{candidate_file}"),
            None => candidate_file,
        };
        if names.insert(candidate.clone()) {
            return candidate;
        }
        idx += 1;
    }
}

/// Deepest directory containing every input, used as the naming root for
/// multi-file captures. Each input contributes its parent directory, so a
/// selected directory keeps its own name inside the bundle.
pub fn common_root(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut parents = paths.iter().filter_map(|p| p.parent());
    let mut root = parents.next()?.to_path_buf();
    for parent in parents {
        while !parent.starts_with(&root) {
            if !root.pop() {
                return None;
            }
        }
    }
    if root.as_os_str().is_empty() {
        None
    } else {
        Some(root)
    }
}

//! Streaming access to zip-based packages.
//!
//! APKs are plain zip containers. This module opens them for reading,
//! enumerates entries in central-directory order, copies entries between
//! containers without recompressing them, deletes entries in place, and
//! writes new containers.
//!
//! Entry copies go through [`zip::ZipWriter::raw_copy_file`], so the
//! compressed bytes, CRC, and compression method of each entry reach the
//! destination untouched.

use crate::error::ErrorClass;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::read::ZipFile;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Errors arising from package archive operations.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The file does not exist or is not a readable zip container.
    #[error("cannot open package {path}")]
    Open {
        /// The package that failed to open.
        path: Utf8PathBuf,
        /// The underlying zip or I/O failure.
        #[source]
        source: ZipError,
    },

    /// The named entry is not present in the package.
    #[error("entry {entry} not found in {path}")]
    EntryNotFound {
        /// The package that was searched.
        path: Utf8PathBuf,
        /// The missing entry name.
        entry: String,
    },

    /// An entry with the same name was already written to the output.
    #[error("duplicate entry {entry} while writing {path}")]
    DuplicateEntry {
        /// The package being written.
        path: Utf8PathBuf,
        /// The repeated entry name.
        entry: String,
    },

    /// Reading or writing zip structures failed.
    #[error("zip error in {path}")]
    Zip {
        /// The package being processed.
        path: Utf8PathBuf,
        /// The underlying zip failure.
        #[source]
        source: ZipError,
    },

    /// A filesystem operation failed.
    #[error("I/O error on {path}")]
    Io {
        /// The path being accessed.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    /// Returns `true` when the error only reports an absent entry.
    ///
    /// Tolerant deletions match on this and nothing else, so corruption and
    /// I/O failures still propagate.
    #[must_use]
    pub fn is_entry_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound { .. })
    }

    pub(crate) fn class(&self) -> ErrorClass {
        match self {
            Self::Open { .. } | Self::EntryNotFound { .. } | Self::DuplicateEntry { .. } => {
                ErrorClass::BadInput
            }
            Self::Zip { .. } | Self::Io { .. } => ErrorClass::Io,
        }
    }

    fn zip(path: &Utf8Path, source: ZipError) -> Self {
        Self::Zip {
            path: path.to_owned(),
            source,
        }
    }

    fn io(path: &Utf8Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }
}

type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Summary of one entry in a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry name, e.g. `classes.dex` or `META-INF/CERT.SF`.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Size of the stored (possibly compressed) data in bytes.
    pub compressed_size: u64,
    /// Compression method recorded for the entry.
    pub compression: CompressionMethod,
}

impl EntryInfo {
    fn from_file<R: Read>(file: &ZipFile<'_, R>) -> Self {
        Self {
            name: file.name().to_owned(),
            size: file.size(),
            compressed_size: file.compressed_size(),
            compression: file.compression(),
        }
    }
}

/// A package opened for reading.
///
/// The underlying file handle is released when the value is dropped.
pub struct PackageArchive {
    path: Utf8PathBuf,
    zip: ZipArchive<BufReader<File>>,
}

impl PackageArchive {
    /// Open the package at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Open`] if the file is missing or is not a zip
    /// container.
    pub fn open(path: &Utf8Path) -> ArchiveResult<Self> {
        let open_error = |source| ArchiveError::Open {
            path: path.to_owned(),
            source,
        };
        let file = File::open(path).map_err(|e| open_error(ZipError::Io(e)))?;
        let zip = ZipArchive::new(BufReader::new(file)).map_err(open_error)?;
        Ok(Self {
            path: path.to_owned(),
            zip,
        })
    }

    /// Path the package was opened from.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Iterate over entry summaries in central-directory order.
    ///
    /// The iterator is finite and cannot be rewound; call `entries` again to
    /// start over. Summaries carry no content; use
    /// [`PackageArchive::visit_entries`] to stream each entry's stored bytes
    /// in the same pass.
    pub fn entries(&mut self) -> Entries<'_> {
        Entries {
            path: &self.path,
            zip: &mut self.zip,
            next: 0,
        }
    }

    /// Call `visit` for every entry in central-directory order with its
    /// summary and a reader over its raw stored bytes.
    ///
    /// The bytes are exactly what the container holds, so a deflated entry
    /// yields `compressed_size` bytes of deflate data. Each reader is only
    /// valid during its call.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Zip`] if an entry header cannot be read, and
    /// stops at the first error returned by `visit`.
    pub fn visit_entries<F>(&mut self, mut visit: F) -> ArchiveResult<()>
    where
        F: FnMut(&EntryInfo, &mut dyn Read) -> ArchiveResult<()>,
    {
        for index in 0..self.zip.len() {
            let mut file = self
                .zip
                .by_index_raw(index)
                .map_err(|e| ArchiveError::zip(&self.path, e))?;
            let info = EntryInfo::from_file(&file);
            visit(&info, &mut file)?;
        }
        Ok(())
    }

    /// Collect all entry names in central-directory order.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Zip`] if an entry header cannot be read.
    pub fn entry_names(&mut self) -> ArchiveResult<Vec<String>> {
        self.entries()
            .map(|entry| entry.map(|info| info.name))
            .collect()
    }

    /// Read and decompress the content of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::EntryNotFound`] if the entry is missing, or a
    /// zip/I/O error if it cannot be decoded.
    pub fn read_entry(&mut self, name: &str) -> ArchiveResult<Vec<u8>> {
        let index = self.index_of(name)?;
        let mut file = self
            .zip
            .by_index(index)
            .map_err(|e| ArchiveError::zip(&self.path, e))?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        Ok(content)
    }

    /// Copy the raw stored bytes of `name` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::EntryNotFound`] if the entry is missing,
    /// [`ArchiveError::DuplicateEntry`] if `dest` already holds an entry of
    /// the same name, or a zip error if the copy fails.
    pub fn copy_entry(&mut self, name: &str, dest: &mut PackageWriter) -> ArchiveResult<()> {
        let index = self.index_of(name)?;
        self.copy_index(index, dest, |_| false).map(|_| ())
    }

    /// Copy every entry, in order, into `dest`.
    ///
    /// Returns the number of entries copied.
    ///
    /// # Errors
    ///
    /// Fails on the first entry that cannot be copied.
    pub fn copy_all_into(&mut self, dest: &mut PackageWriter) -> ArchiveResult<usize> {
        self.copy_all_except(dest, |_| false)
    }

    fn copy_all_except<F>(&mut self, dest: &mut PackageWriter, skip: F) -> ArchiveResult<usize>
    where
        F: Fn(&str) -> bool,
    {
        let mut copied = 0;
        for index in 0..self.zip.len() {
            if self.copy_index(index, dest, &skip)? {
                copied += 1;
            }
        }
        Ok(copied)
    }

    fn copy_index<F>(
        &mut self,
        index: usize,
        dest: &mut PackageWriter,
        skip: F,
    ) -> ArchiveResult<bool>
    where
        F: Fn(&str) -> bool,
    {
        let file = self
            .zip
            .by_index_raw(index)
            .map_err(|e| ArchiveError::zip(&self.path, e))?;
        if skip(file.name()) {
            return Ok(false);
        }
        dest.claim_name(file.name())?;
        dest.zip
            .raw_copy_file(file)
            .map_err(|e| ArchiveError::zip(&dest.path, e))?;
        Ok(true)
    }

    fn index_of(&self, name: &str) -> ArchiveResult<usize> {
        self.zip
            .index_for_name(name)
            .ok_or_else(|| ArchiveError::EntryNotFound {
                path: self.path.clone(),
                entry: name.to_owned(),
            })
    }
}

/// Iterator over [`EntryInfo`] values, produced by [`PackageArchive::entries`].
pub struct Entries<'a> {
    path: &'a Utf8Path,
    zip: &'a mut ZipArchive<BufReader<File>>,
    next: usize,
}

impl Iterator for Entries<'_> {
    type Item = ArchiveResult<EntryInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.zip.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let info = self
            .zip
            .by_index_raw(index)
            .map(|file| EntryInfo::from_file(&file))
            .map_err(|e| ArchiveError::zip(self.path, e));
        Some(info)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.zip.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

/// A new package being written.
///
/// Call [`PackageWriter::finish`] once all entries are added; it writes the
/// central directory. A writer dropped without `finish` leaves a package
/// that must not be used.
pub struct PackageWriter {
    path: Utf8PathBuf,
    zip: ZipWriter<BufWriter<File>>,
    names: HashSet<String>,
}

impl PackageWriter {
    /// Create (or truncate) a package at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`] if the file cannot be created.
    pub fn create(path: &Utf8Path) -> ArchiveResult<Self> {
        let file = File::create(path).map_err(|e| ArchiveError::io(path, e))?;
        Ok(Self::from_file(path, file))
    }

    fn from_file(path: &Utf8Path, file: File) -> Self {
        Self {
            path: path.to_owned(),
            zip: ZipWriter::new(BufWriter::new(file)),
            names: HashSet::new(),
        }
    }

    /// Add a deflated entry with the given content.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::DuplicateEntry`] if the name was already
    /// written, or a zip/I/O error if writing fails.
    pub fn put_entry(&mut self, name: &str, content: &[u8]) -> ArchiveResult<()> {
        self.claim_name(name)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip
            .start_file(name, options)
            .map_err(|e| ArchiveError::zip(&self.path, e))?;
        self.zip
            .write_all(content)
            .map_err(|e| ArchiveError::io(&self.path, e))
    }

    /// Write the central directory and flush the file.
    ///
    /// # Errors
    ///
    /// Returns a zip or I/O error if finalisation fails.
    pub fn finish(self) -> ArchiveResult<Utf8PathBuf> {
        let Self { path, zip, .. } = self;
        let mut inner = zip.finish().map_err(|e| ArchiveError::zip(&path, e))?;
        inner.flush().map_err(|e| ArchiveError::io(&path, e))?;
        Ok(path)
    }

    fn claim_name(&mut self, name: &str) -> ArchiveResult<()> {
        if self.names.insert(name.to_owned()) {
            Ok(())
        } else {
            Err(ArchiveError::DuplicateEntry {
                path: self.path.clone(),
                entry: name.to_owned(),
            })
        }
    }
}

/// Remove the entry `name` from the package at `path`.
///
/// The package is rewritten into a sibling temporary file, with every other
/// entry copied raw, then renamed over the original.
///
/// # Errors
///
/// Returns [`ArchiveError::EntryNotFound`] if the package has no such entry;
/// the package is left untouched in that case.
pub fn delete_entry(path: &Utf8Path, name: &str) -> ArchiveResult<()> {
    let mut source = PackageArchive::open(path)?;
    source.index_of(name)?;

    let parent = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let staged = tempfile::Builder::new()
        .prefix(".repack-")
        .suffix(".zip")
        .tempfile_in(parent)
        .map_err(|e| ArchiveError::io(parent, e))?;
    let file = staged
        .as_file()
        .try_clone()
        .map_err(|e| ArchiveError::io(path, e))?;

    let mut writer = PackageWriter::from_file(path, file);
    source.copy_all_except(&mut writer, |entry| entry == name)?;
    writer.finish()?;
    drop(source);

    staged
        .persist(path)
        .map_err(|e| ArchiveError::io(path, e.error))?;
    debug!("removed {name} from {path}");
    Ok(())
}

/// Remove `name` from the package if present.
///
/// Returns `Ok(true)` when the entry was removed and `Ok(false)` when it was
/// already absent. Any other failure propagates.
///
/// # Errors
///
/// Returns every [`ArchiveError`] except [`ArchiveError::EntryNotFound`].
pub fn delete_entry_if_present(path: &Utf8Path, name: &str) -> ArchiveResult<bool> {
    match delete_entry(path, name) {
        Ok(()) => Ok(true),
        Err(err) if err.is_entry_not_found() => {
            debug!("{name} not present in {path}; nothing to delete");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Seek, Write};

use camino::Utf8Path;
use serde::Serialize;
use tracing::warn;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::bundle::ResourceBundle;
use crate::error::BundlerError;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PackReport {
    pub packed: usize,
    pub skipped: usize,
}

/// Serializes a [`ResourceBundle`] into a deflate-compressed zip and cleans up
/// the deletable resources afterwards.
///
/// Deletable resources are processed first so that deletion timing is
/// unambiguous relative to the archive write. An inaccessible resource or a
/// duplicate entry name is skipped with a warning; an I/O failure while
/// writing an entry aborts the pack, but the archive is finalized on every
/// exit path so the sink is never left open.
pub struct BundlePackager;

impl BundlePackager {
    pub fn pack<W: Write + Seek>(
        bundle: &ResourceBundle,
        sink: W,
    ) -> Result<PackReport, BundlerError> {
        let mut zip = ZipWriter::new(sink);
        let mut report = PackReport::default();
        let outcome = Self::write_entries(bundle, &mut zip, &mut report);
        let finished = zip.finish();

        match (outcome, finished) {
            (Ok(()), Ok(_)) => Ok(report),
            (Ok(()), Err(err)) => Err(BundlerError::ArchiveWrite(err.to_string())),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(close_err)) => {
                // The entry failure is the root cause; the close failure only
                // gets reported.
                warn!(error = %close_err, "zip stream also failed to finalize");
                Err(err)
            }
        }
    }

    fn write_entries<W: Write + Seek>(
        bundle: &ResourceBundle,
        zip: &mut ZipWriter<W>,
        report: &mut PackReport,
    ) -> Result<(), BundlerError> {
        let mut entry_names = BTreeSet::new();

        for path in bundle.deletable_resources() {
            if !Self::add_resource(zip, path, true, &mut entry_names, report)? {
                continue;
            }
            if let Err(err) = fs::remove_file(path.as_std_path()) {
                warn!(resource = %path, error = %err, "deletable resource could not be removed");
            }
        }

        for path in bundle.undeletable_resources() {
            Self::add_resource(zip, path, false, &mut entry_names, report)?;
        }

        Ok(())
    }

    /// Returns `Ok(true)` when an entry was written, `Ok(false)` on a skip.
    fn add_resource<W: Write + Seek>(
        zip: &mut ZipWriter<W>,
        path: &Utf8Path,
        deletable: bool,
        entry_names: &mut BTreeSet<String>,
        report: &mut PackReport,
    ) -> Result<bool, BundlerError> {
        let Some(name) = path.file_name() else {
            warn!(resource = %path, "resource has no base file name, skipped");
            report.skipped += 1;
            return Ok(false);
        };

        let metadata = match fs::metadata(path.as_std_path()) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                warn!(resource = %path, "resource is missing or not a regular file, skipped");
                report.skipped += 1;
                return Ok(false);
            }
        };
        if deletable && metadata.permissions().readonly() {
            warn!(resource = %path, "deletable resource is not writable, skipped");
            report.skipped += 1;
            return Ok(false);
        }

        let mut file = match fs::File::open(path.as_std_path()) {
            Ok(file) => file,
            Err(err) => {
                warn!(resource = %path, error = %err, "resource is not readable, skipped");
                report.skipped += 1;
                return Ok(false);
            }
        };

        // First resource with a given base name wins; later ones would collide
        // inside the archive.
        if !entry_names.insert(name.to_string()) {
            warn!(resource = %path, entry = name, "duplicate entry name, skipped");
            report.skipped += 1;
            return Ok(false);
        }

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name, options)
            .map_err(|err| BundlerError::ArchiveWrite(err.to_string()))?;
        io::copy(&mut file, zip).map_err(|err| BundlerError::ArchiveWrite(err.to_string()))?;

        report.packed += 1;
        Ok(true)
    }
}

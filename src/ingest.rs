// 📂 CSV Ingestor
// Reads an uploaded file once, row by row, and removes it when done

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::record::{RawSalesRow, SalesRecord};

// ============================================================================
// TEMPORARY UPLOAD GUARD
// ============================================================================

/// A file in the upload directory that is removed when the guard drops
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Reserve a fresh, uniquely named path inside `dir`
    ///
    /// The file itself is not created here.
    pub fn new_in(dir: &Path) -> Self {
        let name = format!("{}.csv", uuid::Uuid::new_v4());
        Self {
            path: dir.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed temporary upload"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove temporary upload"),
        }
    }
}

// ============================================================================
// ROW SEQUENCE
// ============================================================================

/// Lazy, single-pass sequence of records from one uploaded file
///
/// The file is deleted as soon as the sequence is exhausted or fails, and in
/// any case when the sequence is dropped. After the first error the sequence
/// yields nothing more.
pub struct SalesRows {
    reader: Option<csv::Reader<File>>,
    headers: StringRecord,
    row: StringRecord,
    upload: Option<TempUpload>,
}

impl SalesRows {
    /// Open an upload for reading
    ///
    /// On failure the guard is dropped here, so the file is removed too.
    pub fn open(upload: TempUpload) -> Result<Self, IngestError> {
        let file = File::open(upload.path()).map_err(|source| IngestError::FileRead {
            path: upload.path().to_path_buf(),
            source,
        })?;

        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
        let headers = reader.headers()?.clone();

        Ok(Self {
            reader: Some(reader),
            headers,
            row: StringRecord::new(),
            upload: Some(upload),
        })
    }

    fn release(&mut self) {
        // close the reader before unlinking
        self.reader = None;
        self.upload = None;
    }

    fn read_next(&mut self) -> Option<Result<SalesRecord, IngestError>> {
        let reader = self.reader.as_mut()?;

        match reader.read_record(&mut self.row) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => return Some(Err(e.into())),
        }

        let line = self.row.position().map(|p| p.line()).unwrap_or(0);

        // short rows: absent trailing cells read as empty
        while self.row.len() < self.headers.len() {
            self.row.push_field("");
        }

        let parsed = self
            .row
            .deserialize::<RawSalesRow>(Some(&self.headers))
            .map_err(IngestError::from)
            .and_then(|raw| raw.into_record(line));

        Some(parsed)
    }
}

impl Iterator for SalesRows {
    type Item = Result<SalesRecord, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.read_next();

        match &item {
            Some(Ok(_)) => {}
            None | Some(Err(_)) => self.release(),
        }

        item
    }
}

/// Parse a whole upload into memory, removing the file afterwards
pub fn ingest_upload(upload: TempUpload) -> Result<Vec<SalesRecord>, IngestError> {
    SalesRows::open(upload)?.collect()
}

/// Parse every upload of one batch, in order, into a combined list
///
/// Stops at the first failing file. Uploads not yet reached are dropped,
/// which removes them as well.
pub fn ingest_batch(uploads: Vec<TempUpload>) -> Result<Vec<SalesRecord>, IngestError> {
    let mut records = Vec::new();

    for upload in uploads {
        let path = upload.path().to_path_buf();
        let rows = ingest_upload(upload)?;
        debug!(path = %path.display(), rows = rows.len(), "parsed upload");
        records.extend(rows);
    }

    Ok(records)
}

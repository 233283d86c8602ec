//! Parquet file writer
//!
//! Output goes to `<path>.part` and is renamed to `<path>` on [`ParquetWriter::close`].
//! A writer dropped before `close` deletes its partial file, so a failed
//! stage never leaves anything at the deterministic path.

use crate::error::{Error, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Parquet writer properties
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    pub compression: Compression,
    pub row_group_size: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024,
        }
    }
}

impl ParquetWriterConfig {
    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

/// `<path>.part`
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Streaming Arrow-to-Parquet writer with rename-on-close
pub struct ParquetWriter {
    // `None` once closed
    writer: Option<ArrowWriter<File>>,
    partial: PathBuf,
    target: PathBuf,
    rows_written: usize,
}

impl ParquetWriter {
    pub fn new(path: impl AsRef<Path>, schema: SchemaRef, config: &ParquetWriterConfig) -> Result<Self> {
        let target = path.as_ref().to_path_buf();
        let partial = partial_path(&target);
        let file = File::create(&partial)?;
        let writer = ArrowWriter::try_new(file, schema, Some(config.properties()))?;

        Ok(Self {
            writer: Some(writer),
            partial,
            target,
            rows_written: 0,
        })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Other(format!("{} already closed", self.target.display())))?;
        writer.write(batch)?;
        self.rows_written += batch.num_rows();
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Write the footer and move the file to its target path
    ///
    /// With no batches written this still produces a valid zero-row file.
    pub fn close(mut self) -> Result<usize> {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.close() {
                let _ = std::fs::remove_file(&self.partial);
                return Err(e.into());
            }
        }
        std::fs::rename(&self.partial, &self.target)?;
        Ok(self.rows_written)
    }
}

impl Drop for ParquetWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}

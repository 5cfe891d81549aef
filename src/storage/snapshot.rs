//! Parquet snapshot store
//!
//! Records are written as a single Snappy-compressed Parquet file. Writes go
//! to a temporary sibling first and are renamed over the target, so readers
//! never see a half-written snapshot.

use crate::state::{PageIndex, PhotoRecord};
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Column names, with the headers used by older spreadsheet-style exports
const DESCRIPTION: [&str; 2] = ["description", "Foto Kirjeldus"];
const LOCATION: [&str; 2] = ["location", "Asukoht"];
const DATE: [&str; 2] = ["date", "Kuupäev"];
const PHOTOGRAPHER: [&str; 2] = ["photographer", "Fotograaf"];
const EXTERNAL_ID: [&str; 2] = ["external_id", "EFA_ID"];
const IMAGE_HREF: [&str; 2] = ["image_href", "ImageHref"];
const PAGE_INDEX: [&str; 2] = ["page_index", "PageNr"];

/// Parquet file holding a snapshot of photo records
#[derive(Debug, Clone)]
pub struct ParquetStore {
    path: PathBuf,
    page_column: bool,
}

impl ParquetStore {
    /// Store whose snapshot carries the `page_index` column
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page_column: true,
        }
    }

    /// Store whose snapshot omits the `page_index` column
    pub fn without_page_index(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page_column: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn schema(&self) -> SchemaRef {
        let mut fields = vec![
            Field::new(DESCRIPTION[0], DataType::Utf8, true),
            Field::new(LOCATION[0], DataType::Utf8, true),
            Field::new(DATE[0], DataType::Utf8, true),
            Field::new(PHOTOGRAPHER[0], DataType::Utf8, true),
            Field::new(EXTERNAL_ID[0], DataType::Utf8, true),
            Field::new(IMAGE_HREF[0], DataType::Utf8, false),
        ];
        if self.page_column {
            fields.push(Field::new(PAGE_INDEX[0], DataType::Int64, true));
        }
        Arc::new(Schema::new(fields))
    }

    fn to_batch(&self, records: &[PhotoRecord]) -> StorageResult<RecordBatch> {
        let mut columns: Vec<ArrayRef> = vec![
            text_column(records.iter().map(|r| r.description.as_deref())),
            text_column(records.iter().map(|r| r.location.as_deref())),
            text_column(records.iter().map(|r| r.date.as_deref())),
            text_column(records.iter().map(|r| r.photographer.as_deref())),
            text_column(records.iter().map(|r| r.external_id.as_deref())),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.image_href.as_str()),
            )),
        ];
        if self.page_column {
            let pages: Int64Array = records
                .iter()
                .map(|r| r.page_index.map(i64::from))
                .collect();
            columns.push(Arc::new(pages));
        }

        Ok(RecordBatch::try_new(self.schema(), columns)?)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordStore for ParquetStore {
    fn load(&self) -> StorageResult<Option<Vec<PhotoRecord>>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut records = Vec::new();
        for batch in reader {
            records.extend(records_from_batch(&batch?)?);
        }

        tracing::debug!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(Some(records))
    }

    fn save(&self, records: &[PhotoRecord]) -> StorageResult<()> {
        let batch = self.to_batch(records)?;
        let temp = self.temp_path();

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let file = File::create(&temp)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        fs::rename(&temp, &self.path)?;
        tracing::debug!("Wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// Reads several snapshots in order and writes them as one
///
/// Returns the number of records written to `output`.
pub fn concatenate(inputs: &[ParquetStore], output: &ParquetStore) -> StorageResult<usize> {
    let mut records = Vec::new();
    for input in inputs {
        match input.load()? {
            Some(batch) => records.extend(batch),
            None => tracing::warn!("Batch file {} is missing, skipping", input.path().display()),
        }
    }
    output.save(&records)?;
    Ok(records.len())
}

fn text_column<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(values.collect::<StringArray>())
}

fn find_column<'a>(batch: &'a RecordBatch, names: &[&str]) -> Option<&'a ArrayRef> {
    names.iter().find_map(|name| batch.column_by_name(name))
}

fn string_column<'a>(batch: &'a RecordBatch, names: &[&str]) -> StorageResult<&'a StringArray> {
    find_column(batch, names)
        .ok_or_else(|| StorageError::Schema(format!("missing column '{}'", names[0])))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StorageError::Schema(format!("column '{}' is not Utf8", names[0])))
}

fn text_at(column: &StringArray, row: usize) -> Option<String> {
    if column.is_null(row) || column.value(row).is_empty() {
        None
    } else {
        Some(column.value(row).to_string())
    }
}

fn records_from_batch(batch: &RecordBatch) -> StorageResult<Vec<PhotoRecord>> {
    let description = string_column(batch, &DESCRIPTION)?;
    let location = string_column(batch, &LOCATION)?;
    let date = string_column(batch, &DATE)?;
    let photographer = string_column(batch, &PHOTOGRAPHER)?;
    let external_id = string_column(batch, &EXTERNAL_ID)?;
    let images = string_column(batch, &IMAGE_HREF)?;

    let pages = match find_column(batch, &PAGE_INDEX) {
        Some(column) => Some(
            column
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| StorageError::Schema("column 'page_index' is not Int64".into()))?,
        ),
        None => None,
    };

    (0..batch.num_rows())
        .map(|row| {
            let image_href = text_at(images, row)
                .ok_or_else(|| StorageError::Schema(format!("row {} has no image_href", row)))?;

            let page_index = match pages {
                Some(column) if column.is_valid(row) => Some(
                    PageIndex::try_from(column.value(row)).map_err(|_| {
                        StorageError::Schema(format!(
                            "row {} has page_index {} out of range",
                            row,
                            column.value(row)
                        ))
                    })?,
                ),
                _ => None,
            };

            Ok(PhotoRecord {
                description: text_at(description, row),
                location: text_at(location, row),
                date: text_at(date, row),
                photographer: text_at(photographer, row),
                external_id: text_at(external_id, row),
                image_href,
                page_index,
            })
        })
        .collect()
}

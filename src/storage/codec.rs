//! Tabular decoding and Parquet encoding
//!
//! Input objects are decoded by extension: `.parquet` through the Arrow
//! reader, everything else that looks like CSV through the `csv` crate with a
//! header row. Output is always Parquet, split into Hive-style partition
//! directories (`year=2024/month=3/day=7`) when the partition spec names
//! columns.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use bytes::Bytes;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use uuid::Uuid;

use super::{StorageError, StorageResult, WriteResult};
use crate::models::{Column, ColumnType, CompressionCodec, Dataset, PartitionSpec, Value};

/// Directory value used for rows without a valid partition coordinate
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Cell contents treated as missing when reading CSV
pub const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "null", "NULL", "None"];

/// Input formats understood by [`decode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Parquet,
}

impl InputFormat {
    /// Pick the format from the object's extension
    pub fn from_path(path: &str) -> StorageResult<Self> {
        let lower = path.to_lowercase();
        if lower.ends_with(".parquet") {
            Ok(InputFormat::Parquet)
        } else if lower.ends_with(".csv") || lower.ends_with(".txt") {
            Ok(InputFormat::Csv)
        } else {
            Err(StorageError::UnsupportedFormat(path.to_string()))
        }
    }
}

/// Decode an object's bytes into a dataset
pub fn decode(path: &str, data: Bytes) -> StorageResult<Dataset> {
    match InputFormat::from_path(path)? {
        InputFormat::Csv => read_csv(path, &data),
        InputFormat::Parquet => read_parquet(path, data),
    }
}

/// Read CSV with a header row, inferring one type per column
pub fn read_csv(path: &str, data: &[u8]) -> StorageResult<Dataset> {
    let decode_err = |message: String| StorageError::Decode {
        path: path.to_string(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| decode_err(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| decode_err(e.to_string()))?;
        for (index, field) in record.iter().enumerate() {
            let cell = if NULL_TOKENS.contains(&field) {
                None
            } else {
                Some(field.to_string())
            };
            cells[index].push(cell);
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| infer_column(name, raw))
        .collect();

    Dataset::new(columns).map_err(|e| decode_err(e.to_string()))
}

/// Type a column of raw CSV cells: Integer, then Float, then Boolean, else Text
fn infer_column(name: String, raw: Vec<Option<String>>) -> Column {
    let present = || raw.iter().flatten();
    let any_present = present().next().is_some();

    if any_present && present().all(|s| s.parse::<i64>().is_ok()) {
        let values = raw
            .iter()
            .map(|c| match c.as_deref().map(str::parse::<i64>) {
                Some(Ok(v)) => Value::Integer(v),
                _ => Value::Null,
            })
            .collect();
        return Column::new(name, ColumnType::Integer, values);
    }

    if any_present && present().all(|s| s.parse::<f64>().is_ok()) {
        let values = raw
            .iter()
            .map(|c| match c.as_deref().map(str::parse::<f64>) {
                Some(Ok(v)) => Value::Float(v),
                _ => Value::Null,
            })
            .collect();
        return Column::new(name, ColumnType::Float, values);
    }

    if any_present && present().all(|s| parse_bool(s).is_some()) {
        let values = raw
            .iter()
            .map(|c| c.as_deref().and_then(parse_bool).map_or(Value::Null, Value::Boolean))
            .collect();
        return Column::new(name, ColumnType::Boolean, values);
    }

    let values = raw
        .into_iter()
        .map(|c| c.map_or(Value::Null, Value::Text))
        .collect();
    Column::new(name, ColumnType::Text, values)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Read every row group of a Parquet object
pub fn read_parquet(path: &str, data: Bytes) -> StorageResult<Dataset> {
    let decode_err = |message: String| StorageError::Decode {
        path: path.to_string(),
        message,
    };

    let builder =
        ParquetRecordBatchReaderBuilder::try_new(data).map_err(|e| decode_err(e.to_string()))?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(|e| decode_err(e.to_string()))?;

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|f| Column::new(f.name().clone(), column_type_of(f.data_type()), Vec::new()))
        .collect();

    for batch in reader {
        let batch = batch.map_err(|e| decode_err(e.to_string()))?;
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            let values =
                values_from_array(array, column.column_type).map_err(decode_err)?;
            column.values.extend(values);
        }
    }

    Dataset::new(columns).map_err(|e| decode_err(e.to_string()))
}

fn column_type_of(data_type: &DataType) -> ColumnType {
    match data_type {
        DataType::Boolean => ColumnType::Boolean,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => ColumnType::Integer,
        DataType::Float16 | DataType::Float32 | DataType::Float64 => ColumnType::Float,
        DataType::Date32 | DataType::Date64 => ColumnType::Date,
        DataType::Timestamp(_, _) => ColumnType::Timestamp,
        _ => ColumnType::Text,
    }
}

fn values_from_array(array: &ArrayRef, column_type: ColumnType) -> Result<Vec<Value>, String> {
    let target = match column_type {
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::Integer => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Text => DataType::Utf8,
        ColumnType::Date => DataType::Date32,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
    };
    let array = cast(array, &target).map_err(|e| e.to_string())?;
    let len = array.len();

    let values = match column_type {
        ColumnType::Boolean => {
            let a = downcast::<BooleanArray>(&array)?;
            (0..len)
                .map(|i| if a.is_null(i) { Value::Null } else { Value::Boolean(a.value(i)) })
                .collect()
        }
        ColumnType::Integer => {
            let a = downcast::<Int64Array>(&array)?;
            (0..len)
                .map(|i| if a.is_null(i) { Value::Null } else { Value::Integer(a.value(i)) })
                .collect()
        }
        ColumnType::Float => {
            let a = downcast::<Float64Array>(&array)?;
            (0..len)
                .map(|i| if a.is_null(i) { Value::Null } else { Value::Float(a.value(i)) })
                .collect()
        }
        ColumnType::Text => {
            let a = downcast::<StringArray>(&array)?;
            (0..len)
                .map(|i| {
                    if a.is_null(i) {
                        Value::Null
                    } else {
                        Value::Text(a.value(i).to_string())
                    }
                })
                .collect()
        }
        ColumnType::Date => {
            let a = downcast::<Date32Array>(&array)?;
            (0..len)
                .map(|i| {
                    if a.is_null(i) {
                        Value::Null
                    } else {
                        a.value_as_date(i).map_or(Value::Null, Value::Date)
                    }
                })
                .collect()
        }
        ColumnType::Timestamp => {
            let a = downcast::<TimestampMicrosecondArray>(&array)?;
            (0..len)
                .map(|i| {
                    if a.is_null(i) {
                        Value::Null
                    } else {
                        a.value_as_datetime(i).map_or(Value::Null, Value::Timestamp)
                    }
                })
                .collect()
        }
    };
    Ok(values)
}

fn downcast<T: 'static>(array: &ArrayRef) -> Result<&T, String> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| format!("unexpected array type {}", array.data_type()))
}

/// One Parquet file ready to be stored
#[derive(Debug, Clone)]
pub struct EncodedPart {
    /// Hive partition directory relative to the table root, if partitioned
    pub partition_dir: Option<String>,
    /// File name inside the partition directory
    pub file_name: String,
    /// Rows in the file
    pub rows: usize,
    /// Encoded file contents
    pub data: Vec<u8>,
}

impl EncodedPart {
    /// Path of the file relative to the table root
    pub fn relative_path(&self) -> String {
        match &self.partition_dir {
            Some(dir) => format!("{}/{}", dir, self.file_name),
            None => self.file_name.clone(),
        }
    }
}

/// Split `dataset` by the partition columns of `spec` and encode each group.
///
/// Partitions come out in ascending coordinate order with the default
/// partition first. An un-partitioned spec always yields exactly one file,
/// even for an empty dataset.
pub fn encode_parts(
    dataset: &Dataset,
    spec: &PartitionSpec,
    compression: CompressionCodec,
) -> StorageResult<Vec<EncodedPart>> {
    let props = writer_properties(compression);

    if !spec.is_partitioned() {
        return Ok(vec![EncodedPart {
            partition_dir: None,
            file_name: part_file_name(compression),
            rows: dataset.row_count(),
            data: encode_parquet(dataset, props)?,
        }]);
    }

    let keys: Vec<&Column> = spec
        .partition_columns
        .iter()
        .map(|name| {
            dataset
                .column(name)
                .ok_or_else(|| StorageError::MissingPartitionColumn(name.clone()))
        })
        .collect::<StorageResult<_>>()?;

    let mut groups: BTreeMap<Vec<Option<String>>, Vec<usize>> = BTreeMap::new();
    for row in 0..dataset.row_count() {
        let key = keys.iter().map(|c| partition_value(&c.values[row])).collect();
        groups.entry(key).or_default().push(row);
    }

    let mut parts = Vec::with_capacity(groups.len());
    for (key, rows) in groups {
        let dir = spec
            .partition_columns
            .iter()
            .zip(&key)
            .map(|(name, value)| format!("{}={}", name, value.as_deref().unwrap_or(DEFAULT_PARTITION)))
            .collect::<Vec<_>>()
            .join("/");

        let mut subset = dataset.take_rows(&rows);
        for name in &spec.partition_columns {
            subset.remove_column(name);
        }

        parts.push(EncodedPart {
            partition_dir: Some(dir),
            file_name: part_file_name(compression),
            rows: rows.len(),
            data: encode_parquet(&subset, props.clone())?,
        });
    }
    Ok(parts)
}

/// Summarize the parts that were stored
pub fn write_result(parts: &[EncodedPart]) -> WriteResult {
    WriteResult {
        rows_written: parts.iter().map(|p| p.rows).sum(),
        files_written: parts.len(),
        partitions_written: parts
            .iter()
            .filter_map(|p| p.partition_dir.clone())
            .collect(),
    }
}

fn partition_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Unparseable(_) => None,
        Value::Integer(v) => Some(v.to_string()),
        Value::Boolean(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Text(s) if s.is_empty() => None,
        Value::Text(s) => Some(s.clone()),
        Value::Date(d) => Some(d.to_string()),
        Value::Timestamp(ts) => Some(ts.to_string()),
    }
}

fn part_file_name(compression: CompressionCodec) -> String {
    match compression.file_infix() {
        Some(infix) => format!("part-{}.{}.parquet", Uuid::new_v4(), infix),
        None => format!("part-{}.parquet", Uuid::new_v4()),
    }
}

/// Writer properties for the configured codec
pub fn writer_properties(compression: CompressionCodec) -> WriterProperties {
    let compression = match compression {
        CompressionCodec::None => Compression::UNCOMPRESSED,
        CompressionCodec::Snappy => Compression::SNAPPY,
        CompressionCodec::Gzip => Compression::GZIP(GzipLevel::default()),
        CompressionCodec::Zstd => Compression::ZSTD(ZstdLevel::default()),
        CompressionCodec::Lz4 => Compression::LZ4_RAW,
    };
    WriterProperties::builder()
        .set_compression(compression)
        .build()
}

/// Encode a whole dataset as a single Parquet file
pub fn encode_parquet(dataset: &Dataset, props: WriterProperties) -> StorageResult<Vec<u8>> {
    let batch = to_record_batch(dataset)?;

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
        .map_err(|e| StorageError::Encode(e.to_string()))?;
    writer
        .write(&batch)
        .map_err(|e| StorageError::Encode(e.to_string()))?;
    writer
        .close()
        .map_err(|e| StorageError::Encode(e.to_string()))?;

    Ok(buffer)
}

/// Convert a dataset to one Arrow record batch.
///
/// The unparseable sentinel has no columnar representation and is stored as
/// null.
pub fn to_record_batch(dataset: &Dataset) -> StorageResult<RecordBatch> {
    let mut fields = Vec::with_capacity(dataset.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(dataset.columns().len());

    for column in dataset.columns() {
        let (data_type, array) = to_array(column);
        fields.push(Field::new(column.name.clone(), data_type, true));
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(dataset.row_count()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .map_err(|e| StorageError::Encode(e.to_string()))
}

fn to_array(column: &Column) -> (DataType, ArrayRef) {
    let values = &column.values;
    match column.column_type {
        ColumnType::Boolean => {
            let v: Vec<Option<bool>> = values
                .iter()
                .map(|v| match v {
                    Value::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect();
            (DataType::Boolean, Arc::new(BooleanArray::from(v)))
        }
        ColumnType::Integer => {
            let v: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect();
            (DataType::Int64, Arc::new(Int64Array::from(v)))
        }
        ColumnType::Float => {
            let v: Vec<Option<f64>> = values
                .iter()
                .map(|v| match v {
                    Value::Float(f) => Some(*f),
                    Value::Integer(i) => Some(*i as f64),
                    _ => None,
                })
                .collect();
            (DataType::Float64, Arc::new(Float64Array::from(v)))
        }
        ColumnType::Text => {
            let v: Vec<Option<String>> = values.iter().map(text_of).collect();
            (DataType::Utf8, Arc::new(StringArray::from(v)))
        }
        ColumnType::Date => {
            let v: Vec<Option<i32>> = values
                .iter()
                .map(|v| v.calendar_date().map(days_since_epoch))
                .collect();
            (DataType::Date32, Arc::new(Date32Array::from(v)))
        }
        ColumnType::Timestamp => {
            let v: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Value::Timestamp(ts) => Some(ts.and_utc().timestamp_micros()),
                    Value::Date(d) => d
                        .and_hms_opt(0, 0, 0)
                        .map(|ts| ts.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect();
            (
                DataType::Timestamp(TimeUnit::Microsecond, None),
                Arc::new(TimestampMicrosecondArray::from(v)),
            )
        }
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Unparseable(_) => None,
        Value::Text(s) => Some(s.clone()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Date(d) => Some(d.to_string()),
        Value::Timestamp(ts) => Some(ts.to_string()),
    }
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    date.signed_duration_since(epoch).num_days() as i32
}

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::bar::Bar;
use crate::error::StoreError;

pub fn bar_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("open", DataType::Float64, false),
        Field::new("high", DataType::Float64, false),
        Field::new("low", DataType::Float64, false),
        Field::new("close", DataType::Float64, false),
        Field::new("volume", DataType::Int64, false),
    ])
}

pub fn bars_to_record_batch(bars: &[Bar]) -> Result<RecordBatch, StoreError> {
    let schema = Arc::new(bar_schema());

    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_micros()).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
        Arc::new(Float64Array::from_iter_values(bars.iter().map(|b| b.open))),
        Arc::new(Float64Array::from_iter_values(bars.iter().map(|b| b.high))),
        Arc::new(Float64Array::from_iter_values(bars.iter().map(|b| b.low))),
        Arc::new(Float64Array::from_iter_values(bars.iter().map(|b| b.close))),
        Arc::new(Int64Array::from_iter_values(bars.iter().map(|b| b.volume))),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

pub fn record_batch_to_bars(batch: &RecordBatch) -> Result<Vec<Bar>, StoreError> {
    let timestamps = batch
        .column(0)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| StoreError::InvalidData("expected timestamp column".into()))?;

    let price_column = |index: usize, name: &str| -> Result<&Float64Array, StoreError> {
        batch
            .column(index)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| StoreError::InvalidData(format!("expected {name} column")))
    };

    let opens = price_column(1, "open")?;
    let highs = price_column(2, "high")?;
    let lows = price_column(3, "low")?;
    let closes = price_column(4, "close")?;

    let volumes = batch
        .column(5)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| StoreError::InvalidData("expected volume column".into()))?;

    let mut bars = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let micros = timestamps.value(i);
        let timestamp = chrono::DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| StoreError::InvalidData(format!("invalid timestamp: {micros}")))?;

        bars.push(Bar {
            timestamp,
            open: opens.value(i),
            high: highs.value(i),
            low: lows.value(i),
            close: closes.value(i),
            volume: volumes.value(i),
        });
    }

    Ok(bars)
}

pub fn write_parquet(path: &Path, bars: &[Bar]) -> Result<(), StoreError> {
    let batch = bars_to_record_batch(bars)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<Vec<Bar>, StoreError> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut all_bars = Vec::new();
    for batch in reader {
        let batch = batch?;
        let mut bars = record_batch_to_bars(&batch)?;
        all_bars.append(&mut bars);
    }

    Ok(all_bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_bars() -> Vec<Bar> {
        vec![
            Bar {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
                open: 100.0,
                high: 105.0,
                low: 99.0,
                close: 104.0,
                volume: 1000,
            },
            Bar {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 3, 14, 30, 0).unwrap(),
                open: 104.0,
                high: 106.0,
                low: 103.0,
                close: 105.0,
                volume: 1200,
            },
        ]
    }

    #[test]
    fn record_batch_roundtrip() {
        let bars = sample_bars();
        let batch = bars_to_record_batch(&bars).unwrap();
        let result = record_batch_to_bars(&batch).unwrap();
        assert_eq!(bars, result);
    }

    #[test]
    fn empty_bars_roundtrip() {
        let bars: Vec<Bar> = vec![];
        let batch = bars_to_record_batch(&bars).unwrap();
        assert_eq!(batch.num_rows(), 0);
        let result = record_batch_to_bars(&batch).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn parquet_file_roundtrip() {
        let bars = sample_bars();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.parquet");

        write_parquet(&path, &bars).unwrap();
        let result = read_parquet(&path).unwrap();
        assert_eq!(bars, result);
    }

    #[test]
    fn sub_second_timestamps_preserved() {
        let bar = Bar {
            timestamp: chrono::DateTime::from_timestamp_micros(1_704_205_800_123_456).unwrap(),
            open: 0.0001,
            high: 99999.9999,
            low: 0.0001,
            close: 123.4567,
            volume: 0,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("precision.parquet");

        write_parquet(&path, std::slice::from_ref(&bar)).unwrap();
        let result = read_parquet(&path).unwrap();
        assert_eq!(result, vec![bar]);
    }
}

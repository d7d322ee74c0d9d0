use crate::Result;
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

/// In-memory tabular dataset passed between pipeline tasks.
pub type Dataset = RecordBatch;

/// Decode a complete Parquet file into a single batch.
pub fn decode_parquet(data: Bytes) -> Result<Dataset> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Encode a batch as a complete Parquet file.
pub fn encode_parquet(dataset: &Dataset) -> Result<Bytes> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, dataset.schema(), None)?;
    writer.write(dataset)?;
    writer.close()?;
    Ok(Bytes::from(buf))
}

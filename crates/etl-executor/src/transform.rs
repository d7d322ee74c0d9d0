use arrow::array::{
    Array, ArrayRef, AsArray, Float64Array, Int64Array, Scalar, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{can_cast_types, cast, cast_with_options, is_not_null, CastOptions};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use etl_core::{Result, TaskError};
use etl_storage::Dataset;
use std::collections::HashMap;
use std::sync::Arc;

pub const PROCESSED_AT: &str = "processed_at";
pub const AMOUNT: &str = "amount";
pub const CATEGORY: &str = "category";
pub const CATEGORY_TOTAL: &str = "category_total";

/// A pure dataset-to-dataset step applied before the load.
pub trait Transformation: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, dataset: &Dataset, processed_at: NaiveDateTime) -> Result<Dataset>;
}

/// Null-fill, processing timestamp and, when an `amount` column is present,
/// the per-category total of `amount` on every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTransform;

impl Transformation for StandardTransform {
    fn name(&self) -> &str {
        "standard"
    }

    fn apply(&self, dataset: &Dataset, processed_at: NaiveDateTime) -> Result<Dataset> {
        let mut columns = ColumnSet::from_batch(dataset);

        for column in columns.columns.iter_mut() {
            *column = fill_zero(column)?;
        }

        let stamp = TimestampMicrosecondArray::from_value(
            processed_at.and_utc().timestamp_micros(),
            dataset.num_rows(),
        );
        columns.upsert(
            Field::new(
                PROCESSED_AT,
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
            Arc::new(stamp),
        );

        if let Some(amount) = columns.get(AMOUNT) {
            let category = columns.get(CATEGORY).ok_or_else(|| {
                TaskError::Transform(format!(
                    "column '{}' is required to total '{}'",
                    CATEGORY, AMOUNT
                ))
            })?;
            let (field, totals) = category_totals(&category, &amount)?;
            columns.upsert(field, totals);
        }

        columns.into_batch()
    }
}

/// Ordered, name-addressable columns of a batch under construction.
struct ColumnSet {
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
}

impl ColumnSet {
    fn from_batch(batch: &RecordBatch) -> Self {
        Self {
            fields: batch
                .schema()
                .fields()
                .iter()
                .map(|f| f.as_ref().clone())
                .collect(),
            columns: batch.columns().to_vec(),
        }
    }

    fn get(&self, name: &str) -> Option<ArrayRef> {
        let index = self.fields.iter().position(|f| f.name() == name)?;
        Some(self.columns[index].clone())
    }

    /// Replace the column of the same name, or append a new one.
    fn upsert(&mut self, field: Field, column: ArrayRef) {
        match self.fields.iter().position(|f| f.name() == field.name()) {
            Some(index) => {
                self.fields[index] = field;
                self.columns[index] = column;
            }
            None => {
                self.fields.push(field);
                self.columns.push(column);
            }
        }
    }

    fn into_batch(self) -> Result<RecordBatch> {
        RecordBatch::try_new(Arc::new(Schema::new(self.fields)), self.columns)
            .map_err(|e| TaskError::Transform(e.to_string()))
    }
}

/// Replace nulls with zero in numeric, boolean and string columns. Other
/// columns have no zero value and are returned unchanged.
fn fill_zero(column: &ArrayRef) -> Result<ArrayRef> {
    let data_type = column.data_type();
    let fillable = data_type.is_numeric()
        || matches!(
            data_type,
            DataType::Boolean | DataType::Utf8 | DataType::LargeUtf8
        );

    if column.null_count() == 0 || !fillable || !can_cast_types(&DataType::Int64, data_type) {
        return Ok(column.clone());
    }

    let zero = cast(&Int64Array::from(vec![0]), data_type).map_err(transform_error)?;
    let mask = is_not_null(column.as_ref()).map_err(transform_error)?;
    zip(&mask, column, &Scalar::new(zero)).map_err(transform_error)
}

fn category_totals(category: &ArrayRef, amount: &ArrayRef) -> Result<(Field, ArrayRef)> {
    let keys = cast(category.as_ref(), &DataType::Utf8).map_err(transform_error)?;
    let keys = keys.as_string::<i32>();

    // Values that do not fit the total type are errors, not nulls.
    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };

    let amount_type = amount.data_type();
    if amount_type.is_integer() {
        let values = cast_with_options(amount.as_ref(), &DataType::Int64, &strict)
            .map_err(transform_error)?;
        let values: Vec<i64> = values
            .as_primitive::<Int64Type>()
            .iter()
            .map(Option::unwrap_or_default)
            .collect();
        let totals = Int64Array::from(group_totals(keys, &values)?);
        Ok((
            Field::new(CATEGORY_TOTAL, DataType::Int64, false),
            Arc::new(totals),
        ))
    } else if amount_type.is_numeric() {
        let values = cast_with_options(amount.as_ref(), &DataType::Float64, &strict)
            .map_err(transform_error)?;
        let values: Vec<f64> = values
            .as_primitive::<Float64Type>()
            .iter()
            .map(Option::unwrap_or_default)
            .collect();
        let totals = Float64Array::from(group_totals(keys, &values)?);
        Ok((
            Field::new(CATEGORY_TOTAL, DataType::Float64, false),
            Arc::new(totals),
        ))
    } else {
        Err(TaskError::Transform(format!(
            "column '{}' must be numeric, found {}",
            AMOUNT, amount_type
        )))
    }
}

trait Total: Copy + Default {
    fn checked_total(self, other: Self) -> Option<Self>;
}

impl Total for i64 {
    fn checked_total(self, other: Self) -> Option<Self> {
        self.checked_add(other)
    }
}

impl Total for f64 {
    fn checked_total(self, other: Self) -> Option<Self> {
        Some(self + other)
    }
}

// Null categories form their own group.
fn group_totals<T: Total>(keys: &StringArray, values: &[T]) -> Result<Vec<T>> {
    let key = |i: usize| (!keys.is_null(i)).then(|| keys.value(i));

    let mut totals: HashMap<Option<&str>, T> = HashMap::new();
    for (i, value) in values.iter().enumerate() {
        let total = totals.entry(key(i)).or_default();
        *total = total.checked_total(*value).ok_or_else(|| {
            TaskError::Transform(format!(
                "'{}' total overflows for category {:?}",
                AMOUNT,
                key(i)
            ))
        })?;
    }

    Ok((0..values.len())
        .map(|i| totals.get(&key(i)).copied().unwrap_or_default())
        .collect())
}

fn transform_error(err: arrow::error::ArrowError) -> TaskError {
    TaskError::Transform(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BooleanArray, UInt64Array};
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        RecordBatch::try_from_iter(columns).unwrap()
    }

    fn column<'a>(batch: &'a RecordBatch, name: &str) -> &'a ArrayRef {
        batch.column(batch.schema().index_of(name).unwrap())
    }

    #[test]
    fn test_category_total_and_timestamp() {
        let input = batch(vec![
            ("category", Arc::new(StringArray::from(vec!["A", "A", "B"])) as ArrayRef),
            ("amount", Arc::new(Int64Array::from(vec![10, 20, 5])) as ArrayRef),
        ]);

        let output = StandardTransform.apply(&input, at()).unwrap();

        let totals = column(&output, CATEGORY_TOTAL).as_primitive::<Int64Type>();
        assert_eq!(totals.values().to_vec(), vec![30, 30, 5]);

        let stamps = column(&output, PROCESSED_AT);
        assert_eq!(stamps.null_count(), 0);
        assert_eq!(stamps.len(), 3);
        let stamps = stamps
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(stamps.value_as_datetime(0), Some(at()));
    }

    #[test]
    fn test_nulls_filled_with_zero() {
        let input = batch(vec![
            (
                "category",
                Arc::new(StringArray::from(vec![Some("A"), None, Some("A")])) as ArrayRef,
            ),
            (
                "amount",
                Arc::new(Float64Array::from(vec![Some(1.5), Some(2.0), None])) as ArrayRef,
            ),
            (
                "flag",
                Arc::new(BooleanArray::from(vec![Some(true), None, None])) as ArrayRef,
            ),
        ]);

        let output = StandardTransform.apply(&input, at()).unwrap();

        let categories = column(&output, CATEGORY).as_string::<i32>();
        assert_eq!(categories.value(1), "0");

        let amounts = column(&output, AMOUNT).as_primitive::<Float64Type>();
        assert_eq!(amounts.values().to_vec(), vec![1.5, 2.0, 0.0]);

        let totals = column(&output, CATEGORY_TOTAL).as_primitive::<Float64Type>();
        assert_eq!(totals.values().to_vec(), vec![1.5, 2.0, 1.5]);

        assert_eq!(column(&output, "flag").null_count(), 0);
    }

    #[test]
    fn test_without_amount_only_stamps() {
        let input = batch(vec![(
            "id",
            Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
        )]);

        let output = StandardTransform.apply(&input, at()).unwrap();

        assert_eq!(output.num_columns(), 2);
        assert!(output.schema().index_of(CATEGORY_TOTAL).is_err());
        assert!(output.schema().index_of(PROCESSED_AT).is_ok());
    }

    #[test]
    fn test_amount_without_category_rejected() {
        let input = batch(vec![(
            "amount",
            Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
        )]);

        let err = StandardTransform.apply(&input, at()).unwrap_err();
        assert!(matches!(err, TaskError::Transform(_)));
    }

    #[test]
    fn test_unsigned_amount_beyond_total_range_rejected() {
        let input = batch(vec![
            ("category", Arc::new(StringArray::from(vec!["A", "B"])) as ArrayRef),
            (
                "amount",
                Arc::new(UInt64Array::from(vec![10_000_000_000_000_000_000, 5])) as ArrayRef,
            ),
        ]);

        let err = StandardTransform.apply(&input, at()).unwrap_err();
        assert!(matches!(err, TaskError::Transform(_)));
    }

    #[test]
    fn test_unsigned_amount_in_range_is_totalled() {
        let input = batch(vec![
            ("category", Arc::new(StringArray::from(vec!["A", "A"])) as ArrayRef),
            ("amount", Arc::new(UInt64Array::from(vec![7, 8])) as ArrayRef),
        ]);

        let output = StandardTransform.apply(&input, at()).unwrap();
        let totals = column(&output, CATEGORY_TOTAL).as_primitive::<Int64Type>();
        assert_eq!(totals.values().to_vec(), vec![15, 15]);
    }

    #[test]
    fn test_total_overflow_rejected() {
        let input = batch(vec![
            ("category", Arc::new(StringArray::from(vec!["A", "A"])) as ArrayRef),
            ("amount", Arc::new(Int64Array::from(vec![i64::MAX, 1])) as ArrayRef),
        ]);

        let err = StandardTransform.apply(&input, at()).unwrap_err();
        assert!(matches!(err, TaskError::Transform(ref msg) if msg.contains("overflows")));
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        let input = batch(vec![
            ("category", Arc::new(StringArray::from(vec!["A"])) as ArrayRef),
            ("amount", Arc::new(StringArray::from(vec!["ten"])) as ArrayRef),
        ]);

        assert!(matches!(
            StandardTransform.apply(&input, at()),
            Err(TaskError::Transform(_))
        ));
    }
}

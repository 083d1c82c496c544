//! Vertical concatenation of columns and tables.
//!
//! Inputs are consumed in order into a single freshly allocated column. A
//! target length longer than the combined inputs leaves a missing tail, a
//! shorter one truncates inside the final contributing column. Categorical
//! inputs are unified over a merged dictionary; all inputs are read through
//! the fill kernels, so mapped views contribute exactly what their readers
//! would see.

use columnar::{
    column::{
        CategoricalColumn, Category, Column, DateTimeColumn, NumericColumn, ObjectColumn,
        TimeColumn, TypeId, MISSING_DATE_TIME, MISSING_TIME,
    },
    packed::{PackedBuilder, PackedFormat},
    reader::SMALL_BUFFER_SIZE,
};
use tracing::trace;

use crate::{
    context::ExecutionContext,
    progress::{ProgressCallback, ProgressSink},
    Error, Result,
};

mod dictionary;
mod tables;

pub use self::tables::append_tables;

const FILL_CHUNK: usize = SMALL_BUFFER_SIZE;

/// The unified output shape of one column-level append.
pub(crate) enum AppendPlan {
    Numeric { type_id: TypeId },
    Categorical,
    Object { type_id: TypeId },
    Time,
    DateTime { nano_precision: bool },
}

/// Checks that all columns can be appended and determines the output type.
///
/// Numeric inputs may mix real and integer columns (any real input makes
/// the output real), date-time inputs may mix precisions (any nanosecond
/// input makes the output nanosecond-precise); all other categories
/// require exactly matching types. `column_name` is attached to type
/// errors for table-level appends.
pub(crate) fn validate(columns: &[Column], column_name: Option<&str>) -> Result<AppendPlan> {
    let Some(first) = columns.first() else {
        return Err(Error::EmptyColumnList);
    };
    let mismatch = |index: usize, actual: &Column| Error::IncompatibleTypes {
        index,
        desired: first.type_id().to_string(),
        actual: actual.type_id().to_string(),
        column_name: column_name.map(str::to_string),
    };
    match first.category() {
        Category::Numeric => {
            let mut type_id = first.type_id();
            for (index, column) in columns.iter().enumerate().skip(1) {
                if column.category() != Category::Numeric {
                    return Err(mismatch(index, column));
                }
                if column.type_id() == TypeId::Real {
                    type_id = TypeId::Real;
                }
            }
            Ok(AppendPlan::Numeric { type_id })
        }
        Category::Categorical => {
            for (index, column) in columns.iter().enumerate().skip(1) {
                if column.type_id() != first.type_id() {
                    return Err(mismatch(index, column));
                }
            }
            Ok(AppendPlan::Categorical)
        }
        Category::Object => {
            for (index, column) in columns.iter().enumerate().skip(1) {
                if column.type_id() != first.type_id() {
                    return Err(mismatch(index, column));
                }
            }
            Ok(AppendPlan::Object {
                type_id: first.type_id(),
            })
        }
        Category::Time => {
            for (index, column) in columns.iter().enumerate().skip(1) {
                if column.type_id() != TypeId::Time {
                    return Err(mismatch(index, column));
                }
            }
            Ok(AppendPlan::Time)
        }
        Category::DateTime => {
            let mut nano_precision = false;
            for (index, column) in columns.iter().enumerate() {
                match column {
                    Column::DateTime(column) => nano_precision |= column.nano_precision(),
                    _ => return Err(mismatch(index, column)),
                }
            }
            Ok(AppendPlan::DateTime { nano_precision })
        }
    }
}

/// Concatenates `columns` into a single column of length `total_length`.
///
/// All inputs must share a compatible category, see [`validate`]. The
/// callback, if any, observes monotonically nondecreasing progress ending
/// at exactly `1.0`.
pub fn append_columns(
    columns: &[Column],
    total_length: usize,
    callback: Option<ProgressCallback<'_>>,
    context: &ExecutionContext,
) -> Result<Column> {
    let plan = validate(columns, None)?;
    trace!(
        inputs = columns.len(),
        total_length,
        "appending columns"
    );
    let sink = ProgressSink::new(callback, total_length as u64);
    let column = context.install(|| append_with_sink(columns, total_length, &plan, &sink))?;
    sink.finish();
    Ok(column)
}

pub(crate) fn append_with_sink(
    columns: &[Column],
    total_length: usize,
    plan: &AppendPlan,
    sink: &ProgressSink<'_>,
) -> Result<Column> {
    match plan {
        AppendPlan::Numeric { type_id } => append_numeric(columns, total_length, *type_id, sink),
        AppendPlan::Categorical => append_categorical(columns, total_length, sink),
        AppendPlan::Object { type_id } => append_object(columns, total_length, *type_id, sink),
        AppendPlan::Time => append_time(columns, total_length, sink),
        AppendPlan::DateTime { nano_precision } => {
            append_datetime(columns, total_length, *nano_precision, sink)
        }
    }
}

/// Splits the target length over the inputs: how many leading rows each
/// input contributes, truncating inside the final contributing column.
fn contributions<'a>(
    columns: &'a [Column],
    total_length: usize,
) -> impl Iterator<Item = (&'a Column, usize, usize)> {
    let mut written = 0;
    columns.iter().filter_map(move |column| {
        let take = column.len().min(total_length - written);
        let start = written;
        written += take;
        (take > 0).then_some((column, start, take))
    })
}

fn append_numeric(
    columns: &[Column],
    total_length: usize,
    type_id: TypeId,
    sink: &ProgressSink<'_>,
) -> Result<Column> {
    let mut data = vec![f64::NAN; total_length];
    let mut written = 0;
    for (column, start, take) in contributions(columns, total_length) {
        let mut row = 0;
        while row < take {
            let n = (take - row).min(FILL_CHUNK);
            column.fill(&mut data[start + row..start + row + n], row);
            sink.add(n as u64);
            row += n;
        }
        written = start + take;
    }
    sink.add((total_length - written) as u64);
    Ok(Column::Numeric(NumericColumn::dense(type_id, data)))
}

fn append_time(
    columns: &[Column],
    total_length: usize,
    sink: &ProgressSink<'_>,
) -> Result<Column> {
    let mut data = vec![MISSING_TIME; total_length];
    let mut written = 0;
    for (column, start, take) in contributions(columns, total_length) {
        let Column::Time(time) = column else {
            unreachable!("validated to be a time column");
        };
        let mut row = 0;
        while row < take {
            let n = (take - row).min(FILL_CHUNK);
            for i in row..row + n {
                data[start + i] = time.get_nanos(i);
            }
            sink.add(n as u64);
            row += n;
        }
        written = start + take;
    }
    sink.add((total_length - written) as u64);
    Ok(Column::Time(TimeColumn::dense(data)))
}

fn append_datetime(
    columns: &[Column],
    total_length: usize,
    nano_precision: bool,
    sink: &ProgressSink<'_>,
) -> Result<Column> {
    let mut seconds = vec![MISSING_DATE_TIME; total_length];
    let mut nanos = vec![0_i32; if nano_precision { total_length } else { 0 }];
    let mut written = 0;
    for (column, start, take) in contributions(columns, total_length) {
        let Column::DateTime(datetime) = column else {
            unreachable!("validated to be a date-time column");
        };
        let mut row = 0;
        while row < take {
            let n = (take - row).min(FILL_CHUNK);
            for i in row..row + n {
                if let Some((second, nano)) = datetime.get_parts(i) {
                    seconds[start + i] = second;
                    if nano_precision {
                        nanos[start + i] = nano;
                    }
                }
            }
            sink.add(n as u64);
            row += n;
        }
        written = start + take;
    }
    sink.add((total_length - written) as u64);
    let nanos = nano_precision.then(|| nanos.into());
    Ok(Column::DateTime(DateTimeColumn::dense(seconds, nanos)?))
}

fn append_object(
    columns: &[Column],
    total_length: usize,
    type_id: TypeId,
    sink: &ProgressSink<'_>,
) -> Result<Column> {
    let mut written = 0;
    let column = if type_id == TypeId::Text {
        let mut data = vec![None; total_length];
        for (column, start, take) in contributions(columns, total_length) {
            let Column::Object(object) = column else {
                unreachable!("validated to be an object column");
            };
            for (i, slot) in data[start..start + take].iter_mut().enumerate() {
                *slot = object.get_text(i);
            }
            sink.add(take as u64);
            written = start + take;
        }
        ObjectColumn::texts(data)
    } else {
        let mut data = vec![None; total_length];
        for (column, start, take) in contributions(columns, total_length) {
            let Column::Object(object) = column else {
                unreachable!("validated to be an object column");
            };
            for (i, slot) in data[start..start + take].iter_mut().enumerate() {
                *slot = object.get_text_set(i);
            }
            sink.add(take as u64);
            written = start + take;
        }
        ObjectColumn::text_sets(data)
    };
    sink.add((total_length - written) as u64);
    Ok(Column::Object(column))
}

fn append_categorical(
    columns: &[Column],
    total_length: usize,
    sink: &ProgressSink<'_>,
) -> Result<Column> {
    let inputs = columns
        .iter()
        .map(|column| match column {
            Column::Categorical(column) => column,
            _ => unreachable!("validated to be a categorical column"),
        })
        .collect::<Vec<_>>();
    let dictionaries = inputs
        .iter()
        .map(|input| input.dictionary())
        .collect::<Vec<_>>();
    let merged = dictionary::merge(&dictionaries)?;

    let format = PackedFormat::minimal_for(merged.dictionary.len());
    let mut builder = PackedBuilder::with_capacity(format, total_length);
    let mut scratch = vec![0_u32; FILL_CHUNK];
    let mut written = 0;
    for (input_index, input) in inputs.iter().enumerate() {
        if written == total_length {
            break;
        }
        let take = input.len().min(total_length - written);
        // read through a remapped view so the stored indices arrive
        // already translated into the merged dictionary
        let translated;
        let source: &CategoricalColumn = match &merged.remaps {
            Some(remaps) => {
                translated = input.remap(
                    merged.dictionary.clone(),
                    remaps[input_index].clone(),
                    true,
                )?;
                &translated
            }
            None => input,
        };
        let mut row = 0;
        while row < take {
            let n = (take - row).min(FILL_CHUNK);
            source.fill_indices(&mut scratch[..n], row);
            for &index in &scratch[..n] {
                builder.push(index);
            }
            sink.add(n as u64);
            row += n;
        }
        written += take;
    }
    for _ in written..total_length {
        builder.push(0);
    }
    sink.add((total_length - written) as u64);
    Ok(Column::Categorical(CategoricalColumn::dense(
        merged.dictionary,
        builder.freeze(),
    )?))
}

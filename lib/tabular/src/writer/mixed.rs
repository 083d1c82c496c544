//! The row writer for arbitrary column types.

use std::{collections::HashMap, fmt, sync::Arc};

use columnar::{
    column::{
        nanos_of_day, CategoricalColumn, Column, DateTimeColumn, NumericColumn, ObjectColumn,
        TextSet, TimeColumn, TypeId, MISSING_DATE_TIME, MISSING_TIME,
    },
    dictionary::Dictionary,
    reader::SMALL_BUFFER_SIZE,
};
use time::{OffsetDateTime, Time};

use crate::{table::Table, Error, Result};

use super::{
    builder::{ArrayBuilderConfig, ChunkedBuilder},
    validate_labels,
};

enum MixedColumnWriter {
    Numeric {
        type_id: TypeId,
        buffer: Vec<f64>,
        data: ChunkedBuilder<f64>,
    },
    Categorical {
        lookup: HashMap<Arc<str>, u32>,
        values: Vec<Arc<str>>,
        buffer: Vec<u32>,
        data: ChunkedBuilder<u32>,
    },
    Text {
        data: Vec<Option<Arc<str>>>,
    },
    TextSet {
        data: Vec<Option<Arc<TextSet>>>,
    },
    Time {
        buffer: Vec<i64>,
        data: ChunkedBuilder<i64>,
    },
    DateTime {
        seconds_buffer: Vec<i64>,
        nanos_buffer: Vec<i32>,
        seconds: ChunkedBuilder<i64>,
        nanos: ChunkedBuilder<i32>,
        nano_precision: bool,
    },
}

impl MixedColumnWriter {
    fn new(type_id: TypeId, config: ArrayBuilderConfig) -> Self {
        match type_id {
            TypeId::Real | TypeId::Integer53Bit => MixedColumnWriter::Numeric {
                type_id,
                buffer: Vec::with_capacity(SMALL_BUFFER_SIZE),
                data: ChunkedBuilder::new(config),
            },
            TypeId::Nominal => MixedColumnWriter::Categorical {
                lookup: HashMap::new(),
                values: Vec::new(),
                buffer: Vec::with_capacity(SMALL_BUFFER_SIZE),
                data: ChunkedBuilder::new(config),
            },
            TypeId::Text => MixedColumnWriter::Text { data: Vec::new() },
            TypeId::TextSet => MixedColumnWriter::TextSet { data: Vec::new() },
            TypeId::Time => MixedColumnWriter::Time {
                buffer: Vec::with_capacity(SMALL_BUFFER_SIZE),
                data: ChunkedBuilder::new(config),
            },
            TypeId::DateTime => MixedColumnWriter::DateTime {
                seconds_buffer: Vec::with_capacity(SMALL_BUFFER_SIZE),
                nanos_buffer: Vec::with_capacity(SMALL_BUFFER_SIZE),
                seconds: ChunkedBuilder::new(config),
                nanos: ChunkedBuilder::new(config),
                nano_precision: false,
            },
        }
    }

    fn type_id(&self) -> TypeId {
        match self {
            MixedColumnWriter::Numeric { type_id, .. } => *type_id,
            MixedColumnWriter::Categorical { .. } => TypeId::Nominal,
            MixedColumnWriter::Text { .. } => TypeId::Text,
            MixedColumnWriter::TextSet { .. } => TypeId::TextSet,
            MixedColumnWriter::Time { .. } => TypeId::Time,
            MixedColumnWriter::DateTime { .. } => TypeId::DateTime,
        }
    }

    fn push_default(&mut self, initialized: bool) {
        match self {
            MixedColumnWriter::Numeric { buffer, .. } => {
                buffer.push(if initialized { f64::NAN } else { 0.0 });
            }
            MixedColumnWriter::Categorical { buffer, .. } => buffer.push(0),
            MixedColumnWriter::Text { data } => data.push(None),
            MixedColumnWriter::TextSet { data } => data.push(None),
            MixedColumnWriter::Time { buffer, .. } => buffer.push(MISSING_TIME),
            MixedColumnWriter::DateTime {
                seconds_buffer,
                nanos_buffer,
                ..
            } => {
                seconds_buffer.push(MISSING_DATE_TIME);
                nanos_buffer.push(0);
            }
        }
    }

    fn flush(&mut self) {
        match self {
            MixedColumnWriter::Numeric { buffer, data, .. } => {
                data.push_slice(buffer);
                buffer.clear();
            }
            MixedColumnWriter::Categorical { buffer, data, .. } => {
                data.push_slice(buffer);
                buffer.clear();
            }
            // object storage grows directly, nothing is buffered
            MixedColumnWriter::Text { .. } | MixedColumnWriter::TextSet { .. } => {}
            MixedColumnWriter::Time { buffer, data } => {
                data.push_slice(buffer);
                buffer.clear();
            }
            MixedColumnWriter::DateTime {
                seconds_buffer,
                nanos_buffer,
                seconds,
                nanos,
                ..
            } => {
                seconds.push_slice(seconds_buffer);
                nanos.push_slice(nanos_buffer);
                seconds_buffer.clear();
                nanos_buffer.clear();
            }
        }
    }

    fn finish(self) -> Result<Column> {
        Ok(match self {
            MixedColumnWriter::Numeric { type_id, data, .. } => {
                Column::Numeric(NumericColumn::dense(type_id, data.into_vec()))
            }
            MixedColumnWriter::Categorical { values, data, .. } => {
                let dictionary = Arc::new(Dictionary::new(values));
                Column::Categorical(CategoricalColumn::from_indices(
                    dictionary,
                    &data.into_vec(),
                )?)
            }
            MixedColumnWriter::Text { data } => Column::Object(ObjectColumn::texts(data)),
            MixedColumnWriter::TextSet { data } => {
                Column::Object(ObjectColumn::text_sets(data))
            }
            MixedColumnWriter::Time { data, .. } => {
                Column::Time(TimeColumn::dense(data.into_vec()))
            }
            MixedColumnWriter::DateTime {
                seconds,
                nanos,
                nano_precision,
                ..
            } => {
                let nanos = nano_precision.then(|| nanos.into_vec().into());
                Column::DateTime(DateTimeColumn::dense(seconds.into_vec(), nanos)?)
            }
        })
    }
}

/// A row writer accepting any declared column type.
///
/// Numeric cells are set through [`set`](Self::set), other types through
/// their typed setters. Categorical columns grow their dictionary in the
/// order values first appear.
pub struct MixedRowWriter {
    labels: Vec<String>,
    columns: Vec<MixedColumnWriter>,
    height: usize,
    buffered_rows: usize,
    initialized: bool,
    finalized: bool,
}

impl MixedRowWriter {
    pub fn new<L, S>(labels: L, types: &[TypeId], initialized: bool) -> Result<Self>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(labels, types, ArrayBuilderConfig::default(), initialized)
    }

    pub fn with_row_hint<L, S>(
        labels: L,
        types: &[TypeId],
        rows: usize,
        initialized: bool,
    ) -> Result<Self>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(
            labels,
            types,
            ArrayBuilderConfig::with_row_hint(rows),
            initialized,
        )
    }

    fn with_config<L, S>(
        labels: L,
        types: &[TypeId],
        config: ArrayBuilderConfig,
        initialized: bool,
    ) -> Result<Self>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = labels.into_iter().map(Into::into).collect::<Vec<_>>();
        validate_labels(&labels, types.len())?;
        let columns = types
            .iter()
            .map(|&type_id| MixedColumnWriter::new(type_id, config))
            .collect();
        Ok(Self {
            labels,
            columns,
            height: 0,
            buffered_rows: 0,
            initialized,
            finalized: false,
        })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Starts the next row; all its cells hold their type's missing value
    /// (or `0.0` for numeric cells of an uninitialized writer) until set.
    ///
    /// # Panics
    ///
    /// Panics if the writer has been finalized.
    pub fn advance(&mut self) {
        assert!(!self.finalized, "the writer has already been finalized");
        if self.buffered_rows == SMALL_BUFFER_SIZE {
            for column in &mut self.columns {
                column.flush();
            }
            self.buffered_rows = 0;
        }
        for column in &mut self.columns {
            column.push_default(self.initialized);
        }
        self.buffered_rows += 1;
        self.height += 1;
    }

    fn current(&mut self, column: usize) -> &mut MixedColumnWriter {
        assert!(!self.finalized, "the writer has already been finalized");
        assert!(self.buffered_rows > 0, "no row has been started");
        &mut self.columns[column]
    }

    /// Sets a numeric cell of the current row. Integer-typed columns round
    /// to the nearest integer, `NaN` stays missing.
    ///
    /// # Panics
    ///
    /// Panics if the column is not numeric, no row has been started, the
    /// index is out of range, or the writer has been finalized.
    pub fn set(&mut self, column: usize, value: f64) {
        match self.current(column) {
            MixedColumnWriter::Numeric {
                type_id, buffer, ..
            } => {
                let value = match type_id {
                    TypeId::Integer53Bit => value.round(),
                    _ => value,
                };
                let row = buffer.len() - 1;
                buffer[row] = value;
            }
            other => panic!("column {column} of type {} is not numeric", other.type_id()),
        }
    }

    /// Sets a categorical cell of the current row; `None` makes the cell
    /// missing. New values extend the dictionary.
    ///
    /// # Panics
    ///
    /// Panics if the column is not categorical, no row has been started,
    /// the index is out of range, or the writer has been finalized.
    pub fn set_categorical(&mut self, column: usize, value: Option<&str>) {
        match self.current(column) {
            MixedColumnWriter::Categorical {
                lookup,
                values,
                buffer,
                ..
            } => {
                let index = match value {
                    None => 0,
                    Some(value) => match lookup.get(value) {
                        Some(&index) => index,
                        None => {
                            let entry: Arc<str> = Arc::from(value);
                            let index = values.len() as u32 + 1;
                            values.push(entry.clone());
                            lookup.insert(entry, index);
                            index
                        }
                    },
                };
                let row = buffer.len() - 1;
                buffer[row] = index;
            }
            other => panic!(
                "column {column} of type {} is not categorical",
                other.type_id()
            ),
        }
    }

    /// Sets a text cell of the current row; `None` makes the cell missing.
    ///
    /// # Panics
    ///
    /// Panics if the column is not a text column, no row has been started,
    /// the index is out of range, or the writer has been finalized.
    pub fn set_text(&mut self, column: usize, value: Option<&str>) {
        match self.current(column) {
            MixedColumnWriter::Text { data } => {
                let row = data.len() - 1;
                data[row] = value.map(Arc::from);
            }
            other => panic!("column {column} of type {} is not text", other.type_id()),
        }
    }

    /// Sets a text-set cell of the current row; `None` makes the cell
    /// missing.
    ///
    /// # Panics
    ///
    /// Panics if the column is not a text-set column, no row has been
    /// started, the index is out of range, or the writer has been
    /// finalized.
    pub fn set_text_set(&mut self, column: usize, value: Option<TextSet>) {
        match self.current(column) {
            MixedColumnWriter::TextSet { data } => {
                let row = data.len() - 1;
                data[row] = value.map(Arc::new);
            }
            other => panic!(
                "column {column} of type {} is not a text set",
                other.type_id()
            ),
        }
    }

    /// Sets a time cell of the current row; `None` makes the cell missing.
    ///
    /// # Panics
    ///
    /// Panics if the column is not a time column, no row has been started,
    /// the index is out of range, or the writer has been finalized.
    pub fn set_time(&mut self, column: usize, value: Option<Time>) {
        match self.current(column) {
            MixedColumnWriter::Time { buffer, .. } => {
                let row = buffer.len() - 1;
                buffer[row] = value.map_or(MISSING_TIME, nanos_of_day);
            }
            other => panic!(
                "column {column} of type {} is not a time column",
                other.type_id()
            ),
        }
    }

    /// Sets a date-time cell of the current row; `None` makes the cell
    /// missing. The finished column has nanosecond precision iff some
    /// written value carries subsecond information.
    ///
    /// # Panics
    ///
    /// Panics if the column is not a date-time column, no row has been
    /// started, the index is out of range, or the writer has been
    /// finalized.
    pub fn set_date_time(&mut self, column: usize, value: Option<OffsetDateTime>) {
        match self.current(column) {
            MixedColumnWriter::DateTime {
                seconds_buffer,
                nanos_buffer,
                nano_precision,
                ..
            } => {
                let row = seconds_buffer.len() - 1;
                match value {
                    Some(value) => {
                        let nano = value.nanosecond() as i32;
                        seconds_buffer[row] = value.unix_timestamp();
                        nanos_buffer[row] = nano;
                        *nano_precision |= nano != 0;
                    }
                    None => {
                        seconds_buffer[row] = MISSING_DATE_TIME;
                        nanos_buffer[row] = 0;
                    }
                }
            }
            other => panic!(
                "column {column} of type {} is not a date-time column",
                other.type_id()
            ),
        }
    }

    /// Finalizes the writer into a table. May be called exactly once;
    /// later calls fail with [`Error::WriterFinalized`].
    pub fn create(&mut self) -> Result<Table> {
        if self.finalized {
            return Err(Error::WriterFinalized);
        }
        self.finalized = true;
        let mut columns = Vec::with_capacity(self.columns.len());
        for mut writer in self.columns.drain(..) {
            writer.flush();
            columns.push(Arc::new(writer.finish()?));
        }
        Table::new(std::mem::take(&mut self.labels), columns)
    }
}

impl fmt::Display for MixedRowWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "General row writer ({}x{})", self.height, self.width())
    }
}

//! Row writers materializing tables from streams of row values.
//!
//! A writer advances row by row, buffers the cells of the current rows in a
//! small per-column buffer, and flushes full buffers into growing chunked
//! storage. The numeric writer additionally watches each column for
//! sparsity and switches its storage to a sparse encoding when one value
//! clearly dominates.

use std::{fmt, sync::Arc};

use columnar::{
    column::{Category, Column, TypeId},
    reader::SMALL_BUFFER_SIZE,
};
use tracing::trace;

use crate::{table::Table, Error, Result};

mod builder;
mod mixed;

pub use self::{
    builder::{ArrayBuilderConfig, DEFAULT_INITIAL_CHUNK_SIZE},
    mixed::MixedRowWriter,
};

use self::builder::NumericBuilder;

/// Total rows after which the accumulated data is inspected for sparsity
/// for the first time.
pub const MAX_CHECK_FOR_SPARSITY_ROW: usize = 8192;

/// Minimal share a single value must reach for a column to switch to
/// sparse storage.
pub const SPARSITY_THRESHOLD: f64 = 0.7;

pub(crate) fn validate_labels(labels: &[String], items: usize) -> Result<()> {
    if labels.is_empty() {
        return Err(Error::EmptyLabels);
    }
    if labels.len() != items {
        return Err(Error::LabelCount {
            labels: labels.len(),
            items,
        });
    }
    for (index, label) in labels.iter().enumerate() {
        if label.is_empty() {
            return Err(Error::EmptyLabel { index });
        }
    }
    Ok(())
}

struct NumericColumnWriter {
    type_id: TypeId,
    buffer: Vec<f64>,
    builder: NumericBuilder,
}

impl NumericColumnWriter {
    fn flush(&mut self) {
        self.builder.push_slice(&self.buffer);
        self.buffer.clear();
    }
}

/// A row writer over exclusively numeric columns.
///
/// Rows are written by calling [`advance`](Self::advance) and then setting
/// the cells of the current row; unset cells keep their default. The
/// accumulated data turns into a [`Table`] exactly once via
/// [`create`](Self::create).
pub struct NumericRowWriter {
    labels: Vec<String>,
    columns: Vec<NumericColumnWriter>,
    config: ArrayBuilderConfig,
    height: usize,
    buffered_rows: usize,
    initialized: bool,
    sparsity_checked: bool,
    finalized: bool,
}

impl NumericRowWriter {
    /// Creates a writer for the given labels and numeric types.
    pub fn new<L, S>(labels: L, types: &[TypeId], initialized: bool) -> Result<Self>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(labels, types, ArrayBuilderConfig::default(), initialized)
    }

    /// Creates a writer sized for an expected number of rows.
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
        for (label, &type_id) in labels.iter().zip(types) {
            if type_id.category() != Category::Numeric {
                return Err(Error::NonNumericType {
                    label: label.clone(),
                    type_id: type_id.to_string(),
                });
            }
        }
        let columns = types
            .iter()
            .map(|&type_id| NumericColumnWriter {
                type_id,
                buffer: Vec::with_capacity(SMALL_BUFFER_SIZE),
                builder: NumericBuilder::new(config),
            })
            .collect();
        Ok(Self {
            labels,
            columns,
            config,
            height: 0,
            buffered_rows: 0,
            initialized,
            sparsity_checked: false,
            finalized: false,
        })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Rows written so far.
    pub fn height(&self) -> usize {
        self.height
    }

    fn default_cell(&self) -> f64 {
        if self.initialized {
            f64::NAN
        } else {
            0.0
        }
    }

    /// Starts the next row; all its cells hold the default until set.
    ///
    /// # Panics
    ///
    /// Panics if the writer has been finalized.
    pub fn advance(&mut self) {
        assert!(!self.finalized, "the writer has already been finalized");
        if self.buffered_rows == SMALL_BUFFER_SIZE {
            self.flush();
        }
        let default = self.default_cell();
        for column in &mut self.columns {
            column.buffer.push(default);
        }
        self.buffered_rows += 1;
        self.height += 1;
    }

    /// Sets the cell of the current row in the given column. Integer-typed
    /// columns round to the nearest integer, `NaN` stays missing.
    ///
    /// # Panics
    ///
    /// Panics if no row has been started, the column index is out of
    /// range, or the writer has been finalized.
    pub fn set(&mut self, column: usize, value: f64) {
        assert!(!self.finalized, "the writer has already been finalized");
        assert!(self.buffered_rows > 0, "no row has been started");
        let writer = &mut self.columns[column];
        let value = match writer.type_id {
            TypeId::Integer53Bit => value.round(),
            _ => value,
        };
        let row = writer.buffer.len() - 1;
        writer.buffer[row] = value;
    }

    fn flush(&mut self) {
        for column in &mut self.columns {
            column.flush();
        }
        self.buffered_rows = 0;
        self.check_for_sparsity();
    }

    /// Inspects the accumulated data once enough rows have been seen and
    /// swaps dominated columns to sparse storage; on later calls, columns
    /// whose data stopped being sparse are swapped back.
    fn check_for_sparsity(&mut self) {
        if !self.sparsity_checked {
            if self.height - self.buffered_rows < MAX_CHECK_FOR_SPARSITY_ROW {
                return;
            }
            self.sparsity_checked = true;
            trace!(rows = self.height, "inspecting columns for sparsity");
            for column in &mut self.columns {
                if let Some((value, frequency)) = column.builder.dominant_value() {
                    if frequency >= SPARSITY_THRESHOLD {
                        column.builder.adopt_sparse(value);
                    }
                }
            }
        } else {
            for column in &mut self.columns {
                if let Some(frequency) = column.builder.default_frequency() {
                    if frequency < SPARSITY_THRESHOLD {
                        column.builder.densify(self.config);
                    }
                }
            }
        }
    }

    /// Finalizes the writer into a table. May be called exactly once;
    /// later calls fail with [`Error::WriterFinalized`].
    pub fn create(&mut self) -> Result<Table> {
        if self.finalized {
            return Err(Error::WriterFinalized);
        }
        self.finalized = true;
        for column in &mut self.columns {
            column.flush();
        }
        if !self.sparsity_checked {
            self.sparsity_checked = true;
            for column in &mut self.columns {
                if let Some((value, frequency)) = column.builder.dominant_value() {
                    if frequency >= SPARSITY_THRESHOLD {
                        column.builder.adopt_sparse(value);
                    }
                }
            }
        }
        let config = self.config;
        let mut columns = Vec::with_capacity(self.columns.len());
        for mut writer in self.columns.drain(..) {
            if let Some(frequency) = writer.builder.default_frequency() {
                if frequency < SPARSITY_THRESHOLD {
                    writer.builder.densify(config);
                }
            }
            let type_id = writer.type_id;
            let column = writer.builder.finish(type_id)?;
            columns.push(Arc::new(Column::Numeric(column)));
        }
        Table::new(std::mem::take(&mut self.labels), columns)
    }
}

impl fmt::Display for NumericRowWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row writer ({}x{})", self.height, self.width())
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn unset_cells_default_to_nan_when_initialized() {
        let mut writer = NumericRowWriter::new(
            ["first", "second"],
            &[TypeId::Real, TypeId::Integer53Bit],
            true,
        )
        .unwrap();
        writer.advance();
        writer.advance();
        writer.set(0, 1.53);
        writer.set(1, 1.987);
        writer.advance();
        let table = writer.create().unwrap();

        assert_eq!(table.height(), 3);
        let mut buf = [0.0; 3];
        table.column(0).fill(&mut buf, 0);
        assert!(buf[0].is_nan());
        assert_eq!(buf[1], 1.53);
        assert!(buf[2].is_nan());
        table.column(1).fill(&mut buf, 0);
        assert!(buf[0].is_nan());
        // integer columns round to the nearest integer
        assert_eq!(buf[1], 2.0);
        assert!(buf[2].is_nan());
    }

    #[test]
    fn unset_cells_default_to_zero_otherwise() {
        let mut writer = NumericRowWriter::new(["a"], &[TypeId::Real], false).unwrap();
        writer.advance();
        writer.advance();
        writer.set(0, 4.0);
        let table = writer.create().unwrap();
        let mut buf = [9.0; 2];
        table.column(0).fill(&mut buf, 0);
        assert_eq!(buf, [0.0, 4.0]);
    }

    #[test]
    fn second_create_is_a_state_error() {
        let mut writer = NumericRowWriter::new(["a"], &[TypeId::Real], false).unwrap();
        writer.advance();
        writer.create().unwrap();
        assert!(matches!(writer.create(), Err(Error::WriterFinalized)));
    }

    #[test]
    #[should_panic(expected = "already been finalized")]
    fn advance_after_create_panics() {
        let mut writer = NumericRowWriter::new(["a"], &[TypeId::Real], false).unwrap();
        writer.create().unwrap();
        writer.advance();
    }

    #[test]
    fn construction_validation() {
        assert!(matches!(
            NumericRowWriter::new(Vec::<String>::new(), &[], false),
            Err(Error::EmptyLabels)
        ));
        assert!(matches!(
            NumericRowWriter::new(["a"], &[TypeId::Real, TypeId::Real], false),
            Err(Error::LabelCount { labels: 1, items: 2 })
        ));
        assert!(matches!(
            NumericRowWriter::new(["a"], &[TypeId::Nominal], false),
            Err(Error::NonNumericType { .. })
        ));
        assert!(matches!(
            NumericRowWriter::new(["a", ""], &[TypeId::Real, TypeId::Real], false),
            Err(Error::EmptyLabel { index: 1 })
        ));
    }

    #[test]
    fn duplicate_labels_surface_at_create() {
        let mut writer =
            NumericRowWriter::new(["a", "a"], &[TypeId::Real, TypeId::Real], false).unwrap();
        writer.advance();
        assert!(matches!(
            writer.create(),
            Err(Error::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn sparse_data_ends_in_sparse_columns() {
        let mut rng = rand::thread_rng();
        let rows = MAX_CHECK_FOR_SPARSITY_ROW + 3000;
        let mut writer =
            NumericRowWriter::with_row_hint(["a"], &[TypeId::Real], rows, true).unwrap();
        let mut expected = Vec::with_capacity(rows);
        for _ in 0..rows {
            writer.advance();
            // three quarters of the rows stay missing
            if rng.gen_bool(0.25) {
                let value = rng.gen_range(-3.0..3.0);
                writer.set(0, value);
                expected.push(value);
            } else {
                expected.push(f64::NAN);
            }
        }
        let table = writer.create().unwrap();
        let column = table.column(0).as_numeric().unwrap();
        let sparse = column.as_sparse().expect("column should be sparse");
        assert!(sparse.default_value().is_nan());

        let mut buf = vec![0.0; rows];
        column.fill(&mut buf, 0);
        for (expected, actual) in expected.iter().zip(&buf) {
            assert!(
                expected.to_bits() == actual.to_bits()
                    || (expected.is_nan() && actual.is_nan())
            );
        }
    }

    #[test]
    fn columns_that_stop_being_sparse_are_densified() {
        let mut writer = NumericRowWriter::new(["a"], &[TypeId::Real], false).unwrap();
        for _ in 0..MAX_CHECK_FOR_SPARSITY_ROW {
            writer.advance();
            writer.set(0, 5.0);
        }
        // by now the column has adopted the default 5.0; drown it in
        // distinct values so the default share collapses
        let mut rng = rand::thread_rng();
        for _ in 0..4 * MAX_CHECK_FOR_SPARSITY_ROW {
            writer.advance();
            writer.set(0, rng.gen_range(10.0..100.0));
        }
        let table = writer.create().unwrap();
        let column = table.column(0).as_numeric().unwrap();
        assert!(column.as_sparse().is_none());
        assert_eq!(column.get(0), 5.0);
    }

    #[test]
    fn small_writers_check_sparsity_at_create() {
        let mut writer = NumericRowWriter::new(["a"], &[TypeId::Real], false).unwrap();
        for _ in 0..100 {
            writer.advance();
            writer.set(0, 2.5);
        }
        let table = writer.create().unwrap();
        let column = table.column(0).as_numeric().unwrap();
        let sparse = column.as_sparse().expect("column should be sparse");
        assert_eq!(sparse.default_value(), 2.5);
    }

    #[test]
    fn display_formats_height_and_width() {
        let mut writer =
            NumericRowWriter::new(["a", "b"], &[TypeId::Real, TypeId::Real], false).unwrap();
        writer.advance();
        writer.advance();
        assert_eq!(writer.to_string(), "Row writer (2x2)");
    }
}

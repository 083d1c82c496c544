//! Cursor-style readers delivering column values sequentially.
//!
//! Readers pull values through the bulk fill kernels into a small internal
//! buffer, so sequential consumption of a column pays the per-variant
//! dispatch once per buffer instead of once per row.

use crate::column::{Capability, Column};

/// Number of values a reader buffers between refills.
pub const SMALL_BUFFER_SIZE: usize = 2048;

/// A cursor over a numeric-readable column.
pub struct NumericReader<'a> {
    column: &'a Column,
    buffer: Vec<f64>,
    buffer_start: usize,
    position: usize,
}

impl<'a> NumericReader<'a> {
    /// # Panics
    ///
    /// Panics if the column is not numeric-readable.
    pub fn new(column: &'a Column) -> Self {
        assert!(
            column.has_capability(Capability::NumericReadable),
            "column of type {} is not numeric-readable",
            column.type_id()
        );
        Self {
            column,
            buffer: Vec::new(),
            buffer_start: 0,
            position: 0,
        }
    }

    /// The next value; advances the cursor.
    ///
    /// # Panics
    ///
    /// Panics when reading past the end of the column.
    pub fn read(&mut self) -> f64 {
        assert!(
            self.position < self.column.len(),
            "read past the end of the column"
        );
        if self.position < self.buffer_start
            || self.position >= self.buffer_start + self.buffer.len()
        {
            self.refill();
        }
        let value = self.buffer[self.position - self.buffer_start];
        self.position += 1;
        value
    }

    fn refill(&mut self) {
        let n = SMALL_BUFFER_SIZE.min(self.column.len() - self.position);
        self.buffer.clear();
        self.buffer.resize(n, 0.0);
        self.column.fill(&mut self.buffer, self.position);
        self.buffer_start = self.position;
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.column.len()
    }

    pub fn remaining(&self) -> usize {
        self.column.len() - self.position
    }

    /// The row the next [`read`](Self::read) will deliver.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor so that the next read delivers `row`.
    pub fn set_position(&mut self, row: usize) {
        self.position = row;
    }
}

/// A cursor over an index-readable column yielding dictionary indices.
pub struct IndexReader<'a> {
    column: &'a Column,
    buffer: Vec<u32>,
    buffer_start: usize,
    position: usize,
}

impl<'a> IndexReader<'a> {
    /// # Panics
    ///
    /// Panics if the column is not index-readable.
    pub fn new(column: &'a Column) -> Self {
        assert!(
            column.has_capability(Capability::IndexReadable),
            "column of type {} is not index-readable",
            column.type_id()
        );
        Self {
            column,
            buffer: Vec::new(),
            buffer_start: 0,
            position: 0,
        }
    }

    /// The next dictionary index; advances the cursor.
    ///
    /// # Panics
    ///
    /// Panics when reading past the end of the column.
    pub fn read(&mut self) -> u32 {
        assert!(
            self.position < self.column.len(),
            "read past the end of the column"
        );
        if self.position < self.buffer_start
            || self.position >= self.buffer_start + self.buffer.len()
        {
            self.refill();
        }
        let value = self.buffer[self.position - self.buffer_start];
        self.position += 1;
        value
    }

    fn refill(&mut self) {
        let n = SMALL_BUFFER_SIZE.min(self.column.len() - self.position);
        self.buffer.clear();
        self.buffer.resize(n, 0);
        self.column.fill_indices(&mut self.buffer, self.position);
        self.buffer_start = self.position;
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.column.len()
    }

    pub fn remaining(&self) -> usize {
        self.column.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, row: usize) {
        self.position = row;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::Rng;

    use super::*;
    use crate::{
        column::{CategoricalColumn, NumericColumn, TypeId},
        dictionary::Dictionary,
    };

    #[test]
    fn sequential_reads_match_fill() {
        let mut rng = rand::thread_rng();
        // more than one buffer refill
        let data = (0..3 * SMALL_BUFFER_SIZE + 17)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect::<Vec<_>>();
        let column = Column::Numeric(NumericColumn::dense(TypeId::Real, data.clone()));
        let mut reader = NumericReader::new(&column);
        for &expected in &data {
            assert!(reader.has_remaining());
            assert_eq!(reader.read(), expected);
        }
        assert!(!reader.has_remaining());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn set_position_rewinds() {
        let column = Column::Numeric(NumericColumn::dense(
            TypeId::Real,
            vec![0.0, 1.0, 2.0, 3.0],
        ));
        let mut reader = NumericReader::new(&column);
        assert_eq!(reader.read(), 0.0);
        reader.set_position(3);
        assert_eq!(reader.read(), 3.0);
        reader.set_position(1);
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.read(), 1.0);
    }

    #[test]
    fn index_reader_yields_indices() {
        let dict = Arc::new(Dictionary::new(["a", "b"]));
        let indices = vec![1_u32, 0, 2, 2];
        let column =
            Column::Categorical(CategoricalColumn::from_indices(dict, &indices).unwrap());
        let mut reader = IndexReader::new(&column);
        let read = (0..indices.len()).map(|_| reader.read()).collect::<Vec<_>>();
        assert_eq!(read, indices);
    }

    #[test]
    #[should_panic(expected = "not index-readable")]
    fn index_reader_requires_capability() {
        let column = Column::Numeric(NumericColumn::dense(TypeId::Real, vec![1.0]));
        IndexReader::new(&column);
    }

    #[test]
    #[should_panic(expected = "read past the end")]
    fn reading_past_the_end_panics() {
        let column = Column::Numeric(NumericColumn::dense(TypeId::Real, vec![1.0]));
        let mut reader = NumericReader::new(&column);
        reader.read();
        reader.read();
    }
}

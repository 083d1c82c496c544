//! Growing column storage behind the row writers.
//!
//! Values arrive in small flushed batches and accumulate in an array of
//! chunks whose sizes double, so no flush ever moves previously stored
//! data. Numeric storage exists in a dense and a sparse flavor; the writer
//! may swap a column from dense to sparse once enough data has been seen,
//! and back if the data stops being sparse.

use columnar::column::{NumericColumn, TypeId};
use tracing::debug;

use crate::Result;

/// Default capacity of the first storage chunk; later chunks double.
pub const DEFAULT_INITIAL_CHUNK_SIZE: usize = 4096;

const MAX_INITIAL_CHUNK_SIZE: usize = 1 << 20;

/// Configuration shared by all column builders of one writer.
#[derive(Debug, Clone, Copy)]
pub struct ArrayBuilderConfig {
    pub initial_chunk_size: usize,
}

impl ArrayBuilderConfig {
    /// Sizes the first chunk for an expected number of rows.
    pub fn with_row_hint(rows: usize) -> Self {
        Self {
            initial_chunk_size: rows.clamp(1, MAX_INITIAL_CHUNK_SIZE),
        }
    }
}

impl Default for ArrayBuilderConfig {
    fn default() -> Self {
        Self {
            initial_chunk_size: DEFAULT_INITIAL_CHUNK_SIZE,
        }
    }
}

/// An array of chunks with doubling capacities.
#[derive(Debug)]
pub(crate) struct ChunkedBuilder<T> {
    chunks: Vec<Vec<T>>,
    next_chunk_size: usize,
    len: usize,
}

impl<T: Copy> ChunkedBuilder<T> {
    pub(crate) fn new(config: ArrayBuilderConfig) -> Self {
        Self {
            chunks: Vec::new(),
            next_chunk_size: config.initial_chunk_size.max(1),
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn push_slice(&mut self, values: &[T]) {
        let mut rest = values;
        while !rest.is_empty() {
            if self
                .chunks
                .last()
                .map_or(true, |chunk| chunk.len() == chunk.capacity())
            {
                let size = self.next_chunk_size;
                self.next_chunk_size = size.saturating_mul(2);
                self.chunks.push(Vec::with_capacity(size));
            }
            let last = self.chunks.len() - 1;
            let chunk = &mut self.chunks[last];
            let take = rest.len().min(chunk.capacity() - chunk.len());
            chunk.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            self.len += take;
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.chunks.iter().flatten()
    }

    pub(crate) fn into_vec(self) -> Vec<T> {
        let mut data = Vec::with_capacity(self.len);
        for chunk in self.chunks {
            data.extend(chunk);
        }
        data
    }
}

fn same_value(left: f64, right: f64) -> bool {
    left.to_bits() == right.to_bits() || (left.is_nan() && right.is_nan())
}

/// Storage for one numeric column of a row writer.
#[derive(Debug)]
pub(crate) enum NumericBuilder {
    Dense(ChunkedBuilder<f64>),
    Sparse(SparseNumericBuilder),
}

impl NumericBuilder {
    pub(crate) fn new(config: ArrayBuilderConfig) -> Self {
        NumericBuilder::Dense(ChunkedBuilder::new(config))
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            NumericBuilder::Dense(dense) => dense.len(),
            NumericBuilder::Sparse(sparse) => sparse.len,
        }
    }

    pub(crate) fn push_slice(&mut self, values: &[f64]) {
        match self {
            NumericBuilder::Dense(dense) => dense.push_slice(values),
            NumericBuilder::Sparse(sparse) => sparse.push_slice(values),
        }
    }

    pub(crate) fn is_sparse(&self) -> bool {
        matches!(self, NumericBuilder::Sparse(_))
    }

    /// Replaces dense storage with sparse storage around `default`,
    /// keeping all stored values bit-exact. The default stays fixed for
    /// the rest of the column's life.
    pub(crate) fn adopt_sparse(&mut self, default: f64) {
        let NumericBuilder::Dense(dense) = self else {
            return;
        };
        let mut sparse = SparseNumericBuilder::new(default);
        for chunk in &dense.chunks {
            sparse.push_slice(chunk);
        }
        debug!(
            rows = sparse.len,
            deviating = sparse.values.len(),
            "column storage switched to sparse"
        );
        *self = NumericBuilder::Sparse(sparse);
    }

    /// The share of rows holding the sparse default, `None` for dense
    /// storage.
    pub(crate) fn default_frequency(&self) -> Option<f64> {
        match self {
            NumericBuilder::Dense(_) => None,
            NumericBuilder::Sparse(sparse) if sparse.len == 0 => Some(1.0),
            NumericBuilder::Sparse(sparse) => {
                Some((sparse.len - sparse.values.len()) as f64 / sparse.len as f64)
            }
        }
    }

    /// Expands sparse storage back into dense storage.
    pub(crate) fn densify(&mut self, config: ArrayBuilderConfig) {
        let NumericBuilder::Sparse(sparse) = self else {
            return;
        };
        debug!(rows = sparse.len, "column storage switched back to dense");
        let mut data = vec![sparse.default; sparse.len];
        for (&row, &value) in sparse.rows.iter().zip(&sparse.values) {
            data[row as usize] = value;
        }
        let mut dense = ChunkedBuilder::new(config);
        dense.push_slice(&data);
        *self = NumericBuilder::Dense(dense);
    }

    /// The most frequent eligible value (finite or `NaN`) and its relative
    /// frequency over all stored rows. `None` while no rows are stored or
    /// for sparse storage.
    pub(crate) fn dominant_value(&self) -> Option<(f64, f64)> {
        let NumericBuilder::Dense(dense) = self else {
            return None;
        };
        if dense.len() == 0 {
            return None;
        }
        let mut counts = std::collections::HashMap::new();
        for &value in dense.iter() {
            let key = if value.is_nan() {
                f64::NAN.to_bits()
            } else {
                value.to_bits()
            };
            *counts.entry(key).or_insert(0_usize) += 1;
        }
        counts
            .into_iter()
            .map(|(bits, count)| (f64::from_bits(bits), count))
            .filter(|(value, _)| value.is_finite() || value.is_nan())
            .max_by_key(|&(_, count)| count)
            .map(|(value, count)| (value, count as f64 / dense.len() as f64))
    }

    pub(crate) fn finish(self, type_id: TypeId) -> Result<NumericColumn> {
        match self {
            NumericBuilder::Dense(dense) => {
                Ok(NumericColumn::dense(type_id, dense.into_vec()))
            }
            NumericBuilder::Sparse(sparse) => Ok(NumericColumn::sparse(
                type_id,
                sparse.default,
                sparse.rows,
                sparse.values,
                sparse.len,
            )?),
        }
    }
}

/// Sparse storage: only rows deviating from the fixed default are kept.
#[derive(Debug)]
pub(crate) struct SparseNumericBuilder {
    default: f64,
    len: usize,
    rows: Vec<u32>,
    values: Vec<f64>,
}

impl SparseNumericBuilder {
    fn new(default: f64) -> Self {
        Self {
            default,
            len: 0,
            rows: Vec::new(),
            values: Vec::new(),
        }
    }

    fn push_slice(&mut self, values: &[f64]) {
        for &value in values {
            if !same_value(value, self.default) {
                self.rows.push(self.len as u32);
                self.values.push(value);
            }
            self.len += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn chunked_builder_round_trip() {
        let config = ArrayBuilderConfig {
            initial_chunk_size: 8,
        };
        let mut builder = ChunkedBuilder::new(config);
        let values = (0..1000).map(|i| i as f64).collect::<Vec<_>>();
        for batch in values.chunks(13) {
            builder.push_slice(batch);
        }
        assert_eq!(builder.len(), values.len());
        assert_eq!(builder.into_vec(), values);
    }

    #[test]
    fn sparse_adoption_preserves_values_bit_exactly() {
        let mut rng = rand::thread_rng();
        let values = (0..5000)
            .map(|_| {
                if rng.gen_bool(0.8) {
                    f64::NAN
                } else {
                    rng.gen_range(-10.0..10.0)
                }
            })
            .collect::<Vec<_>>();
        let mut builder = NumericBuilder::new(ArrayBuilderConfig::default());
        builder.push_slice(&values);

        let (dominant, frequency) = builder.dominant_value().unwrap();
        assert!(dominant.is_nan());
        assert!(frequency > 0.7);

        builder.adopt_sparse(dominant);
        assert!(builder.is_sparse());
        // keep appending after the swap
        builder.push_slice(&[1.5, f64::NAN]);

        let column = builder.finish(TypeId::Real).unwrap();
        assert_eq!(column.len(), values.len() + 2);
        let mut buf = vec![0.0; column.len()];
        column.fill(&mut buf, 0);
        for (expected, actual) in values.iter().chain([1.5, f64::NAN].iter()).zip(&buf) {
            assert!(
                expected.to_bits() == actual.to_bits()
                    || (expected.is_nan() && actual.is_nan())
            );
        }
    }

    #[test]
    fn densify_restores_dense_storage() {
        let mut builder = NumericBuilder::new(ArrayBuilderConfig::default());
        builder.push_slice(&[5.0; 100]);
        builder.adopt_sparse(5.0);
        builder.push_slice(&[1.0, 2.0, 3.0]);
        assert!(builder.default_frequency().unwrap() < 1.0);

        builder.densify(ArrayBuilderConfig::default());
        assert!(!builder.is_sparse());
        let column = builder.finish(TypeId::Real).unwrap();
        assert_eq!(column.len(), 103);
        assert_eq!(column.get(0), 5.0);
        assert_eq!(column.get(102), 3.0);
    }

    #[test]
    fn infinite_values_are_not_eligible_defaults() {
        let mut builder = NumericBuilder::new(ArrayBuilderConfig::default());
        let mut values = vec![f64::INFINITY; 90];
        values.extend([1.0; 10]);
        builder.push_slice(&values);
        let (dominant, _) = builder.dominant_value().unwrap();
        assert_eq!(dominant, 1.0);
    }
}

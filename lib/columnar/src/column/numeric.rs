//! Numeric columns backed by `f64` buffers.
//!
//! Both real and 53-bit integer columns store `f64` values; integer columns
//! only ever contain values that were rounded on the way in. Missing values
//! are `NaN`.

use std::sync::Arc;

use crate::{column::TypeId, mapping::compose, Error, Result};

/// Compares values bit-exactly, except that all `NaN` payloads count as the
/// same value.
pub(crate) fn same_value(left: f64, right: f64) -> bool {
    left.to_bits() == right.to_bits() || (left.is_nan() && right.is_nan())
}

/// The non-default rows of a sparse numeric column, in canonical form:
/// strictly increasing rows inside `0..len` whose values differ from the
/// default.
#[derive(Debug, Clone)]
pub struct SparseNumeric {
    len: usize,
    default: f64,
    rows: Arc<[u32]>,
    values: Arc<[f64]>,
}

impl SparseNumeric {
    pub fn new(
        default: f64,
        rows: Arc<[u32]>,
        values: Arc<[f64]>,
        len: usize,
    ) -> Result<Self> {
        if rows.len() != values.len() {
            return Err(Error::SparseLengthMismatch {
                rows: rows.len(),
                values: values.len(),
            });
        }
        for (position, (&row, &value)) in rows.iter().zip(values.iter()).enumerate() {
            if position > 0 && rows[position - 1] >= row {
                return Err(Error::UnsortedSparseRow { position, row });
            }
            if row as usize >= len {
                return Err(Error::SparseRowOutOfRange { row, len });
            }
            if same_value(value, default) {
                return Err(Error::SparseDefaultValue { position });
            }
        }
        Ok(Self {
            len,
            default,
            rows,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    fn get(&self, row: usize) -> f64 {
        match self.rows.binary_search(&(row as u32)) {
            Ok(position) => self.values[position],
            Err(_) => self.default,
        }
    }

    /// Reconstructs the dense rows `start..start + buf.len()`.
    fn fill_range(&self, buf: &mut [f64], start: usize) {
        buf.fill(self.default);
        let end = start + buf.len();
        let from = self.rows.partition_point(|&row| (row as usize) < start);
        for (&row, &value) in self.rows[from..].iter().zip(&self.values[from..]) {
            let row = row as usize;
            if row >= end {
                break;
            }
            buf[row - start] = value;
        }
    }
}

#[derive(Debug, Clone)]
enum NumericRepr {
    Dense(Arc<[f64]>),
    Sparse(SparseNumeric),
    Mapped {
        data: Arc<[f64]>,
        mapping: Arc<[i32]>,
    },
    MappedSparse {
        sparse: SparseNumeric,
        mapping: Arc<[i32]>,
    },
}

/// An immutable column of `f64` values.
#[derive(Debug, Clone)]
pub struct NumericColumn {
    type_id: TypeId,
    len: usize,
    repr: NumericRepr,
}

impl NumericColumn {
    /// Creates a dense column.
    ///
    /// # Panics
    ///
    /// Panics if `type_id` is not a numeric type.
    pub fn dense(type_id: TypeId, data: impl Into<Arc<[f64]>>) -> Self {
        assert!(
            type_id.category() == super::Category::Numeric,
            "{type_id} is not a numeric type"
        );
        let data = data.into();
        Self {
            type_id,
            len: data.len(),
            repr: NumericRepr::Dense(data),
        }
    }

    /// Creates a sparse column of length `len` holding `default` everywhere
    /// except at the given rows.
    ///
    /// # Panics
    ///
    /// Panics if `type_id` is not a numeric type.
    pub fn sparse(
        type_id: TypeId,
        default: f64,
        rows: impl Into<Arc<[u32]>>,
        values: impl Into<Arc<[f64]>>,
        len: usize,
    ) -> Result<Self> {
        assert!(
            type_id.category() == super::Category::Numeric,
            "{type_id} is not a numeric type"
        );
        let sparse = SparseNumeric::new(default, rows.into(), values.into(), len)?;
        Ok(Self {
            type_id,
            len,
            repr: NumericRepr::Sparse(sparse),
        })
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The sparse payload, if this column is stored sparsely.
    pub fn as_sparse(&self) -> Option<&SparseNumeric> {
        match &self.repr {
            NumericRepr::Sparse(sparse) => Some(sparse),
            NumericRepr::MappedSparse { sparse, .. } => Some(sparse),
            _ => None,
        }
    }

    /// The value at `row`, `NaN` for missing.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn get(&self, row: usize) -> f64 {
        assert!(row < self.len, "row {row} out of range for {}", self.len);
        match &self.repr {
            NumericRepr::Dense(data) => data[row],
            NumericRepr::Sparse(sparse) => sparse.get(row),
            NumericRepr::Mapped { data, mapping } => {
                match view_row(mapping, row, data.len()) {
                    Some(source) => data[source],
                    None => f64::NAN,
                }
            }
            NumericRepr::MappedSparse { sparse, mapping } => {
                match view_row(mapping, row, sparse.len()) {
                    Some(source) => sparse.get(source),
                    None => f64::NAN,
                }
            }
        }
    }

    /// Copies the rows `start..` into the prefix of `buf` that is covered by
    /// the column; the rest of `buf` is left untouched.
    pub fn fill(&self, buf: &mut [f64], start: usize) {
        let n = buf.len().min(self.len.saturating_sub(start));
        if n == 0 {
            return;
        }
        match &self.repr {
            NumericRepr::Dense(data) => buf[..n].copy_from_slice(&data[start..start + n]),
            NumericRepr::Sparse(sparse) => sparse.fill_range(&mut buf[..n], start),
            NumericRepr::Mapped { data, mapping } => {
                for (slot, &row) in buf[..n].iter_mut().zip(&mapping[start..start + n]) {
                    *slot = if row >= 0 && (row as usize) < data.len() {
                        data[row as usize]
                    } else {
                        f64::NAN
                    };
                }
            }
            NumericRepr::MappedSparse { sparse, mapping } => {
                for (slot, &row) in buf[..n].iter_mut().zip(&mapping[start..start + n]) {
                    *slot = if row >= 0 && (row as usize) < sparse.len() {
                        sparse.get(row as usize)
                    } else {
                        f64::NAN
                    };
                }
            }
        }
    }

    /// Writes the rows `start..` to the positions `offset`, `offset +
    /// stride`, ... of `buf` until the buffer is exhausted. Positions whose
    /// source row lies past the end of the column receive `NaN`; positions
    /// between the written ones are left untouched.
    ///
    /// # Panics
    ///
    /// Panics if `stride` is zero.
    pub fn fill_interleaved(&self, buf: &mut [f64], start: usize, offset: usize, stride: usize) {
        assert!(stride >= 1, "stride must be positive");
        let from = offset.min(buf.len());
        match &self.repr {
            NumericRepr::Dense(data) => {
                let mut row = start;
                for slot in buf[from..].iter_mut().step_by(stride) {
                    *slot = if row < data.len() { data[row] } else { f64::NAN };
                    row += 1;
                }
            }
            _ => {
                let mut row = start;
                for slot in buf[from..].iter_mut().step_by(stride) {
                    *slot = if row < self.len { self.get(row) } else { f64::NAN };
                    row += 1;
                }
            }
        }
    }

    /// Applies a row mapping, producing either a lazy view or an eagerly
    /// materialized column. Both read identically; mapping an existing view
    /// composes the mappings instead of stacking views.
    pub fn map(&self, mapping: &Arc<[i32]>, prefer_view: bool) -> Self {
        if prefer_view {
            let repr = match &self.repr {
                NumericRepr::Dense(data) => NumericRepr::Mapped {
                    data: data.clone(),
                    mapping: mapping.clone(),
                },
                NumericRepr::Sparse(sparse) => NumericRepr::MappedSparse {
                    sparse: sparse.clone(),
                    mapping: mapping.clone(),
                },
                NumericRepr::Mapped { data, mapping: old } => NumericRepr::Mapped {
                    data: data.clone(),
                    mapping: compose(old, mapping).into(),
                },
                NumericRepr::MappedSparse {
                    sparse,
                    mapping: old,
                } => NumericRepr::MappedSparse {
                    sparse: sparse.clone(),
                    mapping: compose(old, mapping).into(),
                },
            };
            Self {
                type_id: self.type_id,
                len: mapping.len(),
                repr,
            }
        } else {
            let data = mapping
                .iter()
                .map(|&row| {
                    if row >= 0 && (row as usize) < self.len {
                        self.get(row as usize)
                    } else {
                        f64::NAN
                    }
                })
                .collect::<Vec<_>>();
            Self {
                type_id: self.type_id,
                len: data.len(),
                repr: NumericRepr::Dense(data.into()),
            }
        }
    }
}

pub(crate) fn view_row(mapping: &[i32], row: usize, source_len: usize) -> Option<usize> {
    let source = mapping[row];
    (source >= 0 && (source as usize) < source_len).then_some(source as usize)
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn real(data: &[f64]) -> NumericColumn {
        NumericColumn::dense(TypeId::Real, data.to_vec())
    }

    #[test]
    fn fill_writes_covered_prefix_only() {
        let column = real(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let mut buf = [7.0; 4];
        column.fill(&mut buf, 3);
        assert_eq!(buf, [3.0, 4.0, 7.0, 7.0]);

        let mut buf = [7.0; 4];
        column.fill(&mut buf, 100);
        assert_eq!(buf, [7.0; 4]);
    }

    #[test]
    fn fill_interleaved_pads_with_nan() {
        let column = real(&[1.0, 2.0, 3.0]);
        let mut buf = [0.0; 8];
        column.fill_interleaved(&mut buf, 1, 1, 3);
        assert_eq!(buf[1], 2.0);
        assert_eq!(buf[4], 3.0);
        assert!(buf[7].is_nan());
        // untouched positions
        assert_eq!([buf[0], buf[2], buf[3], buf[5], buf[6]], [0.0; 5]);
    }

    #[test]
    fn fill_interleaved_past_buffer_is_noop() {
        let column = real(&[1.0, 2.0]);
        let mut buf = [5.0; 3];
        column.fill_interleaved(&mut buf, 0, 3, 1);
        assert_eq!(buf, [5.0; 3]);
    }

    #[test]
    #[should_panic(expected = "stride must be positive")]
    fn zero_stride_panics() {
        let column = real(&[1.0]);
        let mut buf = [0.0; 2];
        column.fill_interleaved(&mut buf, 0, 0, 0);
    }

    #[test]
    fn sparse_round_trip() {
        let mut rng = rand::thread_rng();
        let len = 10_000;
        let mut dense = vec![f64::NAN; len];
        let mut rows = Vec::new();
        let mut values = Vec::new();
        for (row, slot) in dense.iter_mut().enumerate() {
            if rng.gen_bool(0.25) {
                let value = rng.gen_range(-100.0..100.0);
                *slot = value;
                rows.push(row as u32);
                values.push(value);
            }
        }
        let column =
            NumericColumn::sparse(TypeId::Real, f64::NAN, rows, values, len).unwrap();

        let mut buf = vec![0.0; len];
        column.fill(&mut buf, 0);
        for (expected, actual) in dense.iter().zip(&buf) {
            assert_eq!(expected.to_bits(), actual.to_bits());
        }
        for _ in 0..100 {
            let row = rng.gen_range(0..len);
            assert_eq!(column.get(row).to_bits(), dense[row].to_bits());
        }
    }

    #[test]
    fn sparse_validation() {
        let unsorted = NumericColumn::sparse(TypeId::Real, 0.0, vec![3_u32, 3], vec![1.0, 2.0], 5);
        assert!(matches!(unsorted, Err(Error::UnsortedSparseRow { .. })));

        let out_of_range =
            NumericColumn::sparse(TypeId::Real, 0.0, vec![5_u32], vec![1.0], 5);
        assert!(matches!(out_of_range, Err(Error::SparseRowOutOfRange { .. })));

        let non_canonical =
            NumericColumn::sparse(TypeId::Real, 1.0, vec![2_u32], vec![1.0], 5);
        assert!(matches!(non_canonical, Err(Error::SparseDefaultValue { .. })));

        let nan_default =
            NumericColumn::sparse(TypeId::Real, f64::NAN, vec![2_u32], vec![f64::NAN], 5);
        assert!(matches!(nan_default, Err(Error::SparseDefaultValue { .. })));
    }

    #[test]
    fn mapped_sentinels_read_missing() {
        let column = real(&[10.0, 11.0, 12.0]);
        let mapping: Arc<[i32]> = vec![2, -1, 0, 5].into();
        let view = column.map(&mapping, true);
        assert_eq!(view.len(), 4);
        assert_eq!(view.get(0), 12.0);
        assert!(view.get(1).is_nan());
        assert_eq!(view.get(2), 10.0);
        assert!(view.get(3).is_nan());
    }

    #[test]
    fn view_and_materialized_reads_are_bit_identical() {
        let mut rng = rand::thread_rng();
        let data = (0..500)
            .map(|_| {
                if rng.gen_bool(0.2) {
                    f64::NAN
                } else {
                    rng.gen_range(-1.0..1.0)
                }
            })
            .collect::<Vec<_>>();
        let column = real(&data);
        let mapping: Arc<[i32]> = (0..800)
            .map(|_| rng.gen_range(-10..600))
            .collect::<Vec<_>>()
            .into();

        let view = column.map(&mapping, true);
        let eager = column.map(&mapping, false);
        let mut from_view = vec![0.0; mapping.len()];
        let mut from_eager = vec![0.0; mapping.len()];
        view.fill(&mut from_view, 0);
        eager.fill(&mut from_eager, 0);
        for (left, right) in from_view.iter().zip(&from_eager) {
            assert_eq!(left.to_bits(), right.to_bits());
        }
    }

    #[test]
    fn identity_mapping_reads_like_original() {
        let data = [1.5, f64::NAN, -3.0];
        let column = real(&data);
        let identity: Arc<[i32]> = (0..data.len() as i32).collect::<Vec<_>>().into();
        let mapped = column.map(&identity, true);
        for row in 0..data.len() {
            assert_eq!(mapped.get(row).to_bits(), column.get(row).to_bits());
        }
    }

    #[test]
    fn mapping_a_view_composes() {
        let column = real(&[0.0, 1.0, 2.0, 3.0]);
        let first: Arc<[i32]> = vec![3, 2, 1, 0].into();
        let second: Arc<[i32]> = vec![0, 2, -1].into();
        let view = column.map(&first, true).map(&second, true);
        assert_eq!(view.len(), 3);
        assert_eq!(view.get(0), 3.0);
        assert_eq!(view.get(1), 1.0);
        assert!(view.get(2).is_nan());
    }
}

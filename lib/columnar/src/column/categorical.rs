//! Categorical columns storing dictionary indices in packed form.
//!
//! Five storage widths (2, 4, 8, 16, and 32 bits per index) combine with
//! sparse, mapped, remapped, and remapped-mapped variants. A remapping
//! translates raw stored indices into a merged dictionary, `-1` entries
//! denote values absent from the merged dictionary and read as missing.

use std::sync::Arc;

use crate::{
    column::{numeric::view_row, TypeId},
    dictionary::{Dictionary, MISSING_CATEGORY},
    mapping::{compose, RemapCache},
    packed::{PackedBuilder, PackedFormat, PackedIndices},
    Error, Result,
};

/// The non-default rows of a sparse categorical column, in canonical form:
/// strictly increasing rows inside `0..len` whose raw indices differ from
/// the default.
#[derive(Debug, Clone)]
pub struct SparseIndices {
    len: usize,
    default: u32,
    rows: Arc<[u32]>,
    values: Arc<[u32]>,
}

impl SparseIndices {
    pub fn new(default: u32, rows: Arc<[u32]>, values: Arc<[u32]>, len: usize) -> Result<Self> {
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
            if value == default {
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

    pub fn default_value(&self) -> u32 {
        self.default
    }

    fn max_value(&self) -> u32 {
        self.values.iter().copied().max().unwrap_or(0).max(self.default)
    }

    fn get(&self, row: usize) -> u32 {
        match self.rows.binary_search(&(row as u32)) {
            Ok(position) => self.values[position],
            Err(_) => self.default,
        }
    }

    fn fill_range(&self, buf: &mut [u32], start: usize) {
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
enum CategoricalRepr {
    Dense {
        indices: PackedIndices,
    },
    Sparse(SparseIndices),
    Mapped {
        indices: PackedIndices,
        mapping: Arc<[i32]>,
    },
    Remapped {
        indices: PackedIndices,
        remap: Arc<[i32]>,
    },
    RemappedMapped {
        indices: PackedIndices,
        remap: Arc<[i32]>,
        mapping: Arc<[i32]>,
    },
}

/// An immutable column of dictionary indices.
///
/// Index `0` is the missing value. Reads always yield indices into
/// [`dictionary`](Self::dictionary), regardless of the storage variant.
#[derive(Debug, Clone)]
pub struct CategoricalColumn {
    type_id: TypeId,
    len: usize,
    dict: Arc<Dictionary>,
    repr: CategoricalRepr,
}

impl CategoricalColumn {
    /// Creates a dense column over already packed indices.
    pub fn dense(dict: Arc<Dictionary>, indices: PackedIndices) -> Result<Self> {
        for row in 0..indices.len() {
            let index = indices.get(row);
            if index as usize >= dict.len() {
                return Err(Error::CategoryIndexOutOfRange {
                    index,
                    len: dict.len(),
                });
            }
        }
        Ok(Self {
            type_id: TypeId::Nominal,
            len: indices.len(),
            dict,
            repr: CategoricalRepr::Dense { indices },
        })
    }

    /// Packs `indices` at the narrowest width fitting the dictionary.
    pub fn from_indices(dict: Arc<Dictionary>, indices: &[u32]) -> Result<Self> {
        let format = PackedFormat::minimal_for(dict.len());
        let mut builder = PackedBuilder::with_capacity(format, indices.len());
        for &index in indices {
            if index as usize >= dict.len() {
                return Err(Error::CategoryIndexOutOfRange {
                    index,
                    len: dict.len(),
                });
            }
            builder.push(index);
        }
        Ok(Self {
            type_id: TypeId::Nominal,
            len: indices.len(),
            dict,
            repr: CategoricalRepr::Dense {
                indices: builder.freeze(),
            },
        })
    }

    /// Creates a sparse column of length `len` holding the `default` index
    /// everywhere except at the given rows.
    pub fn sparse(
        dict: Arc<Dictionary>,
        default: u32,
        rows: impl Into<Arc<[u32]>>,
        values: impl Into<Arc<[u32]>>,
        len: usize,
    ) -> Result<Self> {
        let sparse = SparseIndices::new(default, rows.into(), values.into(), len)?;
        let max = sparse.max_value();
        if max as usize >= dict.len() {
            return Err(Error::CategoryIndexOutOfRange {
                index: max,
                len: dict.len(),
            });
        }
        Ok(Self {
            type_id: TypeId::Nominal,
            len,
            dict,
            repr: CategoricalRepr::Sparse(sparse),
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

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dict
    }

    /// Whether this column is a lazily mapped view.
    pub fn has_view_mapping(&self) -> bool {
        matches!(
            self.repr,
            CategoricalRepr::Mapped { .. } | CategoricalRepr::RemappedMapped { .. }
        )
    }

    /// The index at `row`, `0` for missing.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn get_index(&self, row: usize) -> u32 {
        assert!(row < self.len, "row {row} out of range for {}", self.len);
        match &self.repr {
            CategoricalRepr::Dense { indices } => indices.get(row),
            CategoricalRepr::Sparse(sparse) => sparse.get(row),
            CategoricalRepr::Mapped { indices, mapping } => {
                match view_row(mapping, row, indices.len()) {
                    Some(source) => indices.get(source),
                    None => MISSING_CATEGORY,
                }
            }
            CategoricalRepr::Remapped { indices, remap } => {
                apply_remap(remap, indices.get(row))
            }
            CategoricalRepr::RemappedMapped {
                indices,
                remap,
                mapping,
            } => match view_row(mapping, row, indices.len()) {
                Some(source) => apply_remap(remap, indices.get(source)),
                None => MISSING_CATEGORY,
            },
        }
    }

    /// The dictionary value at `row`, `None` for missing.
    pub fn get_value(&self, row: usize) -> Option<&str> {
        self.dict.get(self.get_index(row))
    }

    /// Copies the indices of rows `start..` into the covered prefix of
    /// `buf`; the rest of `buf` is left untouched.
    pub fn fill_indices(&self, buf: &mut [u32], start: usize) {
        let n = buf.len().min(self.len.saturating_sub(start));
        if n == 0 {
            return;
        }
        match &self.repr {
            CategoricalRepr::Dense { indices } => indices.fill(&mut buf[..n], start),
            CategoricalRepr::Sparse(sparse) => sparse.fill_range(&mut buf[..n], start),
            CategoricalRepr::Mapped { indices, mapping } => {
                for (slot, &row) in buf[..n].iter_mut().zip(&mapping[start..start + n]) {
                    *slot = if row >= 0 && (row as usize) < indices.len() {
                        indices.get(row as usize)
                    } else {
                        MISSING_CATEGORY
                    };
                }
            }
            CategoricalRepr::Remapped { indices, remap } => {
                indices.fill(&mut buf[..n], start);
                for slot in &mut buf[..n] {
                    *slot = apply_remap(remap, *slot);
                }
            }
            CategoricalRepr::RemappedMapped {
                indices,
                remap,
                mapping,
            } => {
                for (slot, &row) in buf[..n].iter_mut().zip(&mapping[start..start + n]) {
                    *slot = if row >= 0 && (row as usize) < indices.len() {
                        apply_remap(remap, indices.get(row as usize))
                    } else {
                        MISSING_CATEGORY
                    };
                }
            }
        }
    }

    /// Interleaved variant of [`fill_indices`](Self::fill_indices): writes
    /// the positions `offset`, `offset + stride`, ... until `buf` is
    /// exhausted, padding positions past the end of the column with `0`.
    ///
    /// # Panics
    ///
    /// Panics if `stride` is zero.
    pub fn fill_indices_interleaved(
        &self,
        buf: &mut [u32],
        start: usize,
        offset: usize,
        stride: usize,
    ) {
        assert!(stride >= 1, "stride must be positive");
        let from = offset.min(buf.len());
        let mut row = start;
        for slot in buf[from..].iter_mut().step_by(stride) {
            *slot = if row < self.len {
                self.get_index(row)
            } else {
                MISSING_CATEGORY
            };
            row += 1;
        }
    }

    /// Reads indices numerically: the index as `f64`, missing as `NaN`.
    pub fn fill_numeric(&self, buf: &mut [f64], start: usize) {
        let n = buf.len().min(self.len.saturating_sub(start));
        if n == 0 {
            return;
        }
        let mut indices = vec![0_u32; n];
        self.fill_indices(&mut indices, start);
        for (slot, index) in buf[..n].iter_mut().zip(indices) {
            *slot = index_to_f64(index);
        }
    }

    /// Interleaved numeric read, missing and out-of-column positions as
    /// `NaN`.
    ///
    /// # Panics
    ///
    /// Panics if `stride` is zero.
    pub fn fill_numeric_interleaved(
        &self,
        buf: &mut [f64],
        start: usize,
        offset: usize,
        stride: usize,
    ) {
        assert!(stride >= 1, "stride must be positive");
        let from = offset.min(buf.len());
        let mut row = start;
        for slot in buf[from..].iter_mut().step_by(stride) {
            *slot = if row < self.len {
                index_to_f64(self.get_index(row))
            } else {
                f64::NAN
            };
            row += 1;
        }
    }

    /// Applies a row mapping, see [`map_with_cache`](Self::map_with_cache).
    pub fn map(&self, mapping: &Arc<[i32]>, prefer_view: bool) -> Self {
        self.map_inner(mapping, prefer_view, None)
    }

    /// Applies a row mapping, producing either a lazy view or an eagerly
    /// materialized column; both read identically. Compositions of the new
    /// mapping with an existing view mapping are looked up in `cache`, so
    /// sibling columns sharing one view mapping reuse the composition.
    pub fn map_with_cache(
        &self,
        mapping: &Arc<[i32]>,
        prefer_view: bool,
        cache: &RemapCache,
    ) -> Self {
        self.map_inner(mapping, prefer_view, Some(cache))
    }

    fn map_inner(
        &self,
        mapping: &Arc<[i32]>,
        prefer_view: bool,
        cache: Option<&RemapCache>,
    ) -> Self {
        let composed = |old: &Arc<[i32]>| -> Arc<[i32]> {
            match cache {
                Some(cache) => cache.get_or_compute(old, || compose(old, mapping)),
                None => compose(old, mapping).into(),
            }
        };
        let repr = match (&self.repr, prefer_view) {
            (CategoricalRepr::Dense { indices }, true) => CategoricalRepr::Mapped {
                indices: indices.clone(),
                mapping: mapping.clone(),
            },
            (CategoricalRepr::Mapped { indices, mapping: old }, true) => {
                CategoricalRepr::Mapped {
                    indices: indices.clone(),
                    mapping: composed(old),
                }
            }
            (CategoricalRepr::Remapped { indices, remap }, true) => {
                CategoricalRepr::RemappedMapped {
                    indices: indices.clone(),
                    remap: remap.clone(),
                    mapping: mapping.clone(),
                }
            }
            (
                CategoricalRepr::RemappedMapped {
                    indices,
                    remap,
                    mapping: old,
                },
                true,
            ) => CategoricalRepr::RemappedMapped {
                indices: indices.clone(),
                remap: remap.clone(),
                mapping: composed(old),
            },
            // sparse and eager requests materialize at the minimal width
            _ => {
                let format = PackedFormat::minimal_for(self.dict.len());
                let mut builder = PackedBuilder::with_capacity(format, mapping.len());
                for &row in mapping.iter() {
                    let index = if row >= 0 && (row as usize) < self.len {
                        self.get_index(row as usize)
                    } else {
                        MISSING_CATEGORY
                    };
                    builder.push(index);
                }
                CategoricalRepr::Dense {
                    indices: builder.freeze(),
                }
            }
        };
        Self {
            type_id: self.type_id,
            len: mapping.len(),
            dict: self.dict.clone(),
            repr,
        }
    }

    /// Translates this column into the merged dictionary `dict` through
    /// `remap`, which must cover the current dictionary and may send
    /// vanished values to `-1` (read as missing afterwards).
    pub fn remap(
        &self,
        dict: Arc<Dictionary>,
        remap: impl Into<Arc<[i32]>>,
        prefer_view: bool,
    ) -> Result<Self> {
        let remap = remap.into();
        if remap.len() != self.dict.len() {
            return Err(Error::RemappingLength {
                len: remap.len(),
                expected: self.dict.len(),
            });
        }
        for &index in remap.iter() {
            if index < -1 || (index >= 0 && index as usize >= dict.len()) {
                return Err(Error::RemappedIndexOutOfRange {
                    index,
                    len: dict.len(),
                });
            }
        }
        let repr = if prefer_view {
            match &self.repr {
                CategoricalRepr::Dense { indices } => CategoricalRepr::Remapped {
                    indices: indices.clone(),
                    remap,
                },
                CategoricalRepr::Mapped { indices, mapping } => {
                    CategoricalRepr::RemappedMapped {
                        indices: indices.clone(),
                        remap,
                        mapping: mapping.clone(),
                    }
                }
                CategoricalRepr::Remapped { indices, remap: old } => {
                    CategoricalRepr::Remapped {
                        indices: indices.clone(),
                        remap: compose(&remap, old).into(),
                    }
                }
                CategoricalRepr::RemappedMapped {
                    indices,
                    remap: old,
                    mapping,
                } => CategoricalRepr::RemappedMapped {
                    indices: indices.clone(),
                    remap: compose(&remap, old).into(),
                    mapping: mapping.clone(),
                },
                CategoricalRepr::Sparse(sparse) => {
                    // keep sparse columns sparse by translating in place,
                    // dropping rows whose value collapses onto the new
                    // default to stay canonical
                    let default = apply_remap(&remap, sparse.default);
                    let mut rows = Vec::with_capacity(sparse.rows.len());
                    let mut values = Vec::with_capacity(sparse.values.len());
                    for (&row, &value) in sparse.rows.iter().zip(sparse.values.iter()) {
                        let translated = apply_remap(&remap, value);
                        if translated != default {
                            rows.push(row);
                            values.push(translated);
                        }
                    }
                    CategoricalRepr::Sparse(SparseIndices::new(
                        default,
                        rows.into(),
                        values.into(),
                        sparse.len,
                    )?)
                }
            }
        } else {
            let format = PackedFormat::minimal_for(dict.len());
            let mut builder = PackedBuilder::with_capacity(format, self.len);
            for row in 0..self.len {
                builder.push(apply_remap(&remap, self.get_index(row)));
            }
            CategoricalRepr::Dense {
                indices: builder.freeze(),
            }
        };
        Ok(Self {
            type_id: self.type_id,
            len: self.len,
            dict,
            repr,
        })
    }
}

fn apply_remap(remap: &[i32], raw: u32) -> u32 {
    let index = remap[raw as usize];
    if index < 0 {
        MISSING_CATEGORY
    } else {
        index as u32
    }
}

fn index_to_f64(index: u32) -> f64 {
    if index == MISSING_CATEGORY {
        f64::NAN
    } else {
        f64::from(index)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn nominal(values: &[&str], indices: &[u32]) -> CategoricalColumn {
        let dict = Arc::new(Dictionary::new(values.iter().copied()));
        CategoricalColumn::from_indices(dict, indices).unwrap()
    }

    #[test]
    fn dense_reads_across_widths() {
        let mut rng = rand::thread_rng();
        for dict_len in [3, 9, 40, 300] {
            let values = (0..dict_len - 1)
                .map(|i| format!("v{i}"))
                .collect::<Vec<_>>();
            let dict = Arc::new(Dictionary::new(values));
            let indices = (0..1_000)
                .map(|_| rng.gen_range(0..dict_len as u32))
                .collect::<Vec<_>>();
            let column = CategoricalColumn::from_indices(dict, &indices).unwrap();

            let mut buf = vec![0_u32; indices.len()];
            column.fill_indices(&mut buf, 0);
            assert_eq!(buf, indices);
            for _ in 0..50 {
                let row = rng.gen_range(0..indices.len());
                assert_eq!(column.get_index(row), indices[row]);
            }
        }
    }

    #[test]
    fn construction_rejects_out_of_range_indices() {
        let dict = Arc::new(Dictionary::new(["a"]));
        assert!(matches!(
            CategoricalColumn::from_indices(dict, &[0, 2]),
            Err(Error::CategoryIndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn numeric_reads_yield_nan_for_missing() {
        let column = nominal(&["a", "b"], &[1, 0, 2]);
        let mut buf = [0.0; 3];
        column.fill_numeric(&mut buf, 0);
        assert_eq!(buf[0], 1.0);
        assert!(buf[1].is_nan());
        assert_eq!(buf[2], 2.0);
    }

    #[test]
    fn sparse_round_trip() {
        let dict = Arc::new(Dictionary::new(["a", "b", "c"]));
        let column = CategoricalColumn::sparse(
            dict,
            1,
            vec![2_u32, 5, 6],
            vec![2_u32, 3, 0],
            8,
        )
        .unwrap();
        let mut buf = vec![0_u32; 8];
        column.fill_indices(&mut buf, 0);
        assert_eq!(buf, vec![1, 1, 2, 1, 1, 3, 0, 1]);
        assert_eq!(column.get_index(5), 3);
        assert_eq!(column.get_index(7), 1);
    }

    #[test]
    fn remapped_translates_and_drops() {
        let column = nominal(&["a", "b"], &[1, 2, 0, 1]);
        let merged = Arc::new(Dictionary::new(["x", "a"]));
        // "a" moves to 2, "b" vanishes
        let remapped = column.remap(merged, vec![0, 2, -1], true).unwrap();
        let mut buf = vec![0_u32; 4];
        remapped.fill_indices(&mut buf, 0);
        assert_eq!(buf, vec![2, 0, 0, 2]);
        assert_eq!(remapped.get_value(0), Some("a"));
        assert_eq!(remapped.get_value(1), None);
    }

    #[test]
    fn remap_validation() {
        let column = nominal(&["a", "b"], &[1, 2]);
        let merged = Arc::new(Dictionary::new(["a"]));
        assert!(matches!(
            column.remap(merged.clone(), vec![0, 1], true),
            Err(Error::RemappingLength { len: 2, expected: 3 })
        ));
        assert!(matches!(
            column.remap(merged, vec![0, 1, 9], true),
            Err(Error::RemappedIndexOutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn mapped_and_remapped_compose() {
        let column = nominal(&["a", "b", "c"], &[1, 2, 3, 0]);
        let merged = Arc::new(Dictionary::new(["c", "b", "a"]));
        let remapped = column.remap(merged, vec![0, 3, 2, 1], true).unwrap();
        let mapping: Arc<[i32]> = vec![3, 2, -1, 0].into();
        let view = remapped.map(&mapping, true);
        assert!(view.has_view_mapping());
        assert_eq!(view.get_index(0), 0);
        assert_eq!(view.get_index(1), 1);
        assert_eq!(view.get_index(2), 0);
        assert_eq!(view.get_index(3), 3);

        // a second mapping composes with the first
        let second: Arc<[i32]> = vec![1, 3, 7].into();
        let twice = view.map(&second, true);
        assert_eq!(twice.len(), 3);
        assert_eq!(twice.get_index(0), 1);
        assert_eq!(twice.get_index(1), 3);
        assert_eq!(twice.get_index(2), 0);
    }

    #[test]
    fn view_and_materialized_reads_agree() {
        let mut rng = rand::thread_rng();
        let indices = (0..400).map(|_| rng.gen_range(0..5)).collect::<Vec<_>>();
        let column = nominal(&["a", "b", "c", "d"], &indices);
        let mapping: Arc<[i32]> = (0..300)
            .map(|_| rng.gen_range(-5..450))
            .collect::<Vec<_>>()
            .into();
        let view = column.map(&mapping, true);
        let eager = column.map(&mapping, false);
        for row in 0..mapping.len() {
            assert_eq!(view.get_index(row), eager.get_index(row));
        }
    }

    #[test]
    fn cached_composition_is_shared() {
        let column = nominal(&["a", "b"], &[1, 2, 1]);
        let first: Arc<[i32]> = vec![2, 1, 0].into();
        let left = column.map(&first, true);
        let right = column.map(&first, true);

        let cache = RemapCache::new();
        let second: Arc<[i32]> = vec![0, 2].into();
        let left = left.map_with_cache(&second, true, &cache);
        let right = right.map_with_cache(&second, true, &cache);
        match (&left.repr, &right.repr) {
            (
                CategoricalRepr::Mapped { mapping: a, .. },
                CategoricalRepr::Mapped { mapping: b, .. },
            ) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected mapped views"),
        }
        assert_eq!(left.get_index(0), 1);
        assert_eq!(left.get_index(1), 1);
    }

    #[test]
    fn interleaved_fill_pads_missing() {
        let column = nominal(&["a"], &[1, 1]);
        let mut buf = [9_u32; 6];
        column.fill_indices_interleaved(&mut buf, 1, 0, 2);
        assert_eq!(buf, [1, 9, 0, 9, 0, 9]);
    }
}

//! Column types and their storage representations.
//!
//! A column is an immutable, fixed-length, typed vector. The concrete
//! storage behind a column varies (packed widths, sparse encodings, lazy
//! views), reads go through the bulk fill kernels or the per-row accessors
//! and are oblivious to the variant.

use std::{fmt, sync::Arc};

use crate::mapping::RemapCache;

mod categorical;
mod numeric;
mod object;
mod temporal;

pub use self::{
    categorical::{CategoricalColumn, SparseIndices},
    numeric::{NumericColumn, SparseNumeric},
    object::{ObjectColumn, TextSet},
    temporal::{nanos_of_day, DateTimeColumn, TimeColumn, MISSING_DATE_TIME, MISSING_TIME},
};

/// The concrete type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    /// 64-bit floating point numbers.
    Real,
    /// Integers stored as `f64`, limited to the 53 bits a double can hold
    /// exactly.
    Integer53Bit,
    /// Categorical values over a dictionary.
    Nominal,
    Text,
    TextSet,
    /// Time of day with nanosecond resolution.
    Time,
    /// Instants with second or nanosecond precision.
    DateTime,
}

impl TypeId {
    pub fn category(self) -> Category {
        match self {
            TypeId::Real | TypeId::Integer53Bit => Category::Numeric,
            TypeId::Nominal => Category::Categorical,
            TypeId::Text | TypeId::TextSet => Category::Object,
            TypeId::Time => Category::Time,
            TypeId::DateTime => Category::DateTime,
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeId::Real => "REAL",
            TypeId::Integer53Bit => "INTEGER_53_BIT",
            TypeId::Nominal => "NOMINAL",
            TypeId::Text => "TEXT",
            TypeId::TextSet => "TEXTSET",
            TypeId::Time => "TIME",
            TypeId::DateTime => "DATETIME",
        };
        f.write_str(name)
    }
}

/// The broad behavioral class of a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Numeric,
    Categorical,
    Object,
    Time,
    DateTime,
}

/// What a column can do, beyond existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Rows can be read as `f64` via the numeric fill kernels.
    NumericReadable,
    /// Rows can be read as reference-typed values.
    ObjectReadable,
    /// Rows can be read as dictionary indices.
    IndexReadable,
    /// Rows have a total order.
    Sortable,
    /// Mapping this column again benefits from a shared remap cache.
    CacheMapped,
}

/// An immutable, typed column of fixed length.
#[derive(Debug, Clone)]
pub enum Column {
    Numeric(NumericColumn),
    Categorical(CategoricalColumn),
    Time(TimeColumn),
    DateTime(DateTimeColumn),
    Object(ObjectColumn),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(column) => column.len(),
            Column::Categorical(column) => column.len(),
            Column::Time(column) => column.len(),
            Column::DateTime(column) => column.len(),
            Column::Object(column) => column.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Column::Numeric(column) => column.type_id(),
            Column::Categorical(column) => column.type_id(),
            Column::Time(_) => TypeId::Time,
            Column::DateTime(_) => TypeId::DateTime,
            Column::Object(column) => column.type_id(),
        }
    }

    pub fn category(&self) -> Category {
        self.type_id().category()
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        match self {
            Column::Numeric(_) | Column::Time(_) => {
                vec![Capability::NumericReadable, Capability::Sortable]
            }
            Column::Categorical(column) => {
                let mut capabilities = vec![
                    Capability::NumericReadable,
                    Capability::IndexReadable,
                    Capability::Sortable,
                ];
                if column.has_view_mapping() {
                    capabilities.push(Capability::CacheMapped);
                }
                capabilities
            }
            Column::DateTime(_) => vec![Capability::ObjectReadable, Capability::Sortable],
            Column::Object(_) => vec![Capability::ObjectReadable],
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Reads rows `start..` as `f64` into the covered prefix of `buf`,
    /// leaving the rest untouched.
    ///
    /// # Panics
    ///
    /// Panics if the column is not numeric-readable.
    pub fn fill(&self, buf: &mut [f64], start: usize) {
        match self {
            Column::Numeric(column) => column.fill(buf, start),
            Column::Categorical(column) => column.fill_numeric(buf, start),
            Column::Time(column) => column.fill(buf, start),
            _ => panic!("column of type {} is not numeric-readable", self.type_id()),
        }
    }

    /// Strided variant of [`fill`](Self::fill): writes positions `offset`,
    /// `offset + stride`, ... until `buf` is exhausted, padding positions
    /// past the end of the column with `NaN`.
    ///
    /// # Panics
    ///
    /// Panics if the column is not numeric-readable or `stride` is zero.
    pub fn fill_interleaved(&self, buf: &mut [f64], start: usize, offset: usize, stride: usize) {
        match self {
            Column::Numeric(column) => column.fill_interleaved(buf, start, offset, stride),
            Column::Categorical(column) => {
                column.fill_numeric_interleaved(buf, start, offset, stride)
            }
            Column::Time(column) => column.fill_interleaved(buf, start, offset, stride),
            _ => panic!("column of type {} is not numeric-readable", self.type_id()),
        }
    }

    /// Reads rows `start..` as dictionary indices into the covered prefix
    /// of `buf`, leaving the rest untouched.
    ///
    /// # Panics
    ///
    /// Panics if the column is not index-readable.
    pub fn fill_indices(&self, buf: &mut [u32], start: usize) {
        match self {
            Column::Categorical(column) => column.fill_indices(buf, start),
            _ => panic!("column of type {} is not index-readable", self.type_id()),
        }
    }

    /// Strided variant of [`fill_indices`](Self::fill_indices), padding
    /// positions past the end of the column with `0`.
    ///
    /// # Panics
    ///
    /// Panics if the column is not index-readable or `stride` is zero.
    pub fn fill_indices_interleaved(
        &self,
        buf: &mut [u32],
        start: usize,
        offset: usize,
        stride: usize,
    ) {
        match self {
            Column::Categorical(column) => {
                column.fill_indices_interleaved(buf, start, offset, stride)
            }
            _ => panic!("column of type {} is not index-readable", self.type_id()),
        }
    }

    /// The numeric value at `row`.
    ///
    /// # Panics
    ///
    /// Panics if the column is not numeric-readable or `row` is out of
    /// range.
    pub fn get(&self, row: usize) -> f64 {
        assert!(row < self.len(), "row {row} out of range for {}", self.len());
        let mut buf = [0.0];
        self.fill(&mut buf, row);
        buf[0]
    }

    /// Applies a row mapping to any column type. `prefer_view` hints that a
    /// lazy view is acceptable; both choices read identically.
    pub fn map(&self, mapping: &Arc<[i32]>, prefer_view: bool) -> Column {
        match self {
            Column::Numeric(column) => Column::Numeric(column.map(mapping, prefer_view)),
            Column::Categorical(column) => Column::Categorical(column.map(mapping, prefer_view)),
            Column::Time(column) => Column::Time(column.map(mapping, prefer_view)),
            Column::DateTime(column) => Column::DateTime(column.map(mapping, prefer_view)),
            Column::Object(column) => Column::Object(column.map(mapping, prefer_view)),
        }
    }

    /// Like [`map`](Self::map), with a shared cache for the mapping
    /// compositions of categorical views. Other column types ignore the
    /// cache.
    pub fn map_with_cache(
        &self,
        mapping: &Arc<[i32]>,
        prefer_view: bool,
        cache: &RemapCache,
    ) -> Column {
        match self {
            Column::Categorical(column) => {
                Column::Categorical(column.map_with_cache(mapping, prefer_view, cache))
            }
            other => other.map(mapping, prefer_view),
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericColumn> {
        match self {
            Column::Numeric(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&CategoricalColumn> {
        match self {
            Column::Categorical(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&TimeColumn> {
        match self {
            Column::Time(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<&DateTimeColumn> {
        match self {
            Column::DateTime(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectColumn> {
        match self {
            Column::Object(column) => Some(column),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Column ({}, {})", self.type_id(), self.len())
    }
}

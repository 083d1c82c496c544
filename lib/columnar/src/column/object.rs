//! Object columns holding text and text-set values.

use std::{collections::BTreeSet, sync::Arc};

use crate::column::{numeric::view_row, TypeId};

/// An ordered set of strings, the value type of text-set columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSet {
    values: BTreeSet<String>,
}

impl TextSet {
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates the contained strings in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
enum ObjectData {
    Text(Arc<[Option<Arc<str>>]>),
    TextSet(Arc<[Option<Arc<TextSet>>]>),
}

impl ObjectData {
    fn len(&self) -> usize {
        match self {
            ObjectData::Text(data) => data.len(),
            ObjectData::TextSet(data) => data.len(),
        }
    }
}

#[derive(Debug, Clone)]
enum ObjectRepr {
    Dense(ObjectData),
    Mapped {
        data: ObjectData,
        mapping: Arc<[i32]>,
    },
}

/// An immutable column of reference-typed values, missing rows are `None`.
#[derive(Debug, Clone)]
pub struct ObjectColumn {
    type_id: TypeId,
    len: usize,
    repr: ObjectRepr,
}

impl ObjectColumn {
    pub fn texts<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<Arc<str>>>,
    {
        let data = values.into_iter().collect::<Vec<_>>();
        let data = ObjectData::Text(data.into());
        Self {
            type_id: TypeId::Text,
            len: data.len(),
            repr: ObjectRepr::Dense(data),
        }
    }

    pub fn text_sets<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<Arc<TextSet>>>,
    {
        let data = values.into_iter().collect::<Vec<_>>();
        let data = ObjectData::TextSet(data.into());
        Self {
            type_id: TypeId::TextSet,
            len: data.len(),
            repr: ObjectRepr::Dense(data),
        }
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

    fn source_row(&self, row: usize) -> Option<(usize, &ObjectData)> {
        assert!(row < self.len, "row {row} out of range for {}", self.len);
        match &self.repr {
            ObjectRepr::Dense(data) => Some((row, data)),
            ObjectRepr::Mapped { data, mapping } => {
                view_row(mapping, row, data.len()).map(|source| (source, data))
            }
        }
    }

    /// The text at `row`, `None` for missing.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range or this is not a text column.
    pub fn get_text(&self, row: usize) -> Option<Arc<str>> {
        match self.source_row(row) {
            Some((source, ObjectData::Text(data))) => data[source].clone(),
            Some(_) => panic!("column of type {} does not hold text", self.type_id),
            None => None,
        }
    }

    /// The text set at `row`, `None` for missing.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range or this is not a text-set column.
    pub fn get_text_set(&self, row: usize) -> Option<Arc<TextSet>> {
        match self.source_row(row) {
            Some((source, ObjectData::TextSet(data))) => data[source].clone(),
            Some(_) => panic!("column of type {} does not hold text sets", self.type_id),
            None => None,
        }
    }

    /// Applies a row mapping, producing either a lazy view or an eagerly
    /// materialized column with identical reads.
    pub fn map(&self, mapping: &Arc<[i32]>, prefer_view: bool) -> Self {
        let repr = match (&self.repr, prefer_view) {
            (ObjectRepr::Dense(data), true) => ObjectRepr::Mapped {
                data: data.clone(),
                mapping: mapping.clone(),
            },
            (ObjectRepr::Mapped { data, mapping: old }, true) => ObjectRepr::Mapped {
                data: data.clone(),
                mapping: crate::mapping::compose(old, mapping).into(),
            },
            (_, false) => {
                let lookup = |row: &i32| -> Option<usize> {
                    (*row >= 0 && (*row as usize) < self.len).then_some(*row as usize)
                };
                let data = match &self.repr {
                    ObjectRepr::Dense(ObjectData::Text(_))
                    | ObjectRepr::Mapped {
                        data: ObjectData::Text(_),
                        ..
                    } => ObjectData::Text(
                        mapping
                            .iter()
                            .map(|row| lookup(row).and_then(|source| self.get_text(source)))
                            .collect::<Vec<_>>()
                            .into(),
                    ),
                    _ => ObjectData::TextSet(
                        mapping
                            .iter()
                            .map(|row| lookup(row).and_then(|source| self.get_text_set(source)))
                            .collect::<Vec<_>>()
                            .into(),
                    ),
                };
                ObjectRepr::Dense(data)
            }
        };
        Self {
            type_id: self.type_id,
            len: mapping.len(),
            repr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_reads() {
        let column = ObjectColumn::texts([Some(Arc::from("a")), None, Some(Arc::from("b"))]);
        assert_eq!(column.type_id(), TypeId::Text);
        assert_eq!(column.get_text(0).as_deref(), Some("a"));
        assert_eq!(column.get_text(1), None);
        assert_eq!(column.get_text(2).as_deref(), Some("b"));
    }

    #[test]
    fn text_set_reads() {
        let set = Arc::new(TextSet::new(["b", "a", "b"]));
        let column = ObjectColumn::text_sets([Some(set.clone()), None]);
        assert_eq!(column.type_id(), TypeId::TextSet);
        let read = column.get_text_set(0).unwrap();
        assert_eq!(read.len(), 2);
        assert!(read.contains("a"));
        assert_eq!(read.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(column.get_text_set(1), None);
    }

    #[test]
    fn mapped_view_and_eager_agree() {
        let column =
            ObjectColumn::texts([Some(Arc::from("x")), Some(Arc::from("y")), None]);
        let mapping: Arc<[i32]> = vec![2, 0, -1, 7, 1].into();
        let view = column.map(&mapping, true);
        let eager = column.map(&mapping, false);
        for row in 0..mapping.len() {
            assert_eq!(view.get_text(row), eager.get_text(row));
        }
        assert_eq!(view.get_text(1).as_deref(), Some("x"));
        assert_eq!(view.get_text(2), None);
        assert_eq!(view.get_text(3), None);
    }

    #[test]
    #[should_panic(expected = "does not hold text sets")]
    fn wrong_typed_access_panics() {
        let column = ObjectColumn::texts([Some(Arc::from("a"))]);
        column.get_text_set(0);
    }
}

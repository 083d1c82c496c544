//! The table façade: equally tall, uniquely labeled columns.

use std::{fmt, sync::Arc};

use columnar::column::Column;

use crate::{Error, Result};

/// An immutable collection of equally tall columns identified by unique
/// labels.
///
/// A table may have zero width and still a positive height, which matters
/// when concatenating label-less tables.
#[derive(Debug, Clone)]
pub struct Table {
    labels: Vec<String>,
    columns: Vec<Arc<Column>>,
    height: usize,
}

impl Table {
    /// Creates a table, deriving the height from the first column (`0` for
    /// a table without columns).
    pub fn new(labels: Vec<String>, columns: Vec<Arc<Column>>) -> Result<Self> {
        let height = columns.first().map_or(0, |column| column.len());
        Self::with_height(labels, columns, height)
    }

    /// Creates a table with an explicit height, allowing zero-width tables
    /// of positive height.
    pub fn with_height(
        labels: Vec<String>,
        columns: Vec<Arc<Column>>,
        height: usize,
    ) -> Result<Self> {
        if labels.len() != columns.len() {
            return Err(Error::LabelCount {
                labels: labels.len(),
                items: columns.len(),
            });
        }
        for (index, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(Error::EmptyLabel { index });
            }
            if labels[..index].contains(label) {
                return Err(Error::DuplicateLabel {
                    label: label.clone(),
                });
            }
        }
        for column in &columns {
            if column.len() != height {
                return Err(Error::HeightMismatch {
                    expected: height,
                    actual: column.len(),
                });
            }
        }
        Ok(Self {
            labels,
            columns,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The label of the column at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn label(&self, index: usize) -> &str {
        &self.labels[index]
    }

    /// The column at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn column(&self, index: usize) -> &Arc<Column> {
        &self.columns[index]
    }

    pub fn column_by_label(&self, label: &str) -> Option<&Arc<Column>> {
        self.labels
            .iter()
            .position(|candidate| candidate == label)
            .map(|index| &self.columns[index])
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table ({}x{})", self.height, self.width())
    }
}

#[cfg(test)]
mod tests {
    use columnar::column::{NumericColumn, TypeId};

    use super::*;

    fn column(data: &[f64]) -> Arc<Column> {
        Arc::new(Column::Numeric(NumericColumn::dense(
            TypeId::Real,
            data.to_vec(),
        )))
    }

    #[test]
    fn lookup_by_label_and_index() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![column(&[1.0, 2.0]), column(&[3.0, 4.0])],
        )
        .unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.height(), 2);
        assert_eq!(table.label(1), "b");
        assert!(Arc::ptr_eq(
            table.column_by_label("b").unwrap(),
            table.column(1)
        ));
        assert!(table.column_by_label("c").is_none());
        assert_eq!(table.to_string(), "Table (2x2)");
    }

    #[test]
    fn zero_width_tables_keep_their_height() {
        let table = Table::with_height(vec![], vec![], 7).unwrap();
        assert_eq!(table.width(), 0);
        assert_eq!(table.height(), 7);
    }

    #[test]
    fn validation() {
        assert!(matches!(
            Table::new(vec!["a".into()], vec![]),
            Err(Error::LabelCount { labels: 1, items: 0 })
        ));
        assert!(matches!(
            Table::new(
                vec!["a".into(), "a".into()],
                vec![column(&[1.0]), column(&[2.0])]
            ),
            Err(Error::DuplicateLabel { .. })
        ));
        assert!(matches!(
            Table::new(vec![String::new()], vec![column(&[1.0])]),
            Err(Error::EmptyLabel { index: 0 })
        ));
        assert!(matches!(
            Table::new(
                vec!["a".into(), "b".into()],
                vec![column(&[1.0]), column(&[1.0, 2.0])]
            ),
            Err(Error::HeightMismatch { .. })
        ));
    }
}

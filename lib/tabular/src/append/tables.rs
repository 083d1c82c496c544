//! Table-level concatenation.

use std::sync::Arc;

use columnar::column::Column;
use tracing::trace;

use crate::{
    context::ExecutionContext,
    progress::{ProgressCallback, ProgressSink},
    table::Table,
    Error, Result,
};

use super::{append_with_sink, validate};

/// Concatenates `tables` on top of each other.
///
/// All tables must share the width and the ordered column labels of the
/// first table, and each column must unify across tables under the
/// column-level rules. An empty list yields an empty table; zero-width
/// tables concatenate their heights. One task per column is dispatched on
/// the context, with progress apportioned so the callback still observes a
/// monotone sequence ending at exactly `1.0`.
pub fn append_tables(
    tables: &[Table],
    callback: Option<ProgressCallback<'_>>,
    context: &ExecutionContext,
) -> Result<Table> {
    let Some(first) = tables.first() else {
        return Table::with_height(vec![], vec![], 0);
    };
    for (table_index, table) in tables.iter().enumerate().skip(1) {
        if table.width() != first.width() {
            return Err(Error::IncompatibleTableWidth { table_index });
        }
        for (index, label) in first.labels().iter().enumerate() {
            if table.label(index) != label {
                return Err(Error::IncompatibleColumns {
                    table_index,
                    column_name: label.clone(),
                });
            }
        }
    }

    let total_height: usize = tables.iter().map(Table::height).sum();
    if total_height > i32::MAX as usize {
        return Err(Error::TableTooLong);
    }

    // validate all columns up front so no work is spent and no progress is
    // reported before the whole operation is known to succeed
    let mut plans = Vec::with_capacity(first.width());
    let mut column_sets = Vec::with_capacity(first.width());
    for index in 0..first.width() {
        let columns = tables
            .iter()
            .map(|table| (**table.column(index)).clone())
            .collect::<Vec<Column>>();
        plans.push(validate(&columns, Some(first.label(index)))?);
        column_sets.push(columns);
    }

    trace!(
        tables = tables.len(),
        width = first.width(),
        total_height,
        "appending tables"
    );
    let sink = ProgressSink::new(callback, (total_height * first.width()) as u64);
    let results = context.run(first.width(), |index| {
        append_with_sink(&column_sets[index], total_height, &plans[index], &sink)
    });
    let mut columns = Vec::with_capacity(results.len());
    for result in results {
        columns.push(Arc::new(result?));
    }
    sink.finish();
    Table::with_height(first.labels().to_vec(), columns, total_height)
}

#[cfg(test)]
mod tests {
    use columnar::{
        column::{CategoricalColumn, NumericColumn, TimeColumn, TypeId},
        dictionary::Dictionary,
    };
    use parking_lot::Mutex;

    use super::*;

    fn real_column(data: &[f64]) -> Arc<Column> {
        Arc::new(Column::Numeric(NumericColumn::dense(
            TypeId::Real,
            data.to_vec(),
        )))
    }

    fn two_column_table(a: &[f64], b: &[f64]) -> Table {
        Table::new(
            vec!["a".into(), "b".into()],
            vec![real_column(a), real_column(b)],
        )
        .unwrap()
    }

    #[test]
    fn empty_list_yields_an_empty_table() {
        let table = append_tables(&[], None, &ExecutionContext::inline()).unwrap();
        assert_eq!(table.width(), 0);
        assert_eq!(table.height(), 0);
    }

    #[test]
    fn tables_concatenate_in_order() {
        let context = ExecutionContext::inline();
        let top = two_column_table(&[1.0, 2.0], &[10.0, 20.0]);
        let bottom = two_column_table(&[3.0], &[30.0]);
        let table = append_tables(&[top, bottom], None, &context).unwrap();
        assert_eq!(table.height(), 3);
        assert_eq!(table.width(), 2);
        let mut buf = [0.0; 3];
        table.column(0).fill(&mut buf, 0);
        assert_eq!(buf, [1.0, 2.0, 3.0]);
        table.column_by_label("b").unwrap().fill(&mut buf, 0);
        assert_eq!(buf, [10.0, 20.0, 30.0]);
    }

    #[test]
    fn width_mismatch_reports_first_deviation() {
        let context = ExecutionContext::inline();
        let two = two_column_table(&[1.0], &[2.0]);
        let one = Table::new(vec!["a".into()], vec![real_column(&[1.0])]).unwrap();
        let two_again = two_column_table(&[1.0], &[2.0]);
        assert!(matches!(
            append_tables(&[two, one, two_again], None, &context),
            Err(Error::IncompatibleTableWidth { table_index: 1 })
        ));
    }

    #[test]
    fn label_mismatch_names_the_column() {
        let context = ExecutionContext::inline();
        let left = two_column_table(&[1.0], &[2.0]);
        let right = Table::new(
            vec!["a".into(), "c".into()],
            vec![real_column(&[1.0]), real_column(&[2.0])],
        )
        .unwrap();
        match append_tables(&[left, right], None, &context) {
            Err(Error::IncompatibleColumns {
                table_index,
                column_name,
            }) => {
                assert_eq!(table_index, 1);
                assert_eq!(column_name, "b");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn type_mismatch_names_table_and_column() {
        let context = ExecutionContext::inline();
        let numeric = Table::new(vec!["a".into()], vec![real_column(&[1.0])]).unwrap();
        let time = Table::new(
            vec!["a".into()],
            vec![Arc::new(Column::Time(TimeColumn::dense(vec![1])))],
        )
        .unwrap();
        match append_tables(&[numeric, time], None, &context) {
            Err(Error::IncompatibleTypes {
                index,
                desired,
                actual,
                column_name,
            }) => {
                assert_eq!(index, 1);
                assert_eq!(desired, "REAL");
                assert_eq!(actual, "TIME");
                assert_eq!(column_name.as_deref(), Some("a"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn zero_width_tables_concatenate_heights() {
        let context = ExecutionContext::inline();
        let top = Table::with_height(vec![], vec![], 4).unwrap();
        let bottom = Table::with_height(vec![], vec![], 3).unwrap();
        let table = append_tables(&[top, bottom], None, &context).unwrap();
        assert_eq!(table.width(), 0);
        assert_eq!(table.height(), 7);
    }

    #[test]
    fn overlong_results_are_rejected() {
        let context = ExecutionContext::inline();
        let top = Table::with_height(vec![], vec![], 2_000_000_000).unwrap();
        let bottom = Table::with_height(vec![], vec![], 2_000_000_000).unwrap();
        assert!(matches!(
            append_tables(&[top, bottom], None, &context),
            Err(Error::TableTooLong)
        ));
    }

    #[test]
    fn categorical_columns_unify_across_tables() {
        let context = ExecutionContext::inline();
        let left = Table::new(
            vec!["c".into()],
            vec![Arc::new(Column::Categorical(
                CategoricalColumn::from_indices(
                    Arc::new(Dictionary::new(["a", "b"])),
                    &[1, 2],
                )
                .unwrap(),
            ))],
        )
        .unwrap();
        let right = Table::new(
            vec!["c".into()],
            vec![Arc::new(Column::Categorical(
                CategoricalColumn::from_indices(Arc::new(Dictionary::new(["c"])), &[1])
                    .unwrap(),
            ))],
        )
        .unwrap();
        let table = append_tables(&[left, right], None, &context).unwrap();
        let column = table.column(0).as_categorical().unwrap();
        assert_eq!(column.dictionary().len(), 4);
        let mut buf = [0_u32; 3];
        column.fill_indices(&mut buf, 0);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn parallel_append_reports_monotone_progress() {
        let pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(4)
                .build()
                .unwrap(),
        );
        let context = ExecutionContext::with_pool(pool);
        let height = 10_000;
        let data = (0..height).map(|i| i as f64).collect::<Vec<_>>();
        let top = Table::new(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            (0..4).map(|_| real_column(&data)).collect(),
        )
        .unwrap();
        let bottom = top.clone();

        let observed = Mutex::new(Vec::new());
        let callback = |fraction: f64| observed.lock().push(fraction);
        let table = append_tables(&[top, bottom], Some(&callback), &context).unwrap();
        assert_eq!(table.height(), 2 * height);

        let observed = observed.lock();
        assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(*observed.last().unwrap(), 1.0);

        let mut buf = vec![0.0; 2 * height];
        table.column(3).fill(&mut buf, 0);
        assert_eq!(buf[height], 0.0);
        assert_eq!(buf[2 * height - 1], (height - 1) as f64);
    }
}

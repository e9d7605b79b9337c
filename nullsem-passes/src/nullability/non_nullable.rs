use nullsem_sql::ast::ColumnExpr;

/// The columns proven non-null along the predicate branch currently being visited.
///
/// Facts are appended as they are proven, and rolled back by truncating to a [`mark`] taken
/// before the visit of a branch that must not leak its facts to its siblings.
///
/// [`mark`]: NonNullableColumns::mark
#[derive(Debug, Default)]
pub(crate) struct NonNullableColumns {
    columns: Vec<ColumnExpr>,
}

impl NonNullableColumns {
    pub(crate) fn mark(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn restore(&mut self, mark: usize) {
        self.columns.truncate(mark);
    }

    pub(crate) fn push(&mut self, column: ColumnExpr) {
        if !self.contains(&column) {
            self.columns.push(column);
        }
    }

    pub(crate) fn extend<I: IntoIterator<Item = ColumnExpr>>(&mut self, columns: I) {
        for column in columns {
            self.push(column);
        }
    }

    pub(crate) fn contains(&self, column: &ColumnExpr) -> bool {
        self.columns.contains(column)
    }

    /// The facts proven since `mark` was taken
    pub(crate) fn since(&self, mark: usize) -> &[ColumnExpr] {
        self.columns.get(mark..).unwrap_or_default()
    }

    pub(crate) fn clear(&mut self) {
        self.columns.clear();
    }
}

#[cfg(test)]
mod tests {
    use nullsem_sql::ast::SqlType;

    use super::*;

    fn col(name: &str) -> ColumnExpr {
        ColumnExpr::new(name, SqlType::Int, true)
    }

    #[test]
    fn restore_rolls_back_to_mark() {
        let mut columns = NonNullableColumns::default();
        columns.push(col("a"));
        let mark = columns.mark();
        columns.push(col("b"));
        assert!(columns.contains(&col("b")));
        assert_eq!(columns.since(mark), &[col("b")]);

        columns.restore(mark);
        assert!(columns.contains(&col("a")));
        assert!(!columns.contains(&col("b")));
        assert!(columns.since(mark).is_empty());
    }

    #[test]
    fn duplicates_are_not_recorded_twice() {
        let mut columns = NonNullableColumns::default();
        columns.push(col("a"));
        let mark = columns.mark();
        columns.push(col("a"));
        assert!(columns.since(mark).is_empty());
    }

    #[test]
    fn since_a_stale_mark_is_empty() {
        let mut columns = NonNullableColumns::default();
        columns.push(col("a"));
        let mark = columns.mark();
        columns.clear();
        assert!(columns.since(mark).is_empty());
    }
}

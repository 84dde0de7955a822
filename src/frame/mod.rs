//! Result frames.
//!
//! A `Frame` is the common currency between the query engine and the
//! assembly pipeline: an ordered list of unique column names plus owned,
//! fixed-arity rows. Cells are nullable strings, mirroring the raw KGTK
//! cell text returned by the store.
//!
//! Frames are immutable in spirit. Projection, deduplication and union all
//! return new frames; `extend_from` is the single destructive variant used
//! when a caller accumulates several frames into one.
//!
//! Rows produced lazily (for example by chaining the result of several
//! queries) go through `LazyFrame`, which is consumed by `materialize()`.
//! Materialization therefore happens exactly once per source.

use std::collections::BTreeMap;
use std::fmt;

use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::{Error, Result};

mod decode;

pub use decode::{decode, FromRow};
pub(crate) use decode::{optional, required};

/// One nullable cell.
pub type Cell = Option<String>;

/// One row. Most frames are two or four columns wide.
pub type Row = SmallVec<[Cell; 4]>;

/// Build a row from anything that yields optional strings.
pub fn row<I, S>(cells: I) -> Row
where
    I: IntoIterator<Item = Option<S>>,
    S: Into<String>,
{
    cells.into_iter().map(|c| c.map(Into::into)).collect()
}

// ============================================================================
// Column references
// ============================================================================

/// A column selector, by name or by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for Column<'a> {
    fn from(name: &'a str) -> Self {
        Column::Name(name)
    }
}

impl<'a> From<&'a String> for Column<'a> {
    fn from(name: &'a String) -> Self {
        Column::Name(name.as_str())
    }
}

impl From<usize> for Column<'_> {
    fn from(index: usize) -> Self {
        Column::Index(index)
    }
}

// ============================================================================
// Frame
// ============================================================================

/// Named columns plus materialized rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Frame {
    /// Create a frame, validating unique column names and row arity.
    pub fn new<I, S>(columns: I, rows: Vec<Row>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        check_unique(&columns)?;
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(Error::InvalidFrame(format!(
                "row has {} cells, frame has {} columns",
                bad.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// An empty frame with a fixed query header.
    pub fn with_header(header: &[&str]) -> Self {
        debug_assert!(check_unique(header).is_ok(), "duplicate column in header");
        Self {
            columns: header.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Wrap a lazy row source. Nothing is consumed until `materialize()`.
    pub fn from_lazy<I, S, R>(columns: I, rows: R) -> LazyFrame<R::IntoIter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        R: IntoIterator<Item = Row>,
    {
        LazyFrame {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: rows.into_iter(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Append one row.
    pub fn push(&mut self, row: Row) -> Result<()> {
        if row.len() != self.arity() {
            return Err(Error::IncompatibleFrame {
                expected: self.arity(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Keep only the first `n` rows.
    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    /// Resolve a column selector to a position.
    pub fn column_index<'a>(&self, column: impl Into<Column<'a>>) -> Result<usize> {
        match column.into() {
            Column::Name(name) => self
                .columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| Error::ColumnNotFound(name.to_string())),
            Column::Index(i) if i < self.arity() => Ok(i),
            Column::Index(i) => Err(Error::ColumnNotFound(format!("#{i}"))),
        }
    }

    /// Select and reorder columns.
    ///
    /// Projecting onto a single column still yields 1-tuples so that the
    /// result composes with `union` like any other frame.
    pub fn project(&self, columns: &[Column<'_>]) -> Result<Frame> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(*c))
            .collect::<Result<Vec<_>>>()?;
        let names: Vec<String> = indices.iter().map(|&i| self.columns[i].clone()).collect();
        check_unique(&names)?;
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(Frame { columns: names, rows })
    }

    /// All cells of one column, in row order.
    pub fn column<'a>(&self, column: impl Into<Column<'a>>) -> Result<Vec<Option<&str>>> {
        let i = self.column_index(column)?;
        Ok(self.rows.iter().map(|r| r[i].as_deref()).collect())
    }

    /// The non-null cells of one column, in row order.
    pub fn values<'a>(&self, column: impl Into<Column<'a>>) -> Result<Vec<&str>> {
        Ok(self.column(column)?.into_iter().flatten().collect())
    }

    /// The first non-null cell of a column.
    pub fn first_value<'a>(&self, column: impl Into<Column<'a>>) -> Result<Option<&str>> {
        let i = self.column_index(column)?;
        Ok(self.rows.iter().find_map(|r| r[i].as_deref()))
    }

    /// Remove repeated rows, keeping first occurrences in order.
    pub fn drop_duplicates(self) -> Frame {
        let mut seen: HashSet<Row> = HashSet::with_capacity(self.rows.len());
        let rows = self
            .rows
            .into_iter()
            .filter(|r| seen.insert(r.clone()))
            .collect();
        Frame { columns: self.columns, rows }
    }

    /// Remove every row holding a null in any column.
    pub fn drop_nulls(self) -> Frame {
        let rows = self
            .rows
            .into_iter()
            .filter(|r| r.iter().all(Option::is_some))
            .collect();
        Frame { columns: self.columns, rows }
    }

    /// Replace the column names. The new list must have the same arity.
    pub fn rename<I, S>(self, columns: I) -> Result<Frame>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.len() != self.arity() {
            return Err(Error::IncompatibleFrame {
                expected: self.arity(),
                got: columns.len(),
            });
        }
        check_unique(&columns)?;
        Ok(Frame { columns, rows: self.rows })
    }

    /// Concatenate rows of `self` and every present operand, without
    /// deduplication. Later operands are renamed to this frame's columns.
    pub fn concat<'f>(&self, others: impl IntoIterator<Item = Option<&'f Frame>>) -> Result<Frame> {
        let mut out = self.clone();
        for other in others.into_iter().flatten() {
            out.extend_from(other)?;
        }
        Ok(out)
    }

    /// `concat` followed by `drop_duplicates`.
    pub fn union<'f>(&self, others: impl IntoIterator<Item = Option<&'f Frame>>) -> Result<Frame> {
        Ok(self.concat(others)?.drop_duplicates())
    }

    /// Union an arbitrary list of optional frames. The first present
    /// operand supplies the column names; `None` if all are absent.
    pub fn union_all<'f>(
        frames: impl IntoIterator<Item = Option<&'f Frame>>,
    ) -> Result<Option<Frame>> {
        let mut present = frames.into_iter().flatten();
        match present.next() {
            Some(first) => Ok(Some(first.union(present.map(Some))?)),
            None => Ok(None),
        }
    }

    /// Destructively append the rows of `other`.
    pub fn extend_from(&mut self, other: &Frame) -> Result<()> {
        if other.arity() != self.arity() {
            return Err(Error::IncompatibleFrame {
                expected: self.arity(),
                got: other.arity(),
            });
        }
        self.rows.extend(other.rows.iter().cloned());
        Ok(())
    }

    /// Two-column frame to `key -> value`. Later rows overwrite earlier
    /// ones; rows with a null key or value are skipped.
    pub fn to_value_dict(&self) -> Result<BTreeMap<String, String>> {
        self.require_pairs()?;
        let mut dict = BTreeMap::new();
        for r in &self.rows {
            if let (Some(k), Some(v)) = (&r[0], &r[1]) {
                dict.insert(k.clone(), v.clone());
            }
        }
        Ok(dict)
    }

    /// Two-column frame to `key -> [value, ...]`, values in row order.
    pub fn to_values_dict(&self) -> Result<BTreeMap<String, Vec<String>>> {
        self.require_pairs()?;
        let mut dict: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for r in &self.rows {
            if let (Some(k), Some(v)) = (&r[0], &r[1]) {
                dict.entry(k.clone()).or_default().push(v.clone());
            }
        }
        Ok(dict)
    }

    fn require_pairs(&self) -> Result<()> {
        if self.arity() == 2 {
            Ok(())
        } else {
            Err(Error::IncompatibleFrame { expected: 2, got: self.arity() })
        }
    }
}

impl<'a> IntoIterator for &'a Frame {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Tab-separated rendering with a header line; nulls print as empty.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for r in &self.rows {
            let cells: Vec<&str> = r.iter().map(|c| c.as_deref().unwrap_or("")).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

fn check_unique<S: AsRef<str>>(columns: &[S]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for c in columns {
        if !seen.insert(c.as_ref()) {
            return Err(Error::InvalidFrame(format!("duplicate column '{}'", c.as_ref())));
        }
    }
    Ok(())
}

// ============================================================================
// LazyFrame
// ============================================================================

/// A frame whose rows have not been pulled from their source yet.
pub struct LazyFrame<I> {
    columns: Vec<String>,
    rows: I,
}

impl<I: Iterator<Item = Row>> LazyFrame<I> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Drain the source into an owned `Frame`.
    pub fn materialize(self) -> Result<Frame> {
        Frame::new(self.columns, self.rows.collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(rows: &[(&str, &str)]) -> Frame {
        Frame::new(
            ["node1", "node_label"],
            rows.iter().map(|(a, b)| row([Some(*a), Some(*b)])).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_arity() {
        let err = Frame::new(["a", "b"], vec![row([Some("x")])]).unwrap_err();
        assert!(matches!(err, Error::InvalidFrame(_)));
    }

    #[test]
    fn test_new_rejects_duplicate_columns() {
        assert!(Frame::new(["a", "a"], Vec::new()).is_err());
    }

    #[test]
    fn test_project_single_column_yields_tuples() {
        let f = pairs(&[("Q1", "one"), ("Q2", "two")]);
        let p = f.project(&["node_label".into()]).unwrap();
        assert_eq!(p.columns(), &["node_label".to_string()]);
        assert_eq!(p.rows()[1].as_slice(), &[Some("two".to_string())]);
    }

    #[test]
    fn test_project_by_index_reorders() {
        let f = pairs(&[("Q1", "one")]);
        let p = f.project(&[1.into(), 0.into()]).unwrap();
        assert_eq!(p.columns(), &["node_label".to_string(), "node1".to_string()]);
        assert_eq!(p.rows()[0][0].as_deref(), Some("one"));
    }

    #[test]
    fn test_project_unknown_column() {
        let f = pairs(&[]);
        assert!(matches!(
            f.project(&["nope".into()]),
            Err(Error::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_drop_duplicates_keeps_first_occurrence() {
        let f = pairs(&[("Q2", "b"), ("Q1", "a"), ("Q2", "b"), ("Q3", "c"), ("Q1", "a")]);
        let d = f.drop_duplicates();
        let keys: Vec<_> = d.values("node1").unwrap();
        assert_eq!(keys, vec!["Q2", "Q1", "Q3"]);
    }

    #[test]
    fn test_drop_nulls() {
        let f = Frame::new(
            ["a", "b"],
            vec![
                row([Some("x"), None]),
                row([Some("y"), Some("z")]),
                row::<_, String>([None, None]),
            ],
        )
        .unwrap();
        let d = f.drop_nulls();
        assert_eq!(d.len(), 1);
        assert_eq!(d.rows()[0][0].as_deref(), Some("y"));
    }

    #[test]
    fn test_union_renames_and_skips_none() {
        let a = pairs(&[("Q1", "a")]);
        let b = Frame::new(["x", "y"], vec![row([Some("Q2"), Some("b")]), row([Some("Q1"), Some("a")])])
            .unwrap();
        let u = a.union([None, Some(&b)]).unwrap();
        assert_eq!(u.columns(), a.columns());
        assert_eq!(u.len(), 2);
        assert_eq!(u.values("node1").unwrap(), vec!["Q1", "Q2"]);
    }

    #[test]
    fn test_union_arity_mismatch() {
        let a = pairs(&[("Q1", "a")]);
        let b = Frame::new(["x"], vec![row([Some("Q2")])]).unwrap();
        let err = a.union([Some(&b)]).unwrap_err();
        assert!(matches!(err, Error::IncompatibleFrame { expected: 2, got: 1 }));
    }

    #[test]
    fn test_union_all_first_present_supplies_columns() {
        let b = pairs(&[("Q1", "a")]);
        let u = Frame::union_all([None, Some(&b), None]).unwrap().unwrap();
        assert_eq!(u.columns()[0], "node1");
        assert!(Frame::union_all([None, None]).unwrap().is_none());
    }

    #[test]
    fn test_to_values_dict_groups_in_order() {
        let f = pairs(&[("Q5", "label A"), ("Q5", "label B"), ("Q6", "label C")]);
        let d = f.to_values_dict().unwrap();
        assert_eq!(d["Q5"], vec!["label A", "label B"]);
        assert_eq!(d["Q6"], vec!["label C"]);
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn test_to_value_dict_last_wins() {
        let f = pairs(&[("Q5", "1"), ("Q5", "2")]);
        assert_eq!(f.to_value_dict().unwrap()["Q5"], "2");
    }

    #[test]
    fn test_lazy_materialize() {
        let source = vec![row([Some("Q1"), Some("a")]), row([Some("Q2"), Some("b")])];
        let lazy = Frame::from_lazy(["node1", "node_label"], source.into_iter().map(|r| r));
        assert_eq!(lazy.columns().len(), 2);
        let f = lazy.materialize().unwrap();
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_display_tsv() {
        let f = Frame::new(["a", "b"], vec![row([Some("x"), None])]).unwrap();
        assert_eq!(f.to_string(), "a\tb\nx\t\n");
    }
}

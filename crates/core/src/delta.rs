//! Per-column change hints between two renderings of the same row.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::row::fields_differ;
use crate::{Header, Row};

/// Prior values of the cells that changed, aligned by column; unchanged cells are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeltaRow(SmallVec<[String; 12]>);

impl DeltaRow {
    /// Old value wherever it changed and the column is not a time column.
    pub fn new(old: &Row, new: &Row, header: &Header) -> Self {
        let cells = new
            .fields
            .iter()
            .enumerate()
            .map(|(i, cur)| match old.fields.get(i) {
                Some(prev) if !prev.is_empty() && prev != cur && !header.is_time_col(i) => prev.clone(),
                _ => String::new(),
            })
            .collect();
        DeltaRow(cells)
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn get(&self, col: usize) -> Option<&str> {
        self.0.get(col).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True when no cell carries a prior value.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }

    pub fn diff(&self, other: &DeltaRow, age_col: Option<usize>) -> bool {
        fields_differ(&self.0, &other.0, age_col)
    }

    /// Project onto `cols`. A blank delta stays blank (and empty).
    pub fn customize(&self, cols: &[usize]) -> DeltaRow {
        if self.is_blank() {
            return DeltaRow::default();
        }
        DeltaRow(cols.iter().map(|&c| self.0.get(c).cloned().unwrap_or_default()).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for DeltaRow {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        DeltaRow(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnAttrs, HeaderColumn};

    fn header() -> Header {
        Header::new(vec![
            HeaderColumn::new("NAME"),
            HeaderColumn::new("STATE"),
            HeaderColumn::with("AGE", ColumnAttrs::TIME),
        ])
    }

    #[test]
    fn only_time_column_changed_is_blank() {
        let h = header();
        let old = Row::new("i-1", ["web", "running", "3m"]);
        let new = Row::new("i-1", ["web", "running", "4m"]);
        let d = DeltaRow::new(&old, &new, &h);
        assert!(d.is_blank());
        assert_eq!(d.len(), new.len());
    }

    #[test]
    fn changed_cells_carry_old_value() {
        let h = header();
        let old = Row::new("i-1", ["web", "pending", "3m"]);
        let new = Row::new("i-1", ["web", "running", "4m"]);
        let d = DeltaRow::new(&old, &new, &h);
        assert!(!d.is_blank());
        assert_eq!(d.iter().collect::<Vec<_>>(), vec!["", "pending", ""]);
    }

    #[test]
    fn customize_blank_and_filled() {
        let blank = DeltaRow::from_iter(["", "", ""]);
        assert!(blank.customize(&[0, 1]).is_empty());
        let d = DeltaRow::from_iter(["", "pending", ""]);
        assert_eq!(d.customize(&[1, 5]).iter().collect::<Vec<_>>(), vec!["pending", ""]);
    }

    #[test]
    fn diff_skips_age() {
        let a = DeltaRow::from_iter(["x", "", "1m"]);
        let b = DeltaRow::from_iter(["x", "", "2m"]);
        assert!(!a.diff(&b, Some(2)));
        assert!(a.diff(&b, None));
        assert!(a.diff(&DeltaRow::default(), Some(2)));
    }
}

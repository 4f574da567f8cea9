#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{CoreError, CoreResult, Header};

/// Rendered field values, one per header column.
pub type Fields = SmallVec<[String; 12]>;

/// One resource rendered as a table row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Row {
    /// Unique within one snapshot, e.g. `us-east-1/i-0abc`.
    pub id: String,
    pub fields: Fields,
}

impl Row {
    pub fn new<I, S>(id: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { id: id.into(), fields: fields.into_iter().map(Into::into).collect() }
    }

    /// Row with `size` empty fields and no id.
    pub fn blank(size: usize) -> Self {
        Self { id: String::new(), fields: std::iter::repeat(String::new()).take(size).collect() }
    }

    pub fn len(&self) -> usize { self.fields.len() }
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn field(&self, col: usize) -> Option<&str> {
        self.fields.get(col).map(String::as_str)
    }

    /// Errors when the row does not carry exactly one value per header column.
    pub fn check_width(&self, header: &Header) -> CoreResult<()> {
        if self.fields.len() != header.len() {
            return Err(CoreError::FieldCount { id: self.id.clone(), expected: header.len(), got: self.fields.len() });
        }
        Ok(())
    }

    /// Project onto `cols`; out-of-range indices yield blank fields.
    pub fn customize(&self, cols: &[usize]) -> Row {
        let fields = cols
            .iter()
            .map(|&c| self.fields.get(c).cloned().unwrap_or_default())
            .collect();
        Row { id: self.id.clone(), fields }
    }

    /// True when the rows differ. Mismatched ids always differ; the age column is ignored.
    pub fn diff(&self, other: &Row, age_col: Option<usize>) -> bool {
        if self.id != other.id {
            return true;
        }
        fields_differ(&self.fields, &other.fields, age_col)
    }
}

pub(crate) fn fields_differ(a: &[String], b: &[String], skip: Option<usize>) -> bool {
    if a.len() != b.len() {
        return true;
    }
    a.iter()
        .zip(b.iter())
        .enumerate()
        .any(|(i, (x, y))| Some(i) != skip && x != y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_checks_id_first() {
        let a = Row::new("a", ["x", "1h"]);
        let b = Row::new("b", ["x", "1h"]);
        assert!(a.diff(&b, None));
        assert!(a.diff(&b, Some(1)));
    }

    #[test]
    fn diff_ignores_age_column() {
        let a = Row::new("a", ["running", "1h"]);
        let b = Row::new("a", ["running", "2h"]);
        assert!(!a.diff(&b, Some(1)));
        assert!(a.diff(&b, None));
        let c = Row::new("a", ["stopped", "2h"]);
        assert!(a.diff(&c, Some(1)));
    }

    #[test]
    fn diff_is_reflexive_and_symmetric() {
        let a = Row::new("a", ["running", "1h", "10"]);
        let b = Row::new("a", ["running", "5m", "11"]);
        assert!(!a.diff(&a, Some(1)));
        assert_eq!(a.diff(&b, Some(1)), b.diff(&a, Some(1)));
    }

    #[test]
    fn customize_projects_and_pads() {
        let r = Row::new("id", ["a", "b", "c"]);
        let out = r.customize(&[2, 0, 7]);
        assert_eq!(out.id, "id");
        assert_eq!(out.fields.as_slice(), ["c", "a", ""]);
    }

    #[test]
    fn width_check() {
        let h = Header::new(vec![crate::HeaderColumn::new("A"), crate::HeaderColumn::new("B")]);
        assert!(Row::new("x", ["1", "2"]).check_width(&h).is_ok());
        let err = Row::new("x", ["1"]).check_width(&h).unwrap_err();
        assert_eq!(err, CoreError::FieldCount { id: "x".into(), expected: 2, got: 1 });
        assert_eq!(Row::blank(3).len(), 3);
    }
}

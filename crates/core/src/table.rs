//! Point-in-time table snapshots.

#![forbid(unsafe_code)]

use std::sync::Arc;

use crate::{Header, RowEvent, RowEvents};

/// Header, rows, scope label and optional error describing one point-in-time view.
///
/// Setters take `&mut self`, so they are only usable while the snapshot is exclusively
/// owned. Once published behind an `Arc` it is read-only. `Clone` is shallow: header and
/// rows are shared, so holding a clone is cheap and stays coherent while the engine swaps
/// in a newer snapshot.
#[derive(Clone, Debug, Default)]
pub struct TableSnapshot {
    header: Arc<Header>,
    rows: Arc<RowEvents>,
    namespace: String,
    error: Option<String>,
}

impl TableSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(header: impl Into<Arc<Header>>, rows: RowEvents) -> Self {
        Self { header: header.into(), rows: Arc::new(rows), namespace: String::new(), error: None }
    }

    pub fn set_header(&mut self, header: impl Into<Arc<Header>>) {
        self.header = header.into();
    }

    pub fn set_rows(&mut self, rows: RowEvents) {
        self.rows = Arc::new(rows);
    }

    pub fn set_namespace(&mut self, ns: impl Into<String>) {
        self.namespace = ns.into();
    }

    /// Error message shown instead of data.
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.error = Some(msg.into());
    }

    pub fn header(&self) -> &Header { &self.header }
    pub fn header_arc(&self) -> Arc<Header> { Arc::clone(&self.header) }
    pub fn rows(&self) -> &RowEvents { &self.rows }
    pub fn namespace(&self) -> &str { &self.namespace }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn has_error(&self) -> bool { self.error.is_some() }
    pub fn row_count(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    /// True when both snapshots share the same row collection.
    pub fn shares_rows_with(&self, other: &TableSnapshot) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }

    /// New snapshot with the same header and scope, keeping only rows matching `keep`.
    pub fn filtered<F>(&self, mut keep: F) -> TableSnapshot
    where
        F: FnMut(&RowEvent) -> bool,
    {
        let rows: RowEvents = self.rows.iter().filter(|re| keep(*re)).cloned().collect();
        TableSnapshot {
            header: Arc::clone(&self.header),
            rows: Arc::new(rows),
            namespace: self.namespace.clone(),
            error: self.error.clone(),
        }
    }

    /// New snapshot with rows reordered by `cmp`.
    pub fn sorted_by<F>(&self, cmp: F) -> TableSnapshot
    where
        F: FnMut(&RowEvent, &RowEvent) -> std::cmp::Ordering,
    {
        let mut rows = (*self.rows).clone();
        rows.sort_by(cmp);
        TableSnapshot {
            header: Arc::clone(&self.header),
            rows: Arc::new(rows),
            namespace: self.namespace.clone(),
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HeaderColumn, Row, RowEventKind};

    fn snap() -> TableSnapshot {
        let header = Header::new(vec![HeaderColumn::new("NAME")]);
        let rows: RowEvents = ["a", "b", "c"]
            .into_iter()
            .map(|n| RowEvent::new(RowEventKind::Add, Row::new(n, [n])))
            .collect();
        let mut s = TableSnapshot::with_rows(header, rows);
        s.set_namespace("us-east-1");
        s
    }

    #[test]
    fn clone_is_shallow() {
        let s = snap();
        let c = s.clone();
        assert!(c.shares_rows_with(&s));
        assert_eq!(c.row_count(), 3);
        assert_eq!(c.namespace(), "us-east-1");
    }

    #[test]
    fn filtered_keeps_source_intact() {
        let s = snap();
        let f = s.filtered(|re| re.id() != "b");
        assert_eq!(f.row_count(), 2);
        assert_eq!(s.row_count(), 3);
        assert!(!f.shares_rows_with(&s));
        assert_eq!(f.rows().find_index("c"), Some(1));
    }

    #[test]
    fn sorted_reverses() {
        let s = snap().sorted_by(|a, b| b.id().cmp(a.id()));
        assert_eq!(s.rows().ids().collect::<Vec<_>>(), vec!["c", "b", "a"]);
    }

    #[test]
    fn error_state() {
        let mut s = TableSnapshot::new();
        assert!(s.is_empty() && !s.has_error());
        s.set_error("access denied");
        assert_eq!(s.error(), Some("access denied"));
    }
}

//! Semantic row tones. The widget toolkit maps them to concrete colors.

#![forbid(unsafe_code)]

use crate::{ColumnRole, Header, Row, RowEvent, RowEventKind};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RowTone {
    #[default]
    Std,
    Add,
    Modified,
    Pending,
    Killed,
    Error,
}

/// A row is valid unless its `VALID` column holds something other than blank or `true`.
pub fn is_valid(header: &Header, row: &Row) -> bool {
    if row.is_empty() {
        return true;
    }
    let Some(val) = header.role_index(ColumnRole::Valid).and_then(|i| row.field(i)) else {
        return true;
    };
    let val = val.trim();
    val.is_empty() || val.eq_ignore_ascii_case("true")
}

pub fn default_tone(header: &Header, re: &RowEvent) -> RowTone {
    if !is_valid(header, &re.row) {
        return RowTone::Error;
    }
    match re.kind {
        RowEventKind::Add => RowTone::Add,
        RowEventKind::Update => RowTone::Modified,
        RowEventKind::Delete => RowTone::Killed,
        RowEventKind::Unchanged | RowEventKind::Clear => RowTone::Std,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnAttrs, HeaderColumn};

    #[test]
    fn invalid_rows_are_errors() {
        let h = Header::new(vec![HeaderColumn::new("NAME"), HeaderColumn::with("VALID", ColumnAttrs::WIDE)]);
        let ok = RowEvent::new(RowEventKind::Update, Row::new("a", ["a", ""]));
        let ok_true = RowEvent::new(RowEventKind::Unchanged, Row::new("a", ["a", " TRUE "]));
        let bad = RowEvent::new(RowEventKind::Add, Row::new("a", ["a", "imdsv1-enabled"]));
        assert_eq!(default_tone(&h, &ok), RowTone::Modified);
        assert_eq!(default_tone(&h, &ok_true), RowTone::Std);
        assert_eq!(default_tone(&h, &bad), RowTone::Error);
    }

    #[test]
    fn no_valid_column_means_valid() {
        let h = Header::new(vec![HeaderColumn::new("NAME")]);
        assert!(is_valid(&h, &Row::new("a", ["x"])));
        assert_eq!(default_tone(&h, &RowEvent::new(RowEventKind::Delete, Row::new("a", ["x"]))), RowTone::Killed);
    }

    #[test]
    fn every_event_kind_has_a_tone() {
        let h = Header::new(vec![HeaderColumn::new("NAME")]);
        let tone = |kind| default_tone(&h, &RowEvent::new(kind, Row::new("a", ["x"])));
        assert_eq!(tone(RowEventKind::Add), RowTone::Add);
        assert_eq!(tone(RowEventKind::Update), RowTone::Modified);
        assert_eq!(tone(RowEventKind::Unchanged), RowTone::Std);
        assert_eq!(tone(RowEventKind::Clear), RowTone::Std);
    }
}

//! Plain-text table rendering and a surface that writes it to any `io::Write`.

#![forbid(unsafe_code)]

use std::io::Write;

use cumulus_core::{Align, TableSnapshot};
use parking_lot::Mutex;
use tracing::warn;

use crate::{MessageKind, RenderSurface, ViewState};

const GAP: &str = "   ";

/// Column-aligned text for `data`. Wide columns only when `wide`; hidden columns never.
pub fn render_table(data: &TableSnapshot, wide: bool) -> String {
    let header = data.header();
    let cols = header.visible_indices(wide);
    let right: Vec<bool> = cols
        .iter()
        .map(|&c| header.get(c).is_some_and(|h| h.attrs.align == Align::Right))
        .collect();
    let mut widths: Vec<usize> = cols
        .iter()
        .map(|&c| header.get(c).map_or(0, |h| h.name.chars().count()))
        .collect();
    for re in data.rows().iter() {
        for (w, &c) in widths.iter_mut().zip(&cols) {
            *w = (*w).max(re.row.field(c).unwrap_or_default().chars().count());
        }
    }

    let mut out = String::new();
    let names = cols.iter().map(|&c| header.get(c).map_or("", |h| h.name.as_str()));
    push_line(&mut out, names, &widths, &right);
    for re in data.rows().iter() {
        push_line(&mut out, cols.iter().map(|&c| re.row.field(c).unwrap_or_default()), &widths, &right);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize], right: &[bool]) {
    let mut line = String::new();
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            line.push_str(GAP);
        }
        let width = widths.get(i).copied().unwrap_or_default();
        if right.get(i).copied().unwrap_or(false) {
            line.push_str(&format!("{cell:>width$}"));
        } else {
            line.push_str(&format!("{cell:<width$}"));
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Writes the title, then either the table or the message, on every draw.
pub struct TextSurface<W> {
    out: Mutex<W>,
    title: Mutex<String>,
}

impl<W: Write + Send> TextSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out), title: Mutex::new(String::new()) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, body: &str) {
        let title = self.title.lock().clone();
        let mut out = self.out.lock();
        let res = writeln!(out, "{}", title.trim()).and_then(|_| write!(out, "{body}")).and_then(|_| out.flush());
        if let Err(e) = res {
            warn!(error = %e, "failed to write table output");
        }
    }
}

impl<W: Write + Send> RenderSurface for TextSurface<W> {
    fn draw(&self, data: &TableSnapshot, state: &ViewState) {
        self.emit(&render_table(data, state.wide));
    }

    fn show_message(&self, msg: &str, kind: MessageKind) {
        match kind {
            MessageKind::Info => self.emit(&format!("{msg}\n")),
            MessageKind::Error => self.emit(&format!("error: {msg}\n")),
        }
    }

    fn set_title(&self, title: &str) {
        *self.title.lock() = title.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_core::{ColumnAttrs, Header, HeaderColumn, Row, RowEvent, RowEventKind, RowEvents};

    fn snap() -> TableSnapshot {
        let header = Header::new(vec![
            HeaderColumn::new("NAME"),
            HeaderColumn::with("SIZE", ColumnAttrs::CAPACITY),
            HeaderColumn::with("AZ", ColumnAttrs::WIDE),
        ]);
        let rows: RowEvents = [("vol-1", "8 GiB", "a"), ("vol-long", "100 GiB", "b")]
            .into_iter()
            .map(|(n, s, z)| RowEvent::new(RowEventKind::Add, Row::new(n, [n, s, z])))
            .collect();
        TableSnapshot::with_rows(header, rows)
    }

    #[test]
    fn aligns_columns_and_hides_wide() {
        let text = render_table(&snap(), false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["NAME          SIZE", "vol-1        8 GiB", "vol-long   100 GiB"]);
    }

    #[test]
    fn wide_layout_includes_wide_columns() {
        let text = render_table(&snap(), true);
        assert!(text.lines().next().unwrap().ends_with("AZ"));
    }

    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn load_failure_after_data_reprints_rows_under_error_title() {
        use crate::TableView;
        use cumulus_engine::{EngineError, TableListener};
        use cumulus_provider::{ProviderError, ResourceId};

        let buf = SharedBuf::default();
        let view = TableView::new(ResourceId::new("ec2", "volume"), TextSurface::new(buf.clone()));
        view.update(&snap());
        let before = buf.0.lock().len();

        view.table_load_failed(&EngineError::Fetch(ProviderError::Timeout(std::time::Duration::from_secs(30))));
        let out = String::from_utf8(buf.0.lock().clone()).unwrap();
        let tail = &out[before..];
        assert!(tail.starts_with("<ec2/volume>[all][2] Error: fetch timed out after 30s\n"), "{tail}");
        assert!(tail.contains("vol-long   100 GiB"), "{tail}");
    }

    #[test]
    fn surface_writes_title_then_body() {
        let surface = TextSurface::new(Vec::new());
        surface.set_title(" <s3/bucket>[all][0] ");
        surface.show_message("No resources found", MessageKind::Info);
        let out = String::from_utf8(surface.into_inner()).unwrap();
        assert_eq!(out, "<s3/bucket>[all][0]\nNo resources found\n");
    }
}

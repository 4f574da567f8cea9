//! Turning a fresh listing into row events against the previous snapshot.

#![forbid(unsafe_code)]

use cumulus_core::{DeltaRow, Header, Row, RowEvent, RowEventKind, RowEvents, TableSnapshot};
use cumulus_provider::{CloudObject, Renderer, Scope};
use tracing::debug;

/// Render every object; objects that fail (or render to the wrong width) are skipped.
/// Returns the rows and the number skipped.
pub fn render_all(renderer: &dyn Renderer, header: &Header, objs: &[CloudObject], scope: &Scope) -> (Vec<Row>, usize) {
    let mut rows = Vec::with_capacity(objs.len());
    let mut skipped = 0usize;
    for obj in objs {
        let row = match renderer.render(obj, scope) {
            Ok(row) => row,
            Err(e) => {
                debug!(id = %obj.id, error = %e, "skipping object that failed to render");
                skipped += 1;
                continue;
            }
        };
        if let Err(e) = row.check_width(header) {
            debug!(id = %obj.id, error = %e, "skipping row that does not match its header");
            skipped += 1;
            continue;
        }
        rows.push(row);
    }
    (rows, skipped)
}

/// Classify `rows` against `prev`: new ids are `Add`, changed rows are `Update` with the prior
/// values as deltas, the rest `Unchanged`. A header change marks everything `Add` since the
/// old field positions no longer line up. Duplicate ids keep the first occurrence.
pub fn reconcile(prev: &TableSnapshot, header: &Header, rows: Vec<Row>) -> (RowEvents, usize) {
    let comparable = !prev.header().diff(header);
    let age_col = header.age_col();
    let mut out = RowEvents::with_capacity(rows.len());
    let mut dropped = 0usize;
    for row in rows {
        let re = match prev.rows().get(&row.id).filter(|_| comparable) {
            None => RowEvent::new(RowEventKind::Add, row),
            Some(old) if row.diff(&old.row, age_col) => {
                let deltas = DeltaRow::new(&old.row, &row, header);
                RowEvent::with_deltas(row, deltas)
            }
            Some(_) => RowEvent::new(RowEventKind::Unchanged, row),
        };
        if let Err(e) = out.add(re) {
            debug!(error = %e, "dropping duplicate row");
            dropped += 1;
        }
    }
    (out, dropped)
}

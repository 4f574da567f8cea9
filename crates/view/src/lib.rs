//! Cumulus view: the filter/sort layer between an engine and whatever draws the table.
//!
//! A [`TableView`] keeps the last full snapshot it was handed and derives what is shown from it
//! on every redraw, so filtering never loses rows. Drawing goes through a [`RenderSurface`].

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cumulus_core::sort::{self, SortMode};
use cumulus_core::{RowTone, TableSnapshot};
use cumulus_engine::{EngineError, TableListener};
use cumulus_provider::{Renderer, ResourceId, Scope};
use metrics::counter;
use parking_lot::Mutex;
use tracing::debug;

pub mod text;

pub const MSG_LOADING: &str = "Loading...";
pub const MSG_NO_RESOURCES: &str = "No resources found";
pub const MSG_NO_MATCHES: &str = "No matching resources";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

/// What the surface needs besides the rows themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub title: String,
    pub filter: Option<String>,
    pub sort_col: Option<String>,
    pub ascending: bool,
    pub wide: bool,
    /// One tone per shown row, in display order.
    pub tones: Vec<RowTone>,
}

/// Boundary to the widget toolkit.
pub trait RenderSurface: Send + Sync {
    fn draw(&self, data: &TableSnapshot, state: &ViewState);
    fn show_message(&self, msg: &str, kind: MessageKind);
    fn set_title(&self, title: &str);
}

impl<S: RenderSurface + ?Sized> RenderSurface for Arc<S> {
    fn draw(&self, data: &TableSnapshot, state: &ViewState) {
        (**self).draw(data, state)
    }
    fn show_message(&self, msg: &str, kind: MessageKind) {
        (**self).show_message(msg, kind)
    }
    fn set_title(&self, title: &str) {
        (**self).set_title(title)
    }
}

#[derive(Debug, Default)]
struct ViewInner {
    full: Option<TableSnapshot>,
    filter: String,
    sort_col: Option<String>,
    ascending: bool,
    error: Option<String>,
}

pub struct TableView<S> {
    rid: ResourceId,
    surface: S,
    renderer: Option<Arc<dyn Renderer>>,
    wide: bool,
    inner: Mutex<ViewInner>,
    updating: AtomicBool,
}

/// Clears the in-progress flag when a redraw ends, however it ends.
struct UpdateGuard<'a>(&'a AtomicBool);

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: RenderSurface> TableView<S> {
    pub fn new(rid: ResourceId, surface: S) -> Self {
        Self {
            rid,
            surface,
            renderer: None,
            wide: false,
            inner: Mutex::new(ViewInner { ascending: true, ..Default::default() }),
            updating: AtomicBool::new(false),
        }
    }

    /// Row tones come from `renderer`; without one every row is `Std`.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_wide(mut self, wide: bool) -> Self {
        self.wide = wide;
        self
    }

    /// Initial filter, applied from the first redraw on.
    pub fn with_filter(self, text: &str) -> Self {
        self.inner.lock().filter = text.to_string();
        self
    }

    pub fn with_sort(self, col: &str, ascending: bool) -> Self {
        {
            let mut inner = self.inner.lock();
            inner.sort_col = Some(col.to_string());
            inner.ascending = ascending;
        }
        self
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Store a new full snapshot and redraw. Returns false when the redraw was skipped.
    pub fn update(&self, data: &TableSnapshot) -> bool {
        {
            let mut inner = self.inner.lock();
            inner.full = Some(data.clone());
            inner.error = None;
        }
        self.redraw()
    }

    /// Matched as given, surrounding whitespace included.
    pub fn set_filter(&self, text: &str) -> bool {
        self.inner.lock().filter = text.to_string();
        self.redraw()
    }

    pub fn clear_filter(&self) -> bool {
        self.set_filter("")
    }

    pub fn filter(&self) -> String {
        self.inner.lock().filter.clone()
    }

    /// Advance the sort column to the next shown column, wrapping around. Returns its name.
    pub fn cycle_sort(&self) -> Option<String> {
        let next = {
            let mut inner = self.inner.lock();
            let header = inner.full.as_ref()?.header_arc();
            let cols = header.visible_indices(self.wide);
            let current = inner
                .sort_col
                .as_deref()
                .and_then(|name| header.index_of(name, true))
                .and_then(|idx| cols.iter().position(|&c| c == idx));
            let pick = match current {
                Some(pos) => cols.get((pos + 1) % cols.len().max(1)),
                None => cols.first(),
            };
            let name = pick.and_then(|&c| header.get(c)).map(|c| c.name.clone())?;
            inner.sort_col = Some(name.clone());
            name
        };
        self.redraw();
        Some(next)
    }

    /// Sort on `col` by name. Unknown names are kept and simply do not reorder anything.
    pub fn set_sort(&self, col: &str, ascending: bool) -> bool {
        {
            let mut inner = self.inner.lock();
            inner.sort_col = Some(col.to_string());
            inner.ascending = ascending;
        }
        self.redraw()
    }

    /// Toggle the direction. Returns whether the sort is now ascending.
    pub fn flip_sort(&self) -> bool {
        let ascending = {
            let mut inner = self.inner.lock();
            inner.ascending = !inner.ascending;
            inner.ascending
        };
        self.redraw();
        ascending
    }

    pub fn sort_col(&self) -> Option<String> {
        self.inner.lock().sort_col.clone()
    }

    /// The last full snapshot, unfiltered and unsorted.
    pub fn snapshot(&self) -> Option<TableSnapshot> {
        self.inner.lock().full.clone()
    }

    /// What a redraw would show right now.
    pub fn current(&self) -> Option<TableSnapshot> {
        let inner = self.inner.lock();
        inner.full.as_ref().map(|full| derive(full, &inner.filter, inner.sort_col.as_deref(), inner.ascending))
    }

    pub fn title(&self) -> String {
        let inner = self.inner.lock();
        let shown = inner
            .full
            .as_ref()
            .map(|full| derive(full, &inner.filter, None, true).row_count())
            .unwrap_or(0);
        self.format_title(&inner, shown)
    }

    fn format_title(&self, inner: &ViewInner, count: usize) -> String {
        let scope = inner
            .full
            .as_ref()
            .map(|f| Scope::new(f.namespace()).to_string())
            .unwrap_or_else(|| Scope::ALL.to_string());
        let mut title = format!(" <{}>[{}][{}] ", self.rid, scope, count);
        if !inner.filter.is_empty() {
            title.push_str(&format!("Filter: {} ", inner.filter));
        }
        if let Some(err) = &inner.error {
            title.push_str(&format!("Error: {err} "));
        }
        title
    }

    fn begin_update(&self) -> Option<UpdateGuard<'_>> {
        self.updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| UpdateGuard(&self.updating))
    }

    /// Re-derive and draw. Skips (returns false) when another redraw is in progress.
    pub fn redraw(&self) -> bool {
        let Some(_guard) = self.begin_update() else {
            debug!(rid = %self.rid, "redraw already in progress; skipping");
            counter!("view_redraw_skipped_total", 1u64);
            return false;
        };

        let prepared = {
            let inner = self.inner.lock();
            match inner.full.as_ref() {
                None => Err((self.format_title(&inner, 0), inner.error.clone())),
                Some(full) => {
                    let shown = derive(full, &inner.filter, inner.sort_col.as_deref(), inner.ascending);
                    let state = ViewState {
                        title: self.format_title(&inner, shown.row_count()),
                        filter: (!inner.filter.is_empty()).then(|| inner.filter.clone()),
                        sort_col: inner.sort_col.clone(),
                        ascending: inner.ascending,
                        wide: self.wide,
                        tones: Vec::new(),
                    };
                    Ok((shown, state, full.is_empty()))
                }
            }
        };
        let (shown, state, full_empty) = match prepared {
            Ok(p) => p,
            Err((title, error)) => {
                self.surface.set_title(&title);
                match error {
                    Some(err) => self.surface.show_message(&err, MessageKind::Error),
                    None => self.surface.show_message(MSG_LOADING, MessageKind::Info),
                }
                return true;
            }
        };

        self.surface.set_title(&state.title);
        if full_empty {
            self.surface.show_message(MSG_NO_RESOURCES, MessageKind::Info);
        } else if shown.is_empty() {
            self.surface.show_message(MSG_NO_MATCHES, MessageKind::Info);
        } else {
            let tones = self.tones(&shown);
            self.surface.draw(&shown, &ViewState { tones, ..state });
        }
        true
    }

    fn tones(&self, shown: &TableSnapshot) -> Vec<RowTone> {
        match &self.renderer {
            Some(r) => shown.rows().iter().map(|re| r.tone(shown.header(), re)).collect(),
            None => vec![RowTone::Std; shown.row_count()],
        }
    }

    /// Record the error and redraw: the last good rows under an error title, or the error
    /// itself when nothing was ever loaded. Skipped like any redraw while one is running.
    pub fn load_failed(&self, err: &EngineError) -> bool {
        self.inner.lock().error = Some(err.to_string());
        self.redraw()
    }
}

/// Filter then sort `full`. The filter is a case-insensitive substring match on any field.
/// The sort mode comes from the column's attributes and the full snapshot's values.
pub fn derive(full: &TableSnapshot, filter: &str, sort_col: Option<&str>, ascending: bool) -> TableSnapshot {
    let mut out = if filter.is_empty() {
        full.clone()
    } else {
        let needle = filter.to_lowercase();
        full.filtered(|re| re.row.fields.iter().any(|f| f.to_lowercase().contains(&needle)))
    };
    let Some(col) = sort_col.and_then(|name| full.header().index_of(name, true)) else {
        return out;
    };
    let mode = SortMode::for_column(full.header(), col, full.rows().iter().map(|re| re.row.field(col).unwrap_or("")));
    out = out.sorted_by(|a, b| {
        let ord = sort::compare_events(mode, col, a, b);
        if ascending { ord } else { ord.reverse() }
    });
    out
}

impl<S: RenderSurface> TableListener for TableView<S> {
    fn table_data_changed(&self, data: &TableSnapshot) {
        self.update(data);
    }

    fn table_no_data(&self, data: &TableSnapshot) {
        self.update(data);
    }

    fn table_load_failed(&self, err: &EngineError) {
        self.load_failed(err);
    }
}

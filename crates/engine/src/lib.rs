//! Cumulus engine: keeps one resource type's table fresh.
//!
//! An [`Engine`] binds a [`Fetcher`] and a [`Renderer`] for one resource id. `watch` refreshes
//! once, then keeps refreshing on an interval until `stop`. Every refresh builds a brand new
//! [`TableSnapshot`] and swaps it in; readers call [`Engine::peek`] and never block the writer.
//! Listeners hear about each outcome after the snapshot it describes is visible.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use cumulus_core::TableSnapshot;
use cumulus_provider::{Fetcher, ProviderError, Renderer, ResourceId, Scope};
use metrics::{counter, gauge, histogram};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod config;
pub mod reconcile;

pub use config::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no fetch function configured")]
    MissingFetcher,
    #[error("no renderer configured")]
    MissingRenderer,
    #[error(transparent)]
    Fetch(#[from] ProviderError),
}

impl EngineError {
    /// Configuration errors fail the call; everything else is reported to listeners.
    pub fn is_config(&self) -> bool {
        matches!(self, EngineError::MissingFetcher | EngineError::MissingRenderer)
    }
}

/// Receives refresh outcomes. Callbacks run on the refreshing task and may add or remove
/// listeners (including themselves) on the same engine.
pub trait TableListener: Send + Sync {
    fn table_data_changed(&self, data: &TableSnapshot);
    /// The listing came back empty after the previous one had rows.
    fn table_no_data(&self, data: &TableSnapshot);
    fn table_load_failed(&self, err: &EngineError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Changed { rows: usize },
    NoData,
    /// Fetch failed; previous snapshot kept.
    Failed,
    /// Cancelled while in flight; nothing published or notified.
    Discarded,
}

struct WatchState {
    generation: u64,
    scope: Scope,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

pub struct Engine {
    rid: ResourceId,
    cfg: EngineConfig,
    fetcher: RwLock<Option<Arc<dyn Fetcher>>>,
    renderer: RwLock<Option<Arc<dyn Renderer>>>,
    data: ArcSwap<TableSnapshot>,
    listeners: Mutex<Vec<Arc<dyn TableListener>>>,
    watcher: Mutex<Option<WatchState>>,
    generation: Mutex<u64>,
    epoch_tx: watch::Sender<u64>,
}

impl Engine {
    pub fn new(rid: ResourceId, cfg: EngineConfig) -> Self {
        let (epoch_tx, _) = watch::channel(0u64);
        Self {
            rid,
            cfg: cfg.normalized(),
            fetcher: RwLock::new(None),
            renderer: RwLock::new(None),
            data: ArcSwap::from_pointee(TableSnapshot::default()),
            listeners: Mutex::new(Vec::new()),
            watcher: Mutex::new(None),
            generation: Mutex::new(0),
            epoch_tx,
        }
    }

    /// Engine for a built-in resource id, with its renderer already bound.
    pub fn builtin(rid: ResourceId, fetcher: Arc<dyn Fetcher>, cfg: EngineConfig) -> Result<Self, ProviderError> {
        let renderer = cumulus_provider::renderer_for(&rid)?;
        Ok(Self::new(rid, cfg).with_fetcher(fetcher).with_renderer(renderer))
    }

    pub fn with_fetcher(self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.set_fetcher(fetcher);
        self
    }

    pub fn with_renderer(self, renderer: Arc<dyn Renderer>) -> Self {
        self.set_renderer(renderer);
        self
    }

    pub fn set_fetcher(&self, fetcher: Arc<dyn Fetcher>) {
        *self.fetcher.write() = Some(fetcher);
    }

    pub fn set_renderer(&self, renderer: Arc<dyn Renderer>) {
        *self.renderer.write() = Some(renderer);
    }

    pub fn renderer(&self) -> Option<Arc<dyn Renderer>> {
        self.renderer.read().clone()
    }

    pub fn rid(&self) -> &ResourceId {
        &self.rid
    }

    pub fn config(&self) -> EngineConfig {
        self.cfg
    }

    /// Latest published snapshot. Never blocks.
    pub fn peek(&self) -> Arc<TableSnapshot> {
        self.data.load_full()
    }

    /// Bumped after every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.epoch_tx.subscribe()
    }

    pub fn add_listener(&self, l: Arc<dyn TableListener>) {
        self.listeners.lock().push(l);
    }

    /// Removes `l` by identity. Returns whether it was registered.
    pub fn remove_listener(&self, l: &Arc<dyn TableListener>) -> bool {
        let mut ls = self.listeners.lock();
        match ls.iter().position(|x| Arc::ptr_eq(x, l)) {
            Some(i) => {
                ls.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().as_ref().is_some_and(|w| !w.cancel.is_cancelled())
    }

    pub fn watched_scope(&self) -> Option<Scope> {
        self.watcher.lock().as_ref().map(|w| w.scope.clone())
    }

    /// Cancel any previous loop, refresh once, then keep refreshing every
    /// `refresh_interval` on a background task. Returns after the first refresh.
    pub async fn watch(self: &Arc<Self>, scope: Scope) -> Result<RefreshOutcome, EngineError> {
        let cancel = CancellationToken::new();
        let generation = {
            let mut g = self.generation.lock();
            *g += 1;
            *g
        };
        {
            let mut guard = self.watcher.lock();
            let prev = guard.replace(WatchState {
                generation,
                scope: scope.clone(),
                cancel: cancel.clone(),
                task: None,
            });
            if let Some(prev) = prev {
                prev.cancel.cancel();
            }
        }

        let outcome = match self.refresh_with(&scope, &cancel).await {
            Ok(o) => o,
            Err(e) => {
                self.clear_watch(generation);
                return Err(e);
            }
        };
        if cancel.is_cancelled() {
            return Ok(outcome);
        }

        let every = self.cfg.refresh_interval;
        let task = tokio::spawn(refresh_loop(Arc::downgrade(self), scope.clone(), cancel.clone(), every));
        let mut guard = self.watcher.lock();
        match guard.as_mut() {
            Some(w) if w.generation == generation => w.task = Some(task),
            _ => cancel.cancel(),
        }
        drop(guard);
        info!(rid = %self.rid, %scope, every_ms = every.as_millis() as u64, "watching");
        Ok(outcome)
    }

    /// Cancel the refresh loop. Safe to call repeatedly or before `watch`.
    pub fn stop(&self) {
        if let Some(w) = self.watcher.lock().take() {
            w.cancel.cancel();
            info!(rid = %self.rid, scope = %w.scope, "watch stopped");
        }
    }

    /// `stop`, then wait for the loop task to exit.
    pub async fn shutdown(&self) {
        let state = {
            let mut guard = self.watcher.lock();
            let state = guard.take();
            if let Some(w) = &state {
                w.cancel.cancel();
            }
            state
        };
        if let Some(w) = state {
            if let Some(task) = w.task {
                let _ = task.await;
            }
        }
    }

    /// Refresh now. Honours the current watch's cancellation, if any.
    pub async fn refresh(&self, scope: &Scope) -> Result<RefreshOutcome, EngineError> {
        let cancel = self
            .watcher
            .lock()
            .as_ref()
            .map(|w| w.cancel.child_token())
            .unwrap_or_default();
        self.refresh_with(scope, &cancel).await
    }

    fn clear_watch(&self, generation: u64) {
        let mut guard = self.watcher.lock();
        if guard.as_ref().is_some_and(|w| w.generation == generation) {
            *guard = None;
        }
    }

    async fn refresh_with(&self, scope: &Scope, cancel: &CancellationToken) -> Result<RefreshOutcome, EngineError> {
        let fetcher = self.fetcher.read().clone().ok_or(EngineError::MissingFetcher)?;
        let renderer = self.renderer.read().clone().ok_or(EngineError::MissingRenderer)?;
        let started = std::time::Instant::now();
        let timeout = self.cfg.fetch_timeout;

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            res = tokio::time::timeout(timeout, fetcher.fetch(scope, cancel)) => {
                res.unwrap_or(Err(ProviderError::Timeout(timeout)))
            }
        };
        if cancel.is_cancelled() {
            debug!(rid = %self.rid, %scope, "discarding refresh result after cancellation");
            return Ok(RefreshOutcome::Discarded);
        }
        let objs = match fetched {
            Ok(objs) => objs,
            Err(ProviderError::Cancelled) => return Ok(RefreshOutcome::Discarded),
            Err(e) => {
                counter!("engine_refresh_total", 1u64, "outcome" => "error");
                warn!(rid = %self.rid, %scope, error = %e, "refresh failed; keeping previous data");
                let err = EngineError::Fetch(e);
                self.notify(|l| l.table_load_failed(&err));
                return Ok(RefreshOutcome::Failed);
            }
        };

        let header = renderer.header(scope);
        let (rows, skipped) = reconcile::render_all(renderer.as_ref(), &header, &objs, scope);
        let prev = self.data.load_full();
        let (events, dropped) = reconcile::reconcile(&prev, &header, rows);
        let mut next = TableSnapshot::with_rows(header, events);
        next.set_namespace(scope.to_string());
        let next = Arc::new(next);
        {
            // Cancellation happens under the same lock, so a stopped loop never publishes.
            let _publish = self.watcher.lock();
            if cancel.is_cancelled() {
                debug!(rid = %self.rid, %scope, "discarding refresh result after cancellation");
                return Ok(RefreshOutcome::Discarded);
            }
            self.data.store(Arc::clone(&next));
            self.epoch_tx.send_modify(|e| *e = e.wrapping_add(1));
        }

        let took_ms = started.elapsed().as_secs_f64() * 1000.0;
        counter!("engine_refresh_total", 1u64, "outcome" => "ok");
        histogram!("engine_refresh_ms", took_ms);
        gauge!("engine_rows", next.row_count() as f64);
        if skipped + dropped > 0 {
            counter!("engine_render_skipped_total", (skipped + dropped) as u64);
        }
        debug!(rid = %self.rid, %scope, rows = next.row_count(), skipped, dropped, took_ms, "refresh published");

        if cancel.is_cancelled() {
            return Ok(RefreshOutcome::Discarded);
        }
        if next.is_empty() && !prev.is_empty() {
            self.notify(|l| l.table_no_data(&next));
            Ok(RefreshOutcome::NoData)
        } else {
            self.notify(|l| l.table_data_changed(&next));
            Ok(RefreshOutcome::Changed { rows: next.row_count() })
        }
    }

    fn notify<F: Fn(&dyn TableListener)>(&self, f: F) {
        let listeners: Vec<Arc<dyn TableListener>> = self.listeners.lock().clone();
        for l in &listeners {
            f(l.as_ref());
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(w) = self.watcher.get_mut().take() {
            w.cancel.cancel();
        }
    }
}

async fn refresh_loop(weak: std::sync::Weak<Engine>, scope: Scope, cancel: CancellationToken, every: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(engine) = weak.upgrade() else { break };
        if let Err(e) = engine.refresh_with(&scope, &cancel).await {
            warn!(rid = %engine.rid, %scope, error = %e, "periodic refresh failed");
        }
    }
    debug!(%scope, "refresh loop exited");
}

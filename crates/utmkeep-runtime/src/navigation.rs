//! Client-side navigation notifications and the deferred replay they
//! trigger.
//!
//! The host page drives [`NavigationHub`] from its router (or from the
//! platform's navigation event). [`SpaReplay`] listens on the hub and, after
//! each navigation, waits for the new view to render before replaying into
//! the document again. Scheduled replays are never cancelled; replay is
//! idempotent, so overlapping runs are harmless.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use utmkeep_dom::FormDocument;
use utmkeep_storage::{CookieJar, KeyValueStore};

use crate::error::HookError;
use crate::tracker::AttributionTracker;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    Pop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub kind: NavigationKind,
    pub url: String,
}

/// History-change broadcaster.
pub struct NavigationHub {
    tx: StdMutex<Option<broadcast::Sender<NavigationEvent>>>,
}

impl Default for NavigationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx: StdMutex::new(Some(tx)),
        }
    }

    pub fn push_state(&self, url: impl Into<String>) -> usize {
        self.notify(NavigationKind::Push, url.into())
    }

    pub fn replace_state(&self, url: impl Into<String>) -> usize {
        self.notify(NavigationKind::Replace, url.into())
    }

    pub fn pop_state(&self, url: impl Into<String>) -> usize {
        self.notify(NavigationKind::Pop, url.into())
    }

    pub fn subscribe(&self) -> Result<broadcast::Receiver<NavigationEvent>, HookError> {
        self.sender()
            .map(|tx| tx.subscribe())
            .ok_or_else(|| HookError::Unavailable("navigation hub is shut down".into()))
    }

    /// Stop broadcasting. Listeners see the channel close and exit.
    pub fn shutdown(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Returns how many listeners received the event.
    fn notify(&self, kind: NavigationKind, url: String) -> usize {
        let Some(tx) = self.sender() else {
            return 0;
        };
        debug!(?kind, url = %url, "navigation");
        tx.send(NavigationEvent { kind, url }).unwrap_or(0)
    }

    fn sender(&self) -> Option<broadcast::Sender<NavigationEvent>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Listener task replaying attribution after every navigation.
pub struct SpaReplay {
    handle: JoinHandle<()>,
}

impl SpaReplay {
    /// Subscribe to `hub` on the current tokio runtime.
    pub fn install<P, C, S, D>(
        tracker: Arc<AttributionTracker<P, C, S>>,
        doc: Arc<Mutex<D>>,
        hub: &NavigationHub,
    ) -> Result<Self, HookError>
    where
        P: KeyValueStore + 'static,
        C: CookieJar + 'static,
        S: KeyValueStore + 'static,
        D: FormDocument + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| HookError::Unavailable(format!("no async runtime: {e}")))?;
        let mut rx = hub.subscribe()?;
        let delay = tracker.config().nav_replay_delay();

        let handle = runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        debug!(url = %event.url, "scheduling replay after navigation");
                        schedule_replay(Arc::clone(&tracker), Arc::clone(&doc), delay);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "navigation listener lagged");
                        schedule_replay(Arc::clone(&tracker), Arc::clone(&doc), delay);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(Self { handle })
    }

    /// [`SpaReplay::install`], logging instead of failing. Initial capture
    /// and replay do not depend on the hook.
    pub fn try_install<P, C, S, D>(
        tracker: Arc<AttributionTracker<P, C, S>>,
        doc: Arc<Mutex<D>>,
        hub: &NavigationHub,
    ) -> Option<Self>
    where
        P: KeyValueStore + 'static,
        C: CookieJar + 'static,
        S: KeyValueStore + 'static,
        D: FormDocument + Send + 'static,
    {
        match Self::install(tracker, doc, hub) {
            Ok(hook) => Some(hook),
            Err(e) => {
                warn!(error = %e, "navigation replay disabled");
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

fn schedule_replay<P, C, S, D>(
    tracker: Arc<AttributionTracker<P, C, S>>,
    doc: Arc<Mutex<D>>,
    delay: Duration,
) where
    P: KeyValueStore + 'static,
    C: CookieJar + 'static,
    S: KeyValueStore + 'static,
    D: FormDocument + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let mut doc = doc.lock().await;
        let report = tracker.fill_fields(&mut *doc);
        debug!(
            filled = report.filled,
            appended = report.appended,
            "replay after navigation"
        );
    });
}

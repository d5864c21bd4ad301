//! Browser tab plumbing for the login flow.
//!
//! The host reports tab events to a [`TabEventHub`]; a login attempt holds a
//! [`TabSubscription`] that owns one navigation listener and one closure listener for a
//! single tab id. Dropping the subscription removes both listeners together.

use async_trait::async_trait;
use feedlens_core::CoreError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

pub type TabId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    Navigated { url: String },
    Closed,
}

/// Opens and closes browsing contexts on behalf of the coordinator.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn open_tab(&self, url: &str) -> Result<TabId, CoreError>;
    async fn close_tab(&self, tab_id: TabId) -> Result<(), CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ListenerKind {
    Navigation,
    Closure,
}

#[derive(Debug)]
struct Listener {
    tab_id: TabId,
    sender: mpsc::UnboundedSender<TabEvent>,
}

#[derive(Debug, Default)]
struct HubInner {
    listeners: HashMap<(u64, ListenerKind), Listener>,
}

#[derive(Debug, Clone, Default)]
pub struct TabEventHub {
    inner: Arc<Mutex<HubInner>>,
    next_id: Arc<AtomicU64>,
}

impl TabEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers the listener pair for `tab_id`.
    pub fn subscribe(&self, tab_id: TabId) -> TabSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        {
            let mut inner = self.lock();
            for kind in [ListenerKind::Navigation, ListenerKind::Closure] {
                inner.listeners.insert(
                    (id, kind),
                    Listener {
                        tab_id,
                        sender: sender.clone(),
                    },
                );
            }
        }

        debug!("Listening to tab {} (subscription {})", tab_id, id);
        TabSubscription {
            id,
            tab_id,
            hub: self.clone(),
            receiver,
        }
    }

    pub fn navigated(&self, tab_id: TabId, url: &str) {
        self.dispatch(tab_id, ListenerKind::Navigation, TabEvent::Navigated {
            url: url.to_string(),
        });
    }

    pub fn closed(&self, tab_id: TabId) {
        self.dispatch(tab_id, ListenerKind::Closure, TabEvent::Closed);
    }

    fn dispatch(&self, tab_id: TabId, kind: ListenerKind, event: TabEvent) {
        let inner = self.lock();
        for ((_, listener_kind), listener) in inner.listeners.iter() {
            if *listener_kind == kind && listener.tab_id == tab_id {
                let _ = listener.sender.send(event.clone());
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn unsubscribe(&self, id: u64) {
        let mut inner = self.lock();
        inner.listeners.remove(&(id, ListenerKind::Navigation));
        inner.listeners.remove(&(id, ListenerKind::Closure));
    }
}

/// Scoped listener pair for one tab.
#[derive(Debug)]
pub struct TabSubscription {
    id: u64,
    tab_id: TabId,
    hub: TabEventHub,
    receiver: mpsc::UnboundedReceiver<TabEvent>,
}

impl TabSubscription {
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// Next event for this tab.
    pub async fn recv(&mut self) -> Option<TabEvent> {
        self.receiver.recv().await
    }
}

impl Drop for TabSubscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
        debug!("Stopped listening to tab {}", self.tab_id);
    }
}

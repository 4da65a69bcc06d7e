//! Bookkeeping for in-flight calls and active subscriptions.
//!
//! One mutex covers both maps: the read pump resolves replies and looks up
//! subscriptions, while callers register and unregister, and a subscribe reply
//! has to move from one map to the other atomically. The lock is never held
//! across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::value::RawValue;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Result, RpcError};
use crate::jsonrpc::JsonRpcResponse;

/// Receives one raw payload per server notification.
pub type NotificationSink = mpsc::Sender<Box<RawValue>>;

/// Delivers exactly one reply to the awaiting caller.
pub type ReplySender = oneshot::Sender<JsonRpcResponse>;

/// A call waiting for its reply.
#[derive(Debug)]
pub struct PendingCall {
    reply: ReplySender,
    /// Set for subscribe calls; registered under the id the reply carries.
    subscription: Option<NotificationSink>,
}

impl PendingCall {
    pub fn new(reply: ReplySender) -> Self {
        Self {
            reply,
            subscription: None,
        }
    }

    pub fn subscribe(reply: ReplySender, sink: NotificationSink) -> Self {
        Self {
            reply,
            subscription: Some(sink),
        }
    }
}

/// Where notifications for one subscription go.
///
/// `closed` fires when the subscription is removed. Deliveries parked behind
/// a full sink hold a clone of it and give up on that signal, so the
/// consumer's stream ends once the last sink clone is gone.
#[derive(Debug, Clone)]
pub struct Route {
    pub sink: NotificationSink,
    pub closed: CancellationToken,
}

impl Route {
    fn new(sink: NotificationSink) -> Self {
        Self {
            sink,
            closed: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    pending: HashMap<String, PendingCall>,
    subscriptions: HashMap<String, Route>,
    closed: bool,
}

impl Tables {
    /// Route notifications for `sub_id` into `sink`. Ignored once drained.
    fn add_subscription(&mut self, sub_id: String, sink: NotificationSink) {
        if self.closed {
            return;
        }
        if let Some(previous) = self.subscriptions.insert(sub_id.clone(), Route::new(sink)) {
            previous.closed.cancel();
            warn!("Subscription {} registered twice; previous stream closed", sub_id);
        }
    }
}

/// Everything still registered at teardown.
#[derive(Debug, Default)]
pub struct Drained {
    pub pending: Vec<(String, ReplySender)>,
    pub subscriptions: Vec<(String, Route)>,
}

/// Maps call ids to reply channels and subscription ids to notification sinks.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    inner: Mutex<Tables>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // No invariant spans a panic inside the critical sections.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a pending call.
    ///
    /// Fails if `id` is outstanding already or the table was drained.
    pub fn register(&self, id: &str, call: PendingCall) -> Result<()> {
        let mut tables = self.lock();
        if tables.closed {
            return Err(RpcError::ConnectionClosed);
        }
        if tables.pending.contains_key(id) {
            return Err(RpcError::DuplicateId(id.to_string()));
        }
        tables.pending.insert(id.to_string(), call);
        Ok(())
    }

    /// Remove the pending call for `id` and hand back its reply channel.
    ///
    /// A subscribe call whose reply carries a subscription id has its sink
    /// registered in the same critical section, so a notification read right
    /// after the reply finds it.
    pub fn resolve(&self, id: &str, response: &JsonRpcResponse) -> Option<ReplySender> {
        let mut tables = self.lock();
        let call = tables.pending.remove(id)?;

        if let Some(sink) = call.subscription {
            if let Some(sub_id) = subscription_id(response) {
                tables.add_subscription(sub_id, sink);
            }
        }

        Some(call.reply)
    }

    /// Drop a pending call whose caller stopped waiting. Returns whether it was
    /// still registered.
    pub fn forget(&self, id: &str) -> bool {
        self.lock().pending.remove(id).is_some()
    }

    /// Route for a subscription id.
    pub fn lookup(&self, sub_id: &str) -> Option<Route> {
        self.lock().subscriptions.get(sub_id).cloned()
    }

    /// Remove a subscription and signal its parked deliveries to drop their
    /// payloads. The consumer's stream ends once they have let go of the sink.
    pub fn unregister(&self, sub_id: &str) -> bool {
        let route = self.lock().subscriptions.remove(sub_id);
        match route {
            Some(route) => {
                route.closed.cancel();
                true
            }
            None => false,
        }
    }

    /// Take every registered channel and refuse further registrations.
    pub fn drain_all(&self) -> Drained {
        let mut tables = self.lock();
        tables.closed = true;
        Drained {
            pending: tables
                .pending
                .drain()
                .map(|(id, call)| (id, call.reply))
                .collect(),
            subscriptions: tables
                .subscriptions
                .drain()
                .inspect(|(_, route)| route.closed.cancel())
                .collect(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn subscription_len(&self) -> usize {
        self.lock().subscriptions.len()
    }
}

/// The subscription id a successful subscribe reply carries.
fn subscription_id(response: &JsonRpcResponse) -> Option<String> {
    if response.error.is_some() || response.is_result_null() {
        return None;
    }
    let raw = response.result.as_deref()?;
    serde_json::from_str::<String>(raw.get())
        .ok()
        .filter(|id| !id.is_empty())
}

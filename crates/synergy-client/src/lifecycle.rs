//! Subscription Lifecycle Manager.
//!
//! A [`ScreenScope`] owns the live queries of one screen. Each query sits
//! in a named region slot and feeds one cache collection. The scope
//! guarantees that:
//!
//! - a slot holds at most one live subscription, and re-binding it with a
//!   different key disposes the previous one before the next is created;
//! - nothing is subscribed without a signed-in identity;
//! - an identity change disposes the subscriptions opened under the old
//!   identity;
//! - unmounting disposes every slot, and a disposed subscription never
//!   writes to the cache again.

use std::collections::HashMap;

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use synergy_shared::{Document, Result};

use crate::cache::{Collection, SessionCache, SessionState};
use crate::remote::RemoteAccess;
use crate::subscription::{LiveQuery, Subscription, SubscriptionHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Unregistered,
    Active { key: String },
    Disposed,
}

struct Slot {
    key: String,
    handle: SubscriptionHandle,
}

pub struct ScreenScope {
    name: String,
    remote: RemoteAccess,
    session: SessionCache,
    token: CancellationToken,
    slots: HashMap<&'static str, Slot>,
}

impl ScreenScope {
    pub fn new(name: impl Into<String>, remote: RemoteAccess, session: SessionCache) -> Self {
        let name = name.into();
        debug!(screen = %name, "Screen mounted");
        Self {
            name,
            remote,
            session,
            token: CancellationToken::new(),
            slots: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mounted(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Run `f` only while the screen is mounted. Completions of requests
    /// started by the screen go through here before touching the cache.
    pub fn if_mounted<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if self.is_mounted() {
            Some(f())
        } else {
            debug!(screen = %self.name, "Dropping result for unmounted screen");
            None
        }
    }

    /// Cancelled when the screen unmounts.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Bind `region` to a live query identified by `key`, feeding `sink`.
    ///
    /// Binding the same key again is a no-op. A different key disposes the
    /// current subscription first. Without a signed-in identity, or after
    /// unmount, nothing is subscribed and the slot reports
    /// [`SlotState::Unregistered`]. Backend refusals are recorded on `sink`
    /// and returned.
    pub fn bind<T: Document>(
        &mut self,
        region: &'static str,
        key: impl Into<String>,
        live: &LiveQuery<T>,
        sink: &Collection<T>,
    ) -> Result<SlotState> {
        let key = key.into();
        if let Some(slot) = self.slots.get(region) {
            if slot.key == key && !slot.handle.is_disposed() {
                return Ok(SlotState::Active { key });
            }
        }
        self.release(region);

        if !self.is_mounted() {
            return Ok(SlotState::Unregistered);
        }
        let Some(identity) = self.session.identity() else {
            debug!(screen = %self.name, region, "No identity; not subscribing");
            return Ok(SlotState::Unregistered);
        };

        sink.set_loading(true);
        let subscription = match live.subscribe_child(&self.remote, &self.token) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(screen = %self.name, region, error = %e, "Subscribe failed");
                sink.set_loading(false);
                sink.set_error(e.clone());
                return Err(e);
            }
        };

        let handle = subscription.handle();
        tokio::spawn(pump(
            subscription,
            sink.clone(),
            self.session.watch(),
            identity.uid,
        ));
        debug!(screen = %self.name, region, key = %key, "Region bound");
        self.slots.insert(
            region,
            Slot {
                key: key.clone(),
                handle,
            },
        );
        Ok(SlotState::Active { key })
    }

    /// Dispose the subscription in `region`. Returns `true` if one was
    /// live.
    pub fn release(&mut self, region: &'static str) -> bool {
        match self.slots.get(region) {
            Some(slot) => slot.handle.dispose(),
            None => false,
        }
    }

    pub fn slot_state(&self, region: &str) -> SlotState {
        match self.slots.get(region) {
            None => SlotState::Unregistered,
            Some(slot) if slot.handle.is_disposed() => SlotState::Disposed,
            Some(slot) => SlotState::Active {
                key: slot.key.clone(),
            },
        }
    }

    pub fn active_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| !slot.handle.is_disposed())
            .count()
    }

    /// Dispose every slot. Further binds do nothing.
    pub fn unmount(&mut self) {
        if !self.is_mounted() {
            return;
        }
        let released = self
            .slots
            .values()
            .filter(|slot| slot.handle.dispose())
            .count();
        self.token.cancel();
        info!(screen = %self.name, released, "Screen unmounted");
    }
}

impl Drop for ScreenScope {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Copy result sets into the cache until the subscription is disposed or
/// the identity it was opened under goes away.
async fn pump<T: Document>(
    mut subscription: Subscription<T>,
    sink: Collection<T>,
    mut session: watch::Receiver<SessionState>,
    uid: String,
) {
    let handle = subscription.handle();
    loop {
        tokio::select! {
            biased;
            _ = handle.token().cancelled() => break,
            changed = session.changed() => {
                let same = changed.is_ok()
                    && session
                        .borrow_and_update()
                        .identity
                        .as_ref()
                        .is_some_and(|identity| identity.uid == uid);
                if !same {
                    info!(subscription = handle.label(), "Identity changed; disposing");
                    handle.dispose();
                    break;
                }
            }
            next = subscription.next() => match next {
                Some(Ok(items)) => {
                    if handle.is_disposed() {
                        break;
                    }
                    sink.set_all(items);
                    sink.set_loading(false);
                }
                Some(Err(e)) => {
                    warn!(subscription = handle.label(), error = %e, "Live query failed");
                    sink.set_loading(false);
                    sink.set_error(e);
                }
                None => break,
            },
        }
    }
    debug!(subscription = handle.label(), "Pump stopped");
}

//! Fan-out of main-frame navigation events to navigation waits.

use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::session::SessionError;

/// Forwards a stream of navigation signals to any number of waiters.
///
/// [`NavigationWatch::next`] subscribes on its first poll, so joining it with
/// the action that triggers the navigation cannot miss the event. When the
/// source stream ends (the tab went away) pending and later waits fail with
/// [`SessionError::Closed`].
pub struct NavigationWatch {
    subscriptions: broadcast::Receiver<()>,
    forwarder: JoinHandle<()>,
}

impl NavigationWatch {
    pub fn spawn<S>(mut events: S) -> Self
    where
        S: Stream<Item = ()> + Send + Unpin + 'static,
    {
        let (tx, subscriptions) = broadcast::channel(16);
        let forwarder = tokio::spawn(async move {
            while events.next().await.is_some() {
                // no subscriber outside a navigation wait
                let _ = tx.send(());
            }
        });
        Self {
            subscriptions,
            forwarder,
        }
    }

    /// Resolve on the first navigation after this call starts.
    pub async fn next(&self) -> Result<(), SessionError> {
        let mut events = self.subscriptions.resubscribe();
        match events.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => Ok(()),
            Err(broadcast::error::RecvError::Closed) => Err(SessionError::Closed),
        }
    }
}

impl Drop for NavigationWatch {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

//! Network-quiet detection for `WaitUntil::NetworkIdle`.
//!
//! Listeners are attached before navigation starts; [`NetworkIdleTracker::wait_for_quiet`]
//! then resolves once no tracked request has been in flight for the quiet
//! window. Requests older than the stall threshold are forced complete so a
//! long-polling endpoint cannot hold the wait open.

use std::collections::HashMap;
use std::pin::Pin;

use chromiumoxide::cdp::IntoEventKind;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestServedFromCache,
    EventRequestWillBeSent, ResourceType,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior, Sleep};

use crate::logging::HarvestLogger;
use crate::session::SessionError;

/// No request for this long counts as idle.
pub const QUIET_WINDOW: Duration = Duration::from_millis(500);
/// In-flight requests older than this are treated as finished.
pub const STALL_THRESHOLD: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum NetworkEvent {
    /// `seen_at` is stamped by the listener task when the event arrives.
    Started {
        request_id: String,
        url: String,
        seen_at: Instant,
    },
    Finished { request_id: String },
}

pub struct NetworkIdleTracker {
    rx: mpsc::UnboundedReceiver<NetworkEvent>,
    listeners: Vec<JoinHandle<()>>,
}

impl NetworkIdleTracker {
    pub async fn attach(page: &Page) -> Result<Self, SessionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listeners = vec![
            spawn_listener(
                page.event_listener::<EventRequestWillBeSent>()
                    .await
                    .map_err(listener_error)?,
                tx.clone(),
                |ev: EventRequestWillBeSent| {
                    if matches!(
                        ev.r#type.as_ref(),
                        Some(ResourceType::WebSocket | ResourceType::EventSource)
                    ) {
                        return None;
                    }
                    Some(NetworkEvent::Started {
                        request_id: ev.request_id.as_ref().to_string(),
                        url: ev.request.url.clone(),
                        seen_at: Instant::now(),
                    })
                },
            ),
            spawn_listener(
                page.event_listener::<EventLoadingFinished>()
                    .await
                    .map_err(listener_error)?,
                tx.clone(),
                |ev: EventLoadingFinished| {
                    Some(NetworkEvent::Finished {
                        request_id: ev.request_id.as_ref().to_string(),
                    })
                },
            ),
            spawn_listener(
                page.event_listener::<EventLoadingFailed>()
                    .await
                    .map_err(listener_error)?,
                tx.clone(),
                |ev: EventLoadingFailed| {
                    Some(NetworkEvent::Finished {
                        request_id: ev.request_id.as_ref().to_string(),
                    })
                },
            ),
            spawn_listener(
                page.event_listener::<EventRequestServedFromCache>()
                    .await
                    .map_err(listener_error)?,
                tx,
                |ev: EventRequestServedFromCache| {
                    Some(NetworkEvent::Finished {
                        request_id: ev.request_id.as_ref().to_string(),
                    })
                },
            ),
        ];
        Ok(Self { rx, listeners })
    }

    /// Resolve once the network has been quiet for [`QUIET_WINDOW`].
    ///
    /// Unbounded; the caller supplies the deadline.
    pub async fn wait_for_quiet(mut self, logger: &HarvestLogger) {
        let mut inflight = InflightRequests::default();
        let mut stall_tick = time::interval(QUIET_WINDOW);
        stall_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut quiet_timer: Option<Pin<Box<Sleep>>> = None;
        start_quiet_timer(&mut quiet_timer);

        loop {
            tokio::select! {
                maybe_event = self.rx.recv() => {
                    match maybe_event {
                        Some(event) => inflight.apply(event, &mut quiet_timer),
                        None => break,
                    }
                }
                _ = async {
                    if let Some(timer) = quiet_timer.as_mut() {
                        timer.as_mut().await;
                    }
                }, if quiet_timer.is_some() => {
                    break;
                }
                _ = stall_tick.tick() => {
                    inflight.sweep_stalled(&mut quiet_timer, logger);
                }
            }
        }
    }
}

impl Drop for NetworkIdleTracker {
    fn drop(&mut self) {
        for handle in self.listeners.drain(..) {
            handle.abort();
        }
    }
}

/// Request id to `(url, seen_at)`.
#[derive(Default)]
struct InflightRequests {
    requests: HashMap<String, (String, Instant)>,
}

impl InflightRequests {
    fn apply(&mut self, event: NetworkEvent, quiet_timer: &mut Option<Pin<Box<Sleep>>>) {
        match event {
            NetworkEvent::Started {
                request_id,
                url,
                seen_at,
            } => {
                self.requests.insert(request_id, (url, seen_at));
                quiet_timer.take();
            }
            NetworkEvent::Finished { request_id } => self.finish(&request_id, quiet_timer),
        }
        if self.requests.is_empty() {
            start_quiet_timer(quiet_timer);
        }
    }

    fn finish(&mut self, request_id: &str, quiet_timer: &mut Option<Pin<Box<Sleep>>>) {
        if self.requests.remove(request_id).is_some() {
            quiet_timer.take();
        }
        if self.requests.is_empty() {
            start_quiet_timer(quiet_timer);
        }
    }

    fn sweep_stalled(&mut self, quiet_timer: &mut Option<Pin<Box<Sleep>>>, logger: &HarvestLogger) {
        let now = Instant::now();
        let stalled: Vec<(String, String)> = self
            .requests
            .iter()
            .filter(|(_, (_, seen_at))| now.saturating_duration_since(*seen_at) > STALL_THRESHOLD)
            .map(|(request_id, (url, _))| (request_id.clone(), url.clone()))
            .collect();

        for (request_id, url) in stalled {
            logger.debug(
                "forcing completion of stalled request",
                Some("network-idle"),
                Some(json!({ "url": url })),
            );
            self.finish(&request_id, quiet_timer);
        }
    }
}

fn start_quiet_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    if timer.is_none() {
        timer.replace(Box::pin(time::sleep(QUIET_WINDOW)));
    }
}

fn listener_error(err: impl std::fmt::Display) -> SessionError {
    SessionError::Message(format!("failed to attach network listener: {err}"))
}

fn spawn_listener<T, F>(
    mut stream: EventStream<T>,
    tx: mpsc::UnboundedSender<NetworkEvent>,
    map: F,
) -> JoinHandle<()>
where
    T: IntoEventKind + Clone + Unpin + Send + 'static,
    F: Fn(T) -> Option<NetworkEvent> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            let Some(mapped) = map((*event).clone()) else {
                continue;
            };
            if tx.send(mapped).is_err() {
                break;
            }
        }
    })
}

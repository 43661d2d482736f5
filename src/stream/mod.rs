//! Resumable stream registry.
//!
//! One generation has one producer; the live HTTP response, the
//! persistence step, and any reconnecting reader all observe the same
//! event sequence through a [`StreamChannel`]: a replay buffer plus a
//! broadcast fan-out. The registry maps a conversation to its most
//! recently registered channel so a client that disconnects can resume
//! without restarting generation.
//!
//! A finished stream is deregistered; resuming a conversation with no
//! live stream returns `None`, a normal terminal state rather than an
//! error. Whether a registry exists at all is a deployment capability:
//! `AppState` carries `Option<StreamRegistry>`, and callers branch on its
//! presence instead of catching an exception.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::events::{StreamEvent, TurnEvent};

/// Broadcast capacity per channel. Readers that lag beyond this skip
/// ahead; the replay buffer still holds the full sequence.
const CHANNEL_CAPACITY: usize = 256;

/// A single generation's event channel: replay buffer + live fan-out.
#[derive(Debug)]
pub struct StreamChannel {
    /// Durable stream identifier.
    pub stream_id: String,
    /// When this generation attempt started.
    pub created_at: DateTime<Utc>,
    seq: AtomicU64,
    sender: broadcast::Sender<StreamEvent>,
    buffer: Mutex<Vec<StreamEvent>>,
}

impl StreamChannel {
    /// Create a channel with a fresh stream ID.
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            stream_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            seq: AtomicU64::new(0),
            sender,
            buffer: Mutex::new(Vec::new()),
        })
    }

    /// Publish an event, assigning the next sequence number.
    pub fn publish(&self, event: TurnEvent) -> StreamEvent {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let event = StreamEvent::new(seq, event);
        self.buffer.lock().push(event.clone());
        let _ = self.sender.send(event.clone());
        event
    }

    /// Subscribe to this channel's full event sequence.
    ///
    /// Replays everything buffered so far, then follows the live feed,
    /// ending after the terminal event. Duplicate delivery across the
    /// replay/live boundary is suppressed by sequence number.
    pub fn subscribe(self: &Arc<Self>) -> impl Stream<Item = StreamEvent> + Send + use<> {
        let channel = Arc::clone(self);

        async_stream::stream! {
            // Subscribe before snapshotting so nothing falls in between
            let mut receiver = channel.sender.subscribe();
            let snapshot: Vec<StreamEvent> = channel.buffer.lock().clone();

            let mut last_seq: Option<u64> = None;
            let mut terminated = false;

            for event in snapshot {
                last_seq = Some(event.seq);
                terminated = event.event.is_terminal();
                yield event;
                if terminated {
                    break;
                }
            }

            if terminated {
                return;
            }

            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if last_seq.is_some_and(|seen| event.seq <= seen) {
                            continue;
                        }
                        last_seq = Some(event.seq);
                        let terminal = event.event.is_terminal();
                        yield event;
                        if terminal {
                            break;
                        }
                    }
                    // Lagged readers skip ahead; closed means producer done
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Maps a conversation to its most recently registered stream channel.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    active: Mutex<HashMap<String, Arc<StreamChannel>>>,
}

impl StreamRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new channel for a conversation before generation
    /// begins. The latest registration wins; any prior channel for the
    /// conversation stops being resumable.
    pub fn register(&self, chat_id: &str) -> Arc<StreamChannel> {
        let channel = StreamChannel::new();
        self.active
            .lock()
            .insert(chat_id.to_string(), Arc::clone(&channel));
        channel
    }

    /// Resume the most recent stream for a conversation, if one is live.
    pub fn resume(&self, chat_id: &str) -> Option<impl Stream<Item = StreamEvent> + Send + use<>> {
        let channel = self.active.lock().get(chat_id).map(Arc::clone)?;
        Some(channel.subscribe())
    }

    /// Deregister a finished stream. Only removes the entry if it still
    /// belongs to `stream_id`, so a slow producer never tears down a
    /// newer registration.
    pub fn finish(&self, chat_id: &str, stream_id: &str) {
        let mut active = self.active.lock();
        if active.get(chat_id).is_some_and(|c| c.stream_id == stream_id) {
            active.remove(chat_id);
        }
    }
}

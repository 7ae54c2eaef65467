use crate::models::types::{ConnectionId, Location, UserId};
use crate::net::sink::ClientSink;
use crate::net::sink::websocket::WebSocketSink;
use crate::state::spatial::SpatialIndex;
use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::stream::SplitSink;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames a slow client may fall behind before broadcasts to it start being dropped.
const OUTBOUND_CAPACITY: usize = 256;

/// Wire envelope shared by inbound and outbound messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, payload: impl Serialize) -> Self {
        let payload = serde_json::to_value(payload).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize event payload");
            Value::Null
        });
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

pub enum OutEvent {
    /// An envelope with its per-connection sequence number
    Frame(Envelope, u64),
    /// Stop the writer; the connection is going away
    Close,
}

#[derive(Clone)]
pub struct OutputHandle {
    conn_id: ConnectionId,
    /// Sender for output events
    tx: mpsc::Sender<OutEvent>,
    /// Next sequence number for output frames
    next_seq: Arc<AtomicU64>,
}

impl OutputHandle {
    /// A handle plus the receiving end its writer task drains.
    pub fn channel(conn_id: ConnectionId) -> (Self, mpsc::Receiver<OutEvent>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let handle = Self {
            conn_id,
            tx,
            next_seq: Arc::new(AtomicU64::new(1)),
        };
        (handle, rx)
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    #[inline]
    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Queue an envelope without waiting. Returns false when the frame was dropped.
    pub fn send(&self, env: Envelope) -> bool {
        let kind = env.kind.clone();
        match self.tx.try_send(OutEvent::Frame(env, self.next_seq())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.conn_id, %kind, "outbound queue full, dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(conn_id = %self.conn_id, %kind, "connection closed, dropping frame");
                false
            }
        }
    }

    pub fn system(&self, text: impl Into<String>) -> bool {
        self.send(crate::events::system(text))
    }

    pub fn error(&self, text: impl Into<String>) -> bool {
        self.send(crate::events::error(text))
    }

    pub fn close(&self) {
        let _ = self.tx.try_send(OutEvent::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct SessionOut {
    rx: mpsc::Receiver<OutEvent>,
}

impl SessionOut {
    pub fn new(rx: mpsc::Receiver<OutEvent>) -> Self {
        Self { rx }
    }

    pub async fn run<C>(mut self, mut client: C) -> anyhow::Result<()>
    where
        C: ClientSink,
    {
        while let Some(event) = self.rx.recv().await {
            match event {
                OutEvent::Frame(env, seq_nr) => client.send_frame(env, seq_nr).await?,
                OutEvent::Close => break,
            }
        }
        client.close().await
    }
}

/// Spawn the writer task for a websocket and hand back the handle that feeds it.
pub fn init_session_for_websocket(conn_id: ConnectionId, websocket_writer: SplitSink<WebSocket, Message>) -> OutputHandle {
    let (handle, rx) = OutputHandle::channel(conn_id);
    let session_out = SessionOut::new(rx);
    let sink = WebSocketSink::new(websocket_writer);

    tokio::spawn(async move {
        if let Err(e) = session_out.run(sink).await {
            tracing::debug!(%conn_id, error = %e, "session output ended");
        }
    });

    handle
}

/// Who an event is addressed to.
#[derive(Debug, Clone)]
pub enum Scope {
    Connection(ConnectionId),
    /// Whatever connection the user currently holds
    User(UserId),
    /// Every player in one grid cell
    Room(Location),
    RoomExcept { room: Location, except: UserId },
    Server,
}

/// Routes envelopes to connections. Room membership is read from the spatial index at dispatch
/// time, so a player who already left a cell never receives that cell's later events.
pub struct Broadcaster {
    connections: DashMap<ConnectionId, OutputHandle>,
    users: DashMap<UserId, ConnectionId>,
    spatial: Arc<SpatialIndex>,
}

impl Broadcaster {
    pub fn new(spatial: Arc<SpatialIndex>) -> Self {
        Self {
            connections: DashMap::new(),
            users: DashMap::new(),
            spatial,
        }
    }

    pub fn register_connection(&self, handle: OutputHandle) {
        self.connections.insert(handle.conn_id(), handle);
    }

    /// Forget the connection. Bindings of users to it are dropped as well.
    pub fn unregister_connection(&self, conn_id: ConnectionId) {
        if let Some((_, handle)) = self.connections.remove(&conn_id) {
            handle.close();
        }
        self.users.retain(|_, c| *c != conn_id);
    }

    /// Point the user scope at `conn_id`. Returns the connection it pointed at before, if any.
    pub fn bind_user(&self, user_id: UserId, conn_id: ConnectionId) -> Option<ConnectionId> {
        self.users.insert(user_id, conn_id).filter(|prev| *prev != conn_id)
    }

    /// Remove the binding, but only while it still points at `conn_id`.
    pub fn unbind_user(&self, user_id: UserId, conn_id: ConnectionId) -> bool {
        self.users.remove_if(&user_id, |_, c| *c == conn_id).is_some()
    }

    pub fn connection_of(&self, user_id: UserId) -> Option<ConnectionId> {
        self.users.get(&user_id).map(|c| *c.value())
    }

    pub fn is_bound(&self, user_id: UserId, conn_id: ConnectionId) -> bool {
        self.connection_of(user_id) == Some(conn_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Deliver `env` to every connection in `scope`. Never blocks; returns how many connections
    /// accepted the frame. Missing targets are logged and skipped.
    pub fn dispatch(&self, scope: Scope, env: Envelope) -> usize {
        match scope {
            Scope::Connection(conn_id) => self.to_connection(conn_id, env) as usize,
            Scope::User(user_id) => self.to_user(user_id, env) as usize,
            Scope::Room(room) => self.to_room(&room, None, env),
            Scope::RoomExcept { room, except } => self.to_room(&room, Some(except), env),
            Scope::Server => {
                let handles: Vec<OutputHandle> = self.connections.iter().map(|e| e.value().clone()).collect();
                handles.into_iter().filter(|h| h.send(env.clone())).count()
            }
        }
    }

    fn to_connection(&self, conn_id: ConnectionId, env: Envelope) -> bool {
        let Some(handle) = self.connections.get(&conn_id).map(|h| h.value().clone()) else {
            tracing::debug!(%conn_id, kind = %env.kind, "no such connection, dropping frame");
            return false;
        };
        handle.send(env)
    }

    fn to_user(&self, user_id: UserId, env: Envelope) -> bool {
        let Some(conn_id) = self.connection_of(user_id) else {
            tracing::debug!(%user_id, kind = %env.kind, "user not connected, dropping frame");
            return false;
        };
        self.to_connection(conn_id, env)
    }

    fn to_room(&self, room: &Location, except: Option<UserId>, env: Envelope) -> usize {
        self.spatial
            .players_at(room)
            .into_iter()
            .filter(|uid| Some(*uid) != except)
            .filter(|uid| self.to_user(*uid, env.clone()))
            .count()
    }
}

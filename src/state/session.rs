use std::collections::BTreeSet;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier of a connected client.
pub type SessionId = Uuid;

/// Role attached to a connection once it has authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRole {
    /// Connected but not logged in.
    Unauthenticated,
    /// Logged in as the named player.
    Player(String),
    /// Logged in as the host.
    Host,
}

impl SessionRole {
    /// Name of the player behind this role, if any.
    pub fn player_name(&self) -> Option<&str> {
        match self {
            SessionRole::Player(name) => Some(name),
            _ => None,
        }
    }

    /// Whether the role is [`SessionRole::Host`].
    pub fn is_host(&self) -> bool {
        matches!(self, SessionRole::Host)
    }
}

#[derive(Clone)]
/// Handle used to push messages to a connected client.
pub struct ClientConnection {
    /// Connection identifier.
    pub id: SessionId,
    /// Current role.
    pub role: SessionRole,
    /// Writer channel of the connection task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Subset of connected clients a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every connected client, authenticated or not.
    All,
    /// Sessions authenticated as host.
    Hosts,
    /// A single session.
    Session(SessionId),
}

/// Registry of connected clients keyed by their session identifier.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, ClientConnection>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new unauthenticated connection and return its identifier.
    pub fn register(&self, tx: mpsc::UnboundedSender<Message>) -> SessionId {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            ClientConnection {
                id,
                role: SessionRole::Unauthenticated,
                tx,
            },
        );
        id
    }

    /// Forget a connection, returning its last known state.
    pub fn remove(&self, id: SessionId) -> Option<ClientConnection> {
        self.sessions.remove(&id).map(|(_, connection)| connection)
    }

    /// Role of a connection, `None` when it is not registered.
    pub fn role(&self, id: SessionId) -> Option<SessionRole> {
        self.sessions.get(&id).map(|entry| entry.role.clone())
    }

    /// Change the role of a connection. Returns `false` when it is not registered.
    pub fn set_role(&self, id: SessionId, role: SessionRole) -> bool {
        match self.sessions.get_mut(&id) {
            Some(mut entry) => {
                entry.role = role;
                true
            }
            None => false,
        }
    }

    /// Sessions currently authenticated as the given player.
    pub fn sessions_for_player(&self, name: &str) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|entry| entry.role.player_name() == Some(name))
            .map(|entry| entry.id)
            .collect()
    }

    /// Names of the players with at least one authenticated connection, sorted and deduplicated.
    pub fn active_players(&self) -> Vec<String> {
        self.sessions
            .iter()
            .filter_map(|entry| entry.role.player_name().map(str::to_owned))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Writer channels of every connection matching the audience.
    pub fn recipients(&self, audience: Audience) -> Vec<mpsc::UnboundedSender<Message>> {
        match audience {
            Audience::All => self.sessions.iter().map(|entry| entry.tx.clone()).collect(),
            Audience::Hosts => self
                .sessions
                .iter()
                .filter(|entry| entry.role.is_host())
                .map(|entry| entry.tx.clone())
                .collect(),
            Audience::Session(id) => self
                .sessions
                .get(&id)
                .map(|entry| entry.tx.clone())
                .into_iter()
                .collect(),
        }
    }

    /// Ask a connection to close by queueing a close frame on its writer.
    pub fn close(&self, id: SessionId) {
        if let Some(entry) = self.sessions.get(&id) {
            let _ = entry.tx.send(Message::Close(None));
        }
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

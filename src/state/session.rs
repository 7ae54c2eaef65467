use crate::models::types::{ConnectionId, UserId};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No `auth` message accepted yet
    PreLogin,
    LoggedIn,
}

#[derive(Debug)]
pub struct Session {
    pub conn_id: ConnectionId,
    // When is the session started/created
    pub session_started: Instant,
    state: ConnState,
    user_id: Option<UserId>,
}

impl Session {
    pub fn new(conn_id: ConnectionId) -> Self {
        Self {
            conn_id,
            session_started: Instant::now(),
            state: ConnState::PreLogin,
            user_id: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == ConnState::LoggedIn && self.user_id.is_some()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn login(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
        self.state = ConnState::LoggedIn;
    }

    pub fn logout(&mut self) -> Option<UserId> {
        self.state = ConnState::PreLogin;
        self.user_id.take()
    }
}

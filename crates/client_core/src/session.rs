use serde::Serialize;
use shared::domain::Address;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Wallet session. Only the coordinator drives its transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    state: ConnectionState,
    address: Option<Address>,
}

impl Session {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Connected identity, if any.
    pub fn identity(&self) -> Option<&Address> {
        if self.is_connected() {
            self.address.as_ref()
        } else {
            None
        }
    }

    pub(crate) fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
        self.address = None;
    }

    pub(crate) fn connected(&mut self, address: Address) {
        self.state = ConnectionState::Connected;
        self.address = Some(address);
    }

    pub(crate) fn disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.address = None;
    }
}

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

/// Observes link lifecycle for the log. It never touches the pixel or the
/// characteristic values, so state survives reconnects.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    clients: BTreeSet<String>,
    connects: u64,
    disconnects: u64,
    last_event: Option<ConnectionEvent>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        ConnectionTracker::default()
    }

    pub fn on_connect(&mut self, client: &str) {
        self.connects += 1;
        self.last_event = Some(ConnectionEvent::Connected);
        if !self.clients.insert(client.to_string()) {
            log::debug!("Device {client} reported connected twice");
        }
        log::info!("Device connected: {client} ({} connected)", self.clients.len());
    }

    pub fn on_disconnect(&mut self, client: &str) {
        self.disconnects += 1;
        self.last_event = Some(ConnectionEvent::Disconnected);
        if !self.clients.remove(client) {
            log::debug!("Device {client} was not tracked as connected");
        }
        log::info!("Device disconnected: {client} ({} connected)", self.clients.len());
    }

    pub fn is_connected(&self) -> bool {
        !self.clients.is_empty()
    }

    pub fn connects(&self) -> u64 {
        self.connects
    }

    pub fn disconnects(&self) -> u64 {
        self.disconnects
    }

    pub fn last_event(&self) -> Option<ConnectionEvent> {
        self.last_event
    }
}

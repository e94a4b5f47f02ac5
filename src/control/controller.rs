use super::{
    command::{interpret, LedCommand},
    connection::ConnectionTracker,
    state::{CharacteristicIdentity, CharacteristicState},
};
use crate::led::LedDriver;

/// Whether a successful write also pushes the new value to a subscribed client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum NotifyPolicy {
    #[default]
    OnWrite,
    /// Values change on write, but clients only see them by reading.
    DescriptorOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub identity: CharacteristicIdentity,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied { notification: Option<Notification> },
    Ignored,
}

impl WriteOutcome {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            WriteOutcome::Applied { notification } => notification.as_ref(),
            WriteOutcome::Ignored => None,
        }
    }
}

/// Owns the pixel and both characteristic states. Access control for the
/// encrypted characteristic happens in the transport before any call lands here.
#[derive(Debug)]
pub struct GattController<L: LedDriver> {
    led: L,
    states: [CharacteristicState; 2],
    connections: ConnectionTracker,
    notify_policy: NotifyPolicy,
}

impl<L: LedDriver> GattController<L> {
    pub fn new(led: L, notify_policy: NotifyPolicy) -> Self {
        assert!(
            led.is_initialized(),
            "LED driver must be initialized before the GATT controller takes events"
        );
        GattController {
            led,
            states: CharacteristicIdentity::ALL.map(CharacteristicState::new),
            connections: ConnectionTracker::new(),
            notify_policy,
        }
    }

    pub fn on_write(&mut self, identity: CharacteristicIdentity, payload: &[u8]) -> WriteOutcome {
        let Some(result) = interpret(identity, payload) else {
            if let LedCommand::Unrecognized(raw) = LedCommand::parse(payload) {
                log::warn!(
                    "Received unexpected value on {identity:?}: {:?} {raw:02x?}",
                    String::from_utf8_lossy(&raw)
                );
            }
            return WriteOutcome::Ignored;
        };

        self.led.set_color(result.color);
        log::info!("{identity:?} -> LED {}: {}", result.color, result.response);

        let notify_policy = self.notify_policy;
        let state = self.state_mut(identity);
        state.set_value(result.response);

        let notification = if state.notifications_enabled() && notify_policy == NotifyPolicy::OnWrite
        {
            Some(Notification {
                identity,
                value: state.current_value().to_string(),
            })
        } else {
            None
        };
        WriteOutcome::Applied { notification }
    }

    pub fn on_subscribe(&mut self, identity: CharacteristicIdentity, enabled: bool) {
        let state = self.state_mut(identity);
        if state.notifications_enabled() != enabled {
            log::info!(
                "Notifications {} on {identity:?}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        state.set_notifications(enabled);
    }

    pub fn on_read(&self, identity: CharacteristicIdentity) -> &str {
        self.state(identity).current_value()
    }

    pub fn on_connect(&mut self, client: &str) {
        self.connections.on_connect(client);
    }

    pub fn on_disconnect(&mut self, client: &str) {
        self.connections.on_disconnect(client);
    }

    pub fn state(&self, identity: CharacteristicIdentity) -> &CharacteristicState {
        &self.states[identity.index()]
    }

    pub fn connections(&self) -> &ConnectionTracker {
        &self.connections
    }

    pub fn led(&self) -> &L {
        &self.led
    }

    fn state_mut(&mut self, identity: CharacteristicIdentity) -> &mut CharacteristicState {
        &mut self.states[identity.index()]
    }
}

use uuid::Uuid;

pub const SERVICE_UUID: Uuid = Uuid::from_u128(0xabcd1234_1234_1234_1234_1234567890aa);
pub const OPEN_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0xabcd1234_1234_1234_1234_1234567890ab);
pub const ENCRYPTED_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xabcd1234_1234_1234_1234_1234567890ac);

pub const GREEN_ON: &str = "Green LED on";
pub const RED_ON: &str = "Red LED on";
pub const LED_OFF: &str = "LED off";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicIdentity {
    Open,
    Encrypted,
}

impl CharacteristicIdentity {
    pub const ALL: [CharacteristicIdentity; 2] =
        [CharacteristicIdentity::Open, CharacteristicIdentity::Encrypted];

    pub fn uuid(&self) -> Uuid {
        match self {
            CharacteristicIdentity::Open => OPEN_CHARACTERISTIC_UUID,
            CharacteristicIdentity::Encrypted => ENCRYPTED_CHARACTERISTIC_UUID,
        }
    }

    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        CharacteristicIdentity::ALL
            .into_iter()
            .find(|identity| identity.uuid() == *uuid)
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            CharacteristicIdentity::Open => 0,
            CharacteristicIdentity::Encrypted => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicState {
    identity: CharacteristicIdentity,
    current_value: String,
    notifications_enabled: bool,
}

impl CharacteristicState {
    pub fn new(identity: CharacteristicIdentity) -> Self {
        CharacteristicState {
            identity,
            current_value: LED_OFF.to_string(),
            notifications_enabled: false,
        }
    }

    pub fn identity(&self) -> CharacteristicIdentity {
        self.identity
    }

    pub fn current_value(&self) -> &str {
        &self.current_value
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    pub(crate) fn set_value(&mut self, value: &str) {
        if self.current_value != value {
            self.current_value.clear();
            self.current_value.push_str(value);
        }
    }

    pub(crate) fn set_notifications(&mut self, enabled: bool) {
        self.notifications_enabled = enabled;
    }
}

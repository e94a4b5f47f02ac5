use crate::uuid::{ShortUuid, CLIENT_CHARACTERISTIC_CONFIGURATION};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub uuid: Uuid,
}

impl Descriptor {
    /// The 0x2902 descriptor a client writes to turn notifications on (0x01) or off (0x00).
    pub fn client_configuration() -> Self {
        Descriptor {
            uuid: Uuid::from_short(CLIENT_CHARACTERISTIC_CONFIGURATION),
        }
    }

    pub fn is_client_configuration(&self) -> bool {
        self.uuid.to_short() == Some(CLIENT_CHARACTERISTIC_CONFIGURATION)
    }
}

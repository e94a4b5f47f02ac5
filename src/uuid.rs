use uuid::Uuid;

const BLUETOOTH_BASE_TAIL: &[u8; 8] = b"\x80\x00\x00\x80\x5F\x9B\x34\xFB";

pub const CLIENT_CHARACTERISTIC_CONFIGURATION: u16 = 0x2902;

pub trait ShortUuid {
    fn from_short(uuid: u16) -> Uuid;

    /// Returns the 16-bit alias if this UUID lives on the Bluetooth base UUID.
    fn to_short(&self) -> Option<u16>;
}

impl ShortUuid for Uuid {
    fn from_short(uuid: u16) -> Uuid {
        Uuid::from_fields(uuid.into(), 0, 0x1000, BLUETOOTH_BASE_TAIL)
    }

    fn to_short(&self) -> Option<u16> {
        let (d1, d2, d3, d4) = self.as_fields();
        if d2 != 0 || d3 != 0x1000 || d4 != BLUETOOTH_BASE_TAIL {
            return None;
        }
        u16::try_from(d1).ok()
    }
}

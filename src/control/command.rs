use super::state::{CharacteristicIdentity, GREEN_ON, LED_OFF, RED_ON};
use crate::led::LedColor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedCommand {
    On,
    Off,
    Unrecognized(Vec<u8>),
}

impl LedCommand {
    /// Exact, case-sensitive match; no trimming.
    pub fn parse(payload: &[u8]) -> Self {
        match payload {
            b"ON" => LedCommand::On,
            b"OFF" => LedCommand::Off,
            other => LedCommand::Unrecognized(other.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpretation {
    pub color: LedColor,
    pub response: &'static str,
}

/// `None` means the payload was not a command: no colour change and no response.
pub fn interpret(identity: CharacteristicIdentity, payload: &[u8]) -> Option<Interpretation> {
    let (color, response) = match (LedCommand::parse(payload), identity) {
        (LedCommand::On, CharacteristicIdentity::Open) => (LedColor::Green, GREEN_ON),
        (LedCommand::On, CharacteristicIdentity::Encrypted) => (LedColor::Red, RED_ON),
        (LedCommand::Off, _) => (LedColor::Off, LED_OFF),
        (LedCommand::Unrecognized(_), _) => return None,
    };
    Some(Interpretation { color, response })
}

#[cfg(target_os = "linux")]
mod bluez;
#[cfg(target_os = "linux")]
pub use self::bluez::Peripheral;

use crate::{bootstrap::SecurityPolicy, error::Error, gatt::service::Service};
use async_trait::async_trait;
use uuid::Uuid;

/// What the tester needs from a BLE stack. Backends forward client requests
/// as [`PeripheralEvent`](crate::gatt::peripheral_event::PeripheralEvent)s on
/// the channel they were created with.
#[async_trait]
pub trait PeripheralImpl: Send + Sync {
    async fn is_powered(&mut self) -> Result<bool, Error>;

    async fn is_advertising(&mut self) -> Result<bool, Error>;

    /// Installs the pairing agent that answers security requests for
    /// access-restricted characteristics.
    async fn register_agent(&mut self, policy: &SecurityPolicy) -> Result<(), Error>;

    async fn start_advertising(&mut self, name: &str, uuids: &[Uuid]) -> Result<(), Error>;

    async fn stop_advertising(&mut self) -> Result<(), Error>;

    async fn add_service(&mut self, service: &Service) -> Result<(), Error>;

    async fn update_characteristic(
        &mut self,
        characteristic: Uuid,
        value: Vec<u8>,
    ) -> Result<(), Error>;
}

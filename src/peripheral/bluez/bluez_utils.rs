use crate::error::{self, Error, ErrorType};
use crate::gatt::peripheral_event::PeripheralEvent;
use bluer::gatt::local::CharacteristicControl;
use bluer::{Adapter, Address, DeviceEvent, DeviceProperty};
use futures::StreamExt;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

#[derive(Debug)]
pub(crate) struct CharNotifyHandler {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub requires_pairing: bool,
    pub control: CharacteristicControl,
}

impl From<bluer::Error> for error::Error {
    fn from(error: bluer::Error) -> Self {
        let error_type = match error.kind {
            bluer::ErrorKind::NotAuthorized | bluer::ErrorKind::NotPermitted => {
                ErrorType::PermissionDenied
            }
            _ => ErrorType::Bluez,
        };
        Error::from_string(error.to_string(), error_type)
    }
}

/// Reports the connected state of one remote device until BlueZ drops it.
pub(crate) async fn watch_device(
    adapter: Adapter,
    address: Address,
    sender_tx: Sender<PeripheralEvent>,
) -> Result<(), Error> {
    let device = adapter.device(address)?;
    let client = address.to_string();
    let mut events = device.events().await?;

    if device.is_connected().await? {
        send_connection(&sender_tx, &client, true).await;
    }

    while let Some(DeviceEvent::PropertyChanged(property)) = events.next().await {
        if let DeviceProperty::Connected(connected) = property {
            send_connection(&sender_tx, &client, connected).await;
        }
    }
    Ok(())
}

/// BlueZ has no encryption flag for notify sessions, so a gated session is
/// only admitted once the client has paired with the adapter.
pub(crate) async fn admit_session(
    adapter: &Adapter,
    address: Address,
    requires_pairing: bool,
) -> Result<bool, Error> {
    if !requires_pairing {
        return Ok(true);
    }
    Ok(adapter.device(address)?.is_paired().await?)
}

async fn send_connection(sender_tx: &Sender<PeripheralEvent>, client: &str, connected: bool) {
    if let Err(err) = sender_tx
        .send(PeripheralEvent::ConnectionUpdate {
            client: client.to_string(),
            connected,
        })
        .await
    {
        log::error!("Error sending connection update event: {:?}", err);
    }
}

//! One-time bring-up: the service table, the pairing policy and advertising.

use crate::{
    control::state::{ENCRYPTED_CHARACTERISTIC_UUID, OPEN_CHARACTERISTIC_UUID, SERVICE_UUID},
    error::Error,
    gatt::{
        characteristic::Characteristic,
        descriptor::Descriptor,
        properties::{AttributePermission, CharacteristicProperty},
        service::Service,
    },
    peripheral::PeripheralImpl,
};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_DEVICE_NAME: &str = "ESP32_BLE_TESTER";

const POWER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Pairing requirements for the encrypted characteristic. Pairing is always
/// Just Works: the tester has no display and no keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub secure_connections_only: bool,
    pub bonding: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        SecurityPolicy {
            secure_connections_only: true,
            bonding: false,
        }
    }
}

fn control_characteristic(
    uuid: Uuid,
    notify: CharacteristicProperty,
    permissions: Vec<AttributePermission>,
) -> Characteristic {
    Characteristic {
        uuid,
        properties: vec![
            CharacteristicProperty::Read,
            CharacteristicProperty::Write,
            notify,
        ],
        permissions,
        descriptors: vec![Descriptor::client_configuration()],
    }
}

pub fn tester_service() -> Service {
    Service {
        uuid: SERVICE_UUID,
        primary: true,
        characteristics: vec![
            control_characteristic(
                OPEN_CHARACTERISTIC_UUID,
                CharacteristicProperty::Notify,
                vec![
                    AttributePermission::Readable,
                    AttributePermission::Writeable,
                ],
            ),
            control_characteristic(
                ENCRYPTED_CHARACTERISTIC_UUID,
                CharacteristicProperty::NotifyEncryptionRequired,
                vec![
                    AttributePermission::ReadEncryptionRequired,
                    AttributePermission::WriteEncryptionRequired,
                ],
            ),
        ],
    }
}

pub async fn wait_until_powered<P: PeripheralImpl>(peripheral: &mut P) -> Result<(), Error> {
    let mut reported = false;
    while !peripheral.is_powered().await? {
        if !reported {
            log::info!("Waiting for the Bluetooth adapter to power on");
            reported = true;
        }
        tokio::time::sleep(POWER_POLL_INTERVAL).await;
    }
    Ok(())
}

pub async fn bootstrap<P: PeripheralImpl>(
    peripheral: &mut P,
    name: &str,
    policy: &SecurityPolicy,
) -> Result<Service, Error> {
    wait_until_powered(peripheral).await?;

    peripheral.register_agent(policy).await?;

    let service = tester_service();
    peripheral.add_service(&service).await?;
    log::info!("Service Added");

    peripheral.start_advertising(name, &[service.uuid]).await?;
    log::info!("BLE advertising started as {name}");
    Ok(service)
}

use super::bluez_utils::CharNotifyHandler;
use crate::gatt::peripheral_event::{
    PeripheralEvent, PeripheralRequest, ReadRequestResponse, RequestResponse, WriteRequestResponse,
};
use crate::gatt::properties::{AttributePermission, CharacteristicProperty};
use crate::gatt::{characteristic, service};
use bluer::gatt::local::{
    characteristic_control, service_control, Characteristic, CharacteristicControl,
    CharacteristicControlHandle, CharacteristicNotify, CharacteristicNotifyMethod,
    CharacteristicRead, CharacteristicReadRequest, CharacteristicWrite, CharacteristicWriteMethod,
    CharacteristicWriteRequest, ReqError, Service,
};
use futures::FutureExt;
use tokio::sync::mpsc::Sender;
use tokio::sync::oneshot;
use uuid::Uuid;

pub fn parse_services(
    gatt_services: &[service::Service],
    sender_tx: &Sender<PeripheralEvent>,
) -> (Vec<CharNotifyHandler>, Vec<Service>) {
    let mut services: Vec<Service> = vec![];
    let mut char_notify_handlers: Vec<CharNotifyHandler> = vec![];

    for service in gatt_services {
        let (_, service_handle) = service_control();
        let mut characteristics: Vec<Characteristic> = Vec::new();

        for char in &service.characteristics {
            let (parsed, control) = parse_characteristic(char, service.uuid, sender_tx);
            if let Some(control) = control {
                char_notify_handlers.push(CharNotifyHandler {
                    service_uuid: service.uuid,
                    characteristic_uuid: char.uuid,
                    requires_pairing: char.notify_requires_encryption(),
                    control,
                });
            }
            characteristics.push(parsed);
        }

        services.push(Service {
            uuid: service.uuid,
            primary: service.primary,
            characteristics,
            control_handle: service_handle,
            ..Default::default()
        });
    }
    (char_notify_handlers, services)
}

// BlueZ owns the client configuration descriptor and reports subscriptions as
// notify sessions, so descriptors are not registered here.
fn parse_characteristic(
    characteristic: &characteristic::Characteristic,
    service_uuid: Uuid,
    sender_tx: &Sender<PeripheralEvent>,
) -> (Characteristic, Option<CharacteristicControl>) {
    for descriptor in &characteristic.descriptors {
        if !descriptor.is_client_configuration() {
            log::warn!(
                "Descriptor {} on {} is not served by BlueZ backend",
                descriptor.uuid,
                characteristic.uuid
            );
        }
    }

    let notify = get_characteristic_notify(characteristic);
    let (control, control_handle) = match notify {
        Some(_) => {
            let (ctrl, handle) = characteristic_control();
            (Some(ctrl), handle)
        }
        None => (None, CharacteristicControlHandle::default()),
    };

    let char = Characteristic {
        uuid: characteristic.uuid,
        read: get_characteristic_read(characteristic, service_uuid, sender_tx.clone()),
        write: get_characteristic_write(characteristic, service_uuid, sender_tx.clone()),
        notify,
        broadcast: characteristic.has_property(CharacteristicProperty::Broadcast),
        control_handle,
        ..Default::default()
    };
    (char, control)
}

fn get_characteristic_read(
    characteristic: &characteristic::Characteristic,
    service_uuid: Uuid,
    sender_tx: Sender<PeripheralEvent>,
) -> Option<CharacteristicRead> {
    if !characteristic.has_property(CharacteristicProperty::Read) {
        return None;
    }

    let characteristic_uuid = characteristic.uuid;
    Some(CharacteristicRead {
        read: true,
        // Just Works links are encrypted but unauthenticated, so only the
        // plain encryption flag is usable here.
        encrypt_read: characteristic.has_permission(AttributePermission::ReadEncryptionRequired),
        fun: Box::new(move |request: CharacteristicReadRequest| {
            let sender_tx = sender_tx.clone();
            async move {
                on_read_request(sender_tx, request, service_uuid, characteristic_uuid).await
            }
            .boxed()
        }),
        ..Default::default()
    })
}

fn get_characteristic_write(
    characteristic: &characteristic::Characteristic,
    service_uuid: Uuid,
    sender_tx: Sender<PeripheralEvent>,
) -> Option<CharacteristicWrite> {
    let is_write = characteristic.has_property(CharacteristicProperty::Write);
    let is_write_without_response =
        characteristic.has_property(CharacteristicProperty::WriteWithoutResponse);
    let is_authenticated_signed_write =
        characteristic.has_property(CharacteristicProperty::AuthenticatedSignedWrites);

    if !is_write && !is_write_without_response && !is_authenticated_signed_write {
        return None;
    }

    let characteristic_uuid = characteristic.uuid;
    Some(CharacteristicWrite {
        write: is_write,
        write_without_response: is_write_without_response,
        authenticated_signed_writes: is_authenticated_signed_write,
        encrypt_write: characteristic.has_permission(AttributePermission::WriteEncryptionRequired),
        method: CharacteristicWriteMethod::Fun(Box::new(
            move |value: Vec<u8>, request: CharacteristicWriteRequest| {
                let sender_tx = sender_tx.clone();
                async move {
                    on_write_request(sender_tx, request, service_uuid, characteristic_uuid, value)
                        .await
                }
                .boxed()
            },
        )),
        ..Default::default()
    })
}

fn get_characteristic_notify(
    characteristic: &characteristic::Characteristic,
) -> Option<CharacteristicNotify> {
    if !characteristic.can_notify() {
        return None;
    }

    let notify = characteristic.has_property(CharacteristicProperty::Notify)
        || characteristic.has_property(CharacteristicProperty::NotifyEncryptionRequired);
    let indicate = characteristic.has_property(CharacteristicProperty::Indicate)
        || characteristic.has_property(CharacteristicProperty::IndicateEncryptionRequired);

    Some(CharacteristicNotify {
        notify,
        indicate,
        method: CharacteristicNotifyMethod::Io,
        ..Default::default()
    })
}

async fn on_read_request(
    sender_tx: Sender<PeripheralEvent>,
    request: CharacteristicReadRequest,
    service_uuid: Uuid,
    characteristic: Uuid,
) -> Result<Vec<u8>, ReqError> {
    let (res_tx, res_rx) = oneshot::channel::<ReadRequestResponse>();
    if let Err(err) = sender_tx
        .send(PeripheralEvent::ReadRequest {
            request: PeripheralRequest {
                client: request.device_address.to_string(),
                service: service_uuid,
                characteristic,
            },
            offset: request.offset as u64,
            responder: res_tx,
        })
        .await
    {
        log::error!("Error sending read request event: {:?}", err);
        return Err(ReqError::Failed);
    }

    match res_rx.await {
        Ok(res) => match res.response.to_req_err() {
            Some(err) => Err(err),
            None => Ok(res.value),
        },
        Err(_) => Err(ReqError::Failed),
    }
}

async fn on_write_request(
    sender_tx: Sender<PeripheralEvent>,
    request: CharacteristicWriteRequest,
    service_uuid: Uuid,
    characteristic: Uuid,
    value: Vec<u8>,
) -> Result<(), ReqError> {
    let (res_tx, res_rx) = oneshot::channel::<WriteRequestResponse>();
    if let Err(err) = sender_tx
        .send(PeripheralEvent::WriteRequest {
            request: PeripheralRequest {
                client: request.device_address.to_string(),
                service: service_uuid,
                characteristic,
            },
            offset: request.offset as u64,
            value,
            responder: res_tx,
        })
        .await
    {
        log::error!("Error sending write request event: {:?}", err);
        return Err(ReqError::Failed);
    }

    match res_rx.await {
        Ok(res) => match res.response.to_req_err() {
            Some(err) => Err(err),
            None => Ok(()),
        },
        Err(_) => Err(ReqError::Failed),
    }
}

impl RequestResponse {
    fn to_req_err(self) -> Option<ReqError> {
        match self {
            RequestResponse::Success => None,
            RequestResponse::InvalidHandle => Some(ReqError::Failed),
            RequestResponse::InvalidOffset => Some(ReqError::InvalidOffset),
        }
    }
}

//! The BLE event context: every peripheral event is applied to the
//! controller here, one at a time, under a single lock.

use crate::{
    control::{
        state::SERVICE_UUID, CharacteristicIdentity, GattController, Notification, WriteOutcome,
    },
    error::Error,
    gatt::peripheral_event::{
        PeripheralEvent, PeripheralRequest, ReadRequestResponse, RequestResponse,
        WriteRequestResponse,
    },
    led::LedDriver,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::Receiver;
use uuid::Uuid;

/// Pushes a characteristic value to subscribed clients.
#[async_trait]
pub trait NotificationSink: Send {
    async fn notify(&mut self, characteristic: Uuid, value: Vec<u8>) -> Result<(), Error>;
}

pub struct Harness<L: LedDriver> {
    controller: Arc<Mutex<GattController<L>>>,
}

impl<L: LedDriver> Clone for Harness<L> {
    fn clone(&self) -> Self {
        Harness {
            controller: self.controller.clone(),
        }
    }
}

impl<L: LedDriver> Harness<L> {
    pub fn new(controller: GattController<L>) -> Self {
        Harness {
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    /// Runs until the event channel closes or the controller lock is poisoned.
    pub async fn run<S: NotificationSink>(
        &self,
        mut receiver_rx: Receiver<PeripheralEvent>,
        sink: &mut S,
    ) -> Result<(), Error> {
        while let Some(event) = receiver_rx.recv().await {
            self.handle_event(event, sink).await?;
        }
        log::debug!("Peripheral event channel closed");
        Ok(())
    }

    pub async fn handle_event<S: NotificationSink>(
        &self,
        event: PeripheralEvent,
        sink: &mut S,
    ) -> Result<(), Error> {
        match event {
            PeripheralEvent::StateUpdate { is_powered } => {
                log::info!("PowerOn: {is_powered:?}")
            }
            PeripheralEvent::ConnectionUpdate { client, connected } => {
                let mut controller = self.lock()?;
                if connected {
                    controller.on_connect(&client);
                } else {
                    controller.on_disconnect(&client);
                }
            }
            PeripheralEvent::CharacteristicSubscriptionUpdate {
                request,
                subscribed,
            } => match resolve(&request) {
                Some(identity) => {
                    self.lock()?.on_subscribe(identity, subscribed);
                }
                None => log::debug!("Subscription on unknown characteristic {request:?}"),
            },
            PeripheralEvent::ReadRequest {
                request,
                offset,
                responder,
            } => {
                let response = self.read(&request, offset)?;
                if responder.send(response).is_err() {
                    log::warn!("Read requester went away: {request:?}");
                }
            }
            PeripheralEvent::WriteRequest {
                request,
                value,
                offset,
                responder,
            } => {
                let (response, notification) = self.write(&request, &value, offset)?;
                if responder.send(WriteRequestResponse { response }).is_err() {
                    log::warn!("Write requester went away: {request:?}");
                }
                if let Some(notification) = notification {
                    self.push(notification, sink).await;
                }
            }
        }
        Ok(())
    }

    pub fn controller(&self) -> Arc<Mutex<GattController<L>>> {
        self.controller.clone()
    }

    fn read(&self, request: &PeripheralRequest, offset: u64) -> Result<ReadRequestResponse, Error> {
        let Some(identity) = resolve(request) else {
            log::warn!(
                "Read on unknown characteristic {}/{}",
                request.service,
                request.characteristic
            );
            return Ok(ReadRequestResponse::failure(RequestResponse::InvalidHandle));
        };
        let controller = self.lock()?;
        let value = controller.on_read(identity).as_bytes();
        let response = match usize::try_from(offset) {
            Ok(offset) if offset <= value.len() => {
                ReadRequestResponse::success(value[offset..].to_vec())
            }
            _ => ReadRequestResponse::failure(RequestResponse::InvalidOffset),
        };
        Ok(response)
    }

    fn write(
        &self,
        request: &PeripheralRequest,
        value: &[u8],
        offset: u64,
    ) -> Result<(RequestResponse, Option<Notification>), Error> {
        let Some(identity) = resolve(request) else {
            log::warn!(
                "Write on unknown characteristic {}/{}",
                request.service,
                request.characteristic
            );
            return Ok((RequestResponse::InvalidHandle, None));
        };
        if offset != 0 {
            log::warn!("Offset write ({offset}) on {identity:?} is not supported");
            return Ok((RequestResponse::InvalidOffset, None));
        }
        let outcome = self.lock()?.on_write(identity, value);
        let notification = match outcome {
            WriteOutcome::Applied { notification } => notification,
            WriteOutcome::Ignored => None,
        };
        Ok((RequestResponse::Success, notification))
    }

    async fn push<S: NotificationSink>(&self, notification: Notification, sink: &mut S) {
        let characteristic = notification.identity.uuid();
        log::debug!("Notifying {:?}: {}", notification.identity, notification.value);
        if let Err(err) = sink
            .notify(characteristic, notification.value.into_bytes())
            .await
        {
            log::error!("Error sending notification on {characteristic}: {err}");
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, GattController<L>>, Error> {
        Ok(self.controller.lock()?)
    }
}

fn resolve(request: &PeripheralRequest) -> Option<CharacteristicIdentity> {
    if request.service != SERVICE_UUID {
        return None;
    }
    CharacteristicIdentity::from_uuid(&request.characteristic)
}

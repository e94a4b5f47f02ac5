mod bluez_utils;
mod characteristic_utils;

use crate::{
    bootstrap::SecurityPolicy,
    error::{Error, ErrorType},
    gatt::{
        peripheral_event::{PeripheralEvent, PeripheralRequest},
        service,
    },
    harness::NotificationSink,
};
use async_trait::async_trait;
use bluer::{
    adv::{Advertisement, AdvertisementHandle},
    agent::{Agent, AgentHandle, AuthorizeService, ReqError, RequestAuthorization},
    gatt::{
        local::{Application, ApplicationHandle, CharacteristicControlEvent},
        CharacteristicWriter,
    },
    Adapter, AdapterEvent, AdapterProperty, Address, Session,
};
use bluez_utils::{admit_session, watch_device, CharNotifyHandler};
use characteristic_utils::parse_services;
use futures::{FutureExt, StreamExt};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex},
};
use tokio::sync::{mpsc::Sender, watch};
use uuid::Uuid;

use super::PeripheralImpl;

pub struct Peripheral {
    session: Session,
    pub adapter: Adapter,
    services: Vec<service::Service>,
    adv_handle: Option<AdvertisementHandle>,
    app_handle: Option<ApplicationHandle>,
    agent_handle: Option<AgentHandle>,
    sender_tx: Sender<PeripheralEvent>,
    writers: Arc<Mutex<HashMap<Uuid, Arc<CharacteristicWriter>>>>,
    drop_tx: watch::Sender<()>,
}

impl Peripheral {
    pub async fn new(sender_tx: Sender<PeripheralEvent>) -> Result<Self, Error> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;
        log::debug!(
            "Initialize Bluetooth adapter {} with address {}",
            adapter.name(),
            adapter.address().await?
        );

        let (drop_tx, _) = watch::channel(());
        let peripheral = Peripheral {
            session,
            adapter,
            services: Vec::new(),
            adv_handle: None,
            app_handle: None,
            agent_handle: None,
            sender_tx,
            writers: Arc::new(Mutex::new(HashMap::new())),
            drop_tx,
        };

        for address in peripheral.adapter.device_addresses().await? {
            peripheral.spawn_device_watch(address);
        }
        peripheral.spawn_adapter_watch().await;
        Ok(peripheral)
    }

    // Power changes and new remote devices
    async fn spawn_adapter_watch(&self) {
        let mut adapter_stream = match self.adapter.events().await {
            Ok(stream) => stream,
            Err(err) => {
                log::error!("Adapter events unavailable, connections will not be tracked: {err}");
                return;
            }
        };
        let sender = self.sender_tx.clone();
        let adapter = self.adapter.clone();
        let mut drop_rx = self.drop_tx.subscribe();
        let drop_tx = self.drop_tx.clone();

        tokio::spawn(async move {
            let stream_future = async {
                while let Some(event) = adapter_stream.next().await {
                    match event {
                        AdapterEvent::PropertyChanged(AdapterProperty::Powered(powered)) => {
                            if let Err(err) = sender
                                .send(PeripheralEvent::StateUpdate {
                                    is_powered: powered,
                                })
                                .await
                            {
                                log::error!("Error sending state update event: {:?}", err);
                            }
                        }
                        AdapterEvent::PropertyChanged(
                            AdapterProperty::ActiveAdvertisingInstances(i),
                        ) => {
                            log::debug!("ActiveAdvertisingInstances: {i}")
                        }
                        AdapterEvent::DeviceAdded(address) => {
                            spawn_device_watch(&adapter, address, &sender, &drop_tx);
                        }
                        _ => {}
                    }
                }
            };
            tokio::select! {
                _ = stream_future => {},
                _ = drop_rx.changed() => {}
            }
        });
    }

    fn spawn_device_watch(&self, address: Address) {
        spawn_device_watch(&self.adapter, address, &self.sender_tx, &self.drop_tx);
    }

    // Characteristic subscriptions, one notify session at a time per characteristic
    fn setup_char_handlers(&mut self, handlers: Vec<CharNotifyHandler>) {
        for mut handler in handlers {
            let sender_tx = self.sender_tx.clone();
            let writers = self.writers.clone();
            let adapter = self.adapter.clone();
            let mut drop_rx = self.drop_tx.subscribe();

            tokio::spawn(async move {
                let sessions = async {
                    while let Some(CharacteristicControlEvent::Notify(writer)) =
                        handler.control.next().await
                    {
                        let address = writer.device_address();
                        match admit_session(&adapter, address, handler.requires_pairing).await {
                            Ok(true) => {}
                            Ok(false) => {
                                log::warn!(
                                    "Refusing notify session on {} from unpaired {address}",
                                    handler.characteristic_uuid
                                );
                                continue;
                            }
                            Err(err) => {
                                log::warn!("Cannot check pairing of {address}: {err}");
                                continue;
                            }
                        }

                        let writer = Arc::new(writer);
                        let request = PeripheralRequest {
                            client: address.to_string(),
                            service: handler.service_uuid,
                            characteristic: handler.characteristic_uuid,
                        };

                        if let Ok(mut writers_lock) = writers.lock() {
                            writers_lock.insert(handler.characteristic_uuid, writer.clone());
                        } else {
                            log::error!("Failed to lock writers for adding a writer");
                        }
                        send_subscription(&sender_tx, request.clone(), true).await;

                        if let Err(err) = writer.closed().await {
                            log::error!("NotifyClosedErr {err:?}");
                        }

                        if let Ok(mut writers_lock) = writers.lock() {
                            writers_lock.remove(&handler.characteristic_uuid);
                        } else {
                            log::error!("Failed to lock writers for removing a writer");
                        }
                        send_subscription(&sender_tx, request, false).await;
                    }
                };
                tokio::select! {
                    _ = sessions => {},
                    _ = drop_rx.changed() => {}
                }
            });
        }
    }
}

#[async_trait]
impl PeripheralImpl for Peripheral {
    async fn is_powered(&mut self) -> Result<bool, Error> {
        Ok(self.adapter.is_powered().await?)
    }

    async fn is_advertising(&mut self) -> Result<bool, Error> {
        let result = self.adapter.active_advertising_instances().await?;
        Ok(result > 0 && self.adv_handle.is_some())
    }

    async fn register_agent(&mut self, policy: &SecurityPolicy) -> Result<(), Error> {
        // No input or output handlers: BlueZ registers the agent as
        // NoInputNoOutput, which leaves Just Works as the only method.
        let agent = Agent {
            request_default: true,
            request_authorization: Some(Box::new(|req: RequestAuthorization| {
                async move {
                    log::info!("Accepting Just Works pairing from {}", req.device);
                    Ok::<(), ReqError>(())
                }
                .boxed()
            })),
            authorize_service: Some(Box::new(|req: AuthorizeService| {
                async move {
                    log::debug!("Authorizing service {} for {}", req.service, req.device);
                    Ok::<(), ReqError>(())
                }
                .boxed()
            })),
            ..Default::default()
        };
        self.agent_handle = Some(self.session.register_agent(agent).await?);
        self.adapter.set_pairable(true).await?;

        if policy.secure_connections_only {
            log::info!("Pairing requires LE Secure Connections (SecureConnections=only in main.conf)");
        }
        if !policy.bonding {
            log::info!("Bonding keys are not relied upon; clients should expect to re-pair");
        }
        Ok(())
    }

    async fn start_advertising(&mut self, name: &str, uuids: &[Uuid]) -> Result<(), Error> {
        self.adapter.set_alias(name.to_string()).await?;

        let services: BTreeSet<Uuid> = uuids.iter().copied().collect();
        let le_advertisement = Advertisement {
            service_uuids: services,
            manufacturer_data: BTreeMap::new(),
            discoverable: Some(true),
            local_name: Some(name.to_string()),
            ..Default::default()
        };
        let adv_handle: AdvertisementHandle = self.adapter.advertise(le_advertisement).await?;

        let (handlers, services) = parse_services(&self.services, &self.sender_tx);
        let app_handle = self
            .adapter
            .serve_gatt_application(Application {
                services,
                ..Default::default()
            })
            .await?;

        self.setup_char_handlers(handlers);

        self.adv_handle = Some(adv_handle);
        self.app_handle = Some(app_handle);
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<(), Error> {
        self.adv_handle = None;
        self.app_handle = None;
        Ok(())
    }

    async fn add_service(&mut self, service: &service::Service) -> Result<(), Error> {
        if self.app_handle.is_some() {
            return Err(Error::new(
                "add_service",
                "services must be added before advertising starts",
                ErrorType::Unsupported,
            ));
        }
        self.services.push(service.clone());
        Ok(())
    }

    async fn update_characteristic(
        &mut self,
        characteristic: Uuid,
        value: Vec<u8>,
    ) -> Result<(), Error> {
        let writer = self.writers.lock()?.get(&characteristic).cloned();
        let Some(writer) = writer else {
            log::debug!("No subscriber on {characteristic}, dropping update");
            return Ok(());
        };
        tokio::spawn(async move {
            if let Err(err) = writer.send(&value).await {
                log::error!("Error sending value {err:?}")
            }
        });
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for Peripheral {
    async fn notify(&mut self, characteristic: Uuid, value: Vec<u8>) -> Result<(), Error> {
        self.update_characteristic(characteristic, value).await
    }
}

impl Drop for Peripheral {
    fn drop(&mut self) {
        // background watchers hold clones of the adapter; stop them before the session goes
        self.drop_tx.send_replace(());
        self.agent_handle = None;
    }
}

fn spawn_device_watch(
    adapter: &Adapter,
    address: Address,
    sender_tx: &Sender<PeripheralEvent>,
    drop_tx: &watch::Sender<()>,
) {
    let adapter = adapter.clone();
    let sender_tx = sender_tx.clone();
    let mut drop_rx = drop_tx.subscribe();
    tokio::spawn(async move {
        tokio::select! {
            result = watch_device(adapter, address, sender_tx) => {
                if let Err(err) = result {
                    log::debug!("Stopped watching {address}: {err}");
                }
            },
            _ = drop_rx.changed() => {}
        }
    });
}

async fn send_subscription(
    sender_tx: &Sender<PeripheralEvent>,
    request: PeripheralRequest,
    subscribed: bool,
) {
    if let Err(err) = sender_tx
        .send(PeripheralEvent::CharacteristicSubscriptionUpdate {
            request,
            subscribed,
        })
        .await
    {
        log::error!("Error sending subscription event: {:?}", err);
    }
}

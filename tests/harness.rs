use async_trait::async_trait;
use ble_led_tester::{
    control::{
        state::{
            ENCRYPTED_CHARACTERISTIC_UUID, GREEN_ON, LED_OFF, OPEN_CHARACTERISTIC_UUID, RED_ON,
            SERVICE_UUID,
        },
        CharacteristicIdentity, GattController, NotifyPolicy,
    },
    error::Error,
    gatt::peripheral_event::{
        PeripheralEvent, PeripheralRequest, ReadRequestResponse, RequestResponse,
        WriteRequestResponse,
    },
    harness::{Harness, NotificationSink},
    led::{ConsolePixel, LedColor, LedDriver},
};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

const CLIENT: &str = "11:22:33:44:55:66";

#[derive(Default)]
struct RecordingSink {
    sent: Vec<(Uuid, Vec<u8>)>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&mut self, characteristic: Uuid, value: Vec<u8>) -> Result<(), Error> {
        self.sent.push((characteristic, value));
        Ok(())
    }
}

fn harness(policy: NotifyPolicy) -> Harness<ConsolePixel> {
    let mut pixel = ConsolePixel::new();
    pixel.init();
    Harness::new(GattController::new(pixel, policy))
}

fn request(characteristic: Uuid) -> PeripheralRequest {
    request_on(SERVICE_UUID, characteristic)
}

fn request_on(service: Uuid, characteristic: Uuid) -> PeripheralRequest {
    PeripheralRequest {
        client: CLIENT.to_string(),
        service,
        characteristic,
    }
}

async fn write(
    harness: &Harness<ConsolePixel>,
    sink: &mut RecordingSink,
    characteristic: Uuid,
    value: &[u8],
    offset: u64,
) -> RequestResponse {
    let (responder, response_rx) = oneshot::channel::<WriteRequestResponse>();
    harness
        .handle_event(
            PeripheralEvent::WriteRequest {
                request: request(characteristic),
                value: value.to_vec(),
                offset,
                responder,
            },
            sink,
        )
        .await
        .unwrap();
    response_rx.await.unwrap().response
}

async fn read(
    harness: &Harness<ConsolePixel>,
    sink: &mut RecordingSink,
    characteristic: Uuid,
    offset: u64,
) -> ReadRequestResponse {
    let (responder, response_rx) = oneshot::channel::<ReadRequestResponse>();
    harness
        .handle_event(
            PeripheralEvent::ReadRequest {
                request: request(characteristic),
                offset,
                responder,
            },
            sink,
        )
        .await
        .unwrap();
    response_rx.await.unwrap()
}

async fn subscribe(
    harness: &Harness<ConsolePixel>,
    sink: &mut RecordingSink,
    characteristic: Uuid,
    subscribed: bool,
) {
    harness
        .handle_event(
            PeripheralEvent::CharacteristicSubscriptionUpdate {
                request: request(characteristic),
                subscribed,
            },
            sink,
        )
        .await
        .unwrap();
}

fn led_color(harness: &Harness<ConsolePixel>) -> LedColor {
    harness.controller().lock().unwrap().led().color()
}

#[tokio::test]
async fn writes_drive_the_pixel_and_the_read_values() {
    let harness = harness(NotifyPolicy::OnWrite);
    let mut sink = RecordingSink::default();

    assert_eq!(
        write(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, b"ON", 0).await,
        RequestResponse::Success
    );
    assert_eq!(led_color(&harness), LedColor::Green);
    assert_eq!(
        read(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, 0).await.value,
        b"Green LED on"
    );

    write(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, b"ON", 0).await;
    assert_eq!(led_color(&harness), LedColor::Red);
    assert_eq!(
        read(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, 0).await.value,
        b"Red LED on"
    );
    assert_eq!(
        read(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, 0).await.value,
        b"Green LED on"
    );

    write(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, b"OFF", 0).await;
    assert_eq!(led_color(&harness), LedColor::Off);
    assert_eq!(
        read(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, 0).await.value,
        b"LED off"
    );

    assert!(sink.sent.is_empty());
}

#[tokio::test]
async fn unrecognized_payloads_are_acknowledged_and_ignored() {
    let harness = harness(NotifyPolicy::OnWrite);
    let mut sink = RecordingSink::default();
    subscribe(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, true).await;
    write(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, b"ON", 0).await;
    sink.sent.clear();

    assert_eq!(
        write(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, b"MAYBE", 0).await,
        RequestResponse::Success
    );
    assert_eq!(led_color(&harness), LedColor::Green);
    assert_eq!(
        read(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, 0).await.value,
        b"Green LED on"
    );
    assert!(sink.sent.is_empty());
}

#[tokio::test]
async fn subscribed_writes_notify_exactly_once() {
    let harness = harness(NotifyPolicy::OnWrite);
    let mut sink = RecordingSink::default();

    write(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, b"ON", 0).await;
    assert!(sink.sent.is_empty());

    subscribe(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, true).await;
    write(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, b"OFF", 0).await;
    assert_eq!(
        sink.sent,
        vec![(ENCRYPTED_CHARACTERISTIC_UUID, b"LED off".to_vec())]
    );

    subscribe(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, false).await;
    write(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, b"ON", 0).await;
    assert_eq!(sink.sent.len(), 1);
}

#[tokio::test]
async fn descriptor_only_policy_never_pushes() {
    let harness = harness(NotifyPolicy::DescriptorOnly);
    let mut sink = RecordingSink::default();
    subscribe(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, true).await;
    write(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, b"ON", 0).await;
    assert!(sink.sent.is_empty());
    assert_eq!(led_color(&harness), LedColor::Green);
}

#[tokio::test]
async fn unknown_characteristics_are_invalid_handles() {
    let harness = harness(NotifyPolicy::OnWrite);
    let mut sink = RecordingSink::default();
    let unknown = Uuid::from_u128(0xabcd1234_1234_1234_1234_1234567890ff);

    assert_eq!(
        write(&harness, &mut sink, unknown, b"ON", 0).await,
        RequestResponse::InvalidHandle
    );
    assert_eq!(
        read(&harness, &mut sink, unknown, 0).await.response,
        RequestResponse::InvalidHandle
    );
    assert_eq!(led_color(&harness), LedColor::Off);
}

#[tokio::test]
async fn requests_on_another_service_are_invalid_handles() {
    let harness = harness(NotifyPolicy::OnWrite);
    let mut sink = RecordingSink::default();
    let other_service = Uuid::from_u128(0xabcd1234_1234_1234_1234_1234567890fe);

    let (responder, response_rx) = oneshot::channel::<WriteRequestResponse>();
    harness
        .handle_event(
            PeripheralEvent::WriteRequest {
                request: request_on(other_service, OPEN_CHARACTERISTIC_UUID),
                value: b"ON".to_vec(),
                offset: 0,
                responder,
            },
            &mut sink,
        )
        .await
        .unwrap();
    assert_eq!(
        response_rx.await.unwrap().response,
        RequestResponse::InvalidHandle
    );

    let (responder, response_rx) = oneshot::channel::<ReadRequestResponse>();
    harness
        .handle_event(
            PeripheralEvent::ReadRequest {
                request: request_on(other_service, OPEN_CHARACTERISTIC_UUID),
                offset: 0,
                responder,
            },
            &mut sink,
        )
        .await
        .unwrap();
    assert_eq!(
        response_rx.await.unwrap().response,
        RequestResponse::InvalidHandle
    );

    harness
        .handle_event(
            PeripheralEvent::CharacteristicSubscriptionUpdate {
                request: request_on(other_service, OPEN_CHARACTERISTIC_UUID),
                subscribed: true,
            },
            &mut sink,
        )
        .await
        .unwrap();
    let controller = harness.controller();
    let controller = controller.lock().unwrap();
    assert!(!controller
        .state(CharacteristicIdentity::Open)
        .notifications_enabled());
    assert_eq!(controller.led().color(), LedColor::Off);
}

#[tokio::test]
async fn offsets_are_checked() {
    let harness = harness(NotifyPolicy::OnWrite);
    let mut sink = RecordingSink::default();

    let tail = read(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, 4).await;
    assert_eq!(tail.response, RequestResponse::Success);
    assert_eq!(tail.value, b"off");

    let past_end = read(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, 64).await;
    assert_eq!(past_end.response, RequestResponse::InvalidOffset);

    assert_eq!(
        write(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, b"ON", 1).await,
        RequestResponse::InvalidOffset
    );
    assert_eq!(led_color(&harness), LedColor::Off);
}

#[tokio::test]
async fn reconnecting_preserves_state() {
    let harness = harness(NotifyPolicy::OnWrite);
    let mut sink = RecordingSink::default();
    write(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, b"ON", 0).await;

    for connected in [false, true, false, true] {
        harness
            .handle_event(
                PeripheralEvent::ConnectionUpdate {
                    client: CLIENT.to_string(),
                    connected,
                },
                &mut sink,
            )
            .await
            .unwrap();
    }

    assert_eq!(led_color(&harness), LedColor::Green);
    assert_eq!(
        read(&harness, &mut sink, OPEN_CHARACTERISTIC_UUID, 0).await.value,
        b"Green LED on"
    );
    assert_eq!(
        read(&harness, &mut sink, ENCRYPTED_CHARACTERISTIC_UUID, 0).await.value,
        b"LED off"
    );
    let controller = harness.controller();
    let controller = controller.lock().unwrap();
    assert!(controller.connections().is_connected());
    assert_eq!(controller.connections().connects(), 2);
}

#[tokio::test]
async fn run_drains_the_event_channel() {
    let harness = harness(NotifyPolicy::OnWrite);
    let mut sink = RecordingSink::default();
    let (sender_tx, receiver_rx) = mpsc::channel::<PeripheralEvent>(8);

    let (responder, response_rx) = oneshot::channel();
    sender_tx
        .send(PeripheralEvent::StateUpdate { is_powered: true })
        .await
        .unwrap();
    sender_tx
        .send(PeripheralEvent::CharacteristicSubscriptionUpdate {
            request: request(OPEN_CHARACTERISTIC_UUID),
            subscribed: true,
        })
        .await
        .unwrap();
    sender_tx
        .send(PeripheralEvent::WriteRequest {
            request: request(OPEN_CHARACTERISTIC_UUID),
            value: b"ON".to_vec(),
            offset: 0,
            responder,
        })
        .await
        .unwrap();
    drop(sender_tx);

    harness.run(receiver_rx, &mut sink).await.unwrap();

    assert_eq!(response_rx.await.unwrap().response, RequestResponse::Success);
    assert_eq!(
        sink.sent,
        vec![(OPEN_CHARACTERISTIC_UUID, b"Green LED on".to_vec())]
    );
}

#[tokio::test]
async fn a_dropped_responder_does_not_stop_the_loop() {
    let harness = harness(NotifyPolicy::OnWrite);
    let mut sink = RecordingSink::default();
    let (responder, response_rx) = oneshot::channel();
    drop(response_rx);

    harness
        .handle_event(
            PeripheralEvent::WriteRequest {
                request: request(ENCRYPTED_CHARACTERISTIC_UUID),
                value: b"ON".to_vec(),
                offset: 0,
                responder,
            },
            &mut sink,
        )
        .await
        .unwrap();
    assert_eq!(led_color(&harness), LedColor::Red);
}

// Takes the lock once and checks that the pixel agrees with the values.
fn assert_consistent(harness: &Harness<ConsolePixel>) {
    let controller = harness.controller();
    let controller = controller.lock().unwrap();
    let open = controller.state(CharacteristicIdentity::Open).current_value();
    let encrypted = controller
        .state(CharacteristicIdentity::Encrypted)
        .current_value();

    assert!(open == GREEN_ON || open == LED_OFF, "open value {open:?}");
    assert!(
        encrypted == RED_ON || encrypted == LED_OFF,
        "encrypted value {encrypted:?}"
    );
    match controller.led().color() {
        LedColor::Green => assert_eq!(open, GREEN_ON),
        LedColor::Red => assert_eq!(encrypted, RED_ON),
        LedColor::Off => assert!(open == LED_OFF || encrypted == LED_OFF),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_share_one_lock() {
    const ROUNDS: usize = 200;
    let harness = harness(NotifyPolicy::OnWrite);

    let writer = |characteristic: Uuid, last: &'static [u8]| {
        let harness = harness.clone();
        tokio::spawn(async move {
            let mut sink = RecordingSink::default();
            subscribe(&harness, &mut sink, characteristic, true).await;
            for round in 0..ROUNDS {
                let payload: &[u8] = if round % 2 == 0 { b"ON" } else { b"OFF" };
                let response = write(&harness, &mut sink, characteristic, payload, 0).await;
                assert_eq!(response, RequestResponse::Success);
                tokio::task::yield_now().await;
            }
            write(&harness, &mut sink, characteristic, last, 0).await;
            sink
        })
    };
    let open = writer(OPEN_CHARACTERISTIC_UUID, b"ON");
    let encrypted = writer(ENCRYPTED_CHARACTERISTIC_UUID, b"OFF");

    let observer = {
        let harness = harness.clone();
        tokio::spawn(async move {
            for _ in 0..ROUNDS {
                assert_consistent(&harness);
                tokio::task::yield_now().await;
            }
        })
    };

    let open_sink = open.await.unwrap();
    let encrypted_sink = encrypted.await.unwrap();
    observer.await.unwrap();

    assert_consistent(&harness);
    assert_eq!(
        read(&harness, &mut RecordingSink::default(), OPEN_CHARACTERISTIC_UUID, 0)
            .await
            .value,
        GREEN_ON.as_bytes()
    );
    assert_eq!(
        read(&harness, &mut RecordingSink::default(), ENCRYPTED_CHARACTERISTIC_UUID, 0)
            .await
            .value,
        LED_OFF.as_bytes()
    );

    assert_eq!(open_sink.sent.len(), ROUNDS + 1);
    assert!(open_sink
        .sent
        .iter()
        .all(|(uuid, _)| *uuid == OPEN_CHARACTERISTIC_UUID));
    assert_eq!(encrypted_sink.sent.len(), ROUNDS + 1);
    assert!(encrypted_sink
        .sent
        .iter()
        .all(|(uuid, _)| *uuid == ENCRYPTED_CHARACTERISTIC_UUID));
}

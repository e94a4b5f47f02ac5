use ble_led_tester::{
    config::Config,
    control::GattController,
    error::Error,
    harness::Harness,
    led::{ConsolePixel, LedDriver},
};
use clap::Parser;
use std::process::ExitCode;
use tokio::runtime::Builder;

fn main() -> ExitCode {
    let config = Config::parse();

    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    if let Err(err) = pretty_env_logger::try_init() {
        eprintln!("WARNING: failed to initialize logging framework: {}", err);
    }

    let runtime = match Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("Failed to build runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(start_app(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn build_harness(config: &Config) -> Harness<ConsolePixel> {
    let mut pixel = ConsolePixel::new();
    pixel.init();
    pixel.set_brightness(config.brightness);
    Harness::new(GattController::new(pixel, config.notify_policy))
}

#[cfg(target_os = "linux")]
async fn start_app(config: Config) -> Result<(), Error> {
    use ble_led_tester::{
        bootstrap::{bootstrap, SecurityPolicy},
        gatt::peripheral_event::PeripheralEvent,
        peripheral::PeripheralImpl,
        Peripheral,
    };
    use tokio::sync::mpsc;

    let harness = build_harness(&config);

    let (sender_tx, receiver_rx) = mpsc::channel::<PeripheralEvent>(config.event_queue.into());
    let mut peripheral = Peripheral::new(sender_tx).await?;

    bootstrap(&mut peripheral, &config.name, &SecurityPolicy::default()).await?;

    tokio::select! {
        result = harness.run(receiver_rx, &mut peripheral) => result?,
        _ = tokio::signal::ctrl_c() => log::info!("Shutting down"),
    }

    peripheral.stop_advertising().await?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn start_app(config: Config) -> Result<(), Error> {
    use ble_led_tester::error::ErrorType;

    let _ = build_harness(&config);
    Err(Error::new(
        "start_app",
        "this build only carries the BlueZ backend (Linux)",
        ErrorType::Unsupported,
    ))
}

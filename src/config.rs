use crate::{bootstrap::DEFAULT_DEVICE_NAME, control::NotifyPolicy, led::DEFAULT_BRIGHTNESS};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "ble-led-tester", version, about = "BLE LED test harness peripheral")]
pub struct Config {
    /// Name to advertise
    #[arg(long, default_value = DEFAULT_DEVICE_NAME)]
    pub name: String,

    /// Pixel brightness, 0-255
    #[arg(long, default_value_t = DEFAULT_BRIGHTNESS)]
    pub brightness: u8,

    /// Push the new value to subscribed clients after every accepted write
    #[arg(long, value_enum, default_value_t = NotifyPolicy::OnWrite)]
    pub notify_policy: NotifyPolicy,

    /// Capacity of the peripheral event queue
    #[arg(long, default_value_t = 256, value_parser = clap::value_parser!(u16).range(1..))]
    pub event_queue: u16,
}

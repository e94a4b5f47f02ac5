pub mod bootstrap;
pub mod config;
pub mod control;
pub mod error;
pub mod gatt;
pub mod harness;
pub mod led;
pub mod peripheral;
pub mod uuid;

#[cfg(target_os = "linux")]
pub use self::peripheral::Peripheral;

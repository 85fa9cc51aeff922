//! Userspace driver for USB DDR dance pads.
//!
//! Raw reports from the pad are decoded into button states, diffed against the
//! previous state, and replayed as key presses on a uinput gamepad.
pub mod config;
pub mod devices;
pub mod discovery;
pub mod error;
pub mod gamepad_device;
pub mod logger;
pub mod mappings;
pub mod poller;
pub mod protocol;
pub mod session;
pub mod transport;

pub mod ddr_pad;
pub mod ddr_pad_layout;

pub use ddr_pad::{Button, ButtonChanges, ButtonState, ControlFrame, decode, decode_with, diff};
pub use ddr_pad_layout::{ControlScheme, ControlSignature};

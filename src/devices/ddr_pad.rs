use super::ddr_pad_layout::{ControlScheme, SCHEMES, scheme_for_len};
use crate::error::DecodeError;
use std::collections::BTreeSet;
use std::fmt;

/// Physical inputs on the pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
    Start,
    Select,
}

impl Button {
    pub const COUNT: usize = 10;

    pub const ALL: [Button; Self::COUNT] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::UpLeft,
        Button::UpRight,
        Button::DownLeft,
        Button::DownRight,
        Button::Start,
        Button::Select,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One raw input report, exactly as read from the inbound endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ControlFrame(Vec<u8>);

impl ControlFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for ControlFrame {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Debug for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControlFrame[{}]", crate::logger::hex_dump(&self.0))
    }
}

/// The set of buttons held down in one frame, tagged with the scheme that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonState {
    scheme: &'static str,
    pressed: BTreeSet<Button>,
}

impl ButtonState {
    pub fn new(scheme: &'static str, pressed: impl IntoIterator<Item = Button>) -> Self {
        Self {
            scheme,
            pressed: pressed.into_iter().collect(),
        }
    }

    pub fn scheme(&self) -> &'static str {
        self.scheme
    }

    pub fn pressed(&self) -> &BTreeSet<Button> {
        &self.pressed
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed.contains(&button)
    }
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pressed buttons: {:?}", self.pressed)
    }
}

/// Buttons that went down and came up between two states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonChanges {
    pub pressed: BTreeSet<Button>,
    pub released: BTreeSet<Button>,
}

impl ButtonChanges {
    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty() && self.released.is_empty()
    }
}

/// Decodes a frame with the built-in schemes.
pub fn decode(frame: &ControlFrame) -> Result<ButtonState, DecodeError> {
    decode_with(&SCHEMES, frame)
}

/// Decodes a frame with whichever scheme in `schemes` matches its length.
pub fn decode_with(
    schemes: &[ControlScheme],
    frame: &ControlFrame,
) -> Result<ButtonState, DecodeError> {
    let scheme = scheme_for_len(schemes, frame.len())
        .ok_or(DecodeError::UnrecognizedFrameLength { length: frame.len() })?;

    let bytes = frame.as_bytes();
    let pressed = scheme
        .signatures()
        .filter(|(_, signature)| signature.is_set(bytes))
        .map(|(button, _)| button);

    Ok(ButtonState::new(scheme.name, pressed))
}

/// `pressed = current - previous`, `released = previous - current`.
pub fn diff(current: &ButtonState, previous: &ButtonState) -> ButtonChanges {
    ButtonChanges {
        pressed: current.pressed.difference(&previous.pressed).copied().collect(),
        released: previous.pressed.difference(&current.pressed).copied().collect(),
    }
}

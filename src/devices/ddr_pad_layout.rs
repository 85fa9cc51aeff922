//! Layouts de los reportes crudos del DDR Pad.
//!
//! Both tables were reverse-engineered from captures. They are data, not code:
//! add a scheme to [`SCHEMES`] and the decoder picks it up by frame length.
use super::ddr_pad::{Button, ControlFrame};
use crate::protocol::{CURRENT_FRAME_LEN, LEGACY_FRAME_LEN};

/// Where one button lives inside a control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSignature {
    pub byte_index: usize,
    pub bit_mask: u8,
}

impl ControlSignature {
    pub const fn new(byte_index: usize, bit_mask: u8) -> Self {
        Self { byte_index, bit_mask }
    }

    /// `frame[byte_index] & bit_mask != 0`. Bytes past the end read as released.
    pub fn is_set(&self, frame: &[u8]) -> bool {
        frame
            .get(self.byte_index)
            .is_some_and(|byte| byte & self.bit_mask != 0)
    }
}

/// Button -> signature table for one frame length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlScheme {
    pub name: &'static str,
    pub frame_len: usize,
    /// Indexed in [`Button::ALL`] order, so every button has exactly one entry.
    signatures: [ControlSignature; Button::COUNT],
}

impl ControlScheme {
    pub const fn new(
        name: &'static str,
        frame_len: usize,
        signatures: [ControlSignature; Button::COUNT],
    ) -> Self {
        Self { name, frame_len, signatures }
    }

    pub fn signature(&self, button: Button) -> ControlSignature {
        self.signatures[button.index()]
    }

    pub fn signatures(&self) -> impl Iterator<Item = (Button, ControlSignature)> + '_ {
        Button::ALL.into_iter().zip(self.signatures.iter().copied())
    }

    /// Builds the frame a pad would send with exactly `pressed` held down.
    pub fn encode(&self, pressed: &[Button]) -> ControlFrame {
        let mut bytes = vec![0u8; self.frame_len];
        for &button in pressed {
            let signature = self.signature(button);
            if let Some(byte) = bytes.get_mut(signature.byte_index) {
                *byte |= signature.bit_mask;
            }
        }
        ControlFrame::new(bytes)
    }
}

/// Original pads: the whole state fits in two bytes.
///
/// byte 0: UP 0x10, DOWN 0x40, LEFT 0x80, RIGHT 0x20, START 0x08, SELECT 0x01
/// byte 1: UP_LEFT 0x20, UP_RIGHT 0x40, DOWN_LEFT 0x80, DOWN_RIGHT 0x10
pub const LEGACY_SCHEME: ControlScheme = ControlScheme::new(
    "legacy",
    LEGACY_FRAME_LEN,
    [
        ControlSignature::new(0, 0b0001_0000), // UP
        ControlSignature::new(0, 0b0100_0000), // DOWN
        ControlSignature::new(0, 0b1000_0000), // LEFT
        ControlSignature::new(0, 0b0010_0000), // RIGHT
        ControlSignature::new(1, 0b0010_0000), // UP_LEFT
        ControlSignature::new(1, 0b0100_0000), // UP_RIGHT
        ControlSignature::new(1, 0b1000_0000), // DOWN_LEFT
        ControlSignature::new(1, 0b0001_0000), // DOWN_RIGHT
        ControlSignature::new(0, 0b0000_1000), // START
        ControlSignature::new(0, 0b0000_0001), // SELECT
    ],
);

/// Current pads: byte 2 is a status byte, the diagonals are analog-ish bytes
/// where any nonzero value means pressed.
///
/// byte 2: UP 0x01, DOWN 0x02, LEFT 0x04, RIGHT 0x08, START 0x10, SELECT 0x20
/// bytes 4/5/6/7: UP_LEFT / UP_RIGHT / DOWN_RIGHT / DOWN_LEFT
pub const CURRENT_SCHEME: ControlScheme = ControlScheme::new(
    "current",
    CURRENT_FRAME_LEN,
    [
        ControlSignature::new(2, 0x01), // UP
        ControlSignature::new(2, 0x02), // DOWN
        ControlSignature::new(2, 0x04), // LEFT
        ControlSignature::new(2, 0x08), // RIGHT
        ControlSignature::new(4, 0xff), // UP_LEFT
        ControlSignature::new(5, 0xff), // UP_RIGHT
        ControlSignature::new(7, 0xff), // DOWN_LEFT
        ControlSignature::new(6, 0xff), // DOWN_RIGHT
        ControlSignature::new(2, 0x10), // START
        ControlSignature::new(2, 0x20), // SELECT
    ],
);

pub static SCHEMES: [ControlScheme; 2] = [LEGACY_SCHEME, CURRENT_SCHEME];

pub fn scheme_for_len(schemes: &[ControlScheme], frame_len: usize) -> Option<&ControlScheme> {
    schemes.iter().find(|scheme| scheme.frame_len == frame_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemes_are_keyed_by_distinct_lengths() {
        assert_eq!(scheme_for_len(&SCHEMES, 2).map(|s| s.name), Some("legacy"));
        assert_eq!(scheme_for_len(&SCHEMES, 8).map(|s| s.name), Some("current"));
        assert!(scheme_for_len(&SCHEMES, 3).is_none());
        assert!(scheme_for_len(&SCHEMES, 0).is_none());
    }

    #[test]
    fn every_signature_fits_inside_its_frame() {
        for scheme in &SCHEMES {
            for (button, signature) in scheme.signatures() {
                assert!(
                    signature.byte_index < scheme.frame_len,
                    "{button:?} out of range in {}",
                    scheme.name
                );
                assert_ne!(signature.bit_mask, 0, "{button:?} has an empty mask");
            }
        }
    }

    #[test]
    fn current_scheme_diagonals_use_full_byte_masks() {
        assert_eq!(CURRENT_SCHEME.signature(Button::UpLeft), ControlSignature::new(4, 0xff));
        assert_eq!(CURRENT_SCHEME.signature(Button::UpRight), ControlSignature::new(5, 0xff));
        assert_eq!(CURRENT_SCHEME.signature(Button::DownRight), ControlSignature::new(6, 0xff));
        assert_eq!(CURRENT_SCHEME.signature(Button::DownLeft), ControlSignature::new(7, 0xff));
    }

    #[test]
    fn signature_past_end_of_frame_reads_released() {
        let signature = ControlSignature::new(5, 0x01);
        assert!(!signature.is_set(&[0xff, 0xff]));
        assert!(signature.is_set(&[0, 0, 0, 0, 0, 0x01]));
    }

    #[test]
    fn encode_sets_only_the_requested_bits() {
        let frame = LEGACY_SCHEME.encode(&[Button::Up, Button::Select, Button::DownRight]);
        assert_eq!(frame.as_bytes(), &[0x11, 0x10]);

        let frame = CURRENT_SCHEME.encode(&[Button::Left, Button::DownLeft]);
        assert_eq!(frame.as_bytes(), &[0, 0, 0x04, 0, 0, 0, 0, 0xff]);
    }
}

use crate::devices::Button;
use evdev::Key;

/// The virtual gamepad's native event identifier.
pub type ButtonEventCode = Key;

/// Pad button -> evdev key. Diagonals land on the face buttons so games that
/// only read a standard gamepad still see them.
pub fn to_event_code(button: Button) -> ButtonEventCode {
    match button {
        Button::Up => Key::BTN_DPAD_UP,
        Button::Down => Key::BTN_DPAD_DOWN,
        Button::Left => Key::BTN_DPAD_LEFT,
        Button::Right => Key::BTN_DPAD_RIGHT,
        Button::Start => Key::BTN_START,
        Button::Select => Key::BTN_SELECT,
        Button::UpLeft => Key::BTN_SOUTH,    // Cross
        Button::UpRight => Key::BTN_EAST,    // Circle
        Button::DownLeft => Key::BTN_NORTH,  // Triangle
        Button::DownRight => Key::BTN_WEST,  // Square
    }
}

/// Everything the virtual gamepad has to advertise.
pub fn capabilities() -> impl Iterator<Item = ButtonEventCode> {
    Button::ALL.into_iter().map(to_event_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_button_has_a_code() {
        assert_eq!(capabilities().count(), Button::COUNT);
    }

    #[test]
    fn no_two_buttons_share_a_code() {
        let codes: HashSet<u16> = capabilities().map(|key| key.code()).collect();
        assert_eq!(codes.len(), Button::COUNT);
    }

    #[test]
    fn arrows_map_to_dpad() {
        assert_eq!(to_event_code(Button::Up), Key::BTN_DPAD_UP);
        assert_eq!(to_event_code(Button::Right), Key::BTN_DPAD_RIGHT);
        assert_eq!(to_event_code(Button::UpLeft), Key::BTN_SOUTH);
        assert_eq!(to_event_code(Button::DownRight), Key::BTN_WEST);
    }
}

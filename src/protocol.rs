// Constantes del dispositivo USB y del gamepad virtual
use std::time::Duration;

/// Sony Corporation.
pub const DDR_PAD_VENDOR_ID: u16 = 0x054c;
/// PlayStation(R)3 Controller. The pad reports itself as one.
pub const DDR_PAD_PRODUCT_ID: u16 = 0x0268;

// TODO: the legacy report length is a guess; confirm against a legacy pad capture.
pub const LEGACY_FRAME_LEN: usize = 2;
pub const CURRENT_FRAME_LEN: usize = 8;

pub const VIRTUAL_PAD_NAME: &str = "Virtual DDRPad";
pub const VIRTUAL_PAD_VENDOR_ID: u16 = 0xdead;
pub const VIRTUAL_PAD_PRODUCT_ID: u16 = 0xbeef;
pub const VIRTUAL_PAD_VERSION: u16 = 0x0001;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);

pub fn matches_ddr_pad(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == DDR_PAD_VENDOR_ID && product_id == DDR_PAD_PRODUCT_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_sony_pad_identity_matches() {
        assert!(matches_ddr_pad(0x054c, 0x0268));
        assert!(!matches_ddr_pad(0x054c, 0x05c4));
        assert!(!matches_ddr_pad(0x045e, 0x0268));
    }
}

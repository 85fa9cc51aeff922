use crate::devices::ButtonChanges;
use crate::error::SinkError;
use crate::mappings::{ButtonEventCode, capabilities, to_event_code};
use crate::protocol::{
    VIRTUAL_PAD_NAME, VIRTUAL_PAD_PRODUCT_ID, VIRTUAL_PAD_VENDOR_ID, VIRTUAL_PAD_VERSION,
};
use evdev::{
    AttributeSet, BusType, EventType, InputEvent, InputId,
    uinput::{VirtualDevice, VirtualDeviceBuilder},
};

/// Identity the synthetic controller presents to the rest of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkIdentity {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
}

impl SinkIdentity {
    pub const DDR_PAD: SinkIdentity = SinkIdentity {
        name: VIRTUAL_PAD_NAME,
        vendor_id: VIRTUAL_PAD_VENDOR_ID,
        product_id: VIRTUAL_PAD_PRODUCT_ID,
        version: VIRTUAL_PAD_VERSION,
    };
}

/// Where decoded button changes are replayed.
pub trait VirtualSink {
    /// Presses everything in `changes.pressed`, releases everything in
    /// `changes.released`.
    fn emit(&mut self, changes: &ButtonChanges) -> Result<(), SinkError>;

    fn close(self) -> Result<(), SinkError>
    where
        Self: Sized;
}

/// Creates one sink per session.
pub trait SinkFactory: Send + Sync {
    type Sink: VirtualSink;

    fn open(
        &self,
        identity: &SinkIdentity,
        capabilities: &[ButtonEventCode],
    ) -> Result<Self::Sink, SinkError>;
}

/// Virtual gamepad backed by /dev/uinput.
pub struct UinputGamepad {
    device: VirtualDevice,
}

impl VirtualSink for UinputGamepad {
    fn emit(&mut self, changes: &ButtonChanges) -> Result<(), SinkError> {
        let events = key_events(changes);
        if !events.is_empty() {
            // evdev termina el lote con SYN_REPORT
            self.device.emit(&events)?;
        }
        Ok(())
    }

    fn close(self) -> Result<(), SinkError> {
        // uinput destroys the node when the fd is closed
        drop(self.device);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UinputFactory;

impl SinkFactory for UinputFactory {
    type Sink = UinputGamepad;

    fn open(
        &self,
        identity: &SinkIdentity,
        capabilities: &[ButtonEventCode],
    ) -> Result<UinputGamepad, SinkError> {
        create_virtual_gamepad(identity, capabilities).map(|device| UinputGamepad { device })
    }
}

pub fn create_virtual_gamepad(
    identity: &SinkIdentity,
    capabilities: &[ButtonEventCode],
) -> Result<VirtualDevice, SinkError> {
    let mut keys = AttributeSet::<ButtonEventCode>::new();
    for &key in capabilities {
        keys.insert(key);
    }

    let device = VirtualDeviceBuilder::new()?
        .name(identity.name)
        .input_id(InputId::new(
            BusType::BUS_USB,
            identity.vendor_id,
            identity.product_id,
            identity.version,
        ))
        .with_keys(&keys)?
        .build()?;

    Ok(device)
}

/// Full capability set of the virtual DDR pad.
pub fn ddr_pad_capabilities() -> Vec<ButtonEventCode> {
    capabilities().collect()
}

fn key_events(changes: &ButtonChanges) -> Vec<InputEvent> {
    let presses = changes
        .pressed
        .iter()
        .map(|&button| InputEvent::new(EventType::KEY, to_event_code(button).code(), 1));
    let releases = changes
        .released
        .iter()
        .map(|&button| InputEvent::new(EventType::KEY, to_event_code(button).code(), 0));
    presses.chain(releases).collect()
}

//! USB side of a pad session.
//!
//! [`UsbPad`] is the capability a session needs from the transport; [`RusbPad`]
//! implements it on top of libusb.
use crate::devices::ControlFrame;
use crate::error::{TopologyError, TransportError};
use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Endpoint address including the direction bit.
    pub address: u8,
    pub direction: EndpointDirection,
    pub interrupt: bool,
    pub max_packet_size: u16,
}

impl EndpointInfo {
    pub fn number(&self) -> u8 {
        self.address & 0x0f
    }
}

impl fmt::Display for EndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.direction, self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateInfo {
    pub setting: u8,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub alternates: Vec<AlternateInfo>,
}

/// The interface/endpoint pair a session reads frames from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadEndpoint {
    pub interface: u8,
    pub endpoint: EndpointInfo,
}

/// As far as we know a dance pad has one interface, one alternate setting and
/// one inbound endpoint. Anything else is treated as a different device.
pub fn select_endpoint(interfaces: &[InterfaceInfo]) -> Result<PadEndpoint, TopologyError> {
    let [interface] = interfaces else {
        return Err(TopologyError::InterfaceCount(interfaces.len()));
    };
    tracing::debug!(alternates = ?interface.alternates, "Alternates");

    let [alternate] = interface.alternates.as_slice() else {
        return Err(TopologyError::AlternateCount(interface.alternates.len()));
    };
    tracing::debug!(
        "Endpoints: {}",
        alternate
            .endpoints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let inbound: Vec<&EndpointInfo> = alternate
        .endpoints
        .iter()
        .filter(|endpoint| endpoint.direction == EndpointDirection::In)
        .collect();
    let [endpoint] = inbound.as_slice() else {
        return Err(TopologyError::InboundEndpointCount(inbound.len()));
    };

    Ok(PadEndpoint {
        interface: interface.number,
        endpoint: **endpoint,
    })
}

/// Transport handle for one physical pad.
///
/// Calls arrive in lifecycle order: detach, open, interfaces, claim, reads,
/// then release, close, attach on the way out.
pub trait UsbPad: Send {
    /// Stable text used to tell pads apart in logs.
    fn identifier(&self) -> String;

    fn detach_standard_drivers(&mut self) -> Result<(), TransportError>;

    fn attach_standard_drivers(&mut self) -> Result<(), TransportError>;

    fn open(&mut self) -> Result<(), TransportError>;

    fn close(&mut self) -> Result<(), TransportError>;

    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, TransportError>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    /// Blocks until the endpoint delivers one report or the transport fails.
    fn transfer_in(&mut self, endpoint: &EndpointInfo) -> Result<ControlFrame, TransportError>;
}

// libusb: a zero timeout waits forever
const NO_TIMEOUT: Duration = Duration::ZERO;

/// Kernel driver control on an open handle.
trait KernelDrivers {
    fn driver_active(&self, interface: u8) -> rusb::Result<bool>;
    fn detach_driver(&self, interface: u8) -> rusb::Result<()>;
    fn attach_driver(&self, interface: u8) -> rusb::Result<()>;
}

impl<T: UsbContext> KernelDrivers for DeviceHandle<T> {
    fn driver_active(&self, interface: u8) -> rusb::Result<bool> {
        self.kernel_driver_active(interface)
    }

    fn detach_driver(&self, interface: u8) -> rusb::Result<()> {
        self.detach_kernel_driver(interface)
    }

    fn attach_driver(&self, interface: u8) -> rusb::Result<()> {
        self.attach_kernel_driver(interface)
    }
}

/// Detaches every active kernel driver and returns the interfaces it took.
/// All or nothing: if one interface fails, the ones already taken are handed
/// back before the error is returned.
fn detach_all<H: KernelDrivers>(handle: &H, interfaces: &[u8]) -> rusb::Result<Vec<u8>> {
    let mut detached = Vec::new();
    for &number in interfaces {
        let taken = handle.driver_active(number).and_then(|active| {
            if active {
                handle.detach_driver(number).map(|()| true)
            } else {
                Ok(false)
            }
        });
        match taken {
            Ok(true) => detached.push(number),
            Ok(false) => {}
            Err(e) => {
                if let Err(attach) = attach_all(handle, &mut detached) {
                    tracing::warn!("Failed to give back drivers after detach error: {attach}");
                }
                return Err(e);
            }
        }
    }
    Ok(detached)
}

/// Tries every interface even when an earlier one fails; reports the first error.
fn attach_all<H: KernelDrivers>(handle: &H, detached: &mut Vec<u8>) -> rusb::Result<()> {
    let mut first_error = None;
    for number in detached.drain(..) {
        if let Err(e) = handle.attach_driver(number) {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

fn describe(bus: u8, address: u8, serial: Option<&str>) -> String {
    format!(
        "<bus:{bus:03} address:{address:03} serialNumber:{}>",
        serial.unwrap_or("?")
    )
}

/// A pad reached through libusb.
///
/// Driver detach/reattach goes through its own handle so the communication
/// handle can be closed before the kernel driver is given the device back.
pub struct RusbPad {
    device: Device<Context>,
    serial: Option<String>,
    driver_handle: Option<DeviceHandle<Context>>,
    detached: Vec<u8>,
    io_handle: Option<DeviceHandle<Context>>,
}

impl RusbPad {
    pub fn new(device: Device<Context>) -> Self {
        Self {
            device,
            serial: None,
            driver_handle: None,
            detached: Vec::new(),
            io_handle: None,
        }
    }

    fn io_handle(&mut self) -> Result<&mut DeviceHandle<Context>, TransportError> {
        self.io_handle.as_mut().ok_or(TransportError::NotOpen)
    }

    fn read_serial(&self, handle: &DeviceHandle<Context>) -> Option<String> {
        let descriptor = self.device.device_descriptor().ok()?;
        handle.read_serial_number_string_ascii(&descriptor).ok()
    }
}

impl UsbPad for RusbPad {
    fn identifier(&self) -> String {
        let serial = match (&self.serial, &self.io_handle) {
            (Some(serial), _) => Some(serial.clone()),
            (None, Some(handle)) => self.read_serial(handle),
            // not opened yet, peek through a short-lived handle
            (None, None) => self
                .device
                .open()
                .ok()
                .and_then(|handle| self.read_serial(&handle)),
        };
        describe(self.device.bus_number(), self.device.address(), serial.as_deref())
    }

    fn detach_standard_drivers(&mut self) -> Result<(), TransportError> {
        let handle = self.device.open()?;
        let config = self.device.active_config_descriptor()?;
        let numbers: Vec<u8> = config.interfaces().map(|interface| interface.number()).collect();
        self.detached = detach_all(&handle, &numbers)?;
        self.driver_handle = Some(handle);
        Ok(())
    }

    fn attach_standard_drivers(&mut self) -> Result<(), TransportError> {
        let Some(handle) = self.driver_handle.take() else {
            return Ok(());
        };
        attach_all(&handle, &mut self.detached)?;
        Ok(())
    }

    fn open(&mut self) -> Result<(), TransportError> {
        let handle = self.device.open()?;
        self.serial = self.read_serial(&handle);
        self.io_handle = Some(handle);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.io_handle.take().ok_or(TransportError::NotOpen).map(drop)
    }

    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, TransportError> {
        let config = self.device.active_config_descriptor()?;
        let interfaces = config
            .interfaces()
            .map(|interface| InterfaceInfo {
                number: interface.number(),
                alternates: interface
                    .descriptors()
                    .map(|alternate| AlternateInfo {
                        setting: alternate.setting_number(),
                        endpoints: alternate
                            .endpoint_descriptors()
                            .map(|endpoint| EndpointInfo {
                                address: endpoint.address(),
                                direction: match endpoint.direction() {
                                    Direction::In => EndpointDirection::In,
                                    Direction::Out => EndpointDirection::Out,
                                },
                                interrupt: endpoint.transfer_type() == TransferType::Interrupt,
                                max_packet_size: endpoint.max_packet_size(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Ok(interfaces)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        self.io_handle()?.claim_interface(interface)?;
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        self.io_handle()?.release_interface(interface)?;
        Ok(())
    }

    fn transfer_in(&mut self, endpoint: &EndpointInfo) -> Result<ControlFrame, TransportError> {
        let mut buf = vec![0u8; usize::from(endpoint.max_packet_size.max(8))];
        let handle = self.io_handle()?;
        let len = if endpoint.interrupt {
            handle.read_interrupt(endpoint.address, &mut buf, NO_TIMEOUT)?
        } else {
            handle.read_bulk(endpoint.address, &mut buf, NO_TIMEOUT)?
        };
        buf.truncate(len);
        Ok(ControlFrame::new(buf))
    }
}

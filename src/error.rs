use thiserror::Error;

/// A raw report whose length matches no known control scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unrecognized control frame length {length}")]
    UnrecognizedFrameLength { length: usize },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("usb: {0}")]
    Usb(#[from] rusb::Error),
    #[error("device handle is not open")]
    NotOpen,
}

impl TransportError {
    /// The transport reports the device as gone (ENODEV). Expected while a pad is
    /// being unplugged.
    pub fn is_no_device(&self) -> bool {
        matches!(self, TransportError::Usb(rusb::Error::NoDevice))
    }
}

/// The device does not look like a dance pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("expected exactly one interface, found {0}")]
    InterfaceCount(usize),
    #[error("expected exactly one alternate setting, found {0}")]
    AlternateCount(usize),
    #[error("expected exactly one inbound endpoint, found {0}")]
    InboundEndpointCount(usize),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("virtual gamepad i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a session ended before it reached the polling loop.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to detach standard drivers: {0}")]
    DriverDetach(#[source] TransportError),
    #[error("failed to open device: {0}")]
    Open(#[source] TransportError),
    #[error("failed to read interface descriptors: {0}")]
    Descriptors(#[source] TransportError),
    #[error("unexpected device topology: {0}")]
    Topology(#[from] TopologyError),
    #[error("failed to claim interface {interface}: {source}")]
    Claim {
        interface: u8,
        #[source]
        source: TransportError,
    },
    #[error("failed to open virtual gamepad: {0}")]
    Sink(#[from] SinkError),
    #[error("failed first read of the control frame: {0}")]
    BaselineRead(#[source] TransportError),
    #[error("first control frame not understood: {0}")]
    BaselineDecode(#[from] DecodeError),
}

/// Why the polling loop stopped on something other than an unplug.
#[derive(Debug, Error)]
pub enum PollFault {
    #[error("read failed: {0}")]
    Read(#[source] TransportError),
    #[error("frame not understood: {0}")]
    Decode(#[from] DecodeError),
    #[error("control scheme changed mid-session from {previous} to {current}")]
    SchemeChanged {
        previous: &'static str,
        current: &'static str,
    },
    #[error("failed to emit events: {0}")]
    Emit(#[from] SinkError),
}

/// One failed step while giving a pad back.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure to set up device discovery. Sessions never produce these.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("usb: {0}")]
    Usb(#[from] rusb::Error),
    #[error("failed to start thread: {0}")]
    Thread(#[from] std::io::Error),
}

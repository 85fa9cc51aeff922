//! Lifecycle of one pad: take it over, poll it, give it back.
//!
//! Acquisition is strictly nested (detach drivers, open, claim interface, open
//! virtual gamepad) and [`SessionResources::teardown`] undoes whatever was
//! acquired in the mirror order, one step at a time, whatever happened before.
use crate::devices::decode;
use crate::error::{PollFault, SessionError, TeardownError};
use crate::gamepad_device::{SinkFactory, SinkIdentity, VirtualSink, ddr_pad_capabilities};
use crate::poller::{PollExit, poll_until_disconnect};
use crate::protocol::DEFAULT_POLL_INTERVAL;
use crate::transport::{UsbPad, select_endpoint};
use std::fmt;
use std::mem;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub poll_interval: Duration,
    pub identity: SinkIdentity,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            identity: SinkIdentity::DDR_PAD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    CloseSink,
    ReleaseInterface,
    CloseDevice,
    AttachDrivers,
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TeardownStep::CloseSink => "close virtual gamepad",
            TeardownStep::ReleaseInterface => "release interface",
            TeardownStep::CloseDevice => "close device",
            TeardownStep::AttachDrivers => "reattach standard drivers",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct TeardownFailure {
    pub step: TeardownStep,
    pub error: TeardownError,
}

/// Every teardown step that ran and the ones that failed.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub attempted: Vec<TeardownStep>,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record<E: Into<TeardownError>>(&mut self, step: TeardownStep, result: Result<(), E>) {
        self.attempted.push(step);
        if let Err(e) = result {
            let error = e.into();
            warn!("Failed to {step}: {error}");
            self.failures.push(TeardownFailure { step, error });
        }
    }
}

/// What a finished session went through.
#[derive(Debug)]
pub struct SessionReport {
    /// `Err` when the session never reached the polling loop.
    pub outcome: Result<PollExit, SessionError>,
    pub teardown: TeardownReport,
}

/// Everything a session has acquired so far.
pub struct SessionResources<P: UsbPad, S: VirtualSink> {
    pad: P,
    drivers_detached: bool,
    opened: bool,
    claimed: Option<u8>,
    sink: Option<S>,
}

impl<P: UsbPad, S: VirtualSink> SessionResources<P, S> {
    pub fn new(pad: P) -> Self {
        Self {
            pad,
            drivers_detached: false,
            opened: false,
            claimed: None,
            sink: None,
        }
    }

    /// Releases what is held, newest first. Failures are logged and recorded,
    /// never returned early. Safe to call more than once.
    pub fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();

        if let Some(sink) = self.sink.take() {
            report.record(TeardownStep::CloseSink, sink.close());
        }

        if let Some(interface) = self.claimed.take() {
            let released = match self.pad.release_interface(interface) {
                // the pad was pulled out while we were still holding it
                Err(e) if e.is_no_device() => {
                    debug!("Interface {interface} already gone");
                    Ok(())
                }
                other => other,
            };
            report.record(TeardownStep::ReleaseInterface, released);
        }

        if mem::take(&mut self.opened) {
            report.record(TeardownStep::CloseDevice, self.pad.close());
        }

        if mem::take(&mut self.drivers_detached) {
            report.record(TeardownStep::AttachDrivers, self.pad.attach_standard_drivers());
        }

        report
    }

    fn holds_anything(&self) -> bool {
        self.drivers_detached || self.opened || self.claimed.is_some() || self.sink.is_some()
    }
}

impl<P: UsbPad, S: VirtualSink> Drop for SessionResources<P, S> {
    fn drop(&mut self) {
        if self.holds_anything() {
            let report = self.teardown();
            debug!("Teardown on drop: {} steps, {} failed", report.attempted.len(), report.failures.len());
        }
    }
}

/// Runs one pad from takeover to teardown on the calling thread.
pub fn run_session<P, F>(pad: P, factory: &F, config: &SessionConfig) -> SessionReport
where
    P: UsbPad,
    F: SinkFactory,
{
    let identifier = pad.identifier();
    let span = info_span!("session", pad = %identifier);
    let _entered = span.enter();

    let mut resources = SessionResources::new(pad);
    let outcome = acquire_and_poll(&mut resources, factory, config);

    match &outcome {
        Ok(PollExit::Unplugged(e) | PollExit::Faulted(PollFault::Read(e))) => {
            debug!("If the DDRPad was unplugged, this is intended. Otherwise, something went wrong: {e}");
        }
        Ok(PollExit::Faulted(fault)) => error!("Polling stopped: {fault}"),
        Err(SessionError::Sink(e)) => error!("Failed to open virtual gamepad! {e}"),
        Err(e @ (SessionError::BaselineRead(_) | SessionError::BaselineDecode(_))) => {
            error!("{e}. Maybe this isn't a DDRPad?");
        }
        Err(e) => debug!("Not taking over device: {e}"),
    }

    let teardown = resources.teardown();
    info!(clean = teardown.is_clean(), "Session ended");

    SessionReport { outcome, teardown }
}

fn acquire_and_poll<P, F>(
    resources: &mut SessionResources<P, F::Sink>,
    factory: &F,
    config: &SessionConfig,
) -> Result<PollExit, SessionError>
where
    P: UsbPad,
    F: SinkFactory,
{
    resources
        .pad
        .detach_standard_drivers()
        .map_err(SessionError::DriverDetach)?;
    resources.drivers_detached = true;

    resources.pad.open().map_err(SessionError::Open)?;
    resources.opened = true;
    // the serial number is only readable through an open handle
    let identifier = resources.pad.identifier();
    debug!("Opened {identifier}");

    let interfaces = resources.pad.interfaces().map_err(SessionError::Descriptors)?;
    debug!("Interfaces: {:?}", interfaces.iter().map(|i| i.number).collect::<Vec<_>>());
    let selected = select_endpoint(&interfaces)?;

    resources
        .pad
        .claim_interface(selected.interface)
        .map_err(|source| SessionError::Claim {
            interface: selected.interface,
            source,
        })?;
    resources.claimed = Some(selected.interface);

    let sink = factory.open(&config.identity, &ddr_pad_capabilities())?;
    let sink = resources.sink.insert(sink);
    info!("Virtual gamepad ready, reading from endpoint {}", selected.endpoint);

    let frame = resources
        .pad
        .transfer_in(&selected.endpoint)
        .map_err(SessionError::BaselineRead)?;
    let baseline = decode(&frame)?;
    debug!("Baseline: {baseline}");

    Ok(poll_until_disconnect(
        &mut resources.pad,
        &selected.endpoint,
        sink,
        baseline,
        config.poll_interval,
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::devices::{Button, ButtonChanges, ControlFrame};
    use crate::error::{SinkError, TransportError};
    use crate::gamepad_device::{SinkFactory, SinkIdentity, VirtualSink};
    use crate::mappings::ButtonEventCode;
    use crate::transport::{
        AlternateInfo, EndpointDirection, EndpointInfo, InterfaceInfo, PadEndpoint, UsbPad,
    };
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted pad: hands out `frames` in order, then fails with `end_with`.
    pub struct FakePad {
        frames: VecDeque<ControlFrame>,
        pub end_with: rusb::Error,
        pub interfaces: Vec<InterfaceInfo>,
        /// Method name -> error to return from it.
        pub failures: Vec<(&'static str, rusb::Error)>,
        calls: Arc<Mutex<Vec<&'static str>>>,
        is_open: bool,
        identities: Arc<Mutex<Vec<String>>>,
    }

    impl FakePad {
        pub const ENDPOINT: PadEndpoint = PadEndpoint {
            interface: 0,
            endpoint: EndpointInfo {
                address: 0x81,
                direction: EndpointDirection::In,
                interrupt: true,
                max_packet_size: 64,
            },
        };

        pub fn with_frames(frames: impl IntoIterator<Item = ControlFrame>) -> Self {
            Self {
                frames: frames.into_iter().collect(),
                end_with: rusb::Error::NoDevice,
                interfaces: vec![InterfaceInfo {
                    number: Self::ENDPOINT.interface,
                    alternates: vec![AlternateInfo {
                        setting: 0,
                        endpoints: vec![Self::ENDPOINT.endpoint],
                    }],
                }],
                failures: Vec::new(),
                calls: Arc::default(),
                is_open: false,
                identities: Arc::default(),
            }
        }

        pub fn failing(mut self, method: &'static str, error: rusb::Error) -> Self {
            self.failures.push((method, error));
            self
        }

        pub fn frames_left(&self) -> usize {
            self.frames.len()
        }

        /// Shared view of the call log that outlives the pad.
        pub fn call_log(&self) -> Arc<Mutex<Vec<&'static str>>> {
            Arc::clone(&self.calls)
        }

        /// Every identifier handed out, in order.
        pub fn identity_log(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.identities)
        }

        fn call(&self, method: &'static str) -> Result<(), TransportError> {
            self.calls.lock().expect("call log").push(method);
            match self.failures.iter().find(|(name, _)| *name == method) {
                Some((_, error)) => Err(TransportError::Usb(*error)),
                None => Ok(()),
            }
        }
    }

    impl UsbPad for FakePad {
        fn identifier(&self) -> String {
            let identity = if self.is_open {
                "<fake serialNumber:FAKE0001>"
            } else {
                "<fake serialNumber:?>"
            };
            self.identities.lock().expect("identity log").push(identity.to_string());
            identity.to_string()
        }

        fn detach_standard_drivers(&mut self) -> Result<(), TransportError> {
            self.call("detach")
        }

        fn attach_standard_drivers(&mut self) -> Result<(), TransportError> {
            self.call("attach")
        }

        fn open(&mut self) -> Result<(), TransportError> {
            self.call("open")?;
            self.is_open = true;
            Ok(())
        }

        fn close(&mut self) -> Result<(), TransportError> {
            self.is_open = false;
            self.call("close")
        }

        fn interfaces(&self) -> Result<Vec<InterfaceInfo>, TransportError> {
            self.call("interfaces")?;
            Ok(self.interfaces.clone())
        }

        fn claim_interface(&mut self, _interface: u8) -> Result<(), TransportError> {
            self.call("claim")
        }

        fn release_interface(&mut self, _interface: u8) -> Result<(), TransportError> {
            self.call("release")
        }

        fn transfer_in(&mut self, _endpoint: &EndpointInfo) -> Result<ControlFrame, TransportError> {
            self.call("read")?;
            self.frames
                .pop_front()
                .ok_or(TransportError::Usb(self.end_with))
        }
    }

    #[derive(Debug, Clone)]
    pub enum SinkCall {
        Emit(ButtonChanges),
        Close,
    }

    /// Sink that remembers what it was asked to do. Clones share the log.
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        log: Arc<Mutex<Vec<SinkCall>>>,
        pub fail_emit: bool,
        pub fail_close: bool,
    }

    impl RecordingSink {
        pub fn failing_emit() -> Self {
            Self {
                fail_emit: true,
                ..Self::default()
            }
        }

        pub fn failing_close() -> Self {
            Self {
                fail_close: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<SinkCall> {
            self.log.lock().expect("sink log").clone()
        }

        pub fn emitted(&self) -> Vec<ButtonChanges> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    SinkCall::Emit(changes) => Some(changes),
                    SinkCall::Close => None,
                })
                .collect()
        }

        pub fn emitted_buttons(&self) -> Vec<(Vec<Button>, Vec<Button>)> {
            self.emitted()
                .into_iter()
                .map(|c| (c.pressed.into_iter().collect(), c.released.into_iter().collect()))
                .collect()
        }

        pub fn closed(&self) -> bool {
            self.calls().iter().any(|call| matches!(call, SinkCall::Close))
        }
    }

    fn broken() -> SinkError {
        SinkError::Io(std::io::Error::other("uinput gone"))
    }

    impl VirtualSink for RecordingSink {
        fn emit(&mut self, changes: &ButtonChanges) -> Result<(), SinkError> {
            if self.fail_emit {
                return Err(broken());
            }
            self.log.lock().expect("sink log").push(SinkCall::Emit(changes.clone()));
            Ok(())
        }

        fn close(self) -> Result<(), SinkError> {
            self.log.lock().expect("sink log").push(SinkCall::Close);
            if self.fail_close { Err(broken()) } else { Ok(()) }
        }
    }

    #[derive(Default)]
    pub struct RecordingFactory {
        pub sink: RecordingSink,
        pub fail_open: bool,
        pub opened: Mutex<Vec<(SinkIdentity, Vec<ButtonEventCode>)>>,
    }

    impl SinkFactory for RecordingFactory {
        type Sink = RecordingSink;

        fn open(
            &self,
            identity: &SinkIdentity,
            capabilities: &[ButtonEventCode],
        ) -> Result<RecordingSink, SinkError> {
            if self.fail_open {
                return Err(broken());
            }
            self.opened
                .lock()
                .expect("factory log")
                .push((*identity, capabilities.to_vec()));
            Ok(self.sink.clone())
        }
    }
}

use crate::devices::{ButtonState, decode, diff};
use crate::error::{PollFault, TransportError};
use crate::gamepad_device::VirtualSink;
use crate::logger::hex_dump;
use crate::transport::{EndpointInfo, UsbPad};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// How a polling loop ended. Both variants lead to the same teardown.
#[derive(Debug)]
pub enum PollExit {
    /// The transport reported the device as gone.
    Unplugged(TransportError),
    Faulted(PollFault),
}

/// Read, decode, diff, emit, sleep. Returns on the first failure.
///
/// `previous` must come from the baseline read so the first diff does not
/// replay every held button as a fresh press.
pub fn poll_until_disconnect<P, S>(
    pad: &mut P,
    endpoint: &EndpointInfo,
    sink: &mut S,
    mut previous: ButtonState,
    interval: Duration,
) -> PollExit
where
    P: UsbPad + ?Sized,
    S: VirtualSink,
{
    loop {
        let frame = match pad.transfer_in(endpoint) {
            Ok(frame) => frame,
            Err(e) if e.is_no_device() => return PollExit::Unplugged(e),
            Err(e) => return PollExit::Faulted(PollFault::Read(e)),
        };
        trace!(frame = %hex_dump(frame.as_bytes()), "control frame");

        let current = match decode(&frame) {
            Ok(state) => state,
            Err(e) => return PollExit::Faulted(e.into()),
        };

        if current.scheme() != previous.scheme() {
            return PollExit::Faulted(PollFault::SchemeChanged {
                previous: previous.scheme(),
                current: current.scheme(),
            });
        }

        if current != previous {
            let changes = diff(&current, &previous);
            debug!(
                "Newly pressed: {:?}, Newly released: {:?}",
                changes.pressed, changes.released
            );
            if let Err(e) = sink.emit(&changes) {
                return PollExit::Faulted(e.into());
            }
            previous = current;
        }

        thread::sleep(interval);
    }
}

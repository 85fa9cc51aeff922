//! Finding pads: the ones already plugged in, and the ones plugged in later.
//!
//! Producers (startup enumeration, the libusb hotplug callback) push into one
//! unbounded queue; [`dispatch_pads`] drains it and starts a session per pad.
use crate::error::DiscoveryError;
use crate::gamepad_device::SinkFactory;
use crate::protocol::{DDR_PAD_PRODUCT_ID, DDR_PAD_VENDOR_ID, matches_ddr_pad};
use crate::session::{SessionConfig, SessionReport, run_session};
use crate::transport::{RusbPad, UsbPad};
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Producer side of the pad queue. Cheap to clone, usable from any thread.
#[derive(Debug)]
pub struct PadSender<D> {
    tx: mpsc::UnboundedSender<D>,
}

impl<D> Clone for PadSender<D> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<D> PadSender<D> {
    /// Returns false once the dispatcher is gone.
    pub fn enqueue(&self, pad: D) -> bool {
        self.tx.send(pad).is_ok()
    }
}

pub fn pad_queue<D>() -> (PadSender<D>, mpsc::UnboundedReceiver<D>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PadSender { tx }, rx)
}

/// Hands every queued pad to `start` without waiting for its session.
/// Returns when all senders are dropped and the queue is drained.
pub async fn dispatch_pads<D, F>(mut pads: mpsc::UnboundedReceiver<D>, mut start: F)
where
    F: FnMut(D),
{
    debug!("Waiting on unhandled DDRPads...");
    while let Some(pad) = pads.recv().await {
        start(pad);
    }
    debug!("Pad queue closed");
}

/// Runs a session on its own OS thread. Reads block, so sessions stay off the
/// async runtime.
pub fn spawn_session<P, F>(
    pad: P,
    factory: Arc<F>,
    config: SessionConfig,
) -> io::Result<JoinHandle<SessionReport>>
where
    P: UsbPad + 'static,
    F: SinkFactory + 'static,
{
    let name = format!("pad {}", pad.identifier());
    debug!("Dispatching session for {name}");
    thread::Builder::new()
        .name(name)
        .spawn(move || run_session(pad, factory.as_ref(), &config))
}

fn is_ddr_pad<T: UsbContext>(device: &Device<T>) -> bool {
    device
        .device_descriptor()
        .is_ok_and(|descriptor| matches_ddr_pad(descriptor.vendor_id(), descriptor.product_id()))
}

/// Queues every matching pad that is already attached. Returns how many.
pub fn collect_connected_pads(
    context: &Context,
    queue: &PadSender<RusbPad>,
) -> Result<usize, DiscoveryError> {
    let mut found = 0;
    for device in context.devices()?.iter().filter(is_ddr_pad) {
        if queue.enqueue(RusbPad::new(device)) {
            found += 1;
        }
    }
    info!("Found {found} connected DDRPad(s)");
    Ok(found)
}

struct PadWatcher {
    queue: PadSender<RusbPad>,
}

/// Queues a newly connected device if its ids are a pad's. The registration
/// already filters on the same ids; a callback may still see other devices.
fn queue_arrival<D>(
    queue: &PadSender<D>,
    vendor_id: u16,
    product_id: u16,
    pad: impl FnOnce() -> D,
) -> bool {
    if !matches_ddr_pad(vendor_id, product_id) {
        debug!("Ignoring arrival of {vendor_id:04x}:{product_id:04x}");
        return false;
    }
    if !queue.enqueue(pad()) {
        warn!("Pad queue closed, ignoring newly connected DDRPad");
        return false;
    }
    true
}

impl Hotplug<Context> for PadWatcher {
    fn device_arrived(&mut self, device: Device<Context>) {
        let Ok(descriptor) = device.device_descriptor() else {
            return;
        };
        let (bus, address) = (device.bus_number(), device.address());
        let queued = queue_arrival(
            &self.queue,
            descriptor.vendor_id(),
            descriptor.product_id(),
            || RusbPad::new(device),
        );
        if queued {
            info!("DDRPad connected on bus {bus:03} address {address:03}");
        }
    }

    fn device_left(&mut self, device: Device<Context>) {
        debug!(
            "USB device left bus {:03} address {:03}",
            device.bus_number(),
            device.address()
        );
    }
}

/// Keeps the hotplug callback registered while alive.
pub struct HotplugWatch {
    _registration: Registration<Context>,
    _events: JoinHandle<()>,
}

/// Registers for connect notifications of new pads. `None` when the host's
/// libusb cannot do hotplug; only pads present at startup are served then.
pub fn watch_for_new_pads(
    context: &Context,
    queue: PadSender<RusbPad>,
) -> Result<Option<HotplugWatch>, DiscoveryError> {
    if !rusb::has_hotplug() {
        warn!("libusb has no hotplug support, newly connected DDRPads will be ignored");
        return Ok(None);
    }

    let callback: Box<dyn Hotplug<Context>> = Box::new(PadWatcher { queue });
    let mut builder = HotplugBuilder::new();
    builder
        .vendor_id(DDR_PAD_VENDOR_ID)
        .product_id(DDR_PAD_PRODUCT_ID)
        .enumerate(false);
    let registration = builder.register(context, callback)?;

    // callbacks only fire from inside handle_events
    let events_context = context.clone();
    let events = thread::Builder::new()
        .name("usb-events".to_string())
        .spawn(move || {
            loop {
                if let Err(e) = events_context.handle_events(None) {
                    warn!("USB event loop stopped: {e}");
                    break;
                }
            }
        })?;

    Ok(Some(HotplugWatch {
        _registration: registration,
        _events: events,
    }))
}

use clap::Parser;
use ddrpad_driver::config::Args;
use ddrpad_driver::discovery::{
    collect_connected_pads, dispatch_pads, pad_queue, spawn_session, watch_for_new_pads,
};
use ddrpad_driver::gamepad_device::UinputFactory;
use ddrpad_driver::logger;
use rusb::Context;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(args.verbosity());
    info!("Starting DDRPad driver...");

    let context = Context::new()?;
    let (queue, pads) = pad_queue();

    collect_connected_pads(&context, &queue)?;
    let _watch = if args.no_hotplug {
        None
    } else {
        watch_for_new_pads(&context, queue.clone())?
    };
    drop(queue);

    let factory = Arc::new(UinputFactory);
    let config = args.session_config();
    info!(poll_interval = ?config.poll_interval, "Waiting for DDRPads");

    tokio::spawn(dispatch_pads(pads, move |pad| {
        if let Err(e) = spawn_session(pad, Arc::clone(&factory), config) {
            error!("Failed to start session thread: {e}");
        }
    }));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down DDRPad driver...");

    Ok(())
}

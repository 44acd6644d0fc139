//! Control server demo - the full appliance RPC surface on a Unix
//! socket, backed by simulated hardware.
//!
//! ```sh
//! cargo run --example control_server
//! # then, from another terminal:
//! printf '{"jsonrpc":"2.0","method":"ping","id":1}\n' | nc -U /tmp/kvmlink.sock
//! ```

use std::sync::Arc;

use kvmlink::device::sim::{SimUpdater, SimUsbGadget, SimVideoControl};
use kvmlink::device::{register_control_methods, DeviceContext};
use kvmlink::server::ServerBuilder;
use kvmlink::state::ConfigStore;
use kvmlink::transport::ControlListener;
use kvmlink::EventSender;

const SOCKET_PATH: &str = "/tmp/kvmlink.sock";
const CONFIG_PATH: &str = "/tmp/kvmlink-config.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvmlink=debug".into()),
        )
        .init();

    let events = EventSender::new();
    let ctx = DeviceContext::new(
        "kvm-demo-0001",
        ConfigStore::load(CONFIG_PATH)?,
        Arc::new(SimVideoControl::new()),
        Arc::new(SimUsbGadget::new()),
        Arc::new(SimUpdater::new("0.3.1", "0.4.0")),
        events.clone(),
    );

    let server = Arc::new(
        ServerBuilder::new()
            .table(register_control_methods)
            .build(ctx),
    );

    let listener = ControlListener::bind(SOCKET_PATH).await?;
    tracing::info!("control socket listening at {SOCKET_PATH}");

    server.serve(listener, events).await?;
    Ok(())
}

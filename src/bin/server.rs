//! Server entry point: bind the shared socket and dispatch until killed.

use std::net::SocketAddr;
use udpsim::{ServerDispatcher, SimConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();

    let addr: SocketAddr = match (args.get(1), args.get(2)) {
        (Some(host), Some(port)) => format!("{host}:{port}").parse()?,
        (None, None) => "127.0.0.1:9999".parse()?,
        _ => {
            eprintln!("Usage: {} [<host_ip> <host_port>] [loss_probability]", args[0]);
            std::process::exit(1);
        }
    };

    let mut config = SimConfig::default();
    if let Some(loss) = args.get(3) {
        config = config.loss_probability(loss.parse()?);
    }
    config.validate()?;

    let dispatcher = ServerDispatcher::bind(addr, config).await?;
    dispatcher.run().await?;
    Ok(())
}

//! Client entry point: run one session against a server and print the
//! end-of-run summary.

use std::net::SocketAddr;
use udpsim::{ClientSession, SimConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();

    let addr: SocketAddr = match (args.get(1), args.get(2)) {
        (Some(host), Some(port)) => match format!("{host}:{port}").parse() {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("invalid server address: {e}");
                eprintln!("Usage: {} <server_ip> <server_port>", args[0]);
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("Usage: {} <server_ip> <server_port>", args[0]);
            std::process::exit(1);
        }
    };

    let mut session = ClientSession::bind(addr, SimConfig::default()).await?;
    let report = match session.run().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("could not establish a connection with {addr}: {e}");
            std::process::exit(1);
        }
    };

    println!("\nSummary:");
    println!("packets received: {}", report.received);
    println!("loss rate: {:.2}%", report.rtt.loss_rate * 100.0);
    println!(
        "max RTT: {:.2}ms, min RTT: {:.2}ms, mean RTT: {:.2}ms, RTT stddev: {:.2}ms",
        report.rtt.max_ms, report.rtt.min_ms, report.rtt.mean_ms, report.rtt.stddev_ms
    );
    println!("total elapsed: {:.2}s", report.elapsed.as_secs_f64());

    Ok(())
}

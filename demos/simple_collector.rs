//! Simple telemetry collector with synthetic producers
//!
//! Run with: cargo run --example simple_collector [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_collector                    # binds to 127.0.0.1:5050
//!   cargo run --example simple_collector localhost:5151     # binds to 127.0.0.1:5151
//!   cargo run --example simple_collector 0.0.0.0            # binds to 0.0.0.0:5050
//!
//! Set `TELEMETRY_TOKEN` to require `Authorization: Bearer <token>` on REST calls.
//!
//! ## Reading history
//!
//!   curl http://localhost:5050/api/status
//!   curl "http://localhost:5050/api/console?offset=0&limit=20"
//!   curl http://localhost:5050/api/network/<id>
//!
//! ## Live stream
//!
//!   websocat ws://localhost:5050/ws

use std::net::SocketAddr;
use std::time::Duration;

use telemetry_collector::record::{MemoryUsage, NetworkTiming, ThreadCounts};
use telemetry_collector::server::config::DEFAULT_PORT;
use telemetry_collector::{
    ApplicationInfo, Collector, ConsoleEntry, LogLevel, NetworkEntry, PerformanceEntry,
    ServerConfig, StoreConfig, TelemetryServer,
};

/// Parse a bind address argument
///
/// Accepts "IP:PORT", a bare IP (default port) or "localhost".
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_collector [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 127.0.0.1:{DEFAULT_PORT})");
}

/// Emit a fake request, log line and resource sample every tick
async fn produce(collector: Collector) {
    let mut tick = tokio::time::interval(Duration::from_millis(750));
    let max_body = collector.config().max_body_bytes;
    let mut n: u64 = 0;

    loop {
        tick.tick().await;
        n += 1;

        let status = if n % 7 == 0 { 503 } else { 200 };
        let entry = NetworkEntry::builder("GET", format!("https://api.example.com/orders/{n}"))
            .status(status)
            .request_header("accept", "application/json")
            .response_header("content-type", "application/json")
            .response_body(&format!("{{\"order\":{n},\"items\":[]}}"), max_body)
            .timing(NetworkTiming {
                wait_ms: 12.0 + (n % 5) as f64,
                total_ms: 20.0 + (n % 9) as f64,
                ..Default::default()
            })
            .build();
        let entry = collector.add_network(entry);

        let level = if status >= 500 {
            LogLevel::Error
        } else {
            LogLevel::Information
        };
        collector.add_log(ConsoleEntry::new(
            level,
            "orders",
            format!("GET /orders/{n} -> {status} ({})", entry.id),
        ));

        if n % 4 == 0 {
            let memory = MemoryUsage {
                working_set_bytes: 48 * 1024 * 1024 + n * 4096,
                ..Default::default()
            };
            let threads = ThreadCounts {
                total: 8,
                busy: (n % 8) as u32,
                available: 8 - (n % 8) as u32,
            };
            collector.add_performance(
                PerformanceEntry::new((n % 40) as f64 + 2.5, memory, threads)
                    .with_counter("requests", n),
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }
    if let Ok(token) = std::env::var("TELEMETRY_TOKEN") {
        config = config.auth_token(token);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telemetry_collector=debug".parse()?)
                .add_directive("simple_collector=debug".parse()?),
        )
        .init();

    let collector = Collector::new(StoreConfig::default())?;
    collector.set_application_info(
        ApplicationInfo::capture("simple_collector", env!("CARGO_PKG_VERSION"))
            .environment("development")
            .property("demo", "true"),
    );

    let server = TelemetryServer::new(config, &collector);
    println!("Telemetry server on http://{}", server.bind_addr());
    println!("Live stream on ws://{}/ws", server.bind_addr());
    println!();

    let producer = tokio::spawn(produce(collector.clone()));

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    producer.abort();
    Ok(())
}

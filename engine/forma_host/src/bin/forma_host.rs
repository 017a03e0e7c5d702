//! Forma compiler host daemon.
//!
//! A long-lived process that serves compile requests over TCP. Library
//! users rarely start it by hand: `HostEndpoint::ensure_up` spawns one on
//! demand. Running it directly keeps a host in the foreground, which is
//! handy with `RUST_LOG=debug`.

use forma_host::{HostServer, DEFAULT_PORT, HOST_VERSION};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut addr = format!("127.0.0.1:{DEFAULT_PORT}");
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        if arg == "--addr" && i + 1 < args.len() {
            addr.clone_from(&args[i + 1]);
            i += 2;
            continue;
        }
        if let Some(value) = arg.strip_prefix("--addr=") {
            addr = value.to_owned();
        } else if arg == "--help" || arg == "-h" {
            print_usage();
            return;
        } else if arg == "--version" || arg == "-v" {
            println!("forma-host {HOST_VERSION}");
            return;
        } else {
            eprintln!("error: unknown argument '{arg}'");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
        i += 1;
    }

    init_tracing();

    let server = match HostServer::bind(&addr) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = server.serve() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn print_usage() {
    println!("Forma compiler host (out-of-process unit compilation)");
    println!();
    println!("Usage: forma-host [options]");
    println!();
    println!("Options:");
    println!("  --addr <host:port>  Address to listen on (default: 127.0.0.1:{DEFAULT_PORT})");
    println!("  --version, -v       Show version information");
    println!("  --help, -h          Show this help message");
    println!();
    println!("The host serves one compile per connection and keeps running");
    println!("until a client sends it a shutdown request.");
}

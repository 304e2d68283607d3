use multicast_probe::{load_message, send_message};

use std::net::Ipv4Addr;
use std::path::Path;
use std::process;

fn main() {
    init_logger();
    process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        eprintln!("Usage: {} MULTICAST_IP PORT INTERFACE_IP MESSAGE_FILE", args[0]);
        return 1
    }

    let multicast: Ipv4Addr = match args[1].parse() {
        Ok(addr) => addr,
        Err(_) => {
            eprintln!("Error: invalid multicast IP: {}", args[1]);
            return 2
        }
    };

    let port: u16 = match args[2].parse() {
        Ok(port) => port,
        Err(_) => {
            eprintln!("Error: invalid port: {}", args[2]);
            return 3
        }
    };

    let interface: Ipv4Addr = match args[3].parse() {
        Ok(addr) => addr,
        Err(_) => {
            eprintln!("Error: invalid interface IP: {}", args[3]);
            return 4
        }
    };

    let payload = match load_message(Path::new(&args[4])) {
        Ok(payload) => payload,
        Err(err) => {
            eprintln!("Error: {}", err);
            return err.exit_code()
        }
    };

    match send_message(multicast, port, interface, &payload) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("Error: {}", err);
            err.exit_code()
        }
    }
}

fn init_logger() {
    let level = std::env::var("MCAST_LOG")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(log::LevelFilter::Warn);

    fern::Dispatch::new()
        .level(level)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%H:%M:%S%.6f"),
                record.level(),
                record.target(),
                message,
            ))
        })
        .chain(std::io::stderr())
        .apply()
        .ok();
}

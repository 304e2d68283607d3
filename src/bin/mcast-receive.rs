use multicast_probe::{parse_all, provision, Monitor, MonitorEvent};

use std::process;
use std::time::UNIX_EPOCH;

fn main() {
    init_logger();
    process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: mcast-receive MULTICAST_IP:PORT:INTERFACE_IP[,INTERFACE_IP...] ...");
        return 1
    }

    let endpoints = match parse_all(&args) {
        Ok(endpoints) => endpoints,
        Err(err) => {
            eprintln!("{}", err);
            return 2
        }
    };

    let sockets = match provision(&endpoints) {
        Ok(sockets) => sockets,
        Err(err) => {
            eprintln!("{}", err);
            return 3
        }
    };

    for (number, group) in sockets.iter().enumerate() {
        println!(
            "Multicast address number {}: created file descriptor {} on {} interfaces",
            number + 1,
            group.raw_fd(),
            group.joined_interfaces(),
        );
    }

    let mut monitor = match Monitor::new(sockets) {
        Ok(monitor) => monitor,
        Err(err) => {
            eprintln!("Error registering sockets for polling: {}", err);
            return 3
        }
    };

    let handle = monitor.shutdown_handle();
    match ctrlc::set_handler(move || handle.shutdown()) {
        Ok(()) => monitor.run(report_event),
        Err(err) => eprintln!("Unable to set interrupt handler: {}", err),
    }

    println!("\nClosing sockets");
    monitor.close();
    0
}

fn report_event(event: MonitorEvent) {
    match event {
        MonitorEvent::Datagram { fd, len, saturated, timestamp } => {
            let stamp = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
            println!(
                "{}.{:06} read {} bytes{} from socket {}",
                stamp.as_secs(),
                stamp.subsec_micros(),
                len,
                if saturated { " (or more)" } else { "" },
                fd,
            );
        }
        MonitorEvent::SocketError { fd } => eprintln!("Error condition on socket {}", fd),
        MonitorEvent::SocketClosed { fd } => eprintln!("Hang-up on socket {}", fd),
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

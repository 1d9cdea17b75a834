use std::env;
use std::process;
use std::sync::Arc;

use getopts::Options;

use tinyns::dns::authority::Authority;
use tinyns::dns::context::ServerContext;
use tinyns::dns::server::{DnsServer, DnsUdpServer};

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options] PORT", program);
    print!("{}", opts.usage(&brief));
}

/// Main entry point for the tinyns server
fn main() {
    if let Err(e) = simple_logger::init() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt(
        "f",
        "master-file",
        "The master file holding the records to serve (default: master.txt)",
        "FILE",
    );
    opts.optopt(
        "d",
        "delay",
        "Delay each response by a random number of seconds below this bound",
        "SECONDS",
    );
    opts.optopt(
        "l",
        "listen",
        "Address to bind (default: 127.0.0.1)",
        "HOST",
    );

    let opt_matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{}", f);
            print_usage(&program, opts);
            process::exit(1);
        }
    };

    if opt_matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }

    let port = match opt_matches.free.first().map(|p| p.parse::<u16>()) {
        Some(Ok(port)) => port,
        Some(Err(e)) => {
            eprintln!("Invalid port: {}", e);
            process::exit(1);
        }
        None => {
            print_usage(&program, opts);
            process::exit(1);
        }
    };

    let max_delay_secs = match opt_matches.opt_str("d").map(|d| d.parse::<u64>()) {
        Some(Ok(secs)) => secs,
        Some(Err(e)) => {
            eprintln!("Invalid delay: {}", e);
            process::exit(1);
        }
        None => 0,
    };

    let master_file = opt_matches
        .opt_str("f")
        .unwrap_or_else(|| "master.txt".to_string());

    let mut authority = Authority::new();
    if let Err(e) = authority.load_file(&master_file) {
        log::error!("Failed to load master file {}: {}", master_file, e);
        process::exit(1);
    }

    let mut context = ServerContext::new(authority);
    context.dns_port = port;
    context.max_delay_secs = max_delay_secs;
    if let Some(host) = opt_matches.opt_str("l") {
        context.listen_host = host;
    }

    let context = Arc::new(context);
    log::info!("Listening on port {}", context.dns_port);
    log::info!("Maximum response delay: {}s", context.max_delay_secs);

    let udp_server = match DnsUdpServer::bind(context.clone()) {
        Ok(server) => server,
        Err(e) => {
            log::error!("Failed to bind UDP listener: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = udp_server.run_server() {
        log::error!("Failed to start UDP server: {}", e);
        process::exit(1);
    }

    loop {
        std::thread::park();
    }
}

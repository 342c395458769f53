//! NJE client CLI binary.
//!
//! # Usage
//!
//! ```bash
//! # Plain handshake, then immediate signoff
//! nje-cli host.example.com 175 REMOTE LOCAL
//!
//! # Send an operator command and print the reply
//! nje-cli -d host.example.com 175 REMOTE LOCAL secret --command '$DA'
//!
//! # Replay a captured byte dump instead of connecting
//! nje-cli --offline-replay capture.bin
//! ```

use std::{fs, path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use nje_client::{Client, ClientConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// NJE protocol client
#[derive(Parser, Debug)]
#[command(name = "nje-cli")]
#[command(about = "NJE (IBM Network Job Entry) TCP/IP protocol client")]
#[command(version)]
struct Args {
    /// Increase debug verbosity; repeatable (-d, -dd, -ddd)
    #[arg(short = 'd', action = clap::ArgAction::Count)]
    debug: u8,

    /// Remote host to connect to
    host: Option<String>,

    /// Remote port
    port: Option<u16>,

    /// RHOST: the remote node's name
    rhost: Option<String>,

    /// OHOST: the local node's name
    ohost: Option<String>,

    /// Signon password
    password: Option<String>,

    /// Connect/handshake timeout, in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Send an operator command instead of just signing on
    #[arg(long)]
    command: Option<String>,

    /// Send a console message instead of just signing on
    #[arg(long)]
    message: Option<String>,

    /// Submit a JCL deck read from this file
    #[arg(long)]
    submit_jcl: Option<PathBuf>,

    /// Replay a captured NJE byte dump instead of connecting live
    #[arg(long)]
    offline_replay: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "nje-cli failed");
            ExitCode::FAILURE
        },
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &args.offline_replay {
        let data = fs::read(path)?;
        let mut client = Client::new(ClientConfig::default());
        client.analyze(&data)?;
        tracing::info!(
            nmr = client.nmr_messages().len(),
            sysin = client.sysin_records().len(),
            sysout = client.sysout_records().len(),
            "offline replay complete"
        );
        return Ok(());
    }

    let host = args.host.as_deref().ok_or("missing <host> argument")?;
    let port = args.port.ok_or("missing <port> argument")?;
    let rhost = args.rhost.clone().ok_or("missing <rhost> argument")?;
    let ohost = args.ohost.clone().ok_or("missing <ohost> argument")?;

    let config = ClientConfig {
        rhost,
        ohost,
        password: args.password.clone().unwrap_or_default(),
        handshake_timeout: Duration::from_secs(args.timeout),
        ..ClientConfig::default()
    };

    let mut client = Client::new(config);
    client.session(host, port, Duration::from_secs(args.timeout))?;
    tracing::info!(%host, port, "signed on");

    if let Some(command) = &args.command {
        match client.send_command(command)? {
            #[allow(clippy::print_stdout)]
            Some(reply) => println!("{reply}"),
            None => tracing::warn!("no reply received"),
        }
        return Ok(());
    }

    if let Some(message) = &args.message {
        client.send_message(message, None)?;
        return Ok(());
    }

    if let Some(path) = &args.submit_jcl {
        let jcl_text = fs::read_to_string(path)?;
        client.send_jcl(&jcl_text, 1, "ibmuser", "sys1", [0; 8])?;
        return Ok(());
    }

    client.signoff()?;
    Ok(())
}

// Keyboard teleop CLI: W/S drive, A/D turn, X stop, G status, Q quit
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use locomo_host::command::{CommandSource, Teleop};
use locomo_host::config::{Config, ConfigError};
use locomo_host::link::{Link, SerialLink};
use locomo_host::messages::Message;
use locomo_host::session::{Controller, run_receiver};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Key poll interval; also bounds how long a closed link goes unnoticed
const INPUT_POLL: Duration = Duration::from_millis(20);

#[derive(Parser, Debug)]
#[command(name = "locomo-teleop", about = "Drive the robot from the keyboard through the serial dongle")]
struct Args {
    /// Serial device of the dongle (overrides the config file)
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// JSON config file with `serial` and `robot` sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Forward/backward speed in m/s
    #[arg(long)]
    max_velocity: Option<f32>,

    /// Turn rate in rad/s
    #[arg(long)]
    max_angular_rate: Option<f32>,

    /// Print status reports to stdout as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr (set RUST_LOG=debug for frame dumps)
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            &std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default(),
        ))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// RUST_LOG directives, falling back to `info` when none are given
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

async fn run(args: Args) -> Result<(), BoxError> {
    let config = load_config(&args)?;

    info!("Connecting to dongle at {}...", config.serial.port);
    let link = Arc::new(SerialLink::connect(&config.serial)?);

    let json = args.json;
    let receiver = {
        let link = Arc::clone(&link);
        tokio::task::spawn_blocking(move || run_receiver(&*link, |message| report(message, json)))
    };

    let teleop = Teleop::new(config.robot.max_velocity, config.robot.max_angular_rate);
    let controller = Controller::new(teleop, Arc::clone(&link));
    info!("Controls: W/A/S/D to move, X to stop, G for status, Q to quit");

    enable_raw_mode()?;
    let input = tokio::task::spawn_blocking(move || run_input(controller)).await;
    disable_raw_mode()?;

    // Closing the link is the receiver's stop signal
    link.close();
    receiver.await??;
    input?
}

fn load_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = Config::load(args.config.as_deref())?;

    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(max_velocity) = args.max_velocity {
        config.robot.max_velocity = max_velocity;
    }
    if let Some(max_angular_rate) = args.max_angular_rate {
        config.robot.max_angular_rate = max_angular_rate;
    }

    config.validate()?;
    Ok(config)
}

fn run_input<S: CommandSource, L: Link>(mut controller: Controller<S, L>) -> Result<(), BoxError> {
    loop {
        if !controller.link().is_open() {
            warn!("Link closed, leaving teleop");
            break;
        }

        if !event::poll(INPUT_POLL)? {
            continue;
        }
        let Event::Key(KeyEvent {
            code,
            kind,
            modifiers,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }

        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => break,
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char('g') => match controller.request_status() {
                Ok(_) => info!("Requested status"),
                Err(e) => warn!("Status request failed: {}", e),
            },
            KeyCode::Char(key) => match controller.handle_input(key) {
                Ok((cmd, sent)) if sent.is_complete() => {
                    info!("Sent: vx={:.2}, wz={:.2}", cmd.vx, cmd.wz)
                }
                Ok(_) => {} // short write already logged
                Err(e) => warn!("Send failed: {}", e),
            },
            _ => {}
        }
    }

    Ok(())
}

fn report(message: Message, json: bool) {
    match message {
        Message::ReportStatus(status) if json => match serde_json::to_string(&status) {
            // Raw mode needs an explicit carriage return
            Ok(line) => print!("{}\r\n", line),
            Err(e) => warn!("Failed to serialize status: {}", e),
        },
        Message::ReportStatus(status) => info!(
            "Status: voltage={:.2}V current={:.2}A yaw={:.3}rad",
            status.voltage, status.current, status.yaw
        ),
        other => info!("Received {:?}", other),
    }
}

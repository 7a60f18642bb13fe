use crate::cli::args::{unescape, Args, Command, ConfigArgs, ConfigCommand, SessionArgs};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::session::SessionManager;
use crate::domain::config::{Address, Options, RawComConfig};
use crate::domain::error::{RawComError, RawComResult};
use crate::infrastructure::{config::ConfigManager, logging::init_logging, serial::available_ports};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Execute CLI command
pub async fn execute_command(args: Args) -> RawComResult<()> {
    let writer = ConsoleWriter::new(args.output);

    // Load configuration using ConfigManager
    let config_manager = ConfigManager::new()?;
    let config = match &args.config {
        Some(path) => config_manager.load_config_from_path(path)?,
        None => config_manager.load_config()?,
    };

    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)?;
    }

    match args.command {
        Command::Tcp(tcp) => {
            let mut address = Address::tcp(tcp.host, tcp.port);
            address.connect_timeout_ms = tcp.connect_timeout;
            if let Some(name) = tcp.name {
                address.name = name;
            }
            run_session(address, Options::default(), &tcp.session, &tcp.commands, &config, &writer).await
        }
        Command::Serial(serial) => {
            let mut address = Address::serial(serial.path).with_baud_rate(serial.baud);
            address.data_bits = serial.data_bits;
            address.stop_bits = serial.stop_bits;
            address.parity = serial.parity.into();
            if let Some(name) = serial.name {
                address.name = name;
            }
            run_session(address, Options::default(), &serial.session, &serial.commands, &config, &writer)
                .await
        }
        Command::Device(device) => {
            let profile = config.find_device(&device.profile).ok_or_else(|| {
                RawComError::InvalidInput(format!("No device profile named '{}'", device.profile))
            })?;
            run_session(
                profile.address.clone(),
                profile.options.clone(),
                &device.session,
                &device.commands,
                &config,
                &writer,
            )
            .await
        }
        Command::Ports => {
            writer.write_ports(&available_ports()?)?;
            Ok(())
        }
        Command::Config(config_args) => execute_config_command(config_args, &writer, &config, &config_manager),
        Command::Version => {
            writer.write_message(&format!("rawcom {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Send `commands` through one session and print every event until the queue drained
/// and the listen window passed, or Ctrl+C.
async fn run_session(
    address: Address,
    mut options: Options,
    session_args: &SessionArgs,
    commands: &[String],
    config: &RawComConfig,
    writer: &ConsoleWriter,
) -> RawComResult<()> {
    session_args.apply_to(&mut options)?;
    let listen = Duration::from_millis(session_args.listen.unwrap_or(config.global.listen_ms));

    let manager = SessionManager::default();
    let session = manager.create_session(address, options).await?;
    let mut events = session.subscribe();

    session.process(commands.iter().map(|command| unescape(command)));

    let mut draining = true;
    let mut deadline = Instant::now();
    loop {
        tokio::select! {
            _ = session.wait_idle(), if draining => {
                debug!("All commands sent, listening for {:?}", listen);
                draining = false;
                deadline = Instant::now() + listen;
            }
            _ = tokio::time::sleep_until(deadline), if !draining => break,
            event = events.recv() => match event {
                Ok(event) => writer.write_event(&event)?,
                Err(RecvError::Lagged(skipped)) => warn!("Output fell behind, {} events skipped", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }

    manager.close_all_sessions().await;
    Ok(())
}

fn execute_config_command(
    args: ConfigArgs,
    writer: &ConsoleWriter,
    config: &RawComConfig,
    config_manager: &ConfigManager,
) -> RawComResult<()> {
    match args.command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
        }
        ConfigCommand::Init { dir, global } => {
            if global {
                let global_path = config_manager.get_global_config_path();
                config_manager.save_config_to_path(global_path, &RawComConfig::default())?;
                writer.write_message(&format!(
                    "Global configuration initialized at '{}'",
                    global_path.display()
                ))?;
            } else {
                let dir = match dir {
                    Some(dir) => dir,
                    None => std::env::current_dir().map_err(|e| {
                        RawComError::config(format!("Failed to get current directory: {}", e))
                    })?,
                };
                let written = config_manager.init_project_config(&dir)?;
                writer.write_message(&format!(
                    "Project configuration initialized at '{}'",
                    written.display()
                ))?;
            }
        }
        ConfigCommand::Devices => {
            writer.write_devices(&config.devices)?;
        }
    }
    Ok(())
}

//! z2m-coord - Zigbee coordinator identification tool

mod report;
mod settings;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coord_detect::{
    classify, default_device_path, install_tool, CoordinatorProber, DeviceScanner, InstallerConfig,
    OsEnv, ProbeConfig,
};
use tracing::{debug, info};

use report::{resolve_target, GuessReport, ProbeReport, NO_DEVICES};
use settings::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about = "Identify Zigbee coordinator adapters (zstack / ember)", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial devices
    #[command(alias = "d")]
    Devices {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Determine the coordinator driver (zstack / ember)
    #[command(alias = "coord")]
    Coordinator {
        /// Device path or alias (default: best enumerated device)
        device: Option<String>,
        /// Actively probe the device instead of guessing from USB ids
        #[arg(short, long)]
        probe: bool,
        /// Install universal-silabs-flasher first
        #[arg(long, alias = "install-usf")]
        install_flasher: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Save the coordinator device path
    SetDevice {
        path: String,
    },
    /// Show the settings file and its values
    Config,
}

fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            "z2m_coord=debug,coord_detect=debug,znp_protocol=debug,coord_sim=debug".into()
        } else {
            "z2m_coord=info,coord_detect=info,znp_protocol=info,coord_sim=info".into()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!("{:?}", cli.command);

    let settings = Settings::load();
    let env = OsEnv::new();

    match cli.command {
        Command::Devices { json } => {
            let devices = DeviceScanner::new(env).enumerate().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else {
                print!("{}", report::render_devices(&devices));
            }
        }

        Command::Coordinator {
            device,
            probe,
            install_flasher,
            json,
        } => {
            let installed = if install_flasher {
                let config = InstallerConfig {
                    executable: settings.flasher_tool.clone(),
                    ..InstallerConfig::default()
                };
                let result = install_tool(&env, &config).await;
                if !json {
                    print!("{}", report::render_install(&result));
                } else if !probe {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                if !probe {
                    return Ok(());
                }
                Some(result)
            } else {
                None
            };

            let devices = DeviceScanner::new(env).enumerate().await;
            let Some(target) = resolve_target(
                &devices,
                device.as_deref(),
                settings.zigbee_device.as_deref(),
            ) else {
                if json {
                    eprintln!("{}", NO_DEVICES);
                    if let Some(result) = &installed {
                        println!("{}", serde_json::to_string_pretty(result)?);
                    }
                } else {
                    println!("{}", NO_DEVICES);
                }
                return Ok(());
            };
            info!("Using {}", target.path);

            if probe {
                let config = ProbeConfig {
                    baud_rate: settings.probe_baud_rate,
                    ..ProbeConfig::default()
                };
                let prober =
                    CoordinatorProber::with_config(config, env).with_flasher(settings.flasher_tool.as_str());
                let result = prober.probe(&target.device, &target.path).await;
                if json {
                    let report = ProbeReport {
                        device: &target.device,
                        path: &target.path,
                        result: &result,
                        install: installed.as_ref(),
                    };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print!("{}", report::render_probe(&target, &result));
                }
            } else {
                let guess = classify(&target.device);
                if json {
                    let report = GuessReport {
                        device: &target.device,
                        path: &target.path,
                        guess: &guess,
                    };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print!("{}", report::render_guess(&target, &guess));
                }
            }
        }

        Command::SetDevice { path } => {
            let updated = Settings {
                zigbee_device: Some(path.clone()),
                ..settings
            };
            let saved_to = updated.save().context("Failed to save settings")?;
            info!("Saved device {} to {}", path, saved_to.display());
            println!("Device set to {}", path);
        }

        Command::Config => {
            match Settings::settings_path() {
                Some(path) => println!("Settings file: {}", path.display()),
                None => println!("Settings file: (no home directory)"),
            }
            match &settings.zigbee_device {
                Some(device) => println!("  zigbee_device:   {}", device),
                None => {
                    let devices = DeviceScanner::new(env).enumerate().await;
                    let suggested = default_device_path(&devices, |p| Path::new(p).exists());
                    println!("  zigbee_device:   (not set, suggested {})", suggested);
                }
            }
            println!("  flasher_tool:    {}", settings.flasher_tool);
            println!("  probe_baud_rate: {}", settings.probe_baud_rate);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_coordinator_probe() {
        let cli = Cli::parse_from(["z2m-coord", "-v", "coordinator", "/dev/ttyUSB0", "--probe"]);
        assert!(cli.verbose);
        match cli.command {
            Command::Coordinator {
                device,
                probe,
                install_flasher,
                json,
            } => {
                assert_eq!(device.as_deref(), Some("/dev/ttyUSB0"));
                assert!(probe);
                assert!(!install_flasher);
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_install_alias() {
        let cli = Cli::parse_from(["z2m-coord", "coord", "--install-usf"]);
        assert!(matches!(
            cli.command,
            Command::Coordinator {
                install_flasher: true,
                probe: false,
                ..
            }
        ));
    }
}

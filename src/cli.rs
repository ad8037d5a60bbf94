use crate::config::loader::{load_profile, ServiceConfig};
use crate::config::validator::{validate_profile, validate_service_config};
use crate::core::types::{SpawnRequest, SpawnRole};
use crate::exec::shell::{exec_argv, execute_shell_command_with};
use crate::exec::Spawner;
use crate::kernel::label::label_enforcement_available;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn the configured singleton, then serve JSON spawn requests from stdin
    Serve {
        /// Service configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replace this process with `<shell> -c <command>`
    ExecShell {
        /// Shell interpreter; overrides the configured one
        #[arg(long)]
        shell: Option<PathBuf>,
        /// Service configuration providing the interpreter
        #[arg(long)]
        config: Option<PathBuf>,
        command: String,
    },
    /// Validate a security profile and show the label it would get
    Check {
        #[arg(long)]
        profile: PathBuf,
        /// Validate as the singleton
        #[arg(long)]
        singleton: bool,
        /// Service configuration providing the label policy
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { config } => serve(load_config(config.as_ref())?),
        Commands::ExecShell {
            shell,
            config,
            command,
        } => {
            let shell = resolve_shell(shell, &load_config(config.as_ref())?);
            let err = execute_shell_command_with(&shell, &command);
            Err(err).context("exec-shell")
        }
        Commands::Check {
            profile,
            singleton,
            config,
        } => check(&profile, singleton, &load_config(config.as_ref())?),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ServiceConfig> {
    let config = match path {
        Some(path) => ServiceConfig::load_from_file(path)?,
        None => ServiceConfig::default(),
    };

    let report = validate_service_config(&config);
    for warning in &report.warnings {
        log::warn!("config: {}", warning);
    }
    if !report.is_valid() {
        anyhow::bail!("Invalid configuration:\n{}", report.errors.join("\n"));
    }
    Ok(config)
}

fn resolve_shell(explicit: Option<PathBuf>, config: &ServiceConfig) -> PathBuf {
    explicit.unwrap_or_else(|| config.shell.clone())
}

fn serve(config: ServiceConfig) -> Result<()> {
    if config.labels.enabled && !label_enforcement_available() {
        log::warn!("No MAC enforcement on this host; labels will not be applied");
    }

    let spawner = Spawner::new()
        .with_labels(config.labels.clone())
        .with_storage(config.storage.clone());

    if let Some(singleton) = &config.singleton {
        let pid = spawner
            .spawn_singleton(&singleton.profile, || exec_argv(&singleton.command))
            .context("Failed to spawn singleton")?;
        eprintln!("Singleton running as pid {}", pid);
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<SpawnRequest>(&line) {
            Ok(request) => match spawner
                .spawn_application(&request.profile, || exec_argv(&request.command))
            {
                Ok(pid) => serde_json::json!({ "pid": pid.as_raw() }),
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
            Err(e) => serde_json::json!({ "error": format!("Malformed request: {}", e) }),
        };

        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }

    Ok(())
}

fn check(path: &PathBuf, singleton: bool, config: &ServiceConfig) -> Result<()> {
    let profile = load_profile(path)?;
    let report = validate_profile(&profile);
    let role = if singleton {
        SpawnRole::Singleton
    } else {
        SpawnRole::Application
    };

    let label = config
        .labels
        .enabled
        .then(|| config.labels.derive(role, &profile.label).to_string());

    let summary = serde_json::json!({
        "valid": report.is_valid(),
        "role": role,
        "label": label,
        "errors": report.errors,
        "warnings": report.warnings,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !report.is_valid() {
        anyhow::bail!("profile {} is invalid", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::DEFAULT_SHELL;
    use std::io::Write as _;

    #[test]
    fn test_exec_shell_uses_configured_interpreter() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"shell": "/bin/bash"}}"#).unwrap();
        let config = load_config(Some(&file.path().to_path_buf())).unwrap();

        assert_eq!(resolve_shell(None, &config), PathBuf::from("/bin/bash"));
    }

    #[test]
    fn test_explicit_shell_overrides_config() {
        let config = ServiceConfig::default();
        assert_eq!(resolve_shell(None, &config), PathBuf::from(DEFAULT_SHELL));
        assert_eq!(
            resolve_shell(Some(PathBuf::from("/bin/dash")), &config),
            PathBuf::from("/bin/dash")
        );
    }

    #[test]
    fn test_exec_shell_arguments_parse() {
        let cli = Cli::try_parse_from([
            "warmforkd",
            "exec-shell",
            "--config",
            "/etc/warmfork.json",
            "echo 1",
        ])
        .unwrap();
        match cli.command {
            Commands::ExecShell {
                shell,
                config,
                command,
            } => {
                assert!(shell.is_none());
                assert_eq!(config, Some(PathBuf::from("/etc/warmfork.json")));
                assert_eq!(command, "echo 1");
            }
            _ => panic!("expected exec-shell"),
        }
    }
}

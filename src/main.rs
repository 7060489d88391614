use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use iotwatch::{
    AlertLevel, CredentialStore, DeviceAction, DeviceStatus, Dispatch, FileSource, HttpSource,
    Identity, Role, Session, SessionFile, SessionOptions, Settings, TelemetrySource,
};
use iotwatch_adapters::http::HttpClient;
use iotwatch_types::current_timestamp_ms;

#[derive(Parser, Debug)]
#[command(name = "iotwatch")]
#[command(about = "Operator console for an IoT sensor dashboard backend")]
struct Args {
    /// Settings file (TOML). A missing file means built-in defaults.
    #[arg(short, long, default_value = "iotwatch.toml")]
    config: PathBuf,

    /// Backend base URL, overriding the settings file
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Read telemetry frames from a JSON file instead of the backend
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Log in and remember the session
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the current session
    Logout,

    /// Poll telemetry and report alert changes until Ctrl-C
    Watch,

    /// Poll until the first frame arrives and write device state to a JSON file
    Export {
        #[arg(short, long)]
        out: PathBuf,

        /// Give up after this many seconds without telemetry
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },

    /// Switch a device's LED or fan (admin only)
    Command {
        device: String,
        /// LED_ON, LED_OFF, FAN_ON, FAN_OFF or FAN_AUTO
        action: DeviceAction,
    },

    /// Update a device's alert limits (admin only)
    Limits {
        device: String,
        #[arg(allow_negative_numbers = true)]
        temp: f64,
        #[arg(allow_negative_numbers = true)]
        gas: f64,
    },

    /// Manage user accounts
    Users {
        #[command(subcommand)]
        action: UsersCmd,
    },
}

#[derive(Subcommand, Debug)]
enum UsersCmd {
    /// List accounts and their roles (admin only)
    List,

    /// Create or overwrite an account (admin only, except for the first one)
    Add {
        username: String,
        #[arg(long, default_value = "user")]
        role: Role,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Delete an account (admin only)
    Delete { username: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(&args.config)
        .with_context(|| format!("loading settings from {}", args.config.display()))?;
    if let Some(endpoint) = args.endpoint {
        settings.endpoint.base_url = endpoint;
    }
    if let Some(interval_ms) = args.interval_ms {
        ensure!(interval_ms > 0, "--interval-ms must be positive");
        settings.polling.interval_ms = interval_ms;
    }

    init_logging(&settings.logging.level);

    match args.command {
        Cmd::Login { username, password } => login(&settings, &username, password),
        Cmd::Logout => logout(&settings),
        Cmd::Watch => run_watch(&settings, args.file.as_deref()),
        Cmd::Export { out, timeout_secs } => export_to_file(
            &settings,
            args.file.as_deref(),
            &out,
            Duration::from_secs(timeout_secs),
        ),
        Cmd::Command { device, action } => run_dispatch(&settings, |session| {
            session.dispatcher().send_command(&device, action)
        }),
        Cmd::Limits { device, temp, gas } => run_dispatch(&settings, |session| {
            session.dispatcher().set_limits(&device, temp, gas)
        }),
        Cmd::Users { action } => manage_users(&settings, action),
    }
}

fn init_logging(level: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_password(provided: Option<String>) -> Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }

    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

fn login(settings: &Settings, username: &str, password: Option<String>) -> Result<()> {
    let store = CredentialStore::open(&settings.storage.credentials_path)?;
    let password = read_password(password)?;
    let identity = store.authenticate(username, &password)?;

    SessionFile::new(&settings.storage.session_path).save(&identity)?;
    println!("Logged in as {} ({})", identity.username, identity.role);
    Ok(())
}

fn logout(settings: &Settings) -> Result<()> {
    SessionFile::new(&settings.storage.session_path).clear()?;
    println!("Logged out");
    Ok(())
}

/// The remembered identity, with its role re-read from the credential store.
fn current_identity(settings: &Settings, store: &CredentialStore) -> Result<Identity> {
    let session = SessionFile::new(&settings.storage.session_path);
    let identity = session
        .load()?
        .ok_or_else(|| anyhow!("not logged in; run `iotwatch login <username>` first"))?;

    match store.get(&identity.username) {
        Some(record) => Ok(Identity::new(identity.username, record.role)),
        None => {
            session.clear()?;
            bail!("account {} no longer exists; log in again", identity.username)
        }
    }
}

fn require_admin(identity: &Identity) -> Result<()> {
    ensure!(
        identity.is_admin(),
        "{} is not an administrator",
        identity.username
    );
    Ok(())
}

fn manage_users(settings: &Settings, action: UsersCmd) -> Result<()> {
    let mut store = CredentialStore::open(&settings.storage.credentials_path)?;

    match action {
        UsersCmd::List => {
            require_admin(&current_identity(settings, &store)?)?;
            for (username, record) in store.list() {
                println!("{:<24} {}", username, record.role);
            }
        }
        UsersCmd::Add {
            username,
            role,
            password,
        } => {
            if store.is_empty() {
                ensure!(role == Role::Admin, "the first account must be an admin");
                info!(path = %store.path().display(), "bootstrapping credential store");
            } else {
                require_admin(&current_identity(settings, &store)?)?;
            }
            let password = read_password(password)?;
            store.upsert(&username, &password, role)?;
            println!("Saved {} ({})", username, role);
        }
        UsersCmd::Delete { username } => {
            let identity = current_identity(settings, &store)?;
            require_admin(&identity)?;
            store.delete(&username, &identity)?;
            println!("Deleted {}", username);
        }
    }

    Ok(())
}

fn http_client(settings: &Settings) -> Result<HttpClient> {
    let mut builder = HttpClient::builder().endpoint(settings.endpoint.base_url.as_str());
    if let Some(timeout) = settings.request_timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Open a session for the logged-in user. Commands always go to the backend;
/// telemetry comes from `file` when given.
fn build_session(settings: &Settings, file: Option<&Path>) -> Result<Session> {
    let store = CredentialStore::open(&settings.storage.credentials_path)?;
    let identity = current_identity(settings, &store)?;

    let backend = Arc::new(HttpSource::new(http_client(settings)?));
    let source: Arc<dyn TelemetrySource> = match file {
        Some(path) => Arc::new(FileSource::new(path)),
        None => backend.clone(),
    };

    Ok(Session::login(
        identity,
        source,
        backend,
        SessionOptions::from(settings),
    ))
}

fn run_watch(settings: &Settings, file: Option<&Path>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let mut session = build_session(settings, file)?;
        session.start_polling(|state, outcome| {
            debug!(?outcome, devices = state.snapshots().len(), "telemetry merged");
        });

        // Staleness changes with time alone, so levels are re-evaluated on
        // every interval rather than only when a frame lands.
        let mut levels = HashMap::new();
        let mut ticker = tokio::time::interval(settings.poll_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let statuses = session.device_statuses(current_timestamp_ms());
                    report_transitions(&statuses, &mut levels);
                }
                result = tokio::signal::ctrl_c() => {
                    result?;
                    break;
                }
            }
        }

        session.stop_polling();
        Ok::<_, anyhow::Error>(())
    })
}

fn report_transitions(statuses: &[DeviceStatus], levels: &mut HashMap<String, AlertLevel>) {
    for status in statuses {
        if levels.insert(status.device.clone(), status.level) == Some(status.level) {
            continue;
        }

        let s = &status.snapshot;
        println!(
            "{:<5} {:<16} {:>6.1}°C (max {:.1})  gas {:.2}V (max {:.2})  {:>3.0}%RH  led {}  fan {}",
            status.level.symbol(),
            status.device,
            s.temperature,
            s.temp_threshold,
            s.gas_level,
            s.gas_threshold,
            s.humidity,
            s.led,
            s.fan,
        );

        match status.level {
            AlertLevel::Normal => info!(device = %status.device, "device back to normal"),
            level => warn!(device = %status.device, ?level, "device alert level changed"),
        }
    }
}

fn run_dispatch<F>(settings: &Settings, send: F) -> Result<()>
where
    F: FnOnce(&Session) -> Dispatch,
{
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let session = build_session(settings, None)?;
        match send(&session) {
            Dispatch::Sent(handle) => {
                // Failures are logged by the dispatcher; the next poll shows
                // whether the device picked the change up.
                handle.await?;
                println!("Request sent");
                Ok::<_, anyhow::Error>(())
            }
            Dispatch::Denied => bail!("{} is not an administrator", session.identity().username),
            Dispatch::Invalid => bail!("limits must be finite numbers"),
        }
    })
}

/// Export current device state to a JSON file
fn export_to_file(
    settings: &Settings,
    file: Option<&Path>,
    export_path: &Path,
    wait: Duration,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    let statuses = rt.block_on(async {
        let mut session = build_session(settings, file)?;

        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        session.start_polling(move |_, outcome| {
            if outcome.is_applied() {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
            }
        });

        tokio::time::timeout(wait, rx)
            .await
            .context("timed out waiting for telemetry")?
            .context("polling stopped before any telemetry arrived")?;
        session.stop_polling();

        Ok::<_, anyhow::Error>(session.device_statuses(current_timestamp_ms()))
    })?;

    let count = |level: AlertLevel| statuses.iter().filter(|s| s.level == level).count();
    let export = serde_json::json!({
        "summary": {
            "total_devices": statuses.len(),
            "normal": count(AlertLevel::Normal),
            "stale": count(AlertLevel::Stale),
            "temperature_breach": count(AlertLevel::TemperatureBreach),
            "gas_breach": count(AlertLevel::GasBreach),
            "exported_at_ms": current_timestamp_ms(),
        },
        "devices": statuses,
    });

    let json = serde_json::to_string_pretty(&export)?;
    let mut out = std::fs::File::create(export_path)?;
    out.write_all(json.as_bytes())?;

    println!("Exported to {}", export_path.display());
    Ok(())
}

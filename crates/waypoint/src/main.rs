// waypoint - demo client driving the join handshake against a server

use anyhow::{anyhow, Result};
use clap::Parser;
use pending_session::transport::channel::{channel_pair, ServerEndpoint};
use pending_session::transport::ws::WsTransport;
use pending_session::{
    ControlMessage, NetGuid, PendingSession, PreparedTransportFactory, SessionConfig, SessionState,
    ServerUrl, StaticIdentity, LOCAL_NETWORK_VERSION,
};
use request_manager::{ManagedRequest, RequestManager, RequestStatus};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
use config::AppConfig;

/// Tick cadence for the client loop.
const TICK: Duration = Duration::from_millis(50);
/// Give up on the whole attempt after this long.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(author, version, about = "Waypoint join-handshake demo client", long_about = None)]
struct Args {
    /// Scenario to run: loopback (scripted in-process server) or connect
    #[arg(short, long, default_value = "loopback")]
    scenario: String,

    /// Travel URL override, e.g. 127.0.0.1:7777/Highlands?team=blue
    #[arg(short, long)]
    url: Option<String>,

    /// Player nickname override
    #[arg(short, long)]
    name: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "waypoint.toml")]
    config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Output logs in JSON format
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load_from_file(&args.config).await?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level, args.json_logs || config.logging.json_format);

    info!("🚀 Waypoint demo client");
    info!("Scenario: {}", args.scenario);

    match args.scenario.as_str() {
        "loopback" => run_loopback(&config, &args).await,
        "connect" => run_connect(&config, &args).await,
        other => Err(anyhow!("unknown scenario: {other}")),
    }
}

fn init_logging(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

fn identity_from(config: &AppConfig, args: &Args) -> Arc<StaticIdentity> {
    Arc::new(StaticIdentity {
        nickname: Some(
            args.name
                .clone()
                .unwrap_or_else(|| config.identity.nickname.clone()),
        ),
        login_options: config.identity.login_options.clone(),
        identity: Some(Default::default()),
    })
}

fn travel_url(config: &AppConfig, args: &Args) -> Result<ServerUrl> {
    let raw = args
        .url
        .clone()
        .unwrap_or_else(|| config.connection.url.clone());
    ServerUrl::parse(&raw).map_err(|e| anyhow!("bad travel url {raw}: {e}"))
}

/// Runs the handshake against a scripted in-process server.
async fn run_loopback(config: &AppConfig, args: &Args) -> Result<()> {
    let url = travel_url(config, args)?;
    let (transport, endpoint) = channel_pair();
    let factory = PreparedTransportFactory::with(Box::new(transport));

    let server = tokio::spawn(run_scripted_server(endpoint));

    let session = PendingSession::initiate(
        url,
        &factory,
        identity_from(config, args),
        SessionConfig {
            net_speed: config.connection.net_speed,
            ..Default::default()
        },
    )
    .map_err(|e| anyhow!("{e}"))?;

    let outcome = drive_session(session).await;
    server.abort();
    outcome
}

/// Runs the handshake over a WebSocket against a real endpoint.
async fn run_connect(config: &AppConfig, args: &Args) -> Result<()> {
    let url = travel_url(config, args)?;
    info!("🌐 Connecting to {}:{}", url.host, url.port);

    let transport = WsTransport::connect(&url)
        .await
        .map_err(|e| anyhow!("{e}"))?;
    let factory = PreparedTransportFactory::with(Box::new(transport));

    let session = PendingSession::initiate(
        url,
        &factory,
        identity_from(config, args),
        SessionConfig {
            net_speed: config.connection.net_speed,
            ..Default::default()
        },
    )
    .map_err(|e| anyhow!("{e}"))?;

    drive_session(session).await
}

/// Scripted server half for the loopback scenario: answers the client the
/// way a real server would, then stops once the player is admitted.
async fn run_scripted_server(endpoint: ServerEndpoint) {
    let started = Instant::now();
    loop {
        while let Some(message) = endpoint.try_receive() {
            match message {
                ControlMessage::Hello {
                    network_version, ..
                } => {
                    if network_version == LOCAL_NETWORK_VERSION {
                        endpoint.send(ControlMessage::Challenge {
                            token: "9F2B".to_string(),
                        });
                    } else {
                        endpoint.send(ControlMessage::Upgrade {
                            remote_version: LOCAL_NETWORK_VERSION,
                        });
                    }
                }
                ControlMessage::Login { url, .. } => {
                    info!("🔐 Server accepted login for {url}");
                    endpoint.send(ControlMessage::Welcome {
                        map_name: "Highlands?biome=frost".to_string(),
                        game_name: "skirmish".to_string(),
                        redirect_url: String::new(),
                    });
                    endpoint.send(ControlMessage::GuidAssign {
                        guid: NetGuid(1),
                        path: "/Game/Maps/Highlands".to_string(),
                    });
                }
                ControlMessage::Netspeed { rate } => {
                    debug!("client declared {rate} B/s");
                }
                ControlMessage::Join => {
                    info!("🎮 Server admitted the player");
                    return;
                }
                other => warn!("server ignoring {}", other.kind_name()),
            }
        }
        if started.elapsed() > ATTEMPT_TIMEOUT {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Simulated content download gating the join, tracked by the
/// [`RequestManager`].
struct DownloadRequest {
    url: String,
    remaining: Mutex<f32>,
}

impl DownloadRequest {
    fn new(url: &str, seconds: f32) -> Self {
        Self {
            url: url.to_string(),
            remaining: Mutex::new(seconds),
        }
    }
}

impl ManagedRequest for DownloadRequest {
    fn tick(&self, delta_seconds: f32) {
        let mut remaining = self.remaining.lock().unwrap();
        if *remaining > 0.0 {
            *remaining -= delta_seconds;
        }
    }

    fn verb(&self) -> &str {
        "DOWNLOAD"
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn status(&self) -> RequestStatus {
        if *self.remaining.lock().unwrap() <= 0.0 {
            RequestStatus::Succeeded
        } else {
            RequestStatus::Processing
        }
    }
}

/// Ticks the session (and a request manager alongside it) until the attempt
/// succeeds, fails, or the user interrupts it.
async fn drive_session(mut session: PendingSession) -> Result<()> {
    let requests = RequestManager::new();
    let download: Arc<DownloadRequest> =
        Arc::new(DownloadRequest::new("http://cdn.local/pak/base", 0.25));
    let download_handle: Arc<dyn ManagedRequest> = download.clone();
    requests.add_request(download_handle.clone());

    let mut download_done = false;
    let mut ticks_after_join: u32 = 0;
    let started = Instant::now();
    let mut ticker = tokio::time::interval(TICK);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, abandoning the attempt");
                session.close();
                return Ok(());
            }
            _ = ticker.tick() => {
                let dt = TICK.as_secs_f32();
                session.tick(dt);
                requests.tick(dt);

                if session.state() == SessionState::Failed {
                    error!("❌ Connection failed: {}", session.connection_error_text());
                    return Err(anyhow!(session.connection_error_text()));
                }

                if !download_done && download.status() == RequestStatus::Succeeded {
                    download_done = true;
                    let mut dump = String::new();
                    let _ = requests.dump_requests(&mut dump);
                    debug!("content ready\n{dump}");
                    requests.remove_request(&download_handle);
                }

                if session.state().is_welcomed() && download_done && !session.has_sent_join() {
                    session.send_join();
                }

                if session.has_sent_join() {
                    ticks_after_join += 1;
                    if ticks_after_join >= 5 {
                        info!(
                            "✅ Joined {} (game {})",
                            session.url().map,
                            session.url().option_value("game").unwrap_or("default"),
                        );
                        return Ok(());
                    }
                }

                if started.elapsed() > ATTEMPT_TIMEOUT {
                    session.close();
                    return Err(anyhow!("connection attempt timed out"));
                }
            }
        }
    }
}

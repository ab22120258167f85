use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gantt_pilot::api::{self, ApiState};
use gantt_pilot::session::{SessionServices, SessionStore};
use gantt_pilot::settings;

#[derive(Parser)]
#[command(name = "gantt-pilot", about = "Gantt chat command server", version)]
struct Args {
    /// Config directory override (settings, credentials, audit logs)
    #[arg(long)]
    config_dir: Option<std::path::PathBuf>,

    /// Port to listen on (overrides settings and PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Origin allowed by CORS (overrides settings and FRONTEND_ORIGIN)
    #[arg(long)]
    frontend_origin: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gantt_pilot=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let app_config_dir = args.config_dir.unwrap_or_else(gantt_pilot::paths::app_config_dir);

    let mut settings = match settings::resolve_settings(&app_config_dir) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to load settings");
            process::exit(1);
        }
    };
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(bind) = args.bind {
        settings.server.bind = bind;
    }
    if let Some(origin) = args.frontend_origin {
        settings.server.frontend_origin = origin;
    }

    let services = SessionServices::from_settings(&settings, &app_config_dir);
    let state = Arc::new(ApiState::new(SessionStore::new(services)));

    if let Err(e) = api::serve(state, &settings.server).await {
        tracing::error!(error = %e, "API server stopped");
        process::exit(1);
    }
}

use actix_web::{web, App, HttpServer};
use quizroom::config::db::StoreKind;
use quizroom::config::engine::EngineConfig;
use quizroom::infra::state::build_state;
use quizroom::middleware::RequestSpan;
use quizroom::routes;
use quizroom::services::sweeper;
use quizroom::state::security_config::SecurityConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod telemetry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    // Environment variables must be set by the runtime environment
    // (docker env_file, or `set -a; . ./.env; set +a` locally).
    let host = std::env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = match std::env::var("BACKEND_PORT")
        .unwrap_or_else(|_| "3001".to_string())
        .parse::<u16>()
    {
        Ok(port) => port,
        Err(_) => {
            error!("BACKEND_PORT must be a valid port number");
            std::process::exit(1);
        }
    };

    let security_config = match SecurityConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "BACKEND_JWT_SECRET must be set");
            std::process::exit(1);
        }
    };
    let (store_kind, engine_config) = match (StoreKind::from_env(), EngineConfig::from_env()) {
        (Ok(kind), Ok(config)) => (kind, config),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let app_state = match build_state()
        .with_store(store_kind)
        .with_security(security_config)
        .with_engine_config(engine_config.clone())
        .build()
        .await
    {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "failed to build application state");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let sweeper = sweeper::spawn(
        app_state.engine.clone(),
        engine_config.sweep_interval,
        shutdown.clone(),
    );

    info!(%host, port, store = ?store_kind, "starting quizroom backend");
    let data = web::Data::new(app_state);

    let served = HttpServer::new(move || {
        App::new()
            .wrap(RequestSpan)
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!(error = %e, "sweeper task ended abnormally");
    }
    info!("quizroom backend stopped");
    served
}

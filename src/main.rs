//! Quiz rooms backend entrypoint wiring REST routes, storage supervision,
//! and the background cleanup sweeper.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_rooms_back::{
    config::AppConfig,
    routes,
    services::{question_bank::JsonQuestionBank, storage_supervisor, sweeper},
    state::{AppState, SharedState},
};

/// Environment variable selecting the storage backend ("mongo" or "memory").
const STORE_BACKEND_ENV: &str = "QUIZ_ROOMS_STORE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let questions = Arc::new(JsonQuestionBank::load(&config));
    let app_state = AppState::new(config, questions);

    spawn_storage_supervisor(app_state.clone());
    tokio::spawn(sweeper::run(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Spawn the storage supervisor for the configured backend.
fn spawn_storage_supervisor(state: SharedState) {
    #[cfg(feature = "mongo-store")]
    {
        use quiz_rooms_back::dao::{
            room_store::{
                RoomStore,
                mongodb::{MongoConfig, MongoRoomStore},
            },
            storage::StorageError,
        };

        let backend = env::var(STORE_BACKEND_ENV).unwrap_or_default();
        if !backend.eq_ignore_ascii_case("memory") {
            let uri =
                env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();

            tokio::spawn(storage_supervisor::run(state, move || {
                let uri = uri.clone();
                let db_name = db_name.clone();
                async move {
                    let config = MongoConfig::from_uri(&uri, db_name.as_deref())
                        .await
                        .map_err(StorageError::from)?;
                    let store = MongoRoomStore::connect(config)
                        .await
                        .map_err(StorageError::from)?;
                    Ok(Arc::new(store) as Arc<dyn RoomStore>)
                }
            }));
            return;
        }
    }

    #[cfg(feature = "memory-store")]
    {
        use quiz_rooms_back::dao::room_store::{RoomStore, memory::MemoryRoomStore};

        info!("using in-memory room store; rooms will not survive a restart");
        tokio::spawn(storage_supervisor::run(state, || async {
            Ok(Arc::new(MemoryRoomStore::new()) as Arc<dyn RoomStore>)
        }));
        return;
    }

    #[cfg(not(feature = "memory-store"))]
    tracing::error!("no usable storage backend compiled in; staying in degraded mode");
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

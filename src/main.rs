//! Quiz buzzer backend entrypoint wiring the WebSocket protocol, HTTP routes and storage.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use quiz_buzzer_back::{
    config::AppConfig,
    dao::{
        storage::StorageError,
        store::{
            QuizStore,
            file::{FileConfig, FileStore},
            memory::MemoryStore,
        },
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 3000;

/// Storage backend selected through `STORAGE_BACKEND`.
#[derive(Debug, Clone, Copy)]
enum StorageBackend {
    File,
    Memory,
    #[cfg(feature = "mongo-store")]
    Mongo,
    #[cfg(feature = "couch-store")]
    Couch,
}

impl StorageBackend {
    fn from_env() -> Self {
        match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            #[cfg(feature = "mongo-store")]
            Ok("mongo") => StorageBackend::Mongo,
            #[cfg(feature = "couch-store")]
            Ok("couch") => StorageBackend::Couch,
            Ok("file") | Err(_) => StorageBackend::File,
            Ok(other) => {
                warn!(backend = other, "unknown storage backend; using file storage");
                StorageBackend::File
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    let backend = StorageBackend::from_env();
    info!(?backend, "starting storage supervisor");
    tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
        connect_store(backend)
    }));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Open the selected backend and erase its concrete type.
async fn connect_store(backend: StorageBackend) -> Result<Arc<dyn QuizStore>, StorageError> {
    let store: Arc<dyn QuizStore> = match backend {
        StorageBackend::File => Arc::new(FileStore::open(FileConfig::from_env()).await?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            use quiz_buzzer_back::dao::store::mongodb::{MongoConfig, MongoQuizStore};

            let config = MongoConfig::from_env().await?;
            Arc::new(MongoQuizStore::connect(config).await?)
        }
        #[cfg(feature = "couch-store")]
        StorageBackend::Couch => {
            use quiz_buzzer_back::dao::store::couchdb::{CouchConfig, CouchQuizStore};

            let config = CouchConfig::from_env()?;
            Arc::new(CouchQuizStore::connect(config).await?)
        }
    };
    Ok(store)
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

use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use visualsocial_api::server::{self, FILES_PATH, ServerState};
use visualsocial_common::snowflake::NodeId;
use visualsocial_db::{
    backend::BackendSettings,
    client::{ClientConfig, ReviewClient},
};

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    /// Origin review links point to. Defaults to the bind address.
    public_origin: Option<String>,
    backend_url: Option<String>,
    backend_api_key: Option<String>,
    database_url: Option<String>,
    media_dir: Option<PathBuf>,
    media_public_url: Option<String>,
    node_id: Option<NodeId>,
}

impl Env {
    fn public_origin(&self) -> String {
        self.public_origin.clone().unwrap_or_else(|| {
            format!(
                "http://{}",
                SocketAddr::new(self.server_address, self.server_port)
            )
        })
    }

    fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            url: self.backend_url.clone(),
            api_key: self.backend_api_key.clone(),
            database_url: self.database_url.clone(),
            media_dir: self.media_dir.clone(),
            media_public_url: self.media_public_url.clone(),
        }
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "visualsocial_api=debug,\
                visualsocial_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutting down");
            shutdown.cancel();
        }
        Err(err) => warn!(error = %err, "Could not listen for ctrl-c"),
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let origin = env.public_origin();
    let backend = env
        .backend_settings()
        .connect(&format!("{origin}{FILES_PATH}"))
        .await;
    let client = ReviewClient::new(
        ClientConfig {
            origin,
            node_id: env.node_id.unwrap_or_default(),
        },
        backend,
    );
    let media_dir = client.media_dir().map(ToOwned::to_owned);
    let state = ServerState {
        client: Arc::new(client),
    };
    let app = server::app(state, media_dir);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}

use crate::coordinator::{CoordinatorHandle, SessionCoordinator};
use crate::events::ConnectionHub;
use crate::handlers;
use crate::settings::{AppSettings, SettingsError};
use crate::static_handler::StaticHandler;
use std::convert::Infallible;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::reply::Reply;
use warp::ws::Ws;
use warp::Filter;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
    static_dir: PathBuf,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port,
            static_dir: static_dir.into(),
        }
    }

    pub fn for_tests() -> Self {
        let dir = std::env::temp_dir().join("duelroom_static");
        Self::new("127.0.0.1", 0, dir)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }
}

/// Shared components handed to every route.
///
/// Constructing a context spawns the session coordinator, so it must happen
/// inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: ServerConfig,
    settings: AppSettings,
    hub: ConnectionHub,
    coordinator: CoordinatorHandle,
    static_handler: Arc<StaticHandler>,
}

impl AppContext {
    pub fn new(config: ServerConfig, settings: AppSettings) -> Result<Self, ServerError> {
        settings.validate()?;

        if !config.static_dir().exists() {
            fs::create_dir_all(config.static_dir())
                .map_err(|err| ServerError::ConfigError(err.to_string()))?;
        }

        Ok(Self::from_parts(config, settings))
    }

    /// Test context with default settings; the static directory may not exist.
    pub fn new_for_tests() -> Self {
        Self::from_parts(ServerConfig::for_tests(), AppSettings::default())
    }

    fn from_parts(config: ServerConfig, settings: AppSettings) -> Self {
        let hub = ConnectionHub::new(settings.outbound_buffer);
        let (coordinator, _task) = SessionCoordinator::spawn(hub.clone(), settings.clone());
        let static_handler = Arc::new(StaticHandler::new(config.static_dir().to_path_buf()));

        Self {
            config,
            settings,
            hub,
            coordinator,
            static_handler,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn hub(&self) -> ConnectionHub {
        self.hub.clone()
    }

    pub fn coordinator(&self) -> CoordinatorHandle {
        self.coordinator.clone()
    }

    pub fn static_handler(&self) -> Arc<StaticHandler> {
        Arc::clone(&self.static_handler)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServerConfig, settings: AppSettings) -> Result<Self, ServerError> {
        let context = AppContext::new(config, settings)?;
        Ok(Self { context })
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let config = context.config().clone();
        let bind_addr = Self::bind_addr(&config)?;

        let preflight = if bind_addr.port() != 0 {
            Some(std::net::TcpListener::bind(bind_addr).map_err(ServerError::BindError)?)
        } else {
            None
        };
        drop(preflight);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::routes(&context).with(warp::trace::request());
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "web server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    /// Every route the server answers; anything unmatched gets a negotiated 404.
    pub fn routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let health = Self::health_route(context);
        let socket = Self::socket_route(context);
        let static_routes = Self::static_routes(context);
        let not_found = Self::not_found_route(context);

        health
            .or(socket)
            .unify()
            .or(static_routes)
            .unify()
            .or(not_found)
            .unify()
            .boxed()
    }

    fn health_route(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .and(Self::with_coordinator(context.coordinator()))
            .then(handlers::health)
            .boxed()
    }

    fn socket_route(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        warp::path("socket")
            .and(warp::path::end())
            .and(warp::ws())
            .and(Self::with_hub(context.hub()))
            .and(Self::with_coordinator(context.coordinator()))
            .map(|ws: Ws, hub: ConnectionHub, coordinator: CoordinatorHandle| {
                ws.on_upgrade(move |socket| handlers::serve_connection(socket, hub, coordinator))
                    .into_response()
            })
            .boxed()
    }

    fn static_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        warp::get()
            .and(warp::path::tail())
            .and(warp::header::optional::<String>("accept"))
            .and(Self::with_static_handler(context.static_handler()))
            .and_then(
                |tail: warp::path::Tail,
                 accept: Option<String>,
                 handler: Arc<StaticHandler>| async move {
                    let served = if tail.as_str().is_empty() {
                        handler.index().await
                    } else {
                        handler.asset(tail.as_str()).await
                    };
                    let response = match served {
                        Ok(response) => response,
                        Err(err) => handler.error_response(err, accept.as_deref()).await,
                    };
                    Ok::<_, Infallible>(response)
                },
            )
            .boxed()
    }

    fn not_found_route(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        warp::any()
            .and(warp::header::optional::<String>("accept"))
            .and(Self::with_static_handler(context.static_handler()))
            .then(|accept: Option<String>, handler: Arc<StaticHandler>| async move {
                handler.not_found(accept.as_deref()).await
            })
            .boxed()
    }

    fn with_static_handler(
        handler: Arc<StaticHandler>,
    ) -> impl Filter<Extract = (Arc<StaticHandler>,), Error = Infallible> + Clone {
        warp::any().map(move || handler.clone())
    }

    fn with_hub(
        hub: ConnectionHub,
    ) -> impl Filter<Extract = (ConnectionHub,), Error = Infallible> + Clone {
        warp::any().map(move || hub.clone())
    }

    fn with_coordinator(
        coordinator: CoordinatorHandle,
    ) -> impl Filter<Extract = (CoordinatorHandle,), Error = Infallible> + Clone {
        warp::any().map(move || coordinator.clone())
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Stops accepting connections, waits for the server task, then stops
    /// the coordinator.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        self.context.coordinator().shutdown();
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
            self.context.coordinator().shutdown();
        }
    }
}

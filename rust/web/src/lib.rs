//! Two-player room server: players claim names, pair up in rooms, ready up
//! and play tic-tac-toe over a websocket.
//!
//! All room and player state is owned by one [`SessionCoordinator`] task;
//! connection tasks talk to it through a [`CoordinatorHandle`] and receive
//! events through the [`ConnectionHub`].

pub mod coordinator;
pub mod directory;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod registry;
pub mod room;
pub mod server;
pub mod settings;
pub mod static_handler;

pub use coordinator::{
    Command, CoordinatorError, CoordinatorHandle, CoordinatorStatus, SessionCoordinator,
};
pub use directory::{DirectoryError, RoomDirectory};
pub use errors::{ErrorResponse, ErrorSeverity, IntoClientError, IntoErrorResponse};
pub use events::{
    ClientEvent, ConnectionHub, ConnectionId, ConnectionSubscription, InboundError, ServerEvent,
    Winner,
};
pub use logging::{init_logging, LogCapture, LogEntry, LogFormat};
pub use registry::{Player, PlayerRegistry, RegistryError};
pub use room::{Room, RoomError, RoomId, ROOM_CAPACITY};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer, DEFAULT_PORT};
pub use settings::{AppSettings, SettingsError};
pub use static_handler::{NotFoundFormat, StaticError, StaticHandler};

pub mod health;
pub mod socket;

pub use health::health;
pub use socket::{dispatch_frame, serve_connection};

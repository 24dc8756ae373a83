pub mod chat;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod server;
pub mod status;
pub mod translation;
pub mod upstream;

pub use config::RelayConfig;
pub use credentials::{Credential, Credentials};
pub use error::{RelayError, Result};
pub use logging::SharedLogger;
pub use server::{build_router, AppState};

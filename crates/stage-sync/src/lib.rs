pub mod config;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod host;
#[cfg(feature = "http")]
pub mod http;
pub mod notify;

pub use config::{GatewayConfig, NoticeText};
pub use endpoint::{BeaconTransport, DocumentEndpoint, RemoteDocument};
pub use error::GatewayError;
pub use gateway::{CommitOptions, CommitOutcome, HydrateOutcome, PersistenceGateway};
pub use host::StageHost;
#[cfg(feature = "http")]
pub use http::{HttpBeacon, HttpEndpoint};
pub use notify::{LogNotifier, NoticeLevel, Notifier};

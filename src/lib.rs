//! Client side of a Philips Hue home setup.
//!
//! The crate talks to a bridge over the CLIP v2 REST API, joins the flat
//! resource collections into a zone → grouped light → lights view, converts
//! between picker colours (RGB/HSV) and the bridge's CIE xy chromaticity, and
//! throttles bursts of colour changes into a bounded rate of writes.
//!
//! ```no_run
//! # tokio_test::block_on(async {
//! use hue_home::{Bridge, BridgeConfig};
//!
//! let bridge = Bridge::new(BridgeConfig::new("192.168.1.110", "my-application-key")).unwrap();
//! let home = bridge.fetch_home().await.into_data();
//! for view in home.zone_tree() {
//!     println!("{}: {} lights", view.name().unwrap_or("?"), view.lights.len());
//! }
//! # })
//! ```

pub mod aggregate;
pub mod bridge;
pub mod color;
pub mod config;
pub mod control;
pub mod resource;
pub mod throttle;

pub use aggregate::{build_zone_tree, ZoneView};
pub use bridge::{ApiError, Bridge, CommandLight, Fetched, Home, HueResponse, LightUpdater};
pub use color::{Gamut, Hsv, XY};
pub use config::{BridgeConfig, TrustPolicy};
pub use resource::{GroupedLight, Light, RType, Resource, ResourceIdentifier, Zone};
pub use throttle::{ColorEvent, UpdateThrottle};

/// All errors that can occur while talking to the bridge.
#[derive(Debug, thiserror::Error)]
pub enum HueError {
    /// DNS, TLS, connection or timeout failure before a response arrived,
    /// or a request body reqwest could not encode.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The bridge answered with something that is not a CLIP v2 envelope.
    #[error("protocol failure (HTTP {status}): {msg}")]
    Protocol { status: u16, msg: String },

    /// The envelope carried errors. Descriptions are the bridge's own text.
    #[error("{}", .descriptions.join(", "))]
    Api { descriptions: Vec<String> },

    /// A single resource was requested but the envelope held none.
    #[error("bridge returned no {rtype} resource")]
    EmptyResult { rtype: RType },

    #[error("configuration error: {msg}")]
    Config { msg: String },

    #[error("application key is not a valid header value")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl HueError {
    pub(crate) fn protocol_err(status: u16, msg: impl Into<String>) -> Self {
        HueError::Protocol {
            status,
            msg: msg.into(),
        }
    }

    pub(crate) fn config_err(msg: impl Into<String>) -> Self {
        HueError::Config { msg: msg.into() }
    }

    /// True for failures where the request may never have reached the bridge.
    pub fn is_transport(&self) -> bool {
        matches!(self, HueError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, HueError>;

mod bridge;
mod episode_log;
mod episode_observer;
mod logging_observer;
mod types;

pub use bridge::{
    ControlCommand, DynamicsBridge, DynamicsResponse, ProtocolError, RESPONSE_FIELDS,
    TcpDynamicsBridge, parse_response,
};
pub use episode_log::{EpisodeLog, EpisodeRecord};
pub use episode_observer::EpisodeObserver;
pub use logging_observer::LoggingObserver;
pub use types::{METERS_PER_NAUTICAL_MILE, SCALE_FACTOR, Vec2, nm, to_nm, wrap_angle};

pub mod errors;
pub mod id;
pub mod signal;
pub mod turn;

pub use errors::{ConfigError, SessionError, VelaError};
pub use id::{new_correlation_id, new_id, SessionId, TurnId};
pub use signal::{ControlSignal, SignalBus};
pub use turn::{Author, Modality, OutputEvent, Turn};

pub type Result<T> = std::result::Result<T, VelaError>;

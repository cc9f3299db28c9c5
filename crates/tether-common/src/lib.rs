pub mod errors;
pub mod events;
pub mod fs;
pub mod id;

pub use errors::{ConfigError, PlatformError, StoreError, TetherError};
pub use events::{Event, EventBus};
pub use fs::atomic_write;
pub use id::{new_id, BlockId, SessionId};

pub type Result<T> = std::result::Result<T, TetherError>;

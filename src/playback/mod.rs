pub mod clock;
pub mod session;
pub mod transport;

pub use clock::{ClockError, FrameClock, TransportEvent};
pub use session::{FrameOutcome, Session, SessionError};
pub use transport::{AudioClock, OfflineClock, TransportControl};

mod gateway;
mod ownership;
mod presence;
pub mod protocol;
mod registry;
mod relay;

pub use gateway::{ClassroomGateway, ServerStats};
pub use ownership::{Ownership, OwnershipGate};
pub use presence::PresenceTracker;
pub use protocol::{ClientEvent, ServerEvent};
pub use registry::{welcome_template, RoomRegistry};
pub use relay::{BroadcastRelay, EventSender};

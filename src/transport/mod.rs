pub mod bluez;
pub mod discovery;
pub mod traits;

pub use bluez::BluezRadio;
pub use discovery::{LocateOutcome, PeerLocator, TargetAddress};
pub use traits::{DiscoveredPeer, Link, Radio};

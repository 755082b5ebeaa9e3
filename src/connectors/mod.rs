pub mod dry_run;
pub mod mock;
pub mod nav;

pub use dry_run::PaperVenue;
pub use mock::{MockVenue, RecordedCall};
pub use nav::{GatewayNavSource, SharedNavSource};

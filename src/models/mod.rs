pub mod analysis;
pub mod provider_payload;
pub use analysis::*;
pub use provider_payload::*;

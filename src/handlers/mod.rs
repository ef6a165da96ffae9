pub mod analysis_handlers;
pub mod fallback;
pub mod health;

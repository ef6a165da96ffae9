pub mod analysis_service;
pub mod legacy_key_resolver;
pub mod notification_service;
pub mod payload_mapper;

// Re-export commonly used types
pub use analysis_service::AnalysisService;
pub use notification_service::NotificationService;

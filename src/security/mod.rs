pub mod api_keys;
pub mod request_freshness;

pub use api_keys::{ApiKeySet, generate_api_key, is_valid_api_key_format, key_fingerprint};
pub use request_freshness::{TimestampPolicy, check_request_timestamp};

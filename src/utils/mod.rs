pub mod request_validation;
pub mod url_safety;

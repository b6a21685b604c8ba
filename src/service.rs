pub mod error;
pub mod matching_service;
pub mod emergency_service;
pub mod notification_service;
#[cfg(test)]
pub mod test_support;

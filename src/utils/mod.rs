pub mod address_validator;
pub mod time_utils;

// Re-export commonly used functions
pub use address_validator::AddressValidator;
pub use time_utils::*;

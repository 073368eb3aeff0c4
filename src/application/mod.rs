pub mod app_error;
pub mod clock;
pub mod token;
pub mod use_cases;
pub mod validators;

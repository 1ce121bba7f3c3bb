pub mod bootstrap_service;
pub mod claims_service;
pub mod credential_service;
pub mod login_service;
pub mod password_policy;
pub mod token_service;

pub mod password;
pub mod password_cache;
pub mod range;
pub mod s3;
pub mod validation;

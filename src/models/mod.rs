pub mod file;
pub mod folder;
pub mod response;

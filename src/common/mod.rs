pub mod perms;
pub mod types;

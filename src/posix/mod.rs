pub mod host;
pub mod identity;
pub mod infer;
pub mod mounts;
pub mod parser;
pub mod report;
pub mod resolver;

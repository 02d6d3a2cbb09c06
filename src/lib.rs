mod common;
pub mod config;
pub mod context;
pub mod logging;
pub mod posix;
pub mod probe;

#[cfg(not(unix))]
compile_error!("permtrace only supports Unix targets.");

pub use crate::common::perms::{decode_perms, encode_perms, PermissionRequest, DEFAULT_PERMS};
pub use crate::common::types::*;
pub use crate::config::CheckConfig;
pub use crate::context::Context;
pub use crate::logging::{log_disable, log_set_callback, log_set_level, log_set_stderr, LogError, LogRecord};
pub use crate::posix::host::HostProbe;
pub use crate::posix::identity::{Group, Identity};
pub use crate::posix::infer::{infer, Assessment, Label, ReportMode, Verdict};
pub use crate::posix::mounts::{MountRecord, MountTable};
pub use crate::posix::resolver::{resolve, resolve_path, Follow, PathSegment, ResolvedChain};
pub use crate::probe::{Probe, ProbeStat};

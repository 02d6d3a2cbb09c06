use std::fmt;
use std::io;
use std::path::PathBuf;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Operations a caller can ask about. `CREATE` and `DELETE` are meta
    /// operations that are translated into real mode bits before checking.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PermissionMask: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
        const CREATE = 1 << 3;
        const DELETE = 1 << 4;
    }
}

bitflags! {
    /// Why a segment is not (yet) accessible. The low five bits mirror
    /// `PermissionMask`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReasonMask: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
        const CREATE = 1 << 3;
        const DELETE = 1 << 4;
        const MOUNT_READONLY = 1 << 5;
        const MOUNT_NOEXEC = 1 << 6;
        const STICKY = 1 << 7;
        const UNDELETABLE_DESCENDANT = 1 << 8;
        const INDETERMINATE = 1 << 9;
    }
}

bitflags! {
    /// Which class of the mode triad granted a bit, plus the unconditional
    /// owner/root grants used for deleting non-directories.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GrantMask: u32 {
        const USER_READ = 1 << 0;
        const USER_WRITE = 1 << 1;
        const USER_EXECUTE = 1 << 2;
        const GROUP_READ = 1 << 4;
        const GROUP_WRITE = 1 << 5;
        const GROUP_EXECUTE = 1 << 6;
        const OTHER_READ = 1 << 8;
        const OTHER_WRITE = 1 << 9;
        const OTHER_EXECUTE = 1 << 10;
        const OWNER = 1 << 12;
        const ROOT = 1 << 13;

        const USER = Self::USER_READ.bits() | Self::USER_WRITE.bits() | Self::USER_EXECUTE.bits();
        const GROUP = Self::GROUP_READ.bits() | Self::GROUP_WRITE.bits() | Self::GROUP_EXECUTE.bits();
        const OTHER = Self::OTHER_READ.bits() | Self::OTHER_WRITE.bits() | Self::OTHER_EXECUTE.bits();
    }
}

impl From<PermissionMask> for ReasonMask {
    fn from(mask: PermissionMask) -> Self {
        ReasonMask::from_bits_truncate(mask.bits())
    }
}

impl ReasonMask {
    pub const PERMISSIONS: ReasonMask = ReasonMask::READ
        .union(ReasonMask::WRITE)
        .union(ReasonMask::EXECUTE);

    pub fn describe(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for (flag, text) in [
            (ReasonMask::READ, "no read"),
            (ReasonMask::WRITE, "no write"),
            (ReasonMask::EXECUTE, "no exec"),
            (ReasonMask::CREATE, "no create"),
            (ReasonMask::DELETE, "no delete"),
            (ReasonMask::MOUNT_READONLY, "mounted read-only"),
            (ReasonMask::MOUNT_NOEXEC, "mounted noexec"),
            (ReasonMask::STICKY, "sticky bit set"),
            (ReasonMask::UNDELETABLE_DESCENDANT, "has undeletable descendant"),
            (ReasonMask::INDETERMINATE, "could not inspect every descendant"),
        ] {
            if self.contains(flag) {
                out.push(text);
            }
        }
        out
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SegmentStatus {
    #[default]
    Ok,
    SymlinkLoopExceeded,
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentStatus::Ok => f.write_str("ok"),
            SegmentStatus::SymlinkLoopExceeded => f.write_str("too many levels of symbolic links"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum Verbosity {
    #[default]
    Quiet = 0,
    Verbose = 1,
    VeryVerbose = 2,
    VeryVeryVerbose = 3,
}

impl TryFrom<u8> for Verbosity {
    type Error = CheckError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Verbosity::Quiet),
            1 => Ok(Verbosity::Verbose),
            2 => Ok(Verbosity::VeryVerbose),
            3 => Ok(Verbosity::VeryVeryVerbose),
            other => Err(CheckError::InvalidVerbosityLevel(other)),
        }
    }
}

impl Verbosity {
    pub const MAX: u8 = Verbosity::VeryVeryVerbose as u8;

    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Quiet => log::LevelFilter::Warn,
            Verbosity::Verbose => log::LevelFilter::Info,
            Verbosity::VeryVerbose => log::LevelFilter::Debug,
            Verbosity::VeryVeryVerbose => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("file '{path}' {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("{} '{user}' does not exist", user_kind(.user))]
    InvalidUser { user: String },

    #[error("could not read mount table {path:?}: {source}")]
    MountTableUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not read groups of user '{user}': {source}")]
    GroupLookupFailed {
        user: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid verbosity level {0}")]
    InvalidVerbosityLevel(u8),

    #[error("you may only specify one user")]
    DuplicateUser,
}

impl CheckError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CheckError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn from_io(path: impl Into<String>, err: &io::Error) -> Self {
        let reason = match err.kind() {
            io::ErrorKind::NotFound => "does not exist".to_string(),
            io::ErrorKind::PermissionDenied => "cannot be inspected: permission denied".to_string(),
            _ => err.to_string(),
        };
        CheckError::invalid_path(path, reason)
    }
}

fn user_kind(user: &str) -> &'static str {
    if is_numeric(user) {
        "uid"
    } else {
        "username"
    }
}

pub(crate) fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

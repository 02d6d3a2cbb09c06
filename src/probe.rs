use std::io;

/// What a single lstat-equivalent reports about one directory entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProbeStat {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub is_symlink: bool,
}

/// Read-only view of the filesystem the resolver and inferencer work from.
///
/// Implementations must never follow a symlink in `lstat`.
pub trait Probe {
    fn lstat(&self, path: &str) -> io::Result<ProbeStat>;

    fn read_link(&self, path: &str) -> io::Result<String>;

    /// Entry names of a directory, without `.` and `..`.
    fn list_dir(&self, path: &str) -> io::Result<Vec<String>>;
}

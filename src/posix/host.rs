use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;

use crate::probe::{Probe, ProbeStat};

/// `Probe` backed by the host filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl HostProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Probe for HostProbe {
    fn lstat(&self, path: &str) -> io::Result<ProbeStat> {
        let meta = fs::symlink_metadata(path)?;
        Ok(ProbeStat {
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode(),
            is_symlink: meta.file_type().is_symlink(),
        })
    }

    fn read_link(&self, path: &str) -> io::Result<String> {
        let target = fs::read_link(path)?;
        target
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "symlink target is not valid UTF-8"))
    }

    fn list_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name();
            match std::str::from_utf8(name.as_bytes()) {
                Ok(valid) => names.push(valid.to_string()),
                Err(_) => {
                    log::warn!("entry {:?} in {path} is not valid UTF-8", name);
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "directory entry is not valid UTF-8",
                    ));
                }
            }
        }
        Ok(names)
    }
}

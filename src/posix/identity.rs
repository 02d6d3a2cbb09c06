use core::ffi::{c_char, c_int};
use std::ffi::{CStr, CString};
use std::io;
use std::mem;
use std::ptr;

use crate::common::types::{is_numeric, CheckError};

pub const UID_ROOT: u32 = 0;

const INITIAL_BUFFER: usize = 1024;
const MAX_BUFFER: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub gid: u32,
    pub name: String,
}

/// The user whose access is being evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub uid: u32,
    pub primary_gid: u32,
    /// Every group the user belongs to, primary group included.
    pub groups: Vec<Group>,
}

impl Identity {
    pub fn new(name: impl Into<String>, uid: u32, primary_gid: u32, mut groups: Vec<Group>) -> Self {
        if !groups.iter().any(|g| g.gid == primary_gid) {
            groups.insert(
                0,
                Group {
                    gid: primary_gid,
                    name: primary_gid.to_string(),
                },
            );
        }
        Self {
            name: name.into(),
            uid,
            primary_gid,
            groups,
        }
    }

    pub fn is_root(&self) -> bool {
        self.uid == UID_ROOT
    }

    pub fn in_group(&self, gid: u32) -> bool {
        self.groups.iter().any(|g| g.gid == gid)
    }

    pub fn group_name(&self, gid: u32) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.gid == gid)
            .map(|g| g.name.as_str())
    }

    /// Looks up a username, or a uid when `user` is all digits.
    pub fn load(user: &str) -> Result<Self, CheckError> {
        let lookup = if is_numeric(user) {
            let uid = user
                .parse::<u32>()
                .map_err(|_| CheckError::InvalidUser { user: user.to_string() })?;
            PasswdKey::Uid(uid)
        } else {
            let name = CString::new(user).map_err(|_| CheckError::InvalidUser { user: user.to_string() })?;
            PasswdKey::Name(name)
        };
        let entry = match lookup_passwd(&lookup) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Err(CheckError::InvalidUser { user: user.to_string() }),
            Err(err) => {
                log::warn!("passwd lookup for '{user}' failed: {err}");
                return Err(CheckError::InvalidUser { user: user.to_string() });
            }
        };
        let groups = resolve_groups(&entry.name, entry.gid, load_groups)?;
        log::debug!(
            "loaded user '{}' uid={} gid={} groups={}",
            entry.name,
            entry.uid,
            entry.gid,
            groups.len()
        );
        Ok(Self::new(entry.name, entry.uid, entry.gid, groups))
    }

    /// The identity of the running process.
    pub fn current() -> Result<Self, CheckError> {
        let uid = unsafe { libc::getuid() };
        Self::load(&uid.to_string())
    }
}

/// Runs `lookup` for the user's group list. A failed lookup is fatal: a
/// partial list would turn group grants into false denials.
fn resolve_groups<F>(user: &str, primary_gid: u32, lookup: F) -> Result<Vec<Group>, CheckError>
where
    F: FnOnce(&str, u32) -> io::Result<Vec<Group>>,
{
    lookup(user, primary_gid).map_err(|source| {
        log::debug!("group lookup for '{user}' failed: {source}");
        CheckError::GroupLookupFailed {
            user: user.to_string(),
            source,
        }
    })
}

enum PasswdKey {
    Name(CString),
    Uid(u32),
}

struct PasswdEntry {
    name: String,
    uid: u32,
    gid: u32,
}

fn lookup_passwd(key: &PasswdKey) -> io::Result<Option<PasswdEntry>> {
    let mut buf: Vec<c_char> = vec![0; INITIAL_BUFFER];
    loop {
        let mut pwd: libc::passwd = unsafe { mem::zeroed() };
        let mut result: *mut libc::passwd = ptr::null_mut();
        let rc = unsafe {
            match key {
                PasswdKey::Name(name) => {
                    libc::getpwnam_r(name.as_ptr(), &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
                }
                PasswdKey::Uid(uid) => libc::getpwuid_r(*uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result),
            }
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Ok(None);
        }
        let name = unsafe { CStr::from_ptr(pwd.pw_name) }.to_string_lossy().into_owned();
        return Ok(Some(PasswdEntry {
            name,
            uid: pwd.pw_uid,
            gid: pwd.pw_gid,
        }));
    }
}

fn load_groups(user: &str, primary_gid: u32) -> io::Result<Vec<Group>> {
    let c_user = CString::new(user).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "user name contains NUL"))?;
    let mut count: c_int = 32;
    let mut gids: Vec<libc::gid_t> = Vec::new();
    loop {
        gids.resize(count as usize, 0);
        let mut found = count;
        let rc = unsafe { libc::getgrouplist(c_user.as_ptr(), primary_gid, gids.as_mut_ptr(), &mut found) };
        if rc >= 0 {
            gids.truncate(found.max(0) as usize);
            break;
        }
        if found <= count {
            count = count.saturating_mul(2);
        } else {
            count = found;
        }
        if count as usize > MAX_BUFFER {
            return Err(io::Error::new(io::ErrorKind::Other, "too many supplementary groups"));
        }
    }

    let mut groups: Vec<Group> = Vec::with_capacity(gids.len());
    for gid in gids {
        if groups.iter().any(|g| g.gid == gid) {
            continue;
        }
        let name = group_name(gid)?.unwrap_or_else(|| gid.to_string());
        groups.push(Group { gid, name });
    }
    Ok(groups)
}

fn group_name(gid: u32) -> io::Result<Option<String>> {
    let mut buf: Vec<c_char> = vec![0; INITIAL_BUFFER];
    loop {
        let mut grp: libc::group = unsafe { mem::zeroed() };
        let mut result: *mut libc::group = ptr::null_mut();
        let rc = unsafe { libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut result) };
        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Ok(None);
        }
        let name = unsafe { CStr::from_ptr(grp.gr_name) }.to_string_lossy().into_owned();
        return Ok(Some(name));
    }
}

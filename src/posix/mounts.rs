use std::fs;
use std::path::Path;

use crate::common::types::{CheckError, PermissionMask};
use crate::config::{CheckConfig, FALLBACK_MOUNT_TABLE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub directory: String,
    pub device: String,
    pub mask: PermissionMask,
}

impl MountRecord {
    /// Builds a record from a comma separated option string as found in
    /// the fourth field of `/proc/self/mounts`.
    pub fn new(directory: impl Into<String>, device: impl Into<String>, options: &str) -> Self {
        Self {
            directory: directory.into(),
            device: device.into(),
            mask: mask_from_options(options),
        }
    }

    pub fn is_read_only(&self) -> bool {
        !self.mask.contains(PermissionMask::WRITE)
    }

    pub fn is_noexec(&self) -> bool {
        !self.mask.contains(PermissionMask::EXECUTE)
    }
}

fn mask_from_options(options: &str) -> PermissionMask {
    let mut mask = PermissionMask::READ | PermissionMask::WRITE | PermissionMask::EXECUTE;
    for option in options.split(',') {
        let key = option.split('=').next().unwrap_or_default();
        match key {
            "ro" | "rdonly" => mask.remove(PermissionMask::WRITE),
            "rw" => mask.insert(PermissionMask::WRITE),
            "noexec" => mask.remove(PermissionMask::EXECUTE),
            _ => {}
        }
    }
    mask
}

/// Host mount records in mount-table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTable {
    records: Vec<MountRecord>,
}

impl MountTable {
    pub fn new(records: Vec<MountRecord>) -> Self {
        Self { records }
    }

    /// Parses `fstab`-style lines: `device dir fstype options [freq pass]`.
    pub fn parse(text: &str) -> Self {
        let mut records = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                log::warn!("skipping malformed mount entry on line {}: {line:?}", lineno + 1);
                continue;
            }
            let record = MountRecord::new(unescape(fields[1]), unescape(fields[0]), fields[3]);
            log::trace!(
                "mount {} on {} mask={:?}",
                record.device,
                record.directory,
                record.mask
            );
            records.push(record);
        }
        Self { records }
    }

    pub fn load(config: &CheckConfig) -> Result<Self, CheckError> {
        match Self::load_from(&config.mount_table) {
            Ok(table) => Ok(table),
            Err(err) if !config.mount_table_explicit => {
                log::debug!(
                    "{} unreadable ({err}); trying {FALLBACK_MOUNT_TABLE}",
                    config.mount_table.display()
                );
                Self::load_from(Path::new(FALLBACK_MOUNT_TABLE))
            }
            Err(err) => Err(err),
        }
    }

    fn load_from(path: &Path) -> Result<Self, CheckError> {
        let text = fs::read_to_string(path).map_err(|source| CheckError::MountTableUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::parse(&text);
        log::debug!("loaded {} mount records from {}", table.len(), path.display());
        Ok(table)
    }

    /// Exact directory match. When a directory is mounted over several
    /// times the last (topmost) record wins.
    pub fn find(&self, directory: &str) -> Option<&MountRecord> {
        self.records.iter().rev().find(|record| record.directory == directory)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// mount tables escape space, tab, newline and backslash as \ooo
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

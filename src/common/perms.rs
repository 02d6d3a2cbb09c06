use crate::common::types::PermissionMask;

pub const DEFAULT_PERMS: &str = "r";

const LETTERS: [(char, PermissionMask); 5] = [
    ('r', PermissionMask::READ),
    ('w', PermissionMask::WRITE),
    ('x', PermissionMask::EXECUTE),
    ('c', PermissionMask::CREATE),
    ('d', PermissionMask::DELETE),
];

/// A requested permission set together with its canonical letter form.
///
/// `rendered` is always rebuilt from `mask`, so `"wr"`, `"rw"` and `"rrw"`
/// all render as `"rw"`. Unknown letters are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    mask: PermissionMask,
    rendered: String,
}

impl PermissionRequest {
    pub fn from_mask(mask: PermissionMask) -> Self {
        Self {
            mask,
            rendered: encode_perms(mask),
        }
    }

    pub fn parse(raw: &str) -> Self {
        Self::from_mask(decode_perms(raw))
    }

    pub fn mask(&self) -> PermissionMask {
        self.mask
    }

    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// The mode bits actually checked: create becomes write and is dropped,
    /// delete adds write but stays set for the terminal-segment rules.
    pub fn effective(&self) -> PermissionMask {
        let mut mask = self.mask;
        if mask.contains(PermissionMask::CREATE) {
            mask.insert(PermissionMask::WRITE);
            mask.remove(PermissionMask::CREATE);
        } else if mask.contains(PermissionMask::DELETE) {
            mask.insert(PermissionMask::WRITE);
        }
        mask
    }
}

impl Default for PermissionRequest {
    fn default() -> Self {
        Self::parse(DEFAULT_PERMS)
    }
}

pub fn decode_perms(raw: &str) -> PermissionMask {
    let mut mask = PermissionMask::empty();
    for ch in raw.chars() {
        match LETTERS.iter().find(|(letter, _)| *letter == ch) {
            Some((_, bit)) => mask.insert(*bit),
            None => log::debug!("ignoring unknown permission letter '{ch}'"),
        }
    }
    mask
}

pub fn encode_perms(mask: PermissionMask) -> String {
    LETTERS
        .iter()
        .filter(|(_, bit)| mask.contains(*bit))
        .map(|(letter, _)| *letter)
        .collect()
}

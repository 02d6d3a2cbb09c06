use crate::common::types::CheckError;

pub const PATHSEP: char = '/';

const MAX_INPUT_PATH_BYTES: usize = 32 * 1024;
const MAX_COMPONENT_BYTES: usize = 255;

/// Turns `raw` into the list of components below `/`.
///
/// A relative `raw` is taken relative to `cwd`. Empty components and `.`
/// are dropped; `..` pops the previous component and fails when there is
/// nothing left to pop.
pub fn normalize(raw: &str, cwd: &str) -> Result<Vec<String>, CheckError> {
    let joined;
    let full = if raw.starts_with(PATHSEP) {
        raw
    } else {
        joined = format!("{cwd}{PATHSEP}{raw}");
        &joined
    };
    if full.len() > MAX_INPUT_PATH_BYTES {
        return Err(CheckError::invalid_path(raw, "path too long"));
    }
    parse_components_iter(full.split(PATHSEP)).map_err(|reason| CheckError::invalid_path(full, reason))
}

fn parse_components_iter<'a, I>(iter: I) -> Result<Vec<String>, &'static str>
where
    I: Iterator<Item = &'a str>,
{
    let mut components: Vec<String> = Vec::new();
    for part in iter {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            if components.pop().is_none() {
                return Err("escapes root");
            }
            continue;
        }
        if part.len() > MAX_COMPONENT_BYTES {
            return Err("component too long");
        }
        components.push(part.to_string());
    }
    Ok(components)
}

pub fn render(components: &[String]) -> String {
    if components.is_empty() {
        return PATHSEP.to_string();
    }
    let mut out = String::new();
    for component in components {
        out.push(PATHSEP);
        out.push_str(component);
    }
    out
}

/// Absolute path of `component` inside the directory `parent`.
pub fn join(parent: &str, component: &str) -> String {
    if parent.ends_with(PATHSEP) {
        format!("{parent}{component}")
    } else {
        format!("{parent}{PATHSEP}{component}")
    }
}

use std::collections::VecDeque;

use crate::common::types::{CheckError, SegmentStatus};
use crate::context::Context;
use crate::posix::mounts::MountRecord;
use crate::posix::parser::{self, PATHSEP};

const S_IFMT: u32 = libc::S_IFMT as u32;
const S_IFDIR: u32 = libc::S_IFDIR as u32;
const S_ISVTX: u32 = libc::S_ISVTX as u32;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Follow {
    Symlinks,
    NoSymlinks,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EntryStat {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

impl EntryStat {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_sticky(&self) -> bool {
        self.mode & S_ISVTX != 0
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SegmentKind {
    /// A symlink that was followed; it carries no stat data of its own.
    Symlink { target: String },
    Entry(EntryStat),
}

/// One resolved step of a path.
///
/// Cloning duplicates every string but keeps pointing at the same
/// `MountRecord`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathSegment<'m> {
    pub abspath: String,
    pub dir: String,
    pub component: String,
    pub kind: SegmentKind,
    pub status: SegmentStatus,
    pub mount: Option<&'m MountRecord>,
}

impl<'m> PathSegment<'m> {
    pub fn stat(&self) -> Option<&EntryStat> {
        match &self.kind {
            SegmentKind::Entry(stat) => Some(stat),
            SegmentKind::Symlink { .. } => None,
        }
    }

    pub fn symlink_target(&self) -> Option<&str> {
        match &self.kind {
            SegmentKind::Symlink { target } => Some(target),
            SegmentKind::Entry(_) => None,
        }
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, SegmentKind::Symlink { .. })
    }

    pub fn is_dir(&self) -> bool {
        self.stat().is_some_and(EntryStat::is_dir)
    }

    pub fn is_sticky(&self) -> bool {
        self.stat().is_some_and(EntryStat::is_sticky)
    }

    /// True when this segment is itself the directory a mount is attached to.
    pub fn is_mount_point(&self) -> bool {
        self.mount.is_some_and(|mount| mount.directory == self.abspath)
    }

    pub fn is_ok(&self) -> bool {
        self.status == SegmentStatus::Ok
    }
}

/// Every symlink followed, in encounter order, then the final chain from `/`
/// down to the target.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResolvedChain<'m> {
    segments: Vec<PathSegment<'m>>,
}

impl<'m> ResolvedChain<'m> {
    pub fn new(segments: Vec<PathSegment<'m>>) -> Self {
        Self { segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment<'m>> {
        self.segments.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathSegment<'m>> {
        self.segments.iter()
    }

    /// The followed symlinks recorded ahead of the final chain.
    pub fn links(&self) -> impl Iterator<Item = &PathSegment<'m>> {
        self.segments.iter().filter(|segment| segment.is_symlink())
    }
}

/// Walks `components` (as produced by `normalize`) from the root, probing
/// every step.
///
/// A followed symlink restarts the walk from its normalized target plus the
/// components that were still pending; segments resolved before the hop are
/// discarded but the symlink itself is kept for reporting. Once more than
/// `max_symlinks` links have been followed, the offending link becomes the
/// terminal segment with `SymlinkLoopExceeded` and resolution stops.
pub fn resolve<'c>(
    ctx: &'c Context,
    components: Vec<String>,
    follow: Follow,
) -> Result<ResolvedChain<'c>, CheckError> {
    let probe = ctx.probe();
    let mut pending: VecDeque<String> = components.into();
    let mut links: Vec<PathSegment<'c>> = Vec::new();
    let mut chain: Vec<PathSegment<'c>> = Vec::new();
    let mut hops = 0usize;

    loop {
        let (abspath, dir, component) = match chain.last() {
            None => (PATHSEP.to_string(), String::new(), PATHSEP.to_string()),
            Some(prev) => {
                let Some(component) = pending.pop_front() else {
                    break;
                };
                (parser::join(&prev.abspath, &component), prev.abspath.clone(), component)
            }
        };

        log::trace!("probing {abspath}");
        let stat = probe.lstat(&abspath).map_err(|err| {
            log::debug!("lstat {abspath} failed: {err}");
            CheckError::from_io(abspath.as_str(), &err)
        })?;

        if stat.is_symlink && follow == Follow::Symlinks {
            let target = probe
                .read_link(&abspath)
                .map_err(|err| CheckError::from_io(abspath.as_str(), &err))?;
            hops += 1;
            if hops > ctx.config.max_symlinks {
                log::warn!(
                    "symlink limit exceeded at {abspath} (limit={})",
                    ctx.config.max_symlinks
                );
                chain.clear();
                chain.push(PathSegment {
                    abspath,
                    dir,
                    component,
                    kind: SegmentKind::Symlink { target },
                    status: SegmentStatus::SymlinkLoopExceeded,
                    mount: None,
                });
                break;
            }

            let mut restart = parser::normalize(&target, &dir)?;
            log::debug!(
                "following {abspath} -> {target} (hop {hops}), restarting at {}",
                parser::render(&restart)
            );
            restart.extend(pending.drain(..));
            pending = restart.into();
            chain.clear();
            links.push(PathSegment {
                abspath,
                dir,
                component,
                kind: SegmentKind::Symlink { target },
                status: SegmentStatus::Ok,
                mount: None,
            });
            continue;
        }

        let mount = ctx
            .mounts
            .find(&abspath)
            .or_else(|| chain.last().and_then(|prev| prev.mount));
        chain.push(PathSegment {
            abspath,
            dir,
            component,
            kind: SegmentKind::Entry(EntryStat {
                uid: stat.uid,
                gid: stat.gid,
                mode: stat.mode,
            }),
            status: SegmentStatus::Ok,
            mount,
        });
    }

    links.extend(chain);
    Ok(ResolvedChain::new(links))
}

/// Normalizes and resolves `raw` in one step.
pub fn resolve_path<'c>(
    ctx: &'c Context,
    raw: &str,
    cwd: &str,
    follow: Follow,
) -> Result<ResolvedChain<'c>, CheckError> {
    let components = parser::normalize(raw, cwd)?;
    resolve(ctx, components, follow)
}

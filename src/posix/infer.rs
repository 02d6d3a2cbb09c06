use crate::common::perms::PermissionRequest;
use crate::common::types::{GrantMask, PermissionMask, ReasonMask};
use crate::context::Context;
use crate::posix::identity::Identity;
use crate::posix::mounts::MountRecord;
use crate::posix::parser;
use crate::posix::resolver::{resolve_path, EntryStat, Follow, PathSegment, ResolvedChain};

const S_IRUSR: u32 = libc::S_IRUSR as u32;
const S_IWUSR: u32 = libc::S_IWUSR as u32;
const S_IXUSR: u32 = libc::S_IXUSR as u32;
const S_IRGRP: u32 = libc::S_IRGRP as u32;
const S_IWGRP: u32 = libc::S_IWGRP as u32;
const S_IXGRP: u32 = libc::S_IXGRP as u32;
const S_IROTH: u32 = libc::S_IROTH as u32;
const S_IWOTH: u32 = libc::S_IWOTH as u32;
const S_IXOTH: u32 = libc::S_IXOTH as u32;
const ANY_EXEC: u32 = S_IXUSR | S_IXGRP | S_IXOTH;

struct Triad {
    bit: PermissionMask,
    user: (u32, GrantMask),
    group: (u32, GrantMask),
    other: (u32, GrantMask),
}

const TRIADS: [Triad; 3] = [
    Triad {
        bit: PermissionMask::READ,
        user: (S_IRUSR, GrantMask::USER_READ),
        group: (S_IRGRP, GrantMask::GROUP_READ),
        other: (S_IROTH, GrantMask::OTHER_READ),
    },
    Triad {
        bit: PermissionMask::WRITE,
        user: (S_IWUSR, GrantMask::USER_WRITE),
        group: (S_IWGRP, GrantMask::GROUP_WRITE),
        other: (S_IWOTH, GrantMask::OTHER_WRITE),
    },
    Triad {
        bit: PermissionMask::EXECUTE,
        user: (S_IXUSR, GrantMask::USER_EXECUTE),
        group: (S_IXGRP, GrantMask::GROUP_EXECUTE),
        other: (S_IXOTH, GrantMask::OTHER_EXECUTE),
    },
];

/// `Full` evaluates and reports every segment; `ErrorsOnly` stops at the
/// first segment that is not allowed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportMode {
    Full,
    ErrorsOnly,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Label {
    Ok,
    Blocked,
    Symlink,
    Error,
}

#[derive(Clone, Debug)]
pub struct Verdict<'m> {
    pub segment: PathSegment<'m>,
    pub label: Label,
    pub granted: GrantMask,
    pub unsatisfied: ReasonMask,
    /// First failing descendants found while checking a directory delete.
    pub blockers: Vec<Verdict<'m>>,
}

impl<'m> Verdict<'m> {
    fn new(segment: PathSegment<'m>, label: Label) -> Self {
        Self {
            segment,
            label,
            granted: GrantMask::empty(),
            unsatisfied: ReasonMask::empty(),
            blockers: Vec::new(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.label != Label::Error && self.unsatisfied.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Assessment<'m> {
    pub allowed: bool,
    pub verdicts: Vec<Verdict<'m>>,
}

impl<'m> Assessment<'m> {
    /// The segment the request was about: the last one evaluated.
    pub fn target(&self) -> Option<&PathSegment<'m>> {
        self.verdicts.last().map(|verdict| &verdict.segment)
    }

    pub fn unsatisfied(&self) -> ReasonMask {
        self.verdicts
            .iter()
            .fold(ReasonMask::empty(), |acc, verdict| acc | verdict.unsatisfied)
    }
}

/// Decides, segment by segment, whether `ctx.identity` can perform
/// `request` on the target of `chain`.
pub fn infer<'c>(
    ctx: &'c Context,
    chain: &ResolvedChain<'c>,
    request: &PermissionRequest,
    mode: ReportMode,
) -> Assessment<'c> {
    let walk = Walk {
        ctx,
        request,
        depth: 0,
    };
    walk.run(chain, mode)
}

struct Walk<'c, 'r> {
    ctx: &'c Context,
    request: &'r PermissionRequest,
    /// Nesting level of directory-delete scans.
    depth: usize,
}

impl<'c, 'r> Walk<'c, 'r> {
    fn run(&self, chain: &ResolvedChain<'c>, mode: ReportMode) -> Assessment<'c> {
        let effective = self.request.effective();
        let last_index = chain.len().saturating_sub(1);
        let mut sticky_seen = false;
        let mut allowed = true;
        let mut verdicts = Vec::with_capacity(chain.len());

        for (index, segment) in chain.iter().enumerate() {
            if segment.is_sticky() {
                sticky_seen = true;
            }
            let verdict = self.evaluate(segment, effective, sticky_seen, index == last_index);
            log::trace!(
                "{} {:?} granted={:?} unsatisfied={:?}",
                verdict.segment.abspath,
                verdict.label,
                verdict.granted,
                verdict.unsatisfied
            );
            if !verdict.is_allowed() {
                allowed = false;
            }
            verdicts.push(verdict);
            if mode == ReportMode::ErrorsOnly && !allowed {
                break;
            }
        }

        Assessment { allowed, verdicts }
    }

    fn evaluate(
        &self,
        segment: &PathSegment<'c>,
        effective: PermissionMask,
        sticky_seen: bool,
        last: bool,
    ) -> Verdict<'c> {
        if !segment.is_ok() {
            return Verdict::new(segment.clone(), Label::Error);
        }
        let Some(stat) = segment.stat() else {
            return Verdict::new(segment.clone(), Label::Symlink);
        };
        let identity = &self.ctx.identity;
        let mut verdict = Verdict::new(segment.clone(), Label::Ok);

        let mut required = if last {
            effective
        } else {
            PermissionMask::EXECUTE
        };
        let mut satisfied = PermissionMask::empty();
        let mut blocked = ReasonMask::empty();

        let read_only_mount = segment.is_mount_point()
            && required.contains(PermissionMask::WRITE)
            && segment.mount.is_some_and(MountRecord::is_read_only);
        if read_only_mount {
            blocked.insert(ReasonMask::MOUNT_READONLY);
        } else {
            if last && stat.is_dir() && required.contains(PermissionMask::DELETE) {
                required.insert(PermissionMask::READ | PermissionMask::WRITE | PermissionMask::EXECUTE);
            }
            let mut wanted = required;
            if last
                && !stat.is_dir()
                && required.contains(PermissionMask::EXECUTE)
                && segment.mount.is_some_and(MountRecord::is_noexec)
            {
                blocked.insert(ReasonMask::MOUNT_NOEXEC);
                wanted.remove(PermissionMask::EXECUTE);
            }
            let (bits, grants) = mode_grants(stat, identity, wanted);
            satisfied |= bits;
            verdict.granted |= grants;
        }

        let mut unsatisfied = ReasonMask::from(required - satisfied) | blocked;

        if last {
            if !stat.is_dir() {
                if unsatisfied.contains(ReasonMask::DELETE) {
                    unsatisfied.remove(ReasonMask::DELETE);
                    if stat.uid == identity.uid || identity.is_root() {
                        unsatisfied.remove(ReasonMask::PERMISSIONS);
                        verdict.granted |= if identity.is_root() {
                            GrantMask::ROOT
                        } else {
                            GrantMask::OWNER
                        };
                    } else if sticky_seen {
                        unsatisfied.insert(ReasonMask::STICKY);
                    }
                }
            } else {
                if self.request.mask().contains(PermissionMask::CREATE)
                    && sticky_seen
                    && stat.uid != identity.uid
                    && !identity.is_root()
                {
                    unsatisfied.insert(ReasonMask::STICKY);
                }
                if unsatisfied.contains(ReasonMask::DELETE) {
                    if !unsatisfied.intersects(ReasonMask::PERMISSIONS) {
                        unsatisfied.remove(ReasonMask::DELETE);
                    }
                    if unsatisfied.is_empty() {
                        if identity.is_root() {
                            verdict.granted |= GrantMask::ROOT;
                        } else {
                            let (reasons, blockers) = self.scan_descendants(segment);
                            unsatisfied |= reasons;
                            verdict.blockers = blockers;
                        }
                    }
                }
            }
        }

        verdict.unsatisfied = unsatisfied;
        verdict.label = if unsatisfied.is_empty() {
            Label::Ok
        } else {
            Label::Blocked
        };
        verdict
    }

    /// Checks that every entry below `dir` could be deleted too.
    ///
    /// The whole level is scanned first (files immediately, directories
    /// queued); subdirectories are only descended into when nothing at the
    /// current level blocks, and the first blocking subdirectory ends the
    /// scan.
    fn scan_descendants(&self, dir: &PathSegment<'c>) -> (ReasonMask, Vec<Verdict<'c>>) {
        if let Some(limit) = self.ctx.config.max_delete_depth {
            if self.depth >= limit {
                log::warn!(
                    "delete scan depth limit reached at {} (limit={limit})",
                    dir.abspath
                );
                return (ReasonMask::INDETERMINATE, Vec::new());
            }
        }

        let names = match self.ctx.probe().list_dir(&dir.abspath) {
            Ok(names) => names,
            Err(err) => {
                log::info!("cannot list {}: {err}", dir.abspath);
                return (ReasonMask::INDETERMINATE, Vec::new());
            }
        };
        log::debug!(
            "scanning {} entries below {} (depth {})",
            names.len(),
            dir.abspath,
            self.depth
        );

        let child_request = PermissionRequest::from_mask(PermissionMask::DELETE);
        let child = Walk {
            ctx: self.ctx,
            request: &child_request,
            depth: self.depth + 1,
        };

        let mut reasons = ReasonMask::empty();
        let mut blockers = Vec::new();
        let mut deferred: Vec<ResolvedChain<'c>> = Vec::new();

        for name in names {
            if name == "." || name == ".." {
                continue;
            }
            let path = parser::join(&dir.abspath, &name);
            let chain = match resolve_path(self.ctx, &path, "/", Follow::NoSymlinks) {
                Ok(chain) => chain,
                Err(err) => {
                    log::info!("cannot inspect {path}: {err}");
                    reasons.insert(ReasonMask::INDETERMINATE);
                    continue;
                }
            };
            if chain.last().is_some_and(PathSegment::is_dir) {
                deferred.push(chain);
                continue;
            }
            let assessment = child.run(&chain, ReportMode::ErrorsOnly);
            if !assessment.allowed {
                reasons |= classify_failure(&assessment);
                blockers.extend(assessment.verdicts.into_iter().last());
            }
        }

        if reasons.contains(ReasonMask::UNDELETABLE_DESCENDANT) {
            return (reasons, blockers);
        }

        for chain in deferred {
            let assessment = child.run(&chain, ReportMode::ErrorsOnly);
            if assessment.allowed {
                continue;
            }
            let failure = classify_failure(&assessment);
            reasons |= failure;
            blockers.extend(assessment.verdicts.into_iter().last());
            if failure.contains(ReasonMask::UNDELETABLE_DESCENDANT) {
                break;
            }
        }

        (reasons, blockers)
    }
}

// a child that could only not be fully inspected keeps the parent indeterminate
// rather than blocked
fn classify_failure(assessment: &Assessment<'_>) -> ReasonMask {
    if assessment.unsatisfied() == ReasonMask::INDETERMINATE {
        ReasonMask::INDETERMINATE
    } else {
        ReasonMask::UNDELETABLE_DESCENDANT
    }
}

fn mode_grants(stat: &EntryStat, identity: &Identity, wanted: PermissionMask) -> (PermissionMask, GrantMask) {
    let mut satisfied = PermissionMask::empty();
    let mut granted = GrantMask::empty();
    let owner = stat.uid == identity.uid;

    for triad in TRIADS.iter().filter(|triad| wanted.contains(triad.bit)) {
        let via_user = if triad.bit == PermissionMask::EXECUTE {
            (identity.is_root() && stat.mode & ANY_EXEC != 0) || (stat.mode & triad.user.0 != 0 && owner)
        } else {
            (stat.mode & triad.user.0 != 0 && owner) || identity.is_root()
        };
        let grant = if via_user {
            Some(triad.user.1)
        } else if stat.mode & triad.group.0 != 0 && identity.in_group(stat.gid) {
            Some(triad.group.1)
        } else if stat.mode & triad.other.0 != 0 {
            Some(triad.other.1)
        } else {
            None
        };
        if let Some(grant) = grant {
            satisfied.insert(triad.bit);
            granted.insert(grant);
        }
    }

    (satisfied, granted)
}

use std::fmt::Write as _;
use std::io;

use crate::common::perms::PermissionRequest;
use crate::common::types::{GrantMask, Verbosity};
use crate::posix::identity::Identity;
use crate::posix::infer::{Assessment, Label, Verdict};

pub const LABEL_OK: &str = "OK";
pub const LABEL_NOT_OK: &str = "!!";
pub const LABEL_SYMLINK: &str = "LN";

const INDENT: &str = "  ";

pub fn label_text(label: Label) -> &'static str {
    match label {
        Label::Ok => LABEL_OK,
        Label::Blocked | Label::Error => LABEL_NOT_OK,
        Label::Symlink => LABEL_SYMLINK,
    }
}

/// One line describing a single segment, without a trailing newline.
///
/// Entries: `OK /usr (u+rx,g+x) (mnt /dev/sda1) (group staff) no write`.
/// Symlinks: `LN /lib -> usr/lib`.
pub fn render_verdict(verdict: &Verdict<'_>, identity: &Identity) -> String {
    let segment = &verdict.segment;
    let mut line = String::new();

    if let Some(target) = segment.symlink_target() {
        let _ = write!(line, "{} {} -> {target}", label_text(verdict.label), segment.abspath);
        if !segment.is_ok() {
            let _ = write!(line, " {}", segment.status);
        }
        return line;
    }

    let _ = write!(line, "{} {}", label_text(verdict.label), segment.abspath);
    if !segment.is_ok() {
        let _ = write!(line, " {}", segment.status);
        return line;
    }

    let _ = write!(line, " ({})", render_grants(verdict.granted));

    if segment.is_mount_point() {
        if let Some(mount) = segment.mount {
            let _ = write!(line, " (mnt {})", mount.device);
        }
    }

    if verdict.granted.intersects(GrantMask::GROUP) {
        let gid = segment.stat().map(|stat| stat.gid);
        let name = gid.and_then(|gid| identity.group_name(gid)).unwrap_or("?");
        let _ = write!(line, " (group {name})");
    }

    let reasons = verdict.unsatisfied.describe();
    if !reasons.is_empty() {
        let _ = write!(line, " {}", reasons.join(", "));
    }
    line
}

fn render_grants(granted: GrantMask) -> String {
    let classes = [
        ("u", GrantMask::USER, [GrantMask::USER_READ, GrantMask::USER_WRITE, GrantMask::USER_EXECUTE]),
        ("g", GrantMask::GROUP, [GrantMask::GROUP_READ, GrantMask::GROUP_WRITE, GrantMask::GROUP_EXECUTE]),
        ("o", GrantMask::OTHER, [GrantMask::OTHER_READ, GrantMask::OTHER_WRITE, GrantMask::OTHER_EXECUTE]),
    ];
    let mut parts: Vec<String> = Vec::new();
    for (class, all, bits) in classes {
        if !granted.intersects(all) {
            continue;
        }
        let mut part = format!("{class}+");
        for (bit, letter) in bits.into_iter().zip(['r', 'w', 'x']) {
            if granted.contains(bit) {
                part.push(letter);
            }
        }
        parts.push(part);
    }
    if granted.contains(GrantMask::OWNER) {
        parts.push("owner".to_string());
    } else if granted.contains(GrantMask::ROOT) {
        parts.push("root".to_string());
    }
    parts.join(",")
}

pub fn render_summary(assessment: &Assessment<'_>, identity: &Identity, request: &PermissionRequest) -> String {
    let path = assessment
        .target()
        .map_or("/", |segment| segment.abspath.as_str());
    if assessment.allowed {
        format!(
            "{LABEL_OK} user {} has perms {} on file {path}",
            identity.name,
            request.rendered()
        )
    } else {
        format!(
            "{LABEL_NOT_OK} user {} doesn't have perms {} on file {path}",
            identity.name,
            request.rendered()
        )
    }
}

/// Writes the per-segment lines (verbose and above), the blocking
/// descendants of a refused directory delete (most verbose only) and the
/// summary line.
pub fn write_report<W: io::Write>(
    out: &mut W,
    assessment: &Assessment<'_>,
    identity: &Identity,
    request: &PermissionRequest,
    verbosity: Verbosity,
) -> io::Result<()> {
    if verbosity >= Verbosity::Verbose {
        for verdict in &assessment.verdicts {
            writeln!(out, "{}", render_verdict(verdict, identity))?;
            if verbosity >= Verbosity::VeryVeryVerbose {
                write_blockers(out, verdict, identity, 1)?;
            }
        }
    }
    writeln!(out, "{}", render_summary(assessment, identity, request))
}

fn write_blockers<W: io::Write>(out: &mut W, verdict: &Verdict<'_>, identity: &Identity, depth: usize) -> io::Result<()> {
    for blocker in &verdict.blockers {
        writeln!(out, "{}{}", INDENT.repeat(depth), render_verdict(blocker, identity))?;
        write_blockers(out, blocker, identity, depth + 1)?;
    }
    Ok(())
}

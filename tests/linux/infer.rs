use permtrace::{
    infer, resolve_path, CheckConfig, Follow, GrantMask, Label, MountRecord, MountTable, PermissionRequest,
    ReasonMask, ReportMode,
};

use crate::fakefs::*;

#[test]
fn owner_reaches_private_file() {
    let ctx = context(tmp_tree(), alice());
    let assessment = check(&ctx, "/tmp/d/f", "rw");
    assert!(assessment.allowed);
    assert_eq!(assessment.verdicts.len(), 4);
    assert!(assessment.verdicts.iter().all(|v| v.label == Label::Ok));

    let target = assessment.verdicts.last().expect("target verdict");
    assert_eq!(target.granted, GrantMask::USER_READ | GrantMask::USER_WRITE);
}

#[test]
fn stranger_is_stopped_at_private_directory() {
    let ctx = context(tmp_tree(), bob());
    let assessment = check(&ctx, "/tmp/d/f", "rw");
    assert!(!assessment.allowed);

    let blocked = &assessment.verdicts[2];
    assert_eq!(blocked.segment.abspath, "/tmp/d");
    assert_eq!(blocked.label, Label::Blocked);
    assert_eq!(blocked.unsatisfied, ReasonMask::EXECUTE);

    // full mode keeps reporting past the failure
    assert_eq!(assessment.verdicts.len(), 4);
    let target = &assessment.verdicts[3];
    assert_eq!(target.unsatisfied, ReasonMask::READ | ReasonMask::WRITE);
}

#[test]
fn group_readable_file_in_owned_directory_denies_write() {
    let fs = FakeFs::new()
        .dir("/tmp", ROOT, 0, 0o1777)
        .dir("/tmp/d", ALICE, USERS, 0o700)
        .file("/tmp/d/f", 2000, USERS, 0o640);
    let ctx = context(fs, alice());
    let assessment = check(&ctx, "/tmp/d/f", "rw");
    assert!(!assessment.allowed);

    let tmp = &assessment.verdicts[1];
    assert_eq!(tmp.segment.abspath, "/tmp");
    assert_eq!(tmp.granted, GrantMask::OTHER_EXECUTE);

    let dir = &assessment.verdicts[2];
    assert_eq!(dir.segment.abspath, "/tmp/d");
    assert_eq!(dir.granted, GrantMask::USER_EXECUTE);

    let target = &assessment.verdicts[3];
    assert_eq!(target.label, Label::Blocked);
    assert_eq!(target.granted, GrantMask::GROUP_READ);
    assert_eq!(target.unsatisfied, ReasonMask::WRITE);
}

#[test]
fn errors_only_mode_stops_at_first_failure() {
    let ctx = context(tmp_tree(), bob());
    let chain = resolve_path(&ctx, "/tmp/d/f", "/", Follow::Symlinks).expect("resolves");
    let assessment = infer(&ctx, &chain, &PermissionRequest::parse("r"), ReportMode::ErrorsOnly);
    assert!(!assessment.allowed);
    assert_eq!(assessment.verdicts.len(), 3);
    assert_eq!(assessment.target().expect("last").abspath, "/tmp/d");
}

#[test]
fn group_membership_grants_access() {
    let fs = FakeFs::new()
        .dir("/srv", ROOT, 0, 0o755)
        .file("/srv/report", ROOT, STAFF, 0o640);
    let ctx = context(fs.clone(), alice());
    let assessment = check(&ctx, "/srv/report", "r");
    assert!(assessment.allowed);
    assert_eq!(
        assessment.verdicts.last().expect("target").granted,
        GrantMask::GROUP_READ
    );

    let ctx = context(fs, bob());
    assert!(!check(&ctx, "/srv/report", "r").allowed);
}

#[test]
fn root_bypasses_read_and_write_but_not_exec() {
    let fs = FakeFs::new()
        .dir("/home", ROOT, 0, 0o755)
        .file("/home/secret", ALICE, USERS, 0o000)
        .file("/home/notes", ALICE, USERS, 0o644)
        .file("/home/tool", ALICE, USERS, 0o701);
    let ctx = context(fs, root());

    assert!(check(&ctx, "/home/secret", "rw").allowed);

    let notes = check(&ctx, "/home/notes", "x");
    assert!(!notes.allowed);
    assert_eq!(notes.verdicts.last().expect("target").unsatisfied, ReasonMask::EXECUTE);

    let tool = check(&ctx, "/home/tool", "x");
    assert!(tool.allowed);
    assert_eq!(
        tool.verdicts.last().expect("target").granted,
        GrantMask::USER_EXECUTE
    );
}

#[test]
fn read_only_mount_point_refuses_write() {
    let fs = FakeFs::new()
        .dir("/mnt", ROOT, 0, 0o777)
        .file("/mnt/f", ROOT, 0, 0o666);
    let mounts = MountTable::new(vec![
        MountRecord::new("/", "/dev/root", "rw"),
        MountRecord::new("/mnt", "/dev/sr0", "ro"),
    ]);
    let ctx = context_with(fs, alice(), mounts, CheckConfig::default());

    let mount_point = check(&ctx, "/mnt", "w");
    assert!(!mount_point.allowed);
    let verdict = mount_point.verdicts.last().expect("target");
    assert!(verdict.unsatisfied.contains(ReasonMask::MOUNT_READONLY));
    assert!(verdict.granted.is_empty());

    assert!(check(&ctx, "/mnt", "r").allowed);
}

#[test]
fn read_only_mount_overrides_owner_and_open_mode() {
    let fs = FakeFs::new().dir("/mnt", ALICE, USERS, 0o777);
    let mounts = MountTable::new(vec![
        MountRecord::new("/", "/dev/root", "rw"),
        MountRecord::new("/mnt", "/dev/sdb1", "ro"),
    ]);
    let ctx = context_with(fs, alice(), mounts, CheckConfig::default());

    let assessment = check(&ctx, "/mnt", "w");
    assert!(!assessment.allowed);
    let target = assessment.verdicts.last().expect("target");
    assert_eq!(target.label, Label::Blocked);
    assert_eq!(target.unsatisfied, ReasonMask::WRITE | ReasonMask::MOUNT_READONLY);
}

#[test]
fn noexec_mount_refuses_execution_of_files() {
    let fs = FakeFs::new()
        .dir("/opt", ROOT, 0, 0o755)
        .file("/opt/tool", ROOT, 0, 0o755);
    let mounts = MountTable::new(vec![
        MountRecord::new("/", "/dev/root", "rw"),
        MountRecord::new("/opt", "/dev/sdb1", "rw,noexec"),
    ]);
    let ctx = context_with(fs, alice(), mounts, CheckConfig::default());

    let tool = check(&ctx, "/opt/tool", "x");
    assert!(!tool.allowed);
    assert_eq!(
        tool.verdicts.last().expect("target").unsatisfied,
        ReasonMask::MOUNT_NOEXEC | ReasonMask::EXECUTE
    );

    assert!(check(&ctx, "/opt", "x").allowed);
    assert!(check(&ctx, "/opt/tool", "r").allowed);
}

#[test]
fn sticky_directory_protects_other_users_files() {
    let fs = FakeFs::new()
        .dir("/tmp", ROOT, 0, 0o1777)
        .file("/tmp/f", ALICE, USERS, 0o666)
        .dir("/shared", ROOT, 0, 0o777)
        .file("/shared/f", ALICE, USERS, 0o666);

    let ctx = context(fs.clone(), bob());
    let denied = check(&ctx, "/tmp/f", "d");
    assert!(!denied.allowed);
    assert_eq!(denied.verdicts.last().expect("target").unsatisfied, ReasonMask::STICKY);
    assert!(check(&ctx, "/shared/f", "d").allowed);

    let ctx = context(fs, alice());
    let owned = check(&ctx, "/tmp/f", "d");
    assert!(owned.allowed);
    assert!(owned
        .verdicts
        .last()
        .expect("target")
        .granted
        .contains(GrantMask::OWNER));
}

#[test]
fn create_in_sticky_directory_needs_ownership() {
    let fs = FakeFs::new()
        .dir("/tmp", ROOT, 0, 0o1777)
        .dir("/home", ROOT, 0, 0o755)
        .dir("/home/alice", ALICE, USERS, 0o755);

    let ctx = context(fs.clone(), bob());
    let tmp = check(&ctx, "/tmp", "c");
    assert!(!tmp.allowed);
    assert!(tmp
        .verdicts
        .last()
        .expect("target")
        .unsatisfied
        .contains(ReasonMask::STICKY));

    let ctx = context(fs.clone(), alice());
    assert!(check(&ctx, "/home/alice", "c").allowed);

    let ctx = context(fs, root());
    assert!(check(&ctx, "/tmp", "c").allowed);
}

#[test]
fn empty_owned_directory_can_be_deleted() {
    let fs = FakeFs::new()
        .dir("/home", ROOT, 0, 0o755)
        .dir("/home/alice", ALICE, USERS, 0o755)
        .dir("/home/alice/empty", ALICE, USERS, 0o700);
    let ctx = context(fs, alice());
    let assessment = check(&ctx, "/home/alice/empty", "d");
    assert!(assessment.allowed);
    assert!(assessment.verdicts.last().expect("target").blockers.is_empty());
}

#[test]
fn directory_delete_requires_full_access_to_itself() {
    let fs = FakeFs::new()
        .dir("/home", ROOT, 0, 0o755)
        .dir("/home/alice", ALICE, USERS, 0o500);
    let ctx = context(fs, alice());
    let assessment = check(&ctx, "/home/alice", "d");
    assert!(!assessment.allowed);
    let unsatisfied = assessment.verdicts.last().expect("target").unsatisfied;
    assert!(unsatisfied.contains(ReasonMask::WRITE));
    assert!(unsatisfied.contains(ReasonMask::DELETE));
}

fn work_tree() -> FakeFs {
    FakeFs::new()
        .dir("/work", ALICE, USERS, 0o1777)
        .file("/work/mine", ALICE, USERS, 0o644)
        .file("/work/theirs", BOB, 200, 0o644)
}

#[test]
fn sticky_blocked_file_makes_directory_undeletable() {
    let ctx = context(work_tree(), alice());
    let assessment = check(&ctx, "/work", "d");
    assert!(!assessment.allowed);

    let target = assessment.verdicts.last().expect("target");
    assert_eq!(target.unsatisfied, ReasonMask::UNDELETABLE_DESCENDANT);
    assert_eq!(target.blockers.len(), 1);
    let blocker = &target.blockers[0];
    assert_eq!(blocker.segment.abspath, "/work/theirs");
    assert!(blocker.unsatisfied.contains(ReasonMask::STICKY));
}

#[test]
fn root_skips_the_descendant_scan() {
    let ctx = context(work_tree(), root());
    let assessment = check(&ctx, "/work", "d");
    assert!(assessment.allowed);
    let target = assessment.verdicts.last().expect("target");
    assert!(target.granted.contains(GrantMask::ROOT));
    assert!(target.blockers.is_empty());
}

#[test]
fn nested_blocker_is_found_in_subdirectory() {
    let fs = FakeFs::new()
        .dir("/work", ALICE, USERS, 0o755)
        .file("/work/a", ALICE, USERS, 0o644)
        .dir("/work/sub", ALICE, USERS, 0o1777)
        .file("/work/sub/theirs", BOB, 200, 0o600)
        .dir("/work/zzz", ALICE, USERS, 0o700);
    let ctx = context(fs, alice());
    let assessment = check(&ctx, "/work", "d");
    assert!(!assessment.allowed);

    let target = assessment.verdicts.last().expect("target");
    assert_eq!(target.unsatisfied, ReasonMask::UNDELETABLE_DESCENDANT);
    assert_eq!(target.blockers.len(), 1);
    let sub = &target.blockers[0];
    assert_eq!(sub.segment.abspath, "/work/sub");
    assert_eq!(sub.blockers[0].segment.abspath, "/work/sub/theirs");
}

#[test]
fn unlistable_directory_is_indeterminate() {
    let fs = FakeFs::new()
        .dir("/work", ALICE, USERS, 0o700)
        .unlistable("/work");
    let ctx = context(fs, alice());
    let assessment = check(&ctx, "/work", "d");
    assert!(!assessment.allowed);
    assert_eq!(
        assessment.verdicts.last().expect("target").unsatisfied,
        ReasonMask::INDETERMINATE
    );
}

#[test]
fn depth_limit_marks_subtree_indeterminate() {
    let fs = FakeFs::new()
        .dir("/work", ALICE, USERS, 0o700)
        .dir("/work/a", ALICE, USERS, 0o700)
        .dir("/work/a/b", ALICE, USERS, 0o700);
    let config = CheckConfig {
        max_delete_depth: Some(1),
        ..CheckConfig::default()
    };
    let ctx = context_with(fs.clone(), alice(), root_mount(), config);
    let assessment = check(&ctx, "/work", "d");
    assert!(!assessment.allowed);
    assert_eq!(
        assessment.verdicts.last().expect("target").unsatisfied,
        ReasonMask::INDETERMINATE
    );

    let unbounded = CheckConfig {
        max_delete_depth: None,
        ..CheckConfig::default()
    };
    let ctx = context_with(fs, alice(), root_mount(), unbounded);
    assert!(check(&ctx, "/work", "d").allowed);
}

#[test]
fn symlink_segments_are_informational() {
    let fs = FakeFs::new()
        .symlink("/lnk", "/data")
        .dir("/data", ROOT, 0, 0o755)
        .file("/data/f", ROOT, 0, 0o644);
    let ctx = context(fs, alice());
    let assessment = check(&ctx, "/lnk/f", "r");
    assert!(assessment.allowed);
    assert_eq!(assessment.verdicts[0].label, Label::Symlink);
    assert!(assessment.verdicts[0].unsatisfied.is_empty());
    assert_eq!(assessment.target().expect("target").abspath, "/data/f");
}

#[test]
fn symlink_loop_makes_the_result_false() {
    let fs = FakeFs::new().symlink("/a", "/b").symlink("/b", "/a");
    let ctx = context(fs, alice());
    let assessment = check(&ctx, "/a", "r");
    assert!(!assessment.allowed);
    assert_eq!(assessment.verdicts.len(), 21);
    assert_eq!(assessment.verdicts.last().expect("target").label, Label::Error);
}

use std::io::Write;

use permtrace::{CheckConfig, CheckError, MountTable};

const SAMPLE: &str = "\
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /tmp tmpfs rw,nosuid,nodev,noexec 0 0
/dev/sdb1 /mnt/my\\040disk vfat ro,noatime 0 0
broken-line
/dev/sr0 /mnt/cdrom iso9660 ro 0 0
/dev/sdc1 /mnt/cdrom ext4 rw 0 0
";

#[test]
fn parses_records_and_skips_malformed_lines() {
    let table = MountTable::parse(SAMPLE);
    assert_eq!(table.len(), 6);

    let root = table.find("/").expect("root mount");
    assert_eq!(root.device, "/dev/sda1");
    assert!(!root.is_read_only());

    let tmp = table.find("/tmp").expect("tmp mount");
    assert!(tmp.is_noexec());
}

#[test]
fn escaped_directories_are_decoded() {
    let table = MountTable::parse(SAMPLE);
    let disk = table.find("/mnt/my disk").expect("escaped mount");
    assert!(disk.is_read_only());
    assert_eq!(disk.device, "/dev/sdb1");
}

#[test]
fn lookup_is_exact_and_last_record_wins() {
    let table = MountTable::parse(SAMPLE);
    let cdrom = table.find("/mnt/cdrom").expect("stacked mount");
    assert_eq!(cdrom.device, "/dev/sdc1");
    assert!(!cdrom.is_read_only());

    assert!(table.find("/mnt").is_none());
    assert!(table.find("/tmp/sub").is_none());
}

#[test]
fn load_reads_configured_table() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(SAMPLE.as_bytes()).expect("write table");

    let config = CheckConfig {
        mount_table: file.path().to_path_buf(),
        mount_table_explicit: true,
        ..CheckConfig::default()
    };
    let table = MountTable::load(&config).expect("table loads");
    assert_eq!(table.len(), 6);
}

#[test]
fn explicit_missing_table_is_fatal() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = CheckConfig {
        mount_table: dir.path().join("no-such-mounts"),
        mount_table_explicit: true,
        ..CheckConfig::default()
    };
    let err = MountTable::load(&config).unwrap_err();
    assert!(matches!(err, CheckError::MountTableUnreadable { .. }));
    assert!(err.to_string().starts_with("could not read mount table"));
}

#![allow(unused)]

use std::sync::Arc;

mod common;

use common::init_logger;
use fatfs_lite::AccessRights;
use fatfs_lite::DirBlock;
use fatfs_lite::Error;
use fatfs_lite::FileSystem;
use fatfs_lite::RamDisk;

fn new_fs() -> FileSystem<RamDisk> {
    init_logger();
    FileSystem::format(Arc::new(RamDisk::new(64))).unwrap()
}

#[test]
fn test_read_execute_file() {
    let mut fs = new_fs();
    fs.create("f", b"original\n").unwrap();
    fs.create("src", b"more\n").unwrap();

    fs.chmod("5", "f").unwrap();
    assert_eq!(fs.append("src", "f"), Err(Error::PermissionDenied));
    assert_eq!(fs.cat("f").unwrap(), b"original\n");
    assert_eq!(fs.ls().unwrap().get("f").unwrap().rights.to_string(), "r-x");
}

#[test]
fn test_unreadable_file() {
    let mut fs = new_fs();
    fs.create("f", b"secret").unwrap();
    fs.create("g", b"").unwrap();
    fs.chmod("3", "f").unwrap();
    assert_eq!(fs.cat("f"), Err(Error::PermissionDenied));
    assert_eq!(fs.cp("f", "copy"), Err(Error::PermissionDenied));
    assert_eq!(fs.append("f", "g"), Err(Error::PermissionDenied));

    // Write-only is still a valid append target.
    fs.append("g", "f").unwrap();
    fs.chmod("6", "f").unwrap();
    assert_eq!(fs.cat("f").unwrap(), b"secret");
}

#[test]
fn test_chmod_arguments() {
    let mut fs = new_fs();
    fs.create("f", b"").unwrap();
    assert_eq!(fs.chmod("8", "f"), Err(Error::InvalidArgument));
    assert_eq!(fs.chmod("rw", "f"), Err(Error::InvalidArgument));
    assert_eq!(fs.chmod("17", "f"), Err(Error::InvalidArgument));
    assert_eq!(fs.chmod("7", "missing"), Err(Error::NotFound));
    assert_eq!(fs.chmod("7", "/"), Err(Error::InvalidArgument));
    fs.chmod("0", "f").unwrap();
    assert_eq!(fs.ls().unwrap().get("f").unwrap().rights, AccessRights::empty());
}

#[test]
fn test_directory_without_execute() {
    let mut fs = new_fs();
    fs.mkdir("d").unwrap();
    fs.mkdir("d/sub").unwrap();
    fs.create("d/f", b"x").unwrap();

    fs.chmod("6", "d").unwrap();
    assert_eq!(fs.cd("d/sub"), Err(Error::PermissionDenied));
    assert_eq!(fs.create("d/sub/new", b""), Err(Error::PermissionDenied));
    assert_eq!(fs.cat("d/sub/../f"), Err(Error::PermissionDenied));
    assert_eq!(fs.pwd().unwrap(), "/");

    // The last segment of a resolution is not searched through, and the
    // parent of a leaf is the last segment of its own resolution.
    assert_eq!(fs.cat("d/f").unwrap(), b"x");
    fs.cd("d").unwrap();
    assert_eq!(fs.cat("f").unwrap(), b"x");
    fs.cd("/").unwrap();
    fs.chmod("7", "d").unwrap();
    fs.cd("d/sub").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/d/sub");
}

#[test]
fn test_read_only_directory() {
    let mut fs = new_fs();
    fs.mkdir("d").unwrap();
    fs.create("d/f", b"x").unwrap();
    fs.create("outside", b"y").unwrap();

    fs.chmod("5", "d").unwrap();
    // The directory's own header follows its record.
    let block_id = fs.chain_of("d").unwrap()[0];
    let dir = DirBlock::load(&*fs.device(), block_id).unwrap();
    assert_eq!(dir.header.rights, AccessRights::READ | AccessRights::EXECUTE);

    assert_eq!(fs.create("d/new", b""), Err(Error::PermissionDenied));
    assert_eq!(fs.mkdir("d/new"), Err(Error::PermissionDenied));
    assert_eq!(fs.rm("d/f"), Err(Error::PermissionDenied));
    assert_eq!(fs.chmod("7", "d/f"), Err(Error::PermissionDenied));
    assert_eq!(fs.cp("outside", "d"), Err(Error::PermissionDenied));
    assert_eq!(fs.mv("outside", "d"), Err(Error::PermissionDenied));
    assert_eq!(fs.mv("d/f", "moved"), Err(Error::PermissionDenied));

    // Reading and appending to existing files is unaffected.
    assert_eq!(fs.cat("d/f").unwrap(), b"x");
    fs.append("outside", "d/f").unwrap();
    assert_eq!(fs.cat("d/f").unwrap(), b"xy");

    fs.chmod("7", "d").unwrap();
    fs.rm("d/f").unwrap();
    fs.rm("d").unwrap();
}

#[test]
fn test_root_is_always_writable() {
    let mut fs = new_fs();
    fs.create("f", b"").unwrap();
    fs.mkdir("d").unwrap();
    fs.chmod("0", "d").unwrap();
    fs.rm("f").unwrap();
    fs.rm("d").unwrap();
}

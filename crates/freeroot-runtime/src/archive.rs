use crate::ArchiveError;
use freeroot_store::{force_remove, fsync_dir, restore_owner_access};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// Fallback resolver configuration for images that ship none.
pub const FALLBACK_RESOLV_CONF: &str = "nameserver 1.1.1.1\nnameserver 1.0.0.1\n";

/// Directories the engine binds over; they must exist as mount points.
const MOUNT_POINTS: &[&str] = &["proc", "sys", "dev", "tmp", "root", "etc"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Xz,
    None,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::None => "uncompressed",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub entries: u64,
    pub files: u64,
    pub dirs: u64,
    pub links: u64,
    /// Device nodes and FIFOs, which an unprivileged user cannot create.
    pub skipped_special: u64,
}

/// Sniff the compression format from the first bytes of the file.
pub fn detect_compression(archive: &Path) -> Result<Compression, ArchiveError> {
    let mut magic = [0u8; 6];
    let mut file = File::open(archive)?;
    let mut filled = 0;
    while filled < magic.len() {
        match file.read(&mut magic[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    let head = &magic[..filled];
    Ok(if head.starts_with(GZIP_MAGIC) {
        Compression::Gzip
    } else if head.starts_with(XZ_MAGIC) {
        Compression::Xz
    } else {
        Compression::None
    })
}

fn open_archive(
    archive: &Path,
    compression: Compression,
) -> Result<tar::Archive<Box<dyn Read>>, ArchiveError> {
    let file = BufReader::new(File::open(archive)?);
    let reader: Box<dyn Read> = match compression {
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(file)),
        Compression::None => Box::new(file),
    };
    Ok(tar::Archive::new(reader))
}

/// Lexically normalize an archive member path to a relative path below the
/// extraction root. `None` means it is absolute or climbs out of the root.
fn normalize_member(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::Prefix(_) | Component::RootDir => return None,
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::CurDir => {}
            Component::Normal(p) => out.push(p),
        }
    }
    Some(out)
}

/// Longest symlink chain followed while resolving, the kernel's ELOOP limit.
const MAX_LINK_HOPS: usize = 40;

/// Resolve `path` inside the extraction root the way the kernel would on the
/// unpacked tree, following the symlinks recorded so far. Relative paths
/// start at `base`; absolute ones are anchored at the root, the way the
/// engine resolves them inside the guest. `None` means the walk leaves the
/// root or loops.
fn resolve_in_root(
    base: &Path,
    path: &Path,
    links: &HashMap<PathBuf, PathBuf>,
) -> Option<PathBuf> {
    let mut current = if path.is_absolute() {
        PathBuf::new()
    } else {
        base.to_path_buf()
    };
    let mut pending = Vec::new();
    push_components(&mut pending, path);
    let mut hops = 0;

    while let Some(part) = pending.pop() {
        let Some(name) = part else {
            if !current.pop() {
                return None;
            }
            continue;
        };
        current.push(name);
        if let Some(target) = links.get(&current) {
            hops += 1;
            if hops > MAX_LINK_HOPS {
                return None;
            }
            current.pop();
            if target.is_absolute() {
                current = PathBuf::new();
            }
            push_components(&mut pending, target);
        }
    }
    Some(current)
}

/// Queue the components of `path` so they pop in order. `None` stands for `..`.
fn push_components(pending: &mut Vec<Option<OsString>>, path: &Path) {
    for c in path.components().rev() {
        match c {
            Component::ParentDir => pending.push(None),
            Component::Normal(p) => pending.push(Some(p.to_os_string())),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
}

fn security(entry: &Path, reason: impl Into<String>) -> ArchiveError {
    ArchiveError::Security {
        entry: entry.display().to_string(),
        reason: reason.into(),
    }
}

/// Pass 1: walk every member and reject anything that could write outside
/// the extraction root. Nothing is written. Returns the member count.
pub fn validate_archive(archive: &Path) -> Result<u64, ArchiveError> {
    let compression = detect_compression(archive)?;
    let mut ar = open_archive(archive, compression)?;
    let mut symlinks: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut count: u64 = 0;

    for entry in ar.entries()? {
        let entry = entry?;
        count += 1;
        let raw = entry.path()?.into_owned();
        let Some(path) = normalize_member(&raw) else {
            let reason = if raw.is_absolute() {
                "absolute path"
            } else {
                "path escapes the extraction root"
            };
            return Err(security(&raw, reason));
        };
        // `..` inside a member name could hop over a symlink lexically.
        if raw.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(security(&raw, "path contains `..`"));
        }

        for ancestor in path.ancestors().skip(1) {
            if !ancestor.as_os_str().is_empty() && symlinks.contains_key(ancestor) {
                return Err(security(
                    &raw,
                    format!("path goes through symlink {}", ancestor.display()),
                ));
            }
        }

        let kind = entry.header().entry_type();
        match kind {
            tar::EntryType::Symlink => {
                let Some(target) = entry.link_name()? else {
                    return Err(security(&raw, "symlink without target"));
                };
                // Earlier targets were checked against the tree as it stood.
                if path.as_os_str().is_empty() || seen.contains(&path) {
                    return Err(security(&raw, "symlink replaces an earlier entry"));
                }
                let base = path.parent().unwrap_or(Path::new(""));
                if resolve_in_root(base, &target, &symlinks).is_none() {
                    return Err(security(
                        &raw,
                        format!("symlink target {} escapes the root", target.display()),
                    ));
                }
                symlinks.insert(path.clone(), target.into_owned());
            }
            tar::EntryType::Link => {
                let Some(target) = entry.link_name()? else {
                    return Err(security(&raw, "hard link without target"));
                };
                if target.is_absolute()
                    || resolve_in_root(Path::new(""), &target, &symlinks).is_none()
                {
                    return Err(security(
                        &raw,
                        format!("hard link target {} escapes the root", target.display()),
                    ));
                }
                symlinks.remove(&path);
            }
            _ => {
                if symlinks.contains_key(&path) {
                    return Err(security(&raw, "entry overwrites an earlier symlink"));
                }
            }
        }
        seen.insert(path);
    }

    if count == 0 {
        return Err(ArchiveError::Empty);
    }
    Ok(count)
}

/// Install a rootfs tarball at `dest`.
///
/// The archive is validated in full before a single byte is written. The
/// tree is then unpacked into a staging directory next to `dest` and renamed
/// into place only after every member succeeded, so `dest` either holds the
/// complete tree or does not exist.
pub fn install_rootfs(archive: &Path, dest: &Path) -> Result<InstallReport, ArchiveError> {
    let compression = detect_compression(archive)?;
    let members = validate_archive(archive)?;
    info!(
        "installing {} ({compression}, {members} entries) to {}",
        archive.display(),
        dest.display()
    );

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".rootfs-staging-")
        .tempdir_in(&parent)?;

    let report = unpack_into(archive, compression, staging.path())?;
    restore_owner_access(staging.path())?;

    if fs::symlink_metadata(dest).is_ok() {
        warn!("replacing existing {}", dest.display());
        force_remove(dest)?;
    }
    fs::rename(staging.path(), dest)?;
    fsync_dir(&parent)?;
    // `staging` now points at a path that no longer exists; its drop is a no-op.
    drop(staging);

    debug!(
        "installed {} files, {} dirs, {} links, skipped {} special",
        report.files, report.dirs, report.links, report.skipped_special
    );
    Ok(report)
}

/// Pass 2: unpack every member below `root`.
fn unpack_into(
    archive: &Path,
    compression: Compression,
    root: &Path,
) -> Result<InstallReport, ArchiveError> {
    let mut ar = open_archive(archive, compression)?;
    ar.set_preserve_permissions(true);
    ar.set_preserve_ownerships(false);
    ar.set_unpack_xattrs(false);
    ar.set_overwrite(true);

    let mut report = InstallReport::default();
    for entry in ar.entries()? {
        let mut entry = entry?;
        report.entries += 1;
        let kind = entry.header().entry_type();
        match kind {
            tar::EntryType::Char | tar::EntryType::Block | tar::EntryType::Fifo => {
                report.skipped_special += 1;
                continue;
            }
            _ => {}
        }

        let raw = entry.path()?.into_owned();
        if !entry.unpack_in(root)? {
            return Err(security(&raw, "rejected by the unpacker"));
        }

        match kind {
            tar::EntryType::Directory => {
                report.dirs += 1;
                // Read-only directories in the image would block the members
                // that follow; owner access is restored for the whole tree anyway.
                if let Some(rel) = normalize_member(&raw) {
                    let dir = root.join(rel);
                    let mode = fs::metadata(&dir)?.permissions().mode();
                    if mode & 0o700 != 0o700 {
                        fs::set_permissions(&dir, fs::Permissions::from_mode(mode | 0o700))?;
                    }
                }
            }
            tar::EntryType::Symlink | tar::EntryType::Link => report.links += 1,
            _ => report.files += 1,
        }
    }
    Ok(report)
}

/// Create the mount points the engine expects and a resolver config.
///
/// An `etc/resolv.conf` that is a regular file is kept. A symlink (Ubuntu
/// points it at the systemd stub, which does not exist in the guest) or a
/// missing file is replaced with public resolvers.
pub fn seed_rootfs(rootfs: &Path) -> Result<(), ArchiveError> {
    for dir in MOUNT_POINTS {
        fs::create_dir_all(rootfs.join(dir))?;
    }
    let tmp = rootfs.join("tmp");
    fs::set_permissions(&tmp, fs::Permissions::from_mode(0o1777))?;

    let resolv = rootfs.join("etc/resolv.conf");
    match fs::symlink_metadata(&resolv) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            force_remove(&resolv)?;
            fs::write(&resolv, FALLBACK_RESOLV_CONF)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::write(&resolv, FALLBACK_RESOLV_CONF)?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression as GzLevel;
    use std::io::Write;

    enum Member<'a> {
        Dir(&'a str, u32),
        File(&'a str, &'a [u8], u32),
        Symlink(&'a str, &'a str),
        HardLink(&'a str, &'a str),
        Fifo(&'a str),
    }

    fn header(kind: tar::EntryType, mode: u32, size: u64) -> tar::Header {
        let mut h = tar::Header::new_gnu();
        h.set_entry_type(kind);
        h.set_mode(mode);
        h.set_size(size);
        h.set_uid(0);
        h.set_gid(0);
        h.set_mtime(0);
        h
    }

    /// Write the member name straight into the header so that hostile names
    /// (`..`, absolute paths) survive; `Builder` would refuse them.
    fn set_raw_name(h: &mut tar::Header, name: &str) {
        let field = &mut h.as_old_mut().name;
        field.fill(0);
        field[..name.len()].copy_from_slice(name.as_bytes());
    }

    fn build_tar(members: &[Member<'_>]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for m in members {
            match m {
                Member::Dir(name, mode) => {
                    let mut h = header(tar::EntryType::Directory, *mode, 0);
                    set_raw_name(&mut h, name);
                    h.set_cksum();
                    builder.append(&h, &[][..]).unwrap();
                }
                Member::File(name, data, mode) => {
                    let mut h = header(tar::EntryType::Regular, *mode, data.len() as u64);
                    set_raw_name(&mut h, name);
                    h.set_cksum();
                    builder.append(&h, *data).unwrap();
                }
                Member::Symlink(name, target) => {
                    let mut h = header(tar::EntryType::Symlink, 0o777, 0);
                    set_raw_name(&mut h, name);
                    h.set_link_name(target).unwrap();
                    h.set_cksum();
                    builder.append(&h, &[][..]).unwrap();
                }
                Member::HardLink(name, target) => {
                    let mut h = header(tar::EntryType::Link, 0o644, 0);
                    set_raw_name(&mut h, name);
                    h.set_link_name(target).unwrap();
                    h.set_cksum();
                    builder.append(&h, &[][..]).unwrap();
                }
                Member::Fifo(name) => {
                    let mut h = header(tar::EntryType::Fifo, 0o644, 0);
                    set_raw_name(&mut h, name);
                    h.set_cksum();
                    builder.append(&h, &[][..]).unwrap();
                }
            }
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), GzLevel::fast());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn xz(data: &[u8]) -> Vec<u8> {
        let mut enc = xz2::write::XzEncoder::new(Vec::new(), 1);
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn write_archive(dir: &Path, bytes: &[u8]) -> PathBuf {
        let path = dir.join("rootfs.tar");
        fs::write(&path, bytes).unwrap();
        path
    }

    fn ubuntu_like() -> Vec<u8> {
        build_tar(&[
            Member::Dir("./", 0o755),
            Member::Dir("./bin/", 0o755),
            Member::File("./bin/sh", b"#!fake shell", 0o755),
            Member::Dir("./usr/", 0o755),
            Member::Dir("./usr/lib/", 0o555),
            Member::File("./usr/lib/libc.so.6", b"elf", 0o444),
            Member::Dir("./etc/", 0o755),
            Member::Dir("./etc/alternatives/", 0o755),
            Member::Symlink("./etc/alternatives/pager", "/bin/sh"),
            Member::Symlink("./etc/resolv.conf", "../run/systemd/resolve/stub-resolv.conf"),
            Member::HardLink("./bin/dash", "./bin/sh"),
            Member::Dir("./dev/", 0o755),
            Member::Fifo("./dev/initctl"),
        ])
    }

    #[test]
    fn detects_compression() {
        let dir = tempfile::tempdir().unwrap();
        let tar = ubuntu_like();
        let plain = write_archive(dir.path(), &tar);
        assert_eq!(detect_compression(&plain).unwrap(), Compression::None);

        let gz = dir.path().join("a.tar.gz");
        fs::write(&gz, gzip(&tar)).unwrap();
        assert_eq!(detect_compression(&gz).unwrap(), Compression::Gzip);

        let x = dir.path().join("a.tar.xz");
        fs::write(&x, xz(&tar)).unwrap();
        assert_eq!(detect_compression(&x).unwrap(), Compression::Xz);
    }

    #[test]
    fn installs_gzip_rootfs() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("rootfs.tar.gz");
        fs::write(&archive, gzip(&ubuntu_like())).unwrap();
        let dest = dir.path().join("rootfs");

        let report = install_rootfs(&archive, &dest).unwrap();
        assert_eq!(report.skipped_special, 1);
        assert_eq!(report.links, 3);
        assert_eq!(fs::read(dest.join("bin/sh")).unwrap(), b"#!fake shell");
        assert_eq!(fs::read(dest.join("bin/dash")).unwrap(), b"#!fake shell");
        assert_eq!(
            fs::read_link(dest.join("etc/alternatives/pager")).unwrap(),
            PathBuf::from("/bin/sh")
        );
        assert!(!dest.join("dev/initctl").exists());

        // owner access restored on read-only image dirs
        let mode = fs::metadata(dest.join("usr/lib")).unwrap().permissions().mode();
        assert_eq!(mode & 0o700, 0o700);
        // executable bit preserved
        let mode = fs::metadata(dest.join("bin/sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);

        // no staging directory left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".rootfs-staging"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn installs_xz_rootfs() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("rootfs.tar.xz");
        fs::write(&archive, xz(&ubuntu_like())).unwrap();
        let dest = dir.path().join("rootfs");
        install_rootfs(&archive, &dest).unwrap();
        assert!(dest.join("bin/sh").is_file());
    }

    fn assert_rejected(members: &[Member<'_>]) {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), &build_tar(members));
        let dest = dir.path().join("rootfs");
        let err = install_rootfs(&archive, &dest).unwrap_err();
        assert!(matches!(err, ArchiveError::Security { .. }), "{err:?}");
        assert!(!dest.exists(), "nothing may be extracted");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["rootfs.tar"]);
    }

    #[test]
    fn rejects_parent_traversal() {
        assert_rejected(&[
            Member::File("./bin/ok", b"fine", 0o644),
            Member::File("../../etc/passwd", b"root::0:0::/:/bin/sh", 0o644),
        ]);
    }

    #[test]
    fn rejects_absolute_member() {
        assert_rejected(&[Member::File("/etc/passwd", b"x", 0o644)]);
    }

    #[test]
    fn rejects_escaping_relative_symlink() {
        assert_rejected(&[
            Member::Dir("etc/", 0o755),
            Member::Symlink("etc/escape", "../../../../etc"),
        ]);
    }

    #[test]
    fn rejects_escaping_absolute_symlink() {
        assert_rejected(&[Member::Symlink("host", "/../../etc/shadow")]);
    }

    #[test]
    fn rejects_write_through_symlink() {
        assert_rejected(&[
            Member::Symlink("lib", "usr/lib"),
            Member::File("lib/evil.so", b"x", 0o644),
        ]);
    }

    #[test]
    fn rejects_overwriting_symlink() {
        assert_rejected(&[
            Member::Symlink("pager", "bin/less"),
            Member::File("pager", b"x", 0o644),
        ]);
    }

    #[test]
    fn rejects_escaping_hard_link() {
        assert_rejected(&[Member::HardLink("passwd", "../../etc/passwd")]);
    }

    #[test]
    fn empty_archive_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), &build_tar(&[]));
        let err = install_rootfs(&archive, &dir.path().join("rootfs")).unwrap_err();
        assert!(matches!(err, ArchiveError::Empty));
    }

    #[test]
    fn corrupt_archive_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = gzip(&ubuntu_like());
        bytes.truncate(bytes.len() / 2);
        let archive = dir.path().join("rootfs.tar.gz");
        fs::write(&archive, bytes).unwrap();
        let dest = dir.path().join("rootfs");
        assert!(install_rootfs(&archive, &dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn symlink_resolution() {
        let mut links = HashMap::new();
        let resolve = |base: &str, target: &str, links: &HashMap<PathBuf, PathBuf>| {
            resolve_in_root(Path::new(base), Path::new(target), links)
        };
        assert_eq!(
            resolve("etc/alternatives", "/bin/less", &links),
            Some(PathBuf::from("bin/less"))
        );
        assert_eq!(
            resolve("etc", "../run/x", &links),
            Some(PathBuf::from("run/x"))
        );
        assert_eq!(resolve("", "../etc", &links), None);

        links.insert(PathBuf::from("lib"), PathBuf::from("usr/lib"));
        assert_eq!(
            resolve("", "lib/x86_64/../libc.so", &links),
            Some(PathBuf::from("usr/lib/libc.so"))
        );
        links.insert(PathBuf::from("loop"), PathBuf::from("loop"));
        assert_eq!(resolve("", "loop/x", &links), None);
    }

    #[test]
    fn rejects_symlink_chain_escape() {
        assert_rejected(&[
            Member::Dir("a/", 0o755),
            Member::Dir("a/b/", 0o755),
            Member::Symlink("a/b/s", "../.."),
            Member::Symlink("x", "a/b/s/../../outside-marker"),
        ]);
    }

    #[test]
    fn rejects_hard_link_through_symlink_chain() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            &build_tar(&[
                Member::Dir("a/", 0o755),
                Member::Dir("a/b/", 0o755),
                Member::Symlink("a/b/s", "../.."),
                Member::HardLink("h", "a/b/s/../../../secret"),
            ]),
        );
        match validate_archive(&archive).unwrap_err() {
            ArchiveError::Security { entry, .. } => assert_eq!(entry, "h"),
            other => panic!("expected a security error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_symlink_replacing_earlier_entry() {
        assert_rejected(&[
            Member::Dir("d/", 0o755),
            Member::Symlink("up", "d/.."),
            Member::Symlink("d", "/"),
        ]);
    }

    #[test]
    fn symlink_into_earlier_symlink_stays_inside() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            &build_tar(&[
                Member::Dir("usr/", 0o755),
                Member::Dir("usr/lib/", 0o755),
                Member::File("usr/lib/libc.so.6", b"elf", 0o644),
                Member::Symlink("lib", "usr/lib"),
                Member::Symlink("libc", "lib/../lib/libc.so.6"),
            ]),
        );
        let dest = dir.path().join("rootfs");
        install_rootfs(&archive, &dest).unwrap();
        assert_eq!(fs::read(dest.join("libc")).unwrap(), b"elf");
    }

    #[test]
    fn seed_creates_mount_points_and_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let rootfs = dir.path();
        fs::create_dir_all(rootfs.join("etc")).unwrap();
        std::os::unix::fs::symlink("../run/systemd/resolve/stub-resolv.conf", rootfs.join("etc/resolv.conf"))
            .unwrap();

        seed_rootfs(rootfs).unwrap();
        for d in MOUNT_POINTS {
            assert!(rootfs.join(d).is_dir(), "{d}");
        }
        let resolv = rootfs.join("etc/resolv.conf");
        assert!(fs::symlink_metadata(&resolv).unwrap().is_file());
        assert_eq!(fs::read_to_string(&resolv).unwrap(), FALLBACK_RESOLV_CONF);
    }

    #[test]
    fn seed_keeps_regular_resolver() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/resolv.conf"), "nameserver 10.0.0.1\n").unwrap();
        seed_rootfs(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("etc/resolv.conf")).unwrap(),
            "nameserver 10.0.0.1\n"
        );
    }
}

//! Output files with optional backup of whatever was there before

use std::fs::File;
use std::path::{Path,PathBuf};

/// First `<path>.bakN` that does not exist yet, counting from 0.
pub fn backup_name(path: &Path) -> PathBuf {
    let mut n = 0;
    loop {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".bak{}",n));
        let candidate = PathBuf::from(name);
        if !candidate.is_file() {
            return candidate;
        }
        n += 1;
    }
}

/// Create `path` for writing.  If `backup` is set and a file already exists there,
/// it is renamed to the first unused `.bakN` name, so old backups are never overwritten.
pub fn create_with_backup(path: &Path,backup: bool) -> Result<File,std::io::Error> {
    if backup && path.is_file() {
        let bak = backup_name(path);
        log::debug!("backing up {} as {}",path.display(),bak.display());
        std::fs::rename(path,&bak)?;
    }
    File::create(path)
}

#[test]
fn rotates_backups() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let path = dir.path().join("out.bmp");
    std::fs::write(&path,b"first").expect("write failed");
    create_with_backup(&path,true).expect("create failed");
    std::fs::write(&path,b"second").expect("write failed");
    create_with_backup(&path,true).expect("create failed");
    assert_eq!(std::fs::read(dir.path().join("out.bmp.bak0")).unwrap(),b"first");
    assert_eq!(std::fs::read(dir.path().join("out.bmp.bak1")).unwrap(),b"second");
    assert_eq!(std::fs::read(&path).unwrap().len(),0);
}

#[test]
fn no_backup_truncates() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let path = dir.path().join("out.bin");
    std::fs::write(&path,b"old").expect("write failed");
    create_with_backup(&path,false).expect("create failed");
    assert!(!dir.path().join("out.bin.bak0").exists());
}

//! Buffered recursive copy that skips `.git` and symlinks: concurrent
//! instances must get independent writable trees.

use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

const BUFFER_SIZE: usize = 64 * 1024;

/// Recursively copy `src` into `dst`, creating `dst` if needed. Skips any
/// entry named `.git` and any symlink (regardless of what it points at).
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;

    for entry in fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name();

        if name == ".git" {
            continue;
        }
        if file_type.is_symlink() {
            continue;
        }

        let src_path = entry.path();
        let dst_path = dst.join(&name);

        if file_type.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            copy_file(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let src_file = fs::File::open(src).with_context(|| format!("failed to open {}", src.display()))?;
    let dst_file = fs::File::create(dst).with_context(|| format!("failed to create {}", dst.display()))?;

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, src_file);
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dst_file);

    let mut buffer = [0u8; BUFFER_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_nested_files_and_dirs() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/file.txt"), b"hello").unwrap();
        fs::write(src.path().join("top.txt"), b"world").unwrap();

        let dst = tempfile::tempdir().unwrap();
        copy_tree(src.path(), dst.path()).unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("a/b/file.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(dst.path().join("top.txt")).unwrap(), "world");
    }

    #[test]
    fn skips_dot_git_directory() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join(".git")).unwrap();
        fs::write(src.path().join(".git/HEAD"), b"ref: refs/heads/main").unwrap();
        fs::write(src.path().join("main.tf"), b"resource {}").unwrap();

        let dst = tempfile::tempdir().unwrap();
        copy_tree(src.path(), dst.path()).unwrap();

        assert!(!dst.path().join(".git").exists());
        assert!(dst.path().join("main.tf").exists());
    }

    #[cfg(unix)]
    #[test]
    fn skips_symlinks() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("real.txt"), b"data").unwrap();
        std::os::unix::fs::symlink(src.path().join("real.txt"), src.path().join("link.txt")).unwrap();

        let dst = tempfile::tempdir().unwrap();
        copy_tree(src.path(), dst.path()).unwrap();

        assert!(dst.path().join("real.txt").exists());
        assert!(!dst.path().join("link.txt").exists());
    }
}

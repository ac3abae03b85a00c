//! Cross-platform filesystem helpers.
//!
//! Keeps the symlink and timestamp call-sites identical across OSes so the
//! restore path never reaches for `std::os` directly.

use std::io;
use std::path::Path;

use filetime::FileTime;

#[cfg(unix)]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    // Directory targets may not exist yet at restore time; a file symlink is
    // the only portable choice.
    std::os::windows::fs::symlink_file(target, link)
}

/// Restores atime/mtime (Unix seconds) on a file or directory.
pub fn restore_times(path: &Path, atime: i64, mtime: i64) -> io::Result<()> {
    filetime::set_file_times(
        path,
        FileTime::from_unix_time(atime, 0),
        FileTime::from_unix_time(mtime, 0),
    )
}

/// Restores atime/mtime on a symlink itself, without following it.
pub fn restore_symlink_times(path: &Path, atime: i64, mtime: i64) -> io::Result<()> {
    filetime::set_symlink_file_times(
        path,
        FileTime::from_unix_time(atime, 0),
        FileTime::from_unix_time(mtime, 0),
    )
}

// src/export/output.rs
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::core::timestamp::clip_stem;
use crate::core::{ReplayError, ReplayResult};

const MAX_SUFFIX: u32 = 1000;

/// Claims `<dir>/<stem>.mp4`, or `<stem>-N.mp4` when that name is taken.
/// The file is created empty so concurrent workers cannot pick the same name.
pub fn reserve_clip_path(dir: &Path, at: &DateTime<Local>) -> ReplayResult<PathBuf> {
    let stem = clip_stem(at);

    for n in 0..MAX_SUFFIX {
        let name = if n == 0 {
            format!("{}.mp4", stem)
        } else {
            format!("{}-{}.mp4", stem, n)
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(ReplayError::io(format!("reserving {}", path.display()), e)),
        }
    }

    Err(ReplayError::io(
        format!("reserving {} in {}", stem, dir.display()),
        std::io::Error::new(ErrorKind::AlreadyExists, "no free clip name"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_same_second_gets_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let a = reserve_clip_path(dir.path(), &at).unwrap();
        let b = reserve_clip_path(dir.path(), &at).unwrap();
        let c = reserve_clip_path(dir.path(), &at).unwrap();

        assert_eq!(a.file_name().unwrap(), "2024-03-09T14-05-07.mp4");
        assert_eq!(b.file_name().unwrap(), "2024-03-09T14-05-07-1.mp4");
        assert_eq!(c.file_name().unwrap(), "2024-03-09T14-05-07-2.mp4");
        assert!(a.exists() && b.exists() && c.exists());
    }

    #[test]
    fn test_missing_directory_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let err = reserve_clip_path(&dir.path().join("missing"), &at).unwrap_err();
        assert_eq!(err.kind(), "io_failure");
    }
}

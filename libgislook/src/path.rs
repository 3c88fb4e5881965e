use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Longest path accepted by [`change_extension`]
pub const MAX_PATH_LEN: usize = 10_240;

/// Replaces the three character extension of `path` with `extension`.
///
/// Used to locate the `.hdr` sibling of BIL and ESRI binary grids. The path
/// must be at least five bytes long and have a `.` fourth from the end.
///
/// # Errors
///
/// [`Error::PathTooLong`] beyond [`MAX_PATH_LEN`] bytes, [`Error::NoExtension`]
/// when the path does not end in a three character extension.
pub fn change_extension(path: &Path, extension: &str) -> Result<PathBuf> {
    let bytes = path.as_os_str().as_encoded_bytes();
    if bytes.len() > MAX_PATH_LEN {
        return Err(Error::PathTooLong {
            len: bytes.len(),
            limit: MAX_PATH_LEN,
        });
    }
    let has_extension = bytes.len() >= 5
        && bytes[bytes.len() - 4] == b'.'
        && path
            .extension()
            .is_some_and(|ext| ext.as_encoded_bytes().len() == 3);
    if !has_extension || extension.len() != 3 {
        return Err(Error::NoExtension(path.to_path_buf()));
    }
    Ok(path.with_extension(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_three_character_extensions() -> anyhow::Result<()> {
        assert_eq!(
            change_extension(Path::new("/data/elev.bil"), "hdr")?,
            PathBuf::from("/data/elev.hdr")
        );
        assert_eq!(change_extension(Path::new("a.flt"), "hdr")?, PathBuf::from("a.hdr"));
        Ok(())
    }

    #[test]
    fn rejects_other_shapes() {
        for p in ["a.b", "grid", "grid.tiff", "dir/.bil", "x.bi"] {
            assert!(
                matches!(change_extension(Path::new(p), "hdr"), Err(Error::NoExtension(_))),
                "{p}"
            );
        }
    }

    #[test]
    fn rejects_long_paths() {
        let long = format!("{}.bil", "a".repeat(MAX_PATH_LEN));
        assert!(matches!(
            change_extension(Path::new(&long), "hdr"),
            Err(Error::PathTooLong { .. })
        ));
    }
}

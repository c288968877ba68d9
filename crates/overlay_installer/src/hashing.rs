use crate::error::Result;
use camino::Utf8Path;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Streaming SHA-256 of a file, lowercase hex.
pub fn hash_file(path: &Utf8Path) -> Result<String> {
    let mut file = File::open(path.as_std_path())?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn test_matches_in_memory_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("Assembly-CSharp.dll")).unwrap();
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        assert_eq!(
            hash_file(&path).unwrap(),
            overlay_engine::digest(&content).into_string()
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = hash_file(Utf8Path::new("/definitely/not/here.dll")).unwrap_err();
        assert!(matches!(err, crate::InstallerError::Io(_)));
    }
}

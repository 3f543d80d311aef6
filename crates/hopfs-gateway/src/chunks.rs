//! Chunked-upload staging and reassembly.
//!
//! Chunks are staged on local disk under the volume's staging root, in a
//! subdirectory mirroring the destination's virtual directory. Part files
//! encode the chunk index, the declared last index, and the upload
//! session id, so concurrent unrelated uploads of the same filename
//! cannot collide:
//!
//! ```text
//! {staging}/{dir}/{filename}.{index}_{total}.part_{upload_id}
//! ```
//!
//! Indices run `0..=total` inclusive; `total` names the LAST index, so a
//! complete set holds `total + 1` parts.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{GatewayError, GatewayResult};

/// Stages upload chunks and streams them into a remote destination.
pub struct ChunkAssembler {
    staging: PathBuf,
}

impl ChunkAssembler {
    pub fn new(staging: impl Into<PathBuf>) -> Self {
        Self {
            staging: staging.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Caller-facing part name for one chunk, without the upload id.
    pub fn part_name(filename: &str, index: u32, total: u32) -> String {
        format!("{filename}.{index}_{total}.part")
    }

    // Empty, `.` and `..` segments are dropped so a caller-supplied
    // directory always resolves under the staging root.
    fn dir_path(&self, dir: &str) -> PathBuf {
        let mut path = self.staging.clone();
        for part in dir.split('/') {
            match part {
                "" | "." | ".." => {}
                p => path.push(p),
            }
        }
        path
    }

    fn part_path(
        &self,
        dir: &str,
        filename: &str,
        index: u32,
        total: u32,
        upload_id: u64,
    ) -> PathBuf {
        let name = Self::part_name(filename, index, total);
        self.dir_path(dir).join(format!("{name}_{upload_id}"))
    }

    /// Stage one chunk. `chunk_name` is the caller-supplied part name
    /// (`{filename}.{index}_{total}.part`); the upload id is appended
    /// here. Returns the number of bytes staged.
    pub async fn stage<R>(
        &self,
        dir: &str,
        chunk_name: &str,
        upload_id: u64,
        reader: &mut R,
    ) -> GatewayResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let dir_path = self.dir_path(dir);
        fs::create_dir_all(&dir_path).await?;
        let path = dir_path.join(format!("{chunk_name}_{upload_id}"));
        let mut file = fs::File::create(&path).await?;
        let written = tokio::io::copy(reader, &mut file).await?;
        tracing::debug!(path = %path.display(), written, "staged chunk");
        Ok(written)
    }

    /// True iff every index in `0..=total` has a staged part file.
    ///
    /// Checked by existence, never trusted from caller-side counts.
    pub async fn is_complete(&self, dir: &str, filename: &str, total: u32, upload_id: u64) -> bool {
        for index in 0..=total {
            let path = self.part_path(dir, filename, index, total, upload_id);
            match fs::try_exists(&path).await {
                Ok(true) => {}
                _ => return false,
            }
        }
        true
    }

    /// Stream all parts of a chunk set into `dest` in ascending index
    /// order, deleting each part after it is appended.
    ///
    /// A missing or unreadable part aborts the merge immediately;
    /// already-appended bytes are not rolled back and parts with higher
    /// indices stay staged.
    pub async fn merge_into<W>(
        &self,
        dir: &str,
        filename: &str,
        total: u32,
        upload_id: u64,
        dest: &mut W,
    ) -> GatewayResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut written = 0u64;
        for index in 0..=total {
            let path = self.part_path(dir, filename, index, total, upload_id);
            let mut part = fs::File::open(&path)
                .await
                .map_err(|_| GatewayError::MissingChunk { index, total })?;
            written += tokio::io::copy(&mut part, dest).await?;
            drop(part);
            fs::remove_file(&path).await?;
        }
        tracing::debug!(dir, filename, total, written, "merged chunk set");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;

    const DIR: &str = "/Home/web1/deploy/uploads";

    async fn stage_parts(assembler: &ChunkAssembler, parts: &[&[u8]], upload_id: u64) {
        let total = (parts.len() - 1) as u32;
        for (index, data) in parts.iter().enumerate() {
            let name = ChunkAssembler::part_name("a.bin", index as u32, total);
            assembler
                .stage(DIR, &name, upload_id, &mut &data[..])
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_part_name_convention() {
        assert_eq!(ChunkAssembler::part_name("a.bin", 0, 2), "a.bin.0_2.part");
        assert_eq!(
            ChunkAssembler::part_name("report.csv", 12, 12),
            "report.csv.12_12.part"
        );
    }

    #[tokio::test]
    async fn test_completeness_flips_per_part() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = ChunkAssembler::new(tmp.path());

        let parts: [&[u8]; 3] = [b"aa", b"bb", b"cc"];
        stage_parts(&assembler, &parts, 7).await;
        assert!(assembler.is_complete(DIR, "a.bin", 2, 7).await);
        // Different upload id: not complete.
        assert!(!assembler.is_complete(DIR, "a.bin", 2, 8).await);

        let middle = assembler.part_path(DIR, "a.bin", 1, 2, 7);
        fs::remove_file(&middle).await.unwrap();
        assert!(!assembler.is_complete(DIR, "a.bin", 2, 7).await);
    }

    #[tokio::test]
    async fn test_merge_concatenates_in_order_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = ChunkAssembler::new(tmp.path());
        let parts: [&[u8]; 3] = [b"one-", b"two-", b"three"];
        stage_parts(&assembler, &parts, 3).await;

        let mut dest = Cursor::new(Vec::new());
        let written = assembler
            .merge_into(DIR, "a.bin", 2, 3, &mut dest)
            .await
            .unwrap();
        dest.shutdown().await.unwrap();

        assert_eq!(written, 13);
        assert_eq!(dest.into_inner(), b"one-two-three");
        for index in 0..=2 {
            let path = assembler.part_path(DIR, "a.bin", index, 2, 3);
            assert!(!fs::try_exists(&path).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_dir_segments_cannot_escape_staging() {
        let outer = tempfile::tempdir().unwrap();
        let staging = outer.path().join("staging");
        let assembler = ChunkAssembler::new(&staging);

        let dir = "/Home/../../outside";
        let name = ChunkAssembler::part_name("a.bin", 0, 0);
        assembler
            .stage(dir, &name, 5, &mut &b"data"[..])
            .await
            .unwrap();

        let part = assembler.part_path(dir, "a.bin", 0, 0, 5);
        assert!(part.starts_with(&staging));
        assert!(assembler.is_complete(dir, "a.bin", 0, 5).await);
        // Nothing lands at the would-be escaped location.
        assert!(!outer.path().join("outside").exists());
    }

    #[tokio::test]
    async fn test_merge_aborts_on_missing_part() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = ChunkAssembler::new(tmp.path());
        let parts: [&[u8]; 3] = [b"aa", b"bb", b"cc"];
        stage_parts(&assembler, &parts, 1).await;
        fs::remove_file(assembler.part_path(DIR, "a.bin", 1, 2, 1))
            .await
            .unwrap();

        let mut dest = Cursor::new(Vec::new());
        let err = assembler
            .merge_into(DIR, "a.bin", 2, 1, &mut dest)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::MissingChunk { index: 1, total: 2 }
        ));
        // Chunk 0 was consumed, chunk 2 stays staged.
        assert!(!fs::try_exists(assembler.part_path(DIR, "a.bin", 0, 2, 1))
            .await
            .unwrap());
        assert!(fs::try_exists(assembler.part_path(DIR, "a.bin", 2, 2, 1))
            .await
            .unwrap());
        assert_eq!(dest.into_inner(), b"aa");
    }
}

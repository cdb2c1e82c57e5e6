use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::ImageOutputFormat;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::StoreError;
use super::frame::CaptureFrame;

static ID_IN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static pattern"));

/// 按编号持久化，每个编号一个产物
pub trait ArtifactStore {
    fn save(&mut self, id: i64, frame: &CaptureFrame) -> Result<PathBuf, StoreError>;

    fn saved_ids(&self) -> Result<BTreeSet<i64>, StoreError>;
}

/// `<dir>/<id>.png`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    /// 目录不存在时创建
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, id: i64) -> PathBuf {
        self.dir.join(format!("{}.png", id))
    }
}

impl ArtifactStore for DirectoryStore {
    fn save(&mut self, id: i64, frame: &CaptureFrame) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(id);

        let mut buffer = Cursor::new(Vec::new());
        frame
            .image
            .write_to(&mut buffer, ImageOutputFormat::Png)
            .map_err(|source| StoreError::Encode { id, source })?;

        let write_err = |source| StoreError::Write {
            path: path.clone(),
            source,
        };

        // 先写临时文件再原子重命名，避免留下半截产物
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(buffer.get_ref()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!("Wrote {} bytes to {}", buffer.get_ref().len(), path.display());
        Ok(path)
    }

    fn saved_ids(&self) -> Result<BTreeSet<i64>, StoreError> {
        let scan_err = |source| StoreError::Scan {
            path: self.dir.clone(),
            source,
        };

        let mut ids = BTreeSet::new();
        for entry in fs::read_dir(&self.dir).map_err(scan_err)? {
            let entry = entry.map_err(scan_err)?;
            if !entry.file_type().map_err(scan_err)?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // tempfile 的临时名以 ".tmp" 开头
            if name.starts_with('.') {
                continue;
            }
            match ID_IN_NAME
                .find(&name)
                .and_then(|m| m.as_str().parse::<i64>().ok())
            {
                Some(id) => {
                    ids.insert(id);
                }
                None => warn!("Ignoring file without identifier: {}", name),
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};
    use std::time::Instant;

    fn create_test_frame() -> CaptureFrame {
        let image = RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255]));
        CaptureFrame::new(DynamicImage::ImageRgba8(image), Instant::now(), 1)
    }

    #[test]
    fn test_open_creates_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data").join("scanned_booklets");
        let store = DirectoryStore::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[test]
    fn test_save_and_scan() {
        let root = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::open(root.path()).unwrap();

        let path = store.save(933, &create_test_frame()).unwrap();
        assert_eq!(path, root.path().join("933.png"));
        store.save(935, &create_test_frame()).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.width(), 8);

        let ids: Vec<i64> = store.saved_ids().unwrap().into_iter().collect();
        assert_eq!(ids, vec![933, 935]);
    }

    #[test]
    fn test_scan_uses_first_digit_run() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(root.path()).unwrap();
        fs::write(root.path().join("booklet_1001_v2.png"), b"x").unwrap();
        fs::write(root.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(root.path().join("77")).unwrap();

        let ids: Vec<i64> = store.saved_ids().unwrap().into_iter().collect();
        assert_eq!(ids, vec![1001]);
    }

    #[test]
    fn test_save_overwrites_same_id() {
        let root = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::open(root.path()).unwrap();
        store.save(5, &create_test_frame()).unwrap();
        store.save(5, &create_test_frame()).unwrap();
        assert_eq!(store.saved_ids().unwrap().len(), 1);
    }
}

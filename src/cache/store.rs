//! 缓存文档读写
//!
//! 缓存状态以 JSON 格式保存在输出目录下的 `image-cache.json`。
//! 写入时先在同目录创建唯一命名的临时文件，刷盘后原子重命名，
//! 写入中断不会破坏已有文档，临时文件也不会覆盖已缓存的图片。

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::types::{CacheError, CacheResult, CacheState, STATE_FILE_NAME};

/// 获取缓存文档路径：`{output_dir}/image-cache.json`
pub fn get_state_path(output_dir: &Path) -> PathBuf {
    output_dir.join(STATE_FILE_NAME)
}

/// 加载结果
#[derive(Debug)]
pub enum LoadOutcome {
    /// 文档不存在
    Missing,
    /// 加载成功
    Loaded(CacheState),
    /// 文档存在但无法读取或解析
    Corrupt(String),
}

/// 从文件加载缓存状态
///
/// 不做校验，交给调用方根据恢复策略处理
pub fn load_state(path: &Path) -> LoadOutcome {
    if !path.exists() {
        return LoadOutcome::Missing;
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return LoadOutcome::Corrupt(format!("无法打开: {}", e)),
    };

    match serde_json::from_reader::<_, CacheState>(BufReader::new(file)) {
        Ok(state) => {
            debug!(
                "已加载缓存文档: {:?} ({} 条映射)",
                path,
                state.mappings.len()
            );
            LoadOutcome::Loaded(state)
        }
        Err(e) => LoadOutcome::Corrupt(format!("解析失败: {}", e)),
    }
}

/// 保存缓存状态
///
/// 先写入临时文件，刷盘后重命名覆盖正式文件
pub fn save_state(path: &Path, state: &CacheState) -> CacheResult<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(writer, state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    })?;

    debug!(
        "已保存缓存文档: {:?} ({} 条映射, {} 个文件名)",
        path,
        state.mappings.len(),
        state.used_filenames.len()
    );
    Ok(())
}

/// 原子写入二进制内容（用于图片文件）
pub fn write_bytes(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    write_atomic(path, |writer| writer.write_all(bytes))
}

/// 临时文件由 tempfile 以 create_new 方式创建（`.tmpXXXXXX`），
/// 不会截断目录中任何已存在的文件
fn write_atomic<F>(path: &Path, write: F) -> CacheResult<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
    let temp_path = temp.path().to_path_buf();

    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer).map_err(|e| CacheError::io(&temp_path, e))?;
        writer.flush().map_err(|e| CacheError::io(&temp_path, e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| CacheError::io(&temp_path, e))?;

    // 失败时 NamedTempFile 被 drop，临时文件自动删除
    temp.persist(path).map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_temp_dir() -> TempDir {
        TempDir::new().expect("Failed to create temp dir")
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_get_state_path() {
        let path = get_state_path(Path::new("/tmp/out"));
        assert_eq!(path, PathBuf::from("/tmp/out/image-cache.json"));
    }

    #[test]
    fn test_load_missing() {
        let temp_dir = setup_temp_dir();
        let path = get_state_path(temp_dir.path());
        assert!(matches!(load_state(&path), LoadOutcome::Missing));
    }

    #[test]
    fn test_save_and_load_state() {
        let temp_dir = setup_temp_dir();
        let path = get_state_path(temp_dir.path());

        let mut state = CacheState::default();
        state
            .mappings
            .insert("https://a/pic.jpg".to_string(), "pic.jpg".to_string());
        state.used_filenames.insert("pic.jpg".to_string());

        save_state(&path, &state).unwrap();

        // 临时文件已被重命名
        assert_eq!(dir_entries(temp_dir.path()), vec![STATE_FILE_NAME]);

        match load_state(&path) {
            LoadOutcome::Loaded(loaded) => assert_eq!(loaded, state),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_load_corrupt() {
        let temp_dir = setup_temp_dir();
        let path = get_state_path(temp_dir.path());
        fs::write(&path, "not valid json").unwrap();

        assert!(matches!(load_state(&path), LoadOutcome::Corrupt(_)));
    }

    #[test]
    fn test_write_bytes() {
        let temp_dir = setup_temp_dir();
        let path = temp_dir.path().join("pic.jpg");

        write_bytes(&path, b"\xff\xd8\xff").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"\xff\xd8\xff");
        assert_eq!(dir_entries(temp_dir.path()), vec!["pic.jpg"]);
    }

    #[test]
    fn test_write_bytes_keeps_neighbour_files() {
        let temp_dir = setup_temp_dir();
        fs::write(temp_dir.path().join("x.jpg.part"), b"cached").unwrap();
        fs::write(temp_dir.path().join("x.jpg.tmp"), b"cached too").unwrap();

        write_bytes(&temp_dir.path().join("x.jpg"), b"new").unwrap();

        assert_eq!(fs::read(temp_dir.path().join("x.jpg.part")).unwrap(), b"cached");
        assert_eq!(fs::read(temp_dir.path().join("x.jpg.tmp")).unwrap(), b"cached too");
        assert_eq!(fs::read(temp_dir.path().join("x.jpg")).unwrap(), b"new");
        assert_eq!(
            dir_entries(temp_dir.path()),
            vec!["x.jpg", "x.jpg.part", "x.jpg.tmp"]
        );
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let temp_dir = setup_temp_dir();
        let path = get_state_path(&temp_dir.path().join("nope"));

        let err = save_state(&path, &CacheState::default()).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}

use super::*;
use std::sync::atomic::Ordering;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

const BASE: &str = "web.stdout";

fn test_config(dir: &Path) -> FileRotatorConfig {
    FileRotatorConfig {
        flush_interval: Duration::from_millis(10),
        ..FileRotatorConfig::new(dir, BASE)
    }
}

fn read_index(dir: &Path, index: u64) -> Vec<u8> {
    fs::read(dir.join(format!("{BASE}.{index}"))).unwrap()
}

fn indexes(dir: &Path) -> Vec<u64> {
    existing_indexes(dir, BASE).unwrap()
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// =============================================================================
// Config and limits
// =============================================================================

#[test]
fn test_config_file_path() {
    let config = FileRotatorConfig::new("/alloc/web/local", BASE);
    assert_eq!(
        config.file_path(7),
        PathBuf::from("/alloc/web/local/web.stdout.7")
    );
    assert_eq!(config.buffer_size, crate::util::DEFAULT_BUFFER_SIZE);
}

#[test]
fn test_zero_limits_rejected() {
    let temp_dir = TempDir::new().unwrap();

    let result = FileRotator::new(test_config(temp_dir.path()), RotationLimits::new(0, 10));
    assert!(matches!(result, Err(RotatorError::InvalidLimits(_))));

    let result = FileRotator::new(test_config(temp_dir.path()), RotationLimits::new(1, 0));
    assert!(matches!(result, Err(RotatorError::InvalidLimits(_))));
}

#[test]
fn test_handle_rejects_invalid_limits() {
    let temp_dir = TempDir::new().unwrap();
    let rotator =
        FileRotator::new(test_config(temp_dir.path()), RotationLimits::new(3, 100)).unwrap();
    let handle = rotator.limits_handle();

    assert!(handle.set(RotationLimits::new(3, 0)).is_err());
    assert_eq!(handle.get(), RotationLimits::new(3, 100));

    handle.set(RotationLimits::new(5, 50)).unwrap();
    assert_eq!(handle.get(), RotationLimits::new(5, 50));
}

#[test]
fn test_init_fails_when_dir_is_a_file() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("local");
    fs::write(&blocker, b"not a directory").unwrap();

    let result = FileRotator::new(test_config(&blocker), RotationLimits::new(3, 100));
    match result {
        Err(RotatorError::Init { path, .. }) => assert_eq!(path, blocker),
        other => panic!("expected init error, got {:?}", other.err()),
    }
}

// =============================================================================
// Startup
// =============================================================================

#[test]
fn test_creates_dir_and_first_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("local");

    let rotator = FileRotator::new(test_config(&dir), RotationLimits::new(3, 100)).unwrap();

    assert!(dir.is_dir());
    assert_eq!(rotator.current_path(), dir.join("web.stdout.0"));
    assert!(rotator.current_path().exists());
}

#[tokio::test]
async fn test_resumes_highest_index_and_appends() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("web.stdout.0"), b"old\n").unwrap();
    fs::write(dir.join("web.stdout.3"), b"prev\n").unwrap();
    fs::write(dir.join("web.stdout.bak"), b"ignored").unwrap();
    fs::write(dir.join("web.stderr.9"), b"ignored").unwrap();

    let rotator = FileRotator::new(test_config(dir), RotationLimits::new(2, 100)).unwrap();
    assert_eq!(rotator.current_path(), dir.join("web.stdout.3"));

    // Index 0 falls outside the newest two
    assert_eq!(indexes(dir), vec![3]);
    assert!(dir.join("web.stdout.bak").exists());
    assert!(dir.join("web.stderr.9").exists());

    rotator.run(&b"more\n"[..]).await.unwrap();
    assert_eq!(read_index(dir, 3), b"prev\nmore\n");
}

// =============================================================================
// Writing and rotation
// =============================================================================

#[tokio::test]
async fn test_eof_flushes_and_returns_metrics() {
    let temp_dir = TempDir::new().unwrap();
    let rotator =
        FileRotator::new(test_config(temp_dir.path()), RotationLimits::new(3, 1024)).unwrap();

    let snapshot = rotator.run(&b"hello\nworld\n"[..]).await.unwrap();

    assert_eq!(read_index(temp_dir.path(), 0), b"hello\nworld\n");
    assert_eq!(snapshot.bytes_written, 12);
    assert_eq!(snapshot.files_rotated, 0);
    assert_eq!(snapshot.write_errors, 0);
}

#[tokio::test]
async fn test_chunk_split_at_size_boundary() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let rotator = FileRotator::new(test_config(dir), RotationLimits::new(10, 5)).unwrap();

    let snapshot = rotator.run(&b"hello world!"[..]).await.unwrap();

    assert_eq!(read_index(dir, 0), b"hello");
    assert_eq!(read_index(dir, 1), b" worl");
    assert_eq!(read_index(dir, 2), b"d!");
    assert_eq!(snapshot.files_rotated, 2);
    assert_eq!(snapshot.bytes_written, 12);
}

#[tokio::test]
async fn test_retention_keeps_newest_files() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let rotator = FileRotator::new(test_config(dir), RotationLimits::new(2, 4)).unwrap();

    let snapshot = rotator.run(&b"aaaabbbbccccddddeeee"[..]).await.unwrap();

    assert_eq!(indexes(dir), vec![3, 4]);
    assert_eq!(read_index(dir, 3), b"dddd");
    assert_eq!(read_index(dir, 4), b"eeee");
    assert_eq!(snapshot.files_rotated, 4);
    assert_eq!(snapshot.files_removed, 3);
}

#[tokio::test]
async fn test_periodic_flush_while_stream_open() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("web.stdout.0");
    let rotator =
        FileRotator::new(test_config(temp_dir.path()), RotationLimits::new(3, 1024)).unwrap();

    let (mut writer, reader) = tokio::io::duplex(1024);
    let task = tokio::spawn(rotator.run(reader));

    writer.write_all(b"partial\n").await.unwrap();
    wait_for(|| fs::read(&path).unwrap() == b"partial\n").await;

    drop(writer);
    task.await.unwrap().unwrap();
}

// =============================================================================
// Live limit changes
// =============================================================================

#[tokio::test]
async fn test_smaller_size_limit_rotates_without_truncating() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let rotator = FileRotator::new(test_config(dir), RotationLimits::new(3, 100)).unwrap();
    let handle = rotator.limits_handle();
    let metrics = Arc::clone(rotator.metrics());

    let (mut writer, reader) = tokio::io::duplex(1024);
    let task = tokio::spawn(rotator.run(reader));

    writer.write_all(b"0123456789").await.unwrap();
    wait_for(|| metrics.bytes_written.load(Ordering::Relaxed) == 10).await;

    handle.set(RotationLimits::new(3, 4)).unwrap();
    writer.write_all(b"abcdef").await.unwrap();
    drop(writer);
    task.await.unwrap().unwrap();

    assert_eq!(read_index(dir, 0), b"0123456789");
    assert_eq!(read_index(dir, 1), b"abcd");
    assert_eq!(read_index(dir, 2), b"ef");
}

#[tokio::test]
async fn test_smaller_count_limit_applies_at_next_rotation() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let rotator = FileRotator::new(test_config(dir), RotationLimits::new(5, 4)).unwrap();
    let handle = rotator.limits_handle();
    let metrics = Arc::clone(rotator.metrics());

    let (mut writer, reader) = tokio::io::duplex(1024);
    let task = tokio::spawn(rotator.run(reader));

    writer.write_all(b"aaaabbbb").await.unwrap();
    wait_for(|| metrics.bytes_written.load(Ordering::Relaxed) == 8).await;

    handle.set(RotationLimits::new(1, 4)).unwrap();
    // Nothing is removed until a rotation happens
    assert_eq!(indexes(dir), vec![0, 1]);

    writer.write_all(b"cc").await.unwrap();
    drop(writer);
    task.await.unwrap().unwrap();

    assert_eq!(indexes(dir), vec![2]);
    assert_eq!(read_index(dir, 2), b"cc");
}

//! Tests for SSTable implementation
//!
//! These tests verify:
//! - SSTable creation and the on-disk layout
//! - O(log n) key lookups via binary search
//! - Range scans with header pruning
//! - Open/close lifecycle (idempotence, lazy open)
//! - Rejection of empty, unsorted and corrupt input

use std::path::PathBuf;

use lsmkv::storage::sstable::{FORMAT_VERSION, HEADER_SIZE};
use lsmkv::storage::{SSTableBuilder, SSTableFile};
use lsmkv::KvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_sstable() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    (temp_dir, path)
}

/// Create an SSTable holding `(k, k * 100)` for each key
fn create_sstable(path: &PathBuf, keys: &[u64]) -> SSTableFile<u64, u64> {
    let entries: Vec<(u64, u64)> = keys.iter().map(|&k| (k, k * 100)).collect();
    SSTableFile::create(path, &entries).unwrap();
    SSTableFile::new(path)
}

// =============================================================================
// Creation Tests
// =============================================================================

#[test]
fn test_create_writes_header_and_records() {
    let (_temp, path) = setup_temp_sstable();

    let header = SSTableFile::<u64, u64>::create(&path, &[(1, 100), (3, 300), (5, 500)]).unwrap();

    assert_eq!(header.version, FORMAT_VERSION);
    assert_eq!(header.num_entries, 3);
    assert_eq!(header.min_key, 1);
    assert_eq!(header.max_key, 5);
    assert_eq!(header.header_size, HEADER_SIZE);
    assert!(header.creation_timestamp_us > 0);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len() as u64, HEADER_SIZE + 3 * 16);

    // First record follows the header directly: key 1, value 100
    let record = &bytes[HEADER_SIZE as usize..HEADER_SIZE as usize + 16];
    assert_eq!(&record[0..8], &1u64.to_le_bytes());
    assert_eq!(&record[8..16], &100u64.to_le_bytes());
}

#[test]
fn test_create_empty_fails() {
    let (_temp, path) = setup_temp_sstable();

    let result = SSTableFile::<u64, u64>::create(&path, &[]);

    assert!(matches!(result, Err(KvError::MalformedInput(_))));
    assert!(!path.exists());
}

#[test]
fn test_create_unsorted_fails_and_cleans_up() {
    let (_temp, path) = setup_temp_sstable();

    let result = SSTableFile::<u64, u64>::create(&path, &[(1, 1), (3, 3), (2, 2)]);

    assert!(matches!(result, Err(KvError::MalformedInput(_))));
    assert!(!path.exists());
}

#[test]
fn test_create_never_replaces_existing_file() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable(&path, &[1]);
    let original = std::fs::read(&path).unwrap();

    let unsorted = SSTableFile::<u64, u64>::create(&path, &[(5, 1), (2, 2)]);
    assert!(matches!(unsorted, Err(KvError::Io(_))));

    let valid = SSTableFile::<u64, u64>::create(&path, &[(7, 7)]);
    assert!(matches!(valid, Err(KvError::Io(_))));

    let empty = SSTableFile::<u64, u64>::create(&path, &[]);
    assert!(matches!(empty, Err(KvError::MalformedInput(_))));

    assert_eq!(std::fs::read(&path).unwrap(), original);
    let mut sstable: SSTableFile<u64, u64> = SSTableFile::new(&path);
    assert_eq!(sstable.get(&1).unwrap(), 100);
}

#[test]
fn test_builder_refuses_existing_path() {
    let (_temp, path) = setup_temp_sstable();
    std::fs::write(&path, b"keep me").unwrap();

    let result = SSTableBuilder::<u64, u64>::new(&path, 1);

    assert!(matches!(result, Err(KvError::Io(_))));
    assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
}

#[test]
fn test_create_duplicate_keys_fails() {
    let (_temp, path) = setup_temp_sstable();

    let result = SSTableFile::<u64, u64>::create(&path, &[(1, 1), (1, 2)]);

    assert!(matches!(result, Err(KvError::MalformedInput(_))));
}

#[test]
fn test_builder_streaming() {
    let (_temp, path) = setup_temp_sstable();

    let mut builder = SSTableBuilder::<u32, u32>::new(&path, 42).unwrap();
    builder.add(10, 1).unwrap();
    builder.add(20, 2).unwrap();
    let header = builder.finish(false).unwrap();

    assert_eq!(header.creation_timestamp_us, 42);
    assert_eq!(header.num_entries, 2);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_SIZE + 2 * 8);
}

#[test]
fn test_generate_filename() {
    let dir = PathBuf::from("/var/lib/db");
    let path = SSTableFile::<u64, u64>::generate_filename(&dir);

    assert_eq!(path.parent(), Some(dir.as_path()));
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("sst_"));
    assert!(name.ends_with(".db"));
    assert!(name["sst_".len()..name.len() - ".db".len()].parse::<u64>().is_ok());
}

// =============================================================================
// Open/Close Tests
// =============================================================================

#[test]
fn test_open_loads_header() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[2, 4, 6]);

    assert!(!sstable.is_open());
    assert!(sstable.header().is_none());

    sstable.open().unwrap();

    assert!(sstable.is_open());
    let header = sstable.header().unwrap();
    assert_eq!(header.num_entries, 3);
    assert_eq!(header.min_key, 2);
    assert_eq!(header.max_key, 6);
}

#[test]
fn test_open_is_idempotent() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[1]);

    sstable.open().unwrap();
    sstable.open().unwrap();
    assert!(sstable.is_open());
}

#[test]
fn test_open_missing_file() {
    let temp = TempDir::new().unwrap();
    let mut sstable: SSTableFile<u64, u64> = SSTableFile::new(temp.path().join("missing.db"));

    assert!(matches!(sstable.open(), Err(KvError::Io(_))));
    assert!(!sstable.is_open());
}

#[test]
fn test_open_truncated_header() {
    let (_temp, path) = setup_temp_sstable();
    std::fs::write(&path, [1u8; 10]).unwrap();

    let mut sstable: SSTableFile<u64, u64> = SSTableFile::new(&path);
    assert!(matches!(sstable.open(), Err(KvError::Io(_))));
}

#[test]
fn test_open_wrong_version() {
    let (_temp, path) = setup_temp_sstable();
    let mut bytes = vec![0u8; HEADER_SIZE as usize];
    bytes[0..4].copy_from_slice(&9u32.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let mut sstable: SSTableFile<u64, u64> = SSTableFile::new(&path);
    assert!(matches!(sstable.open(), Err(KvError::Corruption(_))));
}

#[test]
fn test_close_is_idempotent() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[1, 2]);

    sstable.open().unwrap();
    sstable.close();
    sstable.close();

    assert!(!sstable.is_open());
    // Header stays cached for range checks
    assert!(sstable.contains_key_range(&1, &1));
}

#[test]
fn test_get_reopens_after_close() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[1, 2, 3]);

    sstable.open().unwrap();
    sstable.close();

    assert_eq!(sstable.get(&2).unwrap(), 200);
    assert!(sstable.is_open());
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_get_auto_opens() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[1, 3, 5, 7, 9]);

    assert_eq!(sstable.get(&5).unwrap(), 500);
    assert!(sstable.is_open());
}

#[test]
fn test_get_every_key_round_trip() {
    let (_temp, path) = setup_temp_sstable();
    let keys: Vec<u64> = (0..257).map(|i| i * 3).collect();
    let mut sstable = create_sstable(&path, &keys);

    for &key in &keys {
        assert_eq!(sstable.get(&key).unwrap(), key * 100, "key {}", key);
    }
}

#[test]
fn test_get_missing_inside_range() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[1, 3, 5, 7, 9]);

    for key in [2u64, 4, 6, 8] {
        assert!(matches!(sstable.get(&key), Err(KvError::KeyNotFound)));
    }
}

#[test]
fn test_get_outside_range() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[10, 20, 30]);

    assert!(matches!(sstable.get(&9), Err(KvError::KeyNotFound)));
    assert!(matches!(sstable.get(&31), Err(KvError::KeyNotFound)));
}

#[test]
fn test_get_single_entry() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[42]);

    assert_eq!(sstable.get(&42).unwrap(), 4200);
    assert!(sstable.get(&41).is_err());
}

#[test]
fn test_get_signed_keys() {
    let (_temp, path) = setup_temp_sstable();
    let entries: Vec<(i64, u32)> = vec![(-50, 1), (-1, 2), (0, 3), (99, 4)];
    SSTableFile::create(&path, &entries).unwrap();

    let mut sstable: SSTableFile<i64, u32> = SSTableFile::new(&path);
    assert_eq!(sstable.get(&-50).unwrap(), 1);
    assert_eq!(sstable.get(&-1).unwrap(), 2);
    assert_eq!(sstable.get(&99).unwrap(), 4);
    assert!(matches!(sstable.get(&-51), Err(KvError::KeyNotFound)));
    assert_eq!(sstable.scan(&-10, &10).unwrap(), vec![(-1, 2), (0, 3)]);
}

#[test]
fn test_truncated_records_are_corruption() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable(&path, &[1, 2, 3, 4]);

    // Drop the last two records but leave the header claiming four
    let len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 32).unwrap();

    let mut sstable: SSTableFile<u64, u64> = SSTableFile::new(&path);
    let result = sstable.get(&4);
    assert!(matches!(result, Err(KvError::Corruption(_))));
    assert!(!result.unwrap_err().is_not_found());
    assert!(!sstable.is_open());
    assert!(matches!(sstable.scan(&1, &2), Err(KvError::Corruption(_))));
}

#[test]
fn test_huge_entry_count_is_corruption() {
    let (_temp, path) = setup_temp_sstable();
    create_sstable(&path, &[1, 3]);

    // NumEntries lives at bytes 8..16
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let mut sstable: SSTableFile<u64, u64> = SSTableFile::new(&path);
    assert!(matches!(sstable.open(), Err(KvError::Corruption(_))));
    assert!(matches!(sstable.get(&3), Err(KvError::Corruption(_))));
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_range() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[1, 2, 3, 5, 7, 8, 9]);

    let results = sstable.scan(&3, &7).unwrap();
    assert_eq!(results, vec![(3, 300), (5, 500), (7, 700)]);
}

#[test]
fn test_scan_bounds_between_keys() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[10, 20, 30, 40]);

    assert_eq!(sstable.scan(&11, &39).unwrap(), vec![(20, 2000), (30, 3000)]);
}

#[test]
fn test_scan_covering_whole_table() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[10, 20, 30]);

    assert_eq!(
        sstable.scan(&0, &u64::MAX).unwrap(),
        vec![(10, 1000), (20, 2000), (30, 3000)]
    );
}

#[test]
fn test_scan_disjoint_range_is_empty() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[10, 20, 30]);

    assert!(sstable.scan(&31, &50).unwrap().is_empty());
    assert!(sstable.scan(&0, &9).unwrap().is_empty());
}

#[test]
fn test_scan_gap_inside_range_is_empty() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[10, 20, 30]);

    assert!(sstable.scan(&11, &19).unwrap().is_empty());
}

// =============================================================================
// Range Check Tests
// =============================================================================

#[test]
fn test_contains_key_range() {
    let (_temp, path) = setup_temp_sstable();
    let mut sstable = create_sstable(&path, &[10, 20, 30]);

    // Header not loaded yet
    assert!(!sstable.contains_key_range(&10, &30));

    sstable.open().unwrap();
    assert!(sstable.contains_key_range(&0, &10));
    assert!(sstable.contains_key_range(&15, &25));
    assert!(sstable.contains_key_range(&30, &100));
    assert!(sstable.contains_key_range(&0, &100));
    assert!(!sstable.contains_key_range(&0, &9));
    assert!(!sstable.contains_key_range(&31, &100));
}

//! Concurrent safety tests for the file cache.
//!
//! These tests verify the double-checked load protocol and the counter
//! transitions under concurrent access from multiple threads.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use vgb_cache::{FileCache, GridCollection, GridMeta, GridType};
use vgb_io::{write_volume, GridTree, HEADER_SIZE};

// =============================================================================
// Test Volume Factories
// =============================================================================

fn write_test_volume(path: &Path, grids: &[(&str, GridType)]) {
    let grids: Vec<_> = grids
        .iter()
        .map(|&(name, ty)| {
            let channels = ty.channels();
            let mut tree = GridTree::new(4, channels);
            if channels > 0 {
                tree.push_block([0, 0, 0], vec![1.0; 64 * channels as usize])
                    .unwrap();
            }
            (GridMeta::new(name, ty), tree)
        })
        .collect();
    write_volume(path, &grids).unwrap();
}

// =============================================================================
// At-Most-One Tree Read
// =============================================================================

#[test]
fn test_concurrent_promotion_reads_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fog.vgb");
    write_test_volume(&path, &[("density", GridType::Float)]);

    let cache = Arc::new(FileCache::new());
    let collection = Arc::new(GridCollection::with_cache(&path, Arc::clone(&cache)));
    assert!(collection.load());

    let num_threads = 8;
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let collection = Arc::clone(&collection);
            thread::spawn(move || {
                for _ in 0..100 {
                    assert!(collection.load_grid(0));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert!(collection.grid_at(0).unwrap().is_loaded());
    assert!(collection.error_message().is_none());

    // Corrupt the file: if any further promotion re-read it, it would now
    // error. The tree is resident, so none may.
    fs::write(&path, [b'x'; 64]).unwrap();
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let collection = Arc::clone(&collection);
            thread::spawn(move || {
                for _ in 0..100 {
                    assert!(collection.load_grid(0));
                    assert!(collection.grid_at(0).unwrap().tree().is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    assert!(collection.error_message().is_none());
}

#[test]
fn test_concurrent_failed_loads_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("torn.vgb");
    write_test_volume(&path, &[("density", GridType::Float)]);

    // Keep the directory, drop the tree payload: enumeration succeeds,
    // every tree read fails.
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..HEADER_SIZE + 91]).unwrap();

    let collection = Arc::new(GridCollection::with_cache(&path, Arc::new(FileCache::new())));
    assert!(collection.load());

    let num_threads = 8;
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let collection = Arc::clone(&collection);
            thread::spawn(move || {
                assert!(!collection.load_grid(0));
                collection
                    .grid_at(0)
                    .unwrap()
                    .error_message()
                    .expect("failed load must record an error")
            })
        })
        .collect();

    let messages: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .collect();

    // Every thread observed the same terminal error.
    for message in &messages {
        assert_eq!(message, &messages[0]);
    }
    assert!(collection.grid_at(0).unwrap().is_loaded());
}

// =============================================================================
// Concurrent Collection Loads
// =============================================================================

#[test]
fn test_concurrent_collection_loads_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fog.vgb");
    write_test_volume(
        &path,
        &[("density", GridType::Float), ("heat", GridType::Float)],
    );

    let cache = Arc::new(FileCache::new());
    let collection = Arc::new(GridCollection::with_cache(&path, Arc::clone(&cache)));

    let num_threads = 8;
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let collection = Arc::clone(&collection);
            thread::spawn(move || {
                for _ in 0..50 {
                    assert!(collection.load());
                    assert_eq!(collection.len(), 2);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    // One enumeration, one metadata user per grid.
    assert_eq!(cache.len(), 2);
}

// =============================================================================
// Counter Churn Across Threads
// =============================================================================

#[test]
fn test_clones_promote_and_demote_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fog.vgb");
    write_test_volume(&path, &[("density", GridType::Float)]);

    let cache = Arc::new(FileCache::new());
    let collection = GridCollection::with_cache(&path, Arc::clone(&cache));
    assert!(collection.load());

    let num_threads = 8;
    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let copy = collection.clone();
            thread::spawn(move || {
                for round in 0..50 {
                    if (i + round) % 3 == 0 {
                        copy.load_grid(0);
                    } else {
                        copy.unload_grid(0);
                    }
                }
                // Drop the clone from this thread.
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    // All clones are gone; the original keeps the entry alive.
    assert_eq!(cache.len(), 1);
    drop(collection);
    assert!(cache.is_empty());
}

#[test]
fn test_handle_drop_races_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fog.vgb");
    write_test_volume(&path, &[("density", GridType::Float)]);

    let cache = Arc::new(FileCache::new());

    // Repeatedly create, load, and destroy sibling collections of the same
    // file from many threads: entries bounce between live and evicted.
    let num_threads = 8;
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let path = path.clone();
            thread::spawn(move || {
                for _ in 0..30 {
                    let collection = GridCollection::with_cache(&path, Arc::clone(&cache));
                    assert!(collection.load());
                    assert!(collection.load_grid(0));
                    assert!(collection.grid_at(0).unwrap().tree().is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert!(cache.is_empty());
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use clockpool::{BufferPoolManager, FileRef, MemFile, PageId};

const POOL_SIZE: usize = 64;
const NUM_PAGES: usize = 256;

fn setup(pool_size: usize, pages: usize) -> (BufferPoolManager, FileRef, Vec<PageId>) {
    let file: FileRef = Arc::new(MemFile::new("bench.db"));
    let bpm = BufferPoolManager::new(pool_size);
    let page_ids = (0..pages)
        .map(|_| {
            let (pid, _) = bpm.alloc_page(&file).unwrap();
            bpm.unpin_page(&file, pid, false).unwrap();
            pid
        })
        .collect();
    (bpm, file, page_ids)
}

// Every page fits: read_page is always a directory hit
fn bench_hits(c: &mut Criterion) {
    let (bpm, file, page_ids) = setup(POOL_SIZE, POOL_SIZE);

    c.bench_function("read_page hit", |b| {
        b.iter(|| {
            for &pid in black_box(&page_ids) {
                let handle = bpm.read_page(&file, pid).unwrap();
                bpm.unpin_page(&file, handle.page_id(), false).unwrap();
            }
        });
    });
}

// Sequential scan over 4x the pool: every access runs the clock sweep
fn bench_scan(c: &mut Criterion) {
    let (bpm, file, page_ids) = setup(POOL_SIZE, NUM_PAGES);

    let mut group = c.benchmark_group("clock sweep");
    group.sample_size(20);
    group.bench_function("sequential scan", |b| {
        b.iter(|| {
            for &pid in black_box(&page_ids) {
                bpm.read_page(&file, pid).unwrap();
                bpm.unpin_page(&file, pid, false).unwrap();
            }
        });
    });
    group.bench_function("dirty scan", |b| {
        b.iter(|| {
            for &pid in black_box(&page_ids) {
                bpm.read_page(&file, pid).unwrap();
                bpm.unpin_page(&file, pid, true).unwrap();
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_hits, bench_scan);
criterion_main!(benches);

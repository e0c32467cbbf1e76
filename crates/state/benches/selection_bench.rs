//! Selection store benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kbpick_core::Resource;
use kbpick_state::SelectionStore;

/// Files spread over `dirs` folders, plus the folders themselves
fn build_pool(dirs: usize, files_per_dir: usize) -> (Vec<Resource>, Vec<Resource>) {
    let folders: Vec<Resource> = (0..dirs)
        .map(|d| Resource::directory(format!("d{}", d), &format!("/team/folder{}/", d)))
        .collect();
    let files = (0..dirs)
        .flat_map(|d| {
            (0..files_per_dir).map(move |f| {
                Resource::file(format!("d{}f{}", d, f), &format!("/team/folder{}/file{}.txt", d, f))
            })
        })
        .collect();
    (folders, files)
}

fn bench_add_many(c: &mut Criterion) {
    let (folders, files) = build_pool(10, 20);

    c.bench_function("add_many_200_files", |b| {
        b.iter(|| {
            let mut store = SelectionStore::new();
            black_box(store.add_many(files.iter().cloned()))
        });
    });

    c.bench_function("folders_absorb_200_files", |b| {
        b.iter(|| {
            let mut store = SelectionStore::new();
            store.add_many(files.iter().cloned());
            for folder in &folders {
                store.toggle(folder.clone());
            }
            black_box(store.len())
        });
    });
}

fn bench_is_selected(c: &mut Criterion) {
    let (folders, files) = build_pool(10, 20);
    let mut store = SelectionStore::new();
    store.add_many(folders.iter().step_by(2).cloned());

    c.bench_function("is_selected_200_files", |b| {
        b.iter(|| black_box(store.all_selected(black_box(&files))));
    });
}

criterion_group!(benches, bench_add_many, bench_is_selected);
criterion_main!(benches);

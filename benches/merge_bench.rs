//! Benchmarks the walker and resolver against a synthetic tree, the same
//! way the pack's mediagit `merge_bench.rs` exercises its own merge engine
//! end to end rather than timing any single data structure in isolation.
//! Translated here to this crate's synchronous, trait-object-free style.

use criterion::{criterion_group, criterion_main, Criterion};
use std::collections::HashMap;
use std::convert::Infallible;
use trimerge::delta::DeltaBuilder;
use trimerge::mode::FileMode;
use trimerge::oid::Oid;
use trimerge::resolve::{IndexStore, MergeStage, ObjectStore, ReucEntry, Resolver, ResolveOpts};
use trimerge::tree::{TreeEntry, TreeIterator};
use trimerge::walk::WalkOpts;

/// Same shape as `tree::test_support::VecTreeIterator`: a pre-sorted,
/// pre-flattened in-memory tree.
struct VecTreeIterator {
    entries: std::vec::IntoIter<TreeEntry>,
}

impl VecTreeIterator {
    fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| {
            trimerge::path::path_cmp_explicit(&a.path, a.is_dir(), &b.path, b.is_dir())
        });
        Self { entries: entries.into_iter() }
    }
}

impl TreeIterator for VecTreeIterator {
    type Error = Infallible;

    fn next(&mut self) -> Result<Option<TreeEntry>, Self::Error> {
        Ok(self.entries.next())
    }
}

#[derive(Default)]
struct InMemoryObjects {
    blobs: HashMap<Oid, Vec<u8>>,
}

impl InMemoryObjects {
    fn put(&mut self, content: &[u8]) -> Oid {
        let oid = Oid::hash_bytes(content);
        self.blobs.insert(oid, content.to_vec());
        oid
    }
}

impl ObjectStore for InMemoryObjects {
    type Error = Infallible;

    fn read_blob(&self, oid: Oid) -> Result<Vec<u8>, Self::Error> {
        Ok(self.blobs.get(&oid).cloned().unwrap_or_default())
    }

    fn write_blob(&mut self, content: &[u8]) -> Result<Oid, Self::Error> {
        Ok(self.put(content))
    }
}

#[derive(Default)]
struct InMemoryIndex {
    resolved: HashMap<String, (FileMode, Oid, Option<u64>)>,
    conflicts: HashMap<String, [Option<(FileMode, Oid)>; 3]>,
    reuc: Vec<ReucEntry>,
}

impl IndexStore for InMemoryIndex {
    type Error = Infallible;

    fn upsert(&mut self, path: &str, mode: FileMode, oid: Oid, size: Option<u64>) -> Result<(), Self::Error> {
        self.conflicts.remove(path);
        self.resolved.insert(path.to_owned(), (mode, oid, size));
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), Self::Error> {
        self.resolved.remove(path);
        Ok(())
    }

    fn stage_conflict(&mut self, path: &str, stage: MergeStage, mode: FileMode, oid: Oid) -> Result<(), Self::Error> {
        let slot = self.conflicts.entry(path.to_owned()).or_insert([None, None, None]);
        slot[stage as usize - 1] = Some((mode, oid));
        Ok(())
    }

    fn add_reuc(&mut self, entry: ReucEntry) -> Result<(), Self::Error> {
        self.reuc.push(entry);
        Ok(())
    }
}

/// A wide, shallow tree: `N` files, a third untouched, a third modified on
/// one side only (trivially resolvable), a third modified on both sides
/// with divergent content (forces the automerge path).
fn build_trees(objects: &mut InMemoryObjects, n: usize) -> (Vec<TreeEntry>, Vec<TreeEntry>, Vec<TreeEntry>) {
    let mut ancestor = Vec::with_capacity(n);
    let mut ours = Vec::with_capacity(n);
    let mut theirs = Vec::with_capacity(n);

    for i in 0..n {
        let path = format!("src/file_{:04}.txt", i);
        let base_oid = objects.put(format!("line one\nline two {}\nline three\n", i).as_bytes());
        ancestor.push(TreeEntry::new(&path, FileMode::Regular, base_oid, Some(1)));

        match i % 3 {
            0 => {
                ours.push(TreeEntry::new(&path, FileMode::Regular, base_oid, Some(1)));
                theirs.push(TreeEntry::new(&path, FileMode::Regular, base_oid, Some(1)));
            }
            1 => {
                let ours_oid =
                    objects.put(format!("line one changed\nline two {}\nline three\n", i).as_bytes());
                ours.push(TreeEntry::new(&path, FileMode::Regular, ours_oid, Some(1)));
                theirs.push(TreeEntry::new(&path, FileMode::Regular, base_oid, Some(1)));
            }
            _ => {
                let ours_oid =
                    objects.put(format!("ours changed\nline two {}\nline three\n", i).as_bytes());
                let theirs_oid =
                    objects.put(format!("line one\nline two {}\ntheirs changed\n", i).as_bytes());
                ours.push(TreeEntry::new(&path, FileMode::Regular, ours_oid, Some(1)));
                theirs.push(TreeEntry::new(&path, FileMode::Regular, theirs_oid, Some(1)));
            }
        }
    }

    (ancestor, ours, theirs)
}

fn bench_delta_build(c: &mut Criterion) {
    let mut objects = InMemoryObjects::default();
    let (ancestor, ours, theirs) = build_trees(&mut objects, 1000);

    c.bench_function("delta_build_1000_files", |b| {
        b.iter(|| {
            DeltaBuilder::build(
                VecTreeIterator::new(ancestor.clone()),
                VecTreeIterator::new(ours.clone()),
                VecTreeIterator::new(theirs.clone()),
                WalkOpts::default(),
            )
            .unwrap()
        })
    });
}

fn bench_resolve(c: &mut Criterion) {
    let mut objects = InMemoryObjects::default();
    let (ancestor, ours, theirs) = build_trees(&mut objects, 1000);
    let deltas = DeltaBuilder::build(
        VecTreeIterator::new(ancestor),
        VecTreeIterator::new(ours),
        VecTreeIterator::new(theirs),
        WalkOpts::default(),
    )
    .unwrap();

    c.bench_function("resolve_1000_files", |b| {
        b.iter(|| {
            let mut index = InMemoryIndex::default();
            Resolver::run(&deltas, &mut objects, &mut index, ResolveOpts::default(), "HEAD", "theirs").unwrap()
        })
    });
}

criterion_group!(benches, bench_delta_build, bench_resolve);
criterion_main!(benches);

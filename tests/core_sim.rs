// tests/core_sim.rs

mod common;

use std::path::PathBuf;
use std::time::Duration;

use treewatch::engine::WatchOptions;
use treewatch::errors::WatcherError;
use treewatch::types::Notification;

use crate::common::{SimHarness, SimTree, init_tracing};

fn v(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

#[test]
fn file_write_reports_create_then_close_write() {
    init_tracing();
    let mut h = SimHarness::new(&["/r"], &[]);

    h.sim.write_file("/r/abc.txt", b"").unwrap();
    assert_eq!(h.pump(), v(&["/r/abc.txt,CREATE", "/r/abc.txt,CLOSE_WRITE"]));

    h.sim.write_file("/r/abc.txt", b"more").unwrap();
    assert_eq!(h.pump(), v(&["/r/abc.txt,MODIFY", "/r/abc.txt,CLOSE_WRITE"]));
}

#[test]
fn renamed_directory_reports_new_paths_for_children() {
    init_tracing();
    let mut h = SimHarness::new(&["/r"], &[]);

    h.sim.mkdir("/r/a").unwrap();
    assert_eq!(h.pump(), v(&["/r/a,CREATE_DIR"]));

    h.sim.rename("/r/a", "/r/b").unwrap();
    h.sim.write_file("/r/b/x.txt", b"").unwrap();
    assert_eq!(
        h.pump(),
        v(&[
            "/r/a,MOVED_FROM_DIR",
            "/r/b,MOVED_TO_DIR",
            "/r/b/x.txt,CREATE",
            "/r/b/x.txt,CLOSE_WRITE",
        ])
    );
    h.assert_paths_consistent();
}

#[test]
fn recursive_delete_is_innermost_first() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/r/1/1/1").unwrap();
    let mut h = SimHarness::start(sim, &["/r"], &[], WatchOptions::default()).unwrap();

    h.sim.remove_all("/r/1").unwrap();
    assert_eq!(
        h.pump(),
        v(&["/r/1/1/1,DELETE_DIR", "/r/1/1,DELETE_DIR", "/r/1,DELETE_DIR"])
    );
    assert_eq!(h.watched(), vec![PathBuf::from("/r")]);
    assert_eq!(h.core.diagnostics().snapshot().orphans, 0);
}

#[test]
fn excluded_directory_only_reports_its_own_entry() {
    init_tracing();
    let mut h = SimHarness::new(&["/r"], &["a"]);

    h.sim.mkdir("/r/a").unwrap();
    h.sim.write_file("/r/a/x.txt", b"").unwrap();
    h.sim.write_file("/r/b.txt", b"").unwrap();

    assert_eq!(
        h.pump(),
        v(&["/r/a,CREATE_DIR", "/r/b.txt,CREATE", "/r/b.txt,CLOSE_WRITE"])
    );
    assert_eq!(h.watched(), vec![PathBuf::from("/r")]);
}

#[test]
fn directory_moved_in_from_outside_is_watched() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/r").unwrap();
    sim.mkdir_all("/r2/old/deep").unwrap();
    let mut h = SimHarness::start(sim, &["/r"], &[], WatchOptions::default()).unwrap();

    h.sim.rename("/r2/old", "/r/new").unwrap();
    assert_eq!(h.pump(), v(&["/r/new,MOVED_TO_DIR"]));

    h.sim.write_file("/r/new/deep/f", b"").unwrap();
    assert_eq!(h.pump(), v(&["/r/new/deep/f,CREATE", "/r/new/deep/f,CLOSE_WRITE"]));
    h.assert_paths_consistent();
}

#[test]
fn directory_moved_out_is_torn_down_after_pairing_window() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/r/leaving/inner").unwrap();
    sim.mkdir_all("/outside").unwrap();
    let mut h = SimHarness::start(sim, &["/r"], &[], WatchOptions::default()).unwrap();
    assert_eq!(h.sim.watch_count(), 3);

    h.sim.rename("/r/leaving", "/outside/leaving").unwrap();
    assert_eq!(h.pump(), v(&["/r/leaving,MOVED_FROM_DIR"]));

    // Still inside the window: changes in the detached subtree stay quiet.
    h.sim.write_file("/outside/leaving/inner/f", b"").unwrap();
    assert!(h.pump().is_empty());

    assert!(h.advance(Duration::from_millis(150)).is_empty());
    assert_eq!(h.watched(), vec![PathBuf::from("/r")]);
    assert_eq!(h.sim.watch_count(), 1);

    // Released watches produce nothing afterwards.
    h.sim.write_file("/outside/leaving/g", b"").unwrap();
    assert!(h.pump().is_empty());
    let diag = h.core.diagnostics().snapshot();
    assert_eq!(diag.expired_moves, 1);
    assert_eq!(diag.suppressed, 2);
}

#[test]
fn rapid_successive_renames_pair_independently() {
    init_tracing();
    let mut h = SimHarness::new(&["/r"], &[]);
    h.sim.mkdir_all("/r/A/sub").unwrap();
    h.pump();

    h.sim.rename("/r/A", "/r/B").unwrap();
    h.sim.rename("/r/B", "/r/C").unwrap();
    h.sim.rename("/r/C", "/r/D").unwrap();
    h.sim.write_file("/r/D/sub/f", b"").unwrap();

    assert_eq!(
        h.pump(),
        v(&[
            "/r/A,MOVED_FROM_DIR",
            "/r/B,MOVED_TO_DIR",
            "/r/B,MOVED_FROM_DIR",
            "/r/C,MOVED_TO_DIR",
            "/r/C,MOVED_FROM_DIR",
            "/r/D,MOVED_TO_DIR",
            "/r/D/sub/f,CREATE",
            "/r/D/sub/f,CLOSE_WRITE",
        ])
    );
    h.assert_paths_consistent();
    assert_eq!(h.core.pending_moves(), 0);
}

#[test]
fn name_reused_before_rename_is_seen_watches_both_directories() {
    init_tracing();
    let mut h = SimHarness::new(&["/r"], &[]);

    h.sim.mkdir("/r/a").unwrap();
    h.sim.rename("/r/a", "/r/b").unwrap();
    h.sim.mkdir("/r/a").unwrap();
    assert_eq!(
        h.pump(),
        v(&[
            "/r/a,CREATE_DIR",
            "/r/a,MOVED_FROM_DIR",
            "/r/b,MOVED_TO_DIR",
            "/r/a,CREATE_DIR",
        ])
    );
    assert_eq!(
        h.watched(),
        vec![PathBuf::from("/r"), PathBuf::from("/r/a"), PathBuf::from("/r/b")]
    );
    h.assert_paths_consistent();

    h.sim.write_file("/r/b/x.txt", b"").unwrap();
    h.sim.write_file("/r/a/y.txt", b"").unwrap();
    assert_eq!(
        h.pump(),
        v(&[
            "/r/b/x.txt,CREATE",
            "/r/b/x.txt,CLOSE_WRITE",
            "/r/a/y.txt,CREATE",
            "/r/a/y.txt,CLOSE_WRITE",
        ])
    );
    assert_eq!(h.core.diagnostics().snapshot().orphans, 0);
}

#[test]
fn directory_moved_out_and_back_reports_immediately() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/r/a").unwrap();
    sim.mkdir_all("/outside").unwrap();
    let mut h = SimHarness::start(sim, &["/r"], &[], WatchOptions::default()).unwrap();

    h.sim.rename("/r/a", "/outside/a").unwrap();
    h.sim.rename("/outside/a", "/r/a").unwrap();
    h.sim.write_file("/r/a/x.txt", b"").unwrap();

    // The first cookie is still pending, yet the re-entered directory is live.
    assert_eq!(
        h.pump(),
        v(&[
            "/r/a,MOVED_FROM_DIR",
            "/r/a,MOVED_TO_DIR",
            "/r/a/x.txt,CREATE",
            "/r/a/x.txt,CLOSE_WRITE",
        ])
    );
    assert_eq!(h.core.pending_moves(), 1);

    assert!(h.advance(Duration::from_millis(150)).is_empty());
    assert_eq!(h.watched(), vec![PathBuf::from("/r"), PathBuf::from("/r/a")]);
    assert_eq!(h.core.diagnostics().snapshot().expired_moves, 1);
    h.assert_paths_consistent();
}

#[test]
fn short_rename_does_not_corrupt_prefix_sibling() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/r/a/x").unwrap();
    sim.mkdir_all("/r/ab/y").unwrap();
    let mut h = SimHarness::start(sim, &["/r"], &[], WatchOptions::default()).unwrap();

    h.sim.rename("/r/a", "/r/a-much-longer-name").unwrap();
    h.sim.rename("/r/a-much-longer-name", "/r/z").unwrap();
    h.pump();

    h.assert_paths_consistent();
    h.sim.write_file("/r/ab/y/f", b"").unwrap();
    h.sim.write_file("/r/z/x/f", b"").unwrap();
    assert_eq!(
        h.pump(),
        v(&["/r/ab/y/f,CREATE", "/r/ab/y/f,CLOSE_WRITE", "/r/z/x/f,CREATE", "/r/z/x/f,CLOSE_WRITE"])
    );
}

#[test]
fn renaming_into_and_out_of_exclusion() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/r/work/inner").unwrap();
    let mut h = SimHarness::start(sim, &["/r"], &["node_modules"], WatchOptions::default()).unwrap();

    h.sim.rename("/r/work", "/r/node_modules").unwrap();
    assert_eq!(
        h.pump(),
        v(&["/r/work,MOVED_FROM_DIR", "/r/node_modules,MOVED_TO_DIR"])
    );
    assert_eq!(h.watched(), vec![PathBuf::from("/r")]);

    h.sim.write_file("/r/node_modules/inner/f", b"").unwrap();
    assert!(h.pump().is_empty());

    h.sim.rename("/r/node_modules", "/r/back").unwrap();
    assert_eq!(
        h.pump(),
        v(&["/r/node_modules,MOVED_FROM_DIR", "/r/back,MOVED_TO_DIR"])
    );
    h.sim.write_file("/r/back/inner/g", b"").unwrap();
    assert_eq!(h.pump(), v(&["/r/back/inner/g,CREATE", "/r/back/inner/g,CLOSE_WRITE"]));
    h.assert_paths_consistent();
}

#[test]
fn moves_between_roots_rebase_and_change_owner() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/one/d/e").unwrap();
    sim.mkdir_all("/two").unwrap();
    let mut h = SimHarness::start(sim, &["/one", "/two"], &["e"], WatchOptions::default()).unwrap();
    // "e" is excluded, so only /one, /one/d and /two are watched.
    assert_eq!(h.watched().len(), 3);

    h.sim.rename("/one/d", "/two/d").unwrap();
    assert_eq!(h.pump(), v(&["/one/d,MOVED_FROM_DIR", "/two/d,MOVED_TO_DIR"]));
    h.assert_paths_consistent();

    let d = h.core.table().lookup(std::path::Path::new("/two/d")).unwrap();
    let two = h.core.table().lookup(std::path::Path::new("/two")).unwrap();
    assert_eq!(h.core.table().get(d).unwrap().root(), two);
}

#[test]
fn file_moves_pair_without_structural_change() {
    init_tracing();
    let mut h = SimHarness::new(&["/r"], &[]);
    h.sim.mkdir("/r/d").unwrap();
    h.sim.write_file("/r/f", b"").unwrap();
    h.pump();

    h.sim.rename("/r/f", "/r/d/g").unwrap();
    assert_eq!(h.pump(), v(&["/r/f,MOVED_FROM", "/r/d/g,MOVED_TO"]));
    assert_eq!(h.core.pending_moves(), 0);
}

#[test]
fn root_attribute_change_is_reported_nested_self_change_is_not() {
    init_tracing();
    let mut h = SimHarness::new(&["/r"], &[]);
    h.sim.mkdir("/r/d").unwrap();
    h.pump();

    h.sim.chmod("/r/d", true).unwrap();
    assert_eq!(h.pump(), v(&["/r/d,ATTRIB_DIR"]));

    h.sim.chmod("/r", true).unwrap();
    assert_eq!(h.pump(), v(&["/r,ATTRIB_DIR"]));
}

#[test]
fn unreadable_directory_is_skipped_and_counted() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/r/open").unwrap();
    sim.mkdir_all("/r/locked/inner").unwrap();
    sim.chmod("/r/locked", false).unwrap();
    let h = SimHarness::start(sim, &["/r"], &[], WatchOptions::default()).unwrap();

    assert_eq!(h.watched(), vec![PathBuf::from("/r"), PathBuf::from("/r/open")]);
    assert_eq!(h.core.diagnostics().snapshot().skipped_installs, 1);
}

#[test]
fn watch_limit_fails_the_subtree_but_keeps_running() {
    init_tracing();
    let mut h = SimHarness::new(&["/r"], &[]);
    h.sim.set_watch_limit(Some(2));

    h.sim.mkdir("/r/ok").unwrap();
    assert_eq!(h.pump(), v(&["/r/ok,CREATE_DIR"]));

    h.sim.mkdir("/r/big").unwrap();
    assert_eq!(h.pump(), v(&["/r/big,CREATE_DIR"]));
    let diag = h.core.diagnostics().snapshot();
    assert_eq!(diag.failed_subtrees.len(), 1);
    assert_eq!(diag.failed_subtrees[0].path, PathBuf::from("/r/big"));

    h.sim.write_file("/r/ok/f", b"").unwrap();
    assert_eq!(h.pump(), v(&["/r/ok/f,CREATE", "/r/ok/f,CLOSE_WRITE"]));
}

#[test]
fn watch_limit_on_a_root_fails_start() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/r/a/b").unwrap();
    sim.set_watch_limit(Some(1));

    let err = SimHarness::start(sim, &["/r"], &[], WatchOptions::default()).err();
    assert!(matches!(err, Some(WatcherError::WatchLimit { .. })));
}

#[test]
fn removed_root_is_forgotten_without_orphans() {
    init_tracing();
    let sim = SimTree::new();
    sim.mkdir_all("/r/a").unwrap();
    let mut h = SimHarness::start(sim, &["/r"], &[], WatchOptions::default()).unwrap();

    h.sim.remove_all("/r").unwrap();
    assert_eq!(h.pump(), v(&["/r/a,DELETE_DIR"]));
    assert!(h.core.table().is_empty());
    assert_eq!(h.core.diagnostics().snapshot().orphans, 0);
}

#[test]
fn overflow_ends_the_session() {
    let mut h = SimHarness::new(&["/r"], &[]);
    h.sim.inject(Notification::Overflow);
    let notification = h.sim.drain().remove(0);
    let err = h.core.step(notification, h.now).unwrap_err();
    assert!(matches!(err, WatcherError::QueueOverflow));
}

#[test]
fn pending_move_capacity_expires_oldest() {
    init_tracing();
    let options = WatchOptions {
        max_pending_moves: 1,
        ..WatchOptions::default()
    };
    let sim = SimTree::new();
    sim.mkdir_all("/r/first").unwrap();
    sim.mkdir_all("/r/second").unwrap();
    sim.mkdir_all("/away").unwrap();
    let mut h = SimHarness::start(sim, &["/r"], &[], options).unwrap();

    h.sim.rename("/r/first", "/away/first").unwrap();
    h.sim.rename("/r/second", "/away/second").unwrap();
    h.pump();

    assert_eq!(h.core.pending_moves(), 1);
    assert_eq!(h.watched(), vec![PathBuf::from("/r"), PathBuf::from("/r/second")]);

    h.core.flush_pending();
    h.pump();
    assert_eq!(h.watched(), vec![PathBuf::from("/r")]);
}

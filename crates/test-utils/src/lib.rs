//! Shared helpers for treewatch tests.
//!
//! - [`SimTree`]: in-memory tree + kernel watch simulator
//! - [`builders`]: config builders
//! - real-tree and tracing helpers below

pub mod builders;
pub mod sim;

use std::future::Future;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

pub use sim::SimTree;

static INIT: Once = Once::new();

/// Default ceiling for async test steps.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialise tracing for tests, once per process.
///
/// Output goes through the test writer, so it only shows for failing tests
/// (or with `--nocapture`). Raise the level with e.g.
/// `RUST_LOG=treewatch=trace cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test after [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("test step timed out")
}

/// Create each relative directory path under `root` (parents included).
pub fn make_dirs(root: &Path, dirs: &[&str]) {
    for dir in dirs {
        std::fs::create_dir_all(root.join(dir))
            .unwrap_or_else(|e| panic!("creating {dir:?} under {root:?}: {e}"));
    }
}

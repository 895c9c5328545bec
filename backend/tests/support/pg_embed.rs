//! Process-wide embedded PostgreSQL cluster for integration tests.
//!
//! The cluster is bootstrapped once per test binary. When `PG_RUNTIME_DIR`
//! or `PG_DATA_DIR` is unset, both are pointed at the Cargo target directory
//! so the bootstrap also works in sandboxes that block `/var/tmp`.

use std::path::PathBuf;
use std::time::Duration;

use pg_embedded_setup_unpriv::ClusterHandle;

const BOOTSTRAP_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 500;
const TEST_PASSWORD: &str = "tidewatch_embedded_test";

fn pg_embed_target_dir() -> PathBuf {
    if let Some(target_dir) = std::env::var_os("CARGO_TARGET_DIR") {
        return PathBuf::from(target_dir).join("pg-embed");
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("target")
        .join("pg-embed")
}

/// Transient download and socket failures worth retrying.
fn is_transient_error(err: &str) -> bool {
    const TRANSIENT: [&str; 7] = [
        "error decoding response body",
        "connection reset",
        "connection refused",
        "timed out",
        "temporarily unavailable",
        "dns error",
        "failed to lookup",
    ];
    let err = err.to_lowercase();
    TRANSIENT.iter().any(|pattern| err.contains(pattern))
}

fn prepare_environment() -> Result<(), String> {
    let needs_dirs =
        std::env::var_os("PG_RUNTIME_DIR").is_none() || std::env::var_os("PG_DATA_DIR").is_none();
    let base = pg_embed_target_dir().join(format!("cluster-{}", std::process::id()));
    let runtime_dir = base.join("install");
    let data_dir = base.join("data");
    if needs_dirs {
        std::fs::create_dir_all(&runtime_dir).map_err(|err| err.to_string())?;
        std::fs::create_dir_all(&data_dir).map_err(|err| err.to_string())?;
    }

    // SAFETY: runs before the cluster spawns any threads; the library
    // serialises first use of the shared handle.
    unsafe {
        if needs_dirs {
            std::env::set_var("PG_RUNTIME_DIR", &runtime_dir);
            std::env::set_var("PG_DATA_DIR", &data_dir);
        }
        if std::env::var_os("PG_PASSWORD").is_none() {
            std::env::set_var("PG_PASSWORD", TEST_PASSWORD);
        }
    }
    Ok(())
}

/// Shared cluster handle, bootstrapped on first use.
pub fn shared_cluster() -> Result<&'static ClusterHandle, String> {
    prepare_environment()?;

    let mut attempt = 0;
    loop {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => return Ok(handle),
            Err(err) => {
                let message = format!("{err:?}");
                if attempt >= BOOTSTRAP_RETRIES || !is_transient_error(&message) {
                    return Err(message);
                }
                let delay = Duration::from_millis(RETRY_DELAY_MS * (1 << attempt));
                eprintln!("pg-embed: transient bootstrap error, retrying in {delay:?}: {message}");
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

use skillboard_processor::{database::memory::MemoryStore, model::RatingEngine};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test environment with RUST_LOG=WARN
pub fn init_test_env() {
    INIT.call_once(|| {
        std::env::set_var("RUST_LOG", "warn");
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// An engine over a fresh in-memory store with the default rating model.
pub fn memory_engine() -> RatingEngine<MemoryStore> {
    init_test_env();

    RatingEngine::with_default_model(MemoryStore::new())
}

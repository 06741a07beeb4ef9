pub mod config;
pub mod document;
pub mod error;
pub mod metrics;
pub mod model;
pub mod relationship;

pub use document::{Document, Include, Linkage, ResourceIdentifier, ResourceObject};
pub use error::{ContentGraphError, ErrorCode};
pub use model::{Entity, EntityAttributes, EntityKind};
pub use relationship::{
    EntityLookup, EntityResolver, ObjectError, RelationTarget, Relationship, RelationshipNode,
    Resolution,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_tracing() {
    init_tracing_with("info");
}

/// Install the fmt subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing_with(default_filter: &str) {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init();
}

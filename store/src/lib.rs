pub mod content_store;
pub mod transport;

pub use content_store::{ContentStore, SearchResults, StoreError, StoreState};
pub use transport::{InMemoryTransport, Transport, TransportError};

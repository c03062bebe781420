//! Scanout registry
//!
//! The registry maps scanout ids to running broadcasters so producers and
//! viewers can find each other by name.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ScanoutRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ scanouts: HashMap<String,    │
//!                 │   ScanoutEntry {             │
//!                 │     handle: BroadcasterHandle│
//!                 │     broadcaster, ingest      │
//!                 │   }                          │
//!                 │ >                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//!      register()           subscribe()            cleanup()
//!    IngestReader        SubscriberHandle     drop closed entries
//! ```
//!
//! Frames flow from the reader straight to the broadcaster task; the
//! registry lock is never held on the frame path.

pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{ScanoutEntry, ScanoutState};
pub use error::RegistryError;
pub use store::ScanoutRegistry;

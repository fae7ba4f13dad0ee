pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod item;
pub mod listing;
pub mod normalize;
pub mod observer;
pub mod poller;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod view;

pub use batch::{BatchFetcher, BatchReport, ItemOutcome, RetryPolicy};
pub use cache::{CacheEntry, ContentCache};
pub use config::{Endpoints, LiveConfig};
pub use error::{ConfigError, FailureKind, FetchError, PollError, StoreError};
pub use fetcher::{DetailFetch, FetchTarget, Fetcher};
pub use item::{FieldGroup, Item, ItemFields, RemoteItem, TitleIcon};
pub use listing::{fetch_remote_list, ListQuery};
pub use normalize::NormalizedContent;
pub use observer::{ChangeSet, LogNotifier, Notification, Notifier, NullObserver, ViewObserver};
pub use poller::{poll_once, spawn_poller, PollState, PollerHandle};
pub use reconcile::{ListReconciler, Reconciliation};
pub use session::{CycleReport, LiveSession};
pub use store::{JsonDirStore, KeyValueStore, MemoryStore, SharedStore};
pub use view::{LocalView, SharedView};

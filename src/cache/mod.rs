//! Murmur feed cache.
//!
//! Client-side state for paginated feeds:
//!
//! - **Entity store**: canonical tweet and profile copies keyed by id
//! - **Feed projection**: the ordered, deduplicated pages of one view
//! - **View registry**: directory of live views for mutation fan-out
//! - **Pending ledger**: mutations awaiting their authoritative response
//!
//! ## Configuration
//!
//! Sizes are controlled via the `[feed]` table of `murmur.toml`:
//!
//! ```toml
//! [feed]
//! page_size = 10
//! tweet_limit = 1000
//! profile_limit = 100
//! ```

mod config;
mod keys;
mod lock;
mod pending;
mod projection;
mod registry;
mod store;
mod view;

pub use config::CacheConfig;
pub use keys::{FeedIdentity, ViewHandle};
pub use pending::{PendingGuard, PendingMutation, PendingMutations};
pub use projection::FeedProjection;
pub use registry::ViewRegistry;
pub use store::EntityStore;
pub use view::{FeedSnapshot, FeedStatus, FeedSubscription, LiveView};

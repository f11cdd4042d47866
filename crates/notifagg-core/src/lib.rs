//! Core types for notification aggregation.
//!
//! Pure building blocks shared by the store, engine and service crates:
//! interaction events, time windows, bucket keys with an injective string
//! codec, the store key layout, and notification content composition.
//! Nothing in this crate performs I/O.

mod content;
mod error;
mod event;
mod key;
mod window;

pub use content::{compose_content, FALLBACK_NAME};
pub use error::KeyError;
pub use event::{EventType, InteractionEvent};
pub use key::{meta_fields, BucketKey, KeySpace};
pub use window::{Clock, ManualClock, SystemClock, WindowId};

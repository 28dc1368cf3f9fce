//! Live entity data for CityView.
//!
//! A [`Subscription`] polls the broker for one entity or a query of entities
//! and publishes every result as a [`FetchState`] snapshot on a
//! `tokio::sync::watch` channel. Each subscription is an explicit task handle:
//!
//! - [`Subscription::start`] issues the first fetch and arms the refresh timer
//! - [`Subscription::refetch_now`] fetches immediately, outside the timer
//! - [`Subscription::update`] swaps the request, refetching when its shape changed
//! - [`Subscription::dispose`] stops the timer and discards in-flight results
//!
//! Failed fetches land in the snapshot's error slot and leave the last good
//! data in place.

mod error;
mod request;
mod source;
mod state;
mod subscription;

pub use error::{LiveError, LiveResult};
pub use request::{FetchRequest, FetchTarget};
pub use source::{BrokerSource, EntitySource};
pub use state::{FetchData, FetchState};
pub use subscription::{OrderingPolicy, Subscription};

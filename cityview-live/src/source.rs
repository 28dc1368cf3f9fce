//! Where subscriptions get their data from.

use crate::{FetchData, FetchRequest, FetchTarget};
use async_trait::async_trait;
use cityview_ngsi::{NgsiClient, NgsiResult};

/// Performs one fetch for a subscription.
///
/// Implementations must be pure reads: a subscription may run several
/// fetches for the same request concurrently.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> NgsiResult<FetchData>;
}

/// Fetches from the broker named in each request, with a client built for
/// that request's scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokerSource;

#[async_trait]
impl EntitySource for BrokerSource {
    async fn fetch(&self, request: &FetchRequest) -> NgsiResult<FetchData> {
        let client = NgsiClient::new(request.client_config())?;
        match &request.target {
            FetchTarget::Entity(id) => client
                .get_entity(id, &request.get_options())
                .await
                .map(FetchData::One),
            FetchTarget::Ids(_) | FetchTarget::Type(_) => client
                .query_entities(&request.query_options())
                .await
                .map(FetchData::Many),
        }
    }
}

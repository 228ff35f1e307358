use async_trait::async_trait;

use crate::asset::{Asset, AssetCategory};
use crate::client::{ExternalClient, InternalClient, Surface};
use crate::decommission::AssetDeleter;
use crate::error::{DecomError, Result};
use crate::inventory::InventorySource;
use crate::session::SessionContext;

/// Both clients bound to one session, dispatching each category to the
/// surface that serves it.
pub struct Router<'a> {
    internal: &'a InternalClient,
    external: &'a ExternalClient,
    session: &'a mut SessionContext,
}

impl<'a> Router<'a> {
    pub fn new(
        internal: &'a InternalClient,
        external: &'a ExternalClient,
        session: &'a mut SessionContext,
    ) -> Self {
        Self {
            internal,
            external,
            session,
        }
    }
}

#[async_trait]
impl InventorySource for Router<'_> {
    async fn list(&mut self, category: AssetCategory) -> Result<Vec<Asset>> {
        match Surface::listing(category) {
            Surface::Internal => self.internal.list(self.session, category).await,
            Surface::External => self.external.list(self.session, category).await,
        }
    }
}

#[async_trait]
impl AssetDeleter for Router<'_> {
    async fn delete(&mut self, asset: &Asset) -> Result<()> {
        match Surface::deletion(asset.category) {
            Some(Surface::Internal) => self.internal.delete(self.session, asset).await,
            Some(Surface::External) => self.external.delete(self.session, asset).await,
            None => Err(DecomError::ClientRejected {
                category: asset.category,
                id: asset.id.clone(),
                detail: "no remote delete exists, remove manually".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use wiremock::matchers::any;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{Endpoints, RunConfig};
    use crate::session::context::test_support::session_with_key;

    fn clients(server: &MockServer) -> (InternalClient, ExternalClient) {
        let mut config = RunConfig::new("acme");
        config.endpoints = Endpoints::single_host(&server.uri());
        let config = Arc::new(config);
        (
            InternalClient::new(Arc::clone(&config)).unwrap(),
            ExternalClient::new(config).unwrap(),
        )
    }

    #[tokio::test]
    async fn expired_key_stops_every_surface_before_the_network() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let (internal, external) = clients(&server);
        let mut session = session_with_key(Utc::now() - Duration::minutes(5));
        let mut router = Router::new(&internal, &external, &mut session);

        for asset in [
            Asset::new(AssetCategory::Camera, "cam-1", "Dock"),
            Asset::new(AssetCategory::User, "u-2", "Ada"),
        ] {
            let err = router.delete(&asset).await.unwrap_err();
            assert!(matches!(err, DecomError::KeyExpired { .. }), "{err:?}");
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unassigned_device_has_no_remote_delete() {
        let server = MockServer::start().await;
        let (internal, external) = clients(&server);
        let mut session = session_with_key(Utc::now() + Duration::minutes(30));
        let mut router = Router::new(&internal, &external, &mut session);

        let device = Asset::new(AssetCategory::UnassignedDevice, "d-1", "Spare");
        let err = router.delete(&device).await.unwrap_err();
        assert!(matches!(err, DecomError::ClientRejected { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}

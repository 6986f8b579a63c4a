use spa_edge_core::invalidation::InvalidationRequest;

pub trait EdgeInvalidator {
    /// Submits the request and returns the provider's invalidation id.
    fn create_invalidation(&self, request: &InvalidationRequest) -> Result<String, String>;
}

use crate::constants::PARAM_LEASE_ID;
use crate::constants::PARAM_LEASE_TTL;
use crate::ClientApiError;
use crate::KeyspaceClient;
use crate::Method;
use crate::Response;
use crate::StoreRequest;

/// Store-assigned lease identifier. Valid leases are strictly positive.
pub type LeaseId = i64;

impl KeyspaceClient {
    /// Grants a lease that expires after `ttl_seconds`
    ///
    /// On success the response's node carries the new lease id
    /// ([`Node::lease`](crate::Node::lease)) and the granted TTL, and
    /// `index()` is the store revision at grant time. Keys written with a
    /// `*_with_lease` operation disappear when the lease expires.
    ///
    /// # Errors
    /// - [`ClientApiError::InvalidArgument`] if `ttl_seconds` is not positive
    pub async fn leasegrant(
        &self,
        ttl_seconds: i64,
    ) -> std::result::Result<Response, ClientApiError> {
        if ttl_seconds <= 0 {
            return Err(ClientApiError::invalid_argument(format!(
                "lease TTL must be positive, got {ttl_seconds}"
            )));
        }

        let request = {
            let inner = self.client_inner.load();
            StoreRequest::new(
                Method::Post,
                inner.config.lease_grant_path.clone(),
                inner.config.request_timeout(),
            )
            .param(PARAM_LEASE_TTL, ttl_seconds)
            // 0 lets the store choose the id
            .param(PARAM_LEASE_ID, 0)
        };
        self.execute("client::leasegrant", request).await
    }
}

pub(super) fn check_lease(lease: LeaseId) -> std::result::Result<LeaseId, ClientApiError> {
    if lease <= 0 {
        return Err(ClientApiError::invalid_argument(format!(
            "lease id must be positive, got {lease}"
        )));
    }
    Ok(lease)
}

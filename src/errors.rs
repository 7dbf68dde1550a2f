use std::collections::HashMap;

/// Errors raised by the basket controller and its collaborators.
///
/// Every operation on [`crate::BasketService`] either completes and persists
/// or fails with one of these kinds, leaving the in-memory and session state
/// unchanged. The user-facing variants carry enough structure (field maps,
/// attribute keys, codes) for the caller to render a message; the ambient
/// variants wrap infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum BasketError {
    #[error("product not available: {0}")]
    ProductUnavailable(String),

    #[error("quantity must be a positive number")]
    InvalidQuantity,

    #[error("no basket line at position {0}")]
    PositionNotFound(usize),

    #[error("basket line at position {0} cannot be changed manually")]
    ImmutableLine(usize),

    #[error("coupon code \"{0}\" is invalid or not available any more")]
    InvalidCoupon(String),

    #[error("coupon code \"{0}\" is already applied")]
    DuplicateCoupon(String),

    #[error("coupon for code \"{0}\" is not available any more")]
    CouponUnavailable(String),

    #[error("requirements for coupon code \"{0}\" are not met")]
    CouponNotEligible(String),

    #[error("invalid address properties, please check your input")]
    InvalidAddress { fields: HashMap<String, String> },

    #[error("service not available: {0}")]
    ServiceUnavailable(String),

    #[error("unknown service attributes \"{}\"", .keys.join("\", \""))]
    UnknownServiceAttribute { keys: Vec<String> },

    #[error("{0}")]
    InvalidServiceAttribute(String),

    #[error("attributes not available: \"{}\"", .0.join("\", \""))]
    AttributeUnavailable(Vec<String>),

    #[error("no provider registered for \"{0}\"")]
    UnknownProvider(String),

    #[error("session store error: {0}")]
    SessionStore(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("catalog backend error: {0}")]
    CatalogBackend(String),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl BasketError {
    /// Whether this error is safe to show to the customer as-is.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Self::SessionStore(_)
                | Self::Serialization(_)
                | Self::CatalogBackend(_)
                | Self::UnknownProvider(_)
                | Self::Other(_)
        )
    }

    /// Returns the message suitable for display. Infrastructure errors are
    /// collapsed to a generic message so implementation details don't leak.
    pub fn user_message(&self) -> String {
        if self.is_user_facing() {
            self.to_string()
        } else {
            "Internal error".to_string()
        }
    }
}

impl From<redis::RedisError> for BasketError {
    fn from(err: redis::RedisError) -> Self {
        BasketError::SessionStore(err.to_string())
    }
}

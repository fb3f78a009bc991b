use crate::types::push::{DeliveryOptions, Subscription};

/// A push service refused or never acknowledged a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("push delivery failed (status {status_code:?}): {body}")]
pub struct DeliveryError {
    /// HTTP status returned by the push service, absent for transport failures.
    pub status_code: Option<u16>,
    pub body: String,
}

impl DeliveryError {
    pub fn new(status_code: Option<u16>, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    /// 410 Gone and 404 Not Found mean the endpoint will never accept messages again.
    pub fn is_permanent(&self) -> bool {
        matches!(self.status_code, Some(404 | 410))
    }
}

pub trait PushSender: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<(), DeliveryError>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(
        &'a self,
        subscription: &'a Subscription,
        payload: &'a [u8],
        options: &'a DeliveryOptions,
    ) -> Self::Fut<'a>;
}

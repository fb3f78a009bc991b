use std::pin::Pin;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::ports;
use crate::ports::push::DeliveryError;
use crate::types::push::{DeliveryOptions, Subscription, Urgency, VapidConfig};

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ports::TimeProvider for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Clone)]
pub struct WebPushSender {
    vapid: VapidConfig,
    client: Arc<web_push::WebPushClient>,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig) -> Result<Self, web_push::WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            client: Arc::new(client),
        })
    }

    async fn deliver(
        &self,
        subscription: &Subscription,
        payload: &[u8],
        options: &DeliveryOptions,
    ) -> Result<(), web_push::WebPushError> {
        let subscription_info = web_push::SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.keys.p256dh.clone(),
            subscription.keys.auth.clone(),
        );
        let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)?;
        builder.set_payload(web_push::ContentEncoding::Aes128Gcm, payload);
        builder.set_ttl(u32::try_from(options.ttl.as_secs()).unwrap_or(u32::MAX));
        builder.set_urgency(web_push_urgency(options.urgency));
        let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
            &self.vapid.private_key,
            web_push::URL_SAFE_NO_PAD,
            &subscription_info,
        )?;
        signature_builder.add_claim("sub", self.vapid.subject.as_str());
        builder.set_vapid_signature(signature_builder.build()?);
        self.client.send(builder.build()?).await
    }
}

impl ports::PushSender for WebPushSender {
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(
        &'a self,
        subscription: &'a Subscription,
        payload: &'a [u8],
        options: &'a DeliveryOptions,
    ) -> Self::Fut<'a> {
        Box::pin(async move {
            self.deliver(subscription, payload, options)
                .await
                .map_err(delivery_error)
        })
    }
}

fn web_push_urgency(urgency: Urgency) -> web_push::Urgency {
    match urgency {
        Urgency::VeryLow => web_push::Urgency::VeryLow,
        Urgency::Low => web_push::Urgency::Low,
        Urgency::Normal => web_push::Urgency::Normal,
        Urgency::High => web_push::Urgency::High,
    }
}

/// Keeps the status code wherever the web-push error names one.
/// `ServerError` covers every 5xx without saying which, so it maps to `None`
/// like the transport failures.
fn delivery_error(err: web_push::WebPushError) -> DeliveryError {
    let status_code = match err {
        web_push::WebPushError::BadRequest(_) => Some(400),
        web_push::WebPushError::Unauthorized => Some(401),
        web_push::WebPushError::EndpointNotFound => Some(404),
        web_push::WebPushError::EndpointNotValid => Some(410),
        web_push::WebPushError::PayloadTooLarge => Some(413),
        _ => None,
    };
    DeliveryError::new(status_code, err.to_string())
}

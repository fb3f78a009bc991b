use base64::{URL_SAFE_NO_PAD, encode_config};
use jwt_simple::prelude::ES256KeyPair;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::types::push::VapidConfig;

const PUBLIC_KEY_PREVIEW_LEN: usize = 20;

#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub enum VapidConfigStatus {
    Missing,
    Incomplete,
    Ready(VapidConfig),
}

impl VapidConfigStatus {
    pub fn ready(&self) -> Option<&VapidConfig> {
        match self {
            VapidConfigStatus::Ready(vapid) => Some(vapid),
            VapidConfigStatus::Missing | VapidConfigStatus::Incomplete => None,
        }
    }
}

/// Blank values count as absent, so a half-filled `.env` reports `Incomplete`.
pub fn load_vapid_config(
    private_key: Option<&str>,
    public_key: Option<&str>,
    subject: Option<&str>,
) -> VapidConfigStatus {
    fn present(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|value| !value.is_empty())
    }
    let private_key = present(private_key);
    let public_key = present(public_key);
    let subject = present(subject);
    let has_any = private_key.is_some() || public_key.is_some() || subject.is_some();

    match (private_key, public_key, subject) {
        (Some(private_key), Some(public_key), Some(subject)) => {
            VapidConfigStatus::Ready(VapidConfig {
                private_key: private_key.to_string(),
                public_key: public_key.to_string(),
                subject: normalize_subject(subject),
            })
        }
        _ if has_any => VapidConfigStatus::Incomplete,
        _ => VapidConfigStatus::Missing,
    }
}

// A bare address is accepted and turned into a mailto URI.
fn normalize_subject(subject: &str) -> String {
    if subject.starts_with("mailto:") || subject.starts_with("https://") {
        subject.to_string()
    } else {
        format!("mailto:{subject}")
    }
}

pub fn public_key_preview(public_key: &str) -> String {
    let prefix: String = public_key.chars().take(PUBLIC_KEY_PREVIEW_LEN).collect();
    format!("{prefix}...")
}

pub fn generate_vapid_credentials() -> Result<VapidCredentials, web_push::WebPushError> {
    let mut rng = OsRng;
    generate_vapid_credentials_with_rng(&mut rng)
}

pub(crate) fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<VapidCredentials, web_push::WebPushError> {
    let key_pair = generate_es256_keypair_with_rng(rng);
    let private_key = encode_config(key_pair.to_bytes(), URL_SAFE_NO_PAD);
    let public_key =
        web_push::VapidSignatureBuilder::from_base64_no_sub(&private_key, URL_SAFE_NO_PAD)?
            .get_public_key();
    let public_key = encode_config(public_key, URL_SAFE_NO_PAD);

    Ok(VapidCredentials {
        private_key,
        public_key,
    })
}

fn generate_es256_keypair_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> ES256KeyPair {
    let mut key_bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut key_bytes);
        if let Ok(key_pair) = ES256KeyPair::from_bytes(&key_bytes) {
            return key_pair;
        }
    }
}

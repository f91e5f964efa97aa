use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Stateless form tokens bound to a user and an intent such as `like{id}`.
#[derive(Clone)]
pub struct CsrfTokens {
    keyed: HmacSha256,
}

impl CsrfTokens {
    pub fn new(key: [u8; 32]) -> Result<Self> {
        let keyed = HmacSha256::new_from_slice(&key)
            .map_err(|err| anyhow!("invalid CSRF key: {}", err))?;
        Ok(Self { keyed })
    }

    pub fn issue(&self, user_id: Uuid, intent: &str) -> String {
        hex::encode(self.mac(user_id, intent).finalize().into_bytes())
    }

    pub fn verify(&self, user_id: Uuid, intent: &str, token: &str) -> bool {
        let provided = match hex::decode(token.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        self.mac(user_id, intent).verify_slice(&provided).is_ok()
    }

    fn mac(&self, user_id: Uuid, intent: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(user_id.as_bytes());
        mac.update(b":");
        mac.update(intent.as_bytes());
        mac
    }
}

pub fn intent(action: &str, id: Uuid) -> String {
    format!("{}{}", action, id)
}

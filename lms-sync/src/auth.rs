//! Valence ID-key request signing.
//!
//! Every outbound URL carries the app and user ids, one HMAC-SHA256 signature
//! per key, and the timestamp the signatures cover. Only the method, the path
//! and the timestamp are signed; the query string never is.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::percent_decode_str;
use sha2::Sha256;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// The app and user id/key pairs issued by the LMS.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub app_key: String,
    pub user_id: String,
    pub user_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_key", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("user_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ValenceSigner {
    credentials: Credentials,
    clock_skew_seconds: i64,
}

impl ValenceSigner {
    pub fn new(credentials: Credentials, clock_skew_seconds: i64) -> Self {
        Self {
            credentials,
            clock_skew_seconds,
        }
    }

    /// Sign `url` for `method` at the current time plus the configured skew.
    pub fn sign_url(&self, url: &Url, method: &str) -> Url {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.sign_url_at(url, method, now + self.clock_skew_seconds)
    }

    pub fn sign_url_at(&self, url: &Url, method: &str, timestamp: i64) -> Url {
        let path = percent_decode_str(url.path()).decode_utf8_lossy();
        let data = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            path.to_lowercase(),
            timestamp
        );
        let app_signature = sign(&data, &self.credentials.app_key);
        let user_signature = sign(&data, &self.credentials.user_key);

        let mut signed = url.clone();
        signed
            .query_pairs_mut()
            .append_pair("x_a", &self.credentials.app_id)
            .append_pair("x_b", &self.credentials.user_id)
            .append_pair("x_c", &app_signature)
            .append_pair("x_d", &user_signature)
            .append_pair("x_t", &timestamp.to_string());
        signed
    }
}

/// Base64url (unpadded) HMAC-SHA256 of `data` under `key`.
pub fn sign(data: &str, key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

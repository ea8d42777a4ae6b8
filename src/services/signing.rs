use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A value whose fields are covered by an HMAC signature.
///
/// `signing_payload` must concatenate the fields in a fixed order. Changing
/// that order invalidates every signature already handed out to browsers.
/// Free-form string fields go through [`encode_field`] so separators inside a
/// value cannot move a field boundary.
pub trait Signable {
    /// Domain-separation tag, the variant's type name.
    const TAG: &'static str;

    fn signing_payload(&self) -> String;

    fn signature(&self) -> &str;
}

/// Length-prefix a free-form value: `"title"` becomes `"5:title"`.
pub fn encode_field(value: &str) -> String {
    format!("{}:{}", value.len(), value)
}

/// HMAC-SHA256 signer holding the process secret.
pub struct DemandSigner {
    secret: Vec<u8>,
}

impl DemandSigner {
    pub fn new(secret: &str) -> Result<Self, SigningError> {
        if secret.is_empty() {
            return Err(SigningError::EmptySecret);
        }

        Ok(Self {
            secret: secret.as_bytes().to_vec(),
        })
    }

    /// Sign `payload` under `tag`, returning a lowercase hex digest.
    pub fn sign(&self, tag: &str, payload: &str) -> String {
        hex::encode(self.mac(tag, payload).finalize().into_bytes())
    }

    /// Constant-time check of a hex signature.
    pub fn verify(&self, tag: &str, payload: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        self.mac(tag, payload).verify_slice(&expected).is_ok()
    }

    pub fn sign_value<T: Signable>(&self, value: &T) -> String {
        self.sign(T::TAG, &value.signing_payload())
    }

    pub fn verify_value<T: Signable>(&self, value: &T) -> bool {
        self.verify(T::TAG, &value.signing_payload(), value.signature())
    }

    fn mac(&self, tag: &str, payload: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(tag.as_bytes());
        mac.update(&[0]);
        mac.update(payload.as_bytes());
        mac
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Demand secret must not be empty")]
    EmptySecret,
}

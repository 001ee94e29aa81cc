use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::Sha1;

use crate::{
    Command,
    error::{ModelError, ModelResult},
};

type HmacSha1 = Hmac<Sha1>;

/// Command envelope authenticated with a shared secret.
///
/// `sign = base64(HMAC-SHA1(json([cmd, data]), secret))`, where `json` is the
/// compact serde_json rendering (object keys sorted).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub cmd: Command,
    pub data: Value,
    pub sign: String,
}

impl SignedMessage {
    /// Build and sign a new envelope.
    pub fn sign(cmd: Command, data: Value, secret: &[u8]) -> ModelResult<Self> {
        let sign = STANDARD.encode(digest(cmd, &data, secret)?);
        Ok(Self { cmd, data, sign })
    }

    /// Check the signature against `secret`.
    ///
    /// Returns [`ModelError::Signature`] on mismatch and
    /// [`ModelError::MalformedSignature`] when `sign` is not valid base64.
    pub fn verify(&self, secret: &[u8]) -> ModelResult<()> {
        let expected = STANDARD
            .decode(self.sign.as_bytes())
            .map_err(|e| ModelError::MalformedSignature(e.to_string()))?;

        let mut mac = new_mac(secret)?;
        mac.update(&canonical(self.cmd, &self.data)?);
        mac.verify_slice(&expected)
            .map_err(|_| ModelError::Signature {
                cmd: self.cmd.code(),
            })
    }

    pub fn is_valid(&self, secret: &[u8]) -> bool {
        self.verify(secret).is_ok()
    }

    pub fn encode(&self) -> ModelResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ModelError::Encode(e.to_string()))
    }

    /// Decode without verifying; callers must [`verify`](Self::verify) before use.
    pub fn decode(data: &[u8]) -> ModelResult<Self> {
        serde_json::from_slice(data).map_err(|e| ModelError::Decode(e.to_string()))
    }

    /// Decode and verify in one step.
    pub fn decode_verified(data: &[u8], secret: &[u8]) -> ModelResult<Self> {
        let msg = Self::decode(data)?;
        msg.verify(secret)?;
        Ok(msg)
    }
}

fn canonical(cmd: Command, data: &Value) -> ModelResult<Vec<u8>> {
    serde_json::to_vec(&(cmd.code(), data)).map_err(|e| ModelError::Encode(e.to_string()))
}

fn new_mac(secret: &[u8]) -> ModelResult<HmacSha1> {
    HmacSha1::new_from_slice(secret).map_err(|e| ModelError::Invalid(e.to_string()))
}

fn digest(cmd: Command, data: &Value, secret: &[u8]) -> ModelResult<Vec<u8>> {
    let mut mac = new_mac(secret)?;
    mac.update(&canonical(cmd, data)?);
    Ok(mac.finalize().into_bytes().to_vec())
}

//! VAPID keypair generator.
//!
//! Prints a fresh ECDSA P-256 keypair as base64url JSON, ready for the
//! `VAPID_PUBLIC_KEY` / `VAPID_PRIVATE_KEY` environment variables. The
//! public key is the uncompressed SEC1 point; the private key is the raw
//! 32-byte scalar.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::SecretKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;

fn generate() -> Result<String, serde_json::Error> {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key().to_encoded_point(false);

    serde_json::to_string_pretty(&serde_json::json!({
        "publicKey": URL_SAFE_NO_PAD.encode(public.as_bytes()),
        "privateKey": URL_SAFE_NO_PAD.encode(secret.to_bytes()),
    }))
}

fn main() {
    match generate() {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("vapidgen: failed to generate keypair: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_decode() {
        let json: serde_json::Value = serde_json::from_str(&generate().unwrap()).unwrap();

        let public = URL_SAFE_NO_PAD
            .decode(json["publicKey"].as_str().unwrap())
            .unwrap();
        let private = URL_SAFE_NO_PAD
            .decode(json["privateKey"].as_str().unwrap())
            .unwrap();

        // Uncompressed SEC1 point: 0x04 || X || Y.
        assert_eq!(public.len(), 65);
        assert_eq!(public[0], 0x04);
        assert_eq!(private.len(), 32);
    }

    #[test]
    fn test_keys_are_unique() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_ne!(a, b);
    }
}

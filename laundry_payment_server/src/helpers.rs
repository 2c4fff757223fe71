use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the base64-encoded HMAC-SHA256 signature of a request body. The gateway signs the
/// verbatim body bytes with the webhook secret; the result must match the `X-Gateway-Signature`
/// header before any part of the payload is trusted.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_vector() {
        // Independently computed with openssl:
        // echo -n '{"id":"inv_1"}' | openssl dgst -sha256 -hmac 'topsecret' -binary | base64
        let sig = calculate_hmac("topsecret", br#"{"id":"inv_1"}"#);
        assert_eq!(sig, "I/jLm4E+b7FL2DUS9TL1z2OXtxfHa524WWn018zH1Tg=");
    }

    #[test]
    fn signature_depends_on_body_and_key() {
        let sig = calculate_hmac("topsecret", b"payload");
        assert_ne!(sig, calculate_hmac("topsecret", b"payload2"));
        assert_ne!(sig, calculate_hmac("othersecret", b"payload"));
    }
}

// Binance-style request signing (HMAC-SHA256 over the canonical query string)
use std::collections::BTreeMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

/// Canonical query string for signing.
///
/// Empty and `"0"` values are dropped, keys are sorted, values are
/// URL-encoded and pairs are joined with `&`.
pub fn canonical_query<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted: BTreeMap<&str, &str> = params
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .filter(|(_, v)| !v.is_empty() && *v != "0")
        .collect();

    sorted
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex-encoded HMAC-SHA256 of `payload` keyed by `secret`.
pub fn sign(payload: &str, secret: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::validation(format!("invalid signing key: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Canonical query with `signature` appended.
pub fn signed_query<K, V>(params: &[(K, V)], secret: &str) -> Result<String, ExchangeError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let query = canonical_query(params);
    let signature = sign(&query, secret)?;
    Ok(format!("{}&signature={}", query, signature))
}

/// Wall-clock milliseconds, taken fresh for every attempt
pub fn timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_matches_published_example() {
        // Example from the Binance API documentation
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        assert_eq!(
            sign(query, secret).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_canonical_query_sorts_and_drops_empty() {
        let params = vec![
            ("timestamp", "1700000000000".to_string()),
            ("symbol", "ABCUSDT".to_string()),
            ("price", String::new()),
            ("orderId", "0".to_string()),
            ("side", "SELL".to_string()),
        ];

        assert_eq!(
            canonical_query(&params),
            "side=SELL&symbol=ABCUSDT&timestamp=1700000000000"
        );
    }

    #[test]
    fn test_canonical_query_url_encodes_values() {
        let params = [("newClientOrderId", "a b/c")];
        assert_eq!(canonical_query(&params), "newClientOrderId=a%20b%2Fc");
    }

    #[test]
    fn test_signed_query_appends_hex_signature() {
        let params = [("symbol", "ABCUSDT"), ("timestamp", "1")];
        let signed = signed_query(&params, "secret").unwrap();

        let (query, signature) = signed.split_once("&signature=").unwrap();
        assert_eq!(query, "symbol=ABCUSDT&timestamp=1");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(signature, sign(query, "secret").unwrap());
    }
}

//! # WBI Request Signing
//!
//! Bilibili's web APIs reject requests without a valid `w_rid` signature. The
//! signature is an MD5 over the sorted, URL-encoded query plus a 32-character
//! *mixin key* derived from two rotating tokens published by the nav endpoint.
//!
//! ## Algorithm:
//! 1. `mixin_key = [raw[i] for i in MIXIN_KEY_ENC_TAB if i < len(raw)][..32]`
//!    where `raw = img_key + sub_key`.
//! 2. Add `wts` (unix seconds) to the parameters.
//! 3. Sort keys byte-wise and encode `k=v&...` with query-escaping: ASCII
//!    letters, digits and `-_.~` stay literal, space becomes `+`, every other
//!    byte becomes uppercase `%XX`.
//! 4. `w_rid = hex(md5(query + mixin_key))`.
//! 5. Add `w_rid` and encode again, sorted.
//!
//! The encoding in step 3 is a wire contract; the unit tests pin it to known
//! vectors.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use url::form_urlencoded;

use crate::error::{Result, ViewerError};

/// Fixed permutation published by the upstream protocol. Do not reorder.
pub const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29, 28, 14, 39,
    12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25, 54, 21, 56, 59, 6, 63,
    57, 62, 11, 36, 20, 34, 44, 52,
];

/// Length of a mixin key in bytes.
pub const MIXIN_KEY_LEN: usize = 32;

/// Request parameters, kept sorted by key.
pub type WbiParams = BTreeMap<String, String>;

/// Extracts the token from a nav URL such as
/// `https://i0.hdslb.com/bfs/wbi/7cd0...077c.png`: the file name without `.png`.
pub fn key_from_url(url: &str) -> Option<&str> {
    let base = url.trim_end_matches('/').rsplit('/').next()?;
    let key = base.strip_suffix(".png").unwrap_or(base);
    (!key.is_empty()).then_some(key)
}

/// Derives the mixin key from the two nav tokens.
///
/// # Errors
/// [`ViewerError::Signing`] when the tokens are too short to yield 32 bytes.
pub fn mixin_key(img_key: &str, sub_key: &str) -> Result<String> {
    let raw = format!("{img_key}{sub_key}");
    let bytes = raw.as_bytes();
    let mixed: Vec<u8> = MIXIN_KEY_ENC_TAB
        .iter()
        .filter(|&&i| i < bytes.len())
        .map(|&i| bytes[i])
        .take(MIXIN_KEY_LEN)
        .collect();

    if mixed.len() < MIXIN_KEY_LEN {
        return Err(ViewerError::Signing(format!(
            "wbi tokens too short: got {} usable bytes",
            mixed.len()
        )));
    }
    String::from_utf8(mixed).map_err(|e| ViewerError::Signing(format!("wbi tokens are not ASCII: {e}")))
}

/// Query-escapes one component: alphanumerics and `-_.~` literal, space as `+`.
pub fn query_escape(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// Encodes `params` as `k=v&...` in key order.
pub fn encode_query(params: &WbiParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", query_escape(k), query_escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Computes `w_rid` for an already encoded query.
pub fn w_rid(encoded_query: &str, mixin_key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(encoded_query.as_bytes());
    hasher.update(mixin_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Signs `params` with an explicit timestamp. Any `wts`/`w_rid` already present
/// is replaced.
pub fn sign_at(params: &WbiParams, mixin_key: &str, wts: i64) -> String {
    let mut params = params.clone();
    params.remove("w_rid");
    params.insert("wts".to_string(), wts.to_string());

    let signature = w_rid(&encode_query(&params), mixin_key);
    params.insert("w_rid".to_string(), signature);
    encode_query(&params)
}

/// Signs `params` with the current time.
pub fn sign(params: &WbiParams, mixin_key: &str) -> String {
    let wts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    sign_at(params, mixin_key, wts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMG_KEY: &str = "7cd084941338484aae1ad9425b84077c";
    const SUB_KEY: &str = "4932caff0ff746eab6f01bf08b70ac45";
    const MIXIN: &str = "ea1db124af3c7062474693fa704f4ff8";

    fn params(pairs: &[(&str, &str)]) -> WbiParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn mixin_key_matches_reference_vector() {
        assert_eq!(mixin_key(IMG_KEY, SUB_KEY).unwrap(), MIXIN);
    }

    #[test]
    fn mixin_key_rejects_short_tokens() {
        assert!(matches!(mixin_key("abc", "def"), Err(ViewerError::Signing(_))));
    }

    #[test]
    fn key_from_nav_urls() {
        assert_eq!(
            key_from_url("https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png"),
            Some(IMG_KEY)
        );
        assert_eq!(key_from_url("https://i0.hdslb.com/bfs/wbi/abc"), Some("abc"));
        assert_eq!(key_from_url(""), None);
    }

    #[test]
    fn sign_matches_reference_vector() {
        let signed = sign_at(&params(&[("foo", "114"), ("bar", "514"), ("zab", "1919810")]), MIXIN, 1702204169);
        assert_eq!(
            signed,
            "bar=514&foo=114&w_rid=8f6f2b5b3d485fe1886cec6a0be8c5d4&wts=1702204169&zab=1919810"
        );
    }

    #[test]
    fn encoding_uses_plus_for_space_and_keeps_tilde() {
        let p = params(&[
            ("host_mid", "12345"),
            ("platform", "web"),
            ("dm_img_list", "[]"),
            ("web_location", "0.0"),
            ("q", "a b*~"),
            ("wts", "1700000000"),
        ]);
        let query = encode_query(&p);
        assert_eq!(
            query,
            "dm_img_list=%5B%5D&host_mid=12345&platform=web&q=a+b%2A~&web_location=0.0&wts=1700000000"
        );
        assert_eq!(w_rid(&query, MIXIN), "657580144888c6522250e407ae31392e");
    }

    #[test]
    fn signature_is_deterministic_for_fixed_timestamp() {
        let p = params(&[("host_mid", "1"), ("platform", "web")]);
        assert_eq!(sign_at(&p, MIXIN, 42), sign_at(&p, MIXIN, 42));
        assert_ne!(sign_at(&p, MIXIN, 42), sign_at(&p, MIXIN, 43));
    }

    #[test]
    fn existing_signature_fields_are_replaced() {
        let p = params(&[("foo", "114"), ("bar", "514"), ("zab", "1919810"), ("w_rid", "stale"), ("wts", "1")]);
        assert_eq!(
            sign_at(&p, MIXIN, 1702204169),
            "bar=514&foo=114&w_rid=8f6f2b5b3d485fe1886cec6a0be8c5d4&wts=1702204169&zab=1919810"
        );
    }

    #[test]
    fn sign_injects_current_timestamp() {
        let signed = sign(&params(&[("a", "1")]), MIXIN);
        let wts = signed
            .split('&')
            .find_map(|kv| kv.strip_prefix("wts="))
            .unwrap()
            .parse::<i64>()
            .unwrap();
        assert!(wts > 1_700_000_000);
        assert!(signed.contains("w_rid="));
    }
}

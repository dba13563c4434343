//! Canonical request signing shared by every gateway exchange.
//!
//! The wire contract: sort parameter keys (ordinal byte order), concatenate
//! the endpoint script name and each value with `;` separators, append the
//! raw secret key, and take the lowercase hex MD5 of the whole string. Both
//! outbound requests and inbound callback verification must reproduce this
//! construction bit-for-bit.

use md5::{Digest, Md5};
use rand::Rng;
use url::Url;

/// Compute the signature for a parameter set against an endpoint script name.
///
/// The key sort is explicit and byte-ordered; insertion order of `params`
/// never affects the result.
pub fn sign(script_name: &str, params: &[(String, String)], secret_key: &str) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut canonical = String::with_capacity(64);
    canonical.push_str(script_name);
    canonical.push(';');
    for (_, value) in sorted {
        canonical.push_str(value);
        canonical.push(';');
    }
    canonical.push_str(secret_key);

    hex::encode(Md5::digest(canonical.as_bytes()))
}

/// Verify a supplied signature over `params` (which must already exclude the
/// signature field itself). Any mismatch is a hard failure for the caller.
pub fn verify(
    script_name: &str,
    params: &[(String, String)],
    secret_key: &str,
    supplied: &str,
) -> bool {
    constant_time_eq(&sign(script_name, params, secret_key), supplied)
}

/// The signature namespace is the endpoint's final path segment with any
/// query string stripped, never the full URL. Accepts absolute URLs and
/// bare request paths.
pub fn script_name(endpoint: &str) -> String {
    if let Ok(url) = Url::parse(endpoint) {
        if let Some(segments) = url.path_segments() {
            if let Some(last) = segments.filter(|s| !s.is_empty()).last() {
                return last.to_string();
            }
        }
    }
    endpoint
        .rsplit('/')
        .next()
        .unwrap_or(endpoint)
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Random numeric nonce included in every signed request so signatures are
/// never reused across requests.
pub fn random_digit_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

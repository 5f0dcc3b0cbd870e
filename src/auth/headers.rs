//! Header extraction helpers.
//!
//! Webhooks arrive from multiple unrelated upstreams (payments, pinning
//! service, marketplace) that do not share a header convention, so the
//! accepted names for signature and timestamp headers are declarative
//! per-source lists consumed by one generic extraction function.

use std::collections::HashMap;

use super::bearer::AuthContext;

/// Fallback identifier when nothing about the caller is known.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Return the first present header from an ordered candidate list.
///
/// Header names are matched case-insensitively; the map is expected to hold
/// lowercase keys (see [`crate::gate::RequestMeta`]).
pub fn first_header<'m>(headers: &'m HashMap<String, String>, names: &[String]) -> Option<&'m str> {
    names
        .iter()
        .find_map(|name| headers.get(&name.to_ascii_lowercase()))
        .map(String::as_str)
}

/// Derive the rate-limit identifier for a request.
///
/// An authenticated principal is preferred over network-level identity:
/// the bearer address wins, then the proxy chain headers in order
/// `x-forwarded-for` (first hop), `x-real-ip`, `cf-connecting-ip`, and
/// finally the literal `"unknown"`. This order is part of the product's
/// abuse policy and must not change.
pub fn client_identifier(headers: &HashMap<String, String>, auth: &AuthContext) -> String {
    if let Some(address) = auth.address.as_deref() {
        return address.to_ascii_lowercase();
    }

    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    for name in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(value) = headers.get(name) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    UNKNOWN_IDENTIFIER.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_first_header_order() {
        let map = headers(&[("x-signature", "second"), ("x-webhook-signature", "first")]);
        let names = vec!["x-webhook-signature".to_string(), "x-signature".to_string()];
        assert_eq!(first_header(&map, &names), Some("first"));

        let names = vec!["x-missing".to_string(), "x-signature".to_string()];
        assert_eq!(first_header(&map, &names), Some("second"));

        assert_eq!(first_header(&map, &["nope".to_string()]), None);
    }

    #[test]
    fn test_identifier_prefers_authenticated_address() {
        let map = headers(&[("x-forwarded-for", "10.0.0.1")]);
        let auth = AuthContext {
            address: Some("0xABCDEF0000000000000000000000000000000001".to_string()),
            is_authenticated: true,
            is_admin: false,
        };
        assert_eq!(
            client_identifier(&map, &auth),
            "0xabcdef0000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_identifier_fallback_chain() {
        let anon = AuthContext::anonymous();

        let map = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_identifier(&map, &anon), "203.0.113.7");

        let map = headers(&[("x-real-ip", "198.51.100.2"), ("cf-connecting-ip", "192.0.2.9")]);
        assert_eq!(client_identifier(&map, &anon), "198.51.100.2");

        let map = headers(&[("cf-connecting-ip", "192.0.2.9")]);
        assert_eq!(client_identifier(&map, &anon), "192.0.2.9");

        assert_eq!(client_identifier(&headers(&[]), &anon), UNKNOWN_IDENTIFIER);
    }
}

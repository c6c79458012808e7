//! Advertiser domain canonicalization shared by blocking and trackers.

use error_stack::{Report, ResultExt};
use url::Url;

use crate::error::ExchangeError;

const HTTP_PREFIX: &str = "http://";
const WWW_PREFIX: &str = "www.";

/// Canonicalize an advertiser or blocklist domain.
///
/// Trims and lowercases the input, rejects bare public suffixes, parses what
/// remains as a URL (prepending `http://` when no scheme is present) and
/// returns the host with one leading `www.` removed. An empty input yields an
/// empty string.
///
/// # Errors
///
/// - [`ExchangeError::PublicSuffixDomain`] when the input is a known public
///   suffix such as `com` or `co.in`
/// - [`ExchangeError::InvalidDomain`] when the value cannot be parsed
pub fn normalize_domain(raw: &str) -> Result<String, Report<ExchangeError>> {
    let domain = raw.trim().to_lowercase();
    if domain.is_empty() {
        return Ok(domain);
    }

    if is_public_suffix(&domain) {
        return Err(Report::new(ExchangeError::PublicSuffixDomain { domain }));
    }

    let candidate = if has_http_scheme(&domain) {
        domain
    } else {
        format!("{HTTP_PREFIX}{domain}")
    };

    let host = parse_host(&candidate)?;
    Ok(host
        .strip_prefix(WWW_PREFIX)
        .map(str::to_string)
        .unwrap_or(host))
}

/// Host (and port, when present) of an advertiser URL, tolerating a missing
/// scheme.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidDomain`] if the value cannot be parsed.
pub fn extract_domain(raw: &str) -> Result<String, Report<ExchangeError>> {
    if has_http_scheme(raw) {
        parse_host(raw)
    } else {
        parse_host(&format!("{HTTP_PREFIX}{raw}"))
    }
}

/// Only a full `http://` or `https://` prefix counts, so hosts such as
/// `httpbin.org` still get a scheme prepended.
fn has_http_scheme(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn is_public_suffix(domain: &str) -> bool {
    psl::suffix(domain.as_bytes())
        .is_some_and(|suffix| suffix.is_known() && suffix.as_bytes() == domain.as_bytes())
}

fn parse_host(value: &str) -> Result<String, Report<ExchangeError>> {
    let url = Url::parse(value).change_context(ExchangeError::InvalidDomain {
        message: format!("failed to parse '{value}'"),
    })?;

    let host = url.host_str().unwrap_or_default();
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain_basic_forms() {
        let cases = [
            ("a.com", "a.com"),
            ("  A.COM  ", "a.com"),
            ("http://a.com", "a.com"),
            ("https://www.a.com/path?q=1", "a.com"),
            ("www.a.com", "a.com"),
            ("www.www.a.com", "www.a.com"),
            ("sub.a.com", "sub.a.com"),
            ("", ""),
            ("   ", ""),
        ];

        for (input, expected) in cases {
            let normalized = normalize_domain(input).expect("should normalize");
            assert_eq!(normalized, expected, "normalizing '{input}'");
        }
    }

    #[test]
    fn test_normalize_domain_rejects_public_suffix() {
        for suffix in ["co.in", "com", "CO.UK"] {
            let err = normalize_domain(suffix).expect_err("public suffix must be rejected");
            assert!(
                matches!(
                    err.current_context(),
                    ExchangeError::PublicSuffixDomain { .. }
                ),
                "unexpected error for '{suffix}': {err:?}"
            );
        }
    }

    #[test]
    fn test_normalize_domain_leading_dot_is_not_a_suffix() {
        assert_eq!(
            normalize_domain(".co.in").expect("leading dot should pass"),
            ".co.in"
        );
    }

    #[test]
    fn test_normalize_domain_invalid_host() {
        let err = normalize_domain("a b.com").expect_err("space in host must fail");
        assert!(matches!(
            err.current_context(),
            ExchangeError::InvalidDomain { .. }
        ));
    }

    #[test]
    fn test_normalize_domain_is_idempotent() {
        for input in [
            "http://www.Example.com/x",
            "b.a.com",
            "https://shop.example.co.uk",
            "www.blocked.com",
        ] {
            let once = normalize_domain(input).expect("first pass");
            let twice = normalize_domain(&once).expect("second pass");
            assert_eq!(once, twice, "normalize should be idempotent for '{input}'");
        }
    }

    #[test]
    fn test_hosts_starting_with_http_get_a_scheme() {
        assert_eq!(
            normalize_domain("httpbin.org").expect("should normalize"),
            "httpbin.org"
        );
        assert_eq!(
            normalize_domain("HTTPS-Proxy.net").expect("should normalize"),
            "https-proxy.net"
        );
        assert_eq!(
            extract_domain("httpbin.org/anything").expect("should extract"),
            "httpbin.org"
        );
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("advertiser.com").expect("bare host"),
            "advertiser.com"
        );
        assert_eq!(
            extract_domain("https://www.advertiser.com/landing").expect("full url"),
            "www.advertiser.com"
        );
        assert_eq!(
            extract_domain("advertiser.com:8443").expect("host with port"),
            "advertiser.com:8443"
        );
    }
}

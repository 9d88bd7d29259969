//! Network address, hostname and URL fields.

use std::net::{Ipv4Addr, ToSocketAddrs};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use url::Url;

use super::{Field, FieldOptions, value_type};
use crate::error::FieldError;

static HOSTNAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9.\-]+$").ok());
static NETBIOS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[\w!@#$%^()\-'{}.~]{1,15}$").ok());

fn expect_str(value: Value) -> Result<String, FieldError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(FieldError::invalid(format!(
            "value must be a string, not a {}",
            value_type(&other)
        ))),
    }
}

// ============================================================================
// IPv4 Address
// ============================================================================

/// A dotted-quad IPv4 address.
#[derive(Debug, Clone, Default)]
pub struct IPv4AddressField {
    options: FieldOptions,
}

impl IPv4AddressField {
    /// Creates an IPv4 address field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Field for IPv4AddressField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "ipv4"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        let raw = expect_str(value)?;
        let addr: Ipv4Addr = raw
            .trim()
            .parse()
            .map_err(|_| FieldError::invalid("value is not a valid IPv4 address"))?;
        Ok(Value::String(addr.to_string()))
    }
}

// ============================================================================
// IPv4 Network
// ============================================================================

/// An IPv4 network in CIDR notation (`A.B.C.D/N`). Host bits must be zero.
#[derive(Debug, Clone, Default)]
pub struct IPv4NetworkField {
    options: FieldOptions,
    min_prefix_len: Option<u8>,
    max_prefix_len: Option<u8>,
}

impl IPv4NetworkField {
    /// Creates an IPv4 network field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest accepted prefix length (largest network).
    #[must_use]
    pub const fn min_prefix_len(mut self, len: u8) -> Self {
        self.min_prefix_len = Some(len);
        self
    }

    /// Largest accepted prefix length (smallest network).
    #[must_use]
    pub const fn max_prefix_len(mut self, len: u8) -> Self {
        self.max_prefix_len = Some(len);
        self
    }

    fn parse(raw: &str) -> Option<(Ipv4Addr, u8)> {
        let (addr, prefix) = match raw.split_once('/') {
            Some((addr, prefix)) => (addr, prefix.parse::<u8>().ok()?),
            None => (raw, 32),
        };
        let addr: Ipv4Addr = addr.parse().ok()?;
        if prefix > 32 {
            return None;
        }
        let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
        (u32::from(addr) & !mask == 0).then_some((addr, prefix))
    }
}

impl Field for IPv4NetworkField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "cidr"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        let raw = expect_str(value)?;
        let (addr, prefix) = Self::parse(raw.trim())
            .ok_or_else(|| FieldError::invalid("value is not a valid IPv4 Network (CIDR)"))?;

        if let Some(min) = self.min_prefix_len
            && prefix < min
        {
            return Err(FieldError::invalid(format!(
                "value must be at least a /{min} subnet"
            )));
        }
        if let Some(max) = self.max_prefix_len
            && prefix > max
        {
            return Err(FieldError::invalid(format!(
                "value must be smaller than a /{max} subnet"
            )));
        }
        Ok(Value::String(format!("{addr}/{prefix}")))
    }
}

// ============================================================================
// Hostname
// ============================================================================

/// A DNS or NetBIOS hostname, optionally also accepting an IPv4 address.
#[derive(Debug, Clone)]
pub struct HostnameField {
    options: FieldOptions,
    allow_ipv4: bool,
    resolve: bool,
}

impl Default for HostnameField {
    fn default() -> Self {
        Self {
            options: FieldOptions::default(),
            allow_ipv4: true,
            resolve: false,
        }
    }
}

impl HostnameField {
    /// Creates a hostname field that also accepts IPv4 addresses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether IPv4 address literals are accepted (default `true`).
    #[must_use]
    pub const fn allow_ipv4(mut self, allow: bool) -> Self {
        self.allow_ipv4 = allow;
        self
    }

    /// Resolves the hostname and stores its first IPv4 address.
    #[must_use]
    pub const fn resolve(mut self, resolve: bool) -> Self {
        self.resolve = resolve;
        self
    }
}

impl Field for HostnameField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "host"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        let raw = expect_str(value)?;
        let raw = raw.trim();

        if let Ok(addr) = raw.parse::<Ipv4Addr>() {
            if self.allow_ipv4 {
                return Ok(Value::String(addr.to_string()));
            }
            return Err(FieldError::invalid("value is not a valid DNS hostname"));
        }

        if self.resolve {
            let resolved = (raw, 0)
                .to_socket_addrs()
                .ok()
                .and_then(|mut addrs| addrs.find(std::net::SocketAddr::is_ipv4))
                .ok_or_else(|| FieldError::invalid("DNS resolution failed"))?;
            return Ok(Value::String(resolved.ip().to_string()));
        }

        let matches = |re: &LazyLock<Option<Regex>>| re.as_ref().is_some_and(|re| re.is_match(raw));
        if !matches(&HOSTNAME) && !matches(&NETBIOS) {
            return Err(FieldError::invalid("value is not a valid hostname"));
        }
        Ok(Value::String(raw.to_string()))
    }
}

// ============================================================================
// URL
// ============================================================================

/// An absolute URL. A scheme is required.
#[derive(Debug, Clone, Default)]
pub struct UrlField {
    options: FieldOptions,
}

impl UrlField {
    /// Creates a URL field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Field for UrlField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "url"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        let raw = expect_str(value)?;
        Url::parse(raw.trim())
            .map_err(|e| FieldError::invalid(format!("value is not a valid URL: {e}")))?;
        Ok(Value::String(raw.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ipv4_address() {
        let field = IPv4AddressField::new();
        assert_eq!(field.validate(json!("10.0.0.1")).unwrap(), json!("10.0.0.1"));
        let err = field.validate(json!("10.0.0.256")).unwrap_err();
        assert_eq!(err.to_string(), "value is not a valid IPv4 address");
    }

    #[test]
    fn test_ipv4_network() {
        let field = IPv4NetworkField::new();
        assert_eq!(
            field.validate(json!("192.168.0.0/16")).unwrap(),
            json!("192.168.0.0/16")
        );
        assert_eq!(field.validate(json!("10.1.2.3")).unwrap(), json!("10.1.2.3/32"));
        assert_eq!(field.validate(json!("0.0.0.0/0")).unwrap(), json!("0.0.0.0/0"));
        // host bits set
        assert!(field.validate(json!("192.168.0.1/16")).is_err());
        assert!(field.validate(json!("192.168.0.0/33")).is_err());
    }

    #[test]
    fn test_ipv4_network_prefix_limits() {
        let field = IPv4NetworkField::new().min_prefix_len(8).max_prefix_len(24);
        assert!(field.validate(json!("10.0.0.0/8")).is_ok());
        assert!(field.validate(json!("0.0.0.0/0")).is_err());
        assert!(field.validate(json!("10.0.0.0/30")).is_err());
    }

    #[test]
    fn test_hostname() {
        let field = HostnameField::new();
        assert_eq!(field.validate(json!("db.example.com")).unwrap(), json!("db.example.com"));
        assert_eq!(field.validate(json!("127.0.0.1")).unwrap(), json!("127.0.0.1"));
        assert!(field.validate(json!("bad host name!")).is_err());

        let no_ip = HostnameField::new().allow_ipv4(false);
        assert_eq!(
            no_ip.validate(json!("127.0.0.1")).unwrap_err().to_string(),
            "value is not a valid DNS hostname"
        );
    }

    #[test]
    fn test_url() {
        let field = UrlField::new();
        assert!(field.validate(json!("https://example.com/hook")).is_ok());
        assert!(field.validate(json!("example.com/hook")).is_err());
        assert!(field.validate(json!(42)).is_err());
    }
}

//! Network-shaped string checks.

use std::net::{Ipv4Addr, ToSocketAddrs};

use once_cell::sync::Lazy;
use regex::Regex;

static MAC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{2}(?:(?::[0-9a-f]{2}){5}|(?:-[0-9a-f]{2}){5})$")
        .expect("MAC address pattern compiles")
});

/// Validate a dotted-quad IPv4 address.
pub(crate) fn ipv4_address(s: &str) -> Result<String, String> {
    let valid = s.chars().all(|c| c.is_ascii_digit() || c == '.') && s.parse::<Ipv4Addr>().is_ok();
    if valid {
        Ok(s.to_string())
    } else {
        Err(format!("{s} is not a valid IP address"))
    }
}

/// Validate a subnet as `network/bits` or `network/netmask`.
pub(crate) fn ipv4_subnet(s: &str) -> Result<String, String> {
    let Some((network, mask)) = s.split_once('/') else {
        return Err("missing CIDR bits or netmask".to_string());
    };
    let network = ipv4_address(network)?;

    let mask = if mask.contains('.') {
        ipv4_address(mask)?
    } else {
        match mask.parse::<u8>() {
            Ok(bits) if bits <= 32 => bits.to_string(),
            Ok(bits) => return Err(format!("{bits} must be <= 32")),
            Err(_) => return Err(format!("{mask} is not a valid integer")),
        }
    };

    Ok(format!("{network}/{mask}"))
}

/// Validate a DNS hostname.
pub(crate) fn hostname(s: &str) -> Result<String, String> {
    if s.len() > 253 {
        return Err(format!("{s} is longer than the maximum 253 characters"));
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err("Argument contains invalid character".to_string());
    }
    for piece in s.split('.') {
        if piece.len() > 63 {
            return Err(format!(
                "No piece of a hostname can be > 63 characters: {piece}"
            ));
        }
        if piece.starts_with('-') {
            return Err(format!(
                "No piece of a hostname can start with '-': {piece}"
            ));
        }
    }
    Ok(s.to_string())
}

/// Validate a hostname and require the system resolver to know it.
pub(crate) fn resolvable_hostname(s: &str) -> Result<String, String> {
    let host = hostname(s)?;
    match (host.as_str(), 0)
        .to_socket_addrs()
        .map(|mut addrs| addrs.next().is_some())
    {
        Ok(true) => Ok(host),
        _ => Err(format!("{host} could not be resolved")),
    }
}

/// Validate a MAC address, returning it lower-cased.
pub(crate) fn mac_address(s: &str) -> Result<String, String> {
    let lowered = s.to_lowercase();
    if MAC_REGEX.is_match(&lowered) {
        Ok(lowered)
    } else {
        Err(format!("{lowered} is not a valid MAC address"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_address() {
        assert_eq!(ipv4_address("10.1.2.3").unwrap(), "10.1.2.3");
        assert!(ipv4_address("10.1.2").is_err());
        assert!(ipv4_address("10.1.2.256").is_err());
        assert!(ipv4_address("host.local").is_err());
        assert!(ipv4_address(" 10.1.2.3").is_err());
    }

    #[test]
    fn test_ipv4_subnet() {
        assert_eq!(ipv4_subnet("10.0.0.0/8").unwrap(), "10.0.0.0/8");
        assert_eq!(
            ipv4_subnet("192.168.0.0/255.255.255.0").unwrap(),
            "192.168.0.0/255.255.255.0"
        );
        assert_eq!(ipv4_subnet("10.0.0.0/33").unwrap_err(), "33 must be <= 32");
        assert_eq!(
            ipv4_subnet("10.0.0.0").unwrap_err(),
            "missing CIDR bits or netmask"
        );
        assert!(ipv4_subnet("10.0.0/8").is_err());
    }

    #[test]
    fn test_hostname() {
        assert!(hostname("example.com").is_ok());
        assert!(hostname("node-01").is_ok());
        assert!(hostname("-bad.example.com").is_err());
        assert!(hostname("under_score").is_err());
        assert!(hostname(&"a".repeat(64)).is_err());
        assert!(hostname(&"a.".repeat(130)).is_err());
    }

    #[test]
    fn test_resolvable_hostname() {
        assert_eq!(resolvable_hostname("localhost").unwrap(), "localhost");
        assert!(resolvable_hostname("no-such-host.invalid")
            .unwrap_err()
            .contains("could not be resolved"));
        assert!(resolvable_hostname("bad_host").is_err());
    }

    #[test]
    fn test_mac_address() {
        assert_eq!(
            mac_address("AA:BB:CC:DD:EE:FF").unwrap(),
            "aa:bb:cc:dd:ee:ff"
        );
        assert!(mac_address("aa-bb-cc-dd-ee-ff").is_ok());
        // Separators must be consistent
        assert!(mac_address("aa:bb-cc:dd:ee:ff").is_err());
        assert!(mac_address("aa:bb:cc:dd:ee").is_err());
        assert!(mac_address("gg:bb:cc:dd:ee:ff").is_err());
    }
}

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::ModelError;

pub const MAX_ADDRESS_LEN: usize = 45;
pub const MAX_ADDRESSES_PER_REQUEST: usize = 20;

/// Validates a textual address as eligible to be a member of the overlay
/// network: must parse as IPv4/IPv6, must not be loopback, link-local,
/// multicast, unspecified, or in a reserved range. Private ranges (RFC1918),
/// CGNAT (100.64.0.0/10), and IPv6 ULA (fc00::/7) are accepted.
pub fn validate_member_address(raw: &str) -> Result<IpAddr, ModelError> {
    if raw.len() > MAX_ADDRESS_LEN {
        return Err(ModelError::AddressTooLong {
            max: MAX_ADDRESS_LEN,
        });
    }
    let ip: IpAddr = raw
        .parse()
        .map_err(|_| ModelError::NotAnAddress(raw.to_string()))?;

    match ip {
        IpAddr::V4(v4) => validate_v4(raw, v4)?,
        IpAddr::V6(v6) => validate_v6(raw, v6)?,
    }
    Ok(ip)
}

fn validate_v4(raw: &str, v4: Ipv4Addr) -> Result<(), ModelError> {
    if v4.is_loopback() {
        return Err(ModelError::Loopback(raw.to_string()));
    }
    if v4.is_unspecified() {
        return Err(ModelError::Unspecified(raw.to_string()));
    }
    if v4.is_link_local() {
        return Err(ModelError::LinkLocal(raw.to_string()));
    }
    if v4.is_multicast() || v4.is_broadcast() {
        return Err(ModelError::Multicast(raw.to_string()));
    }
    if is_v4_reserved(v4) {
        return Err(ModelError::Reserved(raw.to_string()));
    }
    Ok(())
}

fn validate_v6(raw: &str, v6: Ipv6Addr) -> Result<(), ModelError> {
    if v6.is_loopback() {
        return Err(ModelError::Loopback(raw.to_string()));
    }
    if v6.is_unspecified() {
        return Err(ModelError::Unspecified(raw.to_string()));
    }
    if v6.is_multicast() {
        return Err(ModelError::Multicast(raw.to_string()));
    }
    if is_v6_link_local(v6) {
        return Err(ModelError::LinkLocal(raw.to_string()));
    }
    if let Some(v4) = v6.to_ipv4_mapped() {
        return validate_v4(raw, v4);
    }
    Ok(())
}

/// 240.0.0.0/4 (class E, reserved) only. CGNAT (100.64.0.0/10) is
/// deliberately excluded here: member devices behind carrier-grade NAT are
/// a normal and expected shape for this system.
fn is_v4_reserved(v4: Ipv4Addr) -> bool {
    v4.octets()[0] >= 240
}

fn is_v6_link_local(v6: Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_private_v4() {
        assert!(validate_member_address("192.168.1.10").is_ok());
        assert!(validate_member_address("10.0.0.5").is_ok());
    }

    #[test]
    fn accepts_cgnat() {
        assert!(validate_member_address("100.64.1.1").is_ok());
    }

    #[test]
    fn rejects_class_e_reserved() {
        assert!(matches!(
            validate_member_address("240.0.0.1"),
            Err(ModelError::Reserved(_))
        ));
    }

    #[test]
    fn accepts_test_net_documentation_range() {
        // Not special-cased: only class E (240.0.0.0/4) counts as reserved.
        assert!(validate_member_address("192.0.2.1").is_ok());
    }

    #[test]
    fn rejects_loopback() {
        assert!(matches!(
            validate_member_address("127.0.0.1"),
            Err(ModelError::Loopback(_))
        ));
    }

    #[test]
    fn rejects_link_local_v4() {
        assert!(matches!(
            validate_member_address("169.254.1.1"),
            Err(ModelError::LinkLocal(_))
        ));
    }

    #[test]
    fn rejects_multicast() {
        assert!(matches!(
            validate_member_address("224.0.0.1"),
            Err(ModelError::Multicast(_))
        ));
    }

    #[test]
    fn rejects_unspecified() {
        assert!(matches!(
            validate_member_address("0.0.0.0"),
            Err(ModelError::Unspecified(_))
        ));
    }

    #[test]
    fn accepts_ipv6_ula() {
        assert!(validate_member_address("fd00::1").is_ok());
    }

    #[test]
    fn rejects_ipv6_link_local() {
        assert!(matches!(
            validate_member_address("fe80::1"),
            Err(ModelError::LinkLocal(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            validate_member_address("not-an-ip"),
            Err(ModelError::NotAnAddress(_))
        ));
    }

    #[test]
    fn rejects_overlong() {
        let long = "2001:".to_string() + &"0".repeat(50);
        assert!(matches!(
            validate_member_address(&long),
            Err(ModelError::AddressTooLong { .. })
        ));
    }
}

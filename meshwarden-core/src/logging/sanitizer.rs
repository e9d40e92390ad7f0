use once_cell::sync::Lazy;
use regex::{Captures, Regex};

fn mask_secret(secret: &str, keep_start: usize, keep_end: usize) -> String {
    if secret.len() <= keep_start + keep_end {
        return "*".repeat(secret.len());
    }
    let start = &secret[..keep_start];
    let end = &secret[secret.len() - keep_end..];
    let middle = "*".repeat(secret.len() - keep_start - keep_end);
    format!("{start}{middle}{end}")
}

static API_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(api[_-]?key["']?\s*[:=]\s*["']?)([a-zA-Z0-9+/]{8,})"#).unwrap()
});
static IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3}\.\d{1,3}\.)(\d{1,3})\.(\d{1,3})\b").unwrap());
static ZT_NETWORK_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([a-fA-F0-9]{16})\b").unwrap());
static MAC_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[a-fA-F0-9]{2}[:-]){5}[a-fA-F0-9]{2}\b").unwrap());
static USERNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(user[_-]?name["']?\s*[:=]\s*["']?)([^"'\s,}]{3,})"#).unwrap()
});
static PASSWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(password["']?\s*[:=]\s*["']?)([^"'\s,}]+)"#).unwrap());

/// Redacts secrets and identifying details from a log line before it reaches
/// any writer. Order matters only in that each pass operates on the output
/// of the previous one; the patterns themselves don't overlap in practice.
pub fn sanitize(message: &str) -> String {
    let mut out = API_KEY
        .replace_all(message, |caps: &Captures| {
            format!("{}{}", &caps[1], mask_secret(&caps[2], 4, 2))
        })
        .into_owned();

    out = IPV4
        .replace_all(&out, |caps: &Captures| format!("{}***.{}", &caps[1], &caps[3]))
        .into_owned();

    out = ZT_NETWORK_ID
        .replace_all(&out, |caps: &Captures| mask_secret(&caps[1], 4, 4))
        .into_owned();

    out = MAC_ADDRESS
        .replace_all(&out, |caps: &Captures| {
            let whole = &caps[0];
            format!("XX:XX:XX:XX:{}", &whole[whole.len() - 5..])
        })
        .into_owned();

    out = USERNAME
        .replace_all(&out, |caps: &Captures| {
            format!("{}{}", &caps[1], mask_secret(&caps[2], 2, 1))
        })
        .into_owned();

    out = PASSWORD
        .replace_all(&out, |caps: &Captures| format!("{}***HIDDEN***", &caps[1]))
        .into_owned();

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_api_key_keeping_prefix_and_suffix() {
        let masked = sanitize("api_key=abcdefghijklmnop");
        assert!(masked.contains("abcd"));
        assert!(masked.contains("op"));
        assert!(!masked.contains("abcdefghijklmnop"));
    }

    #[test]
    fn masks_ipv4_third_octet() {
        let masked = sanitize("client at 192.168.55.10 connected");
        assert_eq!(masked, "client at 192.168.***.10 connected");
    }

    #[test]
    fn masks_network_id_keeping_four_and_four() {
        let masked = sanitize("network abcd1234abcd5678 joined");
        assert!(masked.contains("abcd"));
        assert!(masked.contains("5678"));
        assert!(masked.contains("****"));
    }

    #[test]
    fn fully_masks_mac_address() {
        let masked = sanitize("mac 00:11:22:33:44:55 seen");
        assert_eq!(masked, "mac XX:XX:XX:XX:44:55 seen");
    }

    #[test]
    fn fully_hides_password() {
        let masked = sanitize("password=hunter2");
        assert!(masked.contains("***HIDDEN***"));
        assert!(!masked.contains("hunter2"));
    }

    #[test]
    fn partially_masks_username() {
        let masked = sanitize("username=alice");
        assert!(masked.contains("al"));
        assert!(!masked.contains("username=alice"));
    }
}

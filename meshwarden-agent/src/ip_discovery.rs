use sysinfo::Networks;

/// Finds this host's own addresses on the overlay network by matching
/// interface names against `adapter_keywords` (case-insensitive substring),
/// mirroring how the reference client picks out its ZeroTier adapter by
/// name rather than by asking the overlay daemon directly.
pub fn discover_own_ips(adapter_keywords: &[String]) -> Vec<String> {
    let networks = Networks::new_with_refreshed_list();
    let mut ips = Vec::new();

    for (name, data) in &networks {
        let name_lower = name.to_lowercase();
        let matches = adapter_keywords
            .iter()
            .any(|kw| name_lower.contains(&kw.to_lowercase()));
        if !matches {
            continue;
        }
        for network in data.ip_networks() {
            ips.push(network.addr.to_string());
        }
    }

    ips
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_keywords_matches_nothing() {
        assert!(discover_own_ips(&["this-adapter-does-not-exist".to_string()]).is_empty());
    }
}

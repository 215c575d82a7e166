use std::collections::HashSet;

/// Space-separated scope string parsing/formatting, shared by the
/// validator chain (C9) and the token scope-reconciliation step (C11).
pub fn parse_scopes(raw: &str) -> HashSet<String> {
    raw.split_whitespace().map(|s| s.to_string()).collect()
}

pub fn format_scopes(scopes: &HashSet<String>) -> String {
    let mut sorted: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
    sorted.sort_unstable();
    sorted.join(" ")
}

/// Final scopes = intersection(requested, previously granted) (spec
/// §4.6 "Scope/resource reconciliation").
pub fn intersect(requested: &HashSet<String>, granted: &HashSet<String>) -> HashSet<String> {
    requested.intersection(granted).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip_sorted() {
        let scopes = parse_scopes("profile openid  email");
        assert_eq!(format_scopes(&scopes), "email openid profile");
    }

    #[test]
    fn intersect_drops_scopes_not_previously_granted() {
        let requested = parse_scopes("openid profile admin");
        let granted = parse_scopes("openid profile");
        assert_eq!(intersect(&requested, &granted), granted);
    }
}

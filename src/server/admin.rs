// ── Admin Gate ─────────────────────────────────────────────────────────────
// Authorization for the /admin routes. Checks run in a fixed order and the
// first failure wins:
//
//   1. no token configured        → 500 (operator error, never an open door)
//   2. client address not allowed → 403
//   3. no Bearer credential       → 401
//   4. credential mismatch        → 401 (constant-time comparison)
//
// The client address is the first X-Forwarded-For hop when present (the
// deployment sits behind a reverse proxy), otherwise the socket peer. An
// empty allowlist admits every address.

use std::net::IpAddr;
use subtle::ConstantTimeEq;

pub struct AdminGate {
    token: Option<String>,
    allowlist: Vec<String>,
}

/// A denied request, ready to serialise.
#[derive(Debug, PartialEq, Eq)]
pub struct Denial {
    pub status: u16,
    pub reason: &'static str,
}

impl AdminGate {
    pub fn new(token: Option<String>, allowlist: Vec<String>) -> Self {
        Self { token, allowlist }
    }

    /// Authorize one request. `head` is the raw request head (request line
    /// plus headers).
    pub fn authorize(&self, peer: IpAddr, head: &str) -> Result<(), Denial> {
        let Some(expected) = self.token.as_deref() else {
            return Err(Denial { status: 500, reason: "Admin token not configured" });
        };

        let client = client_address(peer, head);
        if !self.address_allowed(&client) {
            return Err(Denial { status: 403, reason: "Address not allowed" });
        }

        let Some(presented) = bearer_token(head) else {
            return Err(Denial { status: 401, reason: "Missing bearer token" });
        };
        if !token_matches(presented, expected) {
            return Err(Denial { status: 401, reason: "Invalid bearer token" });
        }
        Ok(())
    }

    fn address_allowed(&self, client: &str) -> bool {
        self.allowlist.is_empty() || self.allowlist.iter().any(|a| a == client)
    }
}

/// First X-Forwarded-For hop when present, else the socket peer.
fn client_address(peer: IpAddr, head: &str) -> String {
    match header_value(head, "x-forwarded-for") {
        Some(forwarded) => forwarded
            .split(',')
            .next()
            .unwrap_or("")
            .trim()
            .to_string(),
        None => peer.to_string(),
    }
}

fn bearer_token(head: &str) -> Option<&str> {
    let value = header_value(head, "authorization")?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Case-insensitive header lookup over a raw request head.
pub(crate) fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    for line in head.lines().skip(1) {
        if line.is_empty() {
            break;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        if key.trim().eq_ignore_ascii_case(name) {
            return Some(value.trim());
        }
    }
    None
}

fn token_matches(presented: &str, expected: &str) -> bool {
    // ct_eq requires equal lengths; a length mismatch is a mismatch.
    presented.len() == expected.len()
        && presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 9));

    fn head(lines: &[&str]) -> String {
        let mut head = String::from("POST /admin/backup HTTP/1.1\r\n");
        for line in lines {
            head.push_str(line);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        head
    }

    #[test]
    fn unconfigured_token_is_a_server_error() {
        let gate = AdminGate::new(None, vec![]);
        let denial = gate
            .authorize(PEER, &head(&["Authorization: Bearer anything"]))
            .unwrap_err();
        assert_eq!(denial.status, 500);
    }

    #[test]
    fn allowlist_rejects_before_credential_check() {
        let gate = AdminGate::new(Some("s3cret".into()), vec!["192.168.1.1".into()]);
        // Correct credential, wrong address — 403, not 401.
        let denial = gate
            .authorize(PEER, &head(&["Authorization: Bearer s3cret"]))
            .unwrap_err();
        assert_eq!(denial.status, 403);
    }

    #[test]
    fn forwarded_first_hop_overrides_peer() {
        let gate = AdminGate::new(Some("s3cret".into()), vec!["203.0.113.7".into()]);
        let head = head(&[
            "X-Forwarded-For: 203.0.113.7, 10.0.0.9",
            "Authorization: Bearer s3cret",
        ]);
        assert!(gate.authorize(PEER, &head).is_ok());
    }

    #[test]
    fn missing_and_wrong_credentials_are_unauthorized() {
        let gate = AdminGate::new(Some("s3cret".into()), vec![]);
        assert_eq!(gate.authorize(PEER, &head(&[])).unwrap_err().status, 401);
        assert_eq!(
            gate.authorize(PEER, &head(&["Authorization: Bearer nope"]))
                .unwrap_err()
                .status,
            401
        );
        // Same length, different content
        assert_eq!(
            gate.authorize(PEER, &head(&["Authorization: Bearer s3creT"]))
                .unwrap_err()
                .status,
            401
        );
    }

    #[test]
    fn valid_credential_passes_with_empty_allowlist() {
        let gate = AdminGate::new(Some("s3cret".into()), vec![]);
        assert!(gate
            .authorize(PEER, &head(&["Authorization: Bearer s3cret"]))
            .is_ok());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let head = head(&["aUtHoRiZaTiOn: Bearer tok"]);
        assert_eq!(header_value(&head, "authorization"), Some("Bearer tok"));
        assert_eq!(header_value(&head, "x-forwarded-for"), None);
    }
}

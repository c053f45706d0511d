//! Closed registry of wire protocols the toolkit knows how to spell.

/// Protocol tag attached to every endpoint. Tags above `Sctp` map to plain
/// TCP streams at creation time; they record user intent for higher-level
/// protocols until those gain dedicated handling.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Protocol {
    Unknown,
    Tcp,
    Udp,
    Raw,
    Icmp,
    Sctp,
    Http,
    Https,
    Ftp,
    Ssh,
    Dns,
    Ntp,
    Smtp,
    Pop3,
    Imap,
    Ldap,
    Mqtt,
}

const PROTO_TABLE: &[(&str, Protocol)] = &[
    ("tcp", Protocol::Tcp),
    ("udp", Protocol::Udp),
    ("raw", Protocol::Raw),
    ("icmp", Protocol::Icmp),
    ("sctp", Protocol::Sctp),
    ("http", Protocol::Http),
    ("https", Protocol::Https),
    ("ftp", Protocol::Ftp),
    ("ssh", Protocol::Ssh),
    ("dns", Protocol::Dns),
    ("ntp", Protocol::Ntp),
    ("smtp", Protocol::Smtp),
    ("pop3", Protocol::Pop3),
    ("imap", Protocol::Imap),
    ("ldap", Protocol::Ldap),
    ("mqtt", Protocol::Mqtt),
];

impl Protocol {
    /// Looks up a tag by name, case-insensitively. Anything outside the
    /// closed set resolves to `Unknown`.
    #[inline]
    pub fn from_name(name: &str) -> Protocol {
        for &(entry, proto) in PROTO_TABLE {
            if name.eq_ignore_ascii_case(entry) {
                return proto;
            }
        }

        Protocol::Unknown
    }

    /// Canonical lowercase spelling of the tag.
    #[inline]
    pub fn name(self) -> &'static str {
        for &(entry, proto) in PROTO_TABLE {
            if proto == self {
                return entry;
            }
        }

        "unknown"
    }
}

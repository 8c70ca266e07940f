//! Line classification and directive formatting
//!
//! Every line of the resolver file is classified afresh on each cycle.
//! Only the first token decides a directive, so `search mydomain.com` is a
//! search line and never a domain line.

use crate::desired::HostMapping;
use std::net::IpAddr;

/// Keyword of the default-domain directive
pub const DOMAIN_KEYWORD: &str = "domain";

/// Keyword of the search-list directive
pub const SEARCH_KEYWORD: &str = "search";

/// Keyword of the name-server directive
pub const NAMESERVER_KEYWORD: &str = "nameserver";

/// Every keyword the system resolver reads as a directive
///
/// A line starting with one of these is never a host line, and no host may
/// be named after one.
pub const RESOLVER_KEYWORDS: [&str; 7] = [
    DOMAIN_KEYWORD,
    SEARCH_KEYWORD,
    NAMESERVER_KEYWORD,
    "options",
    "sortlist",
    "lookup",
    "family",
];

/// Characters that start a comment in the resolver file
pub const COMMENT_CHARS: [char; 2] = ['#', ';'];

/// What a single line of the resolver file is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// `domain <name>`
    Domain,
    /// `search <name> ...`
    Search,
    /// `nameserver <address>`
    Nameserver,
    /// `<hostname> <address>`
    Host,
    /// Anything else: comments, blank lines, options, unknown text
    Passthrough,
}

impl LineKind {
    /// Classify a line
    pub fn classify(line: &str) -> Self {
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            return LineKind::Passthrough;
        };

        match first {
            DOMAIN_KEYWORD => LineKind::Domain,
            SEARCH_KEYWORD => LineKind::Search,
            NAMESERVER_KEYWORD => LineKind::Nameserver,
            _ if first.starts_with(COMMENT_CHARS) => LineKind::Passthrough,
            _ if RESOLVER_KEYWORDS.contains(&first) => LineKind::Passthrough,
            _ => match (tokens.next(), tokens.next()) {
                (Some(address), None) if address.parse::<IpAddr>().is_ok() => LineKind::Host,
                _ => LineKind::Passthrough,
            },
        }
    }

    /// Conventional position among directives: domain, search, nameserver,
    /// then host lines. Passthrough lines have no rank.
    pub(crate) fn rank(self) -> Option<u8> {
        match self {
            LineKind::Domain => Some(0),
            LineKind::Search => Some(1),
            LineKind::Nameserver => Some(2),
            LineKind::Host => Some(3),
            LineKind::Passthrough => None,
        }
    }
}

/// `domain <name>`
pub fn domain_line(name: &str) -> String {
    format!("{DOMAIN_KEYWORD} {name}\n")
}

/// `search <name1> <name2> ...`
pub fn search_line(domains: &[String]) -> String {
    format!("{SEARCH_KEYWORD} {}\n", domains.join(" "))
}

/// `nameserver <address>`
pub fn nameserver_line(address: &str) -> String {
    format!("{NAMESERVER_KEYWORD} {address}\n")
}

/// `<hostname> <address>`
pub fn host_line(mapping: &HostMapping) -> String {
    format!("{} {}\n", mapping.hostname, mapping.address)
}

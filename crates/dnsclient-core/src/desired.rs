//! Desired DNS client state
//!
//! [`DesiredState`] is the logical content the resolver file should carry.
//! It is projected from a config store [`Snapshot`] at the start of every
//! cycle and thrown away at the end of it; nothing is carried between cycles.
//!
//! ## Projection
//!
//! - `domain_name`, `domain_search_list` and `name_servers` take the value
//!   of the last row (in store order) that sets them
//! - host mappings accumulate over all rows, IPv4 before IPv6 within a row,
//!   each map in hostname order
//!
//! Values that would break the line format (empty, containing whitespace,
//! over-long, unparseable addresses) are dropped with a warning, and lists
//! are truncated to the configured [`Limits`].

use crate::config::Limits;
use crate::reconcile::line::{COMMENT_CHARS, RESOLVER_KEYWORDS};
use crate::traits::Snapshot;
use std::net::IpAddr;
use tracing::warn;

/// A static hostname to address mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostMapping {
    /// Host name
    pub hostname: String,
    /// IPv4 or IPv6 address, as text
    pub address: String,
}

impl HostMapping {
    /// Create a new host mapping
    pub fn new(hostname: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
        }
    }
}

/// The resolver settings the file should reflect
///
/// An absent or empty field means "no lines of this kind".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    /// Default domain (`domain` directive)
    pub domain_name: Option<String>,
    /// Search list (`search` directive), in order
    pub domain_search_list: Vec<String>,
    /// Name servers (`nameserver` directives), in order
    pub name_servers: Vec<String>,
    /// Static host lines
    pub host_mappings: Vec<HostMapping>,
}

impl DesiredState {
    /// Create an empty desired state
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the domain name
    pub fn with_domain_name(mut self, name: impl Into<String>) -> Self {
        self.domain_name = Some(name.into());
        self
    }

    /// Set the search list
    pub fn with_search_list<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain_search_list = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Set the name servers
    pub fn with_name_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_servers = servers.into_iter().map(Into::into).collect();
        self
    }

    /// Append a host mapping
    pub fn with_host(mut self, hostname: impl Into<String>, address: impl Into<String>) -> Self {
        self.host_mappings.push(HostMapping::new(hostname, address));
        self
    }

    /// Whether the state asks for no directives at all
    pub fn is_empty(&self) -> bool {
        self.domain_name.is_none()
            && self.domain_search_list.is_empty()
            && self.name_servers.is_empty()
            && self.host_mappings.is_empty()
    }

    /// Project the desired state from a snapshot of the config store
    pub fn from_snapshot(snapshot: &Snapshot, limits: &Limits) -> Self {
        let mut state = Self::new();

        for row in &snapshot.dns_client {
            if let Some(name) = row.domain_name() {
                state.domain_name = Some(name.to_string());
            }
            if !row.domain_list.is_empty() {
                state.domain_search_list = row.domain_list.clone();
            }
            if !row.name_servers.is_empty() {
                state.name_servers = row.name_servers.clone();
            }

            let mappings = row
                .host_v4_address_mapping
                .iter()
                .chain(row.host_v6_address_mapping.iter());
            for (hostname, address) in mappings {
                state
                    .host_mappings
                    .push(HostMapping::new(hostname.as_str(), address.as_str()));
            }
        }

        state.sanitize(limits)
    }

    /// Drop values that cannot be written safely and enforce `limits`
    pub fn sanitize(mut self, limits: &Limits) -> Self {
        if let Some(name) = self.domain_name.take() {
            if is_token(&name, limits) {
                self.domain_name = Some(name);
            } else {
                warn!("Dropping invalid domain name {:?}", name);
            }
        }

        self.domain_search_list.retain(|domain| {
            let ok = is_token(domain, limits);
            if !ok {
                warn!("Dropping invalid search domain {:?}", domain);
            }
            ok
        });
        truncate("search domains", &mut self.domain_search_list, limits.max_search_domains);

        self.name_servers.retain(|server| {
            let ok = is_token(server, limits) && server.parse::<IpAddr>().is_ok();
            if !ok {
                warn!("Dropping invalid name server {:?}", server);
            }
            ok
        });
        truncate("name servers", &mut self.name_servers, limits.max_name_servers);

        self.host_mappings.retain(|mapping| {
            let ok = is_host_name(&mapping.hostname, limits)
                && is_token(&mapping.address, limits)
                && mapping.address.parse::<IpAddr>().is_ok();
            if !ok {
                warn!(
                    "Dropping invalid host mapping {:?} -> {:?}",
                    mapping.hostname, mapping.address
                );
            }
            ok
        });
        truncate("host mappings", &mut self.host_mappings, limits.max_host_mappings);

        self
    }
}

fn is_token(value: &str, limits: &Limits) -> bool {
    !value.is_empty() && value.len() <= limits.max_value_len && !value.contains(char::is_whitespace)
}

// A host name must not read back as a directive or a comment.
fn is_host_name(value: &str, limits: &Limits) -> bool {
    is_token(value, limits)
        && !RESOLVER_KEYWORDS.contains(&value)
        && !value.starts_with(COMMENT_CHARS)
}

fn truncate<T>(what: &str, values: &mut Vec<T>, max: usize) {
    if values.len() > max {
        warn!(
            "{} {} configured, only the first {} are written",
            values.len(),
            what,
            max
        );
        values.truncate(max);
    }
}

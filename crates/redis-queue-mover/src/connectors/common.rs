//! Common utilities shared across connectors.
//!
//! Node list parsing and validation for store addresses.

use crate::error::{Error, Result};

/// Schemes accepted in a node entry.
const VALID_SCHEMES: [&str; 2] = ["redis://", "rediss://"];

/// Splits a comma-separated node list into connection URLs.
///
/// Entries without a scheme are treated as `host:port` and get `redis://`
/// prepended. Empty entries are skipped.
///
/// # Errors
///
/// Returns [`Error::Config`] if the list is empty or an entry is malformed.
pub fn parse_nodes(list: &str) -> Result<Vec<String>> {
    let nodes: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|node| {
            if node.contains("://") {
                node.to_string()
            } else {
                format!("redis://{node}")
            }
        })
        .collect();

    if nodes.is_empty() {
        return Err(Error::Config(format!("no store nodes in '{list}'")));
    }
    for node in &nodes {
        validate_node(node)?;
    }
    Ok(nodes)
}

/// Validates a single node URL.
pub fn validate_node(url: &str) -> Result<()> {
    let Some(rest) = VALID_SCHEMES.iter().find_map(|s| url.strip_prefix(s)) else {
        return Err(Error::Config(format!(
            "Invalid node scheme in '{url}'. Allowed: redis, rediss"
        )));
    };

    let host_port = rest.rsplit('@').next().unwrap_or(rest);
    let host_port = host_port.split('/').next().unwrap_or(host_port);
    if host_port.is_empty() || host_port.starts_with(':') {
        return Err(Error::Config(format!("Missing host in node '{url}'")));
    }
    if let Some((_, port)) = host_port.rsplit_once(':') {
        if port.parse::<u16>().is_err() {
            return Err(Error::Config(format!("Invalid port in node '{url}'")));
        }
    }
    Ok(())
}

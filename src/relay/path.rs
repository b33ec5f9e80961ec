//! Request path parsing.
//!
//! Maps `/<group>` and `/<group>/<port>` onto a [`GroupAddress`].

use thiserror::Error;

use crate::relay::address::{parse_class_d, GroupAddress, DEFAULT_GROUP_PORT};

/// Paths that are refused outright instead of being parsed.
const FORBIDDEN_PATHS: &[&str] = &["/", "/favicon.ico"];

/// Why a request path was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathRejection {
    /// The path is on the forbidden list (403).
    #[error("forbidden path")]
    Forbidden,

    /// Neither `/group` nor `/group/port`.
    #[error("expected /group or /group/port, got {0} segments")]
    SegmentCount(usize),

    /// The port segment is not an integer in 1..=65535.
    #[error("invalid port {0:?}")]
    InvalidPort(String),

    /// The group segment is not a class-D IPv4 address.
    #[error("{0:?} is not a multicast group")]
    NotMulticast(String),
}

impl PathRejection {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, PathRejection::Forbidden)
    }
}

/// Extract the multicast group addressed by a request path.
///
/// `path` is the URL path only; callers pass `Uri::path()` so query and
/// fragment never reach here. Splitting keeps the leading empty segment,
/// so `/group` has two segments and `/group/port` three.
pub fn parse_request_path(path: &str) -> Result<GroupAddress, PathRejection> {
    if FORBIDDEN_PATHS.contains(&path) {
        return Err(PathRejection::Forbidden);
    }

    let segments: Vec<&str> = path.split('/').collect();
    let (group, port) = match segments.as_slice() {
        [_, group] => (*group, DEFAULT_GROUP_PORT),
        [_, group, port] => (*group, parse_port(port)?),
        other => return Err(PathRejection::SegmentCount(other.len())),
    };

    let ip = parse_class_d(group).ok_or_else(|| PathRejection::NotMulticast(group.to_string()))?;
    GroupAddress::new(ip, port).ok_or_else(|| PathRejection::InvalidPort(port.to_string()))
}

fn parse_port(segment: &str) -> Result<u16, PathRejection> {
    match segment.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(PathRejection::InvalidPort(segment.to_string())),
    }
}

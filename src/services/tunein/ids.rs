//! Composite id format
//!
//! Addon ids look like `tunein_<guideId>---<contextToken>`. Both halves are
//! needed to rebuild meta and stream requests, so the id doubles as the
//! lookup key and no server-side table is kept.

use std::fmt;

use super::ID_PREFIX;

/// Separator between the guide id and the context token
pub const ID_SEPARATOR: &str = "---";

/// Guide id and context token recovered from an addon id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeId {
    pub guide_id: String,
    pub context_token: String,
}

impl CompositeId {
    pub fn new(guide_id: &str, context_token: &str) -> Self {
        Self {
            guide_id: guide_id.to_string(),
            context_token: context_token.to_string(),
        }
    }

    /// Parse an id with or without the namespace prefix.
    ///
    /// Returns `None` when the separator is missing or the guide id is empty.
    pub fn parse(id: &str) -> Option<Self> {
        let bare = id.strip_prefix(ID_PREFIX).unwrap_or(id);
        let (guide_id, context_token) = bare.split_once(ID_SEPARATOR)?;
        if guide_id.is_empty() {
            return None;
        }
        Some(Self::new(guide_id, context_token))
    }

    /// Id with the namespace prefix applied
    pub fn namespaced(&self) -> String {
        format!("{}{}", ID_PREFIX, self)
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.guide_id, ID_SEPARATOR, self.context_token)
    }
}

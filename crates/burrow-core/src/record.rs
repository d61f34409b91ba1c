use crate::context::OwnerId;
use crate::shortcode::ShortCode;
use serde::{Deserialize, Serialize};

/// A stored short link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortLinkRecord {
    /// The identity that created the record.
    pub owner_id: OwnerId,
    /// The original URL that was shortened.
    pub original_url: String,
    /// The code the URL is resolved by.
    pub short_code: ShortCode,
    /// Insertion order within the store.
    pub sequence: u64,
    /// Set once the owner deletes the link; cleared only by removal.
    pub is_deleted: bool,
}

impl ShortLinkRecord {
    pub fn new(
        owner_id: OwnerId,
        original_url: impl Into<String>,
        short_code: ShortCode,
        sequence: u64,
    ) -> Self {
        Self {
            owner_id,
            original_url: original_url.into(),
            short_code,
            sequence,
            is_deleted: false,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        &self.owner_id == owner
    }

    pub fn to_user_urls(&self, base_url: &str) -> UserUrls {
        UserUrls {
            short_url: self.short_code.to_url(base_url),
            original_url: self.original_url.clone(),
        }
    }
}

/// One item of a bulk shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incoming {
    pub correlation_id: String,
    pub original_url: String,
}

impl Incoming {
    pub fn new(correlation_id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            original_url: original_url.into(),
        }
    }
}

/// The short URL produced for one [`Incoming`] item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub correlation_id: String,
    pub short_url: String,
}

/// A live link owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrls {
    pub short_url: String,
    pub original_url: String,
}

/// Result of a bulk insert.
///
/// `outputs` holds exactly one entry per incoming item, in request order.
/// `conflicts` lists the correlation IDs whose URL was already stored and
/// were answered with the existing code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub outputs: Vec<Output>,
    pub conflicts: Vec<String>,
}

impl BatchOutcome {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outputs: Vec::with_capacity(capacity),
            conflicts: Vec::new(),
        }
    }

    pub fn push(&mut self, correlation_id: String, short_url: String, conflicted: bool) {
        if conflicted {
            self.conflicts.push(correlation_id.clone());
        }
        self.outputs.push(Output {
            correlation_id,
            short_url,
        });
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

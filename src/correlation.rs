//! B2C/B2B result attribution
//!
//! B2C and B2B result callbacks have identical bodies. The only way to tell
//! them apart is to remember which API call produced the `ConversationID`
//! echoed in the result. The client records every disbursement it sends in a
//! [`CorrelationStore`]; the webhook side resolves results against it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::callback::{CallbackFamily, NormalizedResult, ParsedCallback};

/// How long disbursement records are kept by default
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(48 * 3600);

/// Direction of a disbursement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisbursementKind {
    /// Business to customer
    B2c,
    /// Business to business
    B2b,
}

impl DisbursementKind {
    /// Matching callback family
    pub fn family(&self) -> CallbackFamily {
        match self {
            Self::B2c => CallbackFamily::B2c,
            Self::B2b => CallbackFamily::B2b,
        }
    }
}

/// Remembers which kind of disbursement produced a conversation id
pub trait CorrelationStore: Send + Sync {
    /// Record an outgoing disbursement
    fn record(&self, conversation_id: &str, kind: DisbursementKind);

    /// Look up a conversation id
    fn resolve(&self, conversation_id: &str) -> Option<DisbursementKind>;
}

/// Process-local [`CorrelationStore`] with time-based retention
#[derive(Debug)]
pub struct InMemoryCorrelationStore {
    entries: Mutex<HashMap<String, (DisbursementKind, Instant)>>,
    retention: Duration,
}

impl Default for InMemoryCorrelationStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl InMemoryCorrelationStore {
    /// Store with the default retention
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that forgets records after `retention`
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|(_, at)| now.duration_since(*at) < self.retention)
            .count()
    }

    /// Whether there are no live records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CorrelationStore for InMemoryCorrelationStore {
    fn record(&self, conversation_id: &str, kind: DisbursementKind) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, at)| now.duration_since(*at) < self.retention);
        entries.insert(conversation_id.to_string(), (kind, now));
    }

    fn resolve(&self, conversation_id: &str) -> Option<DisbursementKind> {
        let entries = self.entries.lock();
        entries
            .get(conversation_id)
            .filter(|(_, at)| at.elapsed() < self.retention)
            .map(|(kind, _)| *kind)
    }
}

/// Conversation ids a `Result` envelope can be matched on
fn conversation_ids(parsed: &ParsedCallback) -> impl Iterator<Item = &str> {
    ["ConversationID", "OriginatorConversationID"]
        .into_iter()
        .filter_map(move |key| parsed.get(&["Result", key]).and_then(|v| v.as_str()))
}

/// Refine a classified family using recorded disbursements
///
/// `B2bOrB2c` is refined to `B2c`/`B2b`. An `Unknown` result envelope is
/// also refined when its conversation id is on record, which catches B2B
/// results whose parameters carry neither receipt key. Every other family
/// passes through.
pub fn resolve_family(
    parsed: &ParsedCallback,
    family: CallbackFamily,
    store: &dyn CorrelationStore,
) -> CallbackFamily {
    let refinable = match family {
        CallbackFamily::B2bOrB2c => true,
        CallbackFamily::Unknown => parsed.get(&["Result"]).is_some_and(|r| r.is_object()),
        _ => false,
    };
    if !refinable {
        return family;
    }
    conversation_ids(parsed)
        .find_map(|id| store.resolve(id))
        .map_or(family, |kind| kind.family())
}

/// Re-label a normalized disbursement result using recorded disbursements
pub fn attribute(result: NormalizedResult, store: &dyn CorrelationStore) -> NormalizedResult {
    let NormalizedResult::B2bOrB2c(ref disbursement) = result else {
        return result;
    };

    let kind = [
        disbursement.header.conversation_id.as_deref(),
        disbursement.header.originator_conversation_id.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find_map(|id| store.resolve(id));

    match kind {
        Some(kind) => result.with_disbursement_family(kind.family()),
        None => result,
    }
}

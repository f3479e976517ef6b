//! Stable dedup fingerprints.
//!
//! Deduplication is by event *shape*, not content: two events with the same
//! (service, host, anomaly type, level) tuple always hash to the same
//! fingerprint no matter what their message, score, or timestamp say.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::event::{LogLevel, ScoredEvent};

/// Digest over the ordered tuple (service, host, anomaly type, level),
/// encoded as unpadded URL-safe base64.
pub fn fingerprint(
    service_name: &str,
    hostname: &str,
    anomaly_type: &str,
    level: LogLevel,
) -> String {
    let mut hasher = Sha256::new();
    // Separator keeps ("ab", "c") and ("a", "bc") distinct.
    hasher.update(service_name.as_bytes());
    hasher.update(b"|");
    hasher.update(hostname.as_bytes());
    hasher.update(b"|");
    hasher.update(anomaly_type.as_bytes());
    hasher.update(b"|");
    hasher.update(level.as_str().as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Fingerprint of a scored event's dedup tuple.
pub fn event_fingerprint(scored: &ScoredEvent) -> String {
    fingerprint(
        &scored.event.service_name,
        &scored.event.hostname,
        &scored.anomaly_type,
        scored.event.level,
    )
}

//! Column family definitions and key layout for the debate store
//!
//! Each column family provides logical separation of data types
//! while sharing the same RocksDB instance. The in-memory store uses
//! the same keys so both backends iterate in the same order.

/// Column family for debate aggregates
pub const CF_DEBATES: &str = "debates";

/// Column family for round statements
pub const CF_STATEMENTS: &str = "statements";

/// Column family for judge verdicts
pub const CF_VERDICTS: &str = "verdicts";

/// Column family for event history
pub const CF_EVENTS: &str = "events";

/// All column family names
pub const ALL_CFS: &[&str] = &[CF_DEBATES, CF_STATEMENTS, CF_VERDICTS, CF_EVENTS];

/// Key prefixes for compound keys
pub mod keys {
    /// Prefix shared by every debate key
    pub const DEBATE_PREFIX: &str = "debate:";

    /// Create a debate key
    pub fn debate(debate_id: &str) -> String {
        format!("{}{}", DEBATE_PREFIX, debate_id)
    }

    /// Create a statement key. Rounds are zero-padded so a prefix scan
    /// yields statements in round order.
    pub fn statement(debate_id: &str, round: u32, author_id: &str) -> String {
        format!("stmt:{}:{:04}:{}", debate_id, round, author_id)
    }

    /// Prefix covering every statement of a debate
    pub fn statement_prefix(debate_id: &str) -> String {
        format!("stmt:{}:", debate_id)
    }

    /// Create a verdict key (debate + pass + judge)
    pub fn verdict(debate_id: &str, pass: u32, judge_id: &str) -> String {
        format!("verdict:{}:{:04}:{}", debate_id, pass, judge_id)
    }

    /// Prefix covering every verdict of a debate
    pub fn verdict_prefix(debate_id: &str) -> String {
        format!("verdict:{}:", debate_id)
    }

    /// Prefix covering one adjudication pass of a debate
    pub fn verdict_pass_prefix(debate_id: &str, pass: u32) -> String {
        format!("verdict:{}:{:04}:", debate_id, pass)
    }

    /// Create an event key (timestamp-based for ordering)
    pub fn event(timestamp_nanos: i64, event_id: &str) -> String {
        format!("evt:{:020}:{}", timestamp_nanos, event_id)
    }

    /// Parse event timestamp from key
    pub fn parse_event_timestamp(key: &str) -> Option<i64> {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.len() >= 2 && parts[0] == "evt" {
            parts[1].parse().ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        assert_eq!(keys::debate("d-1"), "debate:d-1");
        assert_eq!(keys::statement("d-1", 2, "alice"), "stmt:d-1:0002:alice");
        assert_eq!(keys::verdict("d-1", 1, "logician"), "verdict:d-1:0001:logician");
        assert!(keys::statement("d-1", 2, "alice").starts_with(&keys::statement_prefix("d-1")));
        assert!(keys::verdict("d-1", 1, "x").starts_with(&keys::verdict_pass_prefix("d-1", 1)));
        assert!(!keys::verdict("d-1", 10, "x").starts_with(&keys::verdict_pass_prefix("d-1", 1)));
    }

    #[test]
    fn test_round_ordering() {
        assert!(keys::statement("d-1", 2, "zed") < keys::statement("d-1", 10, "amy"));
    }

    #[test]
    fn test_event_key_ordering() {
        let key1 = keys::event(1000000000, "evt-1");
        let key2 = keys::event(2000000000, "evt-2");
        assert!(key1 < key2);
    }

    #[test]
    fn test_parse_event_timestamp() {
        let key = keys::event(12345, "evt-1");
        assert_eq!(keys::parse_event_timestamp(&key), Some(12345));
        assert_eq!(keys::parse_event_timestamp("debate:d-1"), None);
    }
}

use crate::store::TaskResult;
use serde::Serialize;

/// Outcome of one sync pass. Also stored as the task log payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub outcome: TaskResult,
    pub duration_ms: i64,
    pub users_synced: usize,
    pub libraries_synced: usize,
    pub items_synced: usize,
    pub events_processed: usize,
    pub events_inserted: usize,
    pub errors: Vec<String>,
    /// Cursor floor used by an incremental pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_date_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_advanced_to: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
}

impl Default for SyncResult {
    fn default() -> Self {
        Self {
            success: true,
            outcome: TaskResult::Success,
            duration_ms: 0,
            users_synced: 0,
            libraries_synced: 0,
            items_synced: 0,
            events_processed: 0,
            events_inserted: 0,
            errors: Vec::new(),
            min_date_used: None,
            cursor_advanced_to: None,
            task_id: None,
        }
    }
}

impl SyncResult {
    pub fn failed(message: impl Into<String>) -> Self {
        let mut result = Self::default();
        result.errors.push(message.into());
        result.settle(false);
        result
    }

    /// Fixes `outcome` and `success` from the collected errors.
    /// `made_progress` separates PARTIAL from FAILED when errors exist.
    pub fn settle(&mut self, made_progress: bool) {
        self.outcome = if self.errors.is_empty() {
            TaskResult::Success
        } else if made_progress {
            TaskResult::Partial
        } else {
            TaskResult::Failed
        };
        self.success = self.outcome == TaskResult::Success;
    }

    /// Sums the counters of several passes. Succeeds only if every part did.
    pub fn combine(parts: &[SyncResult]) -> Self {
        let mut total = Self::default();
        for part in parts {
            total.users_synced += part.users_synced;
            total.libraries_synced += part.libraries_synced;
            total.items_synced += part.items_synced;
            total.events_processed += part.events_processed;
            total.events_inserted += part.events_inserted;
            total.errors.extend(part.errors.iter().cloned());
            total.min_date_used = part.min_date_used.or(total.min_date_used);
            total.cursor_advanced_to = part.cursor_advanced_to.or(total.cursor_advanced_to);
        }
        let made_progress = parts.iter().any(|p| p.outcome != TaskResult::Failed);
        total.settle(made_progress);
        if parts.iter().any(|p| !p.success) && total.success {
            total.outcome = TaskResult::Partial;
            total.success = false;
        }
        total
    }

    pub fn to_log_payload(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_distinguishes_partial_from_failed() {
        let mut result = SyncResult::default();
        result.settle(false);
        assert!(result.success);

        result.errors.push("items for library Movies: HTTP 500".into());
        result.settle(true);
        assert_eq!(result.outcome, TaskResult::Partial);
        assert!(!result.success);

        result.settle(false);
        assert_eq!(result.outcome, TaskResult::Failed);
    }

    #[test]
    fn combine_requires_every_part() {
        let ok = SyncResult {
            users_synced: 2,
            ..Default::default()
        };
        let failed = SyncResult::failed("activity: HTTP 503");

        let combined = SyncResult::combine(&[ok.clone(), failed]);
        assert!(!combined.success);
        assert_eq!(combined.outcome, TaskResult::Partial);
        assert_eq!(combined.users_synced, 2);
        assert_eq!(combined.errors, vec!["activity: HTTP 503".to_string()]);

        let both = SyncResult::combine(&[ok.clone(), ok]);
        assert!(both.success);
        assert_eq!(both.users_synced, 4);
    }

    #[test]
    fn payload_omits_empty_cursor_fields() {
        let payload = SyncResult::default().to_log_payload().unwrap();
        assert_eq!(payload["success"], true);
        assert_eq!(payload["outcome"], "SUCCESS");
        assert!(payload.get("cursor_advanced_to").is_none());
    }
}

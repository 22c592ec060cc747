//! Download merge classification.
//!
//! A conflict is an incoming remote value that differs from the current
//! local value *while* the local value carries edits made since the last
//! successful sync (its hash no longer matches the stored baseline). A
//! local value still matching the baseline simply takes the remote update.

use super::md5_hex;

/// What the merge does with one incoming `(key, language, text)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// No local value: insert.
    Insert,
    /// Local equals incoming: nothing to do.
    Skip,
    /// Local differs but has no edits since last sync: take the remote.
    Update,
    /// Local differs and was edited since last sync: policy decides.
    Conflict,
}

/// Classify one incoming value against the local state.
///
/// `stored_hash` is the hash recorded at the last successful sync, when
/// one exists. A local value that diverged from a missing or stale
/// baseline counts as locally edited.
pub fn classify(current: Option<&str>, stored_hash: Option<&str>, incoming: &str) -> MergeAction {
    let Some(current) = current else {
        return MergeAction::Insert;
    };
    if current == incoming {
        return MergeAction::Skip;
    }
    match stored_hash {
        Some(stored) if stored == md5_hex(current) => MergeAction::Update,
        _ => MergeAction::Conflict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_local_is_insert() {
        assert_eq!(classify(None, None, "Hi"), MergeAction::Insert);
    }

    #[test]
    fn equal_values_skip() {
        assert_eq!(classify(Some("Hi"), None, "Hi"), MergeAction::Skip);
        assert_eq!(
            classify(Some("Hi"), Some(&md5_hex("Hi")), "Hi"),
            MergeAction::Skip
        );
    }

    #[test]
    fn unedited_local_takes_remote_update() {
        // Baseline matches the current value: the difference is remote-only.
        assert_eq!(
            classify(Some("Hello"), Some(&md5_hex("Hello")), "Hi"),
            MergeAction::Update
        );
    }

    #[test]
    fn edited_local_conflicts() {
        // Local was "Hello" at last sync, edited to "Howdy" since.
        assert_eq!(
            classify(Some("Howdy"), Some(&md5_hex("Hello")), "Hi"),
            MergeAction::Conflict
        );
        // Never synced and diverging counts as a conflict too.
        assert_eq!(classify(Some("Howdy"), None, "Hi"), MergeAction::Conflict);
    }
}

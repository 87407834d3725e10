//! Removal of sessions nested inside another session of the same subject.

use crate::event::GroupBy;
use crate::reconstruct::Session;

/// Sorts sessions by `(subject key, start_time)` and drops every session
/// strictly contained in an earlier one of the same subject.
///
/// Sessions that merely overlap are both kept, so overlapping time can be
/// counted twice downstream. Containment is checked against all earlier
/// sessions, including ones already dropped.
pub fn remove_nested_sessions(mut sessions: Vec<Session>, group_by: GroupBy) -> Vec<Session> {
    sessions.sort_by(|a, b| {
        a.subject_key(group_by)
            .cmp(b.subject_key(group_by))
            .then(a.start_time.cmp(&b.start_time))
    });

    let mut nested = vec![false; sessions.len()];
    let mut group_start = 0;
    for (i, current) in sessions.iter().enumerate() {
        if i > 0 && sessions[i - 1].subject_key(group_by) != current.subject_key(group_by) {
            group_start = i;
        }
        nested[i] = sessions[group_start..i]
            .iter()
            .any(|earlier| earlier.strictly_contains(current));
    }

    let before = sessions.len();
    let kept: Vec<Session> = sessions
        .into_iter()
        .zip(nested)
        .filter_map(|(session, is_nested)| (!is_nested).then_some(session))
        .collect();

    tracing::debug!(
        sessions = before,
        nested = before - kept.len(),
        "removed nested sessions"
    );
    kept
}

//! Canonical notification lifecycle states and the forward-only transition rule.

use serde::{Deserialize, Serialize};

/// Canonical delivery outcome vocabulary, shared across every provider.
///
/// Raw provider vocabularies are translated into this set by the response
/// normalizer and never leak past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationStatus {
    /// Initial state, set when the notification is persisted.
    Created,
    /// The provider accepted the submission.
    Sending,
    /// The provider acknowledged receipt but has not confirmed delivery;
    /// another callback is expected.
    Pending,
    Delivered,
    TemporaryFailure,
    PermanentFailure,
    /// Fallback for unmappable callbacks and non-retryable provider
    /// rejections. Absorbing.
    TechnicalFailure,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Sending => "sending",
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::TemporaryFailure => "temporary-failure",
            Self::PermanentFailure => "permanent-failure",
            Self::TechnicalFailure => "technical-failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "sending" => Some(Self::Sending),
            "pending" => Some(Self::Pending),
            "delivered" => Some(Self::Delivered),
            "temporary-failure" => Some(Self::TemporaryFailure),
            "permanent-failure" => Some(Self::PermanentFailure),
            "technical-failure" => Some(Self::TechnicalFailure),
            _ => None,
        }
    }

    /// Whether a notification in this state may still change state.
    ///
    /// Only `created`, `sending` and `pending` accept further updates; the
    /// four outcome states are absorbing. This is what makes duplicate and
    /// out-of-order provider callbacks harmless: a `pending` arriving after
    /// `delivered` finds an absorbing state and becomes a no-op.
    pub fn accepts_update(&self) -> bool {
        matches!(self, Self::Created | Self::Sending | Self::Pending)
    }

    /// Whether the transition `self -> next` is legal.
    ///
    /// Re-applying the current status is not a transition; callers treat the
    /// resulting "no update performed" as success.
    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        self.accepts_update() && *self != next
    }

    /// Terminal statuses end the delivery lifecycle; `pending` does not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::TemporaryFailure | Self::PermanentFailure | Self::TechnicalFailure
        )
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(NotificationStatus::Created.can_transition_to(NotificationStatus::Sending));
        assert!(NotificationStatus::Sending.can_transition_to(NotificationStatus::Pending));
        assert!(NotificationStatus::Sending.can_transition_to(NotificationStatus::Delivered));
        assert!(NotificationStatus::Pending.can_transition_to(NotificationStatus::Delivered));
        assert!(NotificationStatus::Pending.can_transition_to(NotificationStatus::PermanentFailure));
        assert!(NotificationStatus::Created.can_transition_to(NotificationStatus::TechnicalFailure));
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        for terminal in [
            NotificationStatus::Delivered,
            NotificationStatus::TemporaryFailure,
            NotificationStatus::PermanentFailure,
            NotificationStatus::TechnicalFailure,
        ] {
            assert!(!terminal.can_transition_to(NotificationStatus::Pending));
            assert!(!terminal.can_transition_to(NotificationStatus::Delivered));
            assert!(!terminal.accepts_update());
        }
    }

    #[test]
    fn test_reapplying_status_is_not_a_transition() {
        assert!(!NotificationStatus::Pending.can_transition_to(NotificationStatus::Pending));
        assert!(!NotificationStatus::Sending.can_transition_to(NotificationStatus::Sending));
    }

    #[test]
    fn test_pending_is_not_terminal() {
        assert!(!NotificationStatus::Pending.is_terminal());
        assert!(NotificationStatus::Delivered.is_terminal());
        assert!(NotificationStatus::TechnicalFailure.is_terminal());
    }

    #[test]
    fn test_round_trip_parse() {
        for status in [
            NotificationStatus::Created,
            NotificationStatus::Sending,
            NotificationStatus::Pending,
            NotificationStatus::Delivered,
            NotificationStatus::TemporaryFailure,
            NotificationStatus::PermanentFailure,
            NotificationStatus::TechnicalFailure,
        ] {
            assert_eq!(NotificationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(NotificationStatus::parse("sent"), None);
    }
}

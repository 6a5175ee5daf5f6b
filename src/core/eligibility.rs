use crate::models::Participant;

/// Participants split by eligibility
#[derive(Debug, Clone, Default)]
pub struct EligibilitySplit {
    pub eligible: Vec<Participant>,
    pub excluded: Vec<Participant>,
}

/// Check whether a participant may be grouped
///
/// Fail-open: only an explicit false-like value excludes.
#[inline]
pub fn is_eligible(participant: &Participant) -> bool {
    participant.is_eligible()
}

/// Split the roster, preserving order on both sides
pub fn split_eligible(participants: Vec<Participant>) -> EligibilitySplit {
    let (eligible, excluded): (Vec<_>, Vec<_>) = participants.into_iter().partition(is_eligible);

    if !excluded.is_empty() {
        tracing::info!("Excluded {} ineligible participants", excluded.len());
    }

    EligibilitySplit { eligible, excluded }
}

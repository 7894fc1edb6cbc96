use crate::models::{Disposition, MessageOutcome};

pub fn decide(outcome: &MessageOutcome) -> Disposition {
    match outcome {
        MessageOutcome::Found { .. } => Disposition::Keep,
        MessageOutcome::NotFound => Disposition::Discard,
    }
}

use crate::history::TempHistory;

/// Minimum drop, in degrees, before a decline counts as real rather than
/// sensor noise.
pub const DECLINE_THRESHOLD: f32 = 1.0;

/// The comparison sample sits this many entries back from the latest, so the
/// decline is measured over roughly two check intervals.
const LOOKBACK: usize = 3;

/// True when the temperature is falling in a way attributable to a failed
/// ignition rather than a lowered setpoint.
///
/// Needs at least two samples; with fewer there is no signal yet. A lowered
/// setpoint on the latest sample overrides everything: the occupant turned
/// the heat down, the stove is fine.
pub fn ignition_decline(history: &TempHistory) -> bool {
    if history.len() < 2 {
        return false;
    }

    let reference_index = history.len().saturating_sub(LOOKBACK);
    let (Some(current), Some(reference)) = (history.latest(), history.get(reference_index)) else {
        return false;
    };

    if current.setpoint < reference.setpoint {
        return false;
    }

    reference.temperature - current.temperature >= DECLINE_THRESHOLD
}

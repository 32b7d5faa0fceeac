use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One snapshot of an emergency department's queue.
///
/// The `*_time` fields are the wait estimates exactly as published
/// (e.g. `"2 hrs 15 mins"`); they are not decoded further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitTimes {
    pub location: String,
    pub patients_in_waiting_room: i64,
    pub most_urgent_count: i64,
    pub most_urgent_time: String,
    pub urgent_count: i64,
    pub urgent_time: String,
    pub less_than_urgent_count: i64,
    pub less_than_urgent_time: String,
    pub patients_being_treated: i64,
    pub total_patients: i64,
    pub patients_waiting_transfer: i64,
    pub observed_at: DateTime<Utc>,
}

impl WaitTimes {
    /// Patients counted in the total who are neither waiting nor being
    /// treated. Can be negative when the source's counts disagree.
    pub fn derive_waiting_transfer(
        total_patients: i64,
        patients_in_waiting_room: i64,
        patients_being_treated: i64,
    ) -> i64 {
        total_patients - (patients_in_waiting_room + patients_being_treated)
    }
}

#[cfg(test)]
mod tests {
    use super::WaitTimes;

    #[test]
    fn waiting_transfer_is_remainder_of_total() {
        assert_eq!(WaitTimes::derive_waiting_transfer(40, 12, 20), 8);
        assert_eq!(WaitTimes::derive_waiting_transfer(10, 8, 5), -3);
    }
}

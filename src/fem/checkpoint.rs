use super::StepData;

/// Holds an independent copy of the step data
#[derive(Clone)]
pub struct Checkpoint {
    data: StepData,
}

impl Checkpoint {
    /// Takes a snapshot (deep copy) of the step data
    pub fn take(data: &StepData) -> Self {
        Checkpoint { data: data.clone() }
    }

    /// Returns the saved time
    pub fn time(&self) -> f64 {
        self.data.time
    }

    /// Returns the saved step data
    pub fn into_data(self) -> StepData {
        self.data
    }
}

/// Implements a single-slot checkpoint storage
///
/// Saving overwrites the slot (last write wins); recovering empties it.
#[derive(Clone, Default)]
pub struct CheckpointStore {
    slot: Option<Checkpoint>,
}

impl CheckpointStore {
    /// Allocates an empty store
    pub fn new() -> Self {
        CheckpointStore { slot: None }
    }

    /// Saves a snapshot, replacing the previous one (if any)
    pub fn save(&mut self, data: &StepData) {
        self.slot = Some(Checkpoint::take(data));
    }

    /// Removes and returns the snapshot
    pub fn take(&mut self) -> Option<Checkpoint> {
        self.slot.take()
    }

    /// Returns the snapshot without removing it
    pub fn peek(&self) -> Option<&Checkpoint> {
        self.slot.as_ref()
    }

    /// Returns true if there is no snapshot
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

use std::collections::HashMap;

use cbgroup_demo::group::{GroupEvent, GroupId, GroupObserver};
use cbgroup_demo::types::CallbackGroupKind;
use parking_lot::Mutex;

/// Observer that records the highest occupancy seen per group.
#[derive(Default)]
pub struct RecordingObserver {
    inner: Mutex<Recorded>,
}

#[derive(Default)]
struct Recorded {
    peak: HashMap<GroupId, (CallbackGroupKind, usize)>,
    events: usize,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest concurrent occupancy recorded for `group`.
    pub fn peak(&self, group: GroupId) -> usize {
        self.inner.lock().peak.get(&group).map_or(0, |(_, n)| *n)
    }

    /// Highest occupancy of any exclusive group.
    pub fn peak_exclusive(&self) -> usize {
        self.inner
            .lock()
            .peak
            .values()
            .filter(|(kind, _)| *kind == CallbackGroupKind::Exclusive)
            .map(|(_, n)| *n)
            .max()
            .unwrap_or(0)
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().events
    }
}

impl GroupObserver for RecordingObserver {
    fn on_event(&self, event: GroupEvent) {
        let mut inner = self.inner.lock();
        inner.events += 1;
        if let GroupEvent::Enter {
            group,
            kind,
            occupancy,
        } = event
        {
            let entry = inner.peak.entry(group).or_insert((kind, 0));
            entry.1 = entry.1.max(occupancy);
        }
    }
}

//! Reconciler - adapts the live voice graph to arrangement changes
//!
//! Runs after every clip mutation. Deleted clips lose their voice
//! surgically; a change to any surviving clip's position, trim window, or
//! track is a global discontinuity that rebuilds the whole session from the
//! current position, since relative scheduling delays may have shifted for
//! every voice. Deletions alone never trigger a rebuild.

use strata_arrange::{Clip, ClipId};

/// Snapshot of the scheduling-relevant shape of one clip
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClipShape {
    id: ClipId,
    start: f64,
    track: usize,
    trim_start: f64,
    trim_end: f64,
}

impl ClipShape {
    fn of(clip: &Clip) -> Self {
        Self {
            id: clip.id,
            start: clip.start,
            track: clip.track,
            trim_start: clip.trim_start,
            trim_end: clip.trim_end,
        }
    }
}

/// What the session must do to catch up with the clip set
#[derive(Debug, Default, PartialEq)]
pub struct ReconcileAction {
    /// Voices to stop surgically (their clips are gone)
    pub removed: Vec<ClipId>,
    /// Tear everything down and restart from the current position
    pub rebuild: bool,
}

impl ReconcileAction {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && !self.rebuild
    }
}

/// Diffs the clip set against its previous snapshot
#[derive(Debug, Default)]
pub struct Reconciler {
    previous: Vec<ClipShape>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the current clip set against the previous snapshot and
    /// refresh the snapshot.
    ///
    /// The snapshot refreshes on every pass, including while stopped or
    /// mid-seek, so the next comparison baseline is always the latest set;
    /// actions are only produced during active, non-seeking playback.
    pub fn reconcile(&mut self, current: &[Clip], playing: bool, seeking: bool) -> ReconcileAction {
        if !playing || seeking {
            self.snapshot(current);
            return ReconcileAction::default();
        }

        let removed = self
            .previous
            .iter()
            .filter(|prev| current.iter().all(|c| c.id != prev.id))
            .map(|prev| prev.id)
            .collect();

        let rebuild = current.iter().any(|clip| {
            self.previous
                .iter()
                .find(|prev| prev.id == clip.id)
                .is_some_and(|prev| *prev != ClipShape::of(clip))
        });

        self.snapshot(current);
        ReconcileAction { removed, rebuild }
    }

    fn snapshot(&mut self, current: &[Clip]) {
        self.previous = current.iter().map(ClipShape::of).collect();
    }
}

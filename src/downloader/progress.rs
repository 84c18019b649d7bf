// Aggregated percentage across sequentially transferred tracks

/// What a track completion signal means for the job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// An earlier track finished; the job keeps going
    Suppressed,
    /// The last track finished
    JobComplete,
    /// The current track had already signalled completion
    Duplicate,
}

/// Folds per-track `bytes_remaining` callbacks into one job-wide percentage.
///
/// Tracks run one after another; bytes of finished tracks carry forward.
/// Reported values never decrease and stay below 100 until the last
/// track completes.
#[derive(Debug)]
pub struct ProgressTracker {
    bytes_total: u64,
    bytes_completed: u64,
    track_count: usize,
    tracks_done: usize,
    current_size: u64,
    current_done: bool,
    last_percent: Option<u8>,
}

impl ProgressTracker {
    pub fn new(bytes_total: u64, track_count: usize) -> Self {
        Self {
            bytes_total,
            bytes_completed: 0,
            track_count,
            tracks_done: 0,
            current_size: 0,
            current_done: true,
            last_percent: None,
        }
    }

    /// Start the next track of `size` bytes
    pub fn begin_track(&mut self, size: u64) {
        self.current_size = size;
        self.current_done = false;
    }

    /// Returns the percentage to report, or `None` when it did not change
    pub fn on_progress(&mut self, bytes_remaining: u64) -> Option<u8> {
        if self.current_done {
            return None;
        }
        let received = self.bytes_completed + self.current_size.saturating_sub(bytes_remaining);
        let percent = self.percent_of(received).min(99);
        self.bump(percent)
    }

    pub fn on_track_complete(&mut self) -> TrackOutcome {
        if self.current_done {
            return TrackOutcome::Duplicate;
        }
        self.current_done = true;
        self.bytes_completed += self.current_size;
        self.tracks_done += 1;

        if self.tracks_done >= self.track_count {
            self.last_percent = Some(100);
            TrackOutcome::JobComplete
        } else {
            TrackOutcome::Suppressed
        }
    }

    /// Bytes of every track that has signalled completion
    pub fn bytes_completed(&self) -> u64 {
        self.bytes_completed
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.last_percent
    }

    fn bump(&mut self, percent: u8) -> Option<u8> {
        match self.last_percent {
            Some(last) if percent <= last => None,
            _ => {
                self.last_percent = Some(percent);
                Some(percent)
            }
        }
    }

    /// round(100 * received / total) in integer arithmetic
    fn percent_of(&self, received: u64) -> u8 {
        if self.bytes_total == 0 {
            return 0;
        }
        let received = received.min(self.bytes_total) as u128;
        let total = self.bytes_total as u128;
        ((200 * received + total) / (2 * total)) as u8
    }
}

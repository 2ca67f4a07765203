//! Playback over the filtered event sequence.
//!
//! The controller is a state machine over an index into a sequence it does
//! not own: the caller tells it the sequence length and asks it when to
//! advance. `index = None` is the "nothing shown yet" position; `Some(n)`
//! means events `[0..=n]` are included in the visible window. All transitions
//! clamp the index into `[None, len-1]`, and an empty sequence forces the
//! idle state regardless of prior transitions.

use std::time::Duration;

/// Coarse state of the controller, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Empty sequence or nothing shown yet
    Idle,
    Paused,
    Playing,
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    index: Option<usize>,
    playing: bool,
    speed: f64,
    show_all: bool,
    len: usize,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self {
            index: None,
            playing: false,
            speed: 1.0,
            show_all: false,
            len: 0,
        }
    }
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the last visible event, `None` before playback has revealed
    /// anything.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn show_all(&self) -> bool {
        self.show_all
    }

    pub fn phase(&self) -> PlaybackPhase {
        if self.playing {
            PlaybackPhase::Playing
        } else if self.index.is_some() {
            PlaybackPhase::Paused
        } else {
            PlaybackPhase::Idle
        }
    }

    /// Rewind to the initial position and stop.
    pub fn reset(&mut self) {
        self.index = None;
        self.playing = false;
    }

    /// Start playing. If the position is unset or already at (or past) the
    /// end, playback restarts from the first event.
    pub fn play(&mut self) {
        if self.len == 0 {
            return;
        }
        match self.index {
            None => self.index = Some(0),
            Some(i) if i >= self.len - 1 => self.index = Some(0),
            Some(_) => {}
        }
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Advance one position; manual stepping cancels autoplay.
    pub fn step_forward(&mut self) {
        self.playing = false;
        if self.len == 0 {
            return;
        }
        self.index = match self.index {
            None => Some(0),
            Some(i) => Some((i + 1).min(self.len - 1)),
        };
    }

    /// Retreat one position; stepping back from 0 reaches the unset position.
    pub fn step_back(&mut self) {
        self.playing = false;
        self.index = match self.index {
            None | Some(0) => None,
            Some(i) => Some(i - 1),
        };
    }

    /// Jump directly to a position. Cancels both autoplay and show-all.
    pub fn scrub(&mut self, position: usize) {
        self.playing = false;
        self.show_all = false;
        if self.len == 0 {
            self.index = None;
            return;
        }
        self.index = Some(position.min(self.len - 1));
    }

    /// Toggle show-all. Turning it on jumps the index to the last position;
    /// turning it off keeps the index (the view collapses to the most recent
    /// exchange instead).
    pub fn toggle_show_all(&mut self) {
        self.show_all = !self.show_all;
        if self.show_all && self.len > 0 {
            self.index = Some(self.len - 1);
        }
    }

    pub fn set_speed(&mut self, speed: f64) {
        if speed > 0.0 {
            self.speed = speed;
        }
    }

    /// Re-clamp after the filtered sequence changed length. An empty sequence
    /// forces the idle state. A position pinned at the end follows the tail
    /// when the sequence grows, so live events enter the window without a
    /// manual scrub; show-all tracks the tail from any position. A position
    /// rewound away from the end stays put.
    pub fn sync_len(&mut self, len: usize) {
        let at_tail = self.index.is_some_and(|i| i + 1 == self.len);
        self.len = len;
        if len == 0 {
            self.index = None;
            self.playing = false;
            return;
        }
        if at_tail || self.show_all {
            self.index = Some(len - 1);
            return;
        }
        if let Some(i) = self.index {
            if i >= len {
                self.index = Some(len - 1);
            }
        }
    }

    /// Reinitialize for a newly selected run. Completed history is shown in
    /// full: the index lands on the last position rather than the start.
    pub fn load_run(&mut self, len: usize) {
        self.len = len;
        self.playing = false;
        self.show_all = false;
        self.index = if len == 0 { None } else { Some(len - 1) };
    }

    /// Delay between autonomous advances at the current speed.
    pub fn advance_interval(&self) -> Duration {
        let ms = (1200.0 / self.speed).max(200.0);
        Duration::from_millis(ms as u64)
    }

    /// Autonomous advance. Returns true when the index moved. Reaching the
    /// last position stops playback.
    pub fn tick(&mut self) -> bool {
        if !self.playing || self.len == 0 {
            return false;
        }
        let current = match self.index {
            Some(i) => i,
            None => {
                self.index = Some(0);
                return true;
            }
        };
        if current >= self.len - 1 {
            self.playing = false;
            return false;
        }
        self.index = Some(current + 1);
        if current + 1 == self.len - 1 {
            self.playing = false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(len: usize) -> PlaybackController {
        let mut c = PlaybackController::new();
        c.sync_len(len);
        c
    }

    #[test]
    fn test_step_clamping() {
        let mut c = controller(3);

        // Arbitrary interleavings never leave [None, len-1].
        c.step_back();
        assert_eq!(c.index(), None);
        c.step_forward();
        assert_eq!(c.index(), Some(0));
        c.scrub(99);
        assert_eq!(c.index(), Some(2));
        c.step_forward();
        assert_eq!(c.index(), Some(2));
        c.step_back();
        c.step_back();
        c.step_back();
        c.step_back();
        assert_eq!(c.index(), None);
    }

    #[test]
    fn test_play_restarts_from_end() {
        let mut c = controller(3);
        c.scrub(2);
        c.play();
        assert_eq!(c.index(), Some(0));
        assert!(c.is_playing());

        // From the middle, play resumes in place.
        c.pause();
        c.scrub(1);
        c.play();
        assert_eq!(c.index(), Some(1));
    }

    #[test]
    fn test_play_on_empty_sequence_is_noop() {
        let mut c = controller(0);
        c.play();
        assert!(!c.is_playing());
        assert_eq!(c.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_tick_stops_at_end() {
        let mut c = controller(3);
        c.play();
        assert_eq!(c.index(), Some(0));

        assert!(c.tick());
        assert_eq!(c.index(), Some(1));
        assert!(c.is_playing());

        assert!(c.tick());
        assert_eq!(c.index(), Some(2));
        assert!(!c.is_playing());

        assert!(!c.tick());
        assert_eq!(c.index(), Some(2));
    }

    #[test]
    fn test_scrub_cancels_playing_and_show_all() {
        let mut c = controller(5);
        c.play();
        c.toggle_show_all();
        assert!(c.show_all());

        c.scrub(1);
        assert!(!c.is_playing());
        assert!(!c.show_all());
        assert_eq!(c.index(), Some(1));
    }

    #[test]
    fn test_show_all_jumps_to_last() {
        let mut c = controller(4);
        c.scrub(1);
        c.toggle_show_all();
        assert_eq!(c.index(), Some(3));

        // Turning it off keeps the index.
        c.toggle_show_all();
        assert_eq!(c.index(), Some(3));
    }

    #[test]
    fn test_sequence_shrink_clamps_and_empty_forces_idle() {
        let mut c = controller(5);
        c.scrub(4);
        c.play();

        c.sync_len(2);
        assert_eq!(c.index(), Some(1));

        c.sync_len(0);
        assert_eq!(c.index(), None);
        assert!(!c.is_playing());
        assert_eq!(c.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_growth_follows_tail_from_the_end() {
        let mut c = controller(2);
        c.load_run(2);
        assert_eq!(c.index(), Some(1));

        // Pinned at the end: a longer sequence pulls the window forward.
        c.sync_len(3);
        assert_eq!(c.index(), Some(2));

        // Rewound away from the end: growth leaves the position alone.
        c.scrub(0);
        c.sync_len(4);
        assert_eq!(c.index(), Some(0));

        // Show-all tracks the tail regardless of position.
        c.toggle_show_all();
        c.sync_len(5);
        assert_eq!(c.index(), Some(4));
    }

    #[test]
    fn test_load_run_starts_fully_revealed() {
        let mut c = controller(0);
        c.load_run(6);
        assert_eq!(c.index(), Some(5));
        assert!(!c.is_playing());
        assert!(!c.show_all());
        assert_eq!(c.phase(), PlaybackPhase::Paused);

        c.load_run(0);
        assert_eq!(c.index(), None);
    }

    #[test]
    fn test_advance_interval_floor() {
        let mut c = controller(3);
        c.set_speed(1.0);
        assert_eq!(c.advance_interval(), Duration::from_millis(1200));
        c.set_speed(2.0);
        assert_eq!(c.advance_interval(), Duration::from_millis(600));
        c.set_speed(10.0);
        assert_eq!(c.advance_interval(), Duration::from_millis(200));
    }
}

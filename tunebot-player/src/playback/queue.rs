//! Ordered track queue with a play cursor
//!
//! The queue keeps its history: `advance` moves the cursor forward instead of
//! removing tracks, so `last()` stays available as an autoplay seed after the
//! queue has run out. A cursor at or past the end means "exhausted".

use rand::Rng;
use std::fmt;
use tunebot_common::human_time::format_total;
use tunebot_common::Track;

#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    cursor: usize,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one track; the cursor does not move
    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Append tracks in order, returning how many were added
    pub fn add_many<I>(&mut self, tracks: I) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        let before = self.tracks.len();
        self.tracks.extend(tracks);
        self.tracks.len() - before
    }

    /// Track under the cursor, `None` once exhausted
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.cursor)
    }

    /// Most recently appended track, regardless of cursor
    pub fn last(&self) -> Option<&Track> {
        self.tracks.last()
    }

    /// Move the cursor forward by one, saturating at `len()`
    pub fn advance(&mut self) {
        if self.cursor < self.tracks.len() {
            self.cursor += 1;
        }
    }

    /// True when nothing is left to play (empty or exhausted)
    pub fn is_empty(&self) -> bool {
        self.cursor >= self.tracks.len()
    }

    /// Whether a track exists after the current one
    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.tracks.len()
    }

    /// Total tracks held, including already played ones
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Tracks strictly after the cursor
    pub fn upcoming(&self) -> &[Track] {
        let start = (self.cursor + 1).min(self.tracks.len());
        &self.tracks[start..]
    }

    /// Move the cursor forward to `index`
    ///
    /// Returns `false` (cursor unchanged) for an index behind the cursor or
    /// past the end.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index < self.cursor || index >= self.tracks.len() {
            return false;
        }
        self.cursor = index;
        true
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.cursor = 0;
    }

    /// Randomly permute the tracks after the cursor
    ///
    /// Fisher-Yates restricted to `cursor+1..len`; the current track and the
    /// play history keep their positions. Returns the number of tracks
    /// eligible for shuffling.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let start = self.cursor + 1;
        if start >= self.tracks.len() {
            return 0;
        }
        for i in (start + 1..self.tracks.len()).rev() {
            let j = rng.gen_range(start..=i);
            self.tracks.swap(i, j);
        }
        self.tracks.len() - start
    }

    /// Seconds left to play, counting the current track in full
    pub fn remaining_secs(&self) -> u64 {
        self.tracks
            .iter()
            .skip(self.cursor)
            .map(Track::duration_secs)
            .sum()
    }
}

impl fmt::Display for Queue {
    /// Current track marked `▶`, upcoming tracks numbered from 1
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(current) = self.current() else {
            return Ok(());
        };
        writeln!(f, "▶ {} · requested by {}", current, current.requested_by())?;
        for (n, track) in self.upcoming().iter().enumerate() {
            writeln!(f, "{}. {} · requested by {}", n + 1, track, track.requested_by())?;
        }
        write!(
            f,
            "{} track(s) remaining · {}",
            self.tracks.len() - self.cursor,
            format_total(self.remaining_secs())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tunebot_common::TrackInfo;

    fn track(id: &str, secs: u64) -> Track {
        Track::new(
            TrackInfo {
                id: id.to_string(),
                title: format!("Title {}", id),
                artist: "Artist".to_string(),
                duration_secs: secs,
                thumbnail: "thumb".to_string(),
            },
            "alice",
        )
        .unwrap()
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(Track::id).collect()
    }

    #[test]
    fn test_new_queue_is_empty() {
        let queue = Queue::new();
        assert!(queue.is_empty());
        assert!(queue.current().is_none());
        assert!(queue.last().is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_add_does_not_move_cursor() {
        let mut queue = Queue::new();
        queue.add(track("a", 60));
        queue.add(track("b", 60));

        assert_eq!(queue.cursor(), 0);
        assert_eq!(queue.current().map(Track::id), Some("a"));
        assert_eq!(queue.last().map(Track::id), Some("b"));
    }

    #[test]
    fn test_add_many_empty_is_noop() {
        let mut queue = Queue::new();
        queue.add(track("a", 60));
        assert_eq!(queue.add_many(Vec::new()), 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.add_many(vec![track("b", 1), track("c", 1)]), 2);
        assert_eq!(ids(queue.tracks()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_advance_to_exhaustion_keeps_history() {
        let mut queue = Queue::new();
        queue.add(track("a", 60));

        queue.advance();
        assert!(queue.is_empty());
        assert!(queue.current().is_none());
        assert_eq!(queue.last().map(Track::id), Some("a"));

        queue.advance();
        assert_eq!(queue.cursor(), 1);

        queue.add(track("b", 60));
        assert!(!queue.is_empty());
        assert_eq!(queue.current().map(Track::id), Some("b"));
    }

    #[test]
    fn test_clear_resets() {
        let mut queue = Queue::new();
        queue.add_many(vec![track("a", 1), track("b", 1)]);
        queue.advance();
        queue.clear();

        assert_eq!(queue.len(), 0);
        assert_eq!(queue.cursor(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_jump_to_is_forward_only() {
        let mut queue = Queue::new();
        queue.add_many(vec![track("a", 1), track("b", 1), track("c", 1)]);
        queue.advance();

        assert!(!queue.jump_to(0));
        assert!(!queue.jump_to(3));
        assert!(queue.jump_to(2));
        assert_eq!(queue.current().map(Track::id), Some("c"));
    }

    #[test]
    fn test_shuffle_keeps_current_and_history() {
        let mut queue = Queue::new();
        queue.add_many((0..10).map(|i| track(&format!("t{}", i), 1)));
        queue.advance();
        queue.advance();

        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(queue.shuffle(&mut rng), 7);

        assert_eq!(ids(&queue.tracks()[..3]), vec!["t0", "t1", "t2"]);
        let mut rest: Vec<_> = ids(queue.upcoming()).into_iter().map(String::from).collect();
        rest.sort();
        let mut expected: Vec<_> = (3..10).map(|i| format!("t{}", i)).collect();
        expected.sort();
        assert_eq!(rest, expected);
    }

    #[test]
    fn test_shuffle_nothing_upcoming() {
        let mut queue = Queue::new();
        queue.add(track("a", 1));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(queue.shuffle(&mut rng), 0);
        assert_eq!(ids(queue.tracks()), vec!["a"]);
    }

    #[test]
    fn test_display_marks_current() {
        let mut queue = Queue::new();
        queue.add_many(vec![track("a", 61), track("b", 125), track("c", 5)]);
        queue.advance();

        let rendered = queue.to_string();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "▶ **Artist** - Title b `2:05` · requested by alice");
        assert_eq!(lines[1], "1. **Artist** - Title c `0:05` · requested by alice");
        assert_eq!(lines[2], "2 track(s) remaining · 2:10");
    }

    #[test]
    fn test_display_exhausted_is_blank() {
        let mut queue = Queue::new();
        queue.add(track("a", 1));
        queue.advance();
        assert_eq!(queue.to_string(), "");
    }

    proptest! {
        #[test]
        fn cursor_never_decreases(ops in proptest::collection::vec(0u8..3, 0..60)) {
            let mut queue = Queue::new();
            let mut rng = StdRng::seed_from_u64(42);
            let mut last_cursor = 0;
            for (n, op) in ops.into_iter().enumerate() {
                match op {
                    0 => queue.add(track(&format!("t{}", n), 1)),
                    1 => queue.advance(),
                    _ => { queue.shuffle(&mut rng); }
                }
                prop_assert!(queue.cursor() >= last_cursor);
                prop_assert!(queue.cursor() <= queue.len());
                prop_assert_eq!(queue.is_empty(), queue.current().is_none());
                last_cursor = queue.cursor();
            }
        }

        #[test]
        fn shuffle_is_permutation_of_suffix(len in 0usize..30, cursor in 0usize..30, seed in any::<u64>()) {
            let mut queue = Queue::new();
            queue.add_many((0..len).map(|i| track(&format!("t{}", i), 1)));
            for _ in 0..cursor {
                queue.advance();
            }
            let before: Vec<String> = ids(queue.tracks()).into_iter().map(String::from).collect();
            let split = (queue.cursor() + 1).min(len);

            queue.shuffle(&mut StdRng::seed_from_u64(seed));

            let after: Vec<String> = ids(queue.tracks()).into_iter().map(String::from).collect();
            prop_assert_eq!(&after[..split], &before[..split]);
            let mut a = after[split..].to_vec();
            let mut b = before[split..].to_vec();
            a.sort();
            b.sort();
            prop_assert_eq!(a, b);
        }
    }
}

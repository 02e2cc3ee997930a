/// Song storage seam. The patch only calls `load`/`save`; where songs
/// actually live is up to the implementation.
use crate::sequencer::Song;

pub const MEMORY_SLOTS: usize = 8;

pub trait SongStore {
    fn load(&mut self, slot: u8) -> Option<Song>;
    fn save(&mut self, slot: u8, song: &Song);
}

/// Fixed number of in-memory slots; nothing survives the process
#[derive(Debug, Clone)]
pub struct MemorySongStore {
    slots: [Option<Song>; MEMORY_SLOTS],
}

impl MemorySongStore {
    pub fn new() -> Self {
        Self {
            slots: [None; MEMORY_SLOTS],
        }
    }
}

impl Default for MemorySongStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SongStore for MemorySongStore {
    fn load(&mut self, slot: u8) -> Option<Song> {
        self.slots.get(slot as usize).copied().flatten()
    }

    fn save(&mut self, slot: u8, song: &Song) {
        if let Some(entry) = self.slots.get_mut(slot as usize) {
            *entry = Some(*song);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::clock::Timing;

    #[test]
    fn test_save_then_load() {
        let mut store = MemorySongStore::new();
        let mut song = Song::new(&Timing::default());
        song.steps[1].lanes[2].slider = 33;

        assert_eq!(store.load(0), None);
        store.save(0, &song);
        assert_eq!(store.load(0), Some(song));
    }

    #[test]
    fn test_out_of_range_slot() {
        let mut store = MemorySongStore::new();
        let song = Song::new(&Timing::default());
        store.save(200, &song);
        assert_eq!(store.load(200), None);
    }
}

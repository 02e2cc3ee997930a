/// Control database - maps nanoKONTROL2 CC numbers to semantic roles
///
/// The table follows the device's factory CC layout, which has gaps, so
/// lookups go through a binary search rather than direct indexing.
use crate::sequencer::LANE_COUNT;

pub const CC_COUNT: usize = 51;
pub const LIGHT_COUNT: usize = 30;
pub const UNIQUE_COUNT: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcGroup {
    Slider,
    Knob,
    Record,
    Mute,
    Solo,
    /// Generic transport group. The nanoKONTROL2 layout routes its transport
    /// keys through the unique groups, so no table entry uses it.
    Transport,
    UniqueLit,
    UniqueUnlit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UniqueId {
    SongL,
    SongR,
    MenuClick,
    MenuL,
    MenuR,
    Shift,
    Rewind,
    FastForward,
    Stop,
    Play,
    Rec,
}

impl UniqueId {
    const ALL: [UniqueId; UNIQUE_COUNT] = [
        UniqueId::SongL,
        UniqueId::SongR,
        UniqueId::MenuClick,
        UniqueId::MenuL,
        UniqueId::MenuR,
        UniqueId::Shift,
        UniqueId::Rewind,
        UniqueId::FastForward,
        UniqueId::Stop,
        UniqueId::Play,
        UniqueId::Rec,
    ];

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEntry {
    pub cc: u8,
    pub group: CcGroup,
    /// Lane index for lane groups, `UniqueId` discriminant for unique groups
    pub id: u8,
    pub light: Option<u8>,
}

impl ControlEntry {
    const fn lane(cc: u8, group: CcGroup, lane: u8) -> Self {
        Self { cc, group, id: lane, light: None }
    }

    const fn unique(cc: u8, group: CcGroup, id: UniqueId) -> Self {
        Self { cc, group, id: id as u8, light: None }
    }

    pub fn unique_id(&self) -> Option<UniqueId> {
        match self.group {
            CcGroup::UniqueLit | CcGroup::UniqueUnlit => UniqueId::from_id(self.id),
            _ => None,
        }
    }

    /// Mute, solo and record buttons light up, as do the lit transport keys
    /// and Play (which is unlit on the device but driven by us).
    const fn is_lightable(&self) -> bool {
        match self.group {
            CcGroup::Mute | CcGroup::Solo | CcGroup::Record | CcGroup::UniqueLit => true,
            CcGroup::UniqueUnlit => self.id == UniqueId::Play as u8,
            _ => false,
        }
    }
}

use CcGroup::*;

const RAW_TABLE: [ControlEntry; CC_COUNT] = [
    ControlEntry::lane(0, Slider, 0),
    ControlEntry::lane(1, Slider, 1),
    ControlEntry::lane(2, Slider, 2),
    ControlEntry::lane(3, Slider, 3),
    ControlEntry::lane(4, Slider, 4),
    ControlEntry::lane(5, Slider, 5),
    ControlEntry::lane(6, Slider, 6),
    ControlEntry::lane(7, Slider, 7),
    ControlEntry::lane(16, Knob, 0),
    ControlEntry::lane(17, Knob, 1),
    ControlEntry::lane(18, Knob, 2),
    ControlEntry::lane(19, Knob, 3),
    ControlEntry::lane(20, Knob, 4),
    ControlEntry::lane(21, Knob, 5),
    ControlEntry::lane(22, Knob, 6),
    ControlEntry::lane(23, Knob, 7),
    ControlEntry::lane(32, Solo, 0),
    ControlEntry::lane(33, Solo, 1),
    ControlEntry::lane(34, Solo, 2),
    ControlEntry::lane(35, Solo, 3),
    ControlEntry::lane(36, Solo, 4),
    ControlEntry::lane(37, Solo, 5),
    ControlEntry::lane(38, Solo, 6),
    ControlEntry::lane(39, Solo, 7),
    ControlEntry::unique(41, UniqueUnlit, UniqueId::Play),
    ControlEntry::unique(42, UniqueLit, UniqueId::Stop),
    ControlEntry::unique(43, UniqueLit, UniqueId::Rewind),
    ControlEntry::unique(44, UniqueLit, UniqueId::FastForward),
    ControlEntry::unique(45, UniqueLit, UniqueId::Rec),
    ControlEntry::unique(46, UniqueLit, UniqueId::Shift),
    ControlEntry::lane(48, Mute, 0),
    ControlEntry::lane(49, Mute, 1),
    ControlEntry::lane(50, Mute, 2),
    ControlEntry::lane(51, Mute, 3),
    ControlEntry::lane(52, Mute, 4),
    ControlEntry::lane(53, Mute, 5),
    ControlEntry::lane(54, Mute, 6),
    ControlEntry::lane(55, Mute, 7),
    ControlEntry::unique(58, UniqueUnlit, UniqueId::SongL),
    ControlEntry::unique(59, UniqueUnlit, UniqueId::SongR),
    ControlEntry::unique(60, UniqueUnlit, UniqueId::MenuClick),
    ControlEntry::unique(61, UniqueUnlit, UniqueId::MenuL),
    ControlEntry::unique(62, UniqueUnlit, UniqueId::MenuR),
    ControlEntry::lane(64, Record, 0),
    ControlEntry::lane(65, Record, 1),
    ControlEntry::lane(66, Record, 2),
    ControlEntry::lane(67, Record, 3),
    ControlEntry::lane(68, Record, 4),
    ControlEntry::lane(69, Record, 5),
    ControlEntry::lane(70, Record, 6),
    ControlEntry::lane(71, Record, 7),
];

const fn assign_lights(mut table: [ControlEntry; CC_COUNT]) -> [ControlEntry; CC_COUNT] {
    let mut i = 0;
    let mut light = 0u8;
    while i < CC_COUNT {
        if table[i].is_lightable() {
            table[i].light = Some(light);
            light += 1;
        }
        i += 1;
    }
    table
}

const fn is_strictly_sorted(table: &[ControlEntry; CC_COUNT]) -> bool {
    let mut i = 1;
    while i < CC_COUNT {
        if table[i - 1].cc >= table[i].cc {
            return false;
        }
        i += 1;
    }
    true
}

const fn count_lights(table: &[ControlEntry; CC_COUNT]) -> usize {
    let mut i = 0;
    let mut n = 0;
    while i < CC_COUNT {
        if table[i].light.is_some() {
            n += 1;
        }
        i += 1;
    }
    n
}

pub static CONTROL_TABLE: [ControlEntry; CC_COUNT] = assign_lights(RAW_TABLE);

const _: () = assert!(is_strictly_sorted(&RAW_TABLE));
const _: () = assert!(count_lights(&assign_lights(RAW_TABLE)) == LIGHT_COUNT);

/// Result of a table search, with the number of probes it took
#[derive(Debug, Clone, Copy)]
pub struct Search {
    pub entry: Option<&'static ControlEntry>,
    pub probes: u8,
}

/// Immutable view over `CONTROL_TABLE` plus the reverse light indices,
/// built once when the patch is constructed.
#[derive(Debug, Clone)]
pub struct ControlDatabase {
    lane_lights: [[Option<u8>; LANE_COUNT]; 3],
    unique_lights: [Option<u8>; UNIQUE_COUNT],
    light_cc: [u8; LIGHT_COUNT],
}

impl ControlDatabase {
    pub fn new() -> Self {
        let mut lane_lights = [[None; LANE_COUNT]; 3];
        let mut unique_lights = [None; UNIQUE_COUNT];
        let mut light_cc = [0; LIGHT_COUNT];

        for entry in CONTROL_TABLE.iter() {
            let Some(light) = entry.light else { continue };
            light_cc[light as usize] = entry.cc;

            if let Some(id) = entry.unique_id() {
                unique_lights[id as usize] = Some(light);
            } else if let Some(row) = Self::lane_row(entry.group) {
                if let Some(slot) = lane_lights[row].get_mut(entry.id as usize) {
                    *slot = Some(light);
                }
            }
        }

        Self {
            lane_lights,
            unique_lights,
            light_cc,
        }
    }

    fn lane_row(group: CcGroup) -> Option<usize> {
        match group {
            CcGroup::Record => Some(0),
            CcGroup::Mute => Some(1),
            CcGroup::Solo => Some(2),
            _ => None,
        }
    }

    pub fn entries(&self) -> &'static [ControlEntry] {
        &CONTROL_TABLE
    }

    pub fn lookup(&self, cc: u8) -> Option<&'static ControlEntry> {
        self.search(cc).entry
    }

    /// Binary search over the CC-sorted table.
    ///
    /// The window is half-open, `[low, high)`, and the probed index is
    /// always excluded from the next window, so the probe strictly changes
    /// every iteration and the loop ends after at most log2(N)+1 probes.
    pub fn search(&self, cc: u8) -> Search {
        let table = &CONTROL_TABLE;
        let mut low = 0usize;
        let mut high = CC_COUNT;
        let mut idx = CC_COUNT / 2;
        let mut probes = 0u8;

        loop {
            probes += 1;
            let entry = &table[idx];
            if cc == entry.cc {
                return Search { entry: Some(entry), probes };
            } else if cc < entry.cc {
                high = idx;
            } else {
                low = idx + 1;
            }
            if low >= high {
                return Search { entry: None, probes };
            }
            let next = low + (high - low) / 2;
            debug_assert_ne!(next, idx);
            idx = next;
        }
    }

    pub fn lane_light(&self, group: CcGroup, lane: usize) -> Option<u8> {
        let row = Self::lane_row(group)?;
        self.lane_lights[row].get(lane).copied().flatten()
    }

    pub fn unique_light(&self, id: UniqueId) -> Option<u8> {
        self.unique_lights[id as usize]
    }

    pub fn light_cc(&self, light: u8) -> Option<u8> {
        self.light_cc.get(light as usize).copied()
    }
}

impl Default for ControlDatabase {
    fn default() -> Self {
        Self::new()
    }
}

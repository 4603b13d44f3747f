//! Core grid types shared across all modules.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Grid coordinates
// ---------------------------------------------------------------------------

/// Identity of a single tile. Assigned by the server and never reassigned.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Stable element identifier used by the rendered surface (`tile-3-7`).
    pub fn element_id(&self) -> String {
        format!("tile-{}-{}", self.x, self.y)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Surface type of a grid cell. Travels on the wire as an integer code.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default)]
pub enum Terrain {
    #[default]
    Grass,
    Water,
    Stone,
    Sapling,
    Tree,
}

impl Terrain {
    /// Map a wire code to a terrain. Unknown codes fall back to grass.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Terrain::Grass,
            1 => Terrain::Water,
            2 => Terrain::Stone,
            3 => Terrain::Sapling,
            4 => Terrain::Tree,
            other => {
                log::debug!("[types] unknown terrain code {}, using grass", other);
                Terrain::Grass
            }
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Terrain::Grass => 0,
            Terrain::Water => 1,
            Terrain::Stone => 2,
            Terrain::Sapling => 3,
            Terrain::Tree => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Terrain::Grass => "grass",
            Terrain::Water => "water",
            Terrain::Stone => "stone",
            Terrain::Sapling => "sapling",
            Terrain::Tree => "tree",
        }
    }

    /// Visual class of a tile element carrying this terrain.
    pub fn class_name(self) -> String {
        format!("tile-{}", self.name())
    }

    /// Single-character glyph for the text renderer.
    pub fn glyph(self) -> char {
        match self {
            Terrain::Grass => '.',
            Terrain::Water => '~',
            Terrain::Stone => '#',
            Terrain::Sapling => 't',
            Terrain::Tree => 'T',
        }
    }
}

impl std::fmt::Display for Terrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Terrain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for Terrain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Terrain::from_code)
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// What an entity is currently doing, as reported by the server.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Moving,
    Working,
    Harvesting,
}

impl Activity {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Activity::Moving,
            2 => Activity::Working,
            3 => Activity::Harvesting,
            _ => Activity::Idle,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Activity::Idle => 0,
            Activity::Moving => 1,
            Activity::Working => 2,
            Activity::Harvesting => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activity::Idle => "idle",
            Activity::Moving => "moving",
            Activity::Working => "working",
            Activity::Harvesting => "harvesting",
        }
    }
}

impl Serialize for Activity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for Activity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Activity::from_code)
    }
}

/// Resources carried by an entity. Missing counters read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub wood: i64,
    #[serde(default)]
    pub food: i64,
}

// ---------------------------------------------------------------------------
// Layout & config
// ---------------------------------------------------------------------------

/// Deterministic mapping from grid coordinates to pixel offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub cell_size: u32,
    pub gap: u32,
    pub padding: u32,
}

impl Layout {
    /// `padding + coord * (cell_size + gap)`, saturating at `u32::MAX`.
    pub fn pixel(&self, coord: u32) -> u32 {
        coord
            .saturating_mul(self.cell_size.saturating_add(self.gap))
            .saturating_add(self.padding)
    }

    /// Top-left pixel position of the cell at `coord`.
    pub fn position(&self, coord: TileCoord) -> (u32, u32) {
        (self.pixel(coord.x), self.pixel(coord.y))
    }

    /// Pixel extent of a `width × height` grid, padding included on both sides.
    pub fn surface_size(&self, width: u32, height: u32) -> (u32, u32) {
        let span = |n: u32| {
            let edges = self.padding.saturating_mul(2);
            if n == 0 {
                edges
            } else {
                n.saturating_mul(self.cell_size)
                    .saturating_add((n - 1).saturating_mul(self.gap))
                    .saturating_add(edges)
            }
        };
        (span(width), span(height))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Side length of one rendered cell in pixels.
    pub cell_size: u32,
    /// Spacing between adjacent cells in pixels.
    pub gap: u32,
    /// Offset of the first cell from the surface edge.
    pub padding: u32,
    /// How long a changed tile stays highlighted.
    pub flash_ms: u64,
}

impl ViewConfig {
    pub fn layout(&self) -> Layout {
        Layout {
            cell_size: self.cell_size,
            gap: self.gap,
            padding: self.padding,
        }
    }

    pub fn flash(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            cell_size: 20,
            gap: 2,
            padding: 10,
            flash_ms: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

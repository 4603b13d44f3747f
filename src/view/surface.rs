//! Rendered surface: a retained element tree keyed by identity.
//!
//! Tiles are keyed by `(x, y)` and entities by server id. Patching touches
//! only the addressed element; everything else is left alone. Apart from the
//! transient change highlight, the surface is always exactly what
//! [`RenderSurface::rebuild`] would produce from the current model.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::protocol::EntityState;
use crate::types::{Activity, Inventory, Layout, Terrain, TileCoord};

use super::model::WorldModel;

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileElement {
    /// `tile-{x}-{y}`
    pub element_id: String,
    pub coord: TileCoord,
    pub terrain: Terrain,
    pub left: u32,
    pub top: u32,
    /// Set while the tile is highlighted after a change.
    pub flash_until: Option<Instant>,
}

impl TileElement {
    fn new(coord: TileCoord, terrain: Terrain, layout: &Layout) -> Self {
        let (left, top) = layout.position(coord);
        Self {
            element_id: coord.element_id(),
            coord,
            terrain,
            left,
            top,
            flash_until: None,
        }
    }

    /// Class list as a page would carry it: `tile tile-stone [flash]`.
    pub fn class_list(&self) -> String {
        let mut class = format!("tile {}", self.terrain.class_name());
        if self.flash_until.is_some() {
            class.push_str(" flash");
        }
        class
    }

    pub fn is_flashing(&self) -> bool {
        self.flash_until.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityElement {
    /// `entity-{id}`
    pub element_id: String,
    pub entity_id: String,
    pub coord: TileCoord,
    pub left: u32,
    pub top: u32,
    pub activity: Activity,
    pub inventory: Inventory,
}

impl EntityElement {
    fn new(entity: &EntityState, layout: &Layout) -> Self {
        let mut el = Self {
            element_id: format!("entity-{}", entity.id),
            entity_id: entity.id.clone(),
            coord: entity.coord(),
            left: 0,
            top: 0,
            activity: Activity::Idle,
            inventory: Inventory::default(),
        };
        el.sync(entity, layout);
        el
    }

    fn sync(&mut self, entity: &EntityState, layout: &Layout) {
        self.coord = entity.coord();
        let (left, top) = layout.position(self.coord);
        self.left = left;
        self.top = top;
        self.activity = entity.state.unwrap_or_default();
        self.inventory = entity.inventory.unwrap_or_default();
    }

    pub fn class_list(&self) -> String {
        let mut class = format!("entity entity-{}", self.activity.name());
        if self.inventory.wood > 0 {
            class.push_str(" carrying");
        }
        class
    }

    /// Short caption drawn next to the entity.
    pub fn label(&self) -> String {
        format!("{} w{} f{}", self.entity_id, self.inventory.wood, self.inventory.food)
    }
}

/// Result of [`RenderSurface::upsert_entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPatch {
    Created,
    Updated,
}

// ---------------------------------------------------------------------------
// Snapshot (for comparison, ignores highlight)
// ---------------------------------------------------------------------------

/// Flash-free, comparable rendering of the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSnapshot {
    pub size: (u32, u32),
    /// `(element_id, left, top, terrain code)`
    pub tiles: Vec<(String, u32, u32, i64)>,
    /// `(element_id, left, top, class list)`
    pub entities: Vec<(String, u32, u32, String)>,
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RenderSurface {
    layout: Layout,
    flash: Duration,
    size: (u32, u32),
    dimensions: (u32, u32),
    tiles: BTreeMap<TileCoord, TileElement>,
    entities: BTreeMap<String, EntityElement>,
}

impl RenderSurface {
    pub fn new(layout: Layout, flash: Duration) -> Self {
        Self {
            layout,
            flash,
            size: layout.surface_size(0, 0),
            dimensions: (0, 0),
            tiles: BTreeMap::new(),
            entities: BTreeMap::new(),
        }
    }

    /// Throw away every element and materialise the model from scratch.
    ///
    /// The new element set is built first and swapped in whole.
    pub fn rebuild(&mut self, model: &WorldModel) {
        let dimensions = model.dimensions().unwrap_or((0, 0));
        let tiles = model
            .tiles()
            .map(|(coord, terrain)| (coord, TileElement::new(coord, terrain, &self.layout)))
            .collect();
        let entities = model
            .entities()
            .map(|e| (e.id.clone(), EntityElement::new(e, &self.layout)))
            .collect();

        self.dimensions = dimensions;
        self.size = self.layout.surface_size(dimensions.0, dimensions.1);
        self.tiles = tiles;
        self.entities = entities;
    }

    /// Repaint one existing tile and start its highlight.
    ///
    /// Returns `false` (and does nothing) when no element exists at `coord`.
    pub fn patch_tile(&mut self, coord: TileCoord, terrain: Terrain, now: Instant) -> bool {
        match self.tiles.get_mut(&coord) {
            Some(el) => {
                el.terrain = terrain;
                el.flash_until = Some(now + self.flash);
                true
            }
            None => false,
        }
    }

    /// Create the element on first sight, otherwise move/restyle it in place.
    /// Entity elements are never destroyed here.
    pub fn upsert_entity(&mut self, entity: &EntityState) -> EntityPatch {
        match self.entities.get_mut(&entity.id) {
            Some(el) => {
                el.sync(entity, &self.layout);
                EntityPatch::Updated
            }
            None => {
                self.entities
                    .insert(entity.id.clone(), EntityElement::new(entity, &self.layout));
                EntityPatch::Created
            }
        }
    }

    /// Clear every highlight whose interval has elapsed. Returns how many.
    pub fn expire_flashes(&mut self, now: Instant) -> usize {
        let mut reverted = 0;
        for el in self.tiles.values_mut() {
            if el.flash_until.is_some_and(|until| until <= now) {
                el.flash_until = None;
                reverted += 1;
            }
        }
        reverted
    }

    /// Earliest pending highlight expiry, if any.
    pub fn next_flash_deadline(&self) -> Option<Instant> {
        self.tiles.values().filter_map(|el| el.flash_until).min()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&TileElement> {
        self.tiles.get(&coord)
    }

    pub fn tile_elements(&self) -> impl Iterator<Item = &TileElement> + '_ {
        self.tiles.values()
    }

    pub fn entity(&self, id: &str) -> Option<&EntityElement> {
        self.entities.get(id)
    }

    pub fn entity_elements(&self) -> impl Iterator<Item = &EntityElement> + '_ {
        self.entities.values()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            size: self.size,
            tiles: self
                .tiles
                .values()
                .map(|t| (t.element_id.clone(), t.left, t.top, t.terrain.code()))
                .collect(),
            entities: self
                .entities
                .values()
                .map(|e| (e.element_id.clone(), e.left, e.top, e.class_list()))
                .collect(),
        }
    }

    /// Draw the grid as text: one glyph per cell, `@` where an entity stands,
    /// a space for cells the server never described.
    pub fn render_text(&self) -> String {
        let (width, height) = self.dimensions;
        let cells = (width as usize + 1).saturating_mul(height as usize);
        let mut out = String::with_capacity(cells.min(1 << 20));
        for y in 0..height {
            for x in 0..width {
                let coord = TileCoord::new(x, y);
                let occupied = self.entities.values().any(|e| e.coord == coord);
                let glyph = match (occupied, self.tiles.get(&coord)) {
                    (true, _) => '@',
                    (false, Some(el)) => el.terrain.glyph(),
                    (false, None) => ' ',
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{InitPayload, TileState};
    use crate::types::ViewConfig;

    fn surface() -> RenderSurface {
        let cfg = ViewConfig::default();
        RenderSurface::new(cfg.layout(), cfg.flash())
    }

    fn model_2x2() -> WorldModel {
        let mut m = WorldModel::new();
        m.apply_init(InitPayload {
            room_id: None,
            width: 2,
            height: 2,
            tiles: vec![
                TileState { x: 0, y: 0, terrain: Terrain::Water },
                TileState { x: 1, y: 0, terrain: Terrain::Grass },
                TileState { x: 0, y: 1, terrain: Terrain::Stone },
                TileState { x: 1, y: 1, terrain: Terrain::Tree },
            ],
            entities: vec![EntityState {
                id: "g1".into(),
                x: 1,
                y: 1,
                inventory: None,
                state: None,
            }],
            resources: None,
        });
        m
    }

    #[test]
    fn rebuild_materialises_every_tile_and_entity() {
        let mut s = surface();
        s.rebuild(&model_2x2());
        assert_eq!(s.tile_count(), 4);
        assert_eq!(s.entity_count(), 1);

        let t = s.tile(TileCoord::new(1, 1)).unwrap();
        assert_eq!(t.element_id, "tile-1-1");
        assert_eq!((t.left, t.top), (32, 32));
        assert_eq!(t.class_list(), "tile tile-tree");
    }

    #[test]
    fn patch_unknown_tile_is_noop() {
        let mut s = surface();
        s.rebuild(&model_2x2());
        let before = s.snapshot();
        assert!(!s.patch_tile(TileCoord::new(9, 9), Terrain::Water, Instant::now()));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn flash_reverts_after_interval() {
        let mut s = surface();
        s.rebuild(&model_2x2());
        let t0 = Instant::now();
        assert!(s.patch_tile(TileCoord::new(1, 0), Terrain::Stone, t0));

        let el = s.tile(TileCoord::new(1, 0)).unwrap();
        assert_eq!(el.class_list(), "tile tile-stone flash");
        assert_eq!(s.next_flash_deadline(), Some(t0 + Duration::from_millis(200)));

        assert_eq!(s.expire_flashes(t0 + Duration::from_millis(199)), 0);
        assert_eq!(s.expire_flashes(t0 + Duration::from_millis(200)), 1);
        assert_eq!(
            s.tile(TileCoord::new(1, 0)).unwrap().class_list(),
            "tile tile-stone"
        );
        assert_eq!(s.next_flash_deadline(), None);
    }

    #[test]
    fn upsert_entity_creates_once_then_moves() {
        let mut s = surface();
        s.rebuild(&model_2x2());
        let mut g = EntityState {
            id: "g2".into(),
            x: 0,
            y: 0,
            inventory: None,
            state: None,
        };
        assert_eq!(s.upsert_entity(&g), EntityPatch::Created);
        g.x = 1;
        g.inventory = Some(Inventory { wood: 2, food: 0 });
        assert_eq!(s.upsert_entity(&g), EntityPatch::Updated);

        assert_eq!(s.entity_count(), 2);
        let el = s.entity("g2").unwrap();
        assert_eq!((el.left, el.top), (32, 10));
        assert_eq!(el.class_list(), "entity entity-idle carrying");
        assert_eq!(el.label(), "g2 w2 f0");
    }

    #[test]
    fn text_rendering_marks_entities() {
        let mut s = surface();
        s.rebuild(&model_2x2());
        assert_eq!(s.render_text(), "~.\n#@\n");
    }
}

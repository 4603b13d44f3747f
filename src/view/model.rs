//! `WorldModel` – local mirror of the room's grid and entities.
//!
//! Lives inside [`WorldView`](super::WorldView) and is only ever touched from
//! the single event-loop thread.

use std::collections::BTreeMap;

use crate::protocol::{EntityState, InitPayload, UpdatePayload};
use crate::types::{Terrain, TileCoord};

// ---------------------------------------------------------------------------
// Change summary
// ---------------------------------------------------------------------------

/// What an `update` actually touched, in payload order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModelChanges {
    /// Known tiles whose terrain was (re)written.
    pub tiles: Vec<(TileCoord, Terrain)>,
    /// Tile deltas ignored because the coordinate was never seen in `init`.
    pub skipped_tiles: usize,
    /// Entities seen for the first time.
    pub spawned: Vec<String>,
    /// Entities that already existed and were patched.
    pub updated: Vec<String>,
    /// Entity deltas ignored because they point outside the grid.
    pub skipped_entities: usize,
    pub resources_changed: bool,
}

impl ModelChanges {
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
            && self.spawned.is_empty()
            && self.updated.is_empty()
            && !self.resources_changed
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorldModel {
    room_id: Option<String>,
    /// `(width, height)` from the last `init`; `None` before the first one.
    dimensions: Option<(u32, u32)>,
    tiles: BTreeMap<TileCoord, Terrain>,
    entities: BTreeMap<String, EntityState>,
    resources: BTreeMap<String, i64>,
}

impl WorldModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Replace everything from a snapshot.
    ///
    /// The next model is assembled on the side and swapped in, so no reader
    /// ever sees a half-applied reset. Tiles outside `width × height` are
    /// dropped, as are entities standing outside it.
    pub fn apply_init(&mut self, payload: InitPayload) {
        let (width, height) = (payload.width, payload.height);

        let mut tiles = BTreeMap::new();
        let mut dropped = 0usize;
        for tile in payload.tiles {
            if tile.x < width && tile.y < height {
                tiles.insert(tile.coord(), tile.terrain);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::warn!(
                "[model] init dropped {} tile(s) outside {}x{}",
                dropped,
                width,
                height
            );
        }

        let (entities, outside): (Vec<_>, Vec<_>) = payload
            .entities
            .into_iter()
            .partition(|e| e.x < width && e.y < height);
        if !outside.is_empty() {
            log::warn!(
                "[model] init dropped {} entit(ies) outside {}x{}",
                outside.len(),
                width,
                height
            );
        }
        let entities = entities.into_iter().map(|e| (e.id.clone(), e)).collect();

        *self = WorldModel {
            room_id: payload.room_id,
            dimensions: Some((width, height)),
            tiles,
            entities,
            resources: payload.resources.unwrap_or_default(),
        };
    }

    /// Patch from a delta. Only tiles already known are written; entities
    /// are inserted on first sight and patched in place afterwards.
    pub fn apply_update(&mut self, payload: &UpdatePayload) -> ModelChanges {
        let mut changes = ModelChanges::default();

        for delta in payload.tiles.iter().flatten() {
            let coord = delta.coord();
            match self.tiles.get_mut(&coord) {
                Some(terrain) => {
                    *terrain = delta.terrain;
                    changes.tiles.push((coord, delta.terrain));
                }
                None => changes.skipped_tiles += 1,
            }
        }
        if changes.skipped_tiles > 0 {
            log::debug!(
                "[model] ignored {} delta(s) for unknown tiles",
                changes.skipped_tiles
            );
        }

        for delta in payload.entities.iter().flatten() {
            if !self.contains(delta.coord()) {
                log::warn!(
                    "[model] ignored entity {} at {} outside the grid",
                    delta.id,
                    delta.coord()
                );
                changes.skipped_entities += 1;
                continue;
            }
            match self.entities.get_mut(&delta.id) {
                Some(existing) => {
                    existing.x = delta.x;
                    existing.y = delta.y;
                    if delta.inventory.is_some() {
                        existing.inventory = delta.inventory;
                    }
                    if delta.state.is_some() {
                        existing.state = delta.state;
                    }
                    changes.updated.push(delta.id.clone());
                }
                None => {
                    self.entities.insert(delta.id.clone(), delta.clone());
                    changes.spawned.push(delta.id.clone());
                }
            }
        }

        if let Some(resources) = &payload.resources {
            self.resources = resources.clone();
            changes.resources_changed = true;
        }

        changes
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether `coord` lies inside the last `init`'s `width × height`.
    pub fn contains(&self, coord: TileCoord) -> bool {
        self.dimensions
            .is_some_and(|(width, height)| coord.x < width && coord.y < height)
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn is_initialised(&self) -> bool {
        self.dimensions.is_some()
    }

    pub fn terrain_at(&self, coord: TileCoord) -> Option<Terrain> {
        self.tiles.get(&coord).copied()
    }

    pub fn has_tile(&self, coord: TileCoord) -> bool {
        self.tiles.contains_key(&coord)
    }

    pub fn tiles(&self) -> impl Iterator<Item = (TileCoord, Terrain)> + '_ {
        self.tiles.iter().map(|(c, t)| (*c, *t))
    }

    pub fn entity(&self, id: &str) -> Option<&EntityState> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityState> + '_ {
        self.entities.values()
    }

    pub fn resources(&self) -> &BTreeMap<String, i64> {
        &self.resources
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TileState;
    use crate::types::{Activity, Inventory};

    fn tile(x: u32, y: u32, terrain: Terrain) -> TileState {
        TileState { x, y, terrain }
    }

    fn entity(id: &str, x: u32, y: u32) -> EntityState {
        EntityState {
            id: id.into(),
            x,
            y,
            inventory: None,
            state: None,
        }
    }

    fn grid(width: u32, height: u32) -> InitPayload {
        let mut tiles = Vec::new();
        for y in 0..height {
            for x in 0..width {
                tiles.push(tile(x, y, Terrain::Grass));
            }
        }
        InitPayload {
            room_id: Some("lobby".into()),
            width,
            height,
            tiles,
            entities: vec![],
            resources: None,
        }
    }

    // ---------------------------------------------------------------
    // init
    // ---------------------------------------------------------------

    #[test]
    fn init_replaces_everything() {
        let mut m = WorldModel::new();
        let mut first = grid(3, 3);
        first.entities.push(entity("g1", 0, 0));
        m.apply_init(first);
        assert_eq!(m.tile_count(), 9);
        assert_eq!(m.entity_count(), 1);

        m.apply_init(grid(2, 1));
        assert_eq!(m.dimensions(), Some((2, 1)));
        assert_eq!(m.tile_count(), 2);
        assert_eq!(m.entity_count(), 0);
        assert!(!m.has_tile(TileCoord::new(2, 2)));
    }

    #[test]
    fn init_drops_out_of_bounds_tiles() {
        let mut m = WorldModel::new();
        let mut p = grid(1, 1);
        p.tiles.push(tile(5, 5, Terrain::Tree));
        m.apply_init(p);
        assert_eq!(m.tile_count(), 1);
        assert_eq!(m.terrain_at(TileCoord::new(5, 5)), None);
    }

    #[test]
    fn init_twice_is_idempotent() {
        let mut a = WorldModel::new();
        let mut p = grid(2, 2);
        p.entities.push(entity("g1", 1, 1));
        a.apply_init(p.clone());
        let once = a.clone();
        a.apply_init(p);
        assert_eq!(a, once);
    }

    // ---------------------------------------------------------------
    // update: tiles
    // ---------------------------------------------------------------

    #[test]
    fn update_rewrites_only_referenced_tiles() {
        let mut m = WorldModel::new();
        m.apply_init(grid(2, 2));
        let before = m.clone();

        let changes = m.apply_update(&UpdatePayload {
            tiles: Some(vec![tile(1, 0, Terrain::Stone)]),
            ..Default::default()
        });

        assert_eq!(changes.tiles, vec![(TileCoord::new(1, 0), Terrain::Stone)]);
        for (coord, terrain) in before.tiles() {
            if coord == TileCoord::new(1, 0) {
                assert_eq!(m.terrain_at(coord), Some(Terrain::Stone));
            } else {
                assert_eq!(m.terrain_at(coord), Some(terrain));
            }
        }
    }

    #[test]
    fn update_never_introduces_tiles() {
        let mut m = WorldModel::new();
        m.apply_init(grid(1, 1));
        let changes = m.apply_update(&UpdatePayload {
            tiles: Some(vec![tile(4, 4, Terrain::Water)]),
            ..Default::default()
        });
        assert_eq!(changes.skipped_tiles, 1);
        assert!(changes.is_empty());
        assert_eq!(m.tile_count(), 1);
    }

    #[test]
    fn update_before_init_is_noop_for_tiles() {
        let mut m = WorldModel::new();
        let changes = m.apply_update(&UpdatePayload {
            tiles: Some(vec![tile(0, 0, Terrain::Water)]),
            ..Default::default()
        });
        assert_eq!(changes.skipped_tiles, 1);
        assert_eq!(m.tile_count(), 0);
    }

    // ---------------------------------------------------------------
    // update: entities
    // ---------------------------------------------------------------

    #[test]
    fn entity_first_sight_inserts_then_patches() {
        let mut m = WorldModel::new();
        m.apply_init(grid(3, 3));

        let first = m.apply_update(&UpdatePayload {
            entities: Some(vec![entity("g1", 0, 0)]),
            ..Default::default()
        });
        assert_eq!(first.spawned, vec!["g1".to_string()]);

        let second = m.apply_update(&UpdatePayload {
            entities: Some(vec![entity("g1", 2, 1)]),
            ..Default::default()
        });
        assert_eq!(second.updated, vec!["g1".to_string()]);
        assert_eq!(m.entity_count(), 1);
        assert_eq!(m.entity("g1").unwrap().coord(), TileCoord::new(2, 1));
    }

    #[test]
    fn entity_partial_delta_keeps_inventory_and_state() {
        let mut m = WorldModel::new();
        let mut p = grid(2, 2);
        let mut g = entity("g1", 0, 0);
        g.inventory = Some(Inventory { wood: 3, food: 1 });
        g.state = Some(Activity::Harvesting);
        p.entities.push(g);
        m.apply_init(p);

        m.apply_update(&UpdatePayload {
            entities: Some(vec![entity("g1", 1, 0)]),
            ..Default::default()
        });
        let g = m.entity("g1").unwrap();
        assert_eq!(g.inventory, Some(Inventory { wood: 3, food: 1 }));
        assert_eq!(g.state, Some(Activity::Harvesting));
    }

    #[test]
    fn absent_entity_is_not_removed() {
        let mut m = WorldModel::new();
        let mut p = grid(2, 2);
        p.entities.push(entity("g1", 0, 0));
        p.entities.push(entity("g2", 1, 1));
        m.apply_init(p);

        m.apply_update(&UpdatePayload {
            entities: Some(vec![entity("g1", 1, 0)]),
            ..Default::default()
        });
        assert_eq!(m.entity_count(), 2);
        assert!(m.entity("g2").is_some());
    }

    #[test]
    fn entity_outside_grid_is_ignored() {
        let mut m = WorldModel::new();
        let mut p = grid(2, 2);
        p.entities.push(entity("g1", 0, 0));
        p.entities.push(entity("far", 9, 0));
        m.apply_init(p);
        assert_eq!(m.entity_count(), 1);
        assert!(m.entity("far").is_none());

        let before = m.clone();
        let changes = m.apply_update(&UpdatePayload {
            entities: Some(vec![entity("g1", 300_000_000, 0), entity("g2", 0, 2)]),
            ..Default::default()
        });
        assert_eq!(changes.skipped_entities, 2);
        assert!(changes.is_empty());
        assert_eq!(m, before);
    }

    #[test]
    fn entity_update_before_init_is_ignored() {
        let mut m = WorldModel::new();
        let changes = m.apply_update(&UpdatePayload {
            entities: Some(vec![entity("g1", 0, 0)]),
            ..Default::default()
        });
        assert_eq!(changes.skipped_entities, 1);
        assert_eq!(m.entity_count(), 0);
    }

    // ---------------------------------------------------------------
    // resources
    // ---------------------------------------------------------------

    #[test]
    fn resources_replaced_only_when_present() {
        let mut m = WorldModel::new();
        let mut p = grid(1, 1);
        p.resources = Some(BTreeMap::from([("wood".to_string(), 4)]));
        m.apply_init(p);
        assert_eq!(m.resources()["wood"], 4);

        let changes = m.apply_update(&UpdatePayload::default());
        assert!(!changes.resources_changed);
        assert_eq!(m.resources()["wood"], 4);

        m.apply_update(&UpdatePayload {
            resources: Some(BTreeMap::from([("wood".to_string(), 9)])),
            ..Default::default()
        });
        assert_eq!(m.resources()["wood"], 9);
    }
}

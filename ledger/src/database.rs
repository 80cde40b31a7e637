// ═══════════════════════════════════════════════════════════════════════
// Ledger — SQLite storage for users, recorded routes and territories
//
// Territory geometry is stored as GeoJSON text, route traces as JSON
// `[[lat, lng], ...]`. Every resolution is written in one transaction so
// a failure can never leave a rival deleted without its replacement, or
// a total that disagrees with the territory rows.
// ═══════════════════════════════════════════════════════════════════════

use crate::error::{LedgerError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use turf_engine::aggregate;
use turf_engine::corridor::route_length_m;
use turf_engine::geojson;
use turf_engine::geometry::region_area;
use turf_engine::types::*;
use turf_engine::{Board, EngineConfig, EngineError, ResolutionResult};

/// Territory colours handed out by registration order.
pub const USER_COLORS: [&str; 10] = [
    "#10b981", "#3b82f6", "#f43f5e", "#a855f7", "#f97316",
    "#06b6d4", "#ec4899", "#84cc16", "#8b5cf6", "#0ea5e9",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub color: String,
    pub total_area: f64,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub rank: usize,
    pub user: UserId,
    pub username: String,
    pub color: String,
    pub total_area: f64,
    pub territories: u32,
}

/// A stored value that disagrees with what the territory rows imply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Discrepancy {
    Total { user: UserId, stored: f64, derived: f64 },
    CachedArea { territory: TerritoryId, stored: f64, derived: f64 },
}

pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Open (or create) a ledger at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let ledger = Ledger { conn: Connection::open(path)? };
        ledger.create_schema()?;
        Ok(ledger)
    }

    /// In-memory ledger (useful for tests and throwaway simulations).
    pub fn in_memory() -> Result<Self> {
        let ledger = Ledger { conn: Connection::open_in_memory()? };
        ledger.create_schema()?;
        Ok(ledger)
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch("
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id          INTEGER PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                name        TEXT NOT NULL,
                color       TEXT NOT NULL,
                total_area  REAL NOT NULL DEFAULT 0.0
            );

            CREATE TABLE IF NOT EXISTS routes (
                id          INTEGER PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                name        TEXT NOT NULL,
                coordinates TEXT NOT NULL,
                distance    REAL NOT NULL,
                recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS territories (
                id          INTEGER PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                route_id    INTEGER NOT NULL REFERENCES routes(id),
                geometry    TEXT NOT NULL,
                area        REAL NOT NULL
            );
        ")?;
        Ok(())
    }

    // ── Users ──────────────────────────────────────────────────────────

    /// Register a user. Colours cycle through the palette in sign-up order.
    pub fn create_user(&self, username: &str, name: &str) -> Result<User> {
        let taken: Option<i64> = self.conn.query_row(
            "SELECT id FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        ).optional()?;
        if taken.is_some() {
            return Err(LedgerError::DuplicateUsername(username.to_string()));
        }

        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let color = USER_COLORS[count as usize % USER_COLORS.len()];
        self.conn.execute(
            "INSERT INTO users (username, name, color) VALUES (?1, ?2, ?3)",
            params![username, name, color],
        )?;
        Ok(User {
            id: UserId(self.conn.last_insert_rowid() as u64),
            username: username.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            total_area: 0.0,
        })
    }

    pub fn users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, name, color, total_area FROM users ORDER BY id"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(User {
                id: UserId(row.get::<_, i64>(0)? as u64),
                username: row.get(1)?,
                name: row.get(2)?,
                color: row.get(3)?,
                total_area: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn user(&self, id: UserId) -> Result<User> {
        self.users()?
            .into_iter()
            .find(|u| u.id == id)
            .ok_or(LedgerError::UnknownUser(id))
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users()?.into_iter().find(|u| u.username == username))
    }

    // ── Routes ─────────────────────────────────────────────────────────

    /// Store a completed route. Happens before any conquest so the route
    /// survives whatever the geometry does.
    pub fn record_route(&self, user: UserId, name: &str, coordinates: &[Coordinate]) -> Result<RouteId> {
        let exists: Option<i64> = self.conn.query_row(
            "SELECT id FROM users WHERE id = ?1",
            params![user.0 as i64],
            |row| row.get(0),
        ).optional()?;
        if exists.is_none() {
            return Err(LedgerError::UnknownUser(user));
        }

        let distance = if coordinates.iter().all(Coordinate::is_finite) { route_length_m(coordinates) } else { 0.0 };
        self.conn.execute(
            "INSERT INTO routes (user_id, name, coordinates, distance) VALUES (?1, ?2, ?3, ?4)",
            params![user.0 as i64, name, serde_json::to_string(coordinates)?, distance],
        )?;
        Ok(RouteId(self.conn.last_insert_rowid() as u64))
    }

    pub fn route_coordinates(&self, route: RouteId) -> Result<Option<Vec<Coordinate>>> {
        let raw: Option<String> = self.conn.query_row(
            "SELECT coordinates FROM routes WHERE id = ?1",
            params![route.0 as i64],
            |row| row.get(0),
        ).optional()?;
        raw.map(|json| serde_json::from_str(&json).map_err(LedgerError::from)).transpose()
    }

    pub fn route_count(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM routes", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    // ── Territories ────────────────────────────────────────────────────

    pub fn territory_count(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM territories", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// All territories, ascending id.
    pub fn territories(&self) -> Result<Vec<Territory>> {
        self.query_territories("SELECT id, user_id, route_id, geometry, area FROM territories ORDER BY id", None)
    }

    pub fn territories_for_user(&self, user: UserId) -> Result<Vec<Territory>> {
        self.query_territories(
            "SELECT id, user_id, route_id, geometry, area FROM territories WHERE user_id = ?1 ORDER BY id",
            Some(user),
        )
    }

    fn query_territories(&self, sql: &str, user: Option<UserId>) -> Result<Vec<Territory>> {
        let mut stmt = self.conn.prepare(sql)?;
        let decode = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(i64, i64, i64, String, f64)> {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
            ))
        };
        let raw = match user {
            Some(u) => stmt.query_map(params![u.0 as i64], decode)?.collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], decode)?.collect::<rusqlite::Result<Vec<_>>>()?,
        };

        raw.into_iter()
            .map(|(id, owner, route_id, geometry, area)| {
                let value: serde_json::Value = serde_json::from_str(&geometry)?;
                Ok(Territory {
                    id: TerritoryId(id as u64),
                    owner: UserId(owner as u64),
                    route_id: RouteId(route_id as u64),
                    geometry: geojson::from_geojson(&value)?,
                    area,
                })
            })
            .collect()
    }

    /// Snapshot of every territory for one resolution.
    pub fn load_board(&self) -> Result<Board> {
        Ok(Board::from_territories(self.territories()?))
    }

    /// Persist a mutation set. Deletes, inserts and total writes happen
    /// in one transaction; if any of them fails nothing is written.
    pub fn apply_resolution(&mut self, result: &ResolutionResult) -> Result<()> {
        let tx = self.conn.transaction()?;

        for id in &result.deleted_territory_ids {
            let removed = tx.execute("DELETE FROM territories WHERE id = ?1", params![id.0 as i64])?;
            if removed == 0 {
                return Err(EngineError::UnknownTerritory(*id).into());
            }
        }

        for t in result.updated_territories.iter().chain(result.created_territory.iter()) {
            tx.execute(
                "INSERT INTO territories (id, user_id, route_id, geometry, area) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    t.id.0 as i64,
                    t.owner.0 as i64,
                    t.route_id.0 as i64,
                    geojson::to_geojson(&t.geometry).to_string(),
                    t.area,
                ],
            )?;
        }

        for (user, total) in &result.affected_user_totals {
            let changed = tx.execute(
                "UPDATE users SET total_area = ?1 WHERE id = ?2",
                params![total, user.0 as i64],
            )?;
            if changed == 0 {
                return Err(LedgerError::UnknownUser(*user));
            }
        }

        tx.commit()?;
        Ok(())
    }

    // ── Aggregates ─────────────────────────────────────────────────────

    pub fn stored_total(&self, user: UserId) -> Result<f64> {
        self.conn.query_row(
            "SELECT total_area FROM users WHERE id = ?1",
            params![user.0 as i64],
            |row| row.get(0),
        ).optional()?
            .ok_or(LedgerError::UnknownUser(user))
    }

    /// Users ranked by total area, largest first; ties go to the earlier
    /// sign-up.
    pub fn leaderboard(&self) -> Result<Vec<Standing>> {
        let mut stmt = self.conn.prepare("
            SELECT u.id, u.username, u.color, u.total_area,
                   (SELECT COUNT(*) FROM territories t WHERE t.user_id = u.id)
            FROM users u
            ORDER BY u.total_area DESC, u.id ASC
        ")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, u32>(4)?,
            ))
        })?.collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows.into_iter()
            .enumerate()
            .map(|(i, (id, username, color, total_area, territories))| Standing {
                rank: i + 1,
                user: UserId(id as u64),
                username,
                color,
                total_area,
                territories,
            })
            .collect())
    }

    /// Compare every stored total against a fresh sum of the user's
    /// territories, and every cached territory area against its geometry.
    pub fn verify_aggregates(&self, config: &EngineConfig) -> Result<Vec<Discrepancy>> {
        let territories = self.territories()?;
        let projection = config.projection();
        let tolerance = config.aggregate_tolerance_m2;
        let mut found = Vec::new();

        for user in self.users()? {
            match aggregate::verify_total(user.id, user.total_area, territories.iter(), tolerance) {
                Ok(_) => {}
                Err(EngineError::InconsistentAggregate { user, stored, derived }) => {
                    found.push(Discrepancy::Total { user, stored, derived });
                }
                Err(e) => return Err(e.into()),
            }
        }

        for t in &territories {
            let derived = region_area(&t.geometry, &projection);
            if (derived - t.area).abs() > tolerance {
                found.push(Discrepancy::CachedArea { territory: t.id, stored: t.area, derived });
            }
        }
        Ok(found)
    }

    #[cfg(test)]
    pub(crate) fn overwrite_total(&self, user: UserId, total: f64) -> Result<()> {
        self.conn.execute("UPDATE users SET total_area = ?1 WHERE id = ?2", params![total, user.0 as i64])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turf_engine::conquest::{submit_route, RouteSubmission};
    use turf_walkers::{loop_around, offset};

    const HOME: Coordinate = Coordinate::new(40.4168, -3.7038);

    fn proj() -> turf_engine::projection::Projection {
        EngineConfig::default().projection()
    }

    fn ledger_with(names: &[&str]) -> (Ledger, Vec<User>) {
        let ledger = Ledger::in_memory().unwrap();
        let users = names.iter().map(|n| ledger.create_user(n, &n.to_uppercase()).unwrap()).collect();
        (ledger, users)
    }

    fn claim(ledger: &mut Ledger, user: UserId, route: Vec<Coordinate>) -> ResolutionResult {
        let route_id = ledger.record_route(user, "loop", &route).unwrap();
        let board = ledger.load_board().unwrap();
        let result = submit_route(&board, &RouteSubmission::new(user, route_id, route), &EngineConfig::default()).unwrap();
        ledger.apply_resolution(&result).unwrap();
        result
    }

    #[test]
    fn colours_cycle_in_signup_order() {
        let names: Vec<String> = (0..12).map(|i| format!("walker{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_, users) = ledger_with(&refs);
        assert_eq!(users[0].color, USER_COLORS[0]);
        assert_eq!(users[3].color, USER_COLORS[3]);
        assert_eq!(users[10].color, USER_COLORS[0]);
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (ledger, _) = ledger_with(&["ana"]);
        assert!(matches!(ledger.create_user("ana", "Other"), Err(LedgerError::DuplicateUsername(_))));
    }

    #[test]
    fn route_is_stored_with_its_distance() {
        let (ledger, users) = ledger_with(&["ana"]);
        let route = vec![HOME, offset(&proj(), HOME, 0.0, 1_000.0)];
        let id = ledger.record_route(users[0].id, "north", &route).unwrap();
        assert_eq!(ledger.route_coordinates(id).unwrap().unwrap(), route);
        let distance: f64 = ledger.conn.query_row("SELECT distance FROM routes WHERE id = ?1", params![id.0 as i64], |r| r.get(0)).unwrap();
        assert!((distance - 1_000.0).abs() < 5.0);
        assert!(matches!(ledger.record_route(UserId(99), "ghost", &route), Err(LedgerError::UnknownUser(_))));
    }

    #[test]
    fn resolution_round_trips_through_storage() {
        let (mut ledger, users) = ledger_with(&["ana", "bea"]);
        let (a, b) = (users[0].id, users[1].id);
        claim(&mut ledger, b, loop_around(&proj(), HOME, 60.0, 10));
        let result = claim(&mut ledger, a, loop_around(&proj(), offset(&proj(), HOME, 90.0, 0.0), 60.0, 10));

        assert_eq!(result.conquests.len(), 1);
        let stored = ledger.territories().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(ledger.territory_count().unwrap(), 2);
        let board = ledger.load_board().unwrap();
        assert_eq!(board.next_territory_id(), result.next_territory_id);
        assert!((ledger.stored_total(b).unwrap() - board.total_area(b)).abs() < 1e-6);
        assert!(ledger.verify_aggregates(&EngineConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn failed_apply_writes_nothing() {
        let (mut ledger, users) = ledger_with(&["ana", "bea"]);
        let (a, b) = (users[0].id, users[1].id);
        claim(&mut ledger, b, loop_around(&proj(), HOME, 60.0, 10));
        let before = ledger.territories().unwrap();

        let route_id = ledger.record_route(a, "stale", &loop_around(&proj(), HOME, 60.0, 10)).unwrap();
        let board = ledger.load_board().unwrap();
        let mut result = submit_route(
            &board,
            &RouteSubmission::new(a, route_id, loop_around(&proj(), HOME, 60.0, 10)),
            &EngineConfig::default(),
        ).unwrap();
        result.deleted_territory_ids.insert(TerritoryId(999));

        assert!(ledger.apply_resolution(&result).is_err());
        assert_eq!(ledger.territories().unwrap(), before);
        assert_eq!(ledger.stored_total(a).unwrap(), 0.0);
    }

    #[test]
    fn leaderboard_ranks_by_area() {
        let (mut ledger, users) = ledger_with(&["ana", "bea", "cai"]);
        claim(&mut ledger, users[0].id, loop_around(&proj(), HOME, 40.0, 8));
        claim(&mut ledger, users[1].id, loop_around(&proj(), offset(&proj(), HOME, 2_000.0, 0.0), 150.0, 12));

        let board = ledger.leaderboard().unwrap();
        let order: Vec<&str> = board.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(order, vec!["bea", "ana", "cai"]);
        assert_eq!(board.iter().map(|s| s.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(board[2].territories, 0);
    }

    #[test]
    fn drifted_total_is_reported() {
        let (mut ledger, users) = ledger_with(&["ana"]);
        claim(&mut ledger, users[0].id, loop_around(&proj(), HOME, 60.0, 10));
        ledger.overwrite_total(users[0].id, 1.0).unwrap();
        let found = ledger.verify_aggregates(&EngineConfig::default()).unwrap();
        assert!(matches!(found.as_slice(), [Discrepancy::Total { stored, .. }] if *stored == 1.0));
    }
}

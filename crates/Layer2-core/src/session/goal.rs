//! Movement goals, movement configuration and coordinates
//!
//! These are the typed values that cross the movement interface of the game
//! client (`pathfinder/*` on the bridge).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 3D coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn plus(&self, other: &Vec3) -> Self {
        self.offset(other.x, other.y, other.z)
    }

    pub fn minus(&self, other: &Vec3) -> Self {
        self.offset(-other.x, -other.y, -other.z)
    }

    pub fn floored(&self) -> Self {
        Self::new(self.x.floor(), self.y.floor(), self.z.floor())
    }

    pub fn distance_to(&self, other: &Vec3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// `{x, y, z}` 형태의 JSON 객체에서 읽기
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self::new(
            obj.get("x")?.as_f64()?,
            obj.get("y")?.as_f64()?,
            obj.get("z")?.as_f64()?,
        ))
    }
}

/// Movement goal
///
/// Serialized as `{"kind": "GoalNear", ...}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Goal {
    /// Follow an entity, staying within `range` blocks
    GoalFollow { entity: Value, range: f64 },
    /// Get within `range` blocks of a point
    GoalNear { x: f64, y: f64, z: f64, range: f64 },
    /// Stand on an exact block
    GoalBlock { x: f64, y: f64, z: f64 },
    /// Reach a column, any height
    #[serde(rename = "GoalXZ")]
    GoalXZ { x: f64, z: f64 },
    /// Reach a height, any column
    GoalY { y: f64 },
    /// Stand next to a block (to interact with it)
    GoalGetToBlock { x: f64, y: f64, z: f64 },
}

impl Goal {
    /// Goal constructor names exposed to scripts as `goals.<name>`
    pub const CONSTRUCTORS: &'static [&'static str] = &[
        "GoalFollow",
        "GoalNear",
        "GoalBlock",
        "GoalXZ",
        "GoalY",
        "GoalGetToBlock",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Goal::GoalFollow { .. } => "GoalFollow",
            Goal::GoalNear { .. } => "GoalNear",
            Goal::GoalBlock { .. } => "GoalBlock",
            Goal::GoalXZ { .. } => "GoalXZ",
            Goal::GoalY { .. } => "GoalY",
            Goal::GoalGetToBlock { .. } => "GoalGetToBlock",
        }
    }

    /// Target point, when the goal has a fixed one
    pub fn target(&self) -> Option<Vec3> {
        match self {
            Goal::GoalNear { x, y, z, .. }
            | Goal::GoalBlock { x, y, z }
            | Goal::GoalGetToBlock { x, y, z } => Some(Vec3::new(*x, *y, *z)),
            Goal::GoalFollow { entity, .. } => entity.get("position").and_then(Vec3::from_value),
            Goal::GoalXZ { .. } | Goal::GoalY { .. } => None,
        }
    }
}

/// Movement configuration (`new Movements(bot)` in scripts)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementConfig {
    #[serde(default = "default_true")]
    pub can_dig: bool,

    #[serde(default = "default_true")]
    pub allow_sprinting: bool,

    #[serde(default)]
    pub allow_parkour: bool,

    #[serde(default = "default_true")]
    pub can_open_doors: bool,

    #[serde(default = "default_true", rename = "allow1by1towers")]
    pub allow_1by1_towers: bool,

    #[serde(default = "default_max_drop_down")]
    pub max_drop_down: u32,

    /// Settings the typed fields do not cover, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            can_dig: true,
            allow_sprinting: true,
            allow_parkour: false,
            can_open_doors: true,
            allow_1by1_towers: true,
            max_drop_down: default_max_drop_down(),
            extra: Map::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_drop_down() -> u32 {
    4
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vec3_math() {
        let a = Vec3::new(1.5, 64.0, -2.5);
        let b = a.offset(3.0, 0.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(a.floored(), Vec3::new(1.0, 64.0, -3.0));
        assert_eq!(b.minus(&a), Vec3::new(3.0, 0.0, 4.0));
    }

    #[test]
    fn test_goal_wire_shape() {
        let goal = Goal::GoalNear {
            x: 10.0,
            y: 64.0,
            z: -5.0,
            range: 1.0,
        };
        let value = serde_json::to_value(&goal).unwrap();
        assert_eq!(value["kind"], json!("GoalNear"));
        assert_eq!(goal.target(), Some(Vec3::new(10.0, 64.0, -5.0)));

        let xz: Goal = serde_json::from_value(json!({"kind": "GoalXZ", "x": 1, "z": 2})).unwrap();
        assert_eq!(xz.kind(), "GoalXZ");
    }

    #[test]
    fn test_movements_passthrough() {
        let config: MovementConfig =
            serde_json::from_value(json!({"canDig": false, "scafoldingBlocks": [1, 2]})).unwrap();
        assert!(!config.can_dig);
        assert!(config.allow_sprinting);
        assert!(config.extra.contains_key("scafoldingBlocks"));
    }
}

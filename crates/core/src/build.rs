//! The car build record and its canonical parts table.
//!
//! A build has five equipment slots that must be filled in a fixed order.
//! Each slot accepts exactly two canonical parts. Anything else stored in a
//! slot (a legacy `-` placeholder, a blank, or an unknown value) counts as
//! not filled.

use serde::{Deserialize, Serialize};

/// An equipment slot, in required fill order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Chassis,
    Engine,
    Tires,
    FrontWing,
    RearWing,
}

impl Slot {
    /// All slots in the order the player must fill them.
    pub const ALL: [Slot; 5] = [
        Slot::Chassis,
        Slot::Engine,
        Slot::Tires,
        Slot::FrontWing,
        Slot::RearWing,
    ];

    /// Lowercase label used in running text ("front wing").
    pub fn label(self) -> &'static str {
        match self {
            Slot::Chassis => "chassis",
            Slot::Engine => "engine",
            Slot::Tires => "tires",
            Slot::FrontWing => "front wing",
            Slot::RearWing => "rear wing",
        }
    }

    /// Capitalized label used in summaries ("Front Wing").
    pub fn title(self) -> &'static str {
        match self {
            Slot::Chassis => "Chassis",
            Slot::Engine => "Engine",
            Slot::Tires => "Tires",
            Slot::FrontWing => "Front Wing",
            Slot::RearWing => "Rear Wing",
        }
    }

    /// The two canonical parts for this slot.
    pub fn options(self) -> [Part; 2] {
        match self {
            Slot::Chassis => [Part::StandardMonocoque, Part::GroundEffectOptimized],
            Slot::Engine => [Part::V10Of2004, Part::V8Of2006],
            Slot::Tires => [Part::C5Slick, Part::FullWet],
            Slot::FrontWing => [Part::HighLift, Part::SimpleOutwash],
            Slot::RearWing => [Part::HighDownforce, Part::LowDrag],
        }
    }

    /// Parse a slot name as typed by a user or stored by older clients
    /// (`front_wing`, `front wing`, `frontWing`).
    pub fn from_name(name: &str) -> Option<Slot> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "chassis" => Some(Slot::Chassis),
            "engine" => Some(Slot::Engine),
            "tires" | "tyres" => Some(Slot::Tires),
            "frontwing" => Some(Slot::FrontWing),
            "rearwing" => Some(Slot::RearWing),
            _ => None,
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A canonical, game-valid part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Part {
    StandardMonocoque,
    GroundEffectOptimized,
    V10Of2004,
    V8Of2006,
    C5Slick,
    FullWet,
    HighLift,
    SimpleOutwash,
    HighDownforce,
    LowDrag,
}

impl Part {
    pub const ALL: [Part; 10] = [
        Part::StandardMonocoque,
        Part::GroundEffectOptimized,
        Part::V10Of2004,
        Part::V8Of2006,
        Part::C5Slick,
        Part::FullWet,
        Part::HighLift,
        Part::SimpleOutwash,
        Part::HighDownforce,
        Part::LowDrag,
    ];

    /// Display name, exactly as the game UI shows it.
    pub fn label(self) -> &'static str {
        match self {
            Part::StandardMonocoque => "Standard Monocoque",
            Part::GroundEffectOptimized => "Ground Effect Optimized",
            Part::V10Of2004 => "2004 V10",
            Part::V8Of2006 => "2006 V8",
            Part::C5Slick => "C5 Slick",
            Part::FullWet => "Full Wet",
            Part::HighLift => "High Lift",
            Part::SimpleOutwash => "Simple Outwash",
            Part::HighDownforce => "High Downforce",
            Part::LowDrag => "Low Drag",
        }
    }

    pub fn slot(self) -> Slot {
        match self {
            Part::StandardMonocoque | Part::GroundEffectOptimized => Slot::Chassis,
            Part::V10Of2004 | Part::V8Of2006 => Slot::Engine,
            Part::C5Slick | Part::FullWet => Slot::Tires,
            Part::HighLift | Part::SimpleOutwash => Slot::FrontWing,
            Part::HighDownforce | Part::LowDrag => Slot::RearWing,
        }
    }

    /// Lowercase phrase that identifies this part in free text.
    ///
    /// Shorter than the label where players (and models) commonly shorten it.
    pub fn phrase(self) -> &'static str {
        match self {
            Part::GroundEffectOptimized => "ground effect",
            Part::StandardMonocoque => "standard monocoque",
            Part::V10Of2004 => "2004 v10",
            Part::V8Of2006 => "2006 v8",
            Part::C5Slick => "c5 slick",
            Part::FullWet => "full wet",
            Part::HighLift => "high lift",
            Part::SimpleOutwash => "simple outwash",
            Part::HighDownforce => "high downforce",
            Part::LowDrag => "low drag",
        }
    }

    /// Match a stored slot value against the canonical options for `slot`.
    pub fn parse(slot: Slot, value: &str) -> Option<Part> {
        let normalized = value.trim().to_lowercase();
        slot.options().into_iter().find(|part| {
            normalized == part.label().to_lowercase() || normalized == part.phrase()
        })
    }
}

impl std::fmt::Display for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What a single slot currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotValue {
    /// Never set.
    Unset,
    /// Legacy "unset" marker: blank or `-`.
    Placeholder,
    /// One of the two canonical parts for the slot.
    Canonical(Part),
    /// Something outside the canonical table. Not progress.
    Invalid(String),
}

impl SlotValue {
    pub fn is_filled(&self) -> bool {
        matches!(self, SlotValue::Canonical(_))
    }
}

/// The latest persisted build for a player.
///
/// Field values are kept as stored; interpretation happens through
/// [`BuildState::slot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    #[serde(default)]
    pub chassis: Option<String>,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub tires: Option<String>,
    #[serde(default, alias = "frontWing")]
    pub front_wing: Option<String>,
    #[serde(default, alias = "rearWing")]
    pub rear_wing: Option<String>,
}

impl BuildState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter with a canonical part.
    pub fn with(mut self, part: Part) -> Self {
        self.set(part.slot(), part.label());
        self
    }

    /// Store a raw value in a slot.
    pub fn set(&mut self, slot: Slot, value: impl Into<String>) {
        *self.field_mut(slot) = Some(value.into());
    }

    /// Clear a slot.
    pub fn clear(&mut self, slot: Slot) {
        *self.field_mut(slot) = None;
    }

    /// The value exactly as stored.
    pub fn raw(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Chassis => self.chassis.as_deref(),
            Slot::Engine => self.engine.as_deref(),
            Slot::Tires => self.tires.as_deref(),
            Slot::FrontWing => self.front_wing.as_deref(),
            Slot::RearWing => self.rear_wing.as_deref(),
        }
    }

    fn field_mut(&mut self, slot: Slot) -> &mut Option<String> {
        match slot {
            Slot::Chassis => &mut self.chassis,
            Slot::Engine => &mut self.engine,
            Slot::Tires => &mut self.tires,
            Slot::FrontWing => &mut self.front_wing,
            Slot::RearWing => &mut self.rear_wing,
        }
    }

    /// Interpret a slot.
    pub fn slot(&self, slot: Slot) -> SlotValue {
        match self.raw(slot) {
            None => SlotValue::Unset,
            Some(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() || trimmed == "-" {
                    SlotValue::Placeholder
                } else if let Some(part) = Part::parse(slot, trimmed) {
                    SlotValue::Canonical(part)
                } else {
                    SlotValue::Invalid(trimmed.to_string())
                }
            }
        }
    }

    /// The canonical part in a slot, if any.
    pub fn part(&self, slot: Slot) -> Option<Part> {
        match self.slot(slot) {
            SlotValue::Canonical(part) => Some(part),
            _ => None,
        }
    }

    /// Filled slots in canonical order.
    pub fn filled(&self) -> Vec<(Slot, Part)> {
        Slot::ALL
            .into_iter()
            .filter_map(|slot| self.part(slot).map(|part| (slot, part)))
            .collect()
    }

    /// The earliest slot that is not filled with a canonical part.
    pub fn first_missing(&self) -> Option<Slot> {
        Slot::ALL
            .into_iter()
            .find(|slot| !self.slot(*slot).is_filled())
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }
}

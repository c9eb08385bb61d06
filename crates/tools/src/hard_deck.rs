//! The hard deck: verified signatures of the standard scripting engine
//! classes, served verbatim so the model does not invent methods.

use serde::Serialize;
use std::collections::BTreeMap;

/// Category name that selects the whole table.
pub const ALL_CATEGORIES: &str = "All";

/// One documented function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SseFunction {
    pub name: &'static str,
    pub description: &'static str,
    pub signatures: &'static [&'static str],
}

const fn entry(
    name: &'static str,
    description: &'static str,
    signatures: &'static [&'static str],
) -> SseFunction {
    SseFunction {
        name,
        description,
        signatures,
    }
}

const GROUP: &[SseFunction] = &[
    entry(
        "Group.getByName",
        "Returns the Group object associated with the provided name string. Returns nil if not found.",
        &["Group.getByName(name: string): Group | nil"],
    ),
    entry(
        "Group.getUnits",
        "Returns an array of Unit objects belonging to the group.",
        &["Group:getUnits(): Unit[]"],
    ),
    entry(
        "Group.destroy",
        "Destroys the group and all of its units from the mission.",
        &["Group:destroy(): void"],
    ),
    entry(
        "Group.activate",
        "Activates a group that was set to 'Late Activation' in the Mission Editor.",
        &["Group:activate(): void"],
    ),
    entry(
        "Group.getID",
        "Returns the unique numeric ID of the group.",
        &["Group:getID(): number"],
    ),
    entry(
        "Group.getName",
        "Returns the string name of the group.",
        &["Group:getName(): string"],
    ),
    entry(
        "Group.getSize",
        "Returns the number of units currently alive in the group.",
        &["Group:getSize(): number"],
    ),
    entry(
        "Group.getUnit",
        "Returns the Unit object at the specified index (1-based).",
        &["Group:getUnit(index: number): Unit | nil"],
    ),
];

const UNIT: &[SseFunction] = &[
    entry(
        "Unit.getByName",
        "Returns the Unit object associated with the provided name string. Returns nil if not found.",
        &["Unit.getByName(name: string): Unit | nil"],
    ),
    entry(
        "Unit.isActive",
        "Returns true if the unit is active (spawned and not destroyed).",
        &["Unit:isActive(): boolean"],
    ),
    entry(
        "Unit.getPoint",
        "Returns the current 3D position (Vec3) of the unit.",
        &["Unit:getPoint(): Vec3"],
    ),
    entry(
        "Unit.getGroup",
        "Returns the parent Group object of the unit.",
        &["Unit:getGroup(): Group"],
    ),
    entry(
        "Unit.getLife",
        "Returns the current health of the unit.",
        &["Unit:getLife(): number"],
    ),
    entry("Unit.destroy", "Destroys the unit instance.", &["Unit:destroy(): void"]),
];

const TIMER: &[SseFunction] = &[
    entry(
        "timer.scheduleFunction",
        "Schedules a function to run at a specific future time. Crucial for loops.",
        &["timer.scheduleFunction(functionToCall, functionArg, time: number): number"],
    ),
    entry(
        "timer.getTime",
        "Returns the current mission time in seconds relative to mission start.",
        &["timer.getTime(): number"],
    ),
    entry(
        "timer.getAbsTime",
        "Returns the absolute time in seconds (including day/month offsets).",
        &["timer.getAbsTime(): number"],
    ),
];

const TRIGGER: &[SseFunction] = &[
    entry(
        "trigger.action.outText",
        "Displays a text message on screen to all players.",
        &["trigger.action.outText(text: string, delay: number, clearView?: boolean): void"],
    ),
    entry(
        "trigger.action.outSound",
        "Plays a sound file to all players.",
        &["trigger.action.outSound(soundFile: string): void"],
    ),
    entry(
        "trigger.misc.getUserFlag",
        "Returns the value of a user flag.",
        &["trigger.misc.getUserFlag(flagName: string): number"],
    ),
    entry(
        "trigger.action.setUserFlag",
        "Sets the value of a user flag.",
        &["trigger.action.setUserFlag(flagName: string, value: number | boolean): void"],
    ),
];

const COALITION: &[SseFunction] = &[
    entry(
        "coalition.getGroups",
        "Returns the groups of a coalition, optionally filtered by group category.",
        &["coalition.getGroups(coalitionId: number, groupCategory?: number): Group[]"],
    ),
    entry(
        "coalition.addGroup",
        "Spawns a group for the given country from a group definition table.",
        &["coalition.addGroup(countryId: number, groupCategory: number, groupData: table): Group"],
    ),
    entry(
        "coalition.getPlayers",
        "Returns the player-controlled units of a coalition.",
        &["coalition.getPlayers(coalitionId: number): Unit[]"],
    ),
];

/// Categories in presentation order.
const CATEGORIES: &[(&str, &[SseFunction])] = &[
    ("Group", GROUP),
    ("Unit", UNIT),
    ("timer", TIMER),
    ("trigger", TRIGGER),
    ("coalition", COALITION),
];

/// Names of all categories, in presentation order.
pub fn categories() -> impl Iterator<Item = &'static str> {
    CATEGORIES.iter().map(|(name, _)| *name)
}

/// Functions of one category. Names match case-insensitively.
pub fn category(name: &str) -> Option<&'static [SseFunction]> {
    CATEGORIES
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
        .map(|(_, functions)| *functions)
}

/// Tool-response text for a category: pretty JSON, or an in-band error
/// naming the valid categories.
pub fn render(name: &str) -> String {
    let json = if name.trim().eq_ignore_ascii_case(ALL_CATEGORIES) {
        let all: BTreeMap<&str, &[SseFunction]> = CATEGORIES.iter().copied().collect();
        serde_json::to_string_pretty(&all)
    } else if let Some(functions) = category(name) {
        serde_json::to_string_pretty(functions)
    } else {
        return format!(
            "ERROR: Category not found in Hard Deck. Available: {}.",
            categories().collect::<Vec<_>>().join(", ")
        );
    };

    json.unwrap_or_else(|e| format!("ERROR: Hard Deck serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let timer = category("TIMER").unwrap();
        assert_eq!(timer[0].name, "timer.scheduleFunction");
        assert!(category("group").is_some());
    }

    #[test]
    fn render_category_is_json_array() {
        let out = render("Unit");
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        let arr = parsed.as_array().unwrap();
        assert_eq!(arr.len(), 6);
        assert_eq!(arr[0]["signatures"][0], "Unit.getByName(name: string): Unit | nil");
    }

    #[test]
    fn render_all_contains_every_category() {
        let parsed: serde_json::Value = serde_json::from_str(&render("All")).unwrap();
        for name in categories() {
            assert!(parsed.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn unknown_category_lists_valid_ones() {
        assert_eq!(
            render("Airbase"),
            "ERROR: Category not found in Hard Deck. Available: Group, Unit, timer, trigger, coalition."
        );
    }
}

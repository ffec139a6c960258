//! Fixed dialog vocabulary: workplaces, problem categories, button labels.
//!
//! These lists are domain data for one deployment. The controller treats them
//! as opaque strings; guards are exact membership checks.

/// The ten recognized workplaces.
pub const WORKPLACES: [&str; 10] = [
    "Office1",
    "Office2",
    "Reception",
    "Managers",
    "Cash Desk",
    "Sales Ops",
    "Logistics",
    "Used Car Salon",
    "Service",
    "Warehouse",
];

/// The eight recognized problem categories.
pub const PROBLEM_CATEGORIES: [&str; 8] = [
    "1C",
    "Printer",
    "Silver",
    "VPN",
    "PC Problems",
    "Cartridge",
    "Cameras",
    "HELP!",
];

// Button labels. Matching on inbound text is exact, so these are the single
// source of truth for both rendering and guards.
pub const BTN_CONFIRM: &str = "✅ Correct";
pub const BTN_REJECT: &str = "✏️ Change";
pub const BTN_NEW_TICKET: &str = "🛠 New ticket";
pub const BTN_EDIT_PROFILE: &str = "👤 Edit profile";
pub const BTN_EDIT_NAME: &str = "Change name";
pub const BTN_EDIT_WORKPLACE: &str = "Change workplace";
pub const BTN_BACK: &str = "⬅️ Back";

pub fn is_valid_workplace(text: &str) -> bool {
    WORKPLACES.contains(&text)
}

pub fn is_valid_problem(text: &str) -> bool {
    PROBLEM_CATEGORIES.contains(&text)
}

/// Name guard: trimmed length in [2, 50] characters.
pub fn is_valid_name(text: &str) -> bool {
    let len = text.trim().chars().count();
    (2..=50).contains(&len)
}

/// Logical reply affordance attached to an outbound message. The transport
/// renders these; the controller only selects which set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyboardSet {
    /// Leave whatever keyboard is currently shown.
    #[default]
    None,
    /// Remove the reply keyboard.
    Remove,
    MainMenu,
    ProfileEdit,
    Confirm,
    Workplaces,
    Problems,
}

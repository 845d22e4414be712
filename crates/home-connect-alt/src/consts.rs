//! Integration-wide constants

/// Integration domain
pub const DOMAIN: &str = "home_connect_alt";

/// Default icon of option controls
pub const OPTION_ICON: &str = "mdi:office-building-cog";

/// Default icon of setting controls
pub const SETTING_ICON: &str = "mdi:tune";

/// Keys never exposed as generic controls
///
/// These are read-only progress values or have purpose-built entities.
pub const DEFAULT_IGNORE: [&str; 5] = [
    "BSH.Common.Option.ElapsedProgramTime",
    "BSH.Common.Option.EstimatedTotalProgramTime",
    "BSH.Common.Option.ProgramProgress",
    "BSH.Common.Option.RemainingProgramTime",
    "BSH.Common.Setting.PowerState",
];

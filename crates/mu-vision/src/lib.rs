mod activity;
mod current_map;
mod matcher;
mod party;
mod quest;
mod roi;
mod template;
mod warp;

pub use activity::{
    decide_active, ActivityScores, ActivityThresholds, HuntModeDetector, SwitchModeDetector,
};
pub use current_map::CurrentMapDetector;
pub use matcher::{NccMatcher, RawMatch, TemplateMatcher};
pub use party::{PartyConfig, PartyInteractor};
pub use quest::QuestDialogCloser;
pub use roi::{crop_rect, PixelRect, Roi};
pub use template::{
    edge_map, load_template, match_best_scale, match_score, ScaledMatch, MIN_SCALED_DIM,
    SCALE_LADDER,
};
pub use warp::{MapWarpInteractor, WarpConfig};

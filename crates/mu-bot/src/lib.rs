mod allocation;
mod controller;
mod settings;

pub use allocation::{plan_reset, ResetPlan};
pub use controller::BotController;
pub use settings::BotSettings;

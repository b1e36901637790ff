use anyhow::bail;
use mu_data::{Attribute, CharacterConfig};

/// Allocation commands for one reset, in the order they are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetPlan {
    /// One `/add<attr> <n>` per non-zero allocation, fixed attribute order.
    pub commands: Vec<String>,
    /// Points routed into the overflow attribute, after clamping.
    pub overflow: u64,
    /// Points beyond the cap, dropped rather than re-applied elsewhere.
    pub forfeited: u64,
}

/// Compute the allocation commands for a character whose title currently
/// shows `reset_count` resets. The overflow attribute absorbs whatever the
/// explicit allocations leave over, clamped at `cap`.
///
/// Errors when the explicit allocations exceed the available total, which
/// aborts this character's reset only.
pub fn plan_reset(config: &CharacterConfig, reset_count: u32, cap: u64) -> anyhow::Result<ResetPlan> {
    let total = reset_count as u64 * config.points_per_reset as u64;
    let used = config.non_overflow_points();
    if used > total {
        bail!(
            "{}: configured points ({}) exceed total available ({})",
            config.name,
            used,
            total
        );
    }
    let raw_overflow = total - used;
    let forfeited = raw_overflow.saturating_sub(cap);
    let overflow = raw_overflow.min(cap);

    let mut commands = Vec::new();
    for attribute in Attribute::ALL {
        let amount = if attribute == config.overflow_attribute {
            overflow
        } else {
            config.allocation(attribute) as u64
        };
        if amount == 0 {
            continue;
        }
        commands.push(format!("{} {}", attribute.command_prefix(), amount));
    }
    Ok(ResetPlan {
        commands,
        overflow,
        forfeited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mu_data::WarpMap;

    fn config() -> CharacterConfig {
        CharacterConfig {
            name: "Hero".to_string(),
            strength: 1000,
            agility: 1000,
            stamina: 0,
            energy: 0,
            command: 0,
            overflow_attribute: Attribute::Cmd,
            points_per_reset: 2000,
            solo_level: 30,
            warp_map: WarpMap::Elbeland3,
            active: true,
        }
    }

    #[test]
    fn overflow_flows_to_configured_attribute() {
        let plan = plan_reset(&config(), 5, 32_600).unwrap();
        assert_eq!(
            plan.commands,
            vec!["/addstr 1000", "/addagi 1000", "/addcmd 8000"]
        );
        assert_eq!(plan.overflow, 8_000);
        assert_eq!(plan.forfeited, 0);
    }

    #[test]
    fn zero_allocations_send_no_command() {
        let mut c = config();
        c.strength = 0;
        c.agility = 0;
        let plan = plan_reset(&c, 1, 32_600).unwrap();
        assert_eq!(plan.commands, vec!["/addcmd 2000"]);
    }

    #[test]
    fn overflow_beyond_cap_is_forfeited() {
        let mut c = config();
        c.strength = 0;
        c.agility = 0;
        let plan = plan_reset(&c, 20, 32_600).unwrap();
        assert_eq!(plan.overflow, 32_600);
        assert_eq!(plan.forfeited, 40_000 - 32_600);
        assert_eq!(plan.commands, vec!["/addcmd 32600"]);
    }

    #[test]
    fn explicit_points_beyond_total_error() {
        let mut c = config();
        c.strength = 50_000;
        assert!(plan_reset(&c, 1, 32_600).is_err());
    }

    #[test]
    fn exact_fit_leaves_zero_overflow() {
        let mut c = config();
        c.strength = 1500;
        c.agility = 500;
        let plan = plan_reset(&c, 1, 32_600).unwrap();
        assert_eq!(plan.overflow, 0);
        assert_eq!(plan.commands, vec!["/addstr 1500", "/addagi 500"]);
    }

    #[test]
    fn overflow_to_non_default_attribute_keeps_order() {
        let mut c = config();
        c.overflow_attribute = Attribute::Ene;
        c.energy = 777; // explicit value on the overflow attribute is ignored
        let plan = plan_reset(&c, 5, 32_600).unwrap();
        assert_eq!(
            plan.commands,
            vec!["/addstr 1000", "/addagi 1000", "/addene 8000"]
        );
    }
}

// ── Derived characteristic projections ──
//
// Pure mappings from raw robot fields to the booleans and levels the
// host displays. Status codes are short firmware tokens: READY, CCP
// (cycle in progress), DF1/DF2/DFS (drawer full), P (paused), BR
// (bonnet removed), OFF, offline.

use whisker_api::Robot;

/// Snapshot of every host-visible value derived from one record.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusProjection {
    pub powered: bool,
    pub night_light: bool,
    pub occupancy: bool,
    pub status_active: bool,
    pub status_fault: bool,
    pub filter_life_level: u8,
    pub filter_change_needed: bool,
}

impl StatusProjection {
    pub fn project(robot: &Robot) -> Self {
        let filter_life_level = filter_life_level(robot.cycle_count, robot.cycle_capacity);
        Self {
            powered: powered(&robot.unit_status),
            night_light: robot.night_light_active == "1",
            occupancy: robot.unit_status.starts_with("DF"),
            status_active: status_active(&robot.unit_status),
            status_fault: status_fault(&robot.unit_status),
            filter_life_level,
            filter_change_needed: filter_life_level == 0,
        }
    }
}

/// Powered unless explicitly off or unreachable.
fn powered(unit_status: &str) -> bool {
    unit_status != "OFF" && unit_status != "offline"
}

/// Inactive while offline, powered down, paused, or bonnet-removed.
fn status_active(unit_status: &str) -> bool {
    !matches!(unit_status, "offline" | "OFF" | "P" | "BR")
}

/// Faulted in any of the drawer-full terminal states.
fn status_fault(unit_status: &str) -> bool {
    matches!(unit_status, "DF1" | "DF2" | "DFS")
}

/// `max(0, floor(100 * (1 - count / capacity)))`.
///
/// Clamped to 0 when the count overruns the capacity; an unknown
/// (zero) capacity projects as fully consumed rather than dividing
/// by zero.
fn filter_life_level(cycle_count: u32, cycle_capacity: u32) -> u8 {
    if cycle_capacity == 0 || cycle_count >= cycle_capacity {
        return 0;
    }
    let ratio = f64::from(cycle_count) / f64::from(cycle_capacity);
    (100.0 * (1.0 - ratio)).floor() as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn robot(status: &str) -> Robot {
        serde_json::from_value(json!({
            "litterRobotId": "a1",
            "unitStatus": status,
            "nightLightActive": "0",
            "cycleCount": 10,
            "cycleCapacity": 30,
        }))
        .unwrap()
    }

    #[test]
    fn off_is_unpowered() {
        let p = StatusProjection::project(&robot("OFF"));
        assert!(!p.powered);
        assert!(!p.status_active);
        assert!(!p.status_fault);
        assert!(!p.occupancy);
    }

    #[test]
    fn ready_is_powered_and_active() {
        let p = StatusProjection::project(&robot("READY"));
        assert!(p.powered);
        assert!(p.status_active);
        assert!(!p.status_fault);
        assert!(!p.occupancy);
    }

    #[test]
    fn drawer_full_is_occupied_faulted_and_still_active() {
        let p = StatusProjection::project(&robot("DF1"));
        assert!(p.powered);
        assert!(p.occupancy);
        assert!(p.status_fault);
        assert!(p.status_active);
    }

    #[test]
    fn offline_is_inactive_but_not_occupied() {
        let p = StatusProjection::project(&robot("offline"));
        assert!(!p.powered);
        assert!(!p.status_active);
        assert!(!p.occupancy);
        assert!(!p.status_fault);
    }

    #[test]
    fn paused_and_bonnet_removed_are_inactive() {
        assert!(!StatusProjection::project(&robot("P")).status_active);
        assert!(!StatusProjection::project(&robot("BR")).status_active);
        // But neither is a fault.
        assert!(!StatusProjection::project(&robot("P")).status_fault);
    }

    #[test]
    fn every_drawer_full_code_faults() {
        for status in ["DF1", "DF2", "DFS"] {
            assert!(StatusProjection::project(&robot(status)).status_fault, "{status}");
        }
        // The pre-fault "drawer filling" codes occupy without faulting.
        assert!(!StatusProjection::project(&robot("DF")).status_fault);
        assert!(StatusProjection::project(&robot("DF")).occupancy);
    }

    #[test]
    fn night_light_reads_the_string_flag() {
        let mut r = robot("READY");
        assert!(!StatusProjection::project(&r).night_light);
        r.night_light_active = "1".into();
        assert!(StatusProjection::project(&r).night_light);
    }

    #[test]
    fn filter_life_level_table() {
        assert_eq!(filter_life_level(80, 100), 20);
        assert_eq!(filter_life_level(0, 100), 100);
        assert_eq!(filter_life_level(30, 60), 50);
    }

    #[test]
    fn consumed_filter_needs_change() {
        assert_eq!(filter_life_level(100, 100), 0);

        let mut r = robot("READY");
        r.cycle_count = 100;
        r.cycle_capacity = 100;
        let p = StatusProjection::project(&r);
        assert_eq!(p.filter_life_level, 0);
        assert!(p.filter_change_needed);
    }

    #[test]
    fn overrun_count_clamps_to_zero() {
        assert_eq!(filter_life_level(130, 100), 0);
        assert_eq!(filter_life_level(1, 0), 0);
    }

    #[test]
    fn partial_filter_does_not_need_change() {
        let mut r = robot("READY");
        r.cycle_count = 80;
        r.cycle_capacity = 100;
        let p = StatusProjection::project(&r);
        assert_eq!(p.filter_life_level, 20);
        assert!(!p.filter_change_needed);
    }
}

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Built-in exercise catalog: stable id to display name.
const CATALOG: &[(&str, &str)] = &[
    ("barbell_squat", "Barbell Squat"),
    ("front_squat", "Front Squat"),
    ("leg_press", "Leg Press"),
    ("lunges", "Lunges"),
    ("deadlift", "Deadlift"),
    ("romanian_deadlift", "Romanian Deadlift"),
    ("hip_thrust", "Hip Thrust"),
    ("bench_press", "Bench Press"),
    ("incline_bench_press", "Incline Bench Press"),
    ("dumbbell_press", "Dumbbell Press"),
    ("push_up", "Push-Up"),
    ("overhead_press", "Overhead Press"),
    ("lateral_raise", "Lateral Raise"),
    ("pull_up", "Pull-Up"),
    ("chin_up", "Chin-Up"),
    ("lat_pulldown", "Lat Pulldown"),
    ("barbell_row", "Barbell Row"),
    ("seated_cable_row", "Seated Cable Row"),
    ("bicep_curl", "Bicep Curl"),
    ("hammer_curl", "Hammer Curl"),
    ("tricep_pushdown", "Tricep Pushdown"),
    ("skull_crusher", "Skull Crusher"),
    ("plank", "Plank"),
    ("crunch", "Crunch"),
    ("russian_twist", "Russian Twist"),
    ("burpee", "Burpee"),
    ("mountain_climber", "Mountain Climber"),
    ("treadmill_run", "Treadmill Run"),
    ("rowing_machine", "Rowing Machine"),
    ("stationary_bike", "Stationary Bike"),
    ("jump_rope", "Jump Rope"),
];

static BY_ID: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| CATALOG.iter().copied().collect());

/// Resolves an exercise id to its display name. Unknown ids (custom
/// exercises) fall back to the raw id.
pub fn display_name(id: &str) -> &str {
    BY_ID.get(id).copied().unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_resolve() {
        assert_eq!(display_name("bench_press"), "Bench Press");
        assert_eq!(display_name("jump_rope"), "Jump Rope");
    }

    #[test]
    fn unknown_ids_pass_through() {
        assert_eq!(display_name("my_custom_move"), "my_custom_move");
    }
}

use crate::tracking::types::{
    CalorieInfo, DistanceInfo, DurationInfo, GpsPoint, Intensity, IntensityInfo, IntensityZones,
    MetricsReport, PaceInfo, RouteSummary,
};

pub const METERS_PER_MILE: f64 = 1609.34;

/// Pace assumed when none can be derived; lands in the slowest bucket.
const FALLBACK_PACE_MIN_PER_KM: f64 = 10.0;

/// Minimum length of each intensity zone.
const MIN_ZONE_SECONDS: u64 = 60;

/// Inputs to [`compute`], gathered once a session finishes.
#[derive(Debug, Clone)]
pub struct MetricsInput<'a> {
    pub distance_m: f64,
    pub duration_s: f64,
    pub workout_type: &'a str,
    pub weight_kg: f64,
    /// Time-sorted track, used for the elevation walk.
    pub points: &'a [GpsPoint],
}

/// Derive the full report for a finished session.
pub fn compute(input: &MetricsInput<'_>) -> MetricsReport {
    let pace_min_per_km = raw_pace_min_per_km(input.distance_m, input.duration_s);

    MetricsReport {
        distance: distance_info(input.distance_m),
        duration: duration_info(input.duration_s),
        pace: pace_info(input.distance_m, input.duration_s),
        calories: calorie_info(
            input.distance_m / 1000.0,
            input.weight_kg,
            input.workout_type,
            pace_min_per_km,
        ),
        route: route_summary(input.points),
        intensity: intensity_info(pace_min_per_km, input.duration_s),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn raw_pace_min_per_km(distance_m: f64, duration_s: f64) -> Option<f64> {
    (distance_m > 0.0 && duration_s > 0.0).then(|| (duration_s / 60.0) / (distance_m / 1000.0))
}

pub fn distance_info(meters: f64) -> DistanceInfo {
    DistanceInfo {
        meters: round_to(meters, 2),
        kilometers: round_to(meters / 1000.0, 3),
        miles: round_to(meters / METERS_PER_MILE, 3),
    }
}

pub fn duration_info(seconds: f64) -> DurationInfo {
    DurationInfo {
        seconds: round_to(seconds, 2),
        minutes: round_to(seconds / 60.0, 2),
        formatted: format_duration(seconds),
    }
}

/// `"1h 5m"` from an hour up, `"12m 30s"` below.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = total / 60;

    if hours >= 1 {
        format!("{}h {}m", hours, minutes % 60)
    } else {
        format!("{}m {}s", minutes, total % 60)
    }
}

pub fn pace_info(distance_m: f64, duration_s: f64) -> PaceInfo {
    if distance_m <= 0.0 || duration_s <= 0.0 {
        return PaceInfo {
            min_per_km: 0.0,
            min_per_mile: 0.0,
            km_per_hour: 0.0,
            mph: 0.0,
        };
    }

    let km = distance_m / 1000.0;
    let miles = distance_m / METERS_PER_MILE;
    let minutes = duration_s / 60.0;
    let hours = duration_s / 3600.0;

    PaceInfo {
        min_per_km: round_to(minutes / km, 2),
        min_per_mile: round_to(minutes / miles, 2),
        km_per_hour: round_to(km / hours, 2),
        mph: round_to(miles / hours, 2),
    }
}

/// Step factor: faster pace burns more per kilometer.
pub fn pace_factor(pace_min_per_km: Option<f64>) -> f64 {
    let pace = pace_min_per_km
        .filter(|pace| pace.is_finite() && *pace > 0.0)
        .unwrap_or(FALLBACK_PACE_MIN_PER_KM);

    if pace < 5.0 {
        1.3
    } else if pace < 6.0 {
        1.2
    } else if pace < 7.0 {
        1.1
    } else if pace < 8.0 {
        1.0
    } else {
        0.9
    }
}

pub fn workout_type_factor(workout_type: &str) -> f64 {
    match workout_type.to_ascii_lowercase().as_str() {
        "run" => 1.0,
        "walk" => 0.6,
        "cycle" => 0.4,
        "swim" => 1.5,
        "gym" => 0.8,
        "other" => 0.7,
        _ => 1.0,
    }
}

pub fn calorie_info(
    distance_km: f64,
    weight_kg: f64,
    workout_type: &str,
    pace_min_per_km: Option<f64>,
) -> CalorieInfo {
    let burned = if distance_km <= 0.0 || weight_kg <= 0.0 {
        0.0
    } else {
        distance_km * weight_kg * pace_factor(pace_min_per_km) * workout_type_factor(workout_type)
    };

    CalorieInfo {
        burned: round_to(burned, 1),
        estimated: true,
        method: "distance_based".to_string(),
        weight_kg,
    }
}

pub fn intensity_info(pace_min_per_km: Option<f64>, duration_s: f64) -> IntensityInfo {
    let pace = pace_min_per_km
        .filter(|pace| pace.is_finite() && *pace > 0.0)
        .unwrap_or(FALLBACK_PACE_MIN_PER_KM);

    let (intensity, effort_level) = if pace < 5.0 {
        (Intensity::VeryHigh, 5)
    } else if pace < 6.0 {
        (Intensity::High, 4)
    } else if pace < 7.0 {
        (Intensity::Moderate, 3)
    } else if pace < 8.0 {
        (Intensity::Low, 2)
    } else {
        (Intensity::Low, 1)
    };

    let duration = duration_s.max(0.0);
    let zone = |share: f64| ((duration * share) as u64).max(MIN_ZONE_SECONDS);

    IntensityInfo {
        intensity,
        effort_level,
        zones: IntensityZones {
            warmup_s: zone(0.1),
            active_s: zone(0.8),
            cooldown_s: zone(0.1),
        },
    }
}

/// Walk consecutive altitudes; a missing altitude counts as 0.
pub fn route_summary(points: &[GpsPoint]) -> RouteSummary {
    let profile: Vec<f64> = points
        .iter()
        .map(|point| point.altitude.unwrap_or(0.0))
        .collect();

    let (gain, loss) = profile
        .windows(2)
        .fold((0.0, 0.0), |(gain, loss), window| match window {
            [previous, current] if current > previous => (gain + (current - previous), loss),
            [previous, current] => (gain, loss + (previous - current)),
            _ => (gain, loss),
        });

    RouteSummary {
        point_count: points.len(),
        elevation_gain_m: round_to(gain, 2),
        elevation_loss_m: round_to(loss, 2),
        elevation_profile: profile,
    }
}

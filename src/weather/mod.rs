//! Weather collaborators.
//!
//! The recommendation engine only reads weather snapshots; where they come
//! from is behind [`WeatherSource`].

use crate::model::{DailyForecast, Weather};
use chrono::{Duration, Utc};
use rand::Rng;

const CONDITIONS: [&str; 4] = ["Sunny", "Partly Cloudy", "Cloudy", "Rainy"];

/// Supplies read-only weather snapshots
pub trait WeatherSource: Send + Sync {
    fn current(&self) -> Weather;
}

/// Always returns the same snapshot
pub struct FixedWeather(pub Weather);

impl WeatherSource for FixedWeather {
    fn current(&self) -> Weather {
        self.0.clone()
    }
}

/// Random but plausible weather with a 7-day forecast
#[derive(Default)]
pub struct SimulatedWeather;

impl SimulatedWeather {
    pub fn new() -> Self {
        Self
    }

    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Weather {
        let today = Utc::now().date_naive();
        let forecast = (0..7)
            .map(|day| DailyForecast {
                date: today + Duration::days(day),
                high: 20.0 + rng.gen_range(0.0..15.0),
                low: 10.0 + rng.gen_range(0.0..10.0),
                conditions: pick_condition(rng),
                precipitation: rng.gen_range(0.0..20.0),
            })
            .collect();

        Weather {
            temperature: 25.0 + rng.gen_range(0.0..10.0),
            humidity: 60.0 + rng.gen_range(0.0..30.0),
            precipitation: rng.gen_range(0.0..10.0),
            wind_speed: rng.gen_range(0.0..20.0),
            conditions: pick_condition(rng),
            forecast,
        }
    }
}

impl WeatherSource for SimulatedWeather {
    fn current(&self) -> Weather {
        Self::sample(&mut rand::thread_rng())
    }
}

fn pick_condition<R: Rng + ?Sized>(rng: &mut R) -> String {
    CONDITIONS[rng.gen_range(0..CONDITIONS.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_simulated_weather_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let w = SimulatedWeather::sample(&mut rng);
            assert!((25.0..35.0).contains(&w.temperature));
            assert!((60.0..90.0).contains(&w.humidity));
            assert!((0.0..10.0).contains(&w.precipitation));
            assert!((0.0..20.0).contains(&w.wind_speed));
            assert!(CONDITIONS.contains(&w.conditions.as_str()));
            assert_eq!(w.forecast.len(), 7);
        }
    }

    #[test]
    fn test_forecast_days_are_consecutive() {
        let w = SimulatedWeather::new().current();
        for pair in w.forecast.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
        }
    }

    #[test]
    fn test_fixed_weather_returns_snapshot() {
        let snapshot = Weather {
            temperature: 31.0,
            humidity: 70.0,
            precipitation: 12.0,
            wind_speed: 4.0,
            conditions: "Rainy".to_string(),
            forecast: vec![],
        };
        let source = FixedWeather(snapshot.clone());
        assert_eq!(source.current(), snapshot);
    }
}

//! Rule-based irrigation and fertilizer guidance.
//!
//! Everything here is a pure function of its inputs. Missing sensor kinds
//! and missing weather fall back to defaults; nothing in this module fails.

use crate::model::Weather;
use crate::sensor::{Sensor, SensorKind};
use serde::{Deserialize, Serialize};
use std::fmt;


const DEFAULT_SOIL_MOISTURE: f64 = 50.0;
const DEFAULT_TEMPERATURE: f64 = 25.0;
const DEFAULT_HUMIDITY: f64 = 65.0;
const DEFAULT_PH: f64 = 6.5;

/// Soil moisture (%) below which irrigation is considered
const MOISTURE_TARGET: f64 = 40.0;
/// Soil moisture (%) below which irrigation runs at high intensity
const MOISTURE_CRITICAL: f64 = 30.0;
/// Expected rain (mm) below which irrigation is not deferred
const RAIN_DEFER_MM: f64 = 5.0;
/// Expected rain (mm) above which irrigation is explicitly skipped
const RAIN_SKIP_MM: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationRecommendation {
    pub should_irrigate: bool,
    /// Run time (minutes)
    pub duration: f64,
    pub intensity: Intensity,
    pub timing: String,
    pub reason: String,
    /// Water to apply (liters/m²)
    pub water_amount: f64,
    /// Humidity the decision was made with (%)
    pub humidity: f64,
}

/// First reading of `kind` in `sensors`, if any
fn reading(sensors: &[Sensor], kind: &SensorKind) -> Option<f64> {
    sensors.iter().find(|s| &s.kind == kind).map(|s| s.value)
}

/// Decide whether, how long and how hard to irrigate.
///
/// Rules, first match wins:
/// 1. moisture < 40% and rain < 5mm: irrigate
/// 2. rain > 10mm: skip, rain is coming
/// 3. otherwise: skip, moisture is adequate
pub fn irrigation_recommendation(
    sensors: &[Sensor],
    weather: Option<&Weather>,
) -> IrrigationRecommendation {
    let soil_moisture = reading(sensors, &SensorKind::SoilMoisture).unwrap_or(DEFAULT_SOIL_MOISTURE);
    let temperature = reading(sensors, &SensorKind::Temperature).unwrap_or(DEFAULT_TEMPERATURE);
    let humidity = reading(sensors, &SensorKind::Humidity).unwrap_or(DEFAULT_HUMIDITY);
    let expected_rain = weather.map(|w| w.precipitation).unwrap_or(0.0);

    let timing = if temperature > 30.0 {
        "early morning or evening"
    } else {
        "morning"
    }
    .to_string();

    if soil_moisture < MOISTURE_TARGET && expected_rain < RAIN_DEFER_MM {
        let deficit = MOISTURE_TARGET - soil_moisture;
        let intensity = if soil_moisture < MOISTURE_CRITICAL {
            Intensity::High
        } else {
            Intensity::Medium
        };
        return IrrigationRecommendation {
            should_irrigate: true,
            duration: 30.0 + deficit * 2.0,
            intensity,
            timing,
            reason: format!(
                "Soil moisture is low ({:.1}%) and no significant rain expected.",
                soil_moisture
            ),
            water_amount: deficit * 0.5,
            humidity,
        };
    }

    let reason = if expected_rain > RAIN_SKIP_MM {
        format!("Skip irrigation due to expected rainfall ({:.1}mm).", expected_rain)
    } else {
        format!("Soil moisture is adequate ({:.1}%).", soil_moisture)
    };

    IrrigationRecommendation {
        should_irrigate: false,
        duration: 0.0,
        intensity: Intensity::Low,
        timing,
        reason,
        water_amount: 0.0,
        humidity,
    }
}

/// Growth stage a fertilizer plan is keyed by
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropStage {
    #[default]
    Vegetative,
    Flowering,
    Maturity,
}

impl CropStage {
    /// Parse a stage label, falling back to `Vegetative` for anything unknown.
    ///
    /// Matching is case-insensitive on the first word, so "Vegetative Growth"
    /// and "flowering" both resolve.
    pub fn parse_or_default(label: &str) -> Self {
        let first = label
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match first.as_str() {
            "flowering" => CropStage::Flowering,
            "maturity" => CropStage::Maturity,
            _ => CropStage::Vegetative,
        }
    }
}

impl fmt::Display for CropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CropStage::Vegetative => "vegetative",
            CropStage::Flowering => "flowering",
            CropStage::Maturity => "maturity",
        })
    }
}

/// Soil amendment suggested alongside the fertilizer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhCorrection {
    /// Raise pH
    Lime,
    /// Lower pH
    Sulfur,
}

impl PhCorrection {
    fn for_ph(ph: f64) -> Option<Self> {
        if ph < 6.0 {
            Some(PhCorrection::Lime)
        } else if ph > 7.5 {
            Some(PhCorrection::Sulfur)
        } else {
            None
        }
    }

    fn note(&self) -> &'static str {
        match self {
            PhCorrection::Lime => "Consider lime application to raise pH.",
            PhCorrection::Sulfur => "Consider sulfur application to lower pH.",
        }
    }
}

/// Nutrient split (kg/hectare)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nutrients {
    pub nitrogen: u32,
    pub phosphorus: u32,
    pub potassium: u32,
}

impl Nutrients {
    /// N 20%, P 10%, K 15% of `amount`, each rounded half-to-even.
    pub fn split(amount: u32) -> Self {
        Self {
            nitrogen: percent_half_even(amount, 20),
            phosphorus: percent_half_even(amount, 10),
            potassium: percent_half_even(amount, 15),
        }
    }
}

/// `amount * pct / 100` rounded to the nearest integer, ties to even.
///
/// Integer arithmetic keeps ties exact (150 * 15% is 22.5, not 22.499..).
pub fn percent_half_even(amount: u32, pct: u32) -> u32 {
    let product = u64::from(amount) * u64::from(pct);
    let quotient = product / 100;
    let twice_remainder = (product % 100) * 2;

    let rounded = if twice_remainder > 100 || (twice_remainder == 100 && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    };
    rounded as u32
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FertilizerRecommendation {
    pub stage: CropStage,
    #[serde(rename = "type")]
    pub fertilizer_type: String,
    /// Application rate (kg/hectare)
    pub amount: u32,
    pub timing: String,
    pub reason: String,
    pub ph_correction: Option<PhCorrection>,
    pub nutrients: Nutrients,
}

/// Fixed plan per growth stage: (type, kg/ha, timing, rationale)
fn base_plan(stage: CropStage) -> (&'static str, u32, &'static str, &'static str) {
    match stage {
        CropStage::Vegetative => (
            "High Nitrogen (NPK 20-10-10)",
            150,
            "Apply in split doses every 2 weeks",
            "Vegetative growth requires high nitrogen for leaf development",
        ),
        CropStage::Flowering => (
            "Balanced (NPK 15-15-15)",
            120,
            "Apply once at flowering initiation",
            "Balanced nutrients support flower and fruit development",
        ),
        CropStage::Maturity => (
            "Low Nitrogen, High Potassium (NPK 5-10-20)",
            100,
            "Apply 2-3 weeks before harvest",
            "Potassium improves fruit quality and shelf life",
        ),
    }
}

/// Fertilizer plan for a growth stage, with a pH note when soil needs it.
pub fn fertilizer_recommendation(sensors: &[Sensor], stage: CropStage) -> FertilizerRecommendation {
    let ph = reading(sensors, &SensorKind::Ph).unwrap_or(DEFAULT_PH);
    let (fertilizer_type, amount, timing, rationale) = base_plan(stage);
    let ph_correction = PhCorrection::for_ph(ph);

    let reason = match ph_correction {
        Some(correction) => format!("{}. {}", rationale, correction.note()),
        None => rationale.to_string(),
    };

    FertilizerRecommendation {
        stage,
        fertilizer_type: fertilizer_type.to_string(),
        amount,
        timing: timing.to_string(),
        reason,
        ph_correction,
        nutrients: Nutrients::split(amount),
    }
}

/// Same as [`fertilizer_recommendation`] but takes a free-form stage label.
pub fn fertilizer_recommendation_for(sensors: &[Sensor], stage_label: &str) -> FertilizerRecommendation {
    fertilizer_recommendation(sensors, CropStage::parse_or_default(stage_label))
}

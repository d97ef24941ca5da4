//! Process settings.
//!
//! Built once at startup from a [`Profile`] plus `LBB_*` overrides, then
//! handed to every component by reference. Nothing reads settings from a
//! global.

use std::str::FromStr;

use clap::ValueEnum;
use thiserror::Error;

use crate::scoring::{InvalidCurve, ScoringConfig, ScoringCurve};

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("unknown profile {0:?}, expected development, test, staging or production")]
    UnknownProfile(String),
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("{0} must be set for the production profile")]
    MissingCalibration(&'static str),
    #[error(transparent)]
    Curve(#[from] InvalidCurve),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

impl FromStr for Profile {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        <Profile as ValueEnum>::from_str(value.trim(), true)
            .map_err(|_| SettingsError::UnknownProfile(value.to_string()))
    }
}

impl Profile {
    /// `LBB_ENV`, development when unset.
    pub fn from_env() -> Result<Self, SettingsError> {
        std::env::var("LBB_ENV")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or(Ok(Profile::Development), |value| value.parse())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub profile: Profile,
    pub scoring: ScoringConfig,
    /// Headcount bracket codes strictly below this are "small" offices.
    pub headcount_small_only_maximum: u32,
    pub default_distance_km: f64,
    pub page_size_default: usize,
    pub page_size_max: usize,
    pub site_base_url: String,
    pub alternance_base_url: String,
    pub default_contact_mode: String,
}

const CALIBRATION_VARS: [&str; 4] = [
    "LBB_SCORE_50_HIRINGS",
    "LBB_SCORE_60_HIRINGS",
    "LBB_SCORE_80_HIRINGS",
    "LBB_SCORE_100_HIRINGS",
];

impl Settings {
    /// Defaults of a profile, before any environment override.
    pub fn for_profile(profile: Profile) -> Self {
        let base = Self {
            profile,
            scoring: ScoringConfig::default(),
            headcount_small_only_maximum: 21,
            default_distance_km: 10.0,
            page_size_default: 10,
            page_size_max: 100,
            site_base_url: "http://localhost:8090".into(),
            alternance_base_url: "https://labonnealternance.pole-emploi.fr".into(),
            default_contact_mode: "Envoyer un CV et une lettre de motivation".into(),
        };

        match profile {
            Profile::Development => base,
            // Tests exercise the raw curve, so no floor.
            Profile::Test => Self {
                scoring: ScoringConfig {
                    score_for_rome_minimum: 0.0,
                    ..base.scoring
                },
                ..base
            },
            Profile::Staging => Self {
                site_base_url: "https://labonneboite-recette.pole-emploi.fr".into(),
                ..base
            },
            Profile::Production => Self {
                site_base_url: "https://labonneboite.pole-emploi.fr".into(),
                ..base
            },
        }
    }

    pub fn from_env(profile: Profile) -> Result<Self, SettingsError> {
        Self::from_lookup(profile, |name| std::env::var(name).ok())
    }

    /// Apply `LBB_*` overrides on top of the profile defaults.
    pub fn from_lookup(
        profile: Profile,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut settings = Self::for_profile(profile);

        let mut calibration = [
            settings.scoring.curve.score_50_hirings,
            settings.scoring.curve.score_60_hirings,
            settings.scoring.curve.score_80_hirings,
            settings.scoring.curve.score_100_hirings,
        ];
        for (slot, name) in calibration.iter_mut().zip(CALIBRATION_VARS) {
            match lookup(name) {
                Some(raw) => *slot = parse(name, &raw)?,
                // The real curve is confidential and only lives in the deployment env.
                None if profile == Profile::Production => {
                    return Err(SettingsError::MissingCalibration(name));
                }
                None => {}
            }
        }
        settings.scoring.curve = ScoringCurve {
            score_50_hirings: calibration[0],
            score_60_hirings: calibration[1],
            score_80_hirings: calibration[2],
            score_100_hirings: calibration[3],
        }
        .validate()?;

        if let Some(raw) = lookup("LBB_SCORE_FOR_ROME_MINIMUM") {
            let floor: f64 = parse("LBB_SCORE_FOR_ROME_MINIMUM", &raw)?;
            if !(0.0..=100.0).contains(&floor) {
                return Err(invalid("LBB_SCORE_FOR_ROME_MINIMUM", raw));
            }
            settings.scoring.score_for_rome_minimum = floor;
        }

        if let Some(raw) = lookup("LBB_HEADCOUNT_SMALL_ONLY_MAXIMUM") {
            settings.headcount_small_only_maximum = parse("LBB_HEADCOUNT_SMALL_ONLY_MAXIMUM", &raw)?;
        }

        if let Some(raw) = lookup("LBB_DEFAULT_DISTANCE_KM") {
            let distance: f64 = parse("LBB_DEFAULT_DISTANCE_KM", &raw)?;
            if distance < 0.0 || !distance.is_finite() {
                return Err(invalid("LBB_DEFAULT_DISTANCE_KM", raw));
            }
            settings.default_distance_km = distance;
        }

        if let Some(raw) = lookup("LBB_PAGE_SIZE_MAX") {
            let max: usize = parse("LBB_PAGE_SIZE_MAX", &raw)?;
            if max == 0 {
                return Err(invalid("LBB_PAGE_SIZE_MAX", raw));
            }
            settings.page_size_max = max;
            settings.page_size_default = settings.page_size_default.min(max);
        }

        if let Some(url) = lookup("LBB_SITE_BASE_URL") {
            settings.site_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("LBB_ALTERNANCE_BASE_URL") {
            settings.alternance_base_url = url.trim_end_matches('/').to_string();
        }

        Ok(settings)
    }
}

fn invalid(name: &'static str, value: String) -> SettingsError {
    SettingsError::InvalidValue { name, value }
}

fn parse<T: FromStr>(name: &'static str, raw: &str) -> Result<T, SettingsError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| invalid(name, raw.to_string()))
}

//! Parsed timing attribute surface.
//!
//! Clock-value grammar parsing happens outside this crate; attributes arrive
//! here already reduced to numbers, keyword enums, and structured timing
//! specifier descriptions. The keyword enums still expose `FromStr` so hosts
//! can map raw attribute text and get the descriptive parse errors required
//! for malformed input.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TimingError;
use crate::specifier::SpecDesc;
use crate::time::TimeValue;

/// A duration-valued attribute (`dur`, `repeatDur`, `max`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DurationSpec {
    Seconds(f32),
    Indefinite,
}

impl DurationSpec {
    #[inline]
    pub fn to_time(self) -> TimeValue {
        match self {
            Self::Seconds(s) => TimeValue::seconds(s),
            Self::Indefinite => TimeValue::INDEFINITE,
        }
    }
}

/// The `repeatCount` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RepeatCount {
    Count(f32),
    Indefinite,
}

/// Post-interval presentation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    #[default]
    Remove,
    Freeze,
}

impl Fill {
    /// Get the keyword for this fill mode
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Freeze => "freeze",
        }
    }
}

impl FromStr for Fill {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remove" => Ok(Self::Remove),
            "freeze" => Ok(Self::Freeze),
            other => Err(TimingError::MalformedAttribute {
                attribute: "fill".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Policy governing whether a new interval may begin once one has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Restart {
    #[default]
    Always,
    WhenNotActive,
    Never,
}

impl Restart {
    /// Get the keyword for this restart mode
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::WhenNotActive => "whenNotActive",
            Self::Never => "never",
        }
    }
}

impl FromStr for Restart {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "whenNotActive" => Ok(Self::WhenNotActive),
            "never" => Ok(Self::Never),
            other => Err(TimingError::MalformedAttribute {
                attribute: "restart".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// The full timing attribute set of one element, pre-parsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingAttributes {
    #[serde(default)]
    pub begin: Vec<SpecDesc>,
    #[serde(default)]
    pub end: Vec<SpecDesc>,
    #[serde(default)]
    pub dur: Option<DurationSpec>,
    #[serde(default)]
    pub repeat_count: Option<RepeatCount>,
    #[serde(default)]
    pub repeat_dur: Option<DurationSpec>,
    #[serde(default)]
    pub min: Option<f32>,
    #[serde(default)]
    pub max: Option<DurationSpec>,
    #[serde(default)]
    pub fill: Fill,
    #[serde(default)]
    pub restart: Restart,
}

impl TimingAttributes {
    /// Validate numeric fields, returning the first offending attribute.
    pub(crate) fn validate(&self) -> Result<(), TimingError> {
        if let Some(DurationSpec::Seconds(s)) = self.dur {
            if s < 0.0 || !s.is_finite() {
                return Err(malformed("dur", s));
            }
        }
        if let Some(DurationSpec::Seconds(s)) = self.repeat_dur {
            if s < 0.0 || !s.is_finite() {
                return Err(malformed("repeatDur", s));
            }
        }
        if let Some(RepeatCount::Count(c)) = self.repeat_count {
            if c < 0.0 || !c.is_finite() {
                return Err(malformed("repeatCount", c));
            }
        }
        if let Some(m) = self.min {
            if m < 0.0 || !m.is_finite() {
                return Err(malformed("min", m));
            }
        }
        if let Some(DurationSpec::Seconds(m)) = self.max {
            if m < 0.0 || !m.is_finite() {
                return Err(malformed("max", m));
            }
        }
        Ok(())
    }

    /// Effective min/max clamp bounds. An inconsistent pair (min greater than
    /// max) is ignored as a whole per the timing model.
    pub(crate) fn clamp_bounds(&self) -> (f32, TimeValue) {
        let min = self.min.unwrap_or(0.0);
        let max = self
            .max
            .map(DurationSpec::to_time)
            .unwrap_or(TimeValue::INDEFINITE);
        if let Some(max_s) = max.resolved_seconds() {
            if min > max_s {
                return (0.0, TimeValue::INDEFINITE);
            }
        }
        (min, max)
    }
}

fn malformed(attribute: &str, value: f32) -> TimingError {
    TimingError::MalformedAttribute {
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_round_trip() {
        assert_eq!("freeze".parse::<Fill>().unwrap(), Fill::Freeze);
        assert_eq!(Fill::Freeze.name(), "freeze");
        assert_eq!(
            "whenNotActive".parse::<Restart>().unwrap(),
            Restart::WhenNotActive
        );
        assert_eq!(Restart::Never.name(), "never");
    }

    #[test]
    fn unknown_keyword_is_malformed() {
        let err = "frieze".parse::<Fill>().unwrap_err();
        assert!(matches!(
            err,
            TimingError::MalformedAttribute { ref attribute, .. } if attribute == "fill"
        ));
        assert!("sometimes".parse::<Restart>().is_err());
    }

    #[test]
    fn negative_durations_rejected() {
        let attrs = TimingAttributes {
            dur: Some(DurationSpec::Seconds(-1.0)),
            ..Default::default()
        };
        assert!(matches!(
            attrs.validate().unwrap_err(),
            TimingError::MalformedAttribute { ref attribute, .. } if attribute == "dur"
        ));
    }

    #[test]
    fn inconsistent_min_max_ignored() {
        let attrs = TimingAttributes {
            min: Some(5.0),
            max: Some(DurationSpec::Seconds(2.0)),
            ..Default::default()
        };
        let (min, max) = attrs.clamp_bounds();
        assert_eq!(min, 0.0);
        assert!(max.is_indefinite());
    }

    #[test]
    fn attributes_from_json() {
        let attrs: TimingAttributes = serde_json::from_str(
            r#"{
                "begin": [{"Offset": {"offset": 1.0}}],
                "dur": {"Seconds": 3.0},
                "fill": "freeze",
                "restart": "whenNotActive"
            }"#,
        )
        .unwrap();
        assert_eq!(attrs.begin.len(), 1);
        assert_eq!(attrs.dur, Some(DurationSpec::Seconds(3.0)));
        assert_eq!(attrs.fill, Fill::Freeze);
        assert_eq!(attrs.restart, Restart::WhenNotActive);
    }
}

//! Adjustment parameters.
//!
//! A [`ParameterSet`] is a sparse mapping from a typed [`Parameter`] key
//! to an `f32`. Absent keys read as the parameter's default (0, except
//! sharpness which defaults to 40). Values are stored as given; each
//! stage clamps what it derives from them.
//!
//! Construction from untyped input (JSON objects, preset attributes,
//! `key=value` flags) is permissive: unknown keys are dropped and
//! recorded in [`ParameterSet::rejected_keys`], and values that do not
//! parse as a finite number become 0. Both cases are logged at `warn`.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The eight selective-color bands, in hue order starting at red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBand {
    Red,
    Orange,
    Yellow,
    Green,
    Aqua,
    Blue,
    Purple,
    Magenta,
}

impl ColorBand {
    /// All bands in processing order.
    pub const ALL: [Self; 8] = [
        Self::Red,
        Self::Orange,
        Self::Yellow,
        Self::Green,
        Self::Aqua,
        Self::Blue,
        Self::Purple,
        Self::Magenta,
    ];

    /// Lowercase key fragment, as used in `hue_<band>`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Aqua => "aqua",
            Self::Blue => "blue",
            Self::Purple => "purple",
            Self::Magenta => "magenta",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|band| band.name() == name)
    }
}

/// Which property of a color band an HSL parameter shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HslChannel {
    Hue,
    Saturation,
    Luminance,
}

impl HslChannel {
    const ALL: [Self; 3] = [Self::Hue, Self::Saturation, Self::Luminance];

    const fn prefix(self) -> &'static str {
        match self {
            Self::Hue => "hue",
            Self::Saturation => "sat",
            Self::Luminance => "lum",
        }
    }
}

/// Sensor-style calibration primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primary {
    Red,
    Green,
    Blue,
}

impl Primary {
    /// All primaries in processing order.
    pub const ALL: [Self; 3] = [Self::Red, Self::Green, Self::Blue];

    /// Lowercase key fragment, as used in `cal_<primary>_hue`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// Which property of a primary a calibration parameter rotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CalibrationChannel {
    Hue,
    Saturation,
}

impl CalibrationChannel {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Hue => "hue",
            Self::Saturation => "sat",
        }
    }
}

/// Every recognized adjustment key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Parameter {
    Exposure,
    Contrast,
    Highlights,
    Shadows,
    Whites,
    Blacks,
    Temperature,
    Tint,
    Vibrance,
    Saturation,
    Sharpness,
    Texture,
    Clarity,
    Dehaze,
    /// `hue_<band>`, `sat_<band>` or `lum_<band>`.
    Hsl(ColorBand, HslChannel),
    /// `cal_<primary>_hue` or `cal_<primary>_sat`.
    Calibration(Primary, CalibrationChannel),
}

impl Parameter {
    /// The fourteen global (non-banded) parameters.
    pub const GLOBAL: [Self; 14] = [
        Self::Exposure,
        Self::Contrast,
        Self::Highlights,
        Self::Shadows,
        Self::Whites,
        Self::Blacks,
        Self::Temperature,
        Self::Tint,
        Self::Vibrance,
        Self::Saturation,
        Self::Sharpness,
        Self::Texture,
        Self::Clarity,
        Self::Dehaze,
    ];

    /// Iterate every recognized parameter: globals, then the 24 HSL keys,
    /// then the 6 calibration keys.
    pub fn all() -> impl Iterator<Item = Self> {
        let hsl = ColorBand::ALL.into_iter().flat_map(|band| {
            HslChannel::ALL
                .into_iter()
                .map(move |channel| Self::Hsl(band, channel))
        });
        let calibration = Primary::ALL.into_iter().flat_map(|primary| {
            [CalibrationChannel::Hue, CalibrationChannel::Saturation]
                .into_iter()
                .map(move |channel| Self::Calibration(primary, channel))
        });
        Self::GLOBAL.into_iter().chain(hsl).chain(calibration)
    }

    /// Value used when the key is absent.
    #[must_use]
    pub const fn default_value(self) -> f32 {
        match self {
            Self::Sharpness => 40.0,
            _ => 0.0,
        }
    }

    /// Documented client-facing range. Not enforced on construction.
    #[must_use]
    pub const fn range(self) -> RangeInclusive<f32> {
        match self {
            Self::Exposure => -5.0..=5.0,
            Self::Sharpness => 0.0..=150.0,
            _ => -100.0..=100.0,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exposure => "exposure",
            Self::Contrast => "contrast",
            Self::Highlights => "highlights",
            Self::Shadows => "shadows",
            Self::Whites => "whites",
            Self::Blacks => "blacks",
            Self::Temperature => "temperature",
            Self::Tint => "tint",
            Self::Vibrance => "vibrance",
            Self::Saturation => "saturation",
            Self::Sharpness => "sharpness",
            Self::Texture => "texture",
            Self::Clarity => "clarity",
            Self::Dehaze => "dehaze",
            Self::Hsl(band, channel) => {
                return write!(f, "{}_{}", channel.prefix(), band.name());
            }
            Self::Calibration(primary, channel) => {
                return write!(f, "cal_{}_{}", primary.name(), channel.suffix());
            }
        };
        f.write_str(name)
    }
}

/// A key that names no known parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown adjustment parameter `{0}`")]
pub struct UnknownParameter(pub String);

impl FromStr for Parameter {
    type Err = UnknownParameter;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        if let Some(global) = Self::GLOBAL.into_iter().find(|p| p.to_string() == key) {
            return Ok(global);
        }
        if let Some(rest) = key.strip_prefix("cal_")
            && let Some((primary, channel)) = rest.split_once('_')
            && let Some(primary) = Primary::from_name(primary)
        {
            match channel {
                "hue" => return Ok(Self::Calibration(primary, CalibrationChannel::Hue)),
                "sat" => return Ok(Self::Calibration(primary, CalibrationChannel::Saturation)),
                _ => {}
            }
        }
        if let Some((prefix, band)) = key.split_once('_')
            && let Some(band) = ColorBand::from_name(band)
            && let Some(channel) = HslChannel::ALL.into_iter().find(|c| c.prefix() == prefix)
        {
            return Ok(Self::Hsl(band, channel));
        }
        Err(UnknownParameter(key.to_string()))
    }
}

/// Parse a numeric parameter value the way preset files write them.
///
/// Surrounding whitespace and a single leading `+` are ignored.
/// Returns `None` for anything that is not a finite number.
#[must_use]
pub fn parse_value(text: &str) -> Option<f32> {
    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    unsigned.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Untyped value as it arrives from JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// A JSON number.
    Number(f64),
    /// A JSON string, parsed with [`parse_value`].
    Text(String),
    /// Anything else; treated as 0.
    Other(serde::de::IgnoredAny),
}

/// Sparse, validated-by-type adjustment parameters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, RawValue>",
    into = "BTreeMap<String, f32>"
)]
pub struct ParameterSet {
    values: BTreeMap<Parameter, f32>,
    rejected: Vec<String>,
}

impl ParameterSet {
    /// An empty set: every parameter reads as its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A set with every global parameter explicitly zero, including
    /// sharpness. Running the pipeline with it leaves the image unchanged.
    #[must_use]
    pub fn neutral() -> Self {
        let mut set = Self::new();
        for parameter in Parameter::GLOBAL {
            set.set(parameter, 0.0);
        }
        set
    }

    /// Build from textual key/value pairs (CLI flags, preset attributes).
    pub fn from_text_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (key, value) in pairs {
            set.insert_text(key.as_ref(), value.as_ref());
        }
        set
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, parameter: Parameter, value: f32) -> Self {
        self.set(parameter, value);
        self
    }

    /// Store a value. Non-finite values are stored as 0.
    pub fn set(&mut self, parameter: Parameter, value: f32) {
        let value = if value.is_finite() {
            value
        } else {
            tracing::warn!(%parameter, "non-finite value replaced with 0");
            0.0
        };
        self.values.insert(parameter, value);
    }

    /// Store a textual value under an untyped key.
    ///
    /// Unknown keys are recorded and dropped; unparsable values become 0.
    pub fn insert_text(&mut self, key: &str, value: &str) {
        let Some(parameter) = self.recognize(key) else {
            return;
        };
        let parsed = parse_value(value).unwrap_or_else(|| {
            tracing::warn!(%parameter, value, "unparsable value treated as 0");
            0.0
        });
        self.values.insert(parameter, parsed);
    }

    fn insert_raw(&mut self, key: &str, value: RawValue) {
        match value {
            RawValue::Text(text) => self.insert_text(key, &text),
            RawValue::Number(number) => {
                if let Some(parameter) = self.recognize(key) {
                    #[allow(clippy::cast_possible_truncation)]
                    self.set(parameter, number as f32);
                }
            }
            RawValue::Other(_) => {
                if let Some(parameter) = self.recognize(key) {
                    tracing::warn!(%parameter, "non-numeric value treated as 0");
                    self.values.insert(parameter, 0.0);
                }
            }
        }
    }

    fn recognize(&mut self, key: &str) -> Option<Parameter> {
        match key.parse::<Parameter>() {
            Ok(parameter) => Some(parameter),
            Err(err) => {
                tracing::warn!("{err}; ignored");
                self.rejected.push(key.to_string());
                None
            }
        }
    }

    /// The stored value, or the parameter's default when absent.
    #[must_use]
    pub fn get(&self, parameter: Parameter) -> f32 {
        self.values
            .get(&parameter)
            .copied()
            .unwrap_or_else(|| parameter.default_value())
    }

    /// The value divided by 100, bounded to ten times the documented
    /// range so extreme inputs cannot overflow stage arithmetic.
    #[must_use]
    pub fn fraction(&self, parameter: Parameter) -> f32 {
        (self.get(parameter) / 100.0).clamp(-Self::FRACTION_LIMIT, Self::FRACTION_LIMIT)
    }

    const FRACTION_LIMIT: f32 = 10.0;

    /// Whether a value was supplied for `parameter`.
    #[must_use]
    pub fn contains(&self, parameter: Parameter) -> bool {
        self.values.contains_key(&parameter)
    }

    /// Keys dropped during permissive construction, in arrival order.
    #[must_use]
    pub fn rejected_keys(&self) -> &[String] {
        &self.rejected
    }

    /// Iterate explicitly supplied values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (Parameter, f32)> + '_ {
        self.values.iter().map(|(&p, &v)| (p, v))
    }

    /// Number of explicitly supplied values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no value was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlay `other` on top of `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Self) {
        self.values.extend(other.values.iter().map(|(&p, &v)| (p, v)));
        self.rejected.extend(other.rejected.iter().cloned());
    }
}

impl From<BTreeMap<String, RawValue>> for ParameterSet {
    fn from(raw: BTreeMap<String, RawValue>) -> Self {
        let mut set = Self::new();
        for (key, value) in raw {
            set.insert_raw(&key, value);
        }
        set
    }
}

impl From<ParameterSet> for BTreeMap<String, f32> {
    fn from(set: ParameterSet) -> Self {
        set.values
            .into_iter()
            .map(|(p, v)| (p.to_string(), v))
            .collect()
    }
}

impl FromIterator<(Parameter, f32)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (Parameter, f32)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (parameter, value) in iter {
            set.set(parameter, value);
        }
        set
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn there_are_44_recognized_parameters() {
        assert_eq!(Parameter::all().count(), 14 + 24 + 6);
    }

    #[test]
    fn every_key_parses_back_to_itself() {
        for parameter in Parameter::all() {
            let key = parameter.to_string();
            assert_eq!(key.parse::<Parameter>().unwrap(), parameter, "key {key}");
        }
    }

    #[test]
    fn banded_key_spelling() {
        assert_eq!(
            Parameter::Hsl(ColorBand::Aqua, HslChannel::Luminance).to_string(),
            "lum_aqua"
        );
        assert_eq!(
            Parameter::Calibration(Primary::Blue, CalibrationChannel::Saturation).to_string(),
            "cal_blue_sat"
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!("hue_teal".parse::<Parameter>().is_err());
        assert!("cal_cyan_hue".parse::<Parameter>().is_err());
        assert!("Exposure2012".parse::<Parameter>().is_err());
    }

    #[test]
    fn absent_keys_read_as_defaults() {
        let set = ParameterSet::new();
        assert!((set.get(Parameter::Exposure)).abs() < f32::EPSILON);
        assert!((set.get(Parameter::Sharpness) - 40.0).abs() < f32::EPSILON);
        assert!((set.get(Parameter::Hsl(ColorBand::Red, HslChannel::Hue))).abs() < f32::EPSILON);
    }

    #[test]
    fn neutral_zeroes_sharpness() {
        let set = ParameterSet::neutral();
        assert!(set.contains(Parameter::Sharpness));
        assert!((set.get(Parameter::Sharpness)).abs() < f32::EPSILON);
    }

    #[test]
    fn values_are_not_clamped_on_construction() {
        let set = ParameterSet::new().with(Parameter::Contrast, 500.0);
        assert!((set.get(Parameter::Contrast) - 500.0).abs() < f32::EPSILON);
    }

    #[test]
    fn fraction_scales_and_bounds() {
        let set = ParameterSet::new()
            .with(Parameter::Contrast, 50.0)
            .with(Parameter::Clarity, 1.0e30);
        assert!((set.fraction(Parameter::Contrast) - 0.5).abs() < f32::EPSILON);
        assert!((set.fraction(Parameter::Clarity) - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn text_values_strip_plus_and_default_to_zero() {
        let set = ParameterSet::from_text_pairs([
            ("exposure", "+0.75"),
            ("contrast", "lots"),
            ("bogus", "1"),
        ]);
        assert!((set.get(Parameter::Exposure) - 0.75).abs() < f32::EPSILON);
        assert!(set.contains(Parameter::Contrast));
        assert!((set.get(Parameter::Contrast)).abs() < f32::EPSILON);
        assert_eq!(set.rejected_keys(), ["bogus".to_string()]);
    }

    #[test]
    fn parse_value_rejects_non_finite() {
        assert_eq!(parse_value(" -12.5 "), Some(-12.5));
        assert_eq!(parse_value("+3"), Some(3.0));
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("inf"), None);
        assert_eq!(parse_value(""), None);
    }

    #[test]
    fn non_finite_set_is_stored_as_zero() {
        let set = ParameterSet::new().with(Parameter::Tint, f32::NAN);
        assert!((set.get(Parameter::Tint)).abs() < f32::EPSILON);
    }

    #[test]
    fn deserializes_permissively_from_json() {
        let json = r#"{
            "exposure": 1.5,
            "shadows": "+20",
            "hue_red": "oops",
            "vibrance": true,
            "not_a_key": 3
        }"#;
        let set: ParameterSet = serde_json::from_str(json).unwrap();
        assert!((set.get(Parameter::Exposure) - 1.5).abs() < f32::EPSILON);
        assert!((set.get(Parameter::Shadows) - 20.0).abs() < f32::EPSILON);
        assert!((set.get(Parameter::Hsl(ColorBand::Red, HslChannel::Hue))).abs() < f32::EPSILON);
        assert!(set.contains(Parameter::Vibrance));
        assert!((set.get(Parameter::Vibrance)).abs() < f32::EPSILON);
        assert_eq!(set.rejected_keys(), ["not_a_key".to_string()]);
    }

    #[test]
    fn serializes_as_flat_key_map() {
        let set = ParameterSet::new()
            .with(Parameter::Clarity, 10.0)
            .with(Parameter::Calibration(Primary::Green, CalibrationChannel::Hue), -5.0);
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["clarity"], 10.0);
        assert_eq!(value["cal_green_hue"], -5.0);
    }

    #[test]
    fn merge_overrides_left_side() {
        let mut base = ParameterSet::new()
            .with(Parameter::Exposure, 1.0)
            .with(Parameter::Contrast, 10.0);
        let overlay = ParameterSet::new().with(Parameter::Contrast, -10.0);
        base.merge(&overlay);
        assert!((base.get(Parameter::Exposure) - 1.0).abs() < f32::EPSILON);
        assert!((base.get(Parameter::Contrast) + 10.0).abs() < f32::EPSILON);
        assert_eq!(base.len(), 2);
    }
}

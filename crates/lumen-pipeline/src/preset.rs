//! Lightroom-style XMP preset extraction.
//!
//! Presets are read with a flat scan for `crs:` properties rather than a
//! full XML/RDF parse. Three spellings are recognized:
//!
//! - quoted attributes, `crs:Exposure2012="+0.50"`
//! - bare attributes, `crs:Exposure2012=0.5`
//! - elements, `<crs:Exposure2012>+0.50</crs:Exposure2012>`
//!
//! The first occurrence of a property wins. Properties without a
//! counterpart in [`Parameter`] are ignored, including the absolute
//! `Temperature`/`Tint` (Kelvin) pair: only the incremental white balance
//! offsets map onto pipeline parameters.

use std::collections::BTreeSet;

use crate::params::{
    CalibrationChannel, ColorBand, HslChannel, Parameter, ParameterSet, Primary, parse_value,
};

const PREFIX: &str = "crs:";

/// The pipeline parameter an XMP `crs:` property name maps to.
#[must_use]
pub fn parameter_for(name: &str) -> Option<Parameter> {
    let global = match name {
        "Exposure2012" => Some(Parameter::Exposure),
        "Contrast2012" => Some(Parameter::Contrast),
        "Highlights2012" => Some(Parameter::Highlights),
        "Shadows2012" => Some(Parameter::Shadows),
        "Whites2012" => Some(Parameter::Whites),
        "Blacks2012" => Some(Parameter::Blacks),
        "Clarity2012" => Some(Parameter::Clarity),
        "Texture" => Some(Parameter::Texture),
        "Dehaze" => Some(Parameter::Dehaze),
        "Vibrance" => Some(Parameter::Vibrance),
        "Saturation" => Some(Parameter::Saturation),
        "Sharpness" => Some(Parameter::Sharpness),
        "IncrementalTemperature" => Some(Parameter::Temperature),
        "IncrementalTint" => Some(Parameter::Tint),
        _ => None,
    };
    global.or_else(|| hsl_parameter(name)).or_else(|| calibration_parameter(name))
}

fn hsl_parameter(name: &str) -> Option<Parameter> {
    let (channel, band) = [
        ("HueAdjustment", HslChannel::Hue),
        ("SaturationAdjustment", HslChannel::Saturation),
        ("LuminanceAdjustment", HslChannel::Luminance),
    ]
    .into_iter()
    .find_map(|(prefix, channel)| name.strip_prefix(prefix).map(|band| (channel, band)))?;

    ColorBand::ALL
        .into_iter()
        .find(|b| b.name().eq_ignore_ascii_case(band))
        .map(|band| Parameter::Hsl(band, channel))
}

fn calibration_parameter(name: &str) -> Option<Parameter> {
    Primary::ALL.into_iter().find_map(|primary| {
        let rest = name.strip_prefix(capitalized(primary))?;
        let channel = match rest {
            "Hue" => CalibrationChannel::Hue,
            "Saturation" => CalibrationChannel::Saturation,
            _ => return None,
        };
        Some(Parameter::Calibration(primary, channel))
    })
}

const fn capitalized(primary: Primary) -> &'static str {
    match primary {
        Primary::Red => "Red",
        Primary::Green => "Green",
        Primary::Blue => "Blue",
    }
}

/// Extract every recognized `crs:` property from XMP text.
///
/// Values that do not parse as numbers are stored as 0.
#[must_use]
pub fn parse_xmp(text: &str) -> ParameterSet {
    let mut set = ParameterSet::new();
    let mut seen = BTreeSet::new();

    for (name, raw) in properties(text) {
        let Some(parameter) = parameter_for(name) else {
            continue;
        };
        if !seen.insert(parameter) {
            continue;
        }
        let value = parse_value(raw).unwrap_or_else(|| {
            tracing::warn!(property = name, value = raw, "unparsable preset value treated as 0");
            0.0
        });
        set.set(parameter, value);
    }

    tracing::debug!(parameters = set.len(), "parsed XMP preset");
    set
}

/// Every `crs:Name` property with a value, in document order.
fn properties(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.match_indices(PREFIX).filter_map(move |(start, _)| {
        let after = &text[start + PREFIX.len()..];
        let name_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        if name_len == 0 {
            return None;
        }
        let (name, rest) = after.split_at(name_len);
        let is_element = text[..start].ends_with('<');
        property_value(rest, is_element).map(|value| (name, value))
    })
}

/// The value following a property name: `="..."`, `=number`, or, for an
/// element, `>text<`.
fn property_value(rest: &str, is_element: bool) -> Option<&str> {
    if is_element {
        let body = rest.strip_prefix('>')?;
        return body.find('<').map(|end| body[..end].trim());
    }

    let value = rest.strip_prefix('=')?;
    if let Some(quoted) = value.strip_prefix('"') {
        return quoted.find('"').map(|end| &quoted[..end]);
    }
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.')))
        .unwrap_or(value.len());
    (end > 0).then(|| &value[..end])
}

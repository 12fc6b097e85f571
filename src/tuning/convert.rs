//! Legacy tuning-export conversion
//!
//! Transforms a tuning-tool XML export into a [`TuningDocument`]: selects
//! an endpoint, validates its serialized configs, overlays profile
//! parameters on top of the defaults, and extracts the gain settings of
//! the selected profile.

use roxmltree::{Document, Node};

use crate::error::{HomeAudioError, Result};
use crate::tuning::{
    default_profile, ProfileValue, TuningDocument, REQUIRED_SAMPLE_RATES,
};

/// Profile keys handled outside the per-profile overlay
const OVERLAY_SKIP_KEYS: [&str; 5] = [
    "pregain",
    "postgain",
    "system-gain",
    "volume-leveler-in-target",
    "volume-leveler-out-target",
];

/// Gain keys copied from the selected profile into the gain section
const GAIN_KEYS: [&str; 3] = ["pregain", "postgain", "system-gain"];

/// List the endpoint names present in a tuning export
pub fn list_endpoints(xml: &str) -> Result<Vec<String>> {
    let doc = Document::parse(xml)?;
    Ok(endpoint_nodes(&doc)
        .filter_map(|n| n.attribute("type"))
        .map(str::to_string)
        .collect())
}

/// Convert a tuning export into a renderer configuration document.
///
/// With `endpoint` unset the single endpoint in the export is selected
/// automatically; more than one is ambiguous. `profile`, when given, must
/// name a profile of the selected endpoint; its gain settings are copied
/// into the document's gain section.
pub fn convert(
    xml: &str,
    endpoint: Option<&str>,
    virtualizer_enable: bool,
    profile: Option<&str>,
) -> Result<TuningDocument> {
    let doc = Document::parse(xml)?;
    let endpoint_node = select_endpoint(&doc, endpoint)?;
    let endpoint_name = endpoint_node.attribute("type").unwrap_or_default();

    validate_endpoint(&endpoint_node, endpoint_name)?;

    let mut out = TuningDocument::default();

    // Serialized configuration blobs, keyed by sample rate and slot
    for config in serialized_configs(&endpoint_node) {
        let sample_rate = required_attribute(&config, "sample_rate")?
            .parse::<u32>()
            .map_err(|_| HomeAudioError::MalformedTuning {
                reason: "serialized-config sample_rate is not a number".to_string(),
            })?;
        let payload = required_attribute(&config, "base64")?;

        let entry = out
            .serialized_settings
            .entry_mut(sample_rate)
            .ok_or_else(|| HomeAudioError::MalformedTuning {
                reason: format!(
                    "unexpected sample rate {} in endpoint '{}'",
                    sample_rate, endpoint_name
                ),
            })?;
        if config.attribute("virtualizer_enabled") == Some("1") {
            entry.virt_enable = payload.to_string();
        } else {
            entry.virt_disable = payload.to_string();
        }
    }

    // Profiles, each overlaid on a fresh default set
    for profile_node in children_named(&endpoint_node, "profile") {
        let name = required_attribute(&profile_node, "type")?;
        let settings = overlay_profile(&profile_node)?;
        if Some(name) == profile {
            extract_gains(&profile_node, &mut out)?;
        }
        out.profiles.insert(name.to_string(), settings);
    }

    out.global.virtualizer_enable = virtualizer_enable;
    if let Some(selected) = profile {
        if !out.profiles.contains_key(selected) {
            return Err(HomeAudioError::UnknownProfile {
                profile: selected.to_string(),
                endpoint: endpoint_name.to_string(),
            });
        }
        out.global.profile = selected.to_string();
    }

    Ok(out)
}

fn endpoint_nodes<'a>(doc: &'a Document<'a>) -> impl Iterator<Item = Node<'a, 'a>> {
    doc.root_element()
        .children()
        .filter(|n| n.has_tag_name("endpoint"))
}

fn children_named<'a>(node: &Node<'a, 'a>, name: &'static str) -> Vec<Node<'a, 'a>> {
    node.children().filter(|n| n.has_tag_name(name)).collect()
}

fn serialized_configs<'a>(endpoint: &Node<'a, 'a>) -> Vec<Node<'a, 'a>> {
    children_named(endpoint, "serialized-configs")
        .iter()
        .flat_map(|configs| children_named(configs, "serialized-config"))
        .collect()
}

fn required_attribute<'a>(node: &Node<'a, 'a>, name: &str) -> Result<&'a str> {
    node.attribute(name)
        .ok_or_else(|| HomeAudioError::MalformedTuning {
            reason: format!(
                "element '{}' is missing the '{}' attribute",
                node.tag_name().name(),
                name
            ),
        })
}

fn select_endpoint<'a>(doc: &'a Document<'a>, requested: Option<&str>) -> Result<Node<'a, 'a>> {
    let endpoints: Vec<Node> = endpoint_nodes(doc).collect();
    match requested {
        Some(name) => endpoints
            .into_iter()
            .find(|n| n.attribute("type") == Some(name))
            .ok_or_else(|| HomeAudioError::MissingEndpoint {
                name: name.to_string(),
            }),
        None => match endpoints.len() {
            0 => Err(HomeAudioError::MalformedTuning {
                reason: "no endpoint elements found in tuning export".to_string(),
            }),
            1 => Ok(endpoints[0]),
            count => Err(HomeAudioError::AmbiguousEndpoint { count }),
        },
    }
}

/// Every required sample rate must have a serialized entry
fn validate_endpoint(endpoint: &Node, endpoint_name: &str) -> Result<()> {
    let present: Vec<&str> = serialized_configs(endpoint)
        .iter()
        .filter_map(|c| c.attribute("sample_rate"))
        .collect();

    for required in REQUIRED_SAMPLE_RATES {
        if !present.contains(&required.to_string().as_str()) {
            return Err(HomeAudioError::MissingSampleRate {
                sample_rate: required,
                endpoint: endpoint_name.to_string(),
            });
        }
    }
    Ok(())
}

/// Overlay the XML tuning subtree of one profile on the default set
fn overlay_profile(profile: &Node) -> Result<crate::tuning::ProfileSettings> {
    let mut settings = default_profile();

    let tuning = children_named(profile, "tuning")
        .into_iter()
        .next()
        .ok_or_else(|| HomeAudioError::MalformedTuning {
            reason: format!(
                "profile '{}' has no tuning subtree",
                profile.attribute("type").unwrap_or_default()
            ),
        })?;

    for entry in tuning.children().filter(Node::is_element) {
        let mut name = entry.tag_name().name();

        if OVERLAY_SKIP_KEYS.contains(&name) {
            continue;
        }

        let value = match entry.attribute("value") {
            Some(v) => v,
            None => {
                // No literal value: the entry names a preset instead
                let preset = required_attribute(&entry, "preset")?;
                if preset == "array_20_zero" {
                    settings.insert(name.to_string(), ProfileValue::Array(vec![0; 20]));
                    continue;
                }
                return Err(HomeAudioError::UnknownPreset {
                    preset: preset.to_string(),
                });
            }
        };

        // Historical naming swap in tuning-tool exports
        if name == "ieq-bands" {
            name = "ieq-gains";
        }

        settings.insert(name.to_string(), parse_value(name, value)?);
    }

    Ok(settings)
}

fn parse_value(name: &str, value: &str) -> Result<ProfileValue> {
    if value.contains(',') {
        let items = value
            .split(',')
            .map(|v| v.trim().parse::<i64>())
            .collect::<std::result::Result<Vec<i64>, _>>()
            .map_err(|_| HomeAudioError::MalformedTuning {
                reason: format!("setting '{}' has a non-numeric array value", name),
            })?;
        Ok(ProfileValue::Array(items))
    } else {
        let parsed = value
            .trim()
            .parse::<i64>()
            .map_err(|_| HomeAudioError::MalformedTuning {
                reason: format!("setting '{}' has a non-numeric value '{}'", name, value),
            })?;
        Ok(ProfileValue::Int(parsed))
    }
}

/// Copy the gain entries of the selected profile into the gain section
fn extract_gains(profile: &Node, out: &mut TuningDocument) -> Result<()> {
    let tuning = match children_named(profile, "tuning").into_iter().next() {
        Some(t) => t,
        None => return Ok(()),
    };

    for entry in tuning.children().filter(Node::is_element) {
        let name = entry.tag_name().name();
        if !GAIN_KEYS.contains(&name) {
            continue;
        }
        let value = required_attribute(&entry, "value")?;
        let parsed = match parse_value(name, value)? {
            ProfileValue::Int(v) => v,
            _ => {
                return Err(HomeAudioError::MalformedTuning {
                    reason: format!("gain setting '{}' must be a single integer", name),
                })
            }
        };
        match name {
            "pregain" => out.gain_settings.pregain = parsed,
            "postgain" => out.gain_settings.postgain = parsed,
            "system-gain" => out.gain_settings.system_gain = parsed,
            _ => unreachable!(),
        }
    }
    Ok(())
}

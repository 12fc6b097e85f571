//! Speaker layout resolution
//!
//! Validates a colon-separated speaker-pair specification against the
//! Dolby Atmos prerequisite rules, remaps Atmos-enabled speakers into
//! height-channel slots, and expands the result into an ordered channel
//! list with a canonical bitmask.
//!
//! Validation order matters: the remap step assumes the prerequisite and
//! height-count checks already passed.

use std::fmt;
use std::str::FromStr;

use crate::error::{HomeAudioError, Result};

/// Channel positions, numbered to match the bitmask layout consumed by
/// the native caps system (stereo = 0x3, 5.1 = 0x3f).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ChannelPosition {
    FrontLeft = 0,
    FrontRight = 1,
    FrontCenter = 2,
    Lfe1 = 3,
    RearLeft = 4,
    RearRight = 5,
    SideLeft = 10,
    SideRight = 11,
    TopFrontLeft = 12,
    TopFrontRight = 13,
    TopCenter = 15,
    TopRearLeft = 16,
    TopRearRight = 17,
    TopSideLeft = 18,
    TopSideRight = 19,
}

impl ChannelPosition {
    /// Bit for this position in the canonical channel mask
    pub fn mask_bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

/// A speaker-pair token from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// Front left/right pair
    Lr,
    /// Front center
    C,
    /// Low frequency effects
    Lfe,
    /// Surround left/right pair
    Lrs,
    /// Rear surround left/right pair
    Lrrs,
    /// Top front pair
    Lrtf,
    /// Top middle pair
    Lrtm,
    /// Top rear pair
    Lrtr,
    /// Single height speaker
    Sh,
    /// Atmos-enabled front pair
    Lre,
    /// Atmos-enabled surround pair
    Lrse,
    /// Atmos-enabled rear surround pair
    Lrrse,
}

impl Speaker {
    /// The token that must co-occur with this one, if any
    fn prerequisite(self) -> Option<Speaker> {
        match self {
            Speaker::C
            | Speaker::Lfe
            | Speaker::Lrs
            | Speaker::Lre
            | Speaker::Lrtm
            | Speaker::Lrtf
            | Speaker::Sh => Some(Speaker::Lr),
            Speaker::Lrrs | Speaker::Lrse | Speaker::Lrtr => Some(Speaker::Lrs),
            Speaker::Lrrse => Some(Speaker::Lrrs),
            Speaker::Lr => None,
        }
    }

    /// Height speakers contribute to the height-channel count
    fn is_height(self) -> bool {
        matches!(
            self,
            Speaker::Lre
                | Speaker::Lrse
                | Speaker::Lrrse
                | Speaker::Lrtf
                | Speaker::Lrtm
                | Speaker::Lrtr
        )
    }

    /// Atmos-enabled speakers carry a secondary elevated driver and are
    /// remapped into a dedicated height pair
    fn is_atmos_enabled(self) -> bool {
        matches!(self, Speaker::Lre | Speaker::Lrse | Speaker::Lrrse)
    }

    /// Channel positions contributed by this token after remapping.
    /// Atmos-enabled tokens are removed before expansion and contribute
    /// no positions of their own.
    fn positions(self) -> &'static [ChannelPosition] {
        match self {
            Speaker::Lr => &[ChannelPosition::FrontLeft, ChannelPosition::FrontRight],
            Speaker::C => &[ChannelPosition::FrontCenter],
            Speaker::Lfe => &[ChannelPosition::Lfe1],
            Speaker::Lrs => &[ChannelPosition::RearLeft, ChannelPosition::RearRight],
            Speaker::Lrrs => &[ChannelPosition::SideLeft, ChannelPosition::SideRight],
            Speaker::Lrtf => &[
                ChannelPosition::TopFrontLeft,
                ChannelPosition::TopFrontRight,
            ],
            Speaker::Lrtm => &[ChannelPosition::TopSideLeft, ChannelPosition::TopSideRight],
            Speaker::Lrtr => &[ChannelPosition::TopRearLeft, ChannelPosition::TopRearRight],
            Speaker::Sh => &[ChannelPosition::TopCenter],
            Speaker::Lre | Speaker::Lrse | Speaker::Lrrse => &[],
        }
    }
}

impl FromStr for Speaker {
    type Err = HomeAudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lr" => Ok(Speaker::Lr),
            "c" => Ok(Speaker::C),
            "lfe" => Ok(Speaker::Lfe),
            "lrs" => Ok(Speaker::Lrs),
            "lrrs" => Ok(Speaker::Lrrs),
            "lrtf" => Ok(Speaker::Lrtf),
            "lrtm" => Ok(Speaker::Lrtm),
            "lrtr" => Ok(Speaker::Lrtr),
            "sh" => Ok(Speaker::Sh),
            "lre" => Ok(Speaker::Lre),
            "lrse" => Ok(Speaker::Lrse),
            "lrrse" => Ok(Speaker::Lrrse),
            _ => Err(HomeAudioError::InvalidLayout {
                reason: format!("unknown speaker token '{}'", s),
            }),
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Speaker::Lr => "lr",
            Speaker::C => "c",
            Speaker::Lfe => "lfe",
            Speaker::Lrs => "lrs",
            Speaker::Lrrs => "lrrs",
            Speaker::Lrtf => "lrtf",
            Speaker::Lrtm => "lrtm",
            Speaker::Lrtr => "lrtr",
            Speaker::Sh => "sh",
            Speaker::Lre => "lre",
            Speaker::Lrse => "lrse",
            Speaker::Lrrse => "lrrse",
        };
        write!(f, "{}", name)
    }
}

/// Speakers that cannot co-occur with the single height speaker
const SINGLE_HEIGHT_EXCLUSIONS: [Speaker; 7] = [
    Speaker::Lrrs,
    Speaker::Lre,
    Speaker::Lrse,
    Speaker::Lrrse,
    Speaker::Lrtf,
    Speaker::Lrtm,
    Speaker::Lrtr,
];

/// An ordered set of speaker-pair tokens, as supplied on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerSpec {
    tokens: Vec<Speaker>,
}

impl SpeakerSpec {
    /// Parse a colon-separated speaker list, e.g. `lr:c:lfe:lrs:lre`.
    /// Duplicate tokens are rejected; the list is an ordered set.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        for raw in spec.split(':') {
            let spk = raw.parse::<Speaker>()?;
            if tokens.contains(&spk) {
                return Err(HomeAudioError::InvalidLayout {
                    reason: format!("duplicate speaker token '{}'", spk),
                });
            }
            tokens.push(spk);
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[Speaker] {
        &self.tokens
    }

    /// Validate the layout, remap Atmos-enabled speakers, and expand the
    /// result into an ordered channel list with a canonical bitmask.
    pub fn resolve(&self) -> Result<ChannelLayout> {
        let mut list = self.tokens.clone();
        let mut n_height = 0u32;
        let mut n_atmos_enabled = 0u32;
        let mut n_lfe = 0u32;

        // Prerequisites, single-height exclusivity, height counting
        for spk in &list {
            if *spk == Speaker::Lfe {
                n_lfe = 1;
            }
            if let Some(req) = spk.prerequisite() {
                if !list.contains(&req) {
                    return Err(HomeAudioError::InvalidLayout {
                        reason: format!(
                            "speaker prerequisites not met: '{}' requires '{}'",
                            spk, req
                        ),
                    });
                }
            }
            if *spk == Speaker::Sh {
                if list.iter().any(|s| SINGLE_HEIGHT_EXCLUSIONS.contains(s)) {
                    return Err(HomeAudioError::InvalidLayout {
                        reason: "the single height speaker can only be used in \
                                 2.x.1, 3.x.1, 4.x.1 or 5.x.1 layouts"
                            .to_string(),
                    });
                }
                n_height = 1;
            }
            if spk.is_height() {
                n_height += 2;
            }
            if spk.is_atmos_enabled() {
                n_atmos_enabled += 2;
            }
        }

        if n_height > 4 {
            return Err(HomeAudioError::InvalidLayout {
                reason: "the maximum supported number of height speakers is 4".to_string(),
            });
        }

        // Remap Atmos-enabled speakers into explicit height pairs
        match n_atmos_enabled {
            2 => {
                if list.contains(&Speaker::Lrtm) {
                    return Err(HomeAudioError::InvalidLayout {
                        reason: "unable to remap Atmos-enabled speakers: 'lrtm' already present"
                            .to_string(),
                    });
                }
                list.push(Speaker::Lrtm);
            }
            4 => {
                for taken in [Speaker::Lrtf, Speaker::Lrtr] {
                    if list.contains(&taken) {
                        return Err(HomeAudioError::InvalidLayout {
                            reason: format!(
                                "unable to remap Atmos-enabled speakers: '{}' already present",
                                taken
                            ),
                        });
                    }
                }
                list.push(Speaker::Lrtf);
                list.push(Speaker::Lrtr);
            }
            _ => {}
        }
        list.retain(|s| !s.is_atmos_enabled());

        // With two height pairs only front + rear is a valid combination
        if n_height == 4
            && list.contains(&Speaker::Lrtm)
            && (list.contains(&Speaker::Lrtf) || list.contains(&Speaker::Lrtr))
        {
            return Err(HomeAudioError::InvalidLayout {
                reason: "for two pairs of heights only 'lrtf' and 'lrtr' are allowed".to_string(),
            });
        }

        // A single height pair is canonicalized to the middle position.
        // Upstream counting guarantees at most one of lrtf/lrtr here.
        if n_height == 2 {
            for spk in list.iter_mut() {
                if matches!(spk, Speaker::Lrtf | Speaker::Lrtr) {
                    *spk = Speaker::Lrtm;
                }
            }
        }

        // Expand tokens into channel positions and accumulate the mask
        let mut positions = Vec::new();
        let mut bitmask = 0u64;
        let mut channels = 0u32;
        for spk in &list {
            let contrib = spk.positions();
            channels += contrib.len() as u32;
            for pos in contrib {
                bitmask |= pos.mask_bit();
            }
            positions.extend_from_slice(contrib);
        }

        Ok(ChannelLayout {
            speakers: list,
            positions,
            channels,
            lfe: n_lfe,
            heights: n_height,
            bitmask,
        })
    }
}

/// A resolved, immutable channel layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    speakers: Vec<Speaker>,
    positions: Vec<ChannelPosition>,
    channels: u32,
    lfe: u32,
    heights: u32,
    bitmask: u64,
}

impl ChannelLayout {
    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn positions(&self) -> &[ChannelPosition] {
        &self.positions
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn lfe_count(&self) -> u32 {
        self.lfe
    }

    pub fn height_count(&self) -> u32 {
        self.heights
    }

    pub fn bitmask(&self) -> u64 {
        self.bitmask
    }

    /// Channels on the listener plane: total minus LFE and heights
    pub fn floor_channels(&self) -> u32 {
        self.channels - self.lfe - self.heights
    }

    /// Caps string pinning the decoded stream to this layout
    pub fn caps_string(&self) -> String {
        format!(
            "audio/x-raw,channels={},channel-mask=(bitmask){:#x}",
            self.channels, self.bitmask
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn resolve(spec: &str) -> Result<ChannelLayout> {
        SpeakerSpec::parse(spec)?.resolve()
    }

    #[test_case("lr", 2, 0x3; "stereo")]
    #[test_case("lr:c:lfe:lrs", 6, 0x3f; "five one")]
    #[test_case("lr:c:lfe:lrs:lrrs", 8, 0xc3f; "seven one")]
    #[test_case("lr:c:sh", 4, 0x8007; "single height")]
    fn resolves_channel_count_and_mask(spec: &str, channels: u32, mask: u64) {
        let layout = resolve(spec).unwrap();
        assert_eq!(layout.channels(), channels);
        assert_eq!(layout.bitmask(), mask);
    }

    #[test]
    fn resolve_is_deterministic() {
        let a = resolve("lr:c:lfe:lrs:lre").unwrap();
        let b = resolve("lr:c:lfe:lrs:lre").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.positions(), b.positions());
    }

    #[test]
    fn channel_count_matches_position_table() {
        let layout = resolve("lr:c:lfe:lrs:lrrs:lrtf:lrtr").unwrap();
        assert_eq!(layout.channels(), layout.positions().len() as u32);
        assert_eq!(layout.channels(), 12);
        assert_eq!(layout.height_count(), 4);
    }

    #[test_case("c"; "center without lr")]
    #[test_case("lfe"; "lfe without lr")]
    #[test_case("lrtr"; "top rear without lrs")]
    #[test_case("lr:lrrse"; "atmos rear without lrrs")]
    fn missing_prerequisite_fails(spec: &str) {
        let err = resolve(spec).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_LAYOUT");
    }

    #[test]
    fn single_height_excludes_other_heights() {
        let err = resolve("lr:sh:lre").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_LAYOUT");
    }

    #[test]
    fn too_many_heights_fails() {
        let err = resolve("lr:lrs:lrrs:lre:lrse:lrrse").unwrap_err();
        assert!(err.to_string().contains("maximum"));
    }

    #[test]
    fn atmos_pair_remaps_to_top_middle() {
        let layout = resolve("lr:lre").unwrap();
        assert_eq!(layout.speakers(), &[Speaker::Lr, Speaker::Lrtm]);
        assert_eq!(layout.channels(), 4);
        assert_eq!(layout.height_count(), 2);
    }

    #[test]
    fn two_atmos_pairs_remap_to_front_and_rear() {
        let layout = resolve("lr:lrs:lre:lrse").unwrap();
        assert_eq!(
            layout.speakers(),
            &[Speaker::Lr, Speaker::Lrs, Speaker::Lrtf, Speaker::Lrtr]
        );
        assert_eq!(layout.height_count(), 4);
    }

    #[test]
    fn ambiguous_remap_fails() {
        let err = resolve("lr:lre:lrtm").unwrap_err();
        assert!(err.to_string().contains("remap"));
    }

    #[test]
    fn four_heights_forbid_middle_pair_combinations() {
        let err = resolve("lr:lrs:lrtf:lrtm").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_LAYOUT");
        let err = resolve("lr:lrs:lrtm:lrtr").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_LAYOUT");
        assert!(resolve("lr:lrs:lrtf:lrtr").is_ok());
    }

    #[test]
    fn lone_height_pair_renames_to_middle() {
        let layout = resolve("lr:lrs:lrtr").unwrap();
        assert!(layout.speakers().contains(&Speaker::Lrtm));
        assert!(!layout.speakers().contains(&Speaker::Lrtr));
    }

    #[test]
    fn two_height_rename_cannot_see_both_pairs() {
        // lrtf and lrtr together always count four heights, so the
        // single-pair rename never observes both at once.
        let layout = resolve("lr:lrs:lrtf:lrtr").unwrap();
        assert_eq!(layout.height_count(), 4);
        assert!(layout.speakers().contains(&Speaker::Lrtf));
        assert!(layout.speakers().contains(&Speaker::Lrtr));
        assert!(!layout.speakers().contains(&Speaker::Lrtm));
    }

    #[test]
    fn duplicate_tokens_rejected() {
        let err = SpeakerSpec::parse("lr:lr").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_LAYOUT");
    }

    #[test]
    fn unknown_token_rejected() {
        let err = SpeakerSpec::parse("lr:bogus").unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn floor_channels_excludes_lfe_and_heights() {
        let layout = resolve("lr:c:lfe:lrs:lre").unwrap();
        assert_eq!(layout.channels(), 8);
        assert_eq!(layout.floor_channels(), 5);
    }

    #[test]
    fn caps_string_contains_mask() {
        let layout = resolve("lr:c:lfe:lrs").unwrap();
        assert_eq!(
            layout.caps_string(),
            "audio/x-raw,channels=6,channel-mask=(bitmask)0x3f"
        );
    }
}

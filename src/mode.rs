//! Decoder output-mode selection
//!
//! The decoder can emit either the full object-audio presentation (raw)
//! or the backward-compatible core presentation. The initial choice is
//! derived from the speaker layout and the virtualizer flag; a serialized
//! renderer configuration may overrule it exactly once, via a notification
//! polled before the graph is started.

use crate::error::{HomeAudioError, Result};
use crate::graph::bus::ElementMessage;
use crate::layout::ChannelLayout;

/// Processing-format bitmasks that force the core presentation
/// (2.0 and 5.1 renderer layouts)
const CORE_FORMAT_MASKS: [u64; 2] = [0x3, 0x3f];

/// Decoder output mode, with the integer codes the decoder element expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum DecoderMode {
    Raw = 21,
    Core = 22,
}

impl DecoderMode {
    /// Integer property code for the decoder's `out-mode`
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Pick the initial decoder mode from the resolved layout.
///
/// Without a speaker layout the decoder stays in raw mode. Small
/// floor-only layouts without virtualization take the artistic-mix core
/// path; anything else decodes raw.
pub fn initial_mode(layout: Option<&ChannelLayout>, virtualizer_enabled: bool) -> DecoderMode {
    let layout = match layout {
        Some(layout) => layout,
        None => return DecoderMode::Raw,
    };

    if layout.floor_channels() < 6 && layout.height_count() == 0 && !virtualizer_enabled {
        DecoderMode::Core
    } else {
        DecoderMode::Raw
    }
}

/// Interpret a renderer notification emitted after a serialized
/// configuration was loaded.
///
/// Returns `Some(Core)` when the renderer reports a 2.0 or 5.1 processing
/// format, `None` when the reported format leaves the initial decision in
/// place. A notification without the `processing-format` field is
/// malformed.
pub fn corrected_mode(msg: &ElementMessage) -> Result<Option<DecoderMode>> {
    let format = msg
        .get_u64("processing-format")
        .ok_or_else(|| HomeAudioError::MalformedNotification {
            reason: format!(
                "processing format data not found in message '{}'",
                msg.name()
            ),
        })?;

    if CORE_FORMAT_MASKS.contains(&format) {
        Ok(Some(DecoderMode::Core))
    } else {
        Ok(None)
    }
}

//! Per-SoundFont effects overrides.
//!
//! A font may ship a sidecar `.cfg` (same basename) overriding gain,
//! reverb, and chorus parameters. An absent key means "use the configured
//! default" — the profile only stores what the file actually set.

/// Optional overrides; each `None` falls back per-field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FxProfile {
    /// Output gain.
    pub gain: Option<f32>,
    /// Reverb enable.
    pub reverb: Option<bool>,
    /// Reverb damping.
    pub reverb_damping: Option<f32>,
    /// Reverb level.
    pub reverb_level: Option<f32>,
    /// Reverb room size.
    pub reverb_room_size: Option<f32>,
    /// Reverb width.
    pub reverb_width: Option<f32>,
    /// Chorus enable.
    pub chorus: Option<bool>,
    /// Chorus depth.
    pub chorus_depth: Option<f32>,
    /// Chorus level.
    pub chorus_level: Option<f32>,
    /// Chorus voice count.
    pub chorus_voices: Option<i32>,
    /// Chorus speed.
    pub chorus_speed: Option<f32>,
}

impl FxProfile {
    /// Parse `key = value` lines. Unknown keys and malformed values are
    /// logged and skipped; the rest of the file still applies.
    pub fn parse(text: &str) -> Self {
        let mut profile = Self::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') || line.starts_with('[') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let ok = match key {
                "gain" => assign_f32(&mut profile.gain, value),
                "reverb" => assign_bool(&mut profile.reverb, value),
                "reverb_damping" => assign_f32(&mut profile.reverb_damping, value),
                "reverb_level" => assign_f32(&mut profile.reverb_level, value),
                "reverb_room_size" => assign_f32(&mut profile.reverb_room_size, value),
                "reverb_width" => assign_f32(&mut profile.reverb_width, value),
                "chorus" => assign_bool(&mut profile.chorus, value),
                "chorus_depth" => assign_f32(&mut profile.chorus_depth, value),
                "chorus_level" => assign_f32(&mut profile.chorus_level, value),
                "chorus_voices" => assign_i32(&mut profile.chorus_voices, value),
                "chorus_speed" => assign_f32(&mut profile.chorus_speed, value),
                _ => {
                    warn!("Unknown effects profile key ignored");
                    true
                }
            };

            if !ok {
                warn!("Malformed effects profile value ignored");
            }
        }

        profile
    }
}

fn assign_f32(slot: &mut Option<f32>, value: &str) -> bool {
    match value.parse::<f32>() {
        Ok(v) => {
            *slot = Some(v);
            true
        }
        Err(_) => false,
    }
}

fn assign_i32(slot: &mut Option<i32>, value: &str) -> bool {
    match value.parse::<i32>() {
        Ok(v) => {
            *slot = Some(v);
            true
        }
        Err(_) => false,
    }
}

fn assign_bool(slot: &mut Option<bool>, value: &str) -> bool {
    let parsed = match value {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    };
    match parsed {
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sets_only_present_keys() {
        let p = FxProfile::parse("gain = 0.5\nreverb = off\n");
        assert_eq!(p.gain, Some(0.5));
        assert_eq!(p.reverb, Some(false));
        assert_eq!(p.chorus, None);
        assert_eq!(p.reverb_level, None);
    }

    #[test]
    fn test_parse_skips_comments_and_sections() {
        let p = FxProfile::parse("; comment\n[fluidsynth]\n# more\nchorus_voices = 5\n");
        assert_eq!(p.chorus_voices, Some(5));
    }

    #[test]
    fn test_malformed_value_is_skipped_not_fatal() {
        let p = FxProfile::parse("gain = loud\nreverb_width = 0.7\n");
        assert_eq!(p.gain, None);
        assert_eq!(p.reverb_width, Some(0.7));
    }

    #[test]
    fn test_empty_input_is_all_defaults() {
        assert_eq!(FxProfile::parse(""), FxProfile::default());
    }
}

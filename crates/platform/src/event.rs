//! Typed events flowing into the Main task.
//!
//! Producers: control handlers in interrupt context, the network participant
//! task, the MiSTer mirror on the UI task, and the Main task itself.
//! Consumer: the Main task's dispatch loop, a single match on the variant.

use crate::lcd::Image;
use crate::ring_buffer::RingBuffer;
use crate::types::{RomSet, SynthKind};

/// Physical control buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    /// Synth-cycle button.
    Button1,
    /// ROM-set / SoundFont-cycle button.
    Button2,
    /// Volume down.
    Button3,
    /// Volume up.
    Button4,
    /// Push switch on the rotary encoder.
    EncoderButton,
}

/// A button edge, with auto-repeat marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonEvent {
    /// Which button changed.
    pub button: Button,
    /// `true` on press, `false` on release.
    pub pressed: bool,
    /// `true` when generated by hold-to-repeat rather than a fresh press.
    pub repeat: bool,
}

/// Control and system events consumed by the Main task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A button edge.
    Button(ButtonEvent),
    /// Rotary encoder movement; positive is clockwise.
    Encoder {
        /// Detent steps since the last event.
        delta: i8,
    },
    /// Activate a different synthesizer.
    SwitchSynth(SynthKind),
    /// Switch the LA engine's ROM set.
    SwitchRomSet(RomSet),
    /// Switch (deferred) to another SoundFont by list index.
    SwitchSoundFont {
        /// Index into the sorted SoundFont list.
        index: usize,
    },
    /// Silence every engine immediately.
    AllSoundOff,
    /// Show a full-screen image on graphical displays.
    DisplayImage(Image),
}

/// Event queue capacity; producers far outpace one Main iteration's worth
/// of control input at this size.
pub const EVENT_QUEUE_SIZE: usize = 32;

/// The appliance-wide event bus.
pub type EventQueue = RingBuffer<Event, EVENT_QUEUE_SIZE>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_queue_accepts_and_returns_events() {
        let q = EventQueue::new();
        assert!(q.enqueue(Event::AllSoundOff));
        assert!(q.enqueue(Event::Encoder { delta: -2 }));
        assert_eq!(q.dequeue_one(), Some(Event::AllSoundOff));
        assert_eq!(q.dequeue_one(), Some(Event::Encoder { delta: -2 }));
        assert_eq!(q.dequeue_one(), None);
    }

    #[test]
    fn test_button_event_payload() {
        let ev = Event::Button(ButtonEvent {
            button: Button::Button2,
            pressed: true,
            repeat: false,
        });
        match ev {
            Event::Button(b) => {
                assert_eq!(b.button, Button::Button2);
                assert!(b.pressed);
                assert!(!b.repeat);
            }
            _ => panic!("wrong variant"),
        }
    }
}

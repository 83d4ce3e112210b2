//! MiSTer mirror exchanges over a mocked I²C bus.

use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};
use firmware::mister::{MisterControl, MisterStatus, MISTER_I2C_ADDRESS};
use platform::event::{Event, EventQueue};
use platform::types::{RomSet, SynthKind};

fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

fn drain(queue: &EventQueue) -> Vec<Event> {
    let mut out = Vec::new();
    while let Some(event) = queue.dequeue_one() {
        out.push(event);
    }
    out
}

fn local_mt32() -> MisterStatus {
    MisterStatus::local(SynthKind::Mt32, Some(RomSet::Mt32Old), Some(0))
}

#[test]
fn test_first_reply_adopts_peer_config_and_shows_logo() {
    let queue = leak(EventQueue::new());

    // Peer reports SoundFont with font index 3; we write its config back.
    let expectations = [
        Transaction::read(MISTER_I2C_ADDRESS, vec![1, 0xFF, 3]),
        Transaction::write(MISTER_I2C_ADDRESS, vec![1, 0xFF, 3]),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let mut mister = MisterControl::new(&mut i2c, queue);

    mister.update(local_mt32());

    let events = drain(queue);
    assert!(events.contains(&Event::SwitchSynth(SynthKind::SoundFont)));
    assert!(events.contains(&Event::SwitchSoundFont { index: 3 }));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::DisplayImage(_))));

    i2c.done();
}

#[test]
fn test_mute_report_enqueues_all_sound_off() {
    let queue = leak(EventQueue::new());

    let expectations = [
        Transaction::read(MISTER_I2C_ADDRESS, vec![2, 0xFF, 0xFF]),
        Transaction::write(MISTER_I2C_ADDRESS, vec![0, 0, 0]),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let mut mister = MisterControl::new(&mut i2c, queue);

    mister.update(local_mt32());

    assert!(drain(queue).contains(&Event::AllSoundOff));
    i2c.done();
}

#[test]
fn test_local_change_is_written_to_peer() {
    let queue = leak(EventQueue::new());

    let first = local_mt32();
    let changed = MisterStatus::local(SynthKind::SoundFont, Some(RomSet::Mt32Old), Some(2));

    let expectations = [
        // First contact: adopt + write back + logo.
        Transaction::read(MISTER_I2C_ADDRESS, vec![0, 0, 0]),
        Transaction::write(MISTER_I2C_ADDRESS, vec![0, 0, 0]),
        // Second poll: the local state changed; push it to the peer.
        Transaction::read(MISTER_I2C_ADDRESS, vec![0, 0, 0]),
        Transaction::write(MISTER_I2C_ADDRESS, vec![1, 0, 2]),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let mut mister = MisterControl::new(&mut i2c, queue);

    mister.update(first);
    let _ = drain(queue);

    mister.update(changed);
    // A local change produces no events, only the write.
    assert!(drain(queue).is_empty());
    i2c.done();
}

#[test]
fn test_peer_silence_after_activity_cuts_sound() {
    let queue = leak(EventQueue::new());

    let expectations = [
        Transaction::read(MISTER_I2C_ADDRESS, vec![0, 0, 0]),
        Transaction::write(MISTER_I2C_ADDRESS, vec![0, 0, 0]),
        // Second poll: the peer stops answering.
        Transaction::read(MISTER_I2C_ADDRESS, vec![0, 0, 0])
            .with_error(embedded_hal::i2c::ErrorKind::Other),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let mut mister = MisterControl::new(&mut i2c, queue);

    mister.update(local_mt32());
    let _ = drain(queue);

    mister.update(local_mt32());
    assert!(drain(queue).contains(&Event::AllSoundOff));
    i2c.done();
}

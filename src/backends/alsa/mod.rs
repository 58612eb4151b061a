//! OPL2/OPL3 through the kernel's FM hwdep interface
//!
//! The kernel does not take raw register writes. It takes whole operator
//! (voice), channel (note) and global parameter records, so this backend
//! keeps a shadow copy of every record, patches the fields a register
//! write touches, and pushes the complete record back.

pub mod hwdep;

use crate::device::{Device, UnsupportedCounter};
use crate::error::{Error, Result};
use crate::registers::{
    decode, Bank, ChannelGroup, OperatorGroup, OperatorSlot, Register, CHANNEL_OPERATOR_GROUP,
    NUM_CHANNEL_SLOTS, NUM_OPERATOR_SLOTS,
};
use std::io;

/// Operator record (`struct snd_dm_fm_voice`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FmVoice {
    /// Operator cell within the voice (0 or 1)
    pub op: u8,
    pub voice: u8,
    pub am: u8,
    pub vibrato: u8,
    pub do_sustain: u8,
    pub kbd_scale: u8,
    pub harmonic: u8,
    pub scale_level: u8,
    /// Non-inverted: 0x3F is loudest
    pub volume: u8,
    pub attack: u8,
    pub decay: u8,
    pub sustain: u8,
    pub release: u8,
    pub feedback: u8,
    pub connection: u8,
    pub left: u8,
    pub right: u8,
    pub waveform: u8,
}

/// Channel record (`struct snd_dm_fm_note`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FmNote {
    pub voice: u8,
    pub octave: u8,
    pub fnum: u32,
    pub key_on: u8,
}

/// Global parameter record (`struct snd_dm_fm_params`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FmParams {
    pub am_depth: u8,
    pub vib_depth: u8,
    pub kbd_split: u8,
    pub rhythm: u8,
    pub bass: u8,
    pub snare: u8,
    pub tomtom: u8,
    pub cymbal: u8,
    pub hihat: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FmMode {
    Opl2 = 0,
    Opl3 = 1,
}

/// Calls of the kernel FM interface
pub trait FmInterface {
    fn set_voice(&mut self, voice: &FmVoice) -> io::Result<()>;

    fn play_note(&mut self, note: &FmNote) -> io::Result<()>;

    fn set_params(&mut self, params: &FmParams) -> io::Result<()>;

    fn set_mode(&mut self, mode: FmMode) -> io::Result<()>;

    fn set_connection(&mut self, connection: u8) -> io::Result<()>;
}

/// Open the hwdep interface called `name` (empty for auto-discovery).
pub fn open(name: &str) -> Result<AlsaDevice<hwdep::Hwdep>> {
    let (hw, opl3) = hwdep::Hwdep::open_named(name)?;
    AlsaDevice::with_interface(hw, opl3)
}

fn bit(val: u8, n: u8) -> u8 {
    (val >> n) & 1
}

/// Kernel FM device
pub struct AlsaDevice<I: FmInterface> {
    fm: I,
    opl3: bool,
    opl3_enabled: bool,
    operators: [FmVoice; NUM_OPERATOR_SLOTS],
    channels: [FmNote; NUM_CHANNEL_SLOTS],
    params: FmParams,
    unsupported: UnsupportedCounter,
}

impl<I: FmInterface> AlsaDevice<I> {
    /// Set up shadow records and put the interface into the mode matching
    /// its class. OPL3 register access stays off until 0x105 enables it.
    pub fn with_interface(mut fm: I, opl3: bool) -> Result<Self> {
        let mode = if opl3 { FmMode::Opl3 } else { FmMode::Opl2 };
        fm.set_mode(mode).map_err(Error::Transport)?;

        let mut operators = [FmVoice::default(); NUM_OPERATOR_SLOTS];
        for (i, op) in operators.iter_mut().enumerate() {
            op.op = ((i / 3) % 2) as u8;
            op.voice = ((i / 6) * 3 + i % 3) as u8;
            op.left = 1;
            op.right = 1;
        }
        let mut channels = [FmNote::default(); NUM_CHANNEL_SLOTS];
        for (i, ch) in channels.iter_mut().enumerate() {
            ch.voice = i as u8;
        }

        Ok(Self {
            fm,
            opl3,
            opl3_enabled: false,
            operators,
            channels,
            params: FmParams::default(),
            unsupported: UnsupportedCounter::new(),
        })
    }

    pub fn interface(&self) -> &I {
        &self.fm
    }

    pub fn operator(&self, slot: usize) -> &FmVoice {
        &self.operators[slot]
    }

    pub fn channel(&self, slot: usize) -> &FmNote {
        &self.channels[slot]
    }

    pub fn params(&self) -> &FmParams {
        &self.params
    }

    /// Whether OPL3 mode has been switched on through register 0x105
    pub fn opl3_enabled(&self) -> bool {
        self.opl3_enabled
    }

    /// Bank of a channel or operator register, if it is reachable now
    fn bank(&self, reg: u16) -> Option<Bank> {
        match Bank::of(reg) {
            Bank::Secondary if !(self.opl3 && self.opl3_enabled) => None,
            bank => Some(bank),
        }
    }

    fn drop_write(&mut self, reg: u16, val: u8) -> Result<()> {
        self.unsupported.record(self.name(), reg, val);
        Ok(())
    }

    fn push_voice(&mut self, slot: usize) -> Result<()> {
        log::trace!("alsa: voice {} {:?}", slot, self.operators[slot]);
        self.fm.set_voice(&self.operators[slot]).map_err(Error::Transport)
    }

    fn push_note(&mut self, slot: usize) -> Result<()> {
        log::trace!("alsa: note {} {:?}", slot, self.channels[slot]);
        self.fm.play_note(&self.channels[slot]).map_err(Error::Transport)
    }

    fn push_params(&mut self) -> Result<()> {
        log::trace!("alsa: params {:?}", self.params);
        self.fm.set_params(&self.params).map_err(Error::Transport)
    }

    fn write_channel(&mut self, group: ChannelGroup, slot: usize, val: u8) -> Result<()> {
        match group {
            ChannelGroup::FnumLow => {
                let ch = &mut self.channels[slot];
                ch.fnum = (ch.fnum & 0x300) | val as u32;
                self.push_note(slot)
            }
            ChannelGroup::KeyOnBlock => {
                let ch = &mut self.channels[slot];
                ch.fnum = (ch.fnum & 0xFF) | (((val as u32) << 8) & 0x300);
                ch.octave = (val >> 2) & 7;
                ch.key_on = bit(val, 5);
                self.push_note(slot)
            }
            ChannelGroup::FeedbackConnection => {
                let first = CHANNEL_OPERATOR_GROUP[slot] as usize;
                let (left, right) = if self.opl3_enabled {
                    (bit(val, 4), bit(val, 5))
                } else {
                    (1, 1)
                };
                // both operator pairs of a possible 4-op channel
                for op in [first, first + 3] {
                    let voice = &mut self.operators[op];
                    voice.connection = val & 1;
                    voice.feedback = (val >> 1) & 7;
                    voice.left = left;
                    voice.right = right;
                }
                self.push_voice(first)
            }
        }
    }

    fn write_operator(&mut self, group: OperatorGroup, slot: usize, val: u8) -> Result<()> {
        let waveform_mask = if self.opl3_enabled { 0x07 } else { 0x03 };
        let op = &mut self.operators[slot];
        match group {
            OperatorGroup::Characteristic => {
                op.harmonic = val & 0x0F;
                op.kbd_scale = bit(val, 4);
                op.do_sustain = bit(val, 5);
                op.vibrato = bit(val, 6);
                op.am = bit(val, 7);
            }
            OperatorGroup::Level => {
                op.volume = !val & 0x3F;
                op.scale_level = (val >> 6) & 3;
            }
            OperatorGroup::AttackDecay => {
                op.decay = val & 0x0F;
                op.attack = (val >> 4) & 0x0F;
            }
            OperatorGroup::SustainRelease => {
                op.release = val & 0x0F;
                op.sustain = (val >> 4) & 0x0F;
            }
            OperatorGroup::Waveform => {
                op.waveform = val & waveform_mask;
            }
        }
        self.push_voice(slot)
    }
}

impl<I: FmInterface> Device for AlsaDevice<I> {
    fn name(&self) -> &'static str {
        "alsa"
    }

    fn is_opl3(&self) -> bool {
        self.opl3
    }

    fn write(&mut self, reg: u16, val: u8) -> Result<()> {
        match decode(reg) {
            Register::KbdSplit => {
                self.params.kbd_split = bit(val, 6);
                self.push_params()
            }
            Register::Rhythm => {
                let p = &mut self.params;
                p.hihat = bit(val, 0);
                p.cymbal = bit(val, 1);
                p.tomtom = bit(val, 2);
                p.snare = bit(val, 3);
                p.bass = bit(val, 4);
                p.rhythm = bit(val, 5);
                p.vib_depth = bit(val, 6);
                p.am_depth = bit(val, 7);
                self.push_params()
            }
            Register::Opl3Connection | Register::Opl3Mode if !self.opl3 => self.drop_write(reg, val),
            Register::Opl3Connection => {
                let connection = if self.opl3_enabled { val } else { 0 };
                self.fm.set_connection(connection).map_err(Error::Transport)
            }
            Register::Opl3Mode => {
                self.opl3_enabled = val & 1 != 0;
                log::debug!("alsa: OPL3 mode {}", if self.opl3_enabled { "on" } else { "off" });
                let mode = if self.opl3_enabled { FmMode::Opl3 } else { FmMode::Opl2 };
                self.fm.set_mode(mode).map_err(Error::Transport)
            }
            Register::Channel { group, channel } => match self.bank(reg) {
                Some(bank) => self.write_channel(group, bank.channel_base() + channel, val),
                None => self.drop_write(reg, val),
            },
            Register::Operator {
                group,
                slot: OperatorSlot::Slot(slot),
            } => match self.bank(reg) {
                Some(bank) => self.write_operator(group, bank.operator_base() + slot as usize, val),
                None => self.drop_write(reg, val),
            },
            Register::Operator {
                slot: OperatorSlot::Unmapped,
                ..
            }
            | Register::Other => self.drop_write(reg, val),
        }
    }

    fn unsupported_writes(&self) -> u64 {
        self.unsupported.count()
    }

    fn close(self: Box<Self>) -> Result<()> {
        log::debug!("alsa: closed");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{FmInterface, FmMode, FmNote, FmParams, FmVoice};
    use std::io;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FmCall {
        Voice(FmVoice),
        Note(FmNote),
        Params(FmParams),
        Mode(FmMode),
        Connection(u8),
    }

    #[derive(Default)]
    pub struct RecordingFm {
        pub calls: Vec<FmCall>,
    }

    impl FmInterface for RecordingFm {
        fn set_voice(&mut self, voice: &FmVoice) -> io::Result<()> {
            self.calls.push(FmCall::Voice(*voice));
            Ok(())
        }

        fn play_note(&mut self, note: &FmNote) -> io::Result<()> {
            self.calls.push(FmCall::Note(*note));
            Ok(())
        }

        fn set_params(&mut self, params: &FmParams) -> io::Result<()> {
            self.calls.push(FmCall::Params(*params));
            Ok(())
        }

        fn set_mode(&mut self, mode: FmMode) -> io::Result<()> {
            self.calls.push(FmCall::Mode(mode));
            Ok(())
        }

        fn set_connection(&mut self, connection: u8) -> io::Result<()> {
            self.calls.push(FmCall::Connection(connection));
            Ok(())
        }
    }
}

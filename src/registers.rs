//! OPL2/OPL3 register map
//!
//! Register addresses are 9 bits wide. Bit 8 selects the OPL3 second bank
//! (channels 9-17, operators 18-35); the low byte selects the function
//! within a bank.

/// Register address constants
pub mod reg {
    /// Test / waveform-select enable
    pub const TEST: u16 = 0x01;
    /// CSM / keyboard split (note select)
    pub const KBD_SPLIT: u16 = 0x08;
    /// Per-operator tremolo/vibrato/sustain/KSR/multiplier
    pub const CHARACTERISTIC: u16 = 0x20;
    /// Per-operator key scale level / attenuation
    pub const LEVEL: u16 = 0x40;
    /// Per-operator attack/decay rate
    pub const ATTACK_DECAY: u16 = 0x60;
    /// Per-operator sustain level / release rate
    pub const SUSTAIN_RELEASE: u16 = 0x80;
    /// Per-channel frequency number, low 8 bits
    pub const FNUM_LOW: u16 = 0xA0;
    /// Per-channel key-on / block / frequency number high bits
    pub const KEYON_BLOCK: u16 = 0xB0;
    /// Rhythm mode and AM/vibrato depth
    pub const RHYTHM: u16 = 0xBD;
    /// Per-channel feedback / connection / output pan
    pub const FEEDBACK_CONNECTION: u16 = 0xC0;
    /// Per-operator waveform select
    pub const WAVEFORM: u16 = 0xE0;
    /// OPL3 4-operator connection select
    pub const OPL3_CONNECTION: u16 = 0x104;
    /// OPL3 mode enable
    pub const OPL3_MODE: u16 = 0x105;
}

/// Bank selector bit
pub const BANK_SELECT: u16 = 0x100;

/// Highest addressable register
pub const MAX_REGISTER: u16 = 0x1FF;

/// Registers per bank
pub const BANK_SIZE: u16 = 0x100;

pub const OPERATORS_PER_BANK: usize = 18;
pub const CHANNELS_PER_BANK: usize = 9;
pub const NUM_OPERATOR_SLOTS: usize = OPERATORS_PER_BANK * 2;
pub const NUM_CHANNEL_SLOTS: usize = CHANNELS_PER_BANK * 2;

/// Attenuation field of a level register (inverted: 0 is loudest)
pub const LEVEL_ATTENUATION_MASK: u8 = 0x3F;

/// Register bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Primary,
    Secondary,
}

impl Bank {
    pub fn of(reg: u16) -> Self {
        if reg & BANK_SELECT != 0 {
            Bank::Secondary
        } else {
            Bank::Primary
        }
    }

    /// First operator slot of this bank
    pub fn operator_base(self) -> usize {
        match self {
            Bank::Primary => 0,
            Bank::Secondary => OPERATORS_PER_BANK,
        }
    }

    /// First channel slot of this bank
    pub fn channel_base(self) -> usize {
        match self {
            Bank::Primary => 0,
            Bank::Secondary => CHANNELS_PER_BANK,
        }
    }
}

/// Entry of the operator offset table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorSlot {
    Slot(u8),
    Unmapped,
}

use OperatorSlot::{Slot, Unmapped};

/// Maps the low 5 bits of an operator register to a bank-relative operator slot
#[rustfmt::skip]
pub const OPERATOR_OFFSET_TABLE: [OperatorSlot; 0x20] = [
    Slot(0), Slot(1), Slot(2), Slot(3), Slot(4), Slot(5), Unmapped, Unmapped,
    Slot(6), Slot(7), Slot(8), Slot(9), Slot(10), Slot(11), Unmapped, Unmapped,
    Slot(12), Slot(13), Slot(14), Slot(15), Slot(16), Slot(17), Unmapped, Unmapped,
    Unmapped, Unmapped, Unmapped, Unmapped, Unmapped, Unmapped, Unmapped, Unmapped,
];

/// First operator slot of each channel's 3-operator group (both banks)
pub const CHANNEL_OPERATOR_GROUP: [u8; NUM_CHANNEL_SLOTS] = [
    0, 1, 2, 6, 7, 8, 12, 13, 14, 18, 19, 20, 24, 25, 26, 30, 31, 32,
];

/// Operator register ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorGroup {
    Characteristic,
    Level,
    AttackDecay,
    SustainRelease,
    Waveform,
}

/// Channel register ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelGroup {
    FnumLow,
    KeyOnBlock,
    FeedbackConnection,
}

/// Decoded meaning of a register address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    KbdSplit,
    Rhythm,
    /// `channel` is bank-relative (0..=8)
    Channel { group: ChannelGroup, channel: usize },
    /// `slot` is bank-relative
    Operator { group: OperatorGroup, slot: OperatorSlot },
    Opl3Connection,
    Opl3Mode,
    /// Anything without a meaning in the register map, including
    /// out-of-range channel numbers
    Other,
}

/// Decode a register address into its function.
pub fn decode(reg: u16) -> Register {
    if reg > MAX_REGISTER {
        return Register::Other;
    }
    match reg {
        reg::OPL3_CONNECTION => return Register::Opl3Connection,
        reg::OPL3_MODE => return Register::Opl3Mode,
        _ => {}
    }

    let low = reg & 0xFF;
    if low == reg::KBD_SPLIT && reg & BANK_SELECT == 0 {
        return Register::KbdSplit;
    }
    if low == reg::RHYTHM && reg & BANK_SELECT == 0 {
        return Register::Rhythm;
    }

    let channel_group = match low & 0xF0 {
        reg::FNUM_LOW => Some(ChannelGroup::FnumLow),
        reg::KEYON_BLOCK => Some(ChannelGroup::KeyOnBlock),
        reg::FEEDBACK_CONNECTION => Some(ChannelGroup::FeedbackConnection),
        _ => None,
    };
    if let Some(group) = channel_group {
        let channel = (low & 0x0F) as usize;
        if channel >= CHANNELS_PER_BANK {
            return Register::Other;
        }
        return Register::Channel { group, channel };
    }

    let operator_group = match low & 0xE0 {
        reg::CHARACTERISTIC => Some(OperatorGroup::Characteristic),
        reg::LEVEL => Some(OperatorGroup::Level),
        reg::ATTACK_DECAY => Some(OperatorGroup::AttackDecay),
        reg::SUSTAIN_RELEASE => Some(OperatorGroup::SustainRelease),
        reg::WAVEFORM => Some(OperatorGroup::Waveform),
        _ => None,
    };
    match operator_group {
        Some(group) => Register::Operator {
            group,
            slot: OPERATOR_OFFSET_TABLE[(low & 0x1F) as usize],
        },
        None => Register::Other,
    }
}

/// True for the per-operator level registers (either bank).
pub fn is_level_register(reg: u16) -> bool {
    reg & 0xE0 == reg::LEVEL
}

//! Blend mode ids and the table mapping them to GPU blend parameters.

use crate::context::{BlendEquation, BlendFactor};

/// Engine-wide blend mode id. Built-in ids are 0..=27, `-1` is
/// [`BlendModeId::SKIP_CHECK`], custom modes start at 28.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlendModeId(pub i32);

impl BlendModeId {
    /// Leaves the current blend state untouched.
    pub const SKIP_CHECK: Self = Self(-1);
    pub const NORMAL: Self = Self(0);
    pub const ADD: Self = Self(1);
    pub const MULTIPLY: Self = Self(2);
    pub const SCREEN: Self = Self(3);
    pub const OVERLAY: Self = Self(4);
    pub const DARKEN: Self = Self(5);
    pub const LIGHTEN: Self = Self(6);
    pub const COLOR_DODGE: Self = Self(7);
    pub const COLOR_BURN: Self = Self(8);
    pub const HARD_LIGHT: Self = Self(9);
    pub const SOFT_LIGHT: Self = Self(10);
    pub const DIFFERENCE: Self = Self(11);
    pub const EXCLUSION: Self = Self(12);
    pub const HUE: Self = Self(13);
    pub const SATURATION: Self = Self(14);
    pub const COLOR: Self = Self(15);
    pub const LUMINOSITY: Self = Self(16);
    pub const ERASE: Self = Self(17);
    pub const SOURCE_IN: Self = Self(18);
    pub const SOURCE_OUT: Self = Self(19);
    pub const SOURCE_ATOP: Self = Self(20);
    pub const DESTINATION_OVER: Self = Self(21);
    pub const DESTINATION_IN: Self = Self(22);
    pub const DESTINATION_OUT: Self = Self(23);
    pub const DESTINATION_ATOP: Self = Self(24);
    pub const LIGHTER: Self = Self(25);
    pub const COPY: Self = Self(26);
    pub const XOR: Self = Self(27);

    /// Number of built-in modes.
    pub const BUILTIN_COUNT: usize = 28;

    pub fn is_builtin(self) -> bool {
        (0..Self::BUILTIN_COUNT as i32).contains(&self.0)
    }
}

impl Default for BlendModeId {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Blend function operands: the two-term form applies to color and alpha,
/// the four-term form sets them separately.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendFunc {
    Combined(BlendFactor, BlendFactor),
    Separate {
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendParams {
    /// Color and alpha equation; applied with the single-equation call when
    /// both match.
    pub equation: (BlendEquation, BlendEquation),
    pub func: BlendFunc,
}

impl BlendParams {
    pub const NORMAL: BlendParams = BlendParams {
        equation: (BlendEquation::Add, BlendEquation::Add),
        func: BlendFunc::Combined(BlendFactor::One, BlendFactor::OneMinusSrcAlpha),
    };

    pub fn new(func: BlendFunc, equation: BlendEquation) -> Self {
        Self { equation: (equation, equation), func }
    }

    fn separate(src_rgb: BlendFactor, dst_rgb: BlendFactor, src_alpha: BlendFactor, dst_alpha: BlendFactor) -> Self {
        Self {
            equation: (BlendEquation::Add, BlendEquation::Add),
            func: BlendFunc::Separate { src_rgb, dst_rgb, src_alpha, dst_alpha },
        }
    }
}

/// Fixed table of built-in modes plus appended custom modes.
///
/// Lookups never fail: unknown ids resolve to NORMAL.
#[derive(Debug, Clone)]
pub struct BlendModeTable {
    builtin: [BlendParams; BlendModeId::BUILTIN_COUNT],
    custom: Vec<Option<BlendParams>>,
}

impl Default for BlendModeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BlendModeTable {
    pub fn new() -> Self {
        use BlendFactor::*;

        let mut builtin = [BlendParams::NORMAL; BlendModeId::BUILTIN_COUNT];
        builtin[BlendModeId::ADD.0 as usize] = BlendParams::separate(One, DstAlpha, One, DstAlpha);
        builtin[BlendModeId::MULTIPLY.0 as usize] =
            BlendParams::separate(DstColor, OneMinusSrcAlpha, DstColor, OneMinusSrcAlpha);
        builtin[BlendModeId::SCREEN.0 as usize] =
            BlendParams::separate(One, OneMinusSrcColor, One, OneMinusSrcColor);
        builtin[BlendModeId::ERASE.0 as usize] = BlendParams {
            equation: (BlendEquation::ReverseSubtract, BlendEquation::ReverseSubtract),
            func: BlendFunc::Separate {
                src_rgb: Zero,
                dst_rgb: OneMinusSrcAlpha,
                src_alpha: Zero,
                dst_alpha: OneMinusSrcAlpha,
            },
        };

        Self { builtin, custom: Vec::new() }
    }

    /// Parameters for `id`; NORMAL for unknown, removed or negative ids.
    pub fn get(&self, id: BlendModeId) -> BlendParams {
        self.lookup(id).unwrap_or(BlendParams::NORMAL)
    }

    pub fn contains(&self, id: BlendModeId) -> bool {
        self.lookup(id).is_some()
    }

    fn lookup(&self, id: BlendModeId) -> Option<BlendParams> {
        let index = usize::try_from(id.0).ok()?;
        match index.checked_sub(BlendModeId::BUILTIN_COUNT) {
            None => self.builtin.get(index).copied(),
            Some(custom) => self.custom.get(custom).copied().flatten(),
        }
    }

    /// Appends a custom mode and returns its id.
    pub fn add(&mut self, params: BlendParams) -> BlendModeId {
        self.custom.push(Some(params));
        BlendModeId((BlendModeId::BUILTIN_COUNT + self.custom.len() - 1) as i32)
    }

    /// Replaces a custom mode. Built-in modes are fixed; returns `false` for
    /// them and for unknown ids.
    pub fn update(&mut self, id: BlendModeId, params: BlendParams) -> bool {
        match self.custom_slot(id) {
            Some(slot) if slot.is_some() => {
                *slot = Some(params);
                true
            }
            _ => false,
        }
    }

    /// Removes a custom mode. Its id is not reused and resolves to NORMAL.
    pub fn remove(&mut self, id: BlendModeId) -> bool {
        self.custom_slot(id).and_then(Option::take).is_some()
    }

    fn custom_slot(&mut self, id: BlendModeId) -> Option<&mut Option<BlendParams>> {
        let index = usize::try_from(id.0).ok()?.checked_sub(BlendModeId::BUILTIN_COUNT)?;
        self.custom.get_mut(index)
    }
}

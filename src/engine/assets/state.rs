//! Packed material render state.
//!
//! A [`MaterialState`] stores every fixed-function toggle a material needs in a
//! single `u32`: the capability bits live in the low byte, followed by the blend
//! source and destination factors and the depth compare function.
//!
//! ```text
//! bits  0..8   capabilities (see [`Caps`])
//! bits  8..12  blend source factor
//! bits 12..16  blend destination factor
//! bits 16..20  depth function
//! ```
//!
//! Packing the state this way lets the renderer find out what changed between two
//! consecutively drawn materials with a handful of integer operations, see
//! [`compute_state_delta`].

use bitflags::bitflags;
use smallvec::SmallVec;
use static_assertions::const_assert_eq;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Caps: u32 {
        const CULL_FACE = 0x001;
        const BLEND = 0x002;
        const DEPTH_TEST = 0x004;
        const STENCIL_TEST = 0x008;
        const COLOR_MASK = 0x010;
        const DEPTH_MASK = 0x020;
        const STENCIL_MASK = 0x040;
    }
}

pub const CAPS_RANGE: u32 = 0x000FF;
pub const BLEND_SRC_SHIFT: u32 = 8;
pub const BLEND_SRC_RANGE: u32 = 0x00F00;
pub const BLEND_DST_SHIFT: u32 = 12;
pub const BLEND_DST_RANGE: u32 = 0x0F000;
pub const BLEND_FUNC_RANGE: u32 = 0x0FF00;
pub const DEPTH_FUNC_SHIFT: u32 = 16;
pub const DEPTH_FUNC_RANGE: u32 = 0xF0000;

const_assert_eq!(BLEND_SRC_RANGE | BLEND_DST_RANGE, BLEND_FUNC_RANGE);
const_assert_eq!(CAPS_RANGE & (BLEND_FUNC_RANGE | DEPTH_FUNC_RANGE), 0);
const_assert_eq!(BLEND_FUNC_RANGE & DEPTH_FUNC_RANGE, 0);
const_assert_eq!(Caps::all().bits() & !CAPS_RANGE, 0);

/// The fixed-function capabilities that are toggled with enable/disable calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CullFace,
    Blend,
    DepthTest,
    StencilTest,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::CullFace,
        Capability::Blend,
        Capability::DepthTest,
        Capability::StencilTest,
    ];

    pub const fn cap(self) -> Caps {
        match self {
            Capability::CullFace => Caps::CULL_FACE,
            Capability::Blend => Caps::BLEND,
            Capability::DepthTest => Caps::DEPTH_TEST,
            Capability::StencilTest => Caps::STENCIL_TEST,
        }
    }

    pub const fn gl_enum(self) -> u32 {
        match self {
            Capability::CullFace => 0x0B44,
            Capability::Blend => 0x0BE2,
            Capability::DepthTest => 0x0B71,
            Capability::StencilTest => 0x0B90,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    SrcColor = 0x0300,
    OneMinusSrcColor = 0x0301,
    SrcAlpha = 0x0302,
    OneMinusSrcAlpha = 0x0303,
    DstAlpha = 0x0304,
    OneMinusDstAlpha = 0x0305,
    DstColor = 0x0306,
    OneMinusDstColor = 0x0307,
    SrcAlphaSaturate = 0x0308,
}

impl BlendFactor {
    const ENCODED: [BlendFactor; 11] = [
        BlendFactor::Zero,
        BlendFactor::One,
        BlendFactor::SrcColor,
        BlendFactor::OneMinusSrcColor,
        BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha,
        BlendFactor::DstColor,
        BlendFactor::OneMinusDstColor,
        BlendFactor::SrcAlphaSaturate,
    ];

    pub const fn gl_enum(self) -> u32 {
        self as u32
    }

    /// Four bit encoding used inside [`MaterialState`].
    pub const fn encode(self) -> u32 {
        match self {
            BlendFactor::Zero => 0,
            BlendFactor::One => 1,
            other => other as u32 - BlendFactor::SrcColor as u32 + 2,
        }
    }

    pub fn decode(bits: u32) -> Option<BlendFactor> {
        Self::ENCODED.get(bits as usize).copied()
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    Never = 0x0200,
    Less = 0x0201,
    Equal = 0x0202,
    LessEqual = 0x0203,
    Greater = 0x0204,
    NotEqual = 0x0205,
    GreaterEqual = 0x0206,
    Always = 0x0207,
}

impl DepthFunc {
    const ENCODED: [DepthFunc; 8] = [
        DepthFunc::Never,
        DepthFunc::Less,
        DepthFunc::Equal,
        DepthFunc::LessEqual,
        DepthFunc::Greater,
        DepthFunc::NotEqual,
        DepthFunc::GreaterEqual,
        DepthFunc::Always,
    ];

    pub const fn gl_enum(self) -> u32 {
        self as u32
    }

    pub const fn encode(self) -> u32 {
        self as u32 - DepthFunc::Never as u32
    }

    pub fn decode(bits: u32) -> Option<DepthFunc> {
        Self::ENCODED.get(bits as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialState(u32);

impl Default for MaterialState {
    fn default() -> Self {
        MaterialState::EMPTY
            .with_caps(Caps::CULL_FACE | Caps::DEPTH_TEST | Caps::COLOR_MASK | Caps::DEPTH_MASK)
            .with_blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)
            .with_depth_func(DepthFunc::Less)
    }
}

impl MaterialState {
    /// No capabilities, `ZERO`/`ZERO` blending and a `NEVER` depth test.
    pub const EMPTY: MaterialState = MaterialState(0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Accepts raw bits only if every packed field holds a valid encoding.
    pub fn from_bits(bits: u32) -> Option<MaterialState> {
        let known = CAPS_RANGE | BLEND_FUNC_RANGE | DEPTH_FUNC_RANGE;
        if bits & !known != 0 || Caps::from_bits(bits & CAPS_RANGE).is_none() {
            return None;
        }

        BlendFactor::decode((bits & BLEND_SRC_RANGE) >> BLEND_SRC_SHIFT)?;
        BlendFactor::decode((bits & BLEND_DST_RANGE) >> BLEND_DST_SHIFT)?;
        DepthFunc::decode((bits & DEPTH_FUNC_RANGE) >> DEPTH_FUNC_SHIFT)?;

        Some(MaterialState(bits))
    }

    pub fn caps(self) -> Caps {
        Caps::from_bits_truncate(self.0)
    }

    pub fn has(self, caps: Caps) -> bool {
        self.caps().contains(caps)
    }

    pub fn cull_face(self) -> bool {
        self.has(Caps::CULL_FACE)
    }

    pub fn blend(self) -> bool {
        self.has(Caps::BLEND)
    }

    pub fn depth_test(self) -> bool {
        self.has(Caps::DEPTH_TEST)
    }

    pub fn stencil_test(self) -> bool {
        self.has(Caps::STENCIL_TEST)
    }

    pub fn color_mask(self) -> bool {
        self.has(Caps::COLOR_MASK)
    }

    pub fn depth_mask(self) -> bool {
        self.has(Caps::DEPTH_MASK)
    }

    pub fn stencil_mask(self) -> bool {
        self.has(Caps::STENCIL_MASK)
    }

    pub fn blend_func_src(self) -> BlendFactor {
        BlendFactor::decode((self.0 & BLEND_SRC_RANGE) >> BLEND_SRC_SHIFT)
            .unwrap_or(BlendFactor::Zero)
    }

    pub fn blend_func_dst(self) -> BlendFactor {
        BlendFactor::decode((self.0 & BLEND_DST_RANGE) >> BLEND_DST_SHIFT)
            .unwrap_or(BlendFactor::Zero)
    }

    pub fn depth_func(self) -> DepthFunc {
        DepthFunc::decode((self.0 & DEPTH_FUNC_RANGE) >> DEPTH_FUNC_SHIFT)
            .unwrap_or(DepthFunc::Never)
    }

    pub const fn with_caps(self, caps: Caps) -> MaterialState {
        MaterialState(self.0 | caps.bits())
    }

    pub const fn without_caps(self, caps: Caps) -> MaterialState {
        MaterialState(self.0 & !caps.bits())
    }

    pub const fn with_cap(self, caps: Caps, enabled: bool) -> MaterialState {
        if enabled {
            self.with_caps(caps)
        } else {
            self.without_caps(caps)
        }
    }

    pub const fn with_blend_func(self, src: BlendFactor, dst: BlendFactor) -> MaterialState {
        let cleared = self.0 & !BLEND_FUNC_RANGE;
        MaterialState(
            cleared | (src.encode() << BLEND_SRC_SHIFT) | (dst.encode() << BLEND_DST_SHIFT),
        )
    }

    pub const fn with_depth_func(self, func: DepthFunc) -> MaterialState {
        let cleared = self.0 & !DEPTH_FUNC_RANGE;
        MaterialState(cleared | (func.encode() << DEPTH_FUNC_SHIFT))
    }

    pub fn set_cap(&mut self, caps: Caps, enabled: bool) {
        *self = self.with_cap(caps, enabled);
    }

    pub fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        *self = self.with_blend_func(src, dst);
    }

    pub fn set_depth_func(&mut self, func: DepthFunc) {
        *self = self.with_depth_func(func);
    }

    /// Capability bits that differ from `other`.
    pub fn caps_diff(self, other: u32) -> u32 {
        (other & CAPS_RANGE) ^ (self.0 & CAPS_RANGE)
    }

    /// Blend factor bits that differ from `other`. Always zero while blending is disabled.
    pub fn blend_diff(self, other: u32) -> u32 {
        if !self.blend() {
            return 0;
        }
        (other & BLEND_FUNC_RANGE) ^ (self.0 & BLEND_FUNC_RANGE)
    }

    /// Depth function bits that differ from `other`. Always zero while depth testing is disabled.
    pub fn depth_func_diff(self, other: u32) -> u32 {
        if !self.depth_test() {
            return 0;
        }
        (other & DEPTH_FUNC_RANGE) ^ (self.0 & DEPTH_FUNC_RANGE)
    }
}

/// One fixed-function call needed to move from one material state to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Enable(Capability),
    Disable(Capability),
    ColorMask(bool),
    DepthMask(bool),
    StencilMask(bool),
    BlendFunc(BlendFactor, BlendFactor),
    DepthFunc(DepthFunc),
}

pub type StateDelta = SmallVec<[StateChange; 8]>;

fn mask_change(prev: u32, next: u32, cap: Caps) -> Option<bool> {
    let (was, is) = (prev & cap.bits() != 0, next & cap.bits() != 0);
    (was != is).then_some(is)
}

/// Computes the calls that turn `prev` into `next`.
///
/// Without a previous state everything `next` describes is emitted, as if the
/// previous state was the bitwise complement of `next`. Bit-identical states
/// produce an empty delta. The depth function is re-emitted on every non-empty
/// transition while depth testing is enabled.
pub fn compute_state_delta(prev: Option<MaterialState>, next: MaterialState) -> StateDelta {
    let mut delta = StateDelta::new();

    let next_bits = next.bits();
    let prev_bits = prev.map_or(!next_bits, MaterialState::bits);

    if prev_bits == next_bits {
        return delta;
    }

    if next.caps_diff(prev_bits) != 0 {
        for capability in Capability::ALL {
            match mask_change(prev_bits, next_bits, capability.cap()) {
                Some(true) => delta.push(StateChange::Enable(capability)),
                Some(false) => delta.push(StateChange::Disable(capability)),
                None => {}
            }
        }

        if let Some(mask) = mask_change(prev_bits, next_bits, Caps::COLOR_MASK) {
            delta.push(StateChange::ColorMask(mask));
        }
        if let Some(mask) = mask_change(prev_bits, next_bits, Caps::DEPTH_MASK) {
            delta.push(StateChange::DepthMask(mask));
        }
        if let Some(mask) = mask_change(prev_bits, next_bits, Caps::STENCIL_MASK) {
            delta.push(StateChange::StencilMask(mask));
        }
    }

    if next.blend_diff(prev_bits) != 0 {
        delta.push(StateChange::BlendFunc(
            next.blend_func_src(),
            next.blend_func_dst(),
        ));
    }

    if next.depth_test() {
        delta.push(StateChange::DepthFunc(next.depth_func()));
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_matches_common_opaque_setup() {
        let state = MaterialState::default();

        assert!(state.cull_face());
        assert!(state.depth_test());
        assert!(state.color_mask());
        assert!(state.depth_mask());
        assert!(!state.blend());
        assert!(!state.stencil_test());
        assert!(!state.stencil_mask());
        assert_eq!(state.blend_func_src(), BlendFactor::SrcAlpha);
        assert_eq!(state.blend_func_dst(), BlendFactor::OneMinusSrcAlpha);
        assert_eq!(state.depth_func(), DepthFunc::Less);
    }

    #[test]
    fn blend_factor_encoding_fits_four_bits() {
        assert_eq!(BlendFactor::Zero.encode(), 0);
        assert_eq!(BlendFactor::One.encode(), 1);
        assert_eq!(BlendFactor::SrcColor.encode(), 2);
        assert_eq!(BlendFactor::SrcAlphaSaturate.encode(), 10);
        assert_eq!(BlendFactor::decode(5), Some(BlendFactor::OneMinusSrcAlpha));
        assert_eq!(BlendFactor::decode(11), None);
    }

    #[test]
    fn from_bits_rejects_garbage() {
        assert!(MaterialState::from_bits(MaterialState::default().bits()).is_some());
        assert!(MaterialState::from_bits(0x80).is_none());
        assert!(MaterialState::from_bits(0xB << BLEND_SRC_SHIFT).is_none());
        assert!(MaterialState::from_bits(0x100000).is_none());
    }

    #[test]
    fn identical_state_has_empty_delta() {
        let state = MaterialState::default().with_caps(Caps::BLEND);
        assert!(compute_state_delta(Some(state), state).is_empty());
    }

    #[test]
    fn first_state_is_fully_applied() {
        let state = MaterialState::default();
        let delta = compute_state_delta(None, state);

        assert!(delta.contains(&StateChange::Enable(Capability::CullFace)));
        assert!(delta.contains(&StateChange::Disable(Capability::Blend)));
        assert!(delta.contains(&StateChange::Enable(Capability::DepthTest)));
        assert!(delta.contains(&StateChange::Disable(Capability::StencilTest)));
        assert!(delta.contains(&StateChange::ColorMask(true)));
        assert!(delta.contains(&StateChange::DepthMask(true)));
        assert!(delta.contains(&StateChange::StencilMask(false)));
        assert!(delta.contains(&StateChange::DepthFunc(DepthFunc::Less)));
        // blending is off, so the factors are left alone
        assert!(
            !delta
                .iter()
                .any(|c| matches!(c, StateChange::BlendFunc(..)))
        );
    }

    #[test]
    fn only_changed_caps_are_toggled() {
        let opaque = MaterialState::default();
        let transparent = opaque
            .with_caps(Caps::BLEND)
            .without_caps(Caps::DEPTH_MASK);

        let delta = compute_state_delta(Some(opaque), transparent);

        assert_eq!(
            delta.as_slice(),
            &[
                StateChange::Enable(Capability::Blend),
                StateChange::DepthMask(false),
                StateChange::DepthFunc(DepthFunc::Less),
            ]
        );
    }

    #[test]
    fn blend_func_change_is_emitted_only_with_blending() {
        let a = MaterialState::default().with_caps(Caps::BLEND);
        let b = a.with_blend_func(BlendFactor::One, BlendFactor::One);
        let delta = compute_state_delta(Some(a), b);
        assert!(delta.contains(&StateChange::BlendFunc(BlendFactor::One, BlendFactor::One)));

        let c = MaterialState::default();
        let d = c.with_blend_func(BlendFactor::One, BlendFactor::One);
        let delta = compute_state_delta(Some(c), d);
        assert!(
            !delta
                .iter()
                .any(|c| matches!(c, StateChange::BlendFunc(..)))
        );
    }

    #[test]
    fn depth_func_skipped_without_depth_test() {
        let a = MaterialState::default().without_caps(Caps::DEPTH_TEST);
        let b = a.with_depth_func(DepthFunc::Always);
        let delta = compute_state_delta(Some(a), b);
        assert!(delta.is_empty());
    }
}

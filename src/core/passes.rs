// Copyright @yucwang 2026

//! Render pass catalog and channel bindings.
//!
//! Pass identifiers are persisted in scene files as `(name, code)` pairs.
//! The numeric codes are part of the file format and must never be
//! renumbered; they do not need to match any internal ordering.

use crate::core::error::{RenderError, RenderResult};
use crate::core::properties::Properties;
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassFamily {
    Disabled,
    Basic,
    Depth,
    Index,
    Debug,
    Advanced,
    AmbientOcclusion,
}

macro_rules! pass_catalog {
    ($( $variant:ident => ($name:expr, $code:expr, $family:ident) ),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PassId {
            $( $variant, )*
        }

        impl PassId {
            pub const ALL: &'static [PassId] = &[ $( PassId::$variant, )* ];

            /// Persisted identifier string.
            pub fn name(self) -> &'static str {
                match self { $( PassId::$variant => $name, )* }
            }

            /// Persisted legacy code.
            pub fn code(self) -> u32 {
                match self { $( PassId::$variant => $code, )* }
            }

            pub fn family(self) -> PassFamily {
                match self { $( PassId::$variant => PassFamily::$family, )* }
            }
        }
    };
}

pass_catalog! {
    Disabled => ("disabled", 999999, Disabled),

    Combined => ("combined", 0, Basic),
    Diffuse => ("diffuse", 1, Basic),
    DiffuseNoShadow => ("diffuse-noshadow", 2, Basic),
    Shadow => ("shadow", 3, Basic),
    Env => ("env", 4, Basic),
    Indirect => ("indirect", 5, Basic),
    Emit => ("emit", 6, Basic),
    Reflect => ("reflect", 7, Basic),
    Refract => ("refract", 8, Basic),
    Mist => ("mist", 9, Basic),

    ZDepthAbs => ("z-depth-abs", 101, Depth),
    ZDepthNorm => ("z-depth-norm", 102, Depth),

    ObjIndexAbs => ("obj-index-abs", 201, Index),
    ObjIndexNorm => ("obj-index-norm", 202, Index),
    ObjIndexAuto => ("obj-index-auto", 203, Index),
    ObjIndexMask => ("obj-index-mask", 204, Index),
    ObjIndexMaskShadow => ("obj-index-mask-shadow", 205, Index),
    ObjIndexMaskAll => ("obj-index-mask-all", 206, Index),
    MatIndexAbs => ("mat-index-abs", 207, Index),
    MatIndexNorm => ("mat-index-norm", 208, Index),
    MatIndexAuto => ("mat-index-auto", 209, Index),
    MatIndexMask => ("mat-index-mask", 210, Index),
    MatIndexMaskShadow => ("mat-index-mask-shadow", 211, Index),
    MatIndexMaskAll => ("mat-index-mask-all", 212, Index),

    DebugAaSamples => ("debug-aa-samples", 301, Debug),
    DebugUv => ("debug-uv", 302, Debug),
    DebugDsDv => ("debug-dsdv", 303, Debug),
    DebugDsDu => ("debug-dsdu", 304, Debug),
    DebugDpDv => ("debug-dpdv", 305, Debug),
    DebugDpDu => ("debug-dpdu", 306, Debug),
    DebugNv => ("debug-nv", 307, Debug),
    DebugNu => ("debug-nu", 308, Debug),
    DebugNormalGeom => ("debug-normal-geom", 309, Debug),
    DebugNormalSmooth => ("debug-normal-smooth", 310, Debug),

    AdvReflect => ("adv-reflect", 401, Advanced),
    AdvRefract => ("adv-refract", 402, Advanced),
    AdvRadiance => ("adv-radiance", 403, Advanced),
    AdvVolumeTransmittance => ("adv-volume-transmittance", 404, Advanced),
    AdvVolumeIntegration => ("adv-volume-integration", 405, Advanced),
    AdvDiffuseIndirect => ("adv-diffuse-indirect", 406, Advanced),
    AdvDiffuseColor => ("adv-diffuse-color", 407, Advanced),
    AdvGlossy => ("adv-glossy", 408, Advanced),
    AdvGlossyIndirect => ("adv-glossy-indirect", 409, Advanced),
    AdvGlossyColor => ("adv-glossy-color", 410, Advanced),
    AdvTrans => ("adv-trans", 411, Advanced),
    AdvTransIndirect => ("adv-trans-indirect", 412, Advanced),
    AdvTransColor => ("adv-trans-color", 413, Advanced),
    AdvSubsurface => ("adv-subsurface", 414, Advanced),
    AdvSubsurfaceIndirect => ("adv-subsurface-indirect", 415, Advanced),
    AdvSubsurfaceColor => ("adv-subsurface-color", 416, Advanced),
    AdvIndirect => ("adv-indirect", 417, Advanced),
    AdvSurfaceIntegration => ("adv-surface-integration", 418, Advanced),

    Ao => ("ao", 501, AmbientOcclusion),
    AoClay => ("ao-clay", 502, AmbientOcclusion),
}

pub const PASS_COUNT: usize = PassId::ALL.len();

impl PassId {
    /// Dense index into per-pass arrays.
    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn from_code(code: u32) -> Option<PassId> {
        PassId::ALL.iter().copied().find(|p| p.code() == code)
    }

    pub fn from_name(name: &str) -> Option<PassId> {
        PassId::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Rescaled with the global min/max after the render.
    pub fn is_normalized(self) -> bool {
        matches!(self, PassId::ZDepthNorm | PassId::ObjIndexNorm | PassId::MatIndexNorm)
    }

    pub fn is_mask(self) -> bool {
        matches!(
            self,
            PassId::ObjIndexMask
                | PassId::ObjIndexMaskShadow
                | PassId::ObjIndexMaskAll
                | PassId::MatIndexMask
                | PassId::MatIndexMaskShadow
                | PassId::MatIndexMaskAll
        )
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl FromStr for PassId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(p) = PassId::from_name(s) {
            return Ok(p);
        }
        s.parse::<u32>().ok().and_then(PassId::from_code).ok_or(())
    }
}

const ALL_FAMILIES: &[PassFamily] = &[
    PassFamily::Basic,
    PassFamily::Advanced,
    PassFamily::Index,
    PassFamily::Debug,
    PassFamily::Depth,
    PassFamily::AmbientOcclusion,
];

macro_rules! channels {
    ($( $variant:ident => ($prop:expr, $label:expr, $default:ident, $families:expr) ),* $(,)?) => {
        /// Named output channel of the final image set.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ExternalChannel {
            $( $variant, )*
        }

        impl ExternalChannel {
            pub const ALL: &'static [ExternalChannel] = &[ $( ExternalChannel::$variant, )* ];

            /// Property name carrying the binding (`pass_Depth`, ...).
            pub fn property(self) -> &'static str {
                match self { $( ExternalChannel::$variant => $prop, )* }
            }

            pub fn label(self) -> &'static str {
                match self { $( ExternalChannel::$variant => $label, )* }
            }

            pub fn default_pass(self) -> PassId {
                match self { $( ExternalChannel::$variant => PassId::$default, )* }
            }

            /// Families this channel may select from.
            pub fn allowed_families(self) -> &'static [PassFamily] {
                match self { $( ExternalChannel::$variant => $families, )* }
            }
        }
    };
}

channels! {
    Combined => ("pass_Combined", "Combined", Disabled, &[PassFamily::Disabled]),
    Depth => ("pass_Depth", "Depth", ZDepthNorm, &[PassFamily::Depth]),
    Vector => ("pass_Vector", "Vector", ObjIndexAuto, ALL_FAMILIES),
    Normal => ("pass_Normal", "Normal", DebugNormalSmooth, ALL_FAMILIES),
    Uv => ("pass_UV", "UV", DebugUv, ALL_FAMILIES),
    Color => ("pass_Color", "Color", MatIndexAuto, ALL_FAMILIES),
    Emit => ("pass_Emit", "Emit", Emit, ALL_FAMILIES),
    Mist => ("pass_Mist", "Mist", Mist, ALL_FAMILIES),
    Diffuse => ("pass_Diffuse", "Diffuse", Diffuse, ALL_FAMILIES),
    Spec => ("pass_Spec", "Spec", AdvReflect, ALL_FAMILIES),
    Ao => ("pass_AO", "AO", Ao, &[PassFamily::AmbientOcclusion]),
    Env => ("pass_Env", "Env", Env, ALL_FAMILIES),
    Indirect => ("pass_Indirect", "Indirect", Indirect, ALL_FAMILIES),
    Shadow => ("pass_Shadow", "Shadow", Shadow, ALL_FAMILIES),
    Reflect => ("pass_Reflect", "Reflect", Reflect, ALL_FAMILIES),
    Refract => ("pass_Refract", "Refract", Refract, ALL_FAMILIES),
    IndexOb => ("pass_IndexOB", "IndexOB", ObjIndexNorm, &[PassFamily::Index]),
    IndexMa => ("pass_IndexMA", "IndexMA", MatIndexNorm, &[PassFamily::Index]),
    DiffDir => ("pass_DiffDir", "DiffDir", Diffuse, ALL_FAMILIES),
    DiffInd => ("pass_DiffInd", "DiffInd", AdvDiffuseIndirect, ALL_FAMILIES),
    DiffCol => ("pass_DiffCol", "DiffCol", AdvDiffuseColor, ALL_FAMILIES),
    GlossDir => ("pass_GlossDir", "GlossDir", AdvGlossy, ALL_FAMILIES),
    GlossInd => ("pass_GlossInd", "GlossInd", AdvGlossyIndirect, ALL_FAMILIES),
    GlossCol => ("pass_GlossCol", "GlossCol", AdvGlossyColor, ALL_FAMILIES),
    TransDir => ("pass_TransDir", "TransDir", AdvTrans, ALL_FAMILIES),
    TransInd => ("pass_TransInd", "TransInd", AdvTransIndirect, ALL_FAMILIES),
    TransCol => ("pass_TransCol", "TransCol", AdvTransColor, ALL_FAMILIES),
    SubsurfaceDir => ("pass_SubsurfaceDir", "SubsurfaceDir", AdvSubsurface, ALL_FAMILIES),
    SubsurfaceInd => ("pass_SubsurfaceInd", "SubsurfaceInd", AdvSubsurfaceIndirect, ALL_FAMILIES),
    SubsurfaceCol => ("pass_SubsurfaceCol", "SubsurfaceCol", AdvSubsurfaceColor, ALL_FAMILIES),
}

impl ExternalChannel {
    pub fn accepts(self, pass: PassId) -> bool {
        self.allowed_families().contains(&pass.family())
    }

    pub fn from_label(label: &str) -> Option<ExternalChannel> {
        ExternalChannel::ALL.iter().copied().find(|c| c.label() == label || c.property() == label)
    }
}

/// Object/material index masking shared by the mask pass variants.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaskSettings {
    pub object_index: u32,
    pub material_index: u32,
    pub invert: bool,
    pub only: bool,
}

/// Channel → internal pass bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassSelection {
    enabled: bool,
    bindings: Vec<(ExternalChannel, PassId)>,
    pub mask: MaskSettings,
}

impl Default for RenderPassSelection {
    fn default() -> Self {
        Self {
            enabled: false,
            bindings: ExternalChannel::ALL.iter().map(|c| (*c, c.default_pass())).collect(),
            mask: MaskSettings::default(),
        }
    }
}

impl RenderPassSelection {
    pub fn from_properties(props: &Properties) -> RenderResult<Self> {
        let mut selection = RenderPassSelection::default();
        selection.enabled = props.boolean("pass_enable", false)?;
        selection.mask = MaskSettings {
            object_index: props.integer("pass_mask_obj_index", 0, 0..=u32::MAX as i64)? as u32,
            material_index: props.integer("pass_mask_mat_index", 0, 0..=u32::MAX as i64)? as u32,
            invert: props.boolean("pass_mask_invert", false)?,
            only: props.boolean("pass_mask_only", false)?,
        };
        for channel in ExternalChannel::ALL {
            if !props.contains(channel.property()) {
                continue;
            }
            let raw = props.string(channel.property(), channel.default_pass().name())?;
            let pass = raw.parse::<PassId>().map_err(|_| {
                RenderError::config(channel.property(), &raw, "unknown render pass identifier")
            })?;
            selection.bind(*channel, pass)?;
        }
        Ok(selection)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn bind(&mut self, channel: ExternalChannel, pass: PassId) -> RenderResult<()> {
        if !channel.accepts(pass) {
            return Err(RenderError::config(
                channel.property(),
                pass.name(),
                format!("identifier not selectable for channel {}", channel.label()),
            ));
        }
        match self.bindings.iter_mut().find(|(c, _)| *c == channel) {
            Some(binding) => binding.1 = pass,
            None => self.bindings.push((channel, pass)),
        }
        Ok(())
    }

    pub fn pass_for(&self, channel: ExternalChannel) -> PassId {
        self.bindings
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, p)| *p)
            .unwrap_or(PassId::Disabled)
    }

    /// Channels that produce an image, in catalog order.
    pub fn active(&self) -> Vec<(ExternalChannel, PassId)> {
        if !self.enabled {
            return Vec::new();
        }
        ExternalChannel::ALL
            .iter()
            .map(|c| (*c, self.pass_for(*c)))
            .filter(|(_, p)| *p != PassId::Disabled)
            .collect()
    }

    pub fn requires(&self, pass: PassId) -> bool {
        self.active().iter().any(|(_, p)| *p == pass)
    }
}

/// Per-sample values of every internal pass an integrator can produce,
/// plus the geometric data the compositor derives the remaining passes
/// from.
#[derive(Debug, Clone)]
pub struct ColorLayers {
    colors: [RGBSpectrum; PASS_COUNT],
    pub depth: Option<Float>,
    pub object_index: Option<u32>,
    pub material_index: Option<u32>,
    /// Fraction of light samples blocked by the masked object / material.
    pub object_mask_shadow: Float,
    pub material_mask_shadow: Float,
}

impl Default for ColorLayers {
    fn default() -> Self {
        Self {
            colors: [RGBSpectrum::default(); PASS_COUNT],
            depth: None,
            object_index: None,
            material_index: None,
            object_mask_shadow: 0.0,
            material_mask_shadow: 0.0,
        }
    }
}

impl ColorLayers {
    pub fn get(&self, pass: PassId) -> RGBSpectrum {
        self.colors[pass.slot()]
    }

    pub fn set(&mut self, pass: PassId, value: RGBSpectrum) {
        self.colors[pass.slot()] = value;
    }

    pub fn add(&mut self, pass: PassId, value: RGBSpectrum) {
        self.colors[pass.slot()] += value;
    }

    pub fn is_hit(&self) -> bool {
        self.depth.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::properties::PropertyValue;

    #[test]
    fn test_catalog_codes_are_stable() {
        assert_eq!(PassId::ALL.len(), PASS_COUNT);
        let expected = [
            ("disabled", 999999),
            ("combined", 0),
            ("mist", 9),
            ("z-depth-abs", 101),
            ("z-depth-norm", 102),
            ("obj-index-abs", 201),
            ("mat-index-mask-all", 212),
            ("debug-aa-samples", 301),
            ("debug-normal-smooth", 310),
            ("adv-reflect", 401),
            ("adv-surface-integration", 418),
            ("ao", 501),
            ("ao-clay", 502),
        ];
        for (name, code) in expected.iter() {
            let pass = PassId::from_name(name).expect("known pass");
            assert_eq!(pass.code(), *code);
            assert_eq!(PassId::from_code(*code), Some(pass));
        }
    }

    #[test]
    fn test_catalog_names_and_codes_unique() {
        for (i, a) in PassId::ALL.iter().enumerate() {
            assert_eq!(a.slot(), i);
            for b in PassId::ALL.iter().skip(i + 1) {
                assert_ne!(a.code(), b.code());
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn test_channel_subsets() {
        let mut selection = RenderPassSelection::default();
        assert!(selection.bind(ExternalChannel::Depth, PassId::ZDepthAbs).is_ok());
        assert!(selection.bind(ExternalChannel::Depth, PassId::Diffuse).is_err());
        assert!(selection.bind(ExternalChannel::Ao, PassId::AoClay).is_ok());
        assert!(selection.bind(ExternalChannel::IndexOb, PassId::MatIndexMask).is_ok());
        assert!(selection.bind(ExternalChannel::Combined, PassId::Combined).is_err());
        assert!(selection.bind(ExternalChannel::Normal, PassId::ZDepthNorm).is_ok());
        assert_eq!(selection.pass_for(ExternalChannel::Depth), PassId::ZDepthAbs);
    }

    #[test]
    fn test_selection_from_properties() {
        let props = Properties::new()
            .with("pass_enable", PropertyValue::Boolean(true))
            .with("pass_Depth", PropertyValue::Str("z-depth-abs".to_string()))
            .with("pass_Normal", PropertyValue::Str("309".to_string()))
            .with("pass_mask_obj_index", PropertyValue::Integer(3));
        let selection = RenderPassSelection::from_properties(&props).unwrap();
        assert!(selection.enabled());
        assert_eq!(selection.pass_for(ExternalChannel::Depth), PassId::ZDepthAbs);
        assert_eq!(selection.pass_for(ExternalChannel::Normal), PassId::DebugNormalGeom);
        assert_eq!(selection.mask.object_index, 3);
        assert!(selection.active().iter().all(|(c, _)| *c != ExternalChannel::Combined));

        let bad = Properties::new().with("pass_Depth", PropertyValue::Str("diffuse".to_string()));
        match RenderPassSelection::from_properties(&bad) {
            Err(RenderError::Config { parameter, .. }) => assert_eq!(parameter, "pass_Depth"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

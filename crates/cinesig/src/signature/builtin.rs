//! Compiled-in signatures for the IW3 (Call of Duty 4) family.
//!
//! Consumers look symbols up through [`Iw3Symbol`] instead of raw strings so a
//! typo is a compile error rather than a missing table entry.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::{
    AddressClass, DescriptorSet, ModuleTarget, Pattern, PatternDescriptor, PointerWidth,
    SymbolEntry, Transform,
};

/// Game family name carried by the built-in set
pub const IW3_GAME: &str = "iw3";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr, Display,
)]
pub enum Iw3Symbol {
    #[strum(serialize = "fopen")]
    Fopen,
    #[strum(serialize = "AnglesToAxis")]
    AnglesToAxis,
    #[strum(serialize = "Cbuf_AddText")]
    CbufAddText,
    /// Killcam "you" marker
    #[strum(serialize = "CG_AddPlayerSpriteDrawSurfs")]
    CgAddPlayerSpriteDrawSurfs,
    /// First AnglesToAxis call site to hook
    #[strum(serialize = "CG_CalcViewValues")]
    CgCalcViewValues,
    #[strum(serialize = "CG_DObjGetWorldTagMatrix")]
    CgDObjGetWorldTagMatrix,
    #[strum(serialize = "CG_DrawDisconnect")]
    CgDrawDisconnect,
    #[strum(serialize = "CG_DrawTracer")]
    CgDrawTracer,
    /// Second AnglesToAxis call site to hook
    #[strum(serialize = "CG_OffsetThirdPersonView")]
    CgOffsetThirdPersonView,
    #[strum(serialize = "CL_SystemInfoChanged")]
    ClSystemInfoChanged,
    #[strum(serialize = "CL_Vid_Restart_f")]
    ClVidRestartF,
    #[strum(serialize = "Dvar_FindMalleable")]
    DvarFindMalleable,
    #[strum(serialize = "FX_SetupCamera")]
    FxSetupCamera,
    #[strum(serialize = "R_SetViewParmsForScene")]
    RSetViewParmsForScene,
    #[strum(serialize = "SV_Frame")]
    SvFrame,
    #[strum(serialize = "clientConnection")]
    ClientConnection,
    #[strum(serialize = "clientStatic")]
    ClientStatic,
    #[strum(serialize = "clientActive")]
    ClientActive,
    #[strum(serialize = "clientGlobalsStatic")]
    ClientGlobalsStatic,
    #[strum(serialize = "clientGlobals")]
    ClientGlobals,
    #[strum(serialize = "mouseVars")]
    MouseVars,
    /// CoD4X replacement of CL_SystemInfoChanged
    #[strum(serialize = "CL_SystemInfoChangedCoD4X")]
    ClSystemInfoChangedCoD4X,
}

impl Iw3Symbol {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl AsRef<str> for Iw3Symbol {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

// (symbol, pattern, class, offset, transform, module)
type Row = (
    Iw3Symbol,
    &'static str,
    AddressClass,
    i64,
    Transform,
    ModuleTarget,
);

#[rustfmt::skip]
const IW3_ROWS: &[Row] = {
    use AddressClass::{Code, Data};
    use ModuleTarget::{Primary, SecondaryOptional};
    use Transform::{DereferenceAddress, FollowCodeFlow};
    const NONE: Transform = Transform::None;

    &[
        (Iw3Symbol::Fopen, "51 8D 90 ?? ?? ?? ?? 52 50 E8 ?? ?? ?? ?? 68 ?? ?? ?? ?? 57", Code, 20, FollowCodeFlow, Primary),
        (Iw3Symbol::AnglesToAxis, "53 8D 4C 24 ?? E8 ?? ?? ?? ?? 8D 54 24 ?? 8D 74 24 ?? 8B D8", Code, 20, FollowCodeFlow, Primary),
        (Iw3Symbol::CbufAddText, "8B F0 8B F9 FF 15 ?? ?? ?? ?? 8A 06", Code, -8, NONE, Primary),
        (Iw3Symbol::CgAddPlayerSpriteDrawSurfs, "8B F8 83 C7 ?? 8B 8E ?? ?? ?? ?? 3B 0D ?? ?? ?? ?? 75 ?? 83 3D ?? ?? ?? ?? 00", Code, 26, NONE, Primary),
        (Iw3Symbol::CgCalcViewValues, "E8 ?? ?? ?? ?? 83 3D ?? ?? ?? ?? 00 74 ?? 68 ?? ?? ?? ?? E8", Code, -5, NONE, Primary),
        (Iw3Symbol::CgDObjGetWorldTagMatrix, "5C 24 ?? 55 8B 6C 24 ?? 56 8D 44 24 ?? 50 51 8B CB C6 44 24", Code, -5, NONE, Primary),
        (Iw3Symbol::CgDrawDisconnect, "00 53 56 57 8B F0 0F 85 ?? ?? ?? ?? 8D 44 24", Code, -9, NONE, Primary),
        (Iw3Symbol::CgDrawTracer, "6B FF ?? 81 C7 ?? ?? ?? ?? ?? ?? ?? ?? ?? 8D 74 24 ?? F3 A5 83 05 ?? ?? ?? ?? 01", Code, 9, NONE, Primary),
        (Iw3Symbol::CgOffsetThirdPersonView, "8D 74 24 ?? D9 5C 24 ?? ?? ?? ?? ?? ?? 5F 5E 5B 8B E5 5D C3", Code, 8, NONE, Primary),
        (Iw3Symbol::ClSystemInfoChanged, "53 55 56 8B F0 05 ?? ?? ?? ?? 8B C8 57 8B", Code, -8, NONE, Primary),
        (Iw3Symbol::ClVidRestartF, "81 EC ?? ?? 00 00 A1 ?? ?? ?? ?? 53 33 DB 39", Code, -6, NONE, Primary),
        (Iw3Symbol::DvarFindMalleable, "85 C0 74 ?? 8B FE E8 ?? ?? ?? ?? 8B 0D ?? ?? ?? ?? D9 41 ?? D8 4C 24 0C D9 5E 0C 5F 5E C3", Code, -5, FollowCodeFlow, Primary),
        (Iw3Symbol::FxSetupCamera, "83 EC ?? D9 46 ?? D9 1D ?? ?? ?? ?? D9 46 ?? D9 1D", Code, -6, NONE, Primary),
        (Iw3Symbol::RSetViewParmsForScene, "8B F8 6A 00 57 E8 ?? ?? ?? ?? D9 46 ?? D9 9F", Code, -7, NONE, Primary),
        (Iw3Symbol::SvFrame, "8B C6 59 C3 56 E8 ?? ?? ?? ?? 83 C4 04 ?? ?? ?? ?? ?? CC", Code, 13, NONE, Primary),
        (Iw3Symbol::ClientConnection, "BA ?? ?? ?? ?? E8 ?? ?? ?? ?? 80 3D", Data, 1, DereferenceAddress, Primary),
        (Iw3Symbol::ClientStatic, "68 ?? ?? ?? ?? E8 ?? ?? ?? ?? 83 C4 0C 68 ?? ?? ?? ?? C1 E6 04", Data, 1, DereferenceAddress, Primary),
        (Iw3Symbol::ClientActive, "05 ?? ?? ?? ?? B9 01 00 00 00 01 88 B8 56 02 00", Data, 1, DereferenceAddress, Primary),
        (Iw3Symbol::ClientGlobalsStatic, "68 ?? ?? ?? ?? E8 ?? ?? ?? ?? 83 C4 0C 68 F0 E7 0F 00", Data, 1, DereferenceAddress, Primary),
        (Iw3Symbol::ClientGlobals, "BA ?? ?? ?? ?? E8 ?? ?? ?? ?? D9 03", Data, 1, DereferenceAddress, Primary),
        (Iw3Symbol::MouseVars, "89 1D ?? ?? ?? ?? 5E 5F", Data, 2, DereferenceAddress, Primary),
        (Iw3Symbol::ClSystemInfoChangedCoD4X, "00 00 E8 ?? ?? ?? ?? 29 C4 C7 04 24 01 00 00 00 E8", Code, -7, NONE, SecondaryOptional),
    ]
};

/// Fresh copy of the built-in IW3 descriptor set
pub fn builtin_signatures() -> DescriptorSet {
    IW3_ROWS.iter().fold(
        DescriptorSet::new(IW3_GAME, PointerWidth::Bits32),
        |set, &(symbol, pattern, class, offset, transform, module)| {
            let pattern = pattern
                .parse::<Pattern>()
                .unwrap_or_else(|e| panic!("built-in pattern for {} is invalid: {}", symbol, e));
            set.with_entry(SymbolEntry::single(
                symbol.name(),
                PatternDescriptor::new(pattern, class, offset)
                    .with_transform(transform)
                    .with_module(module),
            ))
        },
    )
}

//! Conversions between native integers and zerocopy's endian-aware wrappers.
//!
//! `bitfield-struct` requires const `from`/`into` functions when a field's
//! storage type differs from its accessor type; these shims let packed
//! little-endian fields round-trip through the wrapper types.

pub(crate) mod conv_u64le {
    use zerocopy::{LE, U64};

    pub(crate) const fn from_inner(n: u64) -> U64<LE> {
        U64::<LE>::new(n)
    }

    pub(crate) const fn into_inner(v: U64<LE>) -> u64 {
        v.get()
    }
}

pub(crate) mod conv_u32le {
    use zerocopy::{LE, U32};

    pub(crate) const fn from_inner(n: u32) -> U32<LE> {
        U32::<LE>::new(n)
    }

    pub(crate) const fn into_inner(v: U32<LE>) -> u32 {
        v.get()
    }
}

pub(crate) mod conv_u16le {
    use zerocopy::{LE, U16};

    pub(crate) const fn from_inner(n: u16) -> U16<LE> {
        U16::<LE>::new(n)
    }

    pub(crate) const fn into_inner(v: U16<LE>) -> u16 {
        v.get()
    }
}

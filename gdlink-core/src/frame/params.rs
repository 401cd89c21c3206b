/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::abi::AbiValue;
use super::call_frame::{CallFrame, FrameArg};
use crate::sys;

/// Argument list of an outgoing call, pushed element by element in tuple order.
pub trait ParamTuple<'a>: Sized {
    const LEN: usize;

    fn push_into(self, frame: &mut CallFrame<'a>);
}

/// Argument list of an incoming (virtual) call, read from the engine's argument array.
pub trait InParamTuple: Sized {
    const LEN: usize;

    /// Reflection type names of the elements, in order.
    const TYPE_NAMES: &'static [&'static str];

    /// # Safety
    /// `args` must point to at least [`LEN`](Self::LEN) argument pointers, each to a value of the corresponding type in its
    /// ABI encoding.
    unsafe fn read_from(args: *const sys::ConstTypePtr) -> Self;
}

macro_rules! count_idents {
    () => { 0 };
    ($id:ident $($rest:ident)*) => { 1 + count_idents!($($rest)*) };
}

macro_rules! impl_param_tuple {
    ($($n:tt: $P:ident),*) => {
        impl<'a, $($P),*> ParamTuple<'a> for ($($P,)*)
        where
            $($P: FrameArg<'a>,)*
        {
            const LEN: usize = count_idents!($($P)*);

            #[allow(unused_variables)]
            fn push_into(self, frame: &mut CallFrame<'a>) {
                $(
                    self.$n.push_to(frame);
                )*
            }
        }

        impl<$($P),*> InParamTuple for ($($P,)*)
        where
            $($P: AbiValue,)*
        {
            const LEN: usize = count_idents!($($P)*);
            const TYPE_NAMES: &'static [&'static str] = &[$(<$P as AbiValue>::TYPE_NAME),*];

            #[allow(unused_variables, clippy::unused_unit)]
            unsafe fn read_from(args: *const sys::ConstTypePtr) -> Self {
                (
                    $(
                        <$P as AbiValue>::abi_read(*args.add($n)),
                    )*
                )
            }
        }
    };
}

impl_param_tuple!();
impl_param_tuple!(0: P0);
impl_param_tuple!(0: P0, 1: P1);
impl_param_tuple!(0: P0, 1: P1, 2: P2);
impl_param_tuple!(0: P0, 1: P1, 2: P2, 3: P3);
impl_param_tuple!(0: P0, 1: P1, 2: P2, 3: P3, 4: P4);
impl_param_tuple!(0: P0, 1: P1, 2: P2, 3: P3, 4: P4, 5: P5);
impl_param_tuple!(0: P0, 1: P1, 2: P2, 3: P3, 4: P4, 5: P5, 6: P6);
impl_param_tuple!(0: P0, 1: P1, 2: P2, 3: P3, 4: P4, 5: P5, 6: P6, 7: P7);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::abi::encode;

    #[test]
    fn lengths() {
        assert_eq!(<() as InParamTuple>::LEN, 0);
        assert_eq!(<(i32,) as InParamTuple>::LEN, 1);
        assert_eq!(<(i32, f32, bool, u8, i64, f64, u16, i8) as InParamTuple>::LEN, 8);
        assert_eq!(<(f64, bool) as InParamTuple>::TYPE_NAMES, &["float", "bool"]);
    }

    #[test]
    fn reads_engine_argument_array() {
        let slots = [encode(10i64), encode(true), encode(0.25f64)];
        let args: Vec<sys::ConstTypePtr> = slots.iter().map(|s| s.as_ptr() as sys::ConstTypePtr).collect();

        let (a, b, c) = unsafe { <(i32, bool, f32)>::read_from(args.as_ptr()) };
        assert_eq!((a, b, c), (10, true, 0.25));
    }
}

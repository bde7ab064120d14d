//! The element-type list and the dispatch macros expanded from it
//!
//! `for_each_element_type!` is the only place the supported element types are
//! spelled out. `DType`, `Scalar`, `ErasedArray`, the `Element` impls and every
//! dispatch `match` are generated from it, so the set of handled types cannot
//! drift between call sites.

/// Invokes `$callback!` with the list of supported element types.
///
/// Each entry is `(Variant, rust_type, "canonical name", "doc")`. Tokens passed
/// after the callback name are forwarded in a leading `[...]` group.
macro_rules! for_each_element_type {
    ($callback:ident $(, $($extra:tt)*)?) => {
        $callback! {
            [$($($extra)*)?]
            (Bool, bool, "bool", "Boolean"),
            (I32, i32, "int32", "32-bit signed integer"),
            (U32, u32, "uint32", "32-bit unsigned integer"),
            (F32, f32, "float32", "32-bit floating point"),
            (F64, f64, "float64", "64-bit floating point"),
        }
    };
}

/// Matches an `ErasedArray` (by value or by reference) and evaluates `$body`
/// with `$array` bound to the typed `ndarray` payload.
macro_rules! dispatch_erased {
    ($erased:expr, $array:ident => $body:expr) => {
        for_each_element_type!(__dispatch_erased_arms, $erased, $array, $body)
    };
}

macro_rules! __dispatch_erased_arms {
    ([$erased:expr, $array:ident, $body:expr]
     $(($variant:ident, $ty:ty, $name:literal, $doc:literal)),* $(,)?) => {
        match $erased {
            $($crate::erased::ErasedArray::$variant($array) => $body,)*
        }
    };
}

/// Matches two `ErasedArray`s holding the same element type. `$body` runs with
/// both payloads bound; any mixed pair evaluates `$mismatch`.
macro_rules! dispatch_erased_pair {
    ($lhs:expr, $rhs:expr, ($a:ident, $b:ident) => $body:expr, _ => $mismatch:expr) => {
        for_each_element_type!(__dispatch_pair_arms, $lhs, $rhs, $a, $b, $body, $mismatch)
    };
}

macro_rules! __dispatch_pair_arms {
    ([$lhs:expr, $rhs:expr, $a:ident, $b:ident, $body:expr, $mismatch:expr]
     $(($variant:ident, $ty:ty, $name:literal, $doc:literal)),* $(,)?) => {
        match ($lhs, $rhs) {
            $(
                ($crate::erased::ErasedArray::$variant($a), $crate::erased::ErasedArray::$variant($b)) => $body,
            )*
            _ => $mismatch,
        }
    };
}

/// Selects the Rust element type for a runtime `DType` and evaluates `$body`
/// with `$T` aliased to it.
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:expr) => {
        for_each_element_type!(__dispatch_dtype_arms, $dtype, $T, $body)
    };
}

macro_rules! __dispatch_dtype_arms {
    ([$dtype:expr, $T:ident, $body:expr]
     $(($variant:ident, $ty:ty, $name:literal, $doc:literal)),* $(,)?) => {
        match $dtype {
            $(
                $crate::dtype::DType::$variant => {
                    #[allow(dead_code)]
                    type $T = $ty;
                    $body
                }
            )*
        }
    };
}

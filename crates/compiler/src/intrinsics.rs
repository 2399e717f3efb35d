//! The closed `@intrinsic.*` surface.
//!
//! Each intrinsic has a fixed signature: how many type arguments it
//! takes, how many value arguments, and how its result type derives from
//! the type arguments. The semantic analyzer validates calls against
//! this table; the code generator maps each name to a specific LLVM
//! instruction or intrinsic call. Intrinsics are legal only inside
//! `danger!` blocks.

/// How an intrinsic's result type is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicResult {
    /// Same as the first type argument.
    TypeArg0,
    /// Same as the second type argument (conversions).
    TypeArg1,
    Bool,
    Void,
    /// `Maybe<T>` of the first type argument (`*.checked` arithmetic).
    Maybe0,
    /// Raw pointer.
    Pointer,
}

/// Signature of one intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrinsicSig {
    pub path: &'static str,
    pub type_params: usize,
    pub args: usize,
    pub result: IntrinsicResult,
}

const fn sig(
    path: &'static str,
    type_params: usize,
    args: usize,
    result: IntrinsicResult,
) -> IntrinsicSig {
    IntrinsicSig { path, type_params, args, result }
}

use IntrinsicResult::*;

/// The full intrinsic table. Closed: anything not listed here is an
/// unknown-intrinsic diagnostic.
pub const INTRINSICS: &[IntrinsicSig] = &[
    // Integer arithmetic. `wrap` maps to the raw instruction, `checked`
    // to the overflow intrinsics, `saturate` to the saturating ones.
    sig("add.wrap", 1, 2, TypeArg0),
    sig("sub.wrap", 1, 2, TypeArg0),
    sig("mul.wrap", 1, 2, TypeArg0),
    sig("add.checked.signed", 1, 2, Maybe0),
    sig("add.checked.unsigned", 1, 2, Maybe0),
    sig("sub.checked.signed", 1, 2, Maybe0),
    sig("sub.checked.unsigned", 1, 2, Maybe0),
    sig("mul.checked.signed", 1, 2, Maybe0),
    sig("mul.checked.unsigned", 1, 2, Maybe0),
    sig("add.saturate.signed", 1, 2, TypeArg0),
    sig("add.saturate.unsigned", 1, 2, TypeArg0),
    sig("sub.saturate.signed", 1, 2, TypeArg0),
    sig("sub.saturate.unsigned", 1, 2, TypeArg0),
    sig("div.signed", 1, 2, TypeArg0),
    sig("div.unsigned", 1, 2, TypeArg0),
    sig("rem.signed", 1, 2, TypeArg0),
    sig("rem.unsigned", 1, 2, TypeArg0),
    sig("neg", 1, 1, TypeArg0),
    // Float arithmetic.
    sig("fadd", 1, 2, TypeArg0),
    sig("fsub", 1, 2, TypeArg0),
    sig("fmul", 1, 2, TypeArg0),
    sig("fdiv", 1, 2, TypeArg0),
    sig("frem", 1, 2, TypeArg0),
    sig("fneg", 1, 1, TypeArg0),
    // Bitwise and shifts. Logical vs. arithmetic right shift explicit.
    sig("and", 1, 2, TypeArg0),
    sig("or", 1, 2, TypeArg0),
    sig("xor", 1, 2, TypeArg0),
    sig("not", 1, 1, TypeArg0),
    sig("shl", 1, 2, TypeArg0),
    sig("shr.logical", 1, 2, TypeArg0),
    sig("shr.arith", 1, 2, TypeArg0),
    // Integer comparisons with explicit signedness.
    sig("cmp.eq", 1, 2, Bool),
    sig("cmp.ne", 1, 2, Bool),
    sig("cmp.lt.signed", 1, 2, Bool),
    sig("cmp.lt.unsigned", 1, 2, Bool),
    sig("cmp.le.signed", 1, 2, Bool),
    sig("cmp.le.unsigned", 1, 2, Bool),
    sig("cmp.gt.signed", 1, 2, Bool),
    sig("cmp.gt.unsigned", 1, 2, Bool),
    sig("cmp.ge.signed", 1, 2, Bool),
    sig("cmp.ge.unsigned", 1, 2, Bool),
    // Float comparisons, ordered and unordered.
    sig("fcmp.oeq", 1, 2, Bool),
    sig("fcmp.one", 1, 2, Bool),
    sig("fcmp.olt", 1, 2, Bool),
    sig("fcmp.ole", 1, 2, Bool),
    sig("fcmp.ogt", 1, 2, Bool),
    sig("fcmp.oge", 1, 2, Bool),
    sig("fcmp.ueq", 1, 2, Bool),
    sig("fcmp.une", 1, 2, Bool),
    // Type conversions: `<From, To>(value)`.
    sig("trunc", 2, 1, TypeArg1),
    sig("zext", 2, 1, TypeArg1),
    sig("sext", 2, 1, TypeArg1),
    sig("fptrunc", 2, 1, TypeArg1),
    sig("fpext", 2, 1, TypeArg1),
    sig("fptosi", 2, 1, TypeArg1),
    sig("fptoui", 2, 1, TypeArg1),
    sig("sitofp", 2, 1, TypeArg1),
    sig("uitofp", 2, 1, TypeArg1),
    sig("bitcast", 2, 1, TypeArg1),
    // Bit manipulation.
    sig("ctpop", 1, 1, TypeArg0),
    sig("ctlz", 1, 1, TypeArg0),
    sig("cttz", 1, 1, TypeArg0),
    sig("bswap", 1, 1, TypeArg0),
    sig("bitreverse", 1, 1, TypeArg0),
    // Memory.
    sig("load", 1, 1, TypeArg0),
    sig("store", 1, 2, Void),
    sig("load.volatile", 1, 1, TypeArg0),
    sig("store.volatile", 1, 2, Void),
    sig("ptr.offset", 1, 2, Pointer),
    sig("invalidate", 0, 1, Void),
    // Atomics, all sequentially consistent.
    sig("atomic.load", 1, 1, TypeArg0),
    sig("atomic.store", 1, 2, Void),
    sig("atomic.add", 1, 2, TypeArg0),
    sig("atomic.sub", 1, 2, TypeArg0),
    sig("atomic.and", 1, 2, TypeArg0),
    sig("atomic.or", 1, 2, TypeArg0),
    sig("atomic.xor", 1, 2, TypeArg0),
    sig("atomic.xchg", 1, 2, TypeArg0),
    sig("atomic.cmpxchg", 1, 3, Bool),
    // Math, lowered to LLVM intrinsic calls.
    sig("math.sqrt", 1, 1, TypeArg0),
    sig("math.abs", 1, 1, TypeArg0),
    sig("math.fabs", 1, 1, TypeArg0),
    sig("math.floor", 1, 1, TypeArg0),
    sig("math.ceil", 1, 1, TypeArg0),
    sig("math.round", 1, 1, TypeArg0),
    sig("math.trunc", 1, 1, TypeArg0),
    sig("math.pow", 1, 2, TypeArg0),
    sig("math.exp", 1, 1, TypeArg0),
    sig("math.log", 1, 1, TypeArg0),
    sig("math.log10", 1, 1, TypeArg0),
    sig("math.sin", 1, 1, TypeArg0),
    sig("math.cos", 1, 1, TypeArg0),
];

/// Look up an intrinsic by its dotted path.
pub fn signature(path: &str) -> Option<&'static IntrinsicSig> {
    INTRINSICS.iter().find(|s| s.path == path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_and_unknown() {
        let add = signature("add.wrap").unwrap();
        assert_eq!(add.type_params, 1);
        assert_eq!(add.args, 2);
        assert_eq!(add.result, IntrinsicResult::TypeArg0);
        assert!(signature("summon.demons").is_none());
    }

    #[test]
    fn conversions_take_two_type_args() {
        for name in ["trunc", "zext", "sext", "fptosi", "uitofp", "bitcast"] {
            let s = signature(name).unwrap();
            assert_eq!(s.type_params, 2, "{}", name);
            assert_eq!(s.result, IntrinsicResult::TypeArg1, "{}", name);
        }
    }

    #[test]
    fn table_paths_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for s in INTRINSICS {
            assert!(seen.insert(s.path), "duplicate intrinsic {}", s.path);
        }
    }

    #[test]
    fn surface_is_about_eighty_names() {
        assert!(INTRINSICS.len() >= 75 && INTRINSICS.len() <= 95);
    }
}

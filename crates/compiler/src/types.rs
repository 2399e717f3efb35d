//! Type information and the unified type registry.
//!
//! Every type the compiler knows about — intrinsics, primitive-like
//! records, user declarations, generic templates and their
//! instantiations, error-handling wrappers, memory wrappers — lives in
//! one [`TypeRegistry`] keyed by canonical name. The registry is built to
//! completion by the semantic analyzer; code generation only reads it.
//!
//! Registration order is preserved so emitted IR is deterministic.

use crate::ast::{FunctionDecl, TypeDecl, VariantCase};
use bitflags::bitflags;
use std::collections::{HashMap, HashSet};
use std::fmt;

bitflags! {
    /// Protocol membership flags. Primitive-like records are
    /// pre-populated; user types gain members through `follows`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Protocols: u32 {
        const NUMERIC          = 1 << 0;
        const SIGNED_INTEGER   = 1 << 1;
        const UNSIGNED_INTEGER = 1 << 2;
        const FLOATING_POINT   = 1 << 3;
        const FIXED_WIDTH      = 1 << 4;
        const EQUATABLE        = 1 << 5;
        const COMPARABLE       = 1 << 6;
        const HASHABLE         = 1 << 7;
        const PARSABLE         = 1 << 8;
        const PRINTABLE        = 1 << 9;
        const COPYABLE         = 1 << 10;
        const MOVABLE          = 1 << 11;
        const DROPPABLE        = 1 << 12;
        const CRASHABLE        = 1 << 13;
        const ITERABLE         = 1 << 14;
        const INDEXABLE        = 1 << 15;
        const COLLECTION       = 1 << 16;
        const DECIMAL          = 1 << 17;
    }
}

impl Protocols {
    /// Resolve a protocol name from source (`follows Comparable`).
    pub fn from_source_name(name: &str) -> Option<Protocols> {
        let p = match name {
            "Numeric" => Protocols::NUMERIC,
            "SignedInteger" => Protocols::SIGNED_INTEGER,
            "UnsignedInteger" => Protocols::UNSIGNED_INTEGER,
            "FloatingPoint" => Protocols::FLOATING_POINT,
            "FixedWidth" => Protocols::FIXED_WIDTH,
            "Equatable" => Protocols::EQUATABLE,
            "Comparable" => Protocols::COMPARABLE,
            "Hashable" => Protocols::HASHABLE,
            "Parsable" => Protocols::PARSABLE,
            "Printable" => Protocols::PRINTABLE,
            "Copyable" => Protocols::COPYABLE,
            "Movable" => Protocols::MOVABLE,
            "Droppable" => Protocols::DROPPABLE,
            "Crashable" => Protocols::CRASHABLE,
            "Iterable" => Protocols::ITERABLE,
            "Indexable" => Protocols::INDEXABLE,
            "Collection" => Protocols::COLLECTION,
            "Decimal" => Protocols::DECIMAL,
            _ => return None,
        };
        Some(p)
    }

    fn scalar_common() -> Protocols {
        Protocols::EQUATABLE
            | Protocols::COMPARABLE
            | Protocols::HASHABLE
            | Protocols::PARSABLE
            | Protocols::PRINTABLE
            | Protocols::COPYABLE
    }

    pub fn signed_integer() -> Protocols {
        Protocols::NUMERIC
            | Protocols::SIGNED_INTEGER
            | Protocols::FIXED_WIDTH
            | Self::scalar_common()
    }

    pub fn unsigned_integer() -> Protocols {
        Protocols::NUMERIC
            | Protocols::UNSIGNED_INTEGER
            | Protocols::FIXED_WIDTH
            | Self::scalar_common()
    }

    pub fn floating_point() -> Protocols {
        Protocols::NUMERIC
            | Protocols::FLOATING_POINT
            | Protocols::FIXED_WIDTH
            | Self::scalar_common()
    }

    pub fn decimal() -> Protocols {
        Protocols::NUMERIC | Protocols::DECIMAL | Protocols::FIXED_WIDTH | Self::scalar_common()
    }
}

/// Resolved type of an expression or declaration: the canonical name plus
/// enough classification for checking and code generation.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// Canonical, possibly generic-instantiated form
    /// (`List<s32>`, `Range<BackIndex<uaddr>>`).
    pub name: String,
    pub is_reference: bool,
    pub generic_args: Vec<TypeInfo>,
    pub is_generic_parameter: bool,
    pub protocols: Protocols,
}

impl TypeInfo {
    pub fn named(name: impl Into<String>) -> TypeInfo {
        TypeInfo {
            name: name.into(),
            is_reference: false,
            generic_args: Vec::new(),
            is_generic_parameter: false,
            protocols: Protocols::empty(),
        }
    }

    pub fn with_protocols(mut self, protocols: Protocols) -> TypeInfo {
        self.protocols = protocols;
        self
    }

    pub fn reference(mut self) -> TypeInfo {
        self.is_reference = true;
        self
    }

    pub fn generic_parameter(name: impl Into<String>) -> TypeInfo {
        TypeInfo {
            name: name.into(),
            is_reference: false,
            generic_args: Vec::new(),
            is_generic_parameter: true,
            protocols: Protocols::empty(),
        }
    }

    /// The unit/void pseudo-type of routines without a return type.
    pub fn void() -> TypeInfo {
        TypeInfo::named("void")
    }

    pub fn is_void(&self) -> bool {
        self.name == "void"
    }

    /// Sentinel produced after an error so analysis can continue without
    /// cascading diagnostics.
    pub fn error() -> TypeInfo {
        TypeInfo::named("<error>")
    }

    pub fn is_error(&self) -> bool {
        self.name == "<error>"
    }

    pub fn base_name(&self) -> &str {
        crate::generics::extract_base_name(&self.name)
    }

    pub fn is_integer(&self) -> bool {
        self.protocols
            .intersects(Protocols::SIGNED_INTEGER | Protocols::UNSIGNED_INTEGER)
    }

    pub fn is_signed(&self) -> bool {
        self.protocols.contains(Protocols::SIGNED_INTEGER)
    }

    pub fn is_unsigned(&self) -> bool {
        self.protocols.contains(Protocols::UNSIGNED_INTEGER)
    }

    pub fn is_float(&self) -> bool {
        self.protocols.contains(Protocols::FLOATING_POINT)
    }

    pub fn is_numeric(&self) -> bool {
        self.protocols.contains(Protocols::NUMERIC)
    }

    pub fn is_bool(&self) -> bool {
        self.name == "bool"
    }

    /// True for the non-storable scoped-token wrappers.
    pub fn is_scoped_token(&self) -> bool {
        matches!(
            self.base_name(),
            "Viewed" | "Hijacked" | "Inspected" | "Seized"
        )
    }

    /// True for the storable owning handles.
    pub fn is_handle(&self) -> bool {
        matches!(self.base_name(), "Shared" | "Tracked" | "Snatched")
    }

    /// True for the transient error-handling wrappers.
    pub fn is_error_wrapper(&self) -> bool {
        matches!(self.base_name(), "Maybe" | "Result" | "Lookup")
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A field of a structural type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub type_info: TypeInfo,
}

/// One case of a variant entry: name plus optional payload type.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCaseInfo {
    pub name: String,
    pub payload: Option<TypeInfo>,
}

/// Error-handling wrapper flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorWrapperKind {
    Maybe,
    Result,
    Lookup,
}

impl ErrorWrapperKind {
    pub fn from_base(name: &str) -> Option<ErrorWrapperKind> {
        match name {
            "Maybe" => Some(ErrorWrapperKind::Maybe),
            "Result" => Some(ErrorWrapperKind::Result),
            "Lookup" => Some(ErrorWrapperKind::Lookup),
            _ => None,
        }
    }
}

/// Memory wrapper flavor: scoped tokens vs. storable handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    Viewed,
    Hijacked,
    Inspected,
    Seized,
    Shared,
    Tracked,
    Snatched,
}

impl WrapperKind {
    pub fn from_base(name: &str) -> Option<WrapperKind> {
        match name {
            "Viewed" => Some(WrapperKind::Viewed),
            "Hijacked" => Some(WrapperKind::Hijacked),
            "Inspected" => Some(WrapperKind::Inspected),
            "Seized" => Some(WrapperKind::Seized),
            "Shared" => Some(WrapperKind::Shared),
            "Tracked" => Some(WrapperKind::Tracked),
            "Snatched" => Some(WrapperKind::Snatched),
            _ => None,
        }
    }

    /// Scoped tokens are pinned to their creation block and never
    /// storable; handles own and may be stored.
    pub fn is_token(self) -> bool {
        matches!(
            self,
            WrapperKind::Viewed | WrapperKind::Hijacked | WrapperKind::Inspected
                | WrapperKind::Seized
        )
    }
}

/// A registry entry, tagged by what kind of type it describes.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeEntry {
    /// `@intrinsic.i32`-level machine types.
    Intrinsic { llvm: &'static str, bits: u32, float: bool },
    /// Value-semantics record. Single-field records wrapping an intrinsic
    /// carry `llvm_underlying` so the generator can unwrap uniformly.
    Record {
        fields: Vec<FieldInfo>,
        is_single_field: bool,
        llvm_underlying: Option<String>,
        protocols: Protocols,
    },
    /// Reference-semantics entity (pointer to struct).
    Entity {
        fields: Vec<FieldInfo>,
        base: Option<String>,
        protocols: Protocols,
    },
    /// Reference semantics with fixed size and program-lifetime storage.
    Resident { fields: Vec<FieldInfo>, protocols: Protocols },
    /// Enumeration with explicit discriminant values.
    Choice { cases: Vec<(String, i64)> },
    /// Tagged union; each case has at most one payload type.
    Variant { cases: Vec<VariantCaseInfo>, protocols: Protocols },
    /// Untagged union, danger-only.
    Mutant { fields: Vec<FieldInfo> },
    /// Protocol with required method signatures (name → mangled-free key).
    Protocol { methods: Vec<String> },
    /// `Maybe<T>` / `Result<T>` / `Lookup<T>` instantiation.
    ErrorWrapper { kind: ErrorWrapperKind, inner: TypeInfo },
    /// Scoped token or handle instantiation.
    MemoryWrapper { kind: WrapperKind, inner: TypeInfo },
}

/// What a generic template declares.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateDecl {
    Record(TypeDecl),
    Entity(TypeDecl),
    Variant { name: String, cases: Vec<VariantCase> },
    Function(FunctionDecl),
}

/// A generic template awaiting instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEntry {
    pub params: Vec<String>,
    /// Protocol constraints per parameter, parallel to `params`.
    pub constraints: Vec<Vec<String>>,
    pub decl: TemplateDecl,
}

/// How a function entered the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Free,
    Method,
    Constructor,
    /// Compiler-derived `try_` / `check_` / `find_` variant.
    DerivedVariant,
    External,
    Lambda,
}

/// A function signature in the registry. Key format: bare name for free
/// functions (`divide!`), `Type.method` for methods, template-parameter
/// form for generic methods (`TestType<T>.get_value`).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    /// Display name with `!` restored where applicable.
    pub name: String,
    pub kind: FunctionKind,
    pub receiver: Option<String>,
    pub parameters: Vec<FieldInfo>,
    pub return_type: TypeInfo,
    pub generic_params: Vec<String>,
    pub calling_convention: String,
    pub is_external: bool,
    pub is_usurping: bool,
    pub fallible: bool,
    pub can_throw: bool,
    pub can_absent: bool,
    /// For derived variants, the key of the fallible original.
    pub derived_from: Option<String>,
}

impl FunctionInfo {
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

/// One requested monomorphization of a generic function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInstantiation {
    /// Canonical instance key, e.g. `identity<s64>` or
    /// `TestType<s64>.get_value`.
    pub canonical: String,
    /// Template key it instantiates.
    pub template: String,
    pub substitution: HashMap<String, String>,
}

/// Unified directory of every type and function in the compilation.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    entries: HashMap<String, TypeEntry>,
    /// Insertion order of `entries`, for deterministic iteration.
    order: Vec<String>,
    templates: HashMap<String, TemplateEntry>,
    functions: HashMap<String, FunctionInfo>,
    function_order: Vec<String>,
    function_instantiations: Vec<FunctionInstantiation>,
    instantiated: HashSet<String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    // ---- types ----

    /// Register a type under its canonical name. Re-registration with an
    /// identical entry is the idempotent-instantiation case and succeeds;
    /// a conflicting entry reports a duplicate.
    pub fn register_type(&mut self, name: impl Into<String>, entry: TypeEntry) -> Result<(), ()> {
        let name = name.into();
        match self.entries.get(&name) {
            Some(existing) if *existing == entry => Ok(()),
            Some(_) => Err(()),
            None => {
                self.order.push(name.clone());
                self.entries.insert(name, entry);
                Ok(())
            }
        }
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeEntry> {
        self.entries.get(name)
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Canonical names in registration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Fields of a structural type, if it has any.
    pub fn fields_of(&self, name: &str) -> Option<&[FieldInfo]> {
        match self.entries.get(name)? {
            TypeEntry::Record { fields, .. }
            | TypeEntry::Entity { fields, .. }
            | TypeEntry::Resident { fields, .. }
            | TypeEntry::Mutant { fields } => Some(fields),
            _ => None,
        }
    }

    // ---- templates ----

    pub fn register_template(&mut self, key: impl Into<String>, entry: TemplateEntry) {
        self.templates.insert(key.into(), entry);
    }

    pub fn template(&self, key: &str) -> Option<&TemplateEntry> {
        self.templates.get(key)
    }

    pub fn has_template(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    pub fn template_keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    // ---- functions ----

    pub fn register_function(
        &mut self,
        key: impl Into<String>,
        info: FunctionInfo,
    ) -> Result<(), ()> {
        let key = key.into();
        if self.functions.contains_key(&key) {
            return Err(());
        }
        self.function_order.push(key.clone());
        self.functions.insert(key, info);
        Ok(())
    }

    pub fn function(&self, key: &str) -> Option<&FunctionInfo> {
        self.functions.get(key)
    }

    pub fn function_mut(&mut self, key: &str) -> Option<&mut FunctionInfo> {
        self.functions.get_mut(key)
    }

    pub fn function_keys(&self) -> impl Iterator<Item = &str> {
        self.function_order.iter().map(String::as_str)
    }

    /// All derived variants of a fallible function key.
    pub fn variants_of(&self, original: &str) -> Vec<&str> {
        self.function_order
            .iter()
            .filter(|k| {
                self.functions
                    .get(*k)
                    .and_then(|f| f.derived_from.as_deref())
                    == Some(original)
            })
            .map(String::as_str)
            .collect()
    }

    // ---- instantiations ----

    /// Record a function monomorphization. Idempotent: the same canonical
    /// key registers exactly once.
    pub fn request_function_instantiation(&mut self, inst: FunctionInstantiation) {
        if self.instantiated.insert(inst.canonical.clone()) {
            self.function_instantiations.push(inst);
        }
    }

    pub fn function_instantiations(&self) -> &[FunctionInstantiation] {
        &self.function_instantiations
    }

    pub fn is_instantiated(&self, canonical: &str) -> bool {
        self.instantiated.contains(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_names_resolve() {
        assert_eq!(Protocols::from_source_name("Comparable"), Some(Protocols::COMPARABLE));
        assert_eq!(Protocols::from_source_name("NotAProtocol"), None);
        assert!(Protocols::signed_integer().contains(Protocols::NUMERIC));
        assert!(!Protocols::unsigned_integer().contains(Protocols::SIGNED_INTEGER));
    }

    #[test]
    fn type_info_classification() {
        let s32 = TypeInfo::named("s32").with_protocols(Protocols::signed_integer());
        assert!(s32.is_integer() && s32.is_signed() && !s32.is_float());
        let seized = TypeInfo::named("Seized<Counter>");
        assert!(seized.is_scoped_token());
        assert!(!seized.is_handle());
        let shared = TypeInfo::named("Shared<Counter>");
        assert!(shared.is_handle());
        let maybe = TypeInfo::named("Maybe<s32>");
        assert!(maybe.is_error_wrapper());
    }

    #[test]
    fn registry_registration_is_idempotent_for_identical_entries() {
        let mut reg = TypeRegistry::new();
        let entry = TypeEntry::Record {
            fields: vec![FieldInfo { name: "value".into(), type_info: TypeInfo::named("s64") }],
            is_single_field: true,
            llvm_underlying: Some("i64".into()),
            protocols: Protocols::empty(),
        };
        assert!(reg.register_type("TestType<s64>", entry.clone()).is_ok());
        assert!(reg.register_type("TestType<s64>", entry).is_ok());
        assert_eq!(reg.type_names().count(), 1);

        let conflicting = TypeEntry::Choice { cases: vec![("A".into(), 0)] };
        assert!(reg.register_type("TestType<s64>", conflicting).is_err());
    }

    #[test]
    fn function_instantiations_deduplicate() {
        let mut reg = TypeRegistry::new();
        let inst = FunctionInstantiation {
            canonical: "identity<s64>".into(),
            template: "identity".into(),
            substitution: HashMap::from([("T".to_string(), "s64".to_string())]),
        };
        reg.request_function_instantiation(inst.clone());
        reg.request_function_instantiation(inst);
        assert_eq!(reg.function_instantiations().len(), 1);
        assert!(reg.is_instantiated("identity<s64>"));
    }

    #[test]
    fn wrapper_kinds() {
        assert!(WrapperKind::from_base("Viewed").unwrap().is_token());
        assert!(!WrapperKind::from_base("Shared").unwrap().is_token());
        assert_eq!(WrapperKind::from_base("List"), None);
        assert_eq!(ErrorWrapperKind::from_base("Lookup"), Some(ErrorWrapperKind::Lookup));
    }
}

//! C type-string reconstruction.
//!
//! Walk a debug-type-descriptor chain down to its terminal level and
//! render the source-level spelling the extracted prototype needs, along
//! with the attribute flags the consumer keys its rewriting on. The walk
//! tolerates malformed chains (dangling references, cycles) by truncating
//! to `void`; a wrong-but-parseable type keeps the downstream rewriter
//! running where an error would abort the whole region.
use std::collections::BTreeSet;

use bitflags::bitflags;
use fxir::types::{TypeDesc, TypeRegistry, Typeref};
use log::warn;
use smallvec::SmallVec;

bitflags! {
    /// Variable attributes carried alongside the rendered type.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct VarFlags: u8 {
        /// Crosses the region boundary outward.
        const OUTPUT = 1 << 0;
        /// `const`-qualified at the variable level.
        const CONST = 1 << 1;
        /// Static storage duration.
        const STATIC = 1 << 2;
        /// Function pointer.
        const FUNPTR = 1 << 3;
        /// Array type.
        const ARRAY = 1 << 4;
    }
}

/// A reconstructed variable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarType {
    /// The rendered C type. For function pointers this embeds the
    /// variable name (`int (*fp)(int)`); otherwise the name is omitted.
    pub text: String,
    pub flags: VarFlags,
    /// Element counts per array dimension, outermost first.
    pub dims: SmallVec<u64, 4>,
}

/// Render the type behind `ty` for a variable called `name`.
///
/// The walk is purely structural, so equal chains always render equally.
/// Typedefs are transparent. Every array chain collapses to a single
/// pointer indirection in the text while its dimensions are preserved in
/// [`VarType::dims`].
pub fn reconstruct(registry: &TypeRegistry, ty: Typeref, name: &str) -> VarType {
    let mut flags = VarFlags::empty();
    let mut dims: SmallVec<u64, 4> = SmallVec::new();
    let mut pointers = 0usize;
    let mut constq = false;
    let mut saw_array = false;

    let mut seen: BTreeSet<Typeref> = BTreeSet::new();
    let mut current = ty;

    let base = loop {
        if !seen.insert(current) {
            warn!("cyclic type-descriptor chain at {current:?}; rendering void");
            break "void".to_string();
        }
        match registry.lookup(current) {
            None => {
                warn!("dangling type descriptor {current:?}; rendering void");
                break "void".to_string();
            }
            Some(TypeDesc::Basic(spelling)) => break spelling,
            Some(TypeDesc::Pointer(inner)) => {
                pointers += 1;
                current = inner;
            }
            Some(TypeDesc::ConstQ(inner)) => {
                // Only a qualifier on the variable itself (seen before any
                // indirection) makes the variable const; pointee constness
                // is rendered but doesn't gate write-back.
                if pointers == 0 && !saw_array {
                    flags |= VarFlags::CONST;
                }
                constq = true;
                current = inner;
            }
            Some(TypeDesc::Typedef { base, .. }) => current = base,
            Some(TypeDesc::Array { elem, len }) => {
                if !saw_array {
                    pointers += 1;
                    saw_array = true;
                    flags |= VarFlags::ARRAY;
                }
                dims.push(len);
                current = elem;
            }
            Some(TypeDesc::Struct { name }) => break tagged("struct", name),
            Some(TypeDesc::Union { name }) => break tagged("union", name),
            Some(TypeDesc::Enum { name }) => break tagged("enum", name),
            Some(TypeDesc::Subroutine { ret, params }) => {
                flags |= VarFlags::FUNPTR;
                let text = render_funptr(registry, ret, &params, pointers, constq, name);
                return VarType { text, flags, dims };
            }
        }
    };

    let mut text = String::new();
    if constq {
        text.push_str("const ");
    }
    text.push_str(&base);
    if pointers > 0 {
        text.push(' ');
        text.push_str(&"*".repeat(pointers));
    }

    VarType { text, flags, dims }
}

fn tagged(keyword: &str, name: Option<String>) -> String {
    match name {
        Some(tag) => format!("{keyword} {tag}"),
        None => {
            // An anonymous aggregate has no spelling usable in a
            // prototype; the consumer treats it as opaque.
            warn!("anonymous {keyword} type in a variable chain; rendering void");
            "void".to_string()
        }
    }
}

/// `ret (*quals name)(p0, p1, ...)`, or `(void)` for an empty parameter
/// list. The declarator always carries at least one star; a plain
/// subroutine level only ever reaches a variable through a pointer.
fn render_funptr(
    registry: &TypeRegistry,
    ret: Option<Typeref>,
    params: &[Typeref],
    pointers: usize,
    constq: bool,
    name: &str,
) -> String {
    let ret_text = match ret {
        Some(r) => reconstruct(registry, r, "").text,
        None => "void".to_string(),
    };

    let mut declarator = "*".repeat(pointers.max(1));
    if constq {
        declarator.push_str("const ");
    }
    declarator.push_str(name);
    let declarator = declarator.trim_end();

    let params_text = if params.is_empty() {
        "void".to_string()
    } else {
        params
            .iter()
            .map(|p| reconstruct(registry, *p, "").text)
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!("{ret_text} ({declarator})({params_text})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_scalar_and_pointer_chains() {
        let reg = TypeRegistry::new();
        let int = reg.search_or_insert(TypeDesc::Basic("int".into()));
        let cint = reg.search_or_insert(TypeDesc::ConstQ(int));
        let pcint = reg.search_or_insert(TypeDesc::Pointer(cint));
        let ppcint = reg.search_or_insert(TypeDesc::Pointer(pcint));

        assert_eq!(reconstruct(&reg, int, "x").text, "int");
        assert_eq!(reconstruct(&reg, pcint, "p").text, "const int *");
        assert_eq!(reconstruct(&reg, ppcint, "pp").text, "const int **");
        // Pointee constness doesn't mark the variable const.
        assert!(!reconstruct(&reg, pcint, "p").flags.contains(VarFlags::CONST));
        assert!(reconstruct(&reg, cint, "x").flags.contains(VarFlags::CONST));
    }

    #[test]
    fn typedefs_are_transparent() {
        let reg = TypeRegistry::new();
        let ulong = reg.search_or_insert(TypeDesc::Basic("unsigned long".into()));
        let size_t = reg.search_or_insert(TypeDesc::Typedef {
            name: "size_t".into(),
            base: ulong,
        });

        assert_eq!(reconstruct(&reg, size_t, "n").text, "unsigned long");
    }

    #[test]
    fn arrays_collapse_to_one_indirection_with_dims() {
        let reg = TypeRegistry::new();
        let f = reg.search_or_insert(TypeDesc::Basic("float".into()));
        let inner = reg.search_or_insert(TypeDesc::Array { elem: f, len: 4 });
        let outer = reg.search_or_insert(TypeDesc::Array {
            elem: inner,
            len: 3,
        });

        let vt = reconstruct(&reg, outer, "m");
        assert_eq!(vt.text, "float *");
        assert!(vt.flags.contains(VarFlags::ARRAY));
        assert_eq!(&vt.dims[..], &[3, 4]);
    }

    #[test]
    fn renders_function_pointers_with_the_variable_name() {
        let reg = TypeRegistry::new();
        let int = reg.search_or_insert(TypeDesc::Basic("int".into()));
        let chr = reg.search_or_insert(TypeDesc::Basic("char".into()));
        let pchr = reg.search_or_insert(TypeDesc::Pointer(chr));
        let sub = reg.search_or_insert(TypeDesc::Subroutine {
            ret: Some(int),
            params: vec![int, pchr],
        });
        let fp = reg.search_or_insert(TypeDesc::Pointer(sub));

        let vt = reconstruct(&reg, fp, "cb");
        assert_eq!(vt.text, "int (*cb)(int, char *)");
        assert!(vt.flags.contains(VarFlags::FUNPTR));

        let nullary = reg.search_or_insert(TypeDesc::Subroutine {
            ret: None,
            params: Vec::new(),
        });
        let fp0 = reg.search_or_insert(TypeDesc::Pointer(nullary));
        assert_eq!(reconstruct(&reg, fp0, "hook").text, "void (*hook)(void)");
    }

    #[test]
    fn malformed_chains_truncate_to_void() {
        let reg = TypeRegistry::new();
        let dangling = TypeRegistry::dangling();
        let p = reg.search_or_insert(TypeDesc::Pointer(dangling));
        let anon = reg.search_or_insert(TypeDesc::Struct { name: None });

        assert_eq!(reconstruct(&reg, p, "x").text, "void *");
        assert_eq!(reconstruct(&reg, anon, "s").text, "void");
    }

    #[test]
    fn reconstruction_is_deterministic() {
        let reg = TypeRegistry::new();
        let int = reg.search_or_insert(TypeDesc::Basic("int".into()));
        let p = reg.search_or_insert(TypeDesc::Pointer(int));

        let a = reconstruct(&reg, p, "v");
        let b = reconstruct(&reg, p, "v");
        assert_eq!(a, b);
    }
}

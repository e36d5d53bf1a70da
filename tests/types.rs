use anvil::{Context, TypeKind};
use test_case::test_case;

/// Repeated requests for the same primitive kind must agree under every
/// structural query, whatever the handles themselves are.
#[test]
fn primitive_kinds_are_structurally_stable() {
    let mut ctx = Context::new();
    for kind in TypeKind::ALL {
        let a = ctx.get_type(kind).unwrap();
        let b = ctx.get_type(kind).unwrap();
        assert_eq!(ctx.size_of(a).unwrap(), ctx.size_of(b).unwrap(), "{kind:?}");
        assert_eq!(
            ctx.is_integral(a).unwrap(),
            ctx.is_integral(b).unwrap(),
            "{kind:?}"
        );
        assert_eq!(ctx.is_bool(a).unwrap(), ctx.is_bool(b).unwrap(), "{kind:?}");
        assert_eq!(
            ctx.is_pointer(a).unwrap(),
            ctx.is_pointer(b).unwrap(),
            "{kind:?}"
        );
        assert_eq!(
            ctx.is_struct(a).unwrap(),
            ctx.is_struct(b).unwrap(),
            "{kind:?}"
        );
    }
}

#[test_case(TypeKind::Bool, 1; "bool")]
#[test_case(TypeKind::UnsignedChar, 1; "unsigned char")]
#[test_case(TypeKind::Int, 4; "int")]
#[test_case(TypeKind::Float, 4; "float")]
#[test_case(TypeKind::Double, 8; "double")]
#[test_case(TypeKind::UInt16, 2; "uint16")]
#[test_case(TypeKind::UInt32, 4; "uint32")]
#[test_case(TypeKind::UInt64, 8; "uint64")]
#[test_case(TypeKind::Int128, 16; "int128")]
#[test_case(TypeKind::ComplexFloat, 8; "complex float")]
fn primitive_sizes(kind: TypeKind, expected: u64) {
    let mut ctx = Context::new();
    let ty = ctx.get_type(kind).unwrap();
    assert_eq!(ctx.size_of(ty).unwrap(), expected);
}

#[test]
fn pointer_width_kinds_match_the_host() {
    let mut ctx = Context::new();
    let expected = std::mem::size_of::<usize>() as u64;
    for kind in [TypeKind::VoidPtr, TypeKind::ConstCharPtr, TypeKind::SizeT] {
        let ty = ctx.get_type(kind).unwrap();
        assert_eq!(ctx.size_of(ty).unwrap(), expected, "{kind:?}");
    }
}

#[test]
fn integral_classification() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let size_t = ctx.get_type(TypeKind::SizeT).unwrap();
    let boolean = ctx.get_type(TypeKind::Bool).unwrap();
    let double = ctx.get_type(TypeKind::Double).unwrap();

    assert!(ctx.is_integral(int).unwrap());
    assert!(ctx.is_integral(size_t).unwrap());
    assert!(!ctx.is_integral(boolean).unwrap());
    assert!(ctx.is_bool(boolean).unwrap());
    assert!(!ctx.is_integral(double).unwrap());
}

#[test]
fn derived_pointer_types() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let ptr = ctx.pointer_to(int).unwrap();

    assert!(ctx.is_pointer(ptr).unwrap());
    assert!(!ctx.is_pointer(int).unwrap());
    assert_eq!(ctx.size_of(ptr).unwrap(), std::mem::size_of::<usize>() as u64);

    // qualifiers are transparent to every query
    let const_ptr = ctx.const_of(ptr).unwrap();
    let volatile_const_ptr = ctx.volatile_of(const_ptr).unwrap();
    assert!(ctx.is_pointer(const_ptr).unwrap());
    assert!(ctx.is_pointer(volatile_const_ptr).unwrap());
    assert_eq!(
        ctx.size_of(volatile_const_ptr).unwrap(),
        ctx.size_of(ptr).unwrap()
    );

    let unqualified = ctx.unqualified(volatile_const_ptr).unwrap();
    assert!(ctx.is_pointer(unqualified).unwrap());
}

#[test]
fn array_type_size() {
    let mut ctx = Context::new();
    let byte = ctx.get_type(TypeKind::UnsignedChar).unwrap();
    let tape = ctx.array_type(None, byte, 30_000).unwrap();
    assert_eq!(ctx.size_of(tape).unwrap(), 30_000);

    let word = ctx.get_type(TypeKind::UInt32).unwrap();
    let words = ctx.array_type(None, word, 10).unwrap();
    assert_eq!(ctx.size_of(words).unwrap(), 40);
}

#[test]
fn struct_layout_follows_c_rules() {
    let mut ctx = Context::new();
    let byte = ctx.get_type(TypeKind::UnsignedChar).unwrap();
    let word = ctx.get_type(TypeKind::UInt32).unwrap();

    let tag = ctx.new_field(None, byte, "tag").unwrap();
    let value = ctx.new_field(None, word, "value").unwrap();
    let padded = ctx.struct_type(None, "padded", &[tag, value]).unwrap();
    assert!(ctx.is_struct(padded).unwrap());
    assert_eq!(ctx.size_of(padded).unwrap(), 8);

    // tail padding keeps the struct a whole number of alignments
    let value2 = ctx.new_field(None, word, "value").unwrap();
    let tag2 = ctx.new_field(None, byte, "tag").unwrap();
    let tailed = ctx.struct_type(None, "tailed", &[value2, tag2]).unwrap();
    assert_eq!(ctx.size_of(tailed).unwrap(), 8);

    let a = ctx.new_field(None, byte, "a").unwrap();
    let b = ctx.new_field(None, byte, "b").unwrap();
    let half = ctx.get_type(TypeKind::UInt16).unwrap();
    let c = ctx.new_field(None, half, "c").unwrap();
    let packed = ctx.struct_type(None, "pair", &[a, b, c]).unwrap();
    assert_eq!(ctx.size_of(packed).unwrap(), 4);
}

#[test]
fn function_pointer_types_are_pointers() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let void = ctx.get_type(TypeKind::Void).unwrap();
    let fn_ptr = ctx.function_ptr_type(None, void, &[int, int], false).unwrap();

    assert!(ctx.is_pointer(fn_ptr).unwrap());
    assert!(!ctx.is_integral(fn_ptr).unwrap());
    assert_eq!(
        ctx.size_of(fn_ptr).unwrap(),
        std::mem::size_of::<usize>() as u64
    );
}

#[test]
fn field_reuse_across_structs_is_rejected() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let shared = ctx.new_field(None, int, "shared").unwrap();
    ctx.struct_type(None, "first", &[shared]).unwrap();

    let err = ctx.struct_type(None, "second", &[shared]).unwrap_err();
    assert!(
        matches!(&err, anvil::Error::FieldReused { field, owner }
            if field == "shared" && owner == "first"),
        "{err:?}"
    );
    assert!(!ctx.first_error().is_empty());
}

#[test]
fn struct_debug_strings_render_as_c() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let ptr = ctx.pointer_to(int).unwrap();
    assert_eq!(ctx.debug_string(int).unwrap(), "int");
    assert_eq!(ctx.debug_string(ptr).unwrap(), "int *");

    let field = ctx.new_field(None, int, "x").unwrap();
    let point = ctx.struct_type(None, "point", &[field]).unwrap();
    assert_eq!(ctx.debug_string(point).unwrap(), "struct point");
}

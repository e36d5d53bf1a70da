//! The raw foreign boundary: opaque handle types and the eagerly resolved
//! entry-point table of the native code generator.
//!
//! Everything here is untyped from the backend's point of view; the typed
//! arena IR in the rest of the crate is what keeps these calls honest.

use std::os::raw::{c_char, c_int, c_long, c_void};

use libloading::Library;

macro_rules! opaque {
    ($($name:ident),* $(,)?) => {
        $(
            #[repr(C)]
            pub(crate) struct $name {
                _private: [u8; 0],
            }
        )*
    };
}

opaque!(
    RawContext,
    RawResult,
    RawType,
    RawStruct,
    RawField,
    RawFunction,
    RawParam,
    RawLvalue,
    RawRvalue,
    RawBlock,
    RawLocation,
);

macro_rules! api {
    ($( $field:ident: fn($($arg:ty),*) $(-> $ret:ty)? = $symbol:literal; )*) => {
        /// Resolved entry points. Loading fails if any symbol is missing,
        /// so a constructed table is complete by definition.
        pub(crate) struct Api {
            $( pub(crate) $field: unsafe extern "C" fn($($arg),*) $(-> $ret)?, )*
        }

        impl Api {
            pub(crate) fn load(lib: &Library) -> Result<Self, libloading::Error> {
                unsafe {
                    Ok(Self {
                        $(
                            $field: *lib.get::<unsafe extern "C" fn($($arg),*) $(-> $ret)?>(
                                concat!($symbol, "\0").as_bytes(),
                            )?,
                        )*
                    })
                }
            }
        }
    };
}

api! {
    context_acquire: fn() -> *mut RawContext = "gcc_jit_context_acquire";
    context_release: fn(*mut RawContext) = "gcc_jit_context_release";
    context_set_str_option: fn(*mut RawContext, c_int, *const c_char)
        = "gcc_jit_context_set_str_option";
    context_set_int_option: fn(*mut RawContext, c_int, c_int)
        = "gcc_jit_context_set_int_option";
    context_set_bool_option: fn(*mut RawContext, c_int, c_int)
        = "gcc_jit_context_set_bool_option";
    context_set_bool_allow_unreachable_blocks: fn(*mut RawContext, c_int)
        = "gcc_jit_context_set_bool_allow_unreachable_blocks";
    context_set_bool_print_errors_to_stderr: fn(*mut RawContext, c_int)
        = "gcc_jit_context_set_bool_print_errors_to_stderr";
    context_set_bool_use_external_driver: fn(*mut RawContext, c_int)
        = "gcc_jit_context_set_bool_use_external_driver";
    context_compile: fn(*mut RawContext) -> *mut RawResult = "gcc_jit_context_compile";
    context_compile_to_file: fn(*mut RawContext, c_int, *const c_char)
        = "gcc_jit_context_compile_to_file";
    context_get_first_error: fn(*mut RawContext) -> *const c_char
        = "gcc_jit_context_get_first_error";
    context_get_last_error: fn(*mut RawContext) -> *const c_char
        = "gcc_jit_context_get_last_error";
    context_get_type: fn(*mut RawContext, c_int) -> *mut RawType = "gcc_jit_context_get_type";
    context_new_array_type: fn(*mut RawContext, *mut RawLocation, *mut RawType, c_int)
        -> *mut RawType = "gcc_jit_context_new_array_type";
    context_new_field: fn(*mut RawContext, *mut RawLocation, *mut RawType, *const c_char)
        -> *mut RawField = "gcc_jit_context_new_field";
    context_new_struct_type:
        fn(*mut RawContext, *mut RawLocation, *const c_char, c_int, *mut *mut RawField)
        -> *mut RawStruct = "gcc_jit_context_new_struct_type";
    struct_as_type: fn(*mut RawStruct) -> *mut RawType = "gcc_jit_struct_as_type";
    context_new_function_ptr_type:
        fn(*mut RawContext, *mut RawLocation, *mut RawType, c_int, *mut *mut RawType, c_int)
        -> *mut RawType = "gcc_jit_context_new_function_ptr_type";
    type_get_pointer: fn(*mut RawType) -> *mut RawType = "gcc_jit_type_get_pointer";
    type_get_const: fn(*mut RawType) -> *mut RawType = "gcc_jit_type_get_const";
    type_get_volatile: fn(*mut RawType) -> *mut RawType = "gcc_jit_type_get_volatile";
    context_new_param: fn(*mut RawContext, *mut RawLocation, *mut RawType, *const c_char)
        -> *mut RawParam = "gcc_jit_context_new_param";
    context_new_function:
        fn(*mut RawContext, *mut RawLocation, c_int, *mut RawType, *const c_char, c_int,
            *mut *mut RawParam, c_int)
        -> *mut RawFunction = "gcc_jit_context_new_function";
    context_new_global: fn(*mut RawContext, *mut RawLocation, c_int, *mut RawType, *const c_char)
        -> *mut RawLvalue = "gcc_jit_context_new_global";
    function_new_block: fn(*mut RawFunction, *const c_char) -> *mut RawBlock
        = "gcc_jit_function_new_block";
    function_new_local: fn(*mut RawFunction, *mut RawLocation, *mut RawType, *const c_char)
        -> *mut RawLvalue = "gcc_jit_function_new_local";
    param_as_rvalue: fn(*mut RawParam) -> *mut RawRvalue = "gcc_jit_param_as_rvalue";
    param_as_lvalue: fn(*mut RawParam) -> *mut RawLvalue = "gcc_jit_param_as_lvalue";
    lvalue_as_rvalue: fn(*mut RawLvalue) -> *mut RawRvalue = "gcc_jit_lvalue_as_rvalue";
    lvalue_get_address: fn(*mut RawLvalue, *mut RawLocation) -> *mut RawRvalue
        = "gcc_jit_lvalue_get_address";
    lvalue_access_field: fn(*mut RawLvalue, *mut RawLocation, *mut RawField) -> *mut RawLvalue
        = "gcc_jit_lvalue_access_field";
    rvalue_dereference: fn(*mut RawRvalue, *mut RawLocation) -> *mut RawLvalue
        = "gcc_jit_rvalue_dereference";
    rvalue_dereference_field: fn(*mut RawRvalue, *mut RawLocation, *mut RawField)
        -> *mut RawLvalue = "gcc_jit_rvalue_dereference_field";
    context_new_string_literal: fn(*mut RawContext, *const c_char) -> *mut RawRvalue
        = "gcc_jit_context_new_string_literal";
    context_new_rvalue_from_int: fn(*mut RawContext, *mut RawType, c_int) -> *mut RawRvalue
        = "gcc_jit_context_new_rvalue_from_int";
    context_new_rvalue_from_long: fn(*mut RawContext, *mut RawType, c_long) -> *mut RawRvalue
        = "gcc_jit_context_new_rvalue_from_long";
    context_new_rvalue_from_ptr: fn(*mut RawContext, *mut RawType, *mut c_void)
        -> *mut RawRvalue = "gcc_jit_context_new_rvalue_from_ptr";
    context_zero: fn(*mut RawContext, *mut RawType) -> *mut RawRvalue = "gcc_jit_context_zero";
    context_one: fn(*mut RawContext, *mut RawType) -> *mut RawRvalue = "gcc_jit_context_one";
    context_new_cast: fn(*mut RawContext, *mut RawLocation, *mut RawRvalue, *mut RawType)
        -> *mut RawRvalue = "gcc_jit_context_new_cast";
    context_new_bitcast: fn(*mut RawContext, *mut RawLocation, *mut RawRvalue, *mut RawType)
        -> *mut RawRvalue = "gcc_jit_context_new_bitcast";
    context_new_comparison:
        fn(*mut RawContext, *mut RawLocation, c_int, *mut RawRvalue, *mut RawRvalue)
        -> *mut RawRvalue = "gcc_jit_context_new_comparison";
    context_new_binary_op:
        fn(*mut RawContext, *mut RawLocation, c_int, *mut RawType, *mut RawRvalue,
            *mut RawRvalue)
        -> *mut RawRvalue = "gcc_jit_context_new_binary_op";
    context_new_call:
        fn(*mut RawContext, *mut RawLocation, *mut RawFunction, c_int, *mut *mut RawRvalue)
        -> *mut RawRvalue = "gcc_jit_context_new_call";
    context_new_call_through_ptr:
        fn(*mut RawContext, *mut RawLocation, *mut RawRvalue, c_int, *mut *mut RawRvalue)
        -> *mut RawRvalue = "gcc_jit_context_new_call_through_ptr";
    context_new_array_access:
        fn(*mut RawContext, *mut RawLocation, *mut RawRvalue, *mut RawRvalue)
        -> *mut RawLvalue = "gcc_jit_context_new_array_access";
    context_new_location: fn(*mut RawContext, *const c_char, c_int, c_int) -> *mut RawLocation
        = "gcc_jit_context_new_location";
    block_add_eval: fn(*mut RawBlock, *mut RawLocation, *mut RawRvalue)
        = "gcc_jit_block_add_eval";
    block_add_assignment: fn(*mut RawBlock, *mut RawLocation, *mut RawLvalue, *mut RawRvalue)
        = "gcc_jit_block_add_assignment";
    block_add_assignment_op:
        fn(*mut RawBlock, *mut RawLocation, *mut RawLvalue, c_int, *mut RawRvalue)
        = "gcc_jit_block_add_assignment_op";
    block_add_comment: fn(*mut RawBlock, *mut RawLocation, *const c_char)
        = "gcc_jit_block_add_comment";
    block_end_with_jump: fn(*mut RawBlock, *mut RawLocation, *mut RawBlock)
        = "gcc_jit_block_end_with_jump";
    block_end_with_conditional:
        fn(*mut RawBlock, *mut RawLocation, *mut RawRvalue, *mut RawBlock, *mut RawBlock)
        = "gcc_jit_block_end_with_conditional";
    block_end_with_return: fn(*mut RawBlock, *mut RawLocation, *mut RawRvalue)
        = "gcc_jit_block_end_with_return";
    block_end_with_void_return: fn(*mut RawBlock, *mut RawLocation)
        = "gcc_jit_block_end_with_void_return";
    result_get_code: fn(*mut RawResult, *const c_char) -> *mut c_void
        = "gcc_jit_result_get_code";
    result_release: fn(*mut RawResult) = "gcc_jit_result_release";
    version_major: fn() -> c_int = "gcc_jit_version_major";
    version_minor: fn() -> c_int = "gcc_jit_version_minor";
    version_patchlevel: fn() -> c_int = "gcc_jit_version_patchlevel";
}

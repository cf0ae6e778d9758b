use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{GenericArgument, ItemFn, PathArguments, ReturnType, Type, parse_macro_input};

/// Whether `ty` is a byte slice reference, `&[u8]` or `&mut [u8]`.
fn is_slice_ref(ty: &Type) -> bool {
    match ty {
        Type::Reference(reference) => matches!(&*reference.elem, Type::Slice(_)),
        _ => false,
    }
}

/// How an argument shows up in the trace: buffers by length, the rest by
/// their `Debug` form.
fn trace_expr(arg_name: &syn::Ident, arg_type: &Type) -> TokenStream2 {
    if is_slice_ref(arg_type) {
        return quote! { #arg_name.len() };
    }
    if let Type::Path(type_path) = arg_type {
        let Some(outer) = type_path.path.segments.last() else {
            return quote! { #arg_name };
        };
        if outer.ident == "Option" {
            if let PathArguments::AngleBracketed(args) = &outer.arguments {
                if let Some(GenericArgument::Type(inner)) = args.args.first() {
                    if is_slice_ref(inner) {
                        return quote! { #arg_name.as_ref().map(|buf| buf.len()) };
                    }
                }
            }
        }
    }
    quote! { #arg_name }
}

/// Log `[syscall] <= name(args)` on entry and `[syscall] => name(args) = result`
/// on return of a `LinuxResult`-returning syscall.
#[proc_macro_attribute]
pub fn syscall_trace(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut function = parse_macro_input!(item as ItemFn);
    let signature = &function.sig;
    let fn_name = &signature.ident;
    let ret_type = match &signature.output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => quote! { () },
    };
    let fn_args: Vec<_> = signature
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            syn::FnArg::Typed(pat_type) => match &*pat_type.pat {
                syn::Pat::Ident(pat_ident) => Some((&pat_ident.ident, &*pat_type.ty)),
                _ => None,
            },
            _ => None,
        })
        .collect();

    let arg_exprs: Vec<_> = fn_args
        .iter()
        .map(|(arg_name, arg_type)| trace_expr(arg_name, arg_type))
        .collect();
    let arg_list_pattern = fn_args
        .iter()
        .map(|(name, _)| format!("{} = {{:?}}", name))
        .collect::<Vec<_>>()
        .join(", ");
    let format_pattern_in = format!("[syscall] <= {}({{}})", fn_name);
    let format_pattern_out = format!("[syscall] => {}({{}}) = {{:?}}", fn_name);

    let fn_body = &function.block;
    let block = quote! {{
        use alloc::format;

        let __args = format!(#arg_list_pattern #(, #arg_exprs)*);
        debug!(#format_pattern_in, __args);

        let __result = (|| -> #ret_type { #fn_body })();

        debug!(#format_pattern_out, __args, __result);
        __result
    }};
    function.block = match syn::parse2(block) {
        Ok(block) => block,
        Err(err) => return err.to_compile_error().into(),
    };
    quote! {
        #function
    }
    .into()
}

use super::*;

/// Memoize the getters in an impl block.
pub fn expand(mut block: syn::ItemImpl) -> Result<proc_macro2::TokenStream> {
    if let Some((_, path, _)) = &block.trait_ {
        bail!(path, "memoized impl blocks cannot implement traits");
    }

    for param in block.generics.params.iter() {
        bail!(param, "memoized impl blocks cannot be generic");
    }

    let ty = block.self_ty.as_ref().clone();

    // Preprocess and validate the accessors, stripping their `#[key]`
    // attributes from the passed-through block.
    let mut accessors = vec![];
    for item in &mut block.items {
        accessors.push(prepare_accessor(item)?);
    }

    // Produce the necessary items for the type's accessors to become
    // memoizable.
    let scope = create(&ty, &accessors);

    Ok(quote! {
        #block
        const _: () = { #scope };
    })
}

/// Details about a memoized accessor.
struct Accessor {
    vis: syn::Visibility,
    sig: syn::Signature,
    key: syn::ExprClosure,
    value: syn::Type,
    fallible: bool,
}

/// Preprocess and validate a single accessor in the impl block.
fn prepare_accessor(item: &mut syn::ImplItem) -> Result<Accessor> {
    match item {
        syn::ImplItem::Fn(method) => {
            let key = take_key_attr(&mut method.attrs)?;
            prepare_method(method, key)
        }
        other => bail!(other, "only methods can be memoized"),
    }
}

/// Extract the `#[key(..)]` attribute from an accessor's attributes.
fn take_key_attr(attrs: &mut Vec<syn::Attribute>) -> Result<Option<syn::ExprClosure>> {
    let mut found = None;
    for i in (0..attrs.len()).rev() {
        if !attrs[i].path().is_ident("key") {
            continue;
        }

        let attr = attrs.remove(i);
        if found.is_some() {
            bail!(attr, "duplicate `key` attribute");
        }

        let closure = match attr.parse_args::<syn::Expr>()? {
            syn::Expr::Closure(closure) => closure,
            expr => bail!(expr, "key must be a closure taking the instance by reference"),
        };

        if closure.inputs.len() != 1 {
            bail!(closure, "key closure must take the instance as its only argument");
        }

        found = Some(closure);
    }
    Ok(found)
}

/// Preprocess and validate an accessor's method signature.
fn prepare_method(
    method: &syn::ImplItemFn,
    key: Option<syn::ExprClosure>,
) -> Result<Accessor> {
    let sig = &method.sig;

    if let Some(unsafety) = sig.unsafety {
        bail!(unsafety, "unsafe methods cannot be memoized");
    }

    if let Some(asyncness) = sig.asyncness {
        bail!(asyncness, "async methods cannot be memoized");
    }

    if let Some(constness) = sig.constness {
        bail!(constness, "const methods cannot be memoized");
    }

    for param in sig.generics.params.iter() {
        bail!(param, "memoized accessors cannot be generic");
    }

    if let Some(where_clause) = &sig.generics.where_clause {
        bail!(where_clause, "memoized accessors cannot be generic");
    }

    let mut inputs = sig.inputs.iter();
    let Some(syn::FnArg::Receiver(receiver)) = inputs.next() else {
        bail!(sig, "memoized accessor must take self");
    };

    if receiver.reference.is_none() || receiver.mutability.is_some() {
        bail!(receiver, "memoized accessor must take self by shared reference");
    }

    if let Some(extra) = inputs.next() {
        bail!(extra, "memoized accessors cannot take arguments");
    }

    let syn::ReturnType::Type(_, output) = &sig.output else {
        bail!(sig, "memoized accessor must return a value");
    };

    let output = &**output;
    if let syn::Type::Reference(_) = output {
        bail!(output, "memoized accessors cannot return references");
    }

    let (value, fallible) = match result_ok_type(output) {
        Some(ok) => {
            if let syn::Type::Reference(_) = ok {
                bail!(ok, "memoized accessors cannot return references");
            }
            (ok.clone(), true)
        }
        None => (output.clone(), false),
    };

    // With no key function, the key is constant and the accessor computes
    // once per instance.
    let key = key.unwrap_or_else(|| parse_quote! { |_| () });

    Ok(Accessor { vis: method.vis.clone(), sig: sig.clone(), key, value, fallible })
}

/// The `Ok` type if the return type syntactically names `Result`.
///
/// Aliases that do not spell out `Result<..>` in their final path segment
/// are cached as plain values.
fn result_ok_type(ty: &syn::Type) -> Option<&syn::Type> {
    let syn::Type::Path(path) = ty else { return None };
    if path.qself.is_some() {
        return None;
    }

    let segment = path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }

    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };

    match args.args.first()? {
        syn::GenericArgument::Type(ok) => Some(ok),
        _ => None,
    }
}

/// Produce the necessary items for a type's accessors to become memoizable.
fn create(ty: &syn::Type, accessors: &[Accessor]) -> proc_macro2::TokenStream {
    let wrappers = accessors.iter().map(|accessor| create_wrapper(ty, accessor));

    quote! {
        impl ::memoget::Memoize for #ty {}

        #[doc(hidden)]
        impl ::memoget::internal::Accessors for #ty {
            type Surface<'a>
                = __MemogetSurface<'a>
            where
                Self: 'a;

            #[inline]
            fn surface<'a, 'r>(
                memoized: &'r ::memoget::Memoized<'a, Self>,
            ) -> &'r __MemogetSurface<'a> {
                // Safety: __MemogetSurface is repr(transparent).
                unsafe { &*(memoized as *const _ as *const _) }
            }
        }

        #[repr(transparent)]
        pub struct __MemogetSurface<'a>(::memoget::Memoized<'a, #ty>);

        #[allow(dead_code)]
        impl __MemogetSurface<'_> {
            #(#wrappers)*
        }
    }
}

/// Produce the memoizing surface method for one accessor.
fn create_wrapper(ty: &syn::Type, accessor: &Accessor) -> proc_macro2::TokenStream {
    let name = &accessor.sig.ident;
    let vis = &accessor.vis;
    let sig = &accessor.sig;
    let key = &accessor.key;
    let value = &accessor.value;
    let marker = format_ident!("__MemogetField_{}", name);

    // The raw computation. Only a normally returned value is written into
    // the record, so errors are never cached.
    let compute = if accessor.fallible {
        quote! { |this: &#ty| this.#name() }
    } else {
        quote! {
            |this: &#ty| ::core::result::Result::<_, ::core::convert::Infallible>::Ok(this.#name())
        }
    };

    let finish = (!accessor.fallible)
        .then(|| quote! { .unwrap_or_else(|never| match never {}) });

    quote! {
        #[inline]
        #vis #sig {
            #[allow(non_camel_case_types)]
            struct #marker;

            ::memoget::internal::assert_memoizable::<#value>();

            let __handle = ::memoget::internal::handle(&self.0);
            let __key = ::memoget::internal::key_hash(
                &::memoget::internal::apply_key::<#ty, _, _>(#key, &**__handle),
            );
            ::memoget::internal::memoized(
                ::memoget::internal::FieldId::of::<#marker>(),
                __handle,
                __key,
                #compute,
            )
            #finish
        }
    }
}
